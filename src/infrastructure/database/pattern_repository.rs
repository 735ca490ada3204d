//! SQLite implementation of the PatternRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ResolutionKind, SharedPattern};
use crate::domain::ports::PatternRepository;
use crate::infrastructure::database::util::{parse_datetime, parse_uuid};

#[derive(Clone)]
pub struct SqlitePatternRepository {
    pool: SqlitePool,
}

impl SqlitePatternRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PatternRepository for SqlitePatternRepository {
    async fn upsert(&self, pattern: &SharedPattern) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO shared_patterns (id, name, category, description, implementation,
               implementation_kind, confidence, usage_count, success_count, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(name) DO UPDATE SET
                   category = excluded.category,
                   description = excluded.description,
                   implementation = excluded.implementation,
                   implementation_kind = excluded.implementation_kind"#,
        )
        .bind(pattern.id.to_string())
        .bind(&pattern.name)
        .bind(&pattern.category)
        .bind(&pattern.description)
        .bind(&pattern.implementation)
        .bind(pattern.implementation_kind.as_str())
        .bind(pattern.confidence)
        .bind(pattern.usage_count as i64)
        .bind(pattern.success_count as i64)
        .bind(pattern.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_by_name(&self, name: &str) -> DomainResult<Option<SharedPattern>> {
        let row: Option<PatternRow> = sqlx::query_as("SELECT * FROM shared_patterns WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self, category: Option<&str>, min_confidence: f64) -> DomainResult<Vec<SharedPattern>> {
        let rows: Vec<PatternRow> = match category {
            Some(category) => {
                sqlx::query_as(
                    r#"SELECT * FROM shared_patterns WHERE category = ? AND confidence >= ?
                       ORDER BY confidence DESC"#,
                )
                .bind(category)
                .bind(min_confidence)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    "SELECT * FROM shared_patterns WHERE confidence >= ? ORDER BY confidence DESC",
                )
                .bind(min_confidence)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn update_stats(&self, pattern: &SharedPattern) -> DomainResult<()> {
        let result = sqlx::query(
            r#"UPDATE shared_patterns SET confidence = ?, usage_count = ?, success_count = ?
               WHERE name = ?"#,
        )
        .bind(pattern.confidence)
        .bind(pattern.usage_count as i64)
        .bind(pattern.success_count as i64)
        .bind(&pattern.name)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ValidationFailed(format!(
                "unknown shared pattern '{}'",
                pattern.name
            )));
        }

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct PatternRow {
    id: String,
    name: String,
    category: String,
    description: Option<String>,
    implementation: String,
    implementation_kind: String,
    confidence: f64,
    usage_count: i64,
    success_count: i64,
    created_at: String,
}

impl TryFrom<PatternRow> for SharedPattern {
    type Error = DomainError;

    fn try_from(row: PatternRow) -> Result<Self, Self::Error> {
        let implementation_kind = ResolutionKind::from_str(&row.implementation_kind).ok_or_else(|| {
            DomainError::SerializationError(format!(
                "Invalid implementation kind: {}",
                row.implementation_kind
            ))
        })?;

        Ok(SharedPattern {
            id: parse_uuid(&row.id)?,
            name: row.name,
            category: row.category,
            description: row.description,
            implementation: row.implementation,
            implementation_kind,
            confidence: row.confidence,
            usage_count: row.usage_count as u64,
            success_count: row.success_count as u64,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}
