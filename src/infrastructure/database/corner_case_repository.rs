//! SQLite implementation of the CornerCaseRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{CornerCase, ResolutionKind};
use crate::domain::ports::CornerCaseRepository;
use crate::infrastructure::database::util::{parse_datetime, parse_uuid};

#[derive(Clone)]
pub struct SqliteCornerCaseRepository {
    pool: SqlitePool,
}

impl SqliteCornerCaseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CornerCaseRepository for SqliteCornerCaseRepository {
    async fn insert(&self, case: &CornerCase) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO corner_cases (id, task_id, field, description, pattern,
               resolution, resolution_kind, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(case.id.to_string())
        .bind(case.task_id.to_string())
        .bind(&case.field)
        .bind(&case.description)
        .bind(&case.pattern)
        .bind(&case.resolution)
        .bind(case.resolution_kind.as_str())
        .bind(case.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_task(&self, task_id: Uuid) -> DomainResult<Vec<CornerCase>> {
        let rows: Vec<CornerCaseRow> =
            sqlx::query_as("SELECT * FROM corner_cases WHERE task_id = ? ORDER BY created_at")
                .bind(task_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_for_field(&self, task_id: Uuid, field: &str) -> DomainResult<Vec<CornerCase>> {
        let rows: Vec<CornerCaseRow> = sqlx::query_as(
            "SELECT * FROM corner_cases WHERE task_id = ? AND field = ? ORDER BY created_at",
        )
        .bind(task_id.to_string())
        .bind(field)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct CornerCaseRow {
    id: String,
    task_id: String,
    field: String,
    description: String,
    pattern: Option<String>,
    resolution: Option<String>,
    resolution_kind: String,
    created_at: String,
}

impl TryFrom<CornerCaseRow> for CornerCase {
    type Error = DomainError;

    fn try_from(row: CornerCaseRow) -> Result<Self, Self::Error> {
        let resolution_kind = ResolutionKind::from_str(&row.resolution_kind).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid resolution kind: {}", row.resolution_kind))
        })?;

        Ok(CornerCase {
            id: parse_uuid(&row.id)?,
            task_id: parse_uuid(&row.task_id)?,
            field: row.field,
            description: row.description,
            pattern: row.pattern,
            resolution: row.resolution,
            resolution_kind,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}
