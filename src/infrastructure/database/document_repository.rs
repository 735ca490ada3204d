//! SQLite implementation of the DocumentRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Document, ParsedPage};
use crate::domain::ports::DocumentRepository;
use crate::infrastructure::database::util::{parse_datetime, parse_json, parse_uuid, to_json};

#[derive(Clone)]
pub struct SqliteDocumentRepository {
    pool: SqlitePool,
}

impl SqliteDocumentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentRepository for SqliteDocumentRepository {
    async fn insert(&self, document: &Document) -> DomainResult<()> {
        let pages_json = to_json(&document.pages)?;

        sqlx::query(
            r#"INSERT INTO documents (id, task_id, filename, file_hash, pages, is_sample, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(document.id.to_string())
        .bind(document.task_id.to_string())
        .bind(&document.filename)
        .bind(&document.file_hash)
        .bind(&pages_json)
        .bind(document.is_sample as i32)
        .bind(document.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DomainError::ValidationFailed(format!(
                    "document with hash {} already registered",
                    document.file_hash
                ))
            }
            _ => e.into(),
        })?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Document>> {
        let row: Option<DocumentRow> = sqlx::query_as("SELECT * FROM documents WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn get_by_hash(&self, task_id: Uuid, file_hash: &str) -> DomainResult<Option<Document>> {
        let row: Option<DocumentRow> =
            sqlx::query_as("SELECT * FROM documents WHERE task_id = ? AND file_hash = ?")
                .bind(task_id.to_string())
                .bind(file_hash)
                .fetch_optional(&self.pool)
                .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_for_task(&self, task_id: Uuid) -> DomainResult<Vec<Document>> {
        let rows: Vec<DocumentRow> =
            sqlx::query_as("SELECT * FROM documents WHERE task_id = ? ORDER BY created_at")
                .bind(task_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: String,
    task_id: String,
    filename: String,
    file_hash: String,
    pages: String,
    is_sample: i32,
    created_at: String,
}

impl TryFrom<DocumentRow> for Document {
    type Error = DomainError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        let pages: Vec<ParsedPage> = parse_json(&row.pages)?;

        Ok(Document {
            id: parse_uuid(&row.id)?,
            task_id: parse_uuid(&row.task_id)?,
            filename: row.filename,
            file_hash: row.file_hash,
            pages,
            is_sample: row.is_sample != 0,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}
