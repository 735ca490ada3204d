//! SQLite implementation of the ExtractionRepository.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ConfidenceSignals, ExecutionStatus, ExtractionRecord, FieldConfidence, InferenceCost,
};
use crate::domain::ports::ExtractionRepository;
use crate::infrastructure::database::util::{parse_datetime, parse_json, parse_uuid, to_json};

#[derive(Clone)]
pub struct SqliteExtractionRepository {
    pool: SqlitePool,
}

impl SqliteExtractionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExtractionRepository for SqliteExtractionRepository {
    async fn insert(&self, record: &ExtractionRecord) -> DomainResult<()> {
        let fields_json = to_json(&record.fields)?;
        let signals_json = to_json(&record.signals)?;
        let confidences_json = to_json(&record.field_confidences)?;

        sqlx::query(
            r#"INSERT INTO extractions (id, document_id, workflow_version_id, schema_version_id,
               iteration, fields, signals, field_confidences, overall_confidence,
               model_calls, tokens, status, error, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(record.id.to_string())
        .bind(record.document_id.to_string())
        .bind(record.workflow_version_id.to_string())
        .bind(record.schema_version_id.to_string())
        .bind(record.iteration as i64)
        .bind(&fields_json)
        .bind(&signals_json)
        .bind(&confidences_json)
        .bind(record.overall_confidence)
        .bind(record.cost.model_calls as i64)
        .bind(record.cost.tokens as i64)
        .bind(record.status.as_str())
        .bind(&record.error)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<ExtractionRecord>> {
        let row: Option<ExtractionRow> = sqlx::query_as("SELECT * FROM extractions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_for_iteration(
        &self,
        task_id: Uuid,
        iteration: u32,
    ) -> DomainResult<Vec<ExtractionRecord>> {
        let rows: Vec<ExtractionRow> = sqlx::query_as(
            r#"SELECT e.* FROM extractions e
               INNER JOIN documents d ON e.document_id = d.id
               WHERE d.task_id = ? AND e.iteration = ?
               ORDER BY e.created_at"#,
        )
        .bind(task_id.to_string())
        .bind(iteration as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn latest_for_document(&self, document_id: Uuid) -> DomainResult<Option<ExtractionRecord>> {
        let row: Option<ExtractionRow> = sqlx::query_as(
            "SELECT * FROM extractions WHERE document_id = ? ORDER BY created_at DESC LIMIT 1",
        )
        .bind(document_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }
}

#[derive(sqlx::FromRow)]
struct ExtractionRow {
    id: String,
    document_id: String,
    workflow_version_id: String,
    schema_version_id: String,
    iteration: i64,
    fields: String,
    signals: String,
    field_confidences: String,
    overall_confidence: Option<f64>,
    model_calls: i64,
    tokens: i64,
    status: String,
    error: Option<String>,
    created_at: String,
}

impl TryFrom<ExtractionRow> for ExtractionRecord {
    type Error = DomainError;

    fn try_from(row: ExtractionRow) -> Result<Self, Self::Error> {
        let status = ExecutionStatus::from_str(&row.status)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid status: {}", row.status)))?;

        let fields: BTreeMap<String, serde_json::Value> = parse_json(&row.fields)?;
        let signals: BTreeMap<String, ConfidenceSignals> = parse_json(&row.signals)?;
        let field_confidences: BTreeMap<String, FieldConfidence> = parse_json(&row.field_confidences)?;

        Ok(ExtractionRecord {
            id: parse_uuid(&row.id)?,
            document_id: parse_uuid(&row.document_id)?,
            workflow_version_id: parse_uuid(&row.workflow_version_id)?,
            schema_version_id: parse_uuid(&row.schema_version_id)?,
            iteration: row.iteration as u32,
            fields,
            signals,
            field_confidences,
            overall_confidence: row.overall_confidence,
            cost: InferenceCost {
                model_calls: row.model_calls as u32,
                tokens: row.tokens as u64,
            },
            status,
            error: row.error,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}
