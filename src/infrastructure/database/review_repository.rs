//! SQLite implementation of the ReviewRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    FeedbackKind, FeedbackRecord, FieldVerdict, ReviewVerdict, SamplingReason, VerdictClass,
};
use crate::domain::ports::ReviewRepository;
use crate::infrastructure::database::util::{parse_datetime, parse_json, parse_uuid, to_json};

#[derive(Clone)]
pub struct SqliteReviewRepository {
    pool: SqlitePool,
}

impl SqliteReviewRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReviewRepository for SqliteReviewRepository {
    async fn insert_verdict(&self, verdict: &ReviewVerdict) -> DomainResult<()> {
        let field_verdicts_json = to_json(&verdict.field_verdicts)?;

        sqlx::query(
            r#"INSERT INTO review_verdicts (id, extraction_id, overall, overall_score,
               field_verdicts, reasoning, sampling_reason, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(verdict.id.to_string())
        .bind(verdict.extraction_id.to_string())
        .bind(verdict.overall.as_str())
        .bind(verdict.overall_score)
        .bind(&field_verdicts_json)
        .bind(&verdict.reasoning)
        .bind(verdict.sampling_reason.as_str())
        .bind(verdict.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn verdicts_for_extraction(&self, extraction_id: Uuid) -> DomainResult<Vec<ReviewVerdict>> {
        let rows: Vec<VerdictRow> = sqlx::query_as(
            "SELECT * FROM review_verdicts WHERE extraction_id = ? ORDER BY created_at",
        )
        .bind(extraction_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn verdicts_for_iteration(
        &self,
        task_id: Uuid,
        iteration: u32,
    ) -> DomainResult<Vec<ReviewVerdict>> {
        let rows: Vec<VerdictRow> = sqlx::query_as(
            r#"SELECT v.* FROM review_verdicts v
               INNER JOIN extractions e ON v.extraction_id = e.id
               INNER JOIN documents d ON e.document_id = d.id
               WHERE d.task_id = ? AND e.iteration = ?
               ORDER BY v.created_at"#,
        )
        .bind(task_id.to_string())
        .bind(iteration as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn insert_feedback(&self, feedback: &FeedbackRecord) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO feedback (id, verdict_id, kind, field, original_value,
               corrected_value, comment, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(feedback.id.to_string())
        .bind(feedback.verdict_id.to_string())
        .bind(feedback.kind.as_str())
        .bind(&feedback.field)
        .bind(&feedback.original_value)
        .bind(&feedback.corrected_value)
        .bind(&feedback.comment)
        .bind(feedback.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn feedback_for_verdict(&self, verdict_id: Uuid) -> DomainResult<Vec<FeedbackRecord>> {
        let rows: Vec<FeedbackRow> =
            sqlx::query_as("SELECT * FROM feedback WHERE verdict_id = ? ORDER BY created_at")
                .bind(verdict_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn feedback_for_iteration(
        &self,
        task_id: Uuid,
        iteration: u32,
    ) -> DomainResult<Vec<FeedbackRecord>> {
        let rows: Vec<FeedbackRow> = sqlx::query_as(
            r#"SELECT f.* FROM feedback f
               INNER JOIN review_verdicts v ON f.verdict_id = v.id
               INNER JOIN extractions e ON v.extraction_id = e.id
               INNER JOIN documents d ON e.document_id = d.id
               WHERE d.task_id = ? AND e.iteration = ?
               ORDER BY f.created_at"#,
        )
        .bind(task_id.to_string())
        .bind(iteration as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct VerdictRow {
    id: String,
    extraction_id: String,
    overall: String,
    overall_score: Option<f64>,
    field_verdicts: String,
    reasoning: Option<String>,
    sampling_reason: String,
    created_at: String,
}

impl TryFrom<VerdictRow> for ReviewVerdict {
    type Error = DomainError;

    fn try_from(row: VerdictRow) -> Result<Self, Self::Error> {
        let overall = VerdictClass::from_str(&row.overall)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid verdict: {}", row.overall)))?;
        let sampling_reason = SamplingReason::from_str(&row.sampling_reason).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid sampling reason: {}", row.sampling_reason))
        })?;
        let field_verdicts: Vec<FieldVerdict> = parse_json(&row.field_verdicts)?;

        Ok(ReviewVerdict {
            id: parse_uuid(&row.id)?,
            extraction_id: parse_uuid(&row.extraction_id)?,
            overall,
            overall_score: row.overall_score,
            field_verdicts,
            reasoning: row.reasoning,
            sampling_reason,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct FeedbackRow {
    id: String,
    verdict_id: String,
    kind: String,
    field: Option<String>,
    original_value: Option<String>,
    corrected_value: Option<String>,
    comment: Option<String>,
    created_at: String,
}

impl TryFrom<FeedbackRow> for FeedbackRecord {
    type Error = DomainError;

    fn try_from(row: FeedbackRow) -> Result<Self, Self::Error> {
        let kind = FeedbackKind::from_str(&row.kind)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid feedback kind: {}", row.kind)))?;

        Ok(FeedbackRecord {
            id: parse_uuid(&row.id)?,
            verdict_id: parse_uuid(&row.verdict_id)?,
            kind,
            field: row.field,
            original_value: row.original_value,
            corrected_value: row.corrected_value,
            comment: row.comment,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}
