//! SQLite implementation of the EventRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{EventKind, EvolutionEvent};
use crate::domain::ports::EventRepository;
use crate::infrastructure::database::util::{parse_datetime, parse_json, parse_uuid, to_json};

#[derive(Clone)]
pub struct SqliteEventRepository {
    pool: SqlitePool,
}

impl SqliteEventRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventRepository for SqliteEventRepository {
    async fn append(&self, event: &EvolutionEvent) -> DomainResult<()> {
        let trigger_json = event.trigger.as_ref().map(to_json).transpose()?;
        let mutation_json = event.mutation.as_ref().map(to_json).transpose()?;
        let outcome_json = event.outcome.as_ref().map(to_json).transpose()?;

        sqlx::query(
            r#"INSERT INTO evolution_events (id, task_id, kind, iteration, trigger_info,
               mutation, outcome, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(event.id.to_string())
        .bind(event.task_id.to_string())
        .bind(event.kind.as_str())
        .bind(event.iteration as i64)
        .bind(&trigger_json)
        .bind(&mutation_json)
        .bind(&outcome_json)
        .bind(event.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_task(&self, task_id: Uuid) -> DomainResult<Vec<EvolutionEvent>> {
        let rows: Vec<EventRow> =
            sqlx::query_as("SELECT * FROM evolution_events WHERE task_id = ? ORDER BY created_at")
                .bind(task_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    id: String,
    task_id: String,
    kind: String,
    iteration: i64,
    trigger_info: Option<String>,
    mutation: Option<String>,
    outcome: Option<String>,
    created_at: String,
}

impl TryFrom<EventRow> for EvolutionEvent {
    type Error = DomainError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let kind = EventKind::from_str(&row.kind)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid event kind: {}", row.kind)))?;

        Ok(EvolutionEvent {
            id: parse_uuid(&row.id)?,
            task_id: parse_uuid(&row.task_id)?,
            kind,
            iteration: row.iteration as u32,
            trigger: row.trigger_info.as_deref().map(parse_json).transpose()?,
            mutation: row.mutation.as_deref().map(parse_json).transpose()?,
            outcome: row.outcome.as_deref().map(parse_json).transpose()?,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}
