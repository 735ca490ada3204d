//! SQLite implementation of the WorkflowRepository.
//!
//! Activation flips the single `is_active` flag per task under a per-task
//! lease row, so two concurrent activations cannot interleave: the second
//! insert hits the lease primary key and maps to a conflict error.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ConfidenceWeights, FieldDef, FieldStrategy, SchemaVersion, WorkflowVersion,
};
use crate::domain::ports::WorkflowRepository;
use crate::infrastructure::database::util::{parse_datetime, parse_json, parse_uuid, to_json};

#[derive(Clone)]
pub struct SqliteWorkflowRepository {
    pool: SqlitePool,
}

impl SqliteWorkflowRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn acquire_lease(&self, task_id: Uuid) -> DomainResult<()> {
        sqlx::query("INSERT INTO activation_leases (task_id) VALUES (?)")
            .bind(task_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    DomainError::VersionActivationConflict { task_id }
                }
                _ => e.into(),
            })?;
        Ok(())
    }

    async fn release_lease(&self, task_id: Uuid) -> DomainResult<()> {
        sqlx::query("DELETE FROM activation_leases WHERE task_id = ?")
            .bind(task_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl WorkflowRepository for SqliteWorkflowRepository {
    async fn insert_schema(&self, schema: &SchemaVersion) -> DomainResult<()> {
        let fields_json = to_json(&schema.fields)?;

        sqlx::query(
            r#"INSERT INTO schema_versions (id, task_id, version, fields, is_active, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(schema.id.to_string())
        .bind(schema.task_id.to_string())
        .bind(schema.version as i64)
        .bind(&fields_json)
        .bind(schema.is_active as i32)
        .bind(schema.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_schema(&self, id: Uuid) -> DomainResult<Option<SchemaVersion>> {
        let row: Option<SchemaRow> = sqlx::query_as("SELECT * FROM schema_versions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn active_schema(&self, task_id: Uuid) -> DomainResult<Option<SchemaVersion>> {
        let row: Option<SchemaRow> =
            sqlx::query_as("SELECT * FROM schema_versions WHERE task_id = ? AND is_active = 1")
                .bind(task_id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn activate_schema(&self, task_id: Uuid, schema_id: Uuid) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE schema_versions SET is_active = 0 WHERE task_id = ?")
            .bind(task_id.to_string())
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("UPDATE schema_versions SET is_active = 1 WHERE id = ? AND task_id = ?")
            .bind(schema_id.to_string())
            .bind(task_id.to_string())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::WorkflowVersionNotFound(schema_id));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn insert_workflow(&self, workflow: &WorkflowVersion) -> DomainResult<()> {
        let strategies_json = to_json(&workflow.strategies)?;
        let ladder_json = to_json(&workflow.tier_ladder)?;
        let weights_json = to_json(&workflow.confidence_weights)?;

        sqlx::query(
            r#"INSERT INTO workflow_versions (id, task_id, version, strategies, tier_ladder,
               confidence_weights, snapshot_hash, vcs_ref, is_active, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(workflow.id.to_string())
        .bind(workflow.task_id.to_string())
        .bind(workflow.version as i64)
        .bind(&strategies_json)
        .bind(&ladder_json)
        .bind(&weights_json)
        .bind(&workflow.snapshot_hash)
        .bind(&workflow.vcs_ref)
        .bind(workflow.is_active as i32)
        .bind(workflow.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_workflow(&self, id: Uuid) -> DomainResult<Option<WorkflowVersion>> {
        let row: Option<WorkflowRow> = sqlx::query_as("SELECT * FROM workflow_versions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn active_workflow(&self, task_id: Uuid) -> DomainResult<Option<WorkflowVersion>> {
        let row: Option<WorkflowRow> =
            sqlx::query_as("SELECT * FROM workflow_versions WHERE task_id = ? AND is_active = 1")
                .bind(task_id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_workflows(&self, task_id: Uuid) -> DomainResult<Vec<WorkflowVersion>> {
        let rows: Vec<WorkflowRow> =
            sqlx::query_as("SELECT * FROM workflow_versions WHERE task_id = ? ORDER BY version")
                .bind(task_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn activate_workflow(&self, task_id: Uuid, workflow_id: Uuid) -> DomainResult<()> {
        self.acquire_lease(task_id).await?;

        let result = self.swing_active_pointer(task_id, workflow_id).await;

        // The lease must come off even when the swing failed.
        let released = self.release_lease(task_id).await;
        result?;
        released
    }
}

impl SqliteWorkflowRepository {
    async fn swing_active_pointer(&self, task_id: Uuid, workflow_id: Uuid) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE workflow_versions SET is_active = 0 WHERE task_id = ?")
            .bind(task_id.to_string())
            .execute(&mut *tx)
            .await?;

        let result =
            sqlx::query("UPDATE workflow_versions SET is_active = 1 WHERE id = ? AND task_id = ?")
                .bind(workflow_id.to_string())
                .bind(task_id.to_string())
                .execute(&mut *tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::WorkflowVersionNotFound(workflow_id));
        }

        tx.commit().await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct SchemaRow {
    id: String,
    task_id: String,
    version: i64,
    fields: String,
    is_active: i32,
    created_at: String,
}

impl TryFrom<SchemaRow> for SchemaVersion {
    type Error = DomainError;

    fn try_from(row: SchemaRow) -> Result<Self, Self::Error> {
        let fields: Vec<FieldDef> = parse_json(&row.fields)?;

        Ok(SchemaVersion {
            id: parse_uuid(&row.id)?,
            task_id: parse_uuid(&row.task_id)?,
            version: row.version as u32,
            fields,
            is_active: row.is_active != 0,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct WorkflowRow {
    id: String,
    task_id: String,
    version: i64,
    strategies: String,
    tier_ladder: String,
    confidence_weights: String,
    snapshot_hash: String,
    vcs_ref: Option<String>,
    is_active: i32,
    created_at: String,
}

impl TryFrom<WorkflowRow> for WorkflowVersion {
    type Error = DomainError;

    fn try_from(row: WorkflowRow) -> Result<Self, Self::Error> {
        let strategies: BTreeMap<String, FieldStrategy> = parse_json(&row.strategies)?;
        let tier_ladder: Vec<String> = parse_json(&row.tier_ladder)?;
        let confidence_weights: ConfidenceWeights = parse_json(&row.confidence_weights)?;

        Ok(WorkflowVersion {
            id: parse_uuid(&row.id)?,
            task_id: parse_uuid(&row.task_id)?,
            version: row.version as u32,
            strategies,
            tier_ladder,
            confidence_weights,
            snapshot_hash: row.snapshot_hash,
            vcs_ref: row.vcs_ref,
            is_active: row.is_active != 0,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}
