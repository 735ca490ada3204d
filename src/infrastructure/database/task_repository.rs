//! SQLite implementation of the TaskRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Task, TaskStatus};
use crate::domain::ports::{TaskFilters, TaskRepository};
use crate::infrastructure::database::util::{parse_datetime, parse_opt_uuid, parse_uuid};

#[derive(Clone)]
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn insert(&self, task: &Task) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO tasks (id, name, description, status, iteration, max_iteration,
               active_schema_version, active_workflow_version, archived, created_at, updated_at, version)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(task.id.to_string())
        .bind(&task.name)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(task.iteration as i64)
        .bind(task.max_iteration as i64)
        .bind(task.active_schema_version.map(|id| id.to_string()))
        .bind(task.active_workflow_version.map(|id| id.to_string()))
        .bind(task.archived as i32)
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .bind(task.version as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn get_by_name(&self, name: &str) -> DomainResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, task: &Task) -> DomainResult<()> {
        // Optimistic lock: the in-memory task carries the bumped version, so
        // the stored row must still be older.
        let result = sqlx::query(
            r#"UPDATE tasks SET status = ?, iteration = ?, max_iteration = ?,
               active_schema_version = ?, active_workflow_version = ?, archived = ?,
               updated_at = ?, version = ?
               WHERE id = ? AND version < ?"#,
        )
        .bind(task.status.as_str())
        .bind(task.iteration as i64)
        .bind(task.max_iteration as i64)
        .bind(task.active_schema_version.map(|id| id.to_string()))
        .bind(task.active_workflow_version.map(|id| id.to_string()))
        .bind(task.archived as i32)
        .bind(task.updated_at.to_rfc3339())
        .bind(task.version as i64)
        .bind(task.id.to_string())
        .bind(task.version as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM tasks WHERE id = ?")
                .bind(task.id.to_string())
                .fetch_optional(&self.pool)
                .await?;
            return match exists {
                Some(_) => Err(DomainError::ConcurrencyConflict {
                    entity: "task".to_string(),
                    id: task.id.to_string(),
                }),
                None => Err(DomainError::TaskNotFound(task.id)),
            };
        }

        Ok(())
    }

    async fn list(&self, filters: TaskFilters) -> DomainResult<Vec<Task>> {
        let mut query = String::from("SELECT * FROM tasks WHERE 1=1");
        let mut bindings: Vec<String> = Vec::new();

        if let Some(status) = &filters.status {
            query.push_str(" AND status = ?");
            bindings.push(status.as_str().to_string());
        }
        if !filters.include_archived {
            query.push_str(" AND archived = 0");
        }

        query.push_str(" ORDER BY created_at DESC");

        let mut q = sqlx::query_as::<_, TaskRow>(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }

        let rows: Vec<TaskRow> = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn archive(&self, id: Uuid) -> DomainResult<()> {
        let result = sqlx::query("UPDATE tasks SET archived = 1, updated_at = ? WHERE id = ?")
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::TaskNotFound(id));
        }

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    name: String,
    description: String,
    status: String,
    iteration: i64,
    max_iteration: i64,
    active_schema_version: Option<String>,
    active_workflow_version: Option<String>,
    archived: i32,
    created_at: String,
    updated_at: String,
    version: i64,
}

impl TryFrom<TaskRow> for Task {
    type Error = DomainError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let status = TaskStatus::from_str(&row.status)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid status: {}", row.status)))?;

        Ok(Task {
            id: parse_uuid(&row.id)?,
            name: row.name,
            description: row.description,
            status,
            iteration: row.iteration as u32,
            max_iteration: row.max_iteration as u32,
            active_schema_version: parse_opt_uuid(row.active_schema_version.as_deref())?,
            active_workflow_version: parse_opt_uuid(row.active_workflow_version.as_deref())?,
            archived: row.archived != 0,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
            version: row.version as u64,
        })
    }
}
