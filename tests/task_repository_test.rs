mod helpers;

use anyextract::domain::errors::DomainError;
use anyextract::domain::models::{Task, TaskStatus};
use anyextract::domain::ports::{TaskFilters, TaskRepository};
use anyextract::infrastructure::database::SqliteTaskRepository;
use uuid::Uuid;

use helpers::database::{setup_test_db, teardown_test_db};

#[tokio::test]
async fn test_insert_and_get_task() {
    let pool = setup_test_db().await;
    let repo = SqliteTaskRepository::new(pool.clone());

    let task = Task::new("invoices", "Extract invoice fields").with_max_iteration(10);
    repo.insert(&task).await.expect("failed to insert task");

    let retrieved = repo
        .get(task.id)
        .await
        .expect("failed to get task")
        .expect("task not found");
    assert_eq!(retrieved.name, "invoices");
    assert_eq!(retrieved.status, TaskStatus::Bootstrapping);
    assert_eq!(retrieved.iteration, 0);
    assert_eq!(retrieved.max_iteration, 10);

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_get_by_name() {
    let pool = setup_test_db().await;
    let repo = SqliteTaskRepository::new(pool.clone());

    let task = Task::new("receipts", "Extract receipt totals");
    repo.insert(&task).await.expect("failed to insert task");

    let by_name = repo
        .get_by_name("receipts")
        .await
        .expect("failed to query")
        .expect("task not found by name");
    assert_eq!(by_name.id, task.id);

    let missing = repo.get_by_name("no-such-task").await.expect("failed to query");
    assert!(missing.is_none());

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_update_advances_iteration() {
    let pool = setup_test_db().await;
    let repo = SqliteTaskRepository::new(pool.clone());

    let mut task = Task::new("contracts", "Extract contract parties");
    repo.insert(&task).await.expect("failed to insert task");

    task.advance_iteration();
    repo.update(&task).await.expect("failed to update task");

    let retrieved = repo
        .get(task.id)
        .await
        .expect("failed to get task")
        .expect("task not found");
    assert_eq!(retrieved.iteration, 1);
    assert_eq!(retrieved.version, task.version);

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_stale_update_is_rejected() {
    let pool = setup_test_db().await;
    let repo = SqliteTaskRepository::new(pool.clone());

    let task = Task::new("stale", "Concurrent writer test");
    repo.insert(&task).await.expect("failed to insert task");

    let mut writer_a = repo.get(task.id).await.unwrap().unwrap();
    let mut writer_b = repo.get(task.id).await.unwrap().unwrap();

    writer_a.advance_iteration();
    repo.update(&writer_a).await.expect("first writer should win");

    // The second writer's version is no longer ahead of the stored row.
    writer_b.advance_iteration();
    let err = repo.update(&writer_b).await.expect_err("stale write must fail");
    assert!(matches!(err, DomainError::ConcurrencyConflict { .. }));

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_update_missing_task() {
    let pool = setup_test_db().await;
    let repo = SqliteTaskRepository::new(pool.clone());

    let mut ghost = Task::new("ghost", "Never inserted");
    ghost.advance_iteration();
    let err = repo.update(&ghost).await.expect_err("update must fail");
    assert!(matches!(err, DomainError::TaskNotFound(_)));

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_list_filters_and_archive() {
    let pool = setup_test_db().await;
    let repo = SqliteTaskRepository::new(pool.clone());

    let active = Task::new("active", "Still running");
    let archived = Task::new("old", "Finished long ago");
    repo.insert(&active).await.unwrap();
    repo.insert(&archived).await.unwrap();
    repo.archive(archived.id).await.expect("failed to archive");

    let visible = repo.list(TaskFilters::default()).await.expect("failed to list");
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, active.id);

    let all = repo
        .list(TaskFilters { include_archived: true, ..Default::default() })
        .await
        .expect("failed to list");
    assert_eq!(all.len(), 2);

    let bootstrapping = repo
        .list(TaskFilters {
            status: Some(TaskStatus::Bootstrapping),
            include_archived: false,
        })
        .await
        .expect("failed to list");
    assert_eq!(bootstrapping.len(), 1);

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_archive_missing_task() {
    let pool = setup_test_db().await;
    let repo = SqliteTaskRepository::new(pool.clone());

    let err = repo.archive(Uuid::new_v4()).await.expect_err("archive must fail");
    assert!(matches!(err, DomainError::TaskNotFound(_)));

    teardown_test_db(pool).await;
}
