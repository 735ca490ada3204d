use sqlx::SqlitePool;

use anyextract::infrastructure::database::{all_embedded_migrations, create_test_pool, Migrator};

/// Create an isolated in-memory SQLite database with migrations applied.
pub async fn setup_test_db() -> SqlitePool {
    let pool = create_test_pool()
        .await
        .expect("failed to create test database");

    Migrator::new(pool.clone())
        .run_embedded_migrations(all_embedded_migrations())
        .await
        .expect("failed to run migrations");

    pool
}

/// Close the pool at the end of a test.
pub async fn teardown_test_db(pool: SqlitePool) {
    pool.close().await;
}
