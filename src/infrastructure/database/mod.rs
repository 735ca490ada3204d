//! SQLite persistence adapters for the domain repository ports.

pub mod connection;
pub mod corner_case_repository;
pub mod document_repository;
pub mod event_repository;
pub mod extraction_repository;
pub mod migrations;
pub mod pattern_repository;
pub mod review_repository;
pub mod task_repository;
mod util;
pub mod workflow_repository;

pub use connection::{create_pool, create_test_pool, verify_connection, ConnectionError, PoolConfig};
pub use corner_case_repository::SqliteCornerCaseRepository;
pub use document_repository::SqliteDocumentRepository;
pub use event_repository::SqliteEventRepository;
pub use extraction_repository::SqliteExtractionRepository;
pub use migrations::{all_embedded_migrations, Migration, MigrationError, Migrator};
pub use pattern_repository::SqlitePatternRepository;
pub use review_repository::SqliteReviewRepository;
pub use task_repository::SqliteTaskRepository;
pub use workflow_repository::SqliteWorkflowRepository;
