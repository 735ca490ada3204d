//! Ports: repository and collaborator interfaces the engine depends on.
//!
//! Implementations live in `infrastructure`; tests substitute mocks.

pub mod corner_case_repository;
pub mod document_repository;
pub mod event_repository;
pub mod extraction_repository;
pub mod model_client;
pub mod pattern_repository;
pub mod review_judge;
pub mod review_repository;
pub mod task_repository;
pub mod workflow_repository;
pub mod workflow_rewriter;

pub use corner_case_repository::CornerCaseRepository;
pub use document_repository::DocumentRepository;
pub use event_repository::EventRepository;
pub use extraction_repository::ExtractionRepository;
pub use model_client::{FieldRequest, FieldResponse, ModelClient};
pub use pattern_repository::PatternRepository;
pub use review_judge::{Assessment, ReviewJudge};
pub use review_repository::ReviewRepository;
pub use task_repository::{TaskFilters, TaskRepository};
pub use workflow_repository::WorkflowRepository;
pub use workflow_rewriter::WorkflowRewriter;
