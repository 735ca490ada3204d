//! Model-invocation and review adapters.

pub mod client;
pub mod judge;
pub mod mock;

pub use client::OpenAiCompatClient;
pub use judge::LlmJudge;
pub use mock::{ApprovingJudge, OfflineModelClient};
