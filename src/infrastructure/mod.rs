//! Infrastructure adapters: SQLite persistence, configuration loading, and
//! the LLM collaborators behind the domain ports.

pub mod config;
pub mod database;
pub mod llm;
