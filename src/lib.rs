//! anyextract - self-evolving document extraction.
//!
//! The engine runs per-task extraction workflows whose schema, field
//! strategies, and model-tier assignments evolve from review evidence.
//! Every change is versioned, re-verified before it sticks, and recorded
//! in an append-only audit trail.
//!
//! Layout follows hexagonal lines: `domain` holds the models and the
//! ports, `services` the engine logic, `infrastructure` the SQLite, LLM,
//! and config adapters, `cli` the command surface.

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;
