//! Engine services.
//!
//! Pure-ish decision logic (confidence scoring, sampling, diagnosis, tier
//! optimization) plus the orchestrating [`evolution::EvolutionEngine`] that
//! drives tasks through their lifecycle against the domain ports.

pub mod confidence;
pub mod diagnosis;
pub mod evolution;
pub mod pattern_library;
pub mod rewriter;
pub mod sampler;
pub mod strategy;
pub mod tier_optimizer;

pub use confidence::ConfidenceEvaluator;
pub use diagnosis::{DiagnosisClassifier, DiagnosisConfig, DiagnosisReport, TriggerDecision};
pub use evolution::{EvolutionEngine, EvolutionOutcome, RunReport};
pub use pattern_library::PatternLibrary;
pub use rewriter::StrategyRewriter;
pub use sampler::AdaptiveSampler;
pub use strategy::{StrategyExecutor, StrategyRegistry};
pub use tier_optimizer::{TierDecision, TierOptimizer, TierPolicy};
