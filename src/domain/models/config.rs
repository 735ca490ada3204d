//! Configuration tree.
//!
//! Loaded by `infrastructure::config` with hierarchical merging; defaults
//! here are the programmatic base layer.

use serde::{Deserialize, Serialize};

/// Weights for the composite confidence score. Tunable configuration: the
/// calibration path adjusts these against review verdicts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceWeights {
    pub self_confidence: f64,
    pub method_prior: f64,
    pub historical_accuracy: f64,
    pub source_clarity: f64,
    pub corner_case_match: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            self_confidence: 0.30,
            method_prior: 0.15,
            historical_accuracy: 0.25,
            source_clarity: 0.20,
            corner_case_match: 0.10,
        }
    }
}

impl ConfidenceWeights {
    pub fn sum(&self) -> f64 {
        self.self_confidence
            + self.method_prior
            + self.historical_accuracy
            + self.source_clarity
            + self.corner_case_match
    }

    /// Scale so the weights sum to 1.0. No-op for a zero sum.
    pub fn normalize(&mut self) {
        let sum = self.sum();
        if sum > f64::EPSILON {
            self.self_confidence /= sum;
            self.method_prior /= sum;
            self.historical_accuracy /= sum;
            self.source_clarity /= sum;
            self.corner_case_match /= sum;
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: ".anyextract/anyextract.db".to_string(),
            max_connections: 5,
        }
    }
}

/// Model-invocation configuration: an OpenAI-compatible endpoint plus the
/// ordered tier ladder (most capable first).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub base_url: String,
    pub api_key: String,
    /// Ordered ladder of worker models, most capable (most expensive) first.
    pub tiers: Vec<String>,
    /// Model used by the LLM-as-judge reviewer.
    pub judge_model: String,
    pub max_retries: u32,
    pub timeout_seconds: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.siliconflow.cn/v1".to_string(),
            api_key: String::new(),
            tiers: vec![
                "Qwen/Qwen3-VL-235B-A22B-Instruct".to_string(),
                "Qwen/Qwen3-32B".to_string(),
                "Qwen/Qwen3-14B".to_string(),
                "Qwen/Qwen3-8B".to_string(),
            ],
            judge_model: "Pro/moonshotai/Kimi-K2.5".to_string(),
            max_retries: 3,
            timeout_seconds: 120,
        }
    }
}

/// Tunables for the evolution control engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Iteration bound after which tasks lock.
    pub max_iterations: u32,
    /// Failure-signature fraction above which (strictly) an issue is systemic.
    pub systemic_threshold: f64,
    /// Minimum verdicts in a window before evolution can trigger.
    pub min_judgments: u32,
    /// Average verdict score below which quality is degraded.
    pub quality_threshold: f64,
    /// Overall incorrect rate above which quality is degraded.
    pub incorrect_threshold: f64,
    /// Tie-break when corner-case and systemic evidence cross in one window.
    #[serde(default)]
    pub overlap_resolution: crate::domain::models::diagnosis::OverlapResolution,
    /// Historical accuracy a tier must hold to stay viable.
    pub accuracy_bar: f64,
    /// Verdict-verified observations required at a tier before a downgrade
    /// can lock in.
    pub min_observations: u32,
    /// Overall confidence below which a record is priority-sampled.
    pub low_confidence_threshold: f64,
    /// Per-field composite below which a record is priority-sampled.
    pub field_confidence_floor: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            systemic_threshold: 0.10,
            min_judgments: 3,
            quality_threshold: 0.75,
            incorrect_threshold: 0.10,
            overlap_resolution: crate::domain::models::diagnosis::OverlapResolution::default(),
            accuracy_bar: 0.95,
            min_observations: 20,
            low_confidence_threshold: 0.6,
            field_confidence_floor: 0.5,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub confidence_weights: ConfidenceWeights,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_sum_to_one() {
        let weights = ConfidenceWeights::default();
        assert!((weights.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize() {
        let mut weights = ConfidenceWeights {
            self_confidence: 2.0,
            method_prior: 1.0,
            historical_accuracy: 1.0,
            source_clarity: 0.5,
            corner_case_match: 0.5,
        };
        weights.normalize();
        assert!((weights.sum() - 1.0).abs() < 1e-9);
        assert!((weights.self_confidence - 0.4).abs() < 1e-9);
    }
}
