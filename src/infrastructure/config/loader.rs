use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Model tier ladder cannot be empty")]
    EmptyTierLadder,

    #[error("Invalid max_iterations: {0}. Must be at least 1")]
    InvalidMaxIterations(u32),

    #[error("Invalid threshold {name}: {value}. Must be within (0, 1)")]
    InvalidThreshold { name: &'static str, value: f64 },

    #[error("Confidence weights sum to {0}; expected a positive sum")]
    InvalidWeights(f64),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .anyextract/config.yaml (project config, created by init)
    /// 3. .anyextract/local.yaml (project local overrides, optional)
    /// 4. Environment variables (ANYEXTRACT_* prefix, highest priority)
    ///
    /// Configuration is always project-local (pwd/.anyextract/) so multiple
    /// extraction projects can coexist on one machine.
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".anyextract/config.yaml"))
            .merge(Yaml::file(".anyextract/local.yaml"))
            .merge(Env::prefixed("ANYEXTRACT_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.model.tiers.is_empty() {
            return Err(ConfigError::EmptyTierLadder);
        }
        if config.model.judge_model.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "judge_model cannot be empty".to_string(),
            ));
        }

        if config.engine.max_iterations == 0 {
            return Err(ConfigError::InvalidMaxIterations(config.engine.max_iterations));
        }
        for (name, value) in [
            ("systemic_threshold", config.engine.systemic_threshold),
            ("quality_threshold", config.engine.quality_threshold),
            ("incorrect_threshold", config.engine.incorrect_threshold),
            ("accuracy_bar", config.engine.accuracy_bar),
            ("low_confidence_threshold", config.engine.low_confidence_threshold),
            ("field_confidence_floor", config.engine.field_confidence_floor),
        ] {
            if !(0.0..1.0).contains(&value) || value == 0.0 {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }
        if config.engine.min_judgments == 0 {
            return Err(ConfigError::ValidationFailed(
                "min_judgments must be at least 1".to_string(),
            ));
        }
        if config.engine.min_observations == 0 {
            return Err(ConfigError::ValidationFailed(
                "min_observations must be at least 1".to_string(),
            ));
        }

        let weight_sum = config.confidence_weights.sum();
        if weight_sum <= f64::EPSILON {
            return Err(ConfigError::InvalidWeights(weight_sum));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database.path, ".anyextract/anyextract.db");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.engine.max_iterations, 20);
        assert_eq!(config.model.tiers.len(), 4);
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
database:
  path: /custom/path.db
  max_connections: 5
engine:
  max_iterations: 8
  systemic_threshold: 0.2
  min_judgments: 3
  quality_threshold: 0.8
  incorrect_threshold: 0.1
  accuracy_bar: 0.9
  min_observations: 10
  low_confidence_threshold: 0.6
  field_confidence_floor: 0.5
logging:
  level: debug
  format: pretty
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.database.path, "/custom/path.db");
        assert_eq!(config.engine.max_iterations, 8);
        assert!((config.engine.systemic_threshold - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.logging.level, "debug");

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_empty_database_path() {
        let mut config = Config::default();
        config.database.path = String::new();

        let result = ConfigLoader::validate(&config);
        assert!(matches!(result.unwrap_err(), ConfigError::EmptyDatabasePath));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "invalid"),
            other => panic!("Expected InvalidLogLevel, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_empty_tier_ladder() {
        let mut config = Config::default();
        config.model.tiers.clear();

        let result = ConfigLoader::validate(&config);
        assert!(matches!(result.unwrap_err(), ConfigError::EmptyTierLadder));
    }

    #[test]
    fn test_validate_zero_max_iterations() {
        let mut config = Config::default();
        config.engine.max_iterations = 0;

        let result = ConfigLoader::validate(&config);
        assert!(matches!(result.unwrap_err(), ConfigError::InvalidMaxIterations(0)));
    }

    #[test]
    fn test_validate_out_of_range_threshold() {
        let mut config = Config::default();
        config.engine.systemic_threshold = 1.5;

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidThreshold { name, .. } => assert_eq!(name, "systemic_threshold"),
            other => panic!("Expected InvalidThreshold, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_zero_weights() {
        let mut config = Config::default();
        config.confidence_weights.self_confidence = 0.0;
        config.confidence_weights.method_prior = 0.0;
        config.confidence_weights.historical_accuracy = 0.0;
        config.confidence_weights.source_clarity = 0.0;
        config.confidence_weights.corner_case_match = 0.0;

        let result = ConfigLoader::validate(&config);
        assert!(matches!(result.unwrap_err(), ConfigError::InvalidWeights(_)));
    }

    #[test]
    fn test_env_override_naming() {
        env::set_var("ANYEXTRACT_ENGINE__MAX_ITERATIONS", "5");
        env::set_var("ANYEXTRACT_LOGGING__LEVEL", "debug");

        assert_eq!(env::var("ANYEXTRACT_ENGINE__MAX_ITERATIONS").unwrap(), "5");
        assert_eq!(env::var("ANYEXTRACT_LOGGING__LEVEL").unwrap(), "debug");

        env::remove_var("ANYEXTRACT_ENGINE__MAX_ITERATIONS");
        env::remove_var("ANYEXTRACT_LOGGING__LEVEL");
    }

    #[test]
    fn test_hierarchical_merging() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(
            base_file,
            "engine:\n  max_iterations: 5\nlogging:\n  level: info\n  format: json"
        )
        .unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(override_file, "engine:\n  max_iterations: 15\nlogging:\n  level: debug").unwrap();
        override_file.flush().unwrap();

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.engine.max_iterations, 15, "Override should win");
        assert_eq!(config.logging.level, "debug", "Override should win for nested fields");
        assert_eq!(config.logging.format, "json", "Base value should persist when not overridden");
    }
}
