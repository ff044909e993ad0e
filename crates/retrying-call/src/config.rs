//! Backoff configuration
//!
//! Backoff settings can be read from YAML so deployments tune retries without
//! a rebuild. Every field has a default, and named operations fall back to the
//! `default` entry:
//!
//! ```yaml
//! default:
//!   max-attempts: 10
//!   max-delay-secs: 120.0
//!   immediate: true
//!   initial-delay-secs: 0.01
//!   growth:
//!     kind: multiply
//!     factor: 2.0
//! operations:
//!   download:
//!     max-attempts: 3
//!     immediate: false
//!     initial-delay-secs: 1.0
//! ```

use std::collections::HashMap;
use std::fs;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::backoff::{self, Add, Constant, Multiply, SimpleBackoff};
use crate::error::ConfigError;

/// Settings for one `SimpleBackoff`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BackoffConfig {
    /// Total number of delays (and so attempts) the generator allows
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Ceiling for a single delay, in seconds
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: f64,

    /// Make the first attempt without waiting
    #[serde(default = "default_immediate")]
    pub immediate: bool,

    /// First non-immediate delay, in seconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: f64,

    /// How each delay is derived from the previous one
    #[serde(default)]
    pub growth: GrowthConfig,

    /// Add up to 25% random extra delay
    #[serde(default)]
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            max_delay_secs: default_max_delay(),
            immediate: default_immediate(),
            initial_delay_secs: default_initial_delay(),
            growth: GrowthConfig::default(),
            jitter: false,
        }
    }
}

fn default_max_attempts() -> u32 {
    backoff::DEFAULT_MAX_ATTEMPTS
}
fn default_max_delay() -> f64 {
    backoff::DEFAULT_MAX_DELAY.as_secs_f64()
}
fn default_immediate() -> bool {
    true
}
fn default_initial_delay() -> f64 {
    backoff::DEFAULT_INITIAL_DELAY.as_secs_f64()
}

impl BackoffConfig {
    /// Check every field without building anything
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        backoff::secs("max-delay-secs", self.max_delay_secs)?;
        backoff::secs("initial-delay-secs", self.initial_delay_secs)?;
        self.growth.validate()
    }

    /// Build a generator from these settings
    pub fn build(&self) -> Result<SimpleBackoff, ConfigError> {
        self.validate()?;

        let builder = SimpleBackoff::builder()
            .with_max_attempts(self.max_attempts)
            .with_max_delay(backoff::secs("max-delay-secs", self.max_delay_secs)?)
            .with_immediate(self.immediate)
            .with_initial_delay(backoff::secs(
                "initial-delay-secs",
                self.initial_delay_secs,
            )?)
            .with_jitter(self.jitter);

        let builder = match self.growth {
            GrowthConfig::Multiply { factor } => builder.with_growth(Multiply(factor)),
            GrowthConfig::Add { secs } => {
                builder.with_growth(Add(backoff::secs("growth.secs", secs)?))
            }
            GrowthConfig::Constant { secs } => {
                builder.with_growth(Constant(backoff::secs("growth.secs", secs)?))
            }
        };

        builder.build()
    }
}

/// Growth rule settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum GrowthConfig {
    /// Multiply the previous delay by `factor`
    Multiply { factor: f64 },
    /// Add `secs` to the previous delay
    Add { secs: f64 },
    /// Use `secs` for every delay after the first
    Constant { secs: f64 },
}

impl Default for GrowthConfig {
    fn default() -> Self {
        GrowthConfig::Multiply {
            factor: backoff::DEFAULT_FACTOR,
        }
    }
}

impl GrowthConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            GrowthConfig::Multiply { factor } if !factor.is_finite() || factor < 0.0 => {
                Err(ConfigError::InvalidFactor(factor))
            }
            GrowthConfig::Multiply { .. } => Ok(()),
            GrowthConfig::Add { secs } | GrowthConfig::Constant { secs } => {
                backoff::secs("growth.secs", secs).map(|_| ())
            }
        }
    }
}

/// Backoff settings for a whole application
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Settings used by any operation without its own entry
    #[serde(default)]
    pub default: BackoffConfig,

    /// Per-operation settings
    #[serde(default)]
    pub operations: HashMap<String, BackoffConfig>,
}

impl RetryConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: RetryConfig = serde_yaml_ng::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load, parse and validate a YAML file
    pub fn from_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_string(),
            });
        }
        let content = fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&content)?;
        tracing::debug!(
            path = %path,
            operations = config.operations.len(),
            "loaded retry configuration"
        );
        Ok(config)
    }

    /// Validate the default and every per-operation entry
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.default.validate()?;
        self.operations.values().try_for_each(BackoffConfig::validate)
    }

    /// Settings for `operation`, falling back to the default entry
    pub fn policy_for(&self, operation: &str) -> &BackoffConfig {
        self.operations.get(operation).unwrap_or(&self.default)
    }

    /// A fresh generator for `operation`
    pub fn backoff_for(&self, operation: &str) -> Result<SimpleBackoff, ConfigError> {
        self.policy_for(operation).build()
    }
}
