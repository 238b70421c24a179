//! Interpreter configuration.
//!
//! Read from the `[tester]` section of the configuration file passed with
//! `--config`. Every field has a default, so an absent section runs the
//! tester exactly like the reference clients.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Highest client API version the interpreter speaks.
pub const MAX_API_VERSION: u32 = 510;

/// Rejected configuration values
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A batch size of zero
    #[error("{field} must be at least 1")]
    ZeroBatch {
        /// Offending field
        field: &'static str,
    },

    /// Probability outside `[0, 1]`
    #[error("versionstamp_skip_probability must be within [0, 1], got {0}")]
    Probability(f64),

    /// API version this build does not speak
    #[error("API version {requested} is not supported (maximum {MAX_API_VERSION})")]
    ApiVersion {
        /// Requested version
        requested: u32,
    },

    /// Malformed TOML
    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

/// Interpreter settings.
///
/// # Example
///
/// ```toml
/// [tester]
/// instruction_batch_size = 1000
/// log_stack_batch_size = 100
/// max_logged_value_bytes = 40000
/// versionstamp_skip_probability = 0.5
/// # seed = 42
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TesterConfig {
    /// Instructions fetched per page by the driver (default: 1000)
    #[serde(default = "default_instruction_batch_size")]
    pub instruction_batch_size: usize,

    /// Stack entries written per LOG_STACK commit (default: 100)
    #[serde(default = "default_log_stack_batch_size")]
    pub log_stack_batch_size: usize,

    /// Longest value LOG_STACK writes; longer ones are truncated (default: 40000)
    #[serde(default = "default_max_logged_value_bytes")]
    pub max_logged_value_bytes: usize,

    /// Chance that TUPLE_PACK_WITH_VERSIONSTAMP reports `ERROR: NONE` for a
    /// tuple without a placeholder before trying to pack it (default: 0.5)
    #[serde(default = "default_versionstamp_skip_probability")]
    pub versionstamp_skip_probability: f64,

    /// Seed for the per-context random source; absent means entropy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Client API version (default: 510)
    #[serde(default = "default_api_version")]
    pub api_version: u32,
}

fn default_instruction_batch_size() -> usize {
    1000
}

fn default_log_stack_batch_size() -> usize {
    100
}

fn default_max_logged_value_bytes() -> usize {
    40_000
}

fn default_versionstamp_skip_probability() -> f64 {
    0.5
}

fn default_api_version() -> u32 {
    MAX_API_VERSION
}

impl Default for TesterConfig {
    fn default() -> Self {
        Self {
            instruction_batch_size: default_instruction_batch_size(),
            log_stack_batch_size: default_log_stack_batch_size(),
            max_logged_value_bytes: default_max_logged_value_bytes(),
            versionstamp_skip_probability: default_versionstamp_skip_probability(),
            seed: None,
            api_version: default_api_version(),
        }
    }
}

impl TesterConfig {
    /// Check every field is in range.
    ///
    /// # Errors
    ///
    /// Returns the first rejected field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instruction_batch_size == 0 {
            return Err(ConfigError::ZeroBatch {
                field: "instruction_batch_size",
            });
        }
        if self.log_stack_batch_size == 0 {
            return Err(ConfigError::ZeroBatch {
                field: "log_stack_batch_size",
            });
        }
        if !(0.0..=1.0).contains(&self.versionstamp_skip_probability) {
            return Err(ConfigError::Probability(self.versionstamp_skip_probability));
        }
        if self.api_version == 0 || self.api_version > MAX_API_VERSION {
            return Err(ConfigError::ApiVersion {
                requested: self.api_version,
            });
        }
        Ok(())
    }

    /// Parse the `[tester]` table body and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and the errors of
    /// [`TesterConfig::validate`].
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: TesterConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the default `[tester]` section with comments.
    pub fn default_toml() -> &'static str {
        r#"[tester]
# Instructions fetched per page by each context (default: 1000)
instruction_batch_size = 1000

# Stack entries written per LOG_STACK commit (default: 100)
log_stack_batch_size = 100

# Longest value LOG_STACK writes; longer values are truncated (default: 40000)
max_logged_value_bytes = 40000

# Chance that TUPLE_PACK_WITH_VERSIONSTAMP answers ERROR: NONE for a tuple
# without a placeholder before trying to pack it (default: 0.5)
versionstamp_skip_probability = 0.5

# Seed for the random source of every context; unset means entropy
# seed = 42
"#
    }
}
