//! Configuration file handling.
//!
//! The file passed with `--config` has two optional sections:
//!
//! | Section | Type | Purpose |
//! |---------|------|---------|
//! | `[tester]` | `TesterConfig` | Batch sizes, logging limits, randomness |
//! | `[store]` | `DatabaseConfig` | Backoff, retry limit, size limits of the in-memory store |

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use stacktester_concurrency::DatabaseConfig;
use stacktester_executor::TesterConfig;

/// Contents of a configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Interpreter settings
    #[serde(default)]
    pub tester: TesterConfig,
    /// In-memory store settings
    #[serde(default)]
    pub store: DatabaseConfig,
}

impl Settings {
    /// Parse and validate a configuration document.
    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content).context("malformed configuration")?;
        settings.tester.validate()?;
        Ok(settings)
    }

    /// Read the configuration file at `path`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("invalid configuration {}", path.display()))
    }

    /// Settings from `path` if given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Settings::default()),
        }
    }
}
