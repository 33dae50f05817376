//! Ledger configuration
//!
//! Values come from a JSON file; any field left out falls back to its default.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming a JSON config file
pub const CONFIG_ENV_VAR: &str = "LEDGER_CONFIG";

/// A hex SHA-256 digest has 64 characters, so no hash can have more leading zeros
pub const MAX_DIFFICULTY: usize = 64;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Number of leading zero hex characters a block hash needs
    #[serde(default = "default_difficulty")]
    pub difficulty: usize,

    /// Amount minted to the miner of each block
    #[serde(default = "default_mining_reward")]
    pub mining_reward: f64,

    /// Directory for sled block storage; in-memory only when absent
    #[serde(default)]
    pub storage_path: Option<PathBuf>,
}

fn default_difficulty() -> usize {
    2
}

fn default_mining_reward() -> f64 {
    100.0
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            mining_reward: default_mining_reward(),
            storage_path: None,
        }
    }
}

impl LedgerConfig {
    /// Loads and validates a config file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_json(&contents)
    }

    /// Parses and validates a JSON config document
    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let config: LedgerConfig = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the file named by `LEDGER_CONFIG`, or the defaults if it is unset
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(ConfigError::Invalid(format!(
                "difficulty must be at most {}, got {}",
                MAX_DIFFICULTY, self.difficulty
            )));
        }

        if !self.mining_reward.is_finite() || self.mining_reward < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "mining_reward must be a non-negative number, got {}",
                self.mining_reward
            )));
        }

        Ok(())
    }
}
