//! Configuration management for EduLedger

use serde::Deserialize;
use std::fs;

use crate::error::{ChainError, Result};
use crate::ledger::{DEFAULT_DIFFICULTY, DEFAULT_SEAL_REWARD};

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_difficulty")]
    pub difficulty: u32,
    #[serde(default = "default_seal_reward")]
    pub seal_reward: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            seal_reward: default_seal_reward(),
        }
    }
}

fn default_difficulty() -> u32 {
    DEFAULT_DIFFICULTY
}

fn default_seal_reward() -> u64 {
    DEFAULT_SEAL_REWARD
}

pub fn load_config() -> Result<Config> {
    let config_str = fs::read_to_string("config.toml").unwrap_or_default();
    let config: Config = if config_str.is_empty() {
        // Provide sane defaults when config.toml is absent
        Config {
            ledger: LedgerConfig::default(),
        }
    } else {
        toml::from_str(&config_str).map_err(|e| ChainError::Config(e.to_string()))?
    };

    validate(&config)?;
    Ok(config)
}

// Validate critical values
fn validate(config: &Config) -> Result<()> {
    if config.ledger.difficulty == 0 {
        return Err(ChainError::Config(
            "ledger.difficulty must be at least 1".to_string(),
        ));
    }
    if config.ledger.difficulty > 64 {
        return Err(ChainError::Config(
            "ledger.difficulty cannot exceed the 64 hex characters of a block hash".to_string(),
        ));
    }
    Ok(())
}
