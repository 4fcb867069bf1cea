//! Serializable trigger configuration.
//!
//! A config file names the engine with a `type` key and carries the shared
//! contract parameters in a `[contract]` table:
//!
//! ```toml
//! type = "fixed"
//! win_ratio = 0.1
//! lose_ratio = 0.03
//!
//! [contract]
//! side = "long"
//! leverage = 20.0
//! fee_rate = 0.0003
//! slippage = 0.0005
//! quant_step = 0.001
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::domain::Side;

/// Errors from loading a trigger config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Contract parameters shared by both engines.
///
/// Inputs are trusted: negative leverage or a ratio above 1 produce
/// out-of-range prices, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContractParams {
    pub side: Side,
    /// Leverage multiplier (e.g., 20.0)
    pub leverage: f64,
    /// Fee fraction charged on entry and exit (e.g., 0.0003)
    pub fee_rate: f64,
    /// Offset between a trigger price and its order price (0 = none)
    #[serde(default)]
    pub slippage: f64,
    /// Minimal price increment; reported prices are truncated to it
    pub quant_step: f64,
}

/// Take-profit + stop-loss pair anchored to the cost basis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedTriggerConfig {
    pub contract: ContractParams,
    /// Target leveraged return for the take-profit (e.g., 0.1 = 10%)
    pub win_ratio: f64,
    /// Tolerated leveraged loss for the stop (e.g., 0.03 = 3%)
    pub lose_ratio: f64,
}

/// Single trailing stop anchored to the market price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovingTriggerConfig {
    pub contract: ContractParams,
    /// Leveraged distance between the market and the stop
    pub stop_ratio: f64,
}

/// Either engine's configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerConfig {
    Fixed(FixedTriggerConfig),
    Moving(MovingTriggerConfig),
}

impl TriggerConfig {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn contract(&self) -> &ContractParams {
        match self {
            TriggerConfig::Fixed(c) => &c.contract,
            TriggerConfig::Moving(c) => &c.contract,
        }
    }

    /// Engine kind as written in the `type` key.
    pub fn kind(&self) -> &'static str {
        match self {
            TriggerConfig::Fixed(_) => "fixed",
            TriggerConfig::Moving(_) => "moving",
        }
    }

    /// Deterministic content hash of this configuration.
    ///
    /// Two engines built from identical configs share the same id, which
    /// labels their log spans and replay output.
    pub fn config_id(&self) -> String {
        let json = serde_json::to_string(self).expect("TriggerConfig serialization failed");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}
