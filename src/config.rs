//! Engine Configuration
//!
//! Read from YAML; every field is optional and falls back to its default.
//!
//! ```yaml
//! enforcement: strict
//! rounding: currency
//! logging:
//!   level: debug
//!   format: json
//! ```

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::{Money, MoneyError};

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not valid configuration.
    #[error("invalid config: {0}")]
    Yaml(#[from] serde_norway::Error),
}

/// How budgets are enforced when a quoted discount is committed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum BudgetEnforcement {
    /// Accept the commit even if a concurrent commit already used the budget.
    Soft,

    /// Re-check budgets under the writer lock and refuse overruns.
    #[default]
    Strict,
}

/// Rounding applied to quoted amounts.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Rounding {
    /// Keep full decimal precision.
    None,

    /// Round to the currency's minor unit, midpoints away from zero.
    #[default]
    Currency,
}

/// Log output format.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Compact, human-readable logs.
    #[default]
    Compact,

    /// Structured JSON logs.
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,

    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

/// Engine settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Budget enforcement at commit.
    pub enforcement: BudgetEnforcement,

    /// Rounding of quoted amounts.
    pub rounding: Rounding,

    /// Logging.
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Parse a YAML document. An empty document yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] for malformed YAML or unknown keys.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        Ok(serde_norway::from_str(yaml)?)
    }

    /// Read and parse a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if it does not parse.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;

        Self::from_yaml_str(&contents)
    }

    /// Apply the configured rounding to an amount.
    #[must_use]
    pub fn round(&self, amount: Money) -> Money {
        match self.rounding {
            Rounding::None => amount,
            Rounding::Currency => amount.round_to_currency(),
        }
    }

    /// Round a discount without letting it pass `ceiling`, the most its rule
    /// can grant on the line. Amounts that would round up past the ceiling
    /// are truncated instead.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::CurrencyMismatch`] if `ceiling` is in another
    /// currency.
    pub fn round_discount(&self, amount: Money, ceiling: Money) -> Result<Money, MoneyError> {
        if self.rounding == Rounding::None {
            return Ok(amount);
        }

        let rounded = amount.round_to_currency();

        if rounded.compare(&ceiling)?.is_gt() {
            return Ok(amount.truncate_to_currency());
        }

        Ok(rounded)
    }

    /// Whether commits must re-check budgets.
    pub const fn is_strict(&self) -> bool {
        matches!(self.enforcement, BudgetEnforcement::Strict)
    }
}
