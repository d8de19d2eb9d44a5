//! JSON configuration for a manager's strategies.
//!
//! ```json
//! {
//!   "default_strategy": {
//!     "wait_time": 100, "wait_unit": "milliseconds",
//!     "retries": 3, "retry_interval": 50, "retry_unit": "milliseconds",
//!     "lease_time": 1, "lease_unit": "seconds"
//!   },
//!   "strategies": {
//!     "orders": { ... }
//!   }
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::strategy::{MutexStrategy, StrategyError, StrategySpec};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read mutex config: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse mutex config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid strategy '{name}': {source}")]
    InvalidStrategy {
        name: String,
        #[source]
        source: StrategyError,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManagerConfig {
    #[serde(default)]
    pub default_strategy: Option<StrategySpec>,
    #[serde(default)]
    pub strategies: BTreeMap<String, StrategySpec>,
}

/// Validated form of a [`ManagerConfig`].
#[derive(Debug, Clone, Default)]
pub(crate) struct ResolvedConfig {
    pub default_strategy: Option<MutexStrategy>,
    pub strategies: HashMap<String, MutexStrategy>,
}

impl ManagerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub(crate) fn resolve(&self) -> Result<ResolvedConfig, ConfigError> {
        let default_strategy = self
            .default_strategy
            .as_ref()
            .map(|spec| convert("default", spec))
            .transpose()?;
        let strategies = self
            .strategies
            .iter()
            .map(|(name, spec)| convert(name, spec).map(|strategy| (name.clone(), strategy)))
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(ResolvedConfig {
            default_strategy,
            strategies,
        })
    }
}

fn convert(name: &str, spec: &StrategySpec) -> Result<MutexStrategy, ConfigError> {
    MutexStrategy::try_from(spec).map_err(|source| ConfigError::InvalidStrategy {
        name: name.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const CONFIG: &str = r#"{
        "default_strategy": {
            "wait_time": 100, "wait_unit": "milliseconds",
            "retries": 3, "retry_interval": 50, "retry_unit": "milliseconds",
            "lease_time": 1, "lease_unit": "seconds"
        },
        "strategies": {
            "fail-fast": {
                "wait_time": 0, "wait_unit": "seconds",
                "retries": 0, "retry_interval": 0, "retry_unit": "seconds",
                "lease_time": 0, "lease_unit": "seconds"
            }
        }
    }"#;

    #[test]
    fn parses_and_resolves() {
        let config = ManagerConfig::from_json_str(CONFIG).unwrap();
        let resolved = config.resolve().unwrap();

        let default = resolved.default_strategy.unwrap();
        assert_eq!(default.wait_time(), Some(Duration::from_millis(100)));
        assert_eq!(default.max_attempts(), 4);
        assert_eq!(default.lease_time(), Some(Duration::from_secs(1)));

        let fail_fast = &resolved.strategies["fail-fast"];
        assert_eq!(fail_fast.wait_time(), Some(Duration::ZERO));
        assert_eq!(fail_fast.lease_time(), None);
    }

    #[test]
    fn empty_object_is_default() {
        let config = ManagerConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ManagerConfig::default());
        let resolved = config.resolve().unwrap();
        assert!(resolved.default_strategy.is_none());
        assert!(resolved.strategies.is_empty());
    }

    #[test]
    fn invalid_strategy_names_the_entry() {
        let json = r#"{ "strategies": { "broken": {
            "wait_time": 0, "wait_unit": "seconds",
            "retries": -2, "retry_interval": 0, "retry_unit": "seconds",
            "lease_time": 0, "lease_unit": "seconds"
        } } }"#;
        let err = ManagerConfig::from_json_str(json).unwrap().resolve().unwrap_err();
        match err {
            ConfigError::InvalidStrategy { name, source } => {
                assert_eq!(name, "broken");
                assert_eq!(source, StrategyError::NegativeRetries(-2));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let err = ManagerConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn unknown_field_rejected() {
        let err = ManagerConfig::from_json_str(r#"{ "strategy": {} }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = ManagerConfig::from_path("/nonexistent/mutex-config.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
