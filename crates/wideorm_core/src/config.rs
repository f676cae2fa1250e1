//! Runtime configuration.

use crate::consistency::ConsistencyPolicy;
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use wideorm_storage::ConsistencyLevel;

/// When pending mutations reach the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushStrategy {
    /// Every flush submits pending mutations right away.
    #[default]
    Immediate,
    /// Flushes are deferred until the batch is committed.
    Batch,
}

/// Configuration for an entity manager factory.
///
/// Can be read from JSON:
///
/// ```
/// use wideorm_core::{Config, FlushStrategy};
/// use wideorm_storage::ConsistencyLevel;
///
/// let config = Config::from_json(r#"{
///     "default_read_level": "ONE",
///     "write_levels": { "users": "ALL" },
///     "flush_strategy": "batch"
/// }"#).unwrap();
/// assert_eq!(config.default_read_level, ConsistencyLevel::One);
/// assert_eq!(config.flush_strategy, FlushStrategy::Batch);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Read level when neither the call nor the column family sets one.
    pub default_read_level: ConsistencyLevel,

    /// Write level when neither the call nor the column family sets one.
    pub default_write_level: ConsistencyLevel,

    /// Read levels per column family.
    pub read_levels: HashMap<String, ConsistencyLevel>,

    /// Write levels per column family.
    pub write_levels: HashMap<String, ConsistencyLevel>,

    /// Strategy entity managers start with.
    pub flush_strategy: FlushStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_read_level: ConsistencyPolicy::DEFAULT_LEVEL,
            default_write_level: ConsistencyPolicy::DEFAULT_LEVEL,
            read_levels: HashMap::new(),
            write_levels: HashMap::new(),
            flush_strategy: FlushStrategy::Immediate,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the document is malformed.
    pub fn from_json(json: &str) -> CoreResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| CoreError::configuration(format!("invalid configuration: {e}")))
    }

    /// Sets the default read level.
    #[must_use]
    pub fn default_read_level(mut self, level: ConsistencyLevel) -> Self {
        self.default_read_level = level;
        self
    }

    /// Sets the default write level.
    #[must_use]
    pub fn default_write_level(mut self, level: ConsistencyLevel) -> Self {
        self.default_write_level = level;
        self
    }

    /// Sets the read level of one column family.
    #[must_use]
    pub fn read_level(mut self, column_family: impl Into<String>, level: ConsistencyLevel) -> Self {
        self.read_levels.insert(column_family.into(), level);
        self
    }

    /// Sets the write level of one column family.
    #[must_use]
    pub fn write_level(mut self, column_family: impl Into<String>, level: ConsistencyLevel) -> Self {
        self.write_levels.insert(column_family.into(), level);
        self
    }

    /// Sets the flush strategy.
    #[must_use]
    pub fn flush_strategy(mut self, strategy: FlushStrategy) -> Self {
        self.flush_strategy = strategy;
        self
    }
}

/// Immutable runtime configuration shared by every context.
#[derive(Debug)]
pub struct ConfigurationContext {
    config: Config,
    policy: Arc<ConsistencyPolicy>,
}

impl ConfigurationContext {
    /// Creates the context and the consistency policy it carries.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let policy = Arc::new(ConsistencyPolicy::from_config(&config));
        Self { config, policy }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the shared consistency policy.
    #[must_use]
    pub fn consistency_policy(&self) -> &Arc<ConsistencyPolicy> {
        &self.policy
    }

    /// Returns the configured flush strategy.
    #[must_use]
    pub fn flush_strategy(&self) -> FlushStrategy {
        self.config.flush_strategy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.default_read_level, ConsistencyLevel::Quorum);
        assert_eq!(config.default_write_level, ConsistencyLevel::Quorum);
        assert_eq!(config.flush_strategy, FlushStrategy::Immediate);
        assert!(config.read_levels.is_empty());
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .default_write_level(ConsistencyLevel::All)
            .read_level("users", ConsistencyLevel::One)
            .flush_strategy(FlushStrategy::Batch);

        assert_eq!(config.default_write_level, ConsistencyLevel::All);
        assert_eq!(config.read_levels.get("users"), Some(&ConsistencyLevel::One));
        assert_eq!(config.flush_strategy, FlushStrategy::Batch);
    }

    #[test]
    fn empty_json_is_default() {
        assert_eq!(Config::from_json("{}").unwrap(), Config::default());
    }

    #[test]
    fn malformed_json_is_a_configuration_error() {
        let err = Config::from_json(r#"{"default_read_level": "SOME"}"#).unwrap_err();
        assert!(matches!(err, CoreError::Configuration { .. }));
    }

    #[test]
    fn context_carries_policy() {
        let ctx = ConfigurationContext::new(Config::new().default_read_level(ConsistencyLevel::Two));
        assert_eq!(ctx.consistency_policy().read_level("x"), ConsistencyLevel::Two);
        assert_eq!(ctx.flush_strategy(), FlushStrategy::Immediate);
    }
}
