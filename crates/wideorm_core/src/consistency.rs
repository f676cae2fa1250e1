//! Consistency level resolution.

use crate::config::Config;
use std::collections::HashMap;
use wideorm_storage::ConsistencyLevel;

/// The kind of store operation a level is resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Slice, multiget or counter read.
    Read,
    /// Batch submission.
    Write,
}

/// Resolves the consistency level of every read and write.
///
/// Resolution order, first match wins:
///
/// 1. the per-call override
/// 2. the level configured for the column family
/// 3. the configured default for the operation kind
///
/// Built once at startup and shared read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyPolicy {
    default_read: ConsistencyLevel,
    default_write: ConsistencyLevel,
    read_levels: HashMap<String, ConsistencyLevel>,
    write_levels: HashMap<String, ConsistencyLevel>,
}

impl Default for ConsistencyPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LEVEL, Self::DEFAULT_LEVEL)
    }
}

impl ConsistencyPolicy {
    /// Level used when nothing is configured.
    pub const DEFAULT_LEVEL: ConsistencyLevel = ConsistencyLevel::Quorum;

    /// Creates a policy with default levels and no column family overrides.
    #[must_use]
    pub fn new(default_read: ConsistencyLevel, default_write: ConsistencyLevel) -> Self {
        Self {
            default_read,
            default_write,
            read_levels: HashMap::new(),
            write_levels: HashMap::new(),
        }
    }

    /// Builds the policy described by a configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_read: config.default_read_level,
            default_write: config.default_write_level,
            read_levels: config.read_levels.clone(),
            write_levels: config.write_levels.clone(),
        }
    }

    /// Sets the read level of one column family.
    #[must_use]
    pub fn with_read_level(mut self, column_family: impl Into<String>, level: ConsistencyLevel) -> Self {
        self.read_levels.insert(column_family.into(), level);
        self
    }

    /// Sets the write level of one column family.
    #[must_use]
    pub fn with_write_level(mut self, column_family: impl Into<String>, level: ConsistencyLevel) -> Self {
        self.write_levels.insert(column_family.into(), level);
        self
    }

    /// Resolves the level for an operation. Never fails.
    #[must_use]
    pub fn resolve(
        &self,
        column_family: &str,
        kind: OperationKind,
        override_level: Option<ConsistencyLevel>,
    ) -> ConsistencyLevel {
        if let Some(level) = override_level {
            return level;
        }
        let (levels, default) = match kind {
            OperationKind::Read => (&self.read_levels, self.default_read),
            OperationKind::Write => (&self.write_levels, self.default_write),
        };
        levels.get(column_family).copied().unwrap_or(default)
    }

    /// Resolves the read level of a column family without override.
    #[must_use]
    pub fn read_level(&self, column_family: &str) -> ConsistencyLevel {
        self.resolve(column_family, OperationKind::Read, None)
    }

    /// Resolves the write level of a column family without override.
    #[must_use]
    pub fn write_level(&self, column_family: &str) -> ConsistencyLevel {
        self.resolve(column_family, OperationKind::Write, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_policy_uses_quorum() {
        let policy = ConsistencyPolicy::default();
        assert_eq!(policy.read_level("users"), ConsistencyLevel::Quorum);
        assert_eq!(policy.write_level("users"), ConsistencyLevel::Quorum);
    }

    #[test]
    fn column_family_level_beats_default() {
        let policy = ConsistencyPolicy::new(ConsistencyLevel::One, ConsistencyLevel::One)
            .with_read_level("users", ConsistencyLevel::All)
            .with_write_level("tweets", ConsistencyLevel::EachQuorum);

        assert_eq!(policy.read_level("users"), ConsistencyLevel::All);
        assert_eq!(policy.write_level("users"), ConsistencyLevel::One);
        assert_eq!(policy.write_level("tweets"), ConsistencyLevel::EachQuorum);
        assert_eq!(policy.read_level("tweets"), ConsistencyLevel::One);
    }

    #[test]
    fn override_beats_everything() {
        let policy = ConsistencyPolicy::default().with_read_level("users", ConsistencyLevel::All);
        let level = policy.resolve("users", OperationKind::Read, Some(ConsistencyLevel::Two));
        assert_eq!(level, ConsistencyLevel::Two);
    }

    #[test]
    fn policy_follows_config() {
        let config = Config::new()
            .default_read_level(ConsistencyLevel::LocalQuorum)
            .write_level("users", ConsistencyLevel::Three);
        let policy = ConsistencyPolicy::from_config(&config);

        assert_eq!(policy.read_level("anything"), ConsistencyLevel::LocalQuorum);
        assert_eq!(policy.write_level("users"), ConsistencyLevel::Three);
        assert_eq!(policy.write_level("other"), ConsistencyLevel::Quorum);
    }
}
