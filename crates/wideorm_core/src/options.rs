//! Per-call write and read options.

use std::fmt;
use wideorm_storage::ConsistencyLevel;

/// Options attached to one entity manager call.
///
/// The consistency level overrides the policy for every read and write of
/// the call. `ttl` and `timestamp` apply to every column the call inserts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Options {
    consistency_level: Option<ConsistencyLevel>,
    ttl: Option<u32>,
    timestamp: Option<i64>,
}

impl Options {
    /// Returns the consistency override.
    #[must_use]
    pub const fn consistency_level(&self) -> Option<ConsistencyLevel> {
        self.consistency_level
    }

    /// Returns the time to live in seconds.
    #[must_use]
    pub const fn ttl(&self) -> Option<u32> {
        self.ttl
    }

    /// Returns the write timestamp in microseconds.
    #[must_use]
    pub const fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }

    /// Sets the consistency override.
    #[must_use]
    pub const fn with_consistency(mut self, level: ConsistencyLevel) -> Self {
        self.consistency_level = Some(level);
        self
    }

    /// Sets the time to live.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Sets the write timestamp.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Keeps the consistency level only.
    ///
    /// Used for cascades and child contexts, which must not inherit the
    /// parent's expiry.
    #[must_use]
    pub const fn duplicate_without_ttl_and_timestamp(&self) -> Self {
        Self {
            consistency_level: self.consistency_level,
            ttl: None,
            timestamp: None,
        }
    }
}

impl fmt::Display for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Options[")?;
        let mut sep = "";
        if let Some(level) = self.consistency_level {
            write!(f, "consistency={level}")?;
            sep = ", ";
        }
        if let Some(ttl) = self.ttl {
            write!(f, "{sep}ttl={ttl}")?;
            sep = ", ";
        }
        if let Some(timestamp) = self.timestamp {
            write!(f, "{sep}timestamp={timestamp}")?;
        }
        write!(f, "]")
    }
}

/// Entry points for building [`Options`].
#[derive(Debug, Clone, Copy)]
pub struct OptionsBuilder;

impl OptionsBuilder {
    /// Options with nothing set.
    #[must_use]
    pub const fn no_options() -> Options {
        Options {
            consistency_level: None,
            ttl: None,
            timestamp: None,
        }
    }

    /// Options with a consistency override.
    #[must_use]
    pub const fn with_consistency(level: ConsistencyLevel) -> Options {
        Self::no_options().with_consistency(level)
    }

    /// Options with a time to live.
    #[must_use]
    pub const fn with_ttl(ttl: u32) -> Options {
        Self::no_options().with_ttl(ttl)
    }

    /// Options with a write timestamp.
    #[must_use]
    pub const fn with_timestamp(timestamp: i64) -> Options {
        Self::no_options().with_timestamp(timestamp)
    }
}
