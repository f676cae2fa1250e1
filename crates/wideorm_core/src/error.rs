//! Error types for wideorm core.

use thiserror::Error;
use wideorm_codec::CodecError;
use wideorm_storage::StorageError;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in wideorm core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Codec error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Metadata or registry is inconsistent.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the problem.
        message: String,
    },

    /// A precondition on an entity or a proxy did not hold.
    #[error("validation error: {message}")]
    Validation {
        /// Description of the violated precondition.
        message: String,
    },

    /// A flush failed part way through.
    ///
    /// Batches for `flushed` were already applied and are not rolled back.
    /// Batches for `skipped` were dropped unsent.
    #[error("flush failed on column family {column_family} after applying {flushed:?}, skipping {skipped:?}: {source}")]
    PartialFlush {
        /// Column family whose batch failed.
        column_family: String,
        /// Column families whose batches were applied before the failure.
        flushed: Vec<String>,
        /// Column families whose batches were dropped after the failure.
        skipped: Vec<String>,
        /// The store failure.
        source: StorageError,
    },

    /// A stored value could not be decoded for a property.
    #[error("cannot decode property '{property}' from '{raw}': {source}")]
    Decode {
        /// Property name.
        property: String,
        /// Stored raw text.
        raw: String,
        /// The transcoder failure.
        source: CodecError,
    },

    /// An operation was attempted in the wrong lifecycle state.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the state problem.
        message: String,
    },

    /// No row exists for the key.
    #[error("entity {class_name} not found for key {key}")]
    EntityNotFound {
        /// Entity class.
        class_name: String,
        /// Primary key, displayed.
        key: String,
    },

    /// The entity has no such mapped property.
    #[error("unknown property '{property}' on {class_name}")]
    UnknownProperty {
        /// Entity class.
        class_name: String,
        /// Property name.
        property: String,
    },
}

impl CoreError {
    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        CoreError::Configuration {
            message: message.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation {
            message: message.into(),
        }
    }

    /// Creates an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        CoreError::InvalidState {
            message: message.into(),
        }
    }

    /// Creates an unknown property error.
    pub fn unknown_property(class_name: impl Into<String>, property: impl Into<String>) -> Self {
        CoreError::UnknownProperty {
            class_name: class_name.into(),
            property: property.into(),
        }
    }

    /// Creates a decode error for a property.
    pub fn decode(property: impl Into<String>, raw: impl Into<String>, source: CodecError) -> Self {
        CoreError::Decode {
            property: property.into(),
            raw: raw.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_flush_names_the_failing_family() {
        let err = CoreError::PartialFlush {
            column_family: "tweets".into(),
            flushed: vec!["users".into()],
            skipped: vec!["wideorm_counter".into()],
            source: StorageError::Unavailable("2 replicas down".into()),
        };
        let text = err.to_string();
        assert!(text.contains("tweets"));
        assert!(text.contains("users"));
        assert!(text.contains("wideorm_counter"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn storage_errors_convert() {
        let err: CoreError = StorageError::Closed.into();
        assert!(matches!(err, CoreError::Storage(StorageError::Closed)));
    }
}
