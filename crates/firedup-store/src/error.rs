//! Error types for persistence and session bootstrap

use firedup_catalog::CatalogError;

/// Durable storage errors
///
/// Never fatal to a running session: the in-memory ledger stays valid and
/// the next flush carries the latest snapshot.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Filesystem failure
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Payload has no envelope and matches no layout this build can upgrade
    #[error("unrecognized stored layout: {0}")]
    UnrecognizedLayout(String),

    /// Payload was written by a newer schema
    #[error("unsupported schema version {found} (supported up to {supported})")]
    UnsupportedSchema {
        /// Version found in the stored envelope
        found: u32,
        /// Newest version this build understands
        supported: u32,
    },

    /// Store-specific failure
    #[error("storage backend error: {0}")]
    Backend(String),

    /// The flush worker is gone
    #[error("flush worker has shut down")]
    WorkerClosed,
}

impl PersistenceError {
    /// Transient failures worth another attempt
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Backend(_))
    }

    /// The stored bytes were read but cannot be turned into a value
    #[inline]
    #[must_use]
    pub fn is_unreadable_payload(&self) -> bool {
        matches!(self, Self::Serialization(_) | Self::UnrecognizedLayout(_))
    }
}

/// Invalid engine configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML could not be parsed
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config could not be rendered as TOML
    #[error("config serialization failed: {0}")]
    Render(#[from] toml::ser::Error),

    /// A value is out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Session bootstrap errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Catalog failed to build; the engine cannot start
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Stored state could not be read
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Configuration was rejected
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(PersistenceError::Backend("disk full".into()).is_retryable());
        assert!(PersistenceError::Io(std::io::Error::other("boom")).is_retryable());
        assert!(!PersistenceError::UnsupportedSchema {
            found: 9,
            supported: 1
        }
        .is_retryable());
        assert!(!PersistenceError::WorkerClosed.is_retryable());
        assert!(!PersistenceError::UnrecognizedLayout("x".into()).is_retryable());
    }

    #[test]
    fn unreadable_payloads_are_classified() {
        assert!(PersistenceError::UnrecognizedLayout("bare object".into()).is_unreadable_payload());
        assert!(!PersistenceError::Backend("offline".into()).is_unreadable_payload());
        assert!(!PersistenceError::UnsupportedSchema {
            found: 2,
            supported: 1
        }
        .is_unreadable_payload());
    }
}
