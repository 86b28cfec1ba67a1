//! Engine configuration
//!
//! Loaded from TOML or built in code:
//!
//! ```toml
//! ledger_key = "tree-storage"
//! session_key = "auth-storage"
//! flush_retry_attempts = 3
//! flush_retry_backoff_ms = 50
//! journal_capacity = 1024
//! data_dir = "/var/lib/firedup"
//! ```

use crate::error::ConfigError;
use crate::worker::RetryPolicy;
use firedup_ledger::DEFAULT_JOURNAL_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Storage key for the ledger payload
pub const DEFAULT_LEDGER_KEY: &str = "tree-storage";
/// Storage key for the session record
pub const DEFAULT_SESSION_KEY: &str = "auth-storage";

/// Persistence and session settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Key the ledger is stored under
    pub ledger_key: String,
    /// Key the session record is stored under
    pub session_key: String,
    /// Attempts per flush before reporting failure
    pub flush_retry_attempts: u32,
    /// Base backoff between flush attempts, in milliseconds
    pub flush_retry_backoff_ms: u64,
    /// Journal entries kept in memory; older ones are dropped
    pub journal_capacity: usize,
    /// Directory for the file-backed store; in-memory when unset
    pub data_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ledger_key: DEFAULT_LEDGER_KEY.to_string(),
            session_key: DEFAULT_SESSION_KEY.to_string(),
            flush_retry_attempts: 3,
            flush_retry_backoff_ms: 50,
            journal_capacity: DEFAULT_JOURNAL_CAPACITY,
            data_dir: None,
        }
    }
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    /// - `ConfigError::Parse` / `ConfigError::Invalid`
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML
    ///
    /// # Errors
    /// - `ConfigError::Render`
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    /// With file-backed storage under `dir`
    #[inline]
    #[must_use]
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// With storage keys
    #[inline]
    #[must_use]
    pub fn with_keys(mut self, ledger_key: impl Into<String>, session_key: impl Into<String>) -> Self {
        self.ledger_key = ledger_key.into();
        self.session_key = session_key.into();
        self
    }

    /// With flush retry settings
    #[inline]
    #[must_use]
    pub fn with_flush_retry(mut self, attempts: u32, backoff_ms: u64) -> Self {
        self.flush_retry_attempts = attempts;
        self.flush_retry_backoff_ms = backoff_ms;
        self
    }

    /// Reject unusable values
    ///
    /// # Errors
    /// - `ConfigError::Invalid`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ledger_key.trim().is_empty() || self.session_key.trim().is_empty() {
            return Err(ConfigError::Invalid("storage keys must not be empty".into()));
        }
        if self.ledger_key == self.session_key {
            return Err(ConfigError::Invalid(format!(
                "ledger and session keys must differ (both '{}')",
                self.ledger_key
            )));
        }
        if self.flush_retry_attempts == 0 {
            return Err(ConfigError::Invalid(
                "flush_retry_attempts must be at least 1".into(),
            ));
        }
        if self.journal_capacity == 0 {
            return Err(ConfigError::Invalid("journal_capacity must be at least 1".into()));
        }
        Ok(())
    }

    /// Retry policy for the flush worker
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.flush_retry_attempts,
            backoff: Duration::from_millis(self.flush_retry_backoff_ms),
        }
    }
}
