//! Fired Up persistence
//!
//! Durable storage for the progression engine:
//! - [`KeyValueStore`] seam with in-memory and file-backed stores
//! - Versioned payload envelopes, with an upgrade from the pre-envelope layout
//! - [`PersistenceAdapter`] for the ledger and [`IdentityVault`] for the session
//! - [`FlushWorker`]: ordered, retried background flushing
//! - [`EngineSession`]: one call from configuration to a running engine
//!
//! # Example
//!
//! ```rust,ignore
//! use firedup_store::{EngineConfig, EngineSession};
//!
//! let session = EngineSession::with_builtin_catalog(EngineConfig::default()).await?;
//! let engine = session.engine();
//! engine.set_active_cause(&"environmental".into())?;
//! session.flush().await?;
//! ```

pub mod adapter;
pub mod config;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod kv;
pub mod legacy;
pub mod session;
pub mod worker;

pub use adapter::PersistenceAdapter;
pub use config::{EngineConfig, DEFAULT_LEDGER_KEY, DEFAULT_SESSION_KEY};
pub use envelope::{Envelope, Persisted, SCHEMA_VERSION};
pub use error::{ConfigError, PersistenceError, SessionError};
pub use identity::{Identity, IdentityVault, SessionRecord};
pub use kv::{FileStore, KeyValueStore, MemoryStore};
pub use session::EngineSession;
pub use worker::{FlushHandle, FlushStatus, FlushWorker, RetryPolicy};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
