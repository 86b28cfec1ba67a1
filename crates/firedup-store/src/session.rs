//! Session bootstrap
//!
//! Wires a catalog, a store and a configuration into a running engine:
//! session record and ledger are loaded, the engine is restored, and a flush
//! worker is attached so every mutation is persisted in the background.

use crate::adapter::PersistenceAdapter;
use crate::config::EngineConfig;
use crate::error::{PersistenceError, SessionError};
use crate::identity::IdentityVault;
use crate::kv::{FileStore, KeyValueStore, MemoryStore};
use crate::worker::{FlushHandle, FlushStatus, FlushWorker};
use firedup_catalog::Catalog;
use firedup_ledger::{Ledger, ProgressEngine};
use std::sync::Arc;
use tracing::{info, warn};

/// A running engine with its persistence attached
#[derive(Debug)]
pub struct EngineSession {
    config: EngineConfig,
    engine: Arc<ProgressEngine>,
    flush: FlushHandle,
    vault: IdentityVault,
    adapter: PersistenceAdapter,
}

impl EngineSession {
    /// Start a session over `store`
    ///
    /// A stored ledger that cannot be decoded is copied under the
    /// quarantine key and the session starts empty. A ledger written by a
    /// newer schema, a store that cannot be read, or a failed quarantine
    /// aborts the start so nothing gets overwritten.
    ///
    /// # Errors
    /// - `SessionError::Config` for invalid configuration
    /// - `SessionError::Persistence` if stored state cannot be read
    pub async fn start(
        config: EngineConfig,
        catalog: Arc<Catalog>,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, SessionError> {
        config.validate()?;

        let vault = IdentityVault::open(store.clone(), config.session_key.clone()).await?;
        let adapter = PersistenceAdapter::new(store, config.ledger_key.clone());
        let ledger = match adapter.load().await {
            Ok(ledger) => ledger.unwrap_or_default(),
            Err(err) if err.is_unreadable_payload() => {
                warn!(key = %config.ledger_key, %err, "stored ledger unreadable, starting empty");
                adapter.quarantine().await?;
                Ledger::new()
            }
            Err(err) => return Err(err.into()),
        };

        let flush = FlushWorker::spawn(adapter.clone(), config.retry_policy());
        let engine = ProgressEngine::restore(catalog, ledger)
            .with_journal_capacity(config.journal_capacity)
            .with_sink(Arc::new(flush.clone()));
        info!(
            signed_in = vault.is_signed_in(),
            active_cause = ?engine.active_cause(),
            "engine session started"
        );

        Ok(Self {
            config,
            engine: Arc::new(engine),
            flush,
            vault,
            adapter,
        })
    }

    /// Start with the store the configuration asks for: files under
    /// `data_dir` when set, memory otherwise
    ///
    /// # Errors
    /// - as [`EngineSession::start`], plus `PersistenceError::Io` if the
    ///   data directory cannot be created
    pub async fn from_config(
        config: EngineConfig,
        catalog: Arc<Catalog>,
    ) -> Result<Self, SessionError> {
        let store: Arc<dyn KeyValueStore> = match &config.data_dir {
            Some(dir) => Arc::new(FileStore::open(dir.clone()).await?),
            None => Arc::new(MemoryStore::new()),
        };
        Self::start(config, catalog, store).await
    }

    /// Start over the built-in catalog
    ///
    /// # Errors
    /// - `SessionError::Catalog` if the built-in data fails validation
    /// - as [`EngineSession::from_config`]
    pub async fn with_builtin_catalog(config: EngineConfig) -> Result<Self, SessionError> {
        let catalog = Arc::new(Catalog::builtin()?);
        Self::from_config(config, catalog).await
    }

    /// The engine; share it with the presentation layer
    #[inline]
    #[must_use]
    pub fn engine(&self) -> &Arc<ProgressEngine> {
        &self.engine
    }

    /// Session identity
    #[inline]
    #[must_use]
    pub fn identity(&self) -> &IdentityVault {
        &self.vault
    }

    /// Flush worker handle
    #[inline]
    #[must_use]
    pub fn flusher(&self) -> &FlushHandle {
        &self.flush
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Wait until every mutation so far is persisted (or failed)
    ///
    /// # Errors
    /// - `PersistenceError::WorkerClosed`
    pub async fn flush(&self) -> Result<FlushStatus, PersistenceError> {
        self.flush.flush().await
    }

    /// Reschedule the current snapshot after a failed flush and wait for it
    ///
    /// # Errors
    /// - `PersistenceError::WorkerClosed`
    pub async fn retry_flush(&self) -> Result<FlushStatus, PersistenceError> {
        self.engine.retry_flush();
        self.flush.flush().await
    }

    /// Reset all progress and persist the empty ledger
    ///
    /// # Errors
    /// - `PersistenceError::WorkerClosed`
    pub async fn reset_all(&self) -> Result<FlushStatus, PersistenceError> {
        self.engine.reset_all();
        self.flush.flush().await
    }

    /// Remove the stored ledger without touching the in-memory one
    ///
    /// # Errors
    /// - `PersistenceError` from the store
    pub async fn clear_stored_ledger(&self) -> Result<(), PersistenceError> {
        self.flush.flush().await?;
        self.adapter.clear().await
    }

    /// Persist pending work and stop the flush worker
    ///
    /// # Errors
    /// - `PersistenceError::WorkerClosed`
    pub async fn shutdown(self) -> Result<FlushStatus, PersistenceError> {
        let status = self.flush.flush().await?;
        self.flush.shutdown().await?;
        info!(?status, "engine session stopped");
        Ok(status)
    }
}
