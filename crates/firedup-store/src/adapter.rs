//! Ledger persistence adapter
//!
//! The whole ledger is one payload under one key, so progress and donations
//! are always written (and lost) together.

use crate::envelope::{decode, encode};
use crate::error::PersistenceError;
use crate::kv::KeyValueStore;
use firedup_ledger::Ledger;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Suffix of the key an unreadable ledger is copied to
pub const QUARANTINE_SUFFIX: &str = ".corrupt";

/// Saves and loads the ledger under a fixed key
#[derive(Clone)]
pub struct PersistenceAdapter {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl std::fmt::Debug for PersistenceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceAdapter")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl PersistenceAdapter {
    /// Adapter over `store`, writing under `key`
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Key the ledger is stored under
    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Write the full ledger
    ///
    /// # Errors
    /// - `PersistenceError` from encoding or the store
    pub async fn save(&self, ledger: &Ledger) -> Result<(), PersistenceError> {
        let raw = encode(ledger)?;
        self.store.set(&self.key, raw).await?;
        debug!(key = %self.key, donations = ledger.donations().len(), "ledger saved");
        Ok(())
    }

    /// Read the ledger back; `None` on first run
    ///
    /// # Errors
    /// - `PersistenceError` from the store or decoding
    pub async fn load(&self) -> Result<Option<Ledger>, PersistenceError> {
        let Some(raw) = self.store.get(&self.key).await? else {
            debug!(key = %self.key, "no stored ledger");
            return Ok(None);
        };
        let ledger: Ledger = decode(&raw)?;
        info!(key = %self.key, donations = ledger.donations().len(), "ledger loaded");
        Ok(Some(ledger))
    }

    /// Key an unreadable ledger is copied to
    #[must_use]
    pub fn quarantine_key(&self) -> String {
        format!("{}{QUARANTINE_SUFFIX}", self.key)
    }

    /// Copy the raw stored payload to [`Self::quarantine_key`] so a later save
    /// cannot destroy it. Returns the backup key, `None` if nothing is stored.
    /// An earlier backup under the same key is replaced.
    ///
    /// # Errors
    /// - `PersistenceError` from the store
    pub async fn quarantine(&self) -> Result<Option<String>, PersistenceError> {
        let Some(raw) = self.store.get(&self.key).await? else {
            return Ok(None);
        };
        let backup = self.quarantine_key();
        self.store.set(&backup, raw).await?;
        warn!(key = %self.key, backup = %backup, "unreadable ledger moved aside");
        Ok(Some(backup))
    }

    /// Remove the stored ledger
    ///
    /// # Errors
    /// - `PersistenceError` from the store
    pub async fn clear(&self) -> Result<(), PersistenceError> {
        self.store.delete(&self.key).await?;
        info!(key = %self.key, "stored ledger cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{MemoryStore, MockKeyValueStore};
    use firedup_catalog::{CauseId, NonprofitId};
    use firedup_ledger::ProgressEngine;
    use firedup_test_utils::scenario_a_catalog;
    use pretty_assertions::assert_eq;

    fn populated() -> Ledger {
        let engine = ProgressEngine::new(scenario_a_catalog());
        let cause = CauseId::from(firedup_test_utils::CAUSE);
        engine.set_active_cause(&cause).unwrap();
        engine
            .apply_donation_to_node(&cause, &firedup_test_utils::node_id("R"), 40.0)
            .unwrap();
        engine
            .record_donation(&cause, &NonprofitId::from("npo"), 40.0)
            .unwrap();
        engine.snapshot()
    }

    #[tokio::test]
    async fn save_then_load_returns_same_ledger() {
        let store = MemoryStore::new();
        let adapter = PersistenceAdapter::new(Arc::new(store.clone()), "tree-storage");
        assert_eq!(adapter.load().await.unwrap(), None);

        let ledger = populated();
        adapter.save(&ledger).await.unwrap();
        assert_eq!(adapter.load().await.unwrap(), Some(ledger));
        assert!(store.peek("tree-storage").unwrap().contains("schema_version"));

        adapter.clear().await.unwrap();
        assert_eq!(adapter.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn quarantine_copies_raw_payload() {
        let store = MemoryStore::new();
        let adapter = PersistenceAdapter::new(Arc::new(store.clone()), "tree-storage");
        assert_eq!(adapter.quarantine().await.unwrap(), None);

        store
            .set("tree-storage", "{ not json".to_string())
            .await
            .unwrap();
        assert!(adapter.load().await.unwrap_err().is_unreadable_payload());
        assert_eq!(
            adapter.quarantine().await.unwrap().as_deref(),
            Some("tree-storage.corrupt")
        );
        assert_eq!(store.peek("tree-storage.corrupt").as_deref(), Some("{ not json"));
    }

    #[tokio::test]
    async fn store_failures_surface_as_errors() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_set()
            .returning(|_, _| Err(PersistenceError::Backend("unavailable".into())));
        let adapter = PersistenceAdapter::new(Arc::new(store), "tree-storage");

        let err = adapter.save(&Ledger::new()).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
