//! Session identity
//!
//! The identity provider hands over a user id and a credential token once,
//! at sign-in. They are kept in a versioned session record under their own
//! key, separate from the ledger.

use crate::envelope::{decode, encode};
use crate::error::PersistenceError;
use crate::kv::KeyValueStore;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Authenticated user as supplied by the identity provider
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque user id
    pub user_id: String,
    /// Contact email, if the provider shared one
    #[serde(default)]
    pub email: Option<String>,
    /// Given name
    #[serde(default)]
    pub first_name: Option<String>,
    /// Family name
    #[serde(default)]
    pub last_name: Option<String>,
    credential_token: String,
}

impl Identity {
    /// Identity with no profile details
    #[must_use]
    pub fn new(user_id: impl Into<String>, credential_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            first_name: None,
            last_name: None,
            credential_token: credential_token.into(),
        }
    }

    /// With profile details
    #[must_use]
    pub fn with_profile(
        mut self,
        email: Option<String>,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Self {
        self.email = email;
        self.first_name = first_name;
        self.last_name = last_name;
        self
    }

    /// The opaque credential token
    #[inline]
    #[must_use]
    pub fn credential_token(&self) -> &str {
        &self.credential_token
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("credential_token", &"<redacted>")
            .finish()
    }
}

/// Persisted session state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Signed-in user, if any
    pub identity: Option<Identity>,
    /// User has not finished onboarding yet
    pub getting_started: bool,
}

impl Default for SessionRecord {
    fn default() -> Self {
        Self {
            identity: None,
            getting_started: true,
        }
    }
}

/// Holds the session record and writes every change through to the store
///
/// Changes are serialised by `writer`, held from the in-memory update until
/// the store call returns, so the stored record always matches the last
/// in-memory one.
pub struct IdentityVault {
    store: Arc<dyn KeyValueStore>,
    key: String,
    current: RwLock<SessionRecord>,
    writer: Mutex<()>,
}

impl std::fmt::Debug for IdentityVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityVault")
            .field("key", &self.key)
            .field("current", &*self.current.read())
            .finish_non_exhaustive()
    }
}

impl IdentityVault {
    /// Load the session record stored under `key`, or start onboarding
    ///
    /// # Errors
    /// - `PersistenceError` from the store or decoding
    pub async fn open(
        store: Arc<dyn KeyValueStore>,
        key: impl Into<String>,
    ) -> Result<Self, PersistenceError> {
        let key = key.into();
        let record = match store.get(&key).await? {
            Some(raw) => decode(&raw)?,
            None => {
                debug!(key = %key, "no stored session, starting onboarding");
                SessionRecord::default()
            }
        };
        Ok(Self {
            store,
            key,
            current: RwLock::new(record),
            writer: Mutex::new(()),
        })
    }

    /// Copy of the current record
    #[must_use]
    pub fn current(&self) -> SessionRecord {
        self.current.read().clone()
    }

    /// Signed-in identity, if any
    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        self.current.read().identity.clone()
    }

    /// True once someone has signed in and not signed out
    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.current.read().identity.is_some()
    }

    /// Store `identity` and leave onboarding
    ///
    /// # Errors
    /// - `PersistenceError`; the in-memory record is updated regardless
    pub async fn sign_in(&self, identity: Identity) -> Result<(), PersistenceError> {
        info!(user = %identity.user_id, "signed in");
        self.update(|_| SessionRecord {
            identity: Some(identity),
            getting_started: false,
        })
        .await
    }

    /// Forget the identity; the onboarding flag is left as it is
    ///
    /// # Errors
    /// - `PersistenceError`; the in-memory record is updated regardless
    pub async fn sign_out(&self) -> Result<(), PersistenceError> {
        info!("signed out");
        self.update(|current| SessionRecord {
            identity: None,
            getting_started: current.getting_started,
        })
        .await
    }

    /// Back to the first-run onboarding state
    ///
    /// # Errors
    /// - `PersistenceError`; the in-memory record is reset regardless
    pub async fn reset(&self) -> Result<(), PersistenceError> {
        let _writer = self.writer.lock().await;
        *self.current.write() = SessionRecord::default();
        info!("session reset");
        self.store.delete(&self.key).await
    }

    async fn update(
        &self,
        next: impl FnOnce(&SessionRecord) -> SessionRecord,
    ) -> Result<(), PersistenceError> {
        let _writer = self.writer.lock().await;
        let record = next(&*self.current.read());
        let raw = encode(&record)?;
        *self.current.write() = record;
        self.store.set(&self.key, raw).await
    }
}
