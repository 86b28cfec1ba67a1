//! Layouts written before the versioned envelope
//!
//! The first release of the app stored each value as a zustand `persist`
//! blob, `{"state": {...}, "version": 0}`, with camelCase field names. Both
//! the ledger and the session record are upgraded from that shape on load.

use crate::envelope::Persisted;
use crate::error::PersistenceError;
use crate::identity::{Identity, SessionRecord};
use chrono::{DateTime, Utc};
use firedup_catalog::{CauseId, NodeId, NonprofitId};
use firedup_ledger::{DonationId, DonationRecord, Ledger, NodeProgress};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::info;
use ulid::Ulid;

/// Store version every legacy blob was written with
pub const LEGACY_STORE_VERSION: u32 = 0;

/// Outer zustand `persist` wrapper
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LegacyBlob<S> {
    state: S,
    version: u32,
}

impl<S> LegacyBlob<S> {
    fn into_state(self) -> Result<S, PersistenceError> {
        if self.version == LEGACY_STORE_VERSION {
            Ok(self.state)
        } else {
            Err(PersistenceError::UnrecognizedLayout(format!(
                "legacy store version {}",
                self.version
            )))
        }
    }
}

/// Tree store state
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyTreeState {
    #[serde(default)]
    active_cause_id: Option<CauseId>,
    node_progress: BTreeMap<CauseId, BTreeMap<NodeId, LegacyNodeProgress>>,
    donation_history: Vec<LegacyDonation>,
}

/// Entries were merged from partial updates, so any field may be missing
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LegacyNodeProgress {
    #[serde(rename = "amountDonatedUSD")]
    amount_donated_usd: f64,
    #[serde(rename = "monthlyCommitmentMonthsCompleted")]
    months_completed: u32,
    #[serde(rename = "selectedNonprofitId")]
    selected_nonprofit_id: Option<NonprofitId>,
    completed: bool,
}

impl From<LegacyNodeProgress> for NodeProgress {
    fn from(legacy: LegacyNodeProgress) -> Self {
        Self {
            amount_donated_usd: legacy.amount_donated_usd,
            monthly_commitment_months_completed: legacy.months_completed,
            selected_nonprofit_id: legacy.selected_nonprofit_id,
            completed: legacy.completed,
            completed_by_override: false,
        }
    }
}

/// Donation history entry
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyDonation {
    id: String,
    cause_id: CauseId,
    nonprofit_id: NonprofitId,
    #[serde(rename = "amountUSD")]
    amount_usd: f64,
    #[serde(rename = "dateISO")]
    date: DateTime<Utc>,
}

impl LegacyDonation {
    /// Legacy ids are `donation-<epoch millis>`. The millis become the ULID
    /// time part and the history position its random part, so two donations
    /// made in the same millisecond still get distinct ids.
    fn into_record(self, position: usize) -> DonationRecord {
        let millis = self
            .id
            .strip_prefix("donation-")
            .and_then(|ms| ms.parse::<u64>().ok())
            .unwrap_or_else(|| u64::try_from(self.date.timestamp_millis()).unwrap_or(0));
        DonationRecord {
            id: DonationId(Ulid::from_parts(millis, position as u128)),
            cause_id: self.cause_id,
            nonprofit_id: self.nonprofit_id,
            amount_usd: self.amount_usd,
            timestamp: self.date,
        }
    }
}

impl Persisted for Ledger {
    type Legacy = LegacyBlob<LegacyTreeState>;

    fn upgrade(legacy: Self::Legacy) -> Result<Self, PersistenceError> {
        let state = legacy.into_state()?;
        let progress = state
            .node_progress
            .into_iter()
            .map(|(cause, nodes)| {
                let nodes = nodes.into_iter().map(|(node, p)| (node, p.into())).collect();
                (cause, nodes)
            })
            .collect();
        let donations: Vec<DonationRecord> = state
            .donation_history
            .into_iter()
            .enumerate()
            .map(|(position, d)| d.into_record(position))
            .collect();
        info!(donations = donations.len(), "upgraded ledger from legacy store");
        Ok(Ledger::from_parts(state.active_cause_id, progress, donations))
    }
}

/// Auth store state
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyAuthState {
    #[serde(default)]
    user: Option<LegacyUser>,
    #[serde(default)]
    token: Option<String>,
    is_getting_started: bool,
}

/// Signed-in user profile
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
}

impl Persisted for SessionRecord {
    type Legacy = LegacyBlob<LegacyAuthState>;

    fn upgrade(legacy: Self::Legacy) -> Result<Self, PersistenceError> {
        let state = legacy.into_state()?;
        // A profile without a token cannot authenticate anything
        let identity = match (state.user, state.token) {
            (Some(user), Some(token)) => Some(
                Identity::new(user.id, token).with_profile(
                    user.email,
                    user.first_name,
                    user.last_name,
                ),
            ),
            _ => None,
        };
        info!(signed_in = identity.is_some(), "upgraded session from legacy store");
        Ok(SessionRecord {
            identity,
            getting_started: state.is_getting_started,
        })
    }
}
