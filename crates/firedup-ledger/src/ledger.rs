//! Ledger aggregate
//!
//! Holds the per-user mutable state:
//! - Active cause selection
//! - Node progress, keyed by cause then node, created lazily
//! - The append-only donation history
//!
//! Outside this crate a `Ledger` is only ever seen as an owned snapshot, so
//! nothing a caller does to it can reach the engine's working copy.

use chrono::{DateTime, Utc};
use firedup_catalog::{CauseId, NodeId, NonprofitId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ulid::Ulid;

/// Progress toward one goal node
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeProgress {
    /// Total allocated to this node; may overshoot the target
    pub amount_donated_usd: f64,
    /// Months of monthly commitment completed, never above the requirement
    pub monthly_commitment_months_completed: u32,
    /// Nonprofit the user picked for this node
    pub selected_nonprofit_id: Option<NonprofitId>,
    /// Write-through completion flag; once set it stays set until reset
    pub completed: bool,
    /// Set when completion came from an administrative override
    #[serde(default)]
    pub completed_by_override: bool,
}

impl NodeProgress {
    /// Whether any donation or month has been counted
    #[inline]
    #[must_use]
    pub fn has_progress(&self) -> bool {
        self.amount_donated_usd > 0.0 || self.monthly_commitment_months_completed > 0
    }
}

/// Unique donation identifier, generated by the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DonationId(pub Ulid);

impl DonationId {
    /// Generate a new donation ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for DonationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DonationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "donation-{}", self.0)
    }
}

/// One recorded donation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonationRecord {
    /// Ledger-generated identifier
    pub id: DonationId,
    /// Cause the donation was made under
    pub cause_id: CauseId,
    /// Receiving nonprofit
    pub nonprofit_id: NonprofitId,
    /// Donated amount
    pub amount_usd: f64,
    /// When the donation was recorded
    pub timestamp: DateTime<Utc>,
}

/// The per-user progress aggregate
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Ledger {
    pub(crate) active_cause_id: Option<CauseId>,
    #[serde(default)]
    pub(crate) progress: BTreeMap<CauseId, BTreeMap<NodeId, NodeProgress>>,
    #[serde(default)]
    pub(crate) donations: Vec<DonationRecord>,
}

impl Ledger {
    /// Empty ledger, identical to the state after a reset
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger assembled from parts read out of an older storage layout.
    /// Nothing is checked here; [`crate::ProgressEngine::restore`] reconciles
    /// it against the catalog.
    #[must_use]
    pub fn from_parts(
        active_cause_id: Option<CauseId>,
        progress: BTreeMap<CauseId, BTreeMap<NodeId, NodeProgress>>,
        donations: Vec<DonationRecord>,
    ) -> Self {
        Self {
            active_cause_id,
            progress,
            donations,
        }
    }

    /// Currently selected cause
    #[inline]
    #[must_use]
    pub fn active_cause_id(&self) -> Option<&CauseId> {
        self.active_cause_id.as_ref()
    }

    /// Progress for one node, `None` if untouched
    #[must_use]
    pub fn node_progress(&self, cause: &CauseId, node: &NodeId) -> Option<&NodeProgress> {
        self.progress.get(cause).and_then(|nodes| nodes.get(node))
    }

    /// All touched nodes of one cause
    #[must_use]
    pub fn cause_progress(&self, cause: &CauseId) -> Option<&BTreeMap<NodeId, NodeProgress>> {
        self.progress.get(cause)
    }

    /// Every touched node, by cause
    pub fn progress_entries(&self) -> impl Iterator<Item = (&CauseId, &NodeId, &NodeProgress)> + '_ {
        self.progress
            .iter()
            .flat_map(|(cause, nodes)| nodes.iter().map(move |(node, p)| (cause, node, p)))
    }

    /// Donations in insertion order
    #[inline]
    #[must_use]
    pub fn donations(&self) -> &[DonationRecord] {
        &self.donations
    }

    /// Sum of donations recorded under `cause`
    #[must_use]
    pub fn total_donated_for_cause(&self, cause: &CauseId) -> f64 {
        self.donations
            .iter()
            .filter(|d| &d.cause_id == cause)
            .map(|d| d.amount_usd)
            .sum()
    }

    /// Sum of every recorded donation
    #[must_use]
    pub fn total_donated_overall(&self) -> f64 {
        self.donations.iter().map(|d| d.amount_usd).sum()
    }

    /// True for the initial (or freshly reset) state
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active_cause_id.is_none() && self.progress.is_empty() && self.donations.is_empty()
    }

    pub(crate) fn entry_mut(&mut self, cause: &CauseId, node: &NodeId) -> &mut NodeProgress {
        self.progress
            .entry(cause.clone())
            .or_default()
            .entry(node.clone())
            .or_default()
    }
}
