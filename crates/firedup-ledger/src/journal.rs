//! Hash-chained journal of ledger mutations
//!
//! Every successful mutation appends one or more events. Each entry carries
//! the hash of its predecessor, so any edit to recorded history is detected
//! by [`Journal::verify_integrity`].
//!
//! The journal is a bounded ring: once `capacity` entries are held, the
//! oldest is dropped for each new one. Sequences keep counting, and the
//! chain is checked from the oldest retained entry onwards.

use crate::ledger::DonationId;
use chrono::{DateTime, Utc};
use firedup_catalog::{CauseId, NodeId, NonprofitId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;

/// Entries kept by [`Journal::new`]
pub const DEFAULT_JOURNAL_CAPACITY: usize = 1024;

/// Something that happened to the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Active cause selection changed
    ActiveCauseChanged {
        /// New selection
        cause_id: CauseId,
    },
    /// A donation was added to the history
    DonationRecorded {
        /// Generated donation id
        donation_id: DonationId,
        /// Cause it was made under
        cause_id: CauseId,
        /// Amount in USD
        amount_usd: f64,
    },
    /// Money was allocated to a total-donation node
    ProgressApplied {
        /// Owning cause
        cause_id: CauseId,
        /// Target node
        node_id: NodeId,
        /// Amount added
        amount_usd: f64,
    },
    /// Months were counted on a monthly-commitment node
    MonthsAdvanced {
        /// Owning cause
        cause_id: CauseId,
        /// Target node
        node_id: NodeId,
        /// Months actually added after clamping
        months: u32,
    },
    /// A node reached its threshold
    NodeCompleted {
        /// Owning cause
        cause_id: CauseId,
        /// Completed node
        node_id: NodeId,
    },
    /// A node was force-completed
    OverrideCompleted {
        /// Owning cause
        cause_id: CauseId,
        /// Completed node
        node_id: NodeId,
    },
    /// A node became unlocked
    NodeUnlocked {
        /// Owning cause
        cause_id: CauseId,
        /// Unlocked node
        node_id: NodeId,
    },
    /// The user picked a nonprofit for a node
    NonprofitSelected {
        /// Owning cause
        cause_id: CauseId,
        /// Target node
        node_id: NodeId,
        /// Selected nonprofit
        nonprofit_id: NonprofitId,
    },
    /// All progress was cleared
    LedgerReset,
}

/// One chained journal entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Position in the journal, starting at zero
    pub sequence: u64,
    /// When the event was appended
    pub timestamp: DateTime<Utc>,
    /// The event itself
    pub event: EngineEvent,
    /// Hash of the previous entry (all zero for the very first)
    pub prev_hash: [u8; 32],
    /// Hash over this entry's contents and `prev_hash`
    pub hash: [u8; 32],
}

impl JournalEntry {
    /// Hex rendering of `hash`
    #[must_use]
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

/// Journal integrity errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JournalError {
    /// An entry does not link to its predecessor, skips a sequence number,
    /// or its hash does not match
    #[error("journal integrity violation at entry {sequence}")]
    IntegrityViolation {
        /// First entry that failed verification
        sequence: u64,
    },
}

/// Bounded, hash-chained event journal
#[derive(Debug)]
pub struct Journal {
    inner: Mutex<Ring>,
}

#[derive(Debug)]
struct Ring {
    entries: VecDeque<JournalEntry>,
    capacity: usize,
    next_sequence: u64,
    head: [u8; 32],
}

impl Default for Journal {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_JOURNAL_CAPACITY)
    }
}

impl Journal {
    /// Empty journal keeping [`DEFAULT_JOURNAL_CAPACITY`] entries
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty journal keeping at most `capacity` entries (at least one)
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Ring {
                entries: VecDeque::with_capacity(capacity.min(DEFAULT_JOURNAL_CAPACITY)),
                capacity,
                next_sequence: 0,
                head: [0u8; 32],
            }),
        }
    }

    /// Append an event, linking it to the current head. Returns its sequence.
    pub fn append(&self, event: EngineEvent) -> u64 {
        let mut ring = self.inner.lock();
        let mut entry = JournalEntry {
            sequence: ring.next_sequence,
            timestamp: Utc::now(),
            event,
            prev_hash: ring.head,
            hash: [0u8; 32],
        };
        entry.hash = compute_hash(&entry);
        let sequence = entry.sequence;
        ring.head = entry.hash;
        ring.next_sequence += 1;
        if ring.entries.len() == ring.capacity {
            ring.entries.pop_front();
        }
        ring.entries.push_back(entry);
        sequence
    }

    /// Copy of every retained entry, oldest first
    #[must_use]
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.inner.lock().entries.iter().cloned().collect()
    }

    /// Number of retained entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// True if nothing was appended yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Most entries kept at once
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    /// Entries appended over the journal's lifetime, dropped ones included
    #[must_use]
    pub fn total_appended(&self) -> u64 {
        self.inner.lock().next_sequence
    }

    /// Recompute the chain over the retained entries
    ///
    /// # Errors
    /// - `JournalError::IntegrityViolation` naming the first bad entry
    pub fn verify_integrity(&self) -> Result<(), JournalError> {
        verify_links(self.inner.lock().entries.iter())
    }
}

/// Verify a detached list of entries, such as one read back from a file
///
/// The list may start anywhere in the journal; the first entry's
/// `prev_hash` is taken as given.
///
/// # Errors
/// - `JournalError::IntegrityViolation` naming the first bad entry
pub fn verify_chain(entries: &[JournalEntry]) -> Result<(), JournalError> {
    verify_links(entries.iter())
}

fn verify_links<'a>(entries: impl IntoIterator<Item = &'a JournalEntry>) -> Result<(), JournalError> {
    let mut expected: Option<(u64, [u8; 32])> = None;
    for entry in entries {
        let linked = match expected {
            None => true,
            Some((sequence, prev)) => entry.sequence == sequence && entry.prev_hash == prev,
        };
        if !linked || entry.hash != compute_hash(entry) {
            return Err(JournalError::IntegrityViolation {
                sequence: entry.sequence,
            });
        }
        expected = Some((entry.sequence + 1, entry.hash));
    }
    Ok(())
}

fn compute_hash(entry: &JournalEntry) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(entry.sequence.to_le_bytes());
    hasher.update(entry.timestamp.timestamp_micros().to_le_bytes());
    hasher.update(serde_json::to_vec(&entry.event).unwrap_or_default());
    hasher.update([0]);
    hasher.update(entry.prev_hash);
    hasher.finalize().into()
}
