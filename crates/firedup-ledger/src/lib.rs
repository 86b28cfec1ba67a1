//! Fired Up progression engine
//!
//! Per-user progress through the goal trees of a [`firedup_catalog::Catalog`]:
//! - [`Ledger`]: active cause, node progress and the append-only donation history
//! - [`Evaluator`]: pure unlock, completion and ratio evaluation
//! - [`ProgressEngine`]: the service object that owns a ledger for a session
//! - [`Journal`]: hash-chained record of every mutation
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use firedup_catalog::{Catalog, CauseId, NodeId};
//! use firedup_ledger::ProgressEngine;
//!
//! let engine = ProgressEngine::new(Arc::new(Catalog::builtin()?));
//! let cause = CauseId::from("environmental");
//! engine.set_active_cause(&cause)?;
//! let outcome = engine.apply_donation_to_node(&cause, &NodeId::from("plant-trees"), 25.0)?;
//! println!("unlocked: {:?}", outcome.newly_unlocked);
//! ```

pub mod engine;
pub mod error;
pub mod evaluator;
pub mod journal;
pub mod ledger;
pub mod state_machine;

pub use engine::{CompletionSource, FlushSink, ProgressEngine, ProgressOutcome};
pub use error::EngineError;
pub use evaluator::{Evaluator, NodeState};
pub use journal::{EngineEvent, Journal, JournalEntry, JournalError, DEFAULT_JOURNAL_CAPACITY};
pub use ledger::{DonationId, DonationRecord, Ledger, NodeProgress};
pub use state_machine::{allowed_transitions, validate_transition, IllegalTransition};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
