//! Progression engine service object
//!
//! `ProgressEngine` owns one user's ledger for the length of a session. It is
//! built once, shared by reference, and is the only way to mutate progress.
//! Every mutation runs under a single write lock:
//!
//! 1. validate input (errors leave the ledger untouched)
//! 2. mutate the ledger
//! 3. write derived completion through to the stored flag
//! 4. surface dependents that became unlocked
//! 5. bump the version stamp, journal, and hand the snapshot to the sink
//!
//! Handing the snapshot over while still holding the lock means a sink sees
//! snapshots in exactly the order the mutations happened.

use crate::error::{validate_amount, EngineError};
use crate::evaluator::{threshold_met, Evaluator, NodeState};
use crate::journal::{EngineEvent, Journal};
use crate::ledger::{DonationId, DonationRecord, Ledger, NodeProgress};
use crate::state_machine::validate_transition;
use chrono::Utc;
use firedup_catalog::{Catalog, Cause, CauseId, CauseTree, GoalNode, GoalType, NodeId, NonprofitId};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Receives ledger snapshots to persist
///
/// `schedule` is called with the engine's write lock held and must not block.
pub trait FlushSink: Send + Sync {
    /// Queue `snapshot`, stamped with a strictly increasing `version`
    fn schedule(&self, version: u64, snapshot: Ledger);
}

/// How a node became complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionSource {
    /// Progress reached the goal threshold
    Threshold,
    /// Administrative override
    Override,
}

/// Result of a node mutation
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressOutcome {
    /// Owning cause
    pub cause_id: CauseId,
    /// Mutated node
    pub node_id: NodeId,
    /// Node progress after the mutation
    pub progress: NodeProgress,
    /// The node was not complete before and is now
    pub completed_now: bool,
    /// Set together with `completed_now`
    pub completed_by: Option<CompletionSource>,
    /// Override requested on a node that was already complete; nothing changed
    pub already_complete: bool,
    /// Dependents whose prerequisites became satisfied, parents first
    pub newly_unlocked: Vec<NodeId>,
}

#[derive(Debug, Default)]
struct EngineState {
    ledger: Ledger,
    version: u64,
}

/// Owns the ledger and mediates every read and write of it
pub struct ProgressEngine {
    catalog: Arc<Catalog>,
    state: RwLock<EngineState>,
    journal: Journal,
    sink: Option<Arc<dyn FlushSink>>,
}

impl std::fmt::Debug for ProgressEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("ProgressEngine")
            .field("causes", &self.catalog.cause_count())
            .field("version", &state.version)
            .field("journal_len", &self.journal.len())
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

impl ProgressEngine {
    /// Engine over an empty ledger
    #[must_use]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self::restore(catalog, Ledger::new())
    }

    /// Engine over a previously persisted ledger
    ///
    /// The ledger is reconciled against the catalog first: progress for
    /// causes or nodes the catalog no longer has is dropped, monthly counters
    /// are clamped, and completion is written through wherever the threshold
    /// already holds.
    #[must_use]
    pub fn restore(catalog: Arc<Catalog>, ledger: Ledger) -> Self {
        let ledger = reconcile(&catalog, ledger);
        info!(
            donations = ledger.donations.len(),
            causes = ledger.progress.len(),
            "ledger restored"
        );
        Self {
            catalog,
            state: RwLock::new(EngineState { ledger, version: 0 }),
            journal: Journal::new(),
            sink: None,
        }
    }

    /// Keep at most `capacity` journal entries; anything journaled so far is
    /// discarded
    #[must_use]
    pub fn with_journal_capacity(mut self, capacity: usize) -> Self {
        self.journal = Journal::with_capacity(capacity);
        self
    }

    /// Attach the sink that receives snapshots after each mutation
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn FlushSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    // ----- reads -----------------------------------------------------------

    /// The catalog this engine evaluates against
    #[inline]
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Causes in catalog order
    pub fn causes(&self) -> impl ExactSizeIterator<Item = &Cause> + '_ {
        self.catalog.causes()
    }

    /// Nodes of a cause's tree in authoring order
    ///
    /// # Errors
    /// - `EngineError::UnknownCause`
    pub fn tree(&self, cause_id: &CauseId) -> Result<Vec<&GoalNode>, EngineError> {
        Ok(self.catalog.tree(cause_id)?.nodes().collect())
    }

    /// Currently selected cause
    #[must_use]
    pub fn active_cause(&self) -> Option<CauseId> {
        self.state.read().ledger.active_cause_id.clone()
    }

    /// Progress for one node, `None` if it was never touched
    ///
    /// # Errors
    /// - `EngineError::UnknownCause` / `EngineError::UnknownNode`
    pub fn node_progress(
        &self,
        cause_id: &CauseId,
        node_id: &NodeId,
    ) -> Result<Option<NodeProgress>, EngineError> {
        self.catalog.node(cause_id, node_id)?;
        Ok(self
            .state
            .read()
            .ledger
            .node_progress(cause_id, node_id)
            .cloned())
    }

    /// See [`Evaluator::is_unlocked`]
    ///
    /// # Errors
    /// - `EngineError::UnknownCause` / `EngineError::UnknownNode`
    pub fn is_unlocked(&self, cause_id: &CauseId, node_id: &NodeId) -> Result<bool, EngineError> {
        let state = self.state.read();
        Evaluator::new(&self.catalog, &state.ledger).is_unlocked(cause_id, node_id)
    }

    /// See [`Evaluator::is_complete`]
    ///
    /// # Errors
    /// - `EngineError::UnknownCause` / `EngineError::UnknownNode`
    pub fn is_complete(&self, cause_id: &CauseId, node_id: &NodeId) -> Result<bool, EngineError> {
        let state = self.state.read();
        Evaluator::new(&self.catalog, &state.ledger).is_complete(cause_id, node_id)
    }

    /// See [`Evaluator::progress_ratio`]
    ///
    /// # Errors
    /// - `EngineError::UnknownCause` / `EngineError::UnknownNode`
    pub fn progress_ratio(&self, cause_id: &CauseId, node_id: &NodeId) -> Result<f64, EngineError> {
        let state = self.state.read();
        Evaluator::new(&self.catalog, &state.ledger).progress_ratio(cause_id, node_id)
    }

    /// See [`Evaluator::node_state`]
    ///
    /// # Errors
    /// - `EngineError::UnknownCause` / `EngineError::UnknownNode`
    pub fn node_state(&self, cause_id: &CauseId, node_id: &NodeId) -> Result<NodeState, EngineError> {
        let state = self.state.read();
        Evaluator::new(&self.catalog, &state.ledger).node_state(cause_id, node_id)
    }

    /// See [`Evaluator::unlocked_nodes`]
    ///
    /// # Errors
    /// - `EngineError::UnknownCause`
    pub fn unlocked_nodes(&self, cause_id: &CauseId) -> Result<Vec<NodeId>, EngineError> {
        let state = self.state.read();
        Evaluator::new(&self.catalog, &state.ledger).unlocked_nodes(cause_id)
    }

    /// Nodes whose threshold holds but whose stored flag is unset
    #[must_use]
    pub fn consistency_violations(&self) -> Vec<(CauseId, NodeId)> {
        let state = self.state.read();
        Evaluator::new(&self.catalog, &state.ledger).consistency_violations()
    }

    /// Donations in insertion order
    #[must_use]
    pub fn donation_history(&self) -> Vec<DonationRecord> {
        self.state.read().ledger.donations.clone()
    }

    /// Sum of donations recorded under `cause_id`
    #[must_use]
    pub fn total_donated_for_cause(&self, cause_id: &CauseId) -> f64 {
        self.state.read().ledger.total_donated_for_cause(cause_id)
    }

    /// Sum of every recorded donation
    #[must_use]
    pub fn total_donated_overall(&self) -> f64 {
        self.state.read().ledger.total_donated_overall()
    }

    /// Owned copy of the ledger
    #[must_use]
    pub fn snapshot(&self) -> Ledger {
        self.state.read().ledger.clone()
    }

    /// Version stamp of the current ledger; bumped by every mutation
    #[must_use]
    pub fn version(&self) -> u64 {
        self.state.read().version
    }

    /// Diagnostic event journal
    #[inline]
    #[must_use]
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Nonprofit a node's donations go to: the user's pick or the node default
    ///
    /// # Errors
    /// - `EngineError::UnknownCause` / `EngineError::UnknownNode`
    pub fn effective_nonprofit(
        &self,
        cause_id: &CauseId,
        node_id: &NodeId,
    ) -> Result<Option<NonprofitId>, EngineError> {
        let node = self.catalog.node(cause_id, node_id)?;
        let state = self.state.read();
        Ok(state
            .ledger
            .node_progress(cause_id, node_id)
            .and_then(|p| p.selected_nonprofit_id.clone())
            .or_else(|| node.default_nonprofit_id.clone()))
    }

    // ----- mutations -------------------------------------------------------

    /// Select the active cause
    ///
    /// # Errors
    /// - `EngineError::UnknownCause`
    pub fn set_active_cause(&self, cause_id: &CauseId) -> Result<(), EngineError> {
        if !self.catalog.contains_cause(cause_id) {
            return Err(EngineError::UnknownCause(cause_id.clone()));
        }
        let mut state = self.state.write();
        state.ledger.active_cause_id = Some(cause_id.clone());
        info!(cause = %cause_id, "active cause changed");
        self.commit(
            &mut state,
            vec![EngineEvent::ActiveCauseChanged {
                cause_id: cause_id.clone(),
            }],
        );
        Ok(())
    }

    /// Append a donation to the history
    ///
    /// Node progress is not touched; allocating money to a node is
    /// [`apply_donation_to_node`](Self::apply_donation_to_node).
    ///
    /// # Errors
    /// - `EngineError::UnknownCause`
    /// - `EngineError::InvalidAmount` for non-positive or non-finite amounts
    pub fn record_donation(
        &self,
        cause_id: &CauseId,
        nonprofit_id: &NonprofitId,
        amount_usd: f64,
    ) -> Result<DonationRecord, EngineError> {
        if !self.catalog.contains_cause(cause_id) {
            return Err(EngineError::UnknownCause(cause_id.clone()));
        }
        validate_amount(amount_usd)?;

        let record = DonationRecord {
            id: DonationId::new(),
            cause_id: cause_id.clone(),
            nonprofit_id: nonprofit_id.clone(),
            amount_usd,
            timestamp: Utc::now(),
        };

        let mut state = self.state.write();
        state.ledger.donations.push(record.clone());
        info!(
            donation = %record.id,
            cause = %cause_id,
            nonprofit = %nonprofit_id,
            amount_usd,
            "donation recorded"
        );
        self.commit(
            &mut state,
            vec![EngineEvent::DonationRecorded {
                donation_id: record.id,
                cause_id: cause_id.clone(),
                amount_usd,
            }],
        );
        Ok(record)
    }

    /// Add `amount_usd` to a total-donation node
    ///
    /// # Errors
    /// - `EngineError::UnknownCause` / `EngineError::UnknownNode`
    /// - `EngineError::WrongGoalType` for monthly-commitment nodes
    /// - `EngineError::InvalidAmount`, also when the node total would stop
    ///   being finite
    ///
    /// Locked nodes accept progress; it counts once their parents complete.
    pub fn apply_donation_to_node(
        &self,
        cause_id: &CauseId,
        node_id: &NodeId,
        amount_usd: f64,
    ) -> Result<ProgressOutcome, EngineError> {
        let (tree, node) = self.lookup(cause_id, node_id)?;
        expect_goal(node, GoalType::TotalDonation)?;
        validate_amount(amount_usd)?;

        let mut guard = self.state.write();
        let state = &mut *guard;
        let current = state
            .ledger
            .node_progress(cause_id, node_id)
            .map_or(0.0, |p| p.amount_donated_usd);
        let total = current + amount_usd;
        if !total.is_finite() {
            return Err(EngineError::InvalidAmount(format!(
                "node total would overflow ({current} + {amount_usd})"
            )));
        }

        let before = self.states(&state.ledger, cause_id, tree, node_id);
        state.ledger.entry_mut(cause_id, node_id).amount_donated_usd = total;
        info!(cause = %cause_id, node = %node_id, amount_usd, "donation applied to node");

        let mut events = vec![EngineEvent::ProgressApplied {
            cause_id: cause_id.clone(),
            node_id: node_id.clone(),
            amount_usd,
        }];
        let outcome = self.settle(&mut state.ledger, cause_id, tree, node, &before, &mut events);
        self.commit(state, events);
        Ok(outcome)
    }

    /// Count `months` more months on a monthly-commitment node
    ///
    /// The counter never exceeds the node's `required_months`.
    ///
    /// # Errors
    /// - `EngineError::UnknownCause` / `EngineError::UnknownNode`
    /// - `EngineError::WrongGoalType` for total-donation nodes
    /// - `EngineError::InvalidAmount` when `months` is zero
    pub fn advance_monthly_commitment(
        &self,
        cause_id: &CauseId,
        node_id: &NodeId,
        months: u32,
    ) -> Result<ProgressOutcome, EngineError> {
        let (tree, node) = self.lookup(cause_id, node_id)?;
        expect_goal(node, GoalType::MonthlyCommitment)?;
        if months == 0 {
            return Err(EngineError::InvalidAmount(
                "months to add must be at least 1".to_string(),
            ));
        }
        let required = node.required_months().unwrap_or_default();

        let mut guard = self.state.write();
        let state = &mut *guard;

        let before = self.states(&state.ledger, cause_id, tree, node_id);
        let progress = state.ledger.entry_mut(cause_id, node_id);
        let current = progress.monthly_commitment_months_completed;
        let next = current.saturating_add(months).min(required);
        progress.monthly_commitment_months_completed = next;
        if next.saturating_sub(current) < months {
            debug!(cause = %cause_id, node = %node_id, required, "monthly counter clamped");
        }
        info!(
            cause = %cause_id,
            node = %node_id,
            months = next,
            required,
            "monthly commitment advanced"
        );

        let mut events = vec![EngineEvent::MonthsAdvanced {
            cause_id: cause_id.clone(),
            node_id: node_id.clone(),
            months: next.saturating_sub(current),
        }];
        let outcome = self.settle(&mut state.ledger, cause_id, tree, node, &before, &mut events);
        self.commit(state, events);
        Ok(outcome)
    }

    /// Administrative override: mark a node complete regardless of progress
    ///
    /// Works on locked nodes too. A node that is already complete is left
    /// alone and the outcome reports `already_complete`.
    ///
    /// # Errors
    /// - `EngineError::UnknownCause` / `EngineError::UnknownNode`
    pub fn complete_node(
        &self,
        cause_id: &CauseId,
        node_id: &NodeId,
    ) -> Result<ProgressOutcome, EngineError> {
        let (tree, node) = self.lookup(cause_id, node_id)?;

        let mut guard = self.state.write();
        let state = &mut *guard;
        if Evaluator::new(&self.catalog, &state.ledger).node_complete(cause_id, node) {
            debug!(cause = %cause_id, node = %node_id, "override skipped, node already complete");
            return Ok(ProgressOutcome {
                cause_id: cause_id.clone(),
                node_id: node_id.clone(),
                progress: state
                    .ledger
                    .node_progress(cause_id, node_id)
                    .cloned()
                    .unwrap_or_default(),
                completed_now: false,
                completed_by: None,
                already_complete: true,
                newly_unlocked: Vec::new(),
            });
        }

        let before = self.states(&state.ledger, cause_id, tree, node_id);
        let progress = state.ledger.entry_mut(cause_id, node_id);
        progress.completed = true;
        progress.completed_by_override = true;
        warn!(cause = %cause_id, node = %node_id, "node force-completed by override");

        let mut events = vec![EngineEvent::OverrideCompleted {
            cause_id: cause_id.clone(),
            node_id: node_id.clone(),
        }];
        let outcome = self.settle(&mut state.ledger, cause_id, tree, node, &before, &mut events);
        self.commit(state, events);
        Ok(outcome)
    }

    /// Pick the nonprofit a node's donations go to
    ///
    /// # Errors
    /// - `EngineError::UnknownCause` / `EngineError::UnknownNode`
    /// - `EngineError::UnknownNonprofit` if the node does not list it
    pub fn select_nonprofit(
        &self,
        cause_id: &CauseId,
        node_id: &NodeId,
        nonprofit_id: &NonprofitId,
    ) -> Result<NodeProgress, EngineError> {
        let node = self.catalog.node(cause_id, node_id)?;
        if !node.accepts_nonprofit(nonprofit_id) {
            return Err(EngineError::UnknownNonprofit {
                node: node_id.clone(),
                nonprofit: nonprofit_id.clone(),
            });
        }

        let mut guard = self.state.write();
        let state = &mut *guard;
        let progress = state.ledger.entry_mut(cause_id, node_id);
        progress.selected_nonprofit_id = Some(nonprofit_id.clone());
        if !progress.completed && threshold_met(&node.goal, Some(&*progress)) {
            progress.completed = true;
        }
        let progress = progress.clone();
        info!(cause = %cause_id, node = %node_id, nonprofit = %nonprofit_id, "nonprofit selected");
        self.commit(
            state,
            vec![EngineEvent::NonprofitSelected {
                cause_id: cause_id.clone(),
                node_id: node_id.clone(),
                nonprofit_id: nonprofit_id.clone(),
            }],
        );
        Ok(progress)
    }

    /// Clear progress, donations and the active cause
    ///
    /// The only operation that moves a node backwards.
    pub fn reset_all(&self) {
        let mut state = self.state.write();
        state.ledger = Ledger::new();
        info!("ledger reset");
        self.commit(&mut state, vec![EngineEvent::LedgerReset]);
    }

    /// Hand the current snapshot to the sink again without mutating
    ///
    /// Used after a failed flush. Keeps the current version stamp.
    pub fn retry_flush(&self) {
        let state = self.state.read();
        if let Some(sink) = &self.sink {
            debug!(version = state.version, "rescheduling flush");
            sink.schedule(state.version, state.ledger.clone());
        }
    }

    // ----- internals -------------------------------------------------------

    fn lookup(
        &self,
        cause_id: &CauseId,
        node_id: &NodeId,
    ) -> Result<(&CauseTree, &GoalNode), EngineError> {
        let tree = self.catalog.tree(cause_id)?;
        let node = tree.get(node_id).ok_or_else(|| EngineError::UnknownNode {
            cause: cause_id.clone(),
            node: node_id.clone(),
        })?;
        Ok((tree, node))
    }

    /// States of `node_id` and everything downstream of it, parents first
    fn states(
        &self,
        ledger: &Ledger,
        cause_id: &CauseId,
        tree: &CauseTree,
        node_id: &NodeId,
    ) -> Vec<(NodeId, NodeState)> {
        let eval = Evaluator::new(&self.catalog, ledger);
        downstream(tree, node_id)
            .into_iter()
            .filter_map(|id| tree.get(&id).map(|n| (id, eval.state_of(cause_id, n))))
            .collect()
    }

    /// Write completion through, then diff downstream states against `before`
    fn settle(
        &self,
        ledger: &mut Ledger,
        cause_id: &CauseId,
        tree: &CauseTree,
        node: &GoalNode,
        before: &[(NodeId, NodeState)],
        events: &mut Vec<EngineEvent>,
    ) -> ProgressOutcome {
        let progress = ledger.entry_mut(cause_id, &node.id);
        let reached = !progress.completed && threshold_met(&node.goal, Some(&*progress));
        if reached {
            progress.completed = true;
            info!(cause = %cause_id, node = %node.id, "node completed");
            events.push(EngineEvent::NodeCompleted {
                cause_id: cause_id.clone(),
                node_id: node.id.clone(),
            });
        }
        let by_override = progress.completed_by_override;

        let eval = Evaluator::new(&self.catalog, ledger);
        let mut completed_now = false;
        let mut newly_unlocked = Vec::new();
        for (id, from) in before {
            let Some(goal_node) = tree.get(id) else {
                continue;
            };
            let to = eval.state_of(cause_id, goal_node);
            if let Err(err) = validate_transition(*from, to) {
                error!(cause = %cause_id, node = %id, %err, "node state moved backwards");
            }
            if id == &node.id {
                completed_now = *from != NodeState::Completed && to == NodeState::Completed;
            } else if *from == NodeState::Locked && to != NodeState::Locked {
                info!(cause = %cause_id, node = %id, "node unlocked");
                events.push(EngineEvent::NodeUnlocked {
                    cause_id: cause_id.clone(),
                    node_id: id.clone(),
                });
                newly_unlocked.push(id.clone());
            }
        }

        let completed_by = completed_now.then_some(if by_override {
            CompletionSource::Override
        } else {
            CompletionSource::Threshold
        });

        ProgressOutcome {
            cause_id: cause_id.clone(),
            node_id: node.id.clone(),
            progress: ledger
                .node_progress(cause_id, &node.id)
                .cloned()
                .unwrap_or_default(),
            completed_now,
            completed_by,
            already_complete: false,
            newly_unlocked,
        }
    }

    /// Bump the version, journal, and schedule a flush
    fn commit(&self, state: &mut EngineState, events: Vec<EngineEvent>) {
        state.version += 1;
        for event in events {
            self.journal.append(event);
        }
        if let Some(sink) = &self.sink {
            sink.schedule(state.version, state.ledger.clone());
        }
    }
}

fn expect_goal(node: &GoalNode, expected: GoalType) -> Result<(), EngineError> {
    let actual = node.goal_type();
    if actual == expected {
        Ok(())
    } else {
        Err(EngineError::WrongGoalType {
            node: node.id.clone(),
            expected,
            actual,
        })
    }
}

/// `node_id` plus every transitive dependent, in topological order
fn downstream(tree: &CauseTree, node_id: &NodeId) -> Vec<NodeId> {
    let mut seen: HashSet<&NodeId> = HashSet::new();
    seen.insert(node_id);
    let mut stack = vec![node_id];
    while let Some(id) = stack.pop() {
        for child in tree.children(id) {
            if seen.insert(child) {
                stack.push(child);
            }
        }
    }
    tree.topological_order()
        .iter()
        .filter(|id| seen.contains(id))
        .cloned()
        .collect()
}

fn reconcile(catalog: &Catalog, mut ledger: Ledger) -> Ledger {
    if let Some(active) = &ledger.active_cause_id {
        if !catalog.contains_cause(active) {
            warn!(cause = %active, "clearing active cause missing from catalog");
            ledger.active_cause_id = None;
        }
    }

    ledger.progress.retain(|cause_id, nodes| {
        let Ok(tree) = catalog.tree(cause_id) else {
            warn!(cause = %cause_id, dropped = nodes.len(), "dropping progress for unknown cause");
            return false;
        };
        nodes.retain(|node_id, progress| {
            let Some(node) = tree.get(node_id) else {
                warn!(cause = %cause_id, node = %node_id, "dropping progress for unknown node");
                return false;
            };
            if let Some(required) = node.required_months() {
                if progress.monthly_commitment_months_completed > required {
                    warn!(cause = %cause_id, node = %node_id, required, "clamping restored months");
                    progress.monthly_commitment_months_completed = required;
                }
            }
            if let Some(selected) = &progress.selected_nonprofit_id {
                if !node.accepts_nonprofit(selected) {
                    warn!(cause = %cause_id, node = %node_id, nonprofit = %selected, "clearing ineligible nonprofit");
                    progress.selected_nonprofit_id = None;
                }
            }
            if !progress.completed && threshold_met(&node.goal, Some(&*progress)) {
                debug!(cause = %cause_id, node = %node_id, "writing through restored completion");
                progress.completed = true;
            }
            true
        });
        !nodes.is_empty()
    });
    ledger
}
