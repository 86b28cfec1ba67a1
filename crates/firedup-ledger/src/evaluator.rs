//! Unlock & completion evaluation
//!
//! Pure functions over a catalog and a ledger. Nothing here is cached:
//! unlock state is always derived fresh from node progress, so a reset or an
//! override can never leave a stale answer behind.

use crate::error::EngineError;
use crate::ledger::{Ledger, NodeProgress};
use firedup_catalog::{Catalog, CauseId, GoalKind, GoalNode, NodeId};
use serde::{Deserialize, Serialize};

/// Derived per-node state
///
/// Never stored. Moves forward only: `Locked -> Unlocked -> InProgress ->
/// Completed`, and only `reset_all` goes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeState {
    /// Some prerequisite is incomplete
    Locked,
    /// All prerequisites complete, no progress yet
    Unlocked,
    /// Unlocked with some progress
    InProgress,
    /// Threshold reached or force-completed
    Completed,
}

/// Whether `progress` satisfies the node's goal threshold
///
/// Ignores the stored `completed` flag.
#[must_use]
pub fn threshold_met(goal: &GoalKind, progress: Option<&NodeProgress>) -> bool {
    match *goal {
        GoalKind::TotalDonation { target_amount_usd } => {
            let donated = progress.map_or(0.0, |p| p.amount_donated_usd);
            donated >= target_amount_usd
        }
        GoalKind::MonthlyCommitment {
            required_months, ..
        } => {
            let months = progress.map_or(0, |p| p.monthly_commitment_months_completed);
            months >= required_months
        }
    }
}

/// Fraction of the goal reached, clamped to `[0, 1]`
#[must_use]
pub fn ratio(goal: &GoalKind, progress: Option<&NodeProgress>) -> f64 {
    let raw = match *goal {
        GoalKind::TotalDonation { target_amount_usd } => {
            if target_amount_usd <= 0.0 {
                return 1.0;
            }
            progress.map_or(0.0, |p| p.amount_donated_usd) / target_amount_usd
        }
        GoalKind::MonthlyCommitment {
            required_months, ..
        } => {
            if required_months == 0 {
                return 1.0;
            }
            f64::from(progress.map_or(0, |p| p.monthly_commitment_months_completed))
                / f64::from(required_months)
        }
    };
    raw.clamp(0.0, 1.0)
}

/// Read-only evaluator over a catalog and a ledger
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'a> {
    catalog: &'a Catalog,
    ledger: &'a Ledger,
}

impl<'a> Evaluator<'a> {
    /// Create an evaluator
    #[inline]
    #[must_use]
    pub fn new(catalog: &'a Catalog, ledger: &'a Ledger) -> Self {
        Self { catalog, ledger }
    }

    /// Complete if the threshold holds or the stored flag was set
    ///
    /// # Errors
    /// - `EngineError::UnknownCause` / `EngineError::UnknownNode`
    pub fn is_complete(&self, cause: &CauseId, node: &NodeId) -> Result<bool, EngineError> {
        let goal_node = self.catalog.node(cause, node)?;
        Ok(self.node_complete(cause, goal_node))
    }

    /// Unlocked iff every parent is complete; roots are always unlocked
    ///
    /// # Errors
    /// - `EngineError::UnknownCause` / `EngineError::UnknownNode`
    pub fn is_unlocked(&self, cause: &CauseId, node: &NodeId) -> Result<bool, EngineError> {
        let goal_node = self.catalog.node(cause, node)?;
        Ok(self.node_unlocked(cause, goal_node))
    }

    /// Progress toward the goal in `[0, 1]`
    ///
    /// # Errors
    /// - `EngineError::UnknownCause` / `EngineError::UnknownNode`
    pub fn progress_ratio(&self, cause: &CauseId, node: &NodeId) -> Result<f64, EngineError> {
        let goal_node = self.catalog.node(cause, node)?;
        Ok(ratio(&goal_node.goal, self.ledger.node_progress(cause, node)))
    }

    /// Derived state of one node
    ///
    /// # Errors
    /// - `EngineError::UnknownCause` / `EngineError::UnknownNode`
    pub fn node_state(&self, cause: &CauseId, node: &NodeId) -> Result<NodeState, EngineError> {
        let goal_node = self.catalog.node(cause, node)?;
        Ok(self.state_of(cause, goal_node))
    }

    /// States of every node in a tree, in authoring order
    ///
    /// # Errors
    /// - `EngineError::UnknownCause`
    pub fn tree_states(&self, cause: &CauseId) -> Result<Vec<(NodeId, NodeState)>, EngineError> {
        Ok(self
            .catalog
            .tree(cause)?
            .nodes()
            .map(|n| (n.id.clone(), self.state_of(cause, n)))
            .collect())
    }

    /// Unlocked nodes of a tree, parents first
    ///
    /// # Errors
    /// - `EngineError::UnknownCause`
    pub fn unlocked_nodes(&self, cause: &CauseId) -> Result<Vec<NodeId>, EngineError> {
        let tree = self.catalog.tree(cause)?;
        Ok(tree
            .topological_order()
            .iter()
            .filter_map(|id| tree.get(id))
            .filter(|n| self.node_unlocked(cause, n))
            .map(|n| n.id.clone())
            .collect())
    }

    /// Touched nodes whose threshold holds but whose stored flag is unset
    ///
    /// Empty whenever every mutation has written completion through.
    #[must_use]
    pub fn consistency_violations(&self) -> Vec<(CauseId, NodeId)> {
        self.ledger
            .progress_entries()
            .filter(|&(cause, node, progress)| {
                !progress.completed
                    && self
                        .catalog
                        .node(cause, node)
                        .is_ok_and(|n| threshold_met(&n.goal, Some(progress)))
            })
            .map(|(cause, node, _)| (cause.clone(), node.clone()))
            .collect()
    }

    pub(crate) fn node_complete(&self, cause: &CauseId, node: &GoalNode) -> bool {
        let progress = self.ledger.node_progress(cause, &node.id);
        progress.is_some_and(|p| p.completed) || threshold_met(&node.goal, progress)
    }

    pub(crate) fn node_unlocked(&self, cause: &CauseId, node: &GoalNode) -> bool {
        node.parent_ids.iter().all(|parent| {
            self.catalog
                .node(cause, parent)
                .is_ok_and(|p| self.node_complete(cause, p))
        })
    }

    pub(crate) fn state_of(&self, cause: &CauseId, node: &GoalNode) -> NodeState {
        if self.node_complete(cause, node) {
            NodeState::Completed
        } else if !self.node_unlocked(cause, node) {
            NodeState::Locked
        } else if self
            .ledger
            .node_progress(cause, &node.id)
            .is_some_and(NodeProgress::has_progress)
        {
            NodeState::InProgress
        } else {
            NodeState::Unlocked
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use firedup_catalog::Cause;

    fn catalog() -> Catalog {
        Catalog::builder()
            .cause(
                Cause::new("c", "Cause", "", "globe"),
                vec![
                    GoalNode::total_donation("a", "A", 100.0),
                    GoalNode::total_donation("b", "B", 50.0),
                    GoalNode::total_donation("cap", "Cap", 10.0).with_parents(["a", "b"]),
                    GoalNode::monthly_commitment("m", "M", 3, 10.0).with_parents(["a"]),
                ],
            )
            .build()
            .unwrap()
    }

    fn ids(cause: &str, node: &str) -> (CauseId, NodeId) {
        (CauseId::from(cause), NodeId::from(node))
    }

    #[test]
    fn unlock_is_conjunctive() {
        let catalog = catalog();
        let mut ledger = Ledger::new();
        let (c, cap) = ids("c", "cap");

        assert!(!Evaluator::new(&catalog, &ledger).is_unlocked(&c, &cap).unwrap());

        ledger.entry_mut(&c, &NodeId::from("a")).amount_donated_usd = 100.0;
        assert!(!Evaluator::new(&catalog, &ledger).is_unlocked(&c, &cap).unwrap());

        ledger.entry_mut(&c, &NodeId::from("b")).amount_donated_usd = 50.0;
        assert!(Evaluator::new(&catalog, &ledger).is_unlocked(&c, &cap).unwrap());
    }

    #[test]
    fn ratio_clamps_overshoot() {
        let catalog = catalog();
        let mut ledger = Ledger::new();
        let (c, a) = ids("c", "a");
        ledger.entry_mut(&c, &a).amount_donated_usd = 250.0;

        let eval = Evaluator::new(&catalog, &ledger);
        assert!((eval.progress_ratio(&c, &a).unwrap() - 1.0).abs() < f64::EPSILON);
        assert_eq!(ledger.node_progress(&c, &a).unwrap().amount_donated_usd, 250.0);
    }

    #[test]
    fn states_follow_progress() {
        let catalog = catalog();
        let mut ledger = Ledger::new();
        let (c, a) = ids("c", "a");
        let m = NodeId::from("m");

        let eval = Evaluator::new(&catalog, &ledger);
        assert_eq!(eval.node_state(&c, &a).unwrap(), NodeState::Unlocked);
        assert_eq!(eval.node_state(&c, &m).unwrap(), NodeState::Locked);

        ledger.entry_mut(&c, &a).amount_donated_usd = 10.0;
        let eval = Evaluator::new(&catalog, &ledger);
        assert_eq!(eval.node_state(&c, &a).unwrap(), NodeState::InProgress);

        ledger.entry_mut(&c, &a).amount_donated_usd = 100.0;
        let eval = Evaluator::new(&catalog, &ledger);
        assert_eq!(eval.node_state(&c, &a).unwrap(), NodeState::Completed);
        assert_eq!(eval.node_state(&c, &m).unwrap(), NodeState::Unlocked);
        assert_eq!(eval.unlocked_nodes(&c).unwrap().len(), 3);
    }

    #[test]
    fn stored_flag_counts_as_complete() {
        let catalog = catalog();
        let mut ledger = Ledger::new();
        let (c, b) = ids("c", "b");
        ledger.entry_mut(&c, &b).completed = true;

        let eval = Evaluator::new(&catalog, &ledger);
        assert!(eval.is_complete(&c, &b).unwrap());
        assert!(eval.progress_ratio(&c, &b).unwrap() < f64::EPSILON);
    }

    #[test]
    fn unwritten_completion_is_reported() {
        let catalog = catalog();
        let mut ledger = Ledger::new();
        let (c, a) = ids("c", "a");
        ledger.entry_mut(&c, &a).amount_donated_usd = 100.0;

        let eval = Evaluator::new(&catalog, &ledger);
        assert_eq!(eval.consistency_violations(), vec![(c, a)]);
    }
}
