use crate::evaluator::NodeState;

/// A node moved backwards (or skipped in a way the machine does not allow)
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal node transition: {from:?} -> {to:?}")]
pub struct IllegalTransition {
    /// State before the mutation
    pub from: NodeState,
    /// State after the mutation
    pub to: NodeState,
}

/// Validates a derived state change observed across one mutation.
///
/// Staying in the same state is always fine. With the `strict-debug` feature
/// an illegal transition panics instead of returning an error.
pub fn validate_transition(from: NodeState, to: NodeState) -> Result<(), IllegalTransition> {
    if from == to || allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        #[cfg(feature = "strict-debug")]
        panic!("Illegal node transition attempted: {from:?} -> {to:?}");

        #[cfg(not(feature = "strict-debug"))]
        Err(IllegalTransition { from, to })
    }
}

/// States reachable from `from` without a reset
#[must_use]
pub fn allowed_transitions(from: NodeState) -> Vec<NodeState> {
    use NodeState::*;
    match from {
        // Parent completion can reveal progress restored from storage;
        // the override can complete a node that is still locked.
        Locked => vec![Unlocked, InProgress, Completed],
        Unlocked => vec![InProgress, Completed],
        InProgress => vec![Completed],
        Completed => vec![],
    }
}
