//! Error types for the goal-tree catalog
//!
//! Query errors (`UnknownCause`, `UnknownNode`) are ordinary caller mistakes.
//! Integrity errors are raised once, while the catalog is built, and must
//! stop the engine from starting.

use crate::ids::{CauseId, NodeId};

/// Catalog errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
    /// Cause is not registered
    #[error("unknown cause: {0}")]
    UnknownCause(CauseId),

    /// Node is not part of the cause's tree
    #[error("unknown node '{node}' in cause '{cause}'")]
    UnknownNode {
        /// Cause that was searched
        cause: CauseId,
        /// Node that was not found
        node: NodeId,
    },

    /// Malformed tree data
    #[error("catalog integrity error: {0}")]
    Integrity(#[from] IntegrityViolation),

    /// Catalog definition file could not be parsed
    #[error("invalid catalog definition: {0}")]
    Definition(String),
}

impl CatalogError {
    /// Fatal errors must abort catalog loading
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Integrity(_) | Self::Definition(_))
    }
}

/// Construction-time integrity violations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityViolation {
    /// Same cause registered twice
    #[error("cause '{0}' is registered more than once")]
    DuplicateCause(CauseId),

    /// Same node id used twice in one tree
    #[error("node '{node}' appears more than once in tree '{cause}'")]
    DuplicateNode {
        /// Owning cause
        cause: CauseId,
        /// Duplicated node
        node: NodeId,
    },

    /// Tree has no nodes at all
    #[error("tree '{0}' has no nodes")]
    EmptyTree(CauseId),

    /// Every node has a parent
    #[error("tree '{0}' has no root node")]
    NoRoot(CauseId),

    /// Parent reference does not resolve within the tree
    #[error("node '{node}' in tree '{cause}' references unknown parent '{parent}'")]
    UnknownParent {
        /// Owning cause
        cause: CauseId,
        /// Node holding the reference
        node: NodeId,
        /// Missing parent
        parent: NodeId,
    },

    /// Node lists itself as a prerequisite
    #[error("node '{node}' in tree '{cause}' lists itself as a parent")]
    SelfParent {
        /// Owning cause
        cause: CauseId,
        /// Offending node
        node: NodeId,
    },

    /// Prerequisite edges form a cycle
    #[error("cycle in tree '{cause}' through: {}", render_nodes(.nodes))]
    Cycle {
        /// Owning cause
        cause: CauseId,
        /// Nodes participating in the cycle
        nodes: Vec<NodeId>,
    },

    /// Goal thresholds are out of range
    #[error("node '{node}' in tree '{cause}' has an invalid goal: {reason}")]
    InvalidGoal {
        /// Owning cause
        cause: CauseId,
        /// Offending node
        node: NodeId,
        /// What is wrong
        reason: String,
    },

    /// Default nonprofit is missing or not eligible
    #[error("node '{node}' in tree '{cause}' has an invalid default nonprofit: {reason}")]
    InvalidNonprofitDefault {
        /// Owning cause
        cause: CauseId,
        /// Offending node
        node: NodeId,
        /// What is wrong
        reason: String,
    },
}

fn render_nodes(nodes: &[NodeId]) -> String {
    nodes
        .iter()
        .map(NodeId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_lists_nodes() {
        let err = IntegrityViolation::Cycle {
            cause: CauseId::from("environmental"),
            nodes: vec![NodeId::from("a"), NodeId::from("b")],
        };
        assert_eq!(
            err.to_string(),
            "cycle in tree 'environmental' through: a -> b"
        );
    }

    #[test]
    fn integrity_errors_are_fatal() {
        let err: CatalogError = IntegrityViolation::NoRoot(CauseId::from("x")).into();
        assert!(err.is_fatal());
        assert!(!CatalogError::UnknownCause(CauseId::from("x")).is_fatal());
    }
}
