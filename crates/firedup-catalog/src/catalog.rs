//! Validated, read-only goal-tree catalog
//!
//! A `Catalog` can only be obtained from [`CatalogBuilder::build`], so every
//! tree it holds has already passed the integrity checks.
//!
//! [`CatalogBuilder::build`]: crate::builder::CatalogBuilder::build

use crate::builder::CatalogBuilder;
use crate::error::CatalogError;
use crate::ids::{CauseId, NodeId};
use crate::node::{Cause, GoalNode};
use indexmap::IndexMap;
use std::collections::HashMap;

/// One cause and its validated goal tree
#[derive(Debug, Clone, PartialEq)]
pub struct CauseTree {
    pub(crate) cause: Cause,
    pub(crate) nodes: IndexMap<NodeId, GoalNode>,
    pub(crate) children: HashMap<NodeId, Vec<NodeId>>,
    pub(crate) topological_order: Vec<NodeId>,
}

impl CauseTree {
    /// The cause this tree belongs to
    #[inline]
    #[must_use]
    pub fn cause(&self) -> &Cause {
        &self.cause
    }

    /// Nodes in authoring order
    pub fn nodes(&self) -> impl ExactSizeIterator<Item = &GoalNode> + '_ {
        self.nodes.values()
    }

    /// Number of nodes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false for a validated tree
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a node
    #[inline]
    #[must_use]
    pub fn get(&self, node: &NodeId) -> Option<&GoalNode> {
        self.nodes.get(node)
    }

    /// Direct dependents of `node`, in authoring order
    #[must_use]
    pub fn children(&self, node: &NodeId) -> &[NodeId] {
        self.children.get(node).map(Vec::as_slice).unwrap_or_default()
    }

    /// Nodes without prerequisites
    pub fn roots(&self) -> impl Iterator<Item = &GoalNode> + '_ {
        self.nodes.values().filter(|n| n.is_root())
    }

    /// Nodes ordered so that every parent precedes its children
    #[inline]
    #[must_use]
    pub fn topological_order(&self) -> &[NodeId] {
        &self.topological_order
    }
}

/// The full catalog of causes and their goal trees
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub(crate) trees: IndexMap<CauseId, CauseTree>,
}

impl Catalog {
    /// Start building a catalog
    #[inline]
    #[must_use]
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::new()
    }

    /// Causes in registration order
    pub fn causes(&self) -> impl ExactSizeIterator<Item = &Cause> + '_ {
        self.trees.values().map(|t| &t.cause)
    }

    /// Whether `cause` is registered
    #[inline]
    #[must_use]
    pub fn contains_cause(&self, cause: &CauseId) -> bool {
        self.trees.contains_key(cause)
    }

    /// Tree for `cause`
    ///
    /// # Errors
    /// - `CatalogError::UnknownCause` if the cause is not registered
    pub fn tree(&self, cause: &CauseId) -> Result<&CauseTree, CatalogError> {
        self.trees
            .get(cause)
            .ok_or_else(|| CatalogError::UnknownCause(cause.clone()))
    }

    /// Node `node` of `cause`
    ///
    /// # Errors
    /// - `CatalogError::UnknownCause` if the cause is not registered
    /// - `CatalogError::UnknownNode` if the node is not in the cause's tree
    pub fn node(&self, cause: &CauseId, node: &NodeId) -> Result<&GoalNode, CatalogError> {
        self.tree(cause)?
            .get(node)
            .ok_or_else(|| CatalogError::UnknownNode {
                cause: cause.clone(),
                node: node.clone(),
            })
    }

    /// Direct dependents of a node
    ///
    /// # Errors
    /// Same as [`Catalog::node`]
    pub fn children(&self, cause: &CauseId, node: &NodeId) -> Result<&[NodeId], CatalogError> {
        self.node(cause, node)?;
        Ok(self.tree(cause)?.children(node))
    }

    /// Root nodes of a cause's tree
    ///
    /// # Errors
    /// - `CatalogError::UnknownCause` if the cause is not registered
    pub fn roots(&self, cause: &CauseId) -> Result<Vec<&GoalNode>, CatalogError> {
        Ok(self.tree(cause)?.roots().collect())
    }

    /// Parent-first ordering of a cause's tree
    ///
    /// # Errors
    /// - `CatalogError::UnknownCause` if the cause is not registered
    pub fn topological_order(&self, cause: &CauseId) -> Result<&[NodeId], CatalogError> {
        Ok(self.tree(cause)?.topological_order())
    }

    /// Number of registered causes
    #[inline]
    #[must_use]
    pub fn cause_count(&self) -> usize {
        self.trees.len()
    }
}
