//! Catalog builder
//!
//! Collects causes and their nodes, then validates every tree once in
//! [`CatalogBuilder::build`]. A malformed tree aborts the whole build; no node
//! is ever dropped silently.
//!
//! ```rust,ignore
//! let catalog = Catalog::builder()
//!     .cause(cause, nodes)
//!     .build()?;
//! ```

use crate::catalog::{Catalog, CauseTree};
use crate::error::{CatalogError, IntegrityViolation};
use crate::ids::{CauseId, NodeId};
use crate::node::{Cause, GoalKind, GoalNode};
use indexmap::IndexMap;
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use std::collections::{HashMap, HashSet};

/// Builder for a validated [`Catalog`]
#[derive(Debug, Clone, Default)]
pub struct CatalogBuilder {
    causes: Vec<(Cause, Vec<GoalNode>)>,
}

impl CatalogBuilder {
    /// Create an empty builder
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a cause and its tree
    #[must_use]
    pub fn cause(mut self, cause: Cause, nodes: Vec<GoalNode>) -> Self {
        self.add_cause(cause, nodes);
        self
    }

    /// Register a cause and its tree in place
    pub fn add_cause(&mut self, cause: Cause, nodes: Vec<GoalNode>) -> &mut Self {
        self.causes.push((cause, nodes));
        self
    }

    /// Number of registered causes
    #[inline]
    #[must_use]
    pub fn cause_count(&self) -> usize {
        self.causes.len()
    }

    /// Validate every tree and produce the catalog
    ///
    /// # Errors
    /// - `CatalogError::Integrity` for duplicate causes or any malformed tree
    pub fn build(self) -> Result<Catalog, CatalogError> {
        let mut trees: IndexMap<CauseId, CauseTree> = IndexMap::with_capacity(self.causes.len());

        for (cause, nodes) in self.causes {
            if trees.contains_key(&cause.id) {
                return Err(IntegrityViolation::DuplicateCause(cause.id).into());
            }
            let tree = validate_tree(cause, nodes)?;
            tracing::debug!(
                cause = %tree.cause.id,
                nodes = tree.nodes.len(),
                "validated goal tree"
            );
            trees.insert(tree.cause.id.clone(), tree);
        }

        tracing::info!(causes = trees.len(), "goal-tree catalog built");
        Ok(Catalog { trees })
    }
}

fn validate_tree(cause: Cause, nodes: Vec<GoalNode>) -> Result<CauseTree, IntegrityViolation> {
    if nodes.is_empty() {
        return Err(IntegrityViolation::EmptyTree(cause.id));
    }

    let mut by_id: IndexMap<NodeId, GoalNode> = IndexMap::with_capacity(nodes.len());
    for node in nodes {
        if by_id.contains_key(&node.id) {
            return Err(IntegrityViolation::DuplicateNode {
                cause: cause.id,
                node: node.id,
            });
        }
        by_id.insert(node.id.clone(), node);
    }

    for node in by_id.values() {
        check_node(&cause.id, node, &by_id)?;
    }

    if !by_id.values().any(GoalNode::is_root) {
        return Err(IntegrityViolation::NoRoot(cause.id));
    }

    let topological_order = order_tree(&cause.id, &by_id)?;

    let mut children: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for node in by_id.values() {
        for parent in &node.parent_ids {
            children
                .entry(parent.clone())
                .or_default()
                .push(node.id.clone());
        }
    }

    Ok(CauseTree {
        cause,
        nodes: by_id,
        children,
        topological_order,
    })
}

fn check_node(
    cause: &CauseId,
    node: &GoalNode,
    tree: &IndexMap<NodeId, GoalNode>,
) -> Result<(), IntegrityViolation> {
    for parent in &node.parent_ids {
        if parent == &node.id {
            return Err(IntegrityViolation::SelfParent {
                cause: cause.clone(),
                node: node.id.clone(),
            });
        }
        if !tree.contains_key(parent) {
            return Err(IntegrityViolation::UnknownParent {
                cause: cause.clone(),
                node: node.id.clone(),
                parent: parent.clone(),
            });
        }
    }

    check_goal(node).map_err(|reason| IntegrityViolation::InvalidGoal {
        cause: cause.clone(),
        node: node.id.clone(),
        reason,
    })?;

    check_nonprofits(node).map_err(|reason| IntegrityViolation::InvalidNonprofitDefault {
        cause: cause.clone(),
        node: node.id.clone(),
        reason,
    })
}

fn check_goal(node: &GoalNode) -> Result<(), String> {
    match node.goal {
        GoalKind::TotalDonation { target_amount_usd } => {
            if !target_amount_usd.is_finite() || target_amount_usd < 0.0 {
                return Err(format!(
                    "target amount must be a finite, non-negative number (got {target_amount_usd})"
                ));
            }
            // Zero-target entry milestones are only meaningful at the top of a tree.
            if target_amount_usd == 0.0 && !node.is_root() {
                return Err("only root nodes may have a zero target amount".to_string());
            }
        }
        GoalKind::MonthlyCommitment {
            required_months,
            minimum_monthly_amount_usd,
        } => {
            if required_months == 0 {
                return Err("required months must be at least 1".to_string());
            }
            if !minimum_monthly_amount_usd.is_finite() || minimum_monthly_amount_usd <= 0.0 {
                return Err(format!(
                    "minimum monthly amount must be a finite, positive number (got {minimum_monthly_amount_usd})"
                ));
            }
        }
    }
    Ok(())
}

fn check_nonprofits(node: &GoalNode) -> Result<(), String> {
    match &node.default_nonprofit_id {
        Some(default) if !node.nonprofit_ids.contains(default) => Err(format!(
            "'{default}' is not one of the node's nonprofits"
        )),
        None if !node.nonprofit_ids.is_empty() => {
            Err("a default is required when nonprofits are listed".to_string())
        }
        _ => Ok(()),
    }
}

/// Topologically order a tree, reporting the offending nodes on a cycle
fn order_tree(
    cause: &CauseId,
    tree: &IndexMap<NodeId, GoalNode>,
) -> Result<Vec<NodeId>, IntegrityViolation> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::with_capacity(tree.len(), tree.len());
    for id in tree.keys() {
        graph.add_node(id.as_str());
    }
    for node in tree.values() {
        for parent in &node.parent_ids {
            graph.add_edge(parent.as_str(), node.id.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(NodeId::from).collect()),
        Err(_) => {
            let component = tarjan_scc(&graph)
                .into_iter()
                .find(|scc| scc.len() > 1)
                .unwrap_or_default();
            Err(IntegrityViolation::Cycle {
                cause: cause.clone(),
                nodes: trace_cycle(&graph, &component)
                    .into_iter()
                    .map(NodeId::from)
                    .collect(),
            })
        }
    }
}

/// Walk one concrete cycle inside a strongly connected component
fn trace_cycle<'a>(graph: &DiGraphMap<&'a str, ()>, component: &[&'a str]) -> Vec<&'a str> {
    let Some(&start) = component.first() else {
        return Vec::new();
    };
    let members: HashSet<&str> = component.iter().copied().collect();
    let mut path = vec![start];
    let mut seen = HashSet::new();

    fn walk<'a>(
        graph: &DiGraphMap<&'a str, ()>,
        members: &HashSet<&'a str>,
        start: &'a str,
        current: &'a str,
        path: &mut Vec<&'a str>,
        seen: &mut HashSet<&'a str>,
    ) -> bool {
        for next in graph.neighbors_directed(current, Direction::Outgoing) {
            if !members.contains(next) {
                continue;
            }
            if next == start {
                path.push(start);
                return true;
            }
            if seen.insert(next) {
                path.push(next);
                if walk(graph, members, start, next, path, seen) {
                    return true;
                }
                path.pop();
            }
        }
        false
    }

    if walk(graph, &members, start, start, &mut path, &mut seen) {
        path
    } else {
        component.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cause() -> Cause {
        Cause::new("c", "Cause", "", "globe")
    }

    fn build(nodes: Vec<GoalNode>) -> Result<Catalog, CatalogError> {
        CatalogBuilder::new().cause(cause(), nodes).build()
    }

    fn violation(result: Result<Catalog, CatalogError>) -> IntegrityViolation {
        match result {
            Err(CatalogError::Integrity(v)) => v,
            other => panic!("expected integrity violation, got {other:?}"),
        }
    }

    #[test]
    fn rejects_empty_tree() {
        assert_eq!(
            violation(build(vec![])),
            IntegrityViolation::EmptyTree(CauseId::from("c"))
        );
    }

    #[test]
    fn rejects_duplicate_cause() {
        let result = CatalogBuilder::new()
            .cause(cause(), vec![GoalNode::total_donation("r", "Root", 1.0)])
            .cause(cause(), vec![GoalNode::total_donation("r", "Root", 1.0)])
            .build();
        assert_eq!(
            violation(result),
            IntegrityViolation::DuplicateCause(CauseId::from("c"))
        );
    }

    #[test]
    fn rejects_duplicate_node() {
        let v = violation(build(vec![
            GoalNode::total_donation("r", "Root", 1.0),
            GoalNode::total_donation("r", "Again", 1.0),
        ]));
        assert!(matches!(v, IntegrityViolation::DuplicateNode { .. }));
    }

    #[test]
    fn rejects_unknown_parent() {
        let v = violation(build(vec![
            GoalNode::total_donation("r", "Root", 1.0),
            GoalNode::total_donation("a", "A", 1.0).with_parents(["ghost"]),
        ]));
        assert_eq!(
            v,
            IntegrityViolation::UnknownParent {
                cause: CauseId::from("c"),
                node: NodeId::from("a"),
                parent: NodeId::from("ghost"),
            }
        );
    }

    #[test]
    fn rejects_self_parent() {
        let v = violation(build(vec![
            GoalNode::total_donation("r", "Root", 1.0),
            GoalNode::total_donation("a", "A", 1.0).with_parents(["a"]),
        ]));
        assert!(matches!(v, IntegrityViolation::SelfParent { .. }));
    }

    #[test]
    fn rejects_tree_without_root() {
        let v = violation(build(vec![
            GoalNode::total_donation("a", "A", 1.0).with_parents(["b"]),
            GoalNode::total_donation("b", "B", 1.0).with_parents(["a"]),
        ]));
        assert_eq!(v, IntegrityViolation::NoRoot(CauseId::from("c")));
    }

    #[test]
    fn rejects_cycle_below_root() {
        let v = violation(build(vec![
            GoalNode::total_donation("r", "Root", 1.0),
            GoalNode::total_donation("a", "A", 1.0).with_parents(["r", "c"]),
            GoalNode::total_donation("b", "B", 1.0).with_parents(["a"]),
            GoalNode::total_donation("c", "C", 1.0).with_parents(["b"]),
        ]));
        match v {
            IntegrityViolation::Cycle { nodes, .. } => {
                assert_eq!(nodes.first(), nodes.last());
                assert_eq!(nodes.len(), 4);
                for id in ["a", "b", "c"] {
                    assert!(nodes.iter().any(|n| n.as_str() == id));
                }
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn zero_target_is_only_allowed_on_roots() {
        assert!(build(vec![GoalNode::total_donation("r", "Root", 0.0)]).is_ok());

        let v = violation(build(vec![
            GoalNode::total_donation("r", "Root", 0.0),
            GoalNode::total_donation("a", "A", 0.0).with_parents(["r"]),
        ]));
        assert!(matches!(v, IntegrityViolation::InvalidGoal { .. }));
    }

    #[test]
    fn rejects_bad_thresholds() {
        for node in [
            GoalNode::total_donation("r", "Root", -1.0),
            GoalNode::total_donation("r", "Root", f64::NAN),
            GoalNode::monthly_commitment("r", "Root", 0, 10.0),
            GoalNode::monthly_commitment("r", "Root", 3, 0.0),
        ] {
            let v = violation(build(vec![node]));
            assert!(matches!(v, IntegrityViolation::InvalidGoal { .. }), "{v}");
        }
    }

    #[test]
    fn rejects_default_outside_nonprofits() {
        let v = violation(build(vec![GoalNode::total_donation("r", "Root", 1.0)
            .with_nonprofits(["a"])
            .with_default_nonprofit("b")]));
        assert!(matches!(v, IntegrityViolation::InvalidNonprofitDefault { .. }));

        let mut missing_default =
            GoalNode::total_donation("r", "Root", 1.0).with_nonprofits(["a"]);
        missing_default.default_nonprofit_id = None;
        let v = violation(build(vec![missing_default]));
        assert!(matches!(v, IntegrityViolation::InvalidNonprofitDefault { .. }));
    }
}
