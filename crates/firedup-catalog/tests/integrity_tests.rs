use firedup_catalog::{Catalog, CatalogError, Cause, CauseId, GoalNode, IntegrityViolation, NodeId};
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};

/// Follows parent links from `start`; true if `start` is its own ancestor
fn is_own_ancestor(parents: &HashMap<&str, Vec<&str>>, start: &str) -> bool {
    let mut stack: Vec<&str> = parents.get(start).cloned().unwrap_or_default();
    let mut seen = HashSet::new();
    while let Some(id) = stack.pop() {
        if id == start {
            return true;
        }
        if seen.insert(id) {
            stack.extend(parents.get(id).cloned().unwrap_or_default());
        }
    }
    false
}

#[test]
fn builtin_trees_are_acyclic() {
    let catalog = Catalog::builtin().unwrap();
    for cause in catalog.causes() {
        let tree = catalog.tree(&cause.id).unwrap();
        let parents: HashMap<&str, Vec<&str>> = tree
            .nodes()
            .map(|n| {
                (
                    n.id.as_str(),
                    n.parent_ids.iter().map(NodeId::as_str).collect(),
                )
            })
            .collect();
        for node in tree.nodes() {
            assert!(
                !is_own_ancestor(&parents, node.id.as_str()),
                "{} is its own ancestor in {}",
                node.id,
                cause.id
            );
        }
        assert!(tree.roots().count() >= 1);
    }
}

#[test]
fn builtin_parents_resolve_within_tree() {
    let catalog = Catalog::builtin().unwrap();
    for cause in catalog.causes() {
        let tree = catalog.tree(&cause.id).unwrap();
        for node in tree.nodes() {
            for parent in &node.parent_ids {
                assert!(tree.get(parent).is_some(), "{parent} missing in {}", cause.id);
            }
        }
    }
}

fn node_name(i: usize) -> String {
    format!("n{i}")
}

proptest! {
    /// Edges only from lower to higher index can never form a cycle
    #[test]
    fn prop_forward_edges_always_build(
        node_count in 2..15usize,
        edges in proptest::collection::vec((0..15usize, 0..15usize), 0..40)
    ) {
        let mut parents: Vec<Vec<String>> = vec![Vec::new(); node_count];
        for (a, b) in edges {
            let (lo, hi) = (a.min(b), a.max(b));
            if lo != hi && hi < node_count && !parents[hi].contains(&node_name(lo)) {
                parents[hi].push(node_name(lo));
            }
        }
        let nodes: Vec<GoalNode> = parents
            .into_iter()
            .enumerate()
            .map(|(i, ps)| GoalNode::total_donation(node_name(i), "Node", 10.0).with_parents(ps))
            .collect();

        let catalog = Catalog::builder()
            .cause(Cause::new("c", "Cause", "", "globe"), nodes)
            .build();
        prop_assert!(catalog.is_ok());

        let catalog = catalog.unwrap();
        let order = catalog.topological_order(&CauseId::from("c")).unwrap();
        prop_assert_eq!(order.len(), node_count);
    }

    /// Adding a back edge onto a forward chain is always rejected as a cycle
    #[test]
    fn prop_back_edge_is_rejected(
        node_count in 3..12usize,
        from in 1..12usize,
        to in 1..12usize,
    ) {
        let (from, to) = (from % node_count, to % node_count);
        prop_assume!(from >= 1 && to > from);

        // chain: n0 <- n1 <- n2 ... and n_from additionally depends on n_to
        let nodes: Vec<GoalNode> = (0..node_count)
            .map(|i| {
                let mut ps = Vec::new();
                if i > 0 {
                    ps.push(node_name(i - 1));
                }
                if i == from {
                    ps.push(node_name(to));
                }
                GoalNode::total_donation(node_name(i), "Node", 10.0).with_parents(ps)
            })
            .collect();

        let result = Catalog::builder()
            .cause(Cause::new("c", "Cause", "", "globe"), nodes)
            .build();
        let is_cycle = matches!(
            result,
            Err(CatalogError::Integrity(IntegrityViolation::Cycle { .. }))
        );
        prop_assert!(is_cycle);
    }
}
