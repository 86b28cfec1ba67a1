//! Repeating subtree shapes
//!
//! Several causes share the same progression per subcategory: a starter
//! donation, then a short monthly commitment alongside a larger project, then
//! a year-long commitment. `subcategory_branch` stamps that shape out under a
//! given parent. It is pure: the same arguments always yield the same nodes.

use crate::ids::{NodeId, NonprofitId};
use crate::node::GoalNode;

/// Nodes produced for one subcategory
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    /// Nodes in parent-first order
    pub nodes: Vec<GoalNode>,
    /// Deepest node of the branch, used to feed a capstone
    pub tip: NodeId,
}

/// Stamp out the subcategory shape
///
/// Produces `{prefix}-starter`, `{prefix}-monthly-3`, `{prefix}-project` and
/// `{prefix}-monthly-12`, all routed to `nonprofit`.
#[must_use]
pub fn subcategory_branch(
    prefix: &str,
    title: &str,
    description: &str,
    parent: &NodeId,
    nonprofit: &NonprofitId,
) -> Branch {
    let starter = NodeId::new(format!("{prefix}-starter"));
    let monthly_3 = NodeId::new(format!("{prefix}-monthly-3"));
    let project = NodeId::new(format!("{prefix}-project"));
    let monthly_12 = NodeId::new(format!("{prefix}-monthly-12"));

    let nodes = vec![
        GoalNode::total_donation(starter.clone(), title, 100.0)
            .with_description(description)
            .with_parents([parent.clone()])
            .with_nonprofits([nonprofit.clone()]),
        GoalNode::monthly_commitment(
            monthly_3.clone(),
            format!("Monthly {title} Support"),
            3,
            10.0,
        )
        .with_description(format!("Commit to 3 months of {} support.", title.to_lowercase()))
        .with_parents([starter.clone()])
        .with_nonprofits([nonprofit.clone()]),
        GoalNode::total_donation(project, format!("{title} Project"), 500.0)
            .with_description(format!("Fund a larger {} project.", title.to_lowercase()))
            .with_parents([starter])
            .with_nonprofits([nonprofit.clone()]),
        GoalNode::monthly_commitment(
            monthly_12.clone(),
            format!("{title} Commitment (12 months)"),
            12,
            15.0,
        )
        .with_description("A full year of sustained support.")
        .with_parents([monthly_3])
        .with_nonprofits([nonprofit.clone()]),
    ];

    Branch {
        nodes,
        tip: monthly_12,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn branch_is_deterministic() {
        let parent = NodeId::from("root");
        let npo = NonprofitId::from("room-to-read");
        let a = subcategory_branch("literacy", "Childhood Literacy", "Books.", &parent, &npo);
        let b = subcategory_branch("literacy", "Childhood Literacy", "Books.", &parent, &npo);
        assert_eq!(a, b);
    }

    #[test]
    fn branch_hangs_off_parent() {
        let parent = NodeId::from("root");
        let npo = NonprofitId::from("aspca");
        let branch = subcategory_branch("shelters", "Animal Shelters", "", &parent, &npo);

        assert_eq!(branch.nodes.len(), 4);
        assert_eq!(branch.tip, NodeId::from("shelters-monthly-12"));
        assert!(branch.nodes[0].parent_ids.contains(&parent));
        assert!(branch
            .nodes
            .iter()
            .all(|n| n.default_nonprofit_id.as_ref() == Some(&npo)));
    }
}
