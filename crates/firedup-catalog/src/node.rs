//! Causes and goal nodes
//!
//! Defines the immutable catalog data:
//! - `Cause`: a top-level donation category
//! - `GoalNode`: one milestone in a cause's goal tree
//! - `GoalKind`: how a milestone is measured, with its thresholds

use crate::ids::{CauseId, NodeId, NonprofitId};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// A charitable cause with its own goal tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cause {
    /// Cause identifier
    pub id: CauseId,
    /// Display name
    pub name: String,
    /// Short description
    pub description: String,
    /// Icon name understood by the presentation layer
    pub icon: String,
}

impl Cause {
    /// Create a cause
    #[must_use]
    pub fn new(
        id: impl Into<CauseId>,
        name: impl Into<String>,
        description: impl Into<String>,
        icon: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            icon: icon.into(),
        }
    }
}

/// Discriminant of [`GoalKind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    /// Completed by accumulating a total donated amount
    TotalDonation,
    /// Completed by sustaining a monthly commitment for a number of months
    MonthlyCommitment,
}

impl std::fmt::Display for GoalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GoalType::TotalDonation => f.write_str("total_donation"),
            GoalType::MonthlyCommitment => f.write_str("monthly_commitment"),
        }
    }
}

/// How a goal node is measured
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "goal_type", rename_all = "snake_case")]
pub enum GoalKind {
    /// Reach a cumulative donated amount
    TotalDonation {
        /// Amount that completes the node
        target_amount_usd: f64,
    },
    /// Keep a monthly commitment going
    MonthlyCommitment {
        /// Months needed to complete the node
        required_months: u32,
        /// Smallest monthly amount that counts as a month
        minimum_monthly_amount_usd: f64,
    },
}

impl GoalKind {
    /// Goal type discriminant
    #[inline]
    #[must_use]
    pub fn goal_type(&self) -> GoalType {
        match self {
            GoalKind::TotalDonation { .. } => GoalType::TotalDonation,
            GoalKind::MonthlyCommitment { .. } => GoalType::MonthlyCommitment,
        }
    }
}

/// A milestone in a cause's goal tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalNode {
    /// Node identifier, unique within the tree
    pub id: NodeId,
    /// Display title
    pub title: String,
    /// Longer description
    pub description: String,
    /// Goal measurement and thresholds
    #[serde(flatten)]
    pub goal: GoalKind,
    /// Prerequisites; all of them must be complete to unlock this node
    #[serde(default)]
    pub parent_ids: IndexSet<NodeId>,
    /// Nonprofits that donations for this node may go to
    #[serde(default)]
    pub nonprofit_ids: IndexSet<NonprofitId>,
    /// Nonprofit preselected when the user has not chosen one
    #[serde(default)]
    pub default_nonprofit_id: Option<NonprofitId>,
}

impl GoalNode {
    /// Create a total-donation node with no parents or nonprofits
    #[must_use]
    pub fn total_donation(
        id: impl Into<NodeId>,
        title: impl Into<String>,
        target_amount_usd: f64,
    ) -> Self {
        Self::with_goal(
            id,
            title,
            GoalKind::TotalDonation { target_amount_usd },
        )
    }

    /// Create a monthly-commitment node with no parents or nonprofits
    #[must_use]
    pub fn monthly_commitment(
        id: impl Into<NodeId>,
        title: impl Into<String>,
        required_months: u32,
        minimum_monthly_amount_usd: f64,
    ) -> Self {
        Self::with_goal(
            id,
            title,
            GoalKind::MonthlyCommitment {
                required_months,
                minimum_monthly_amount_usd,
            },
        )
    }

    fn with_goal(id: impl Into<NodeId>, title: impl Into<String>, goal: GoalKind) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            goal,
            parent_ids: IndexSet::new(),
            nonprofit_ids: IndexSet::new(),
            default_nonprofit_id: None,
        }
    }

    /// With description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// With prerequisite nodes
    #[must_use]
    pub fn with_parents<I, N>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<NodeId>,
    {
        self.parent_ids = parents.into_iter().map(Into::into).collect();
        self
    }

    /// With eligible nonprofits; the first one becomes the default
    #[must_use]
    pub fn with_nonprofits<I, N>(mut self, nonprofits: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<NonprofitId>,
    {
        self.nonprofit_ids = nonprofits.into_iter().map(Into::into).collect();
        self.default_nonprofit_id = self.nonprofit_ids.first().cloned();
        self
    }

    /// With an explicit default nonprofit
    #[must_use]
    pub fn with_default_nonprofit(mut self, nonprofit: impl Into<NonprofitId>) -> Self {
        self.default_nonprofit_id = Some(nonprofit.into());
        self
    }

    /// Goal type discriminant
    #[inline]
    #[must_use]
    pub fn goal_type(&self) -> GoalType {
        self.goal.goal_type()
    }

    /// Root nodes have no prerequisites and are always unlocked
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_ids.is_empty()
    }

    /// Target amount, for total-donation nodes
    #[inline]
    #[must_use]
    pub fn target_amount_usd(&self) -> Option<f64> {
        match self.goal {
            GoalKind::TotalDonation { target_amount_usd } => Some(target_amount_usd),
            GoalKind::MonthlyCommitment { .. } => None,
        }
    }

    /// Required months, for monthly-commitment nodes
    #[inline]
    #[must_use]
    pub fn required_months(&self) -> Option<u32> {
        match self.goal {
            GoalKind::MonthlyCommitment {
                required_months, ..
            } => Some(required_months),
            GoalKind::TotalDonation { .. } => None,
        }
    }

    /// Whether donations for this node may go to `nonprofit`
    #[inline]
    #[must_use]
    pub fn accepts_nonprofit(&self, nonprofit: &NonprofitId) -> bool {
        self.nonprofit_ids.contains(nonprofit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_nonprofit_becomes_default() {
        let node = GoalNode::total_donation("plant-trees", "Plant Native Trees", 300.0)
            .with_nonprofits(["one-tree-planted", "arbor-day"]);

        assert_eq!(
            node.default_nonprofit_id,
            Some(NonprofitId::from("one-tree-planted"))
        );
        assert!(node.accepts_nonprofit(&NonprofitId::from("arbor-day")));
        assert!(!node.accepts_nonprofit(&NonprofitId::from("wwf")));
    }

    #[test]
    fn goal_fields_are_flattened_in_json() {
        let node = GoalNode::monthly_commitment("monthly-3", "Monthly Support", 3, 10.0)
            .with_parents(["plant-trees"]);

        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["goal_type"], "monthly_commitment");
        assert_eq!(json["required_months"], 3);

        let back: GoalNode = serde_json::from_value(json).unwrap();
        assert_eq!(back, node);
        assert_eq!(back.required_months(), Some(3));
        assert_eq!(back.target_amount_usd(), None);
    }
}
