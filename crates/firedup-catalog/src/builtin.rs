//! Built-in causes and goal trees shipped with the app

use crate::catalog::Catalog;
use crate::error::CatalogError;
use crate::ids::{NodeId, NonprofitId};
use crate::node::{Cause, GoalNode};
use crate::template::subcategory_branch;

impl Catalog {
    /// The catalog shipped with the app
    ///
    /// # Errors
    /// - `CatalogError::Integrity` if the built-in data is malformed
    pub fn builtin() -> Result<Self, CatalogError> {
        let [environmental, education, mental_health, animal_welfare] = causes();

        Catalog::builder()
            .cause(environmental, environmental_tree())
            .cause(
                education,
                templated_tree(
                    "Champion Learning",
                    "Your journey to expanding access to education begins here.",
                    &[
                        ("literacy", "Childhood Literacy", "Put books in young readers' hands.", "room-to-read"),
                        ("scholarships", "Scholarships", "Help students afford higher education.", "scholarship-america"),
                        ("stem", "STEM Access", "Bring science and coding classes to more schools.", "code-org"),
                    ],
                    ("Lifelong Learning Advocate", "You've opened doors for learners everywhere.", 2500.0),
                ),
            )
            .cause(
                mental_health,
                templated_tree(
                    "Care for Minds",
                    "Your journey to supporting mental wellness begins here.",
                    &[
                        ("crisis-support", "Crisis Support", "Keep crisis lines staffed around the clock.", "crisis-text-line"),
                        ("youth-wellness", "Youth Wellness", "Support mental health programs for young people.", "jed-foundation"),
                    ],
                    ("Mental Wellness Champion", "You've helped people through their hardest moments.", 2000.0),
                ),
            )
            .cause(
                animal_welfare,
                templated_tree(
                    "Protect Animals",
                    "Your journey to protecting animals begins here.",
                    &[
                        ("shelters", "Animal Shelters", "Fund food, care and adoption at local shelters.", "aspca"),
                        ("wildlife", "Wildlife Conservation", "Protect endangered species and their habitats.", "wildlife-conservation"),
                    ],
                    ("Guardian of Creatures", "You've made a lasting difference for animals.", 2000.0),
                ),
            )
            .build()
    }
}

fn causes() -> [Cause; 4] {
    [
        Cause::new(
            "environmental",
            "Environmental Protection",
            "Support conservation, reforestation, and climate action",
            "globe",
        ),
        Cause::new(
            "education",
            "Education",
            "Fund learning opportunities worldwide",
            "book-open",
        ),
        Cause::new(
            "mental-health",
            "Mental Health",
            "Support mental wellness initiatives",
            "heart",
        ),
        Cause::new(
            "animal-welfare",
            "Animal Welfare",
            "Protect and care for animals",
            "github",
        ),
    ]
}

fn environmental_tree() -> Vec<GoalNode> {
    vec![
        // Tier 0
        GoalNode::total_donation("root", "Protect the Planet", 0.0)
            .with_description("Your journey to environmental stewardship begins here."),
        // Tier 1
        GoalNode::total_donation("plant-trees", "Plant Native Trees", 300.0)
            .with_description("Fund native tree planting initiatives in your region.")
            .with_parents(["root"])
            .with_nonprofits(["one-tree-planted", "arbor-day"]),
        GoalNode::total_donation("reduce-plastic", "Reduce Plastic Waste", 200.0)
            .with_description("Support organizations fighting plastic pollution.")
            .with_parents(["root"])
            .with_nonprofits(["ocean-conservancy", "plastic-pollution"]),
        GoalNode::total_donation("wildlife-rescue", "Support Wildlife Rescue", 250.0)
            .with_description("Help rescue and rehabilitate wildlife in need.")
            .with_parents(["root"])
            .with_nonprofits(["wildlife-rescue", "wwf"]),
        // Tier 2
        GoalNode::total_donation("urban-reforestation", "Urban Reforestation Project", 600.0)
            .with_description("Fund large-scale tree planting in urban areas.")
            .with_parents(["plant-trees"])
            .with_nonprofits(["one-tree-planted", "arbor-day"]),
        GoalNode::monthly_commitment("monthly-reforestation-3", "Monthly Reforestation Support", 3, 10.0)
            .with_description("Commit to 3 months of ongoing reforestation support.")
            .with_parents(["plant-trees"])
            .with_nonprofits(["one-tree-planted"]),
        GoalNode::total_donation("community-cleanup", "Community Cleanup Funding", 400.0)
            .with_description("Support community-led cleanup initiatives.")
            .with_parents(["reduce-plastic"])
            .with_nonprofits(["ocean-conservancy"]),
        GoalNode::monthly_commitment("monthly-waste-6", "Monthly Waste Reduction Support", 6, 10.0)
            .with_description("Commit to 6 months of waste reduction advocacy.")
            .with_parents(["reduce-plastic"])
            .with_nonprofits(["plastic-pollution"]),
        // Tier 3
        GoalNode::monthly_commitment("monthly-reforestation-6", "Reforestation Commitment (6 months)", 6, 15.0)
            .with_description("Deepen your commitment with 6 months of support.")
            .with_parents(["monthly-reforestation-3"])
            .with_nonprofits(["one-tree-planted"]),
        GoalNode::monthly_commitment("monthly-reforestation-12", "Reforestation Commitment (12 months)", 12, 20.0)
            .with_description("A full year of sustained reforestation support.")
            .with_parents(["monthly-reforestation-3"])
            .with_nonprofits(["one-tree-planted"]),
        GoalNode::total_donation("habitat-restoration", "Regional Habitat Restoration", 1500.0)
            .with_description("Major funding for regional ecosystem restoration.")
            .with_parents(["urban-reforestation"])
            .with_nonprofits(["one-tree-planted", "wwf"])
            .with_default_nonprofit("wwf"),
        // Tier 4
        GoalNode::total_donation("capstone", "Sustained Environmental Stewardship", 3000.0)
            .with_description("You've made a lasting impact. $3,000 lifetime or 12-month commitment.")
            .with_parents(["habitat-restoration", "monthly-reforestation-12"])
            .with_nonprofits(["one-tree-planted", "wwf", "ocean-conservancy"])
            .with_default_nonprofit("wwf"),
    ]
}

/// Root, one templated branch per subcategory, and a capstone fed by every branch
fn templated_tree(
    root_title: &str,
    root_description: &str,
    branches: &[(&str, &str, &str, &str)],
    capstone: (&str, &str, f64),
) -> Vec<GoalNode> {
    let root = NodeId::from("root");
    let mut nodes = vec![
        GoalNode::total_donation(root.clone(), root_title, 0.0).with_description(root_description),
    ];
    let mut tips = Vec::with_capacity(branches.len());
    let mut nonprofits = Vec::with_capacity(branches.len());

    for &(prefix, title, description, nonprofit) in branches {
        let nonprofit = NonprofitId::from(nonprofit);
        let branch = subcategory_branch(prefix, title, description, &root, &nonprofit);
        nodes.extend(branch.nodes);
        tips.push(branch.tip);
        nonprofits.push(nonprofit);
    }

    let (title, description, target) = capstone;
    nodes.push(
        GoalNode::total_donation("capstone", title, target)
            .with_description(description)
            .with_parents(tips)
            .with_nonprofits(nonprofits),
    );
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::CauseId;
    use crate::node::GoalType;

    #[test]
    fn builtin_catalog_builds() {
        let catalog = Catalog::builtin().unwrap();
        let ids: Vec<_> = catalog.causes().map(|c| c.id.as_str()).collect();
        assert_eq!(
            ids,
            ["environmental", "education", "mental-health", "animal-welfare"]
        );
    }

    #[test]
    fn environmental_capstone_needs_two_branches() {
        let catalog = Catalog::builtin().unwrap();
        let capstone = catalog
            .node(&CauseId::from("environmental"), &NodeId::from("capstone"))
            .unwrap();
        assert_eq!(capstone.parent_ids.len(), 2);
        assert_eq!(capstone.goal_type(), GoalType::TotalDonation);
        assert_eq!(capstone.target_amount_usd(), Some(3000.0));
    }

    #[test]
    fn templated_trees_have_one_root_and_a_capstone() {
        let catalog = Catalog::builtin().unwrap();
        for cause in ["education", "mental-health", "animal-welfare"] {
            let cause = CauseId::from(cause);
            let roots = catalog.roots(&cause).unwrap();
            assert_eq!(roots.len(), 1);
            let capstone = catalog.node(&cause, &NodeId::from("capstone")).unwrap();
            assert!(capstone.parent_ids.len() >= 2);
        }
    }

    #[test]
    fn builtin_is_deterministic() {
        assert_eq!(Catalog::builtin().unwrap(), Catalog::builtin().unwrap());
    }
}
