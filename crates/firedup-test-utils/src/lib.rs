//! Testing utilities for the Fired Up workspace
//!
//! Small fixture catalogs and a once-only tracing subscriber.

#![allow(missing_docs)]

use firedup_catalog::{Catalog, Cause, CauseId, GoalNode, NodeId};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

static TRACING: OnceCell<()> = OnceCell::new();

/// Install a test-writer subscriber, honouring `RUST_LOG`. Safe to call from every test.
pub fn init_tracing() {
    TRACING.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

pub const CAUSE: &str = "test-cause";

pub fn cause_id() -> CauseId {
    CauseId::from(CAUSE)
}

pub fn node_id(id: &str) -> NodeId {
    NodeId::from(id)
}

fn test_cause() -> Cause {
    Cause::new(CAUSE, "Test Cause", "Fixture cause", "flask")
}

/// Root `R` (total 100) and child `C1` (total 100, parent `R`)
pub fn scenario_a_catalog() -> Arc<Catalog> {
    let catalog = Catalog::builder()
        .cause(
            test_cause(),
            vec![
                GoalNode::total_donation("R", "Root", 100.0),
                GoalNode::total_donation("C1", "Child", 100.0).with_parents(["R"]),
            ],
        )
        .build()
        .unwrap();
    Arc::new(catalog)
}

/// A single monthly root `M` needing three months, plus a total-donation
/// sibling `T` so goal-type mismatches can be exercised
pub fn scenario_b_catalog() -> Arc<Catalog> {
    let catalog = Catalog::builder()
        .cause(
            test_cause(),
            vec![
                GoalNode::monthly_commitment("M", "Monthly", 3, 10.0)
                    .with_nonprofits(["npo-1", "npo-2"]),
                GoalNode::total_donation("T", "Total", 50.0),
            ],
        )
        .build()
        .unwrap();
    Arc::new(catalog)
}

/// Two branches `A` and `B` feeding a capstone `CAP`
///
/// `A` is a total-donation root (target 100), `B` a monthly root (2 months).
pub fn capstone_catalog() -> Arc<Catalog> {
    let catalog = Catalog::builder()
        .cause(
            test_cause(),
            vec![
                GoalNode::total_donation("A", "Branch A", 100.0),
                GoalNode::monthly_commitment("B", "Branch B", 2, 10.0),
                GoalNode::total_donation("CAP", "Capstone", 250.0).with_parents(["A", "B"]),
            ],
        )
        .build()
        .unwrap();
    Arc::new(catalog)
}

/// Zero-target root `Z` (complete from the start) and child `C1` (total 100)
pub fn zero_root_catalog() -> Arc<Catalog> {
    let catalog = Catalog::builder()
        .cause(
            test_cause(),
            vec![
                GoalNode::total_donation("Z", "Welcome", 0.0),
                GoalNode::total_donation("C1", "Child", 100.0).with_parents(["Z"]),
            ],
        )
        .build()
        .unwrap();
    Arc::new(catalog)
}

/// The built-in catalog, shared
pub fn builtin_catalog() -> Arc<Catalog> {
    Arc::new(Catalog::builtin().unwrap())
}
