use firedup_catalog::NonprofitId;
use firedup_ledger::{EngineError, EngineEvent, Ledger, NodeState, ProgressEngine};
use firedup_test_utils::{
    builtin_catalog, capstone_catalog, cause_id, init_tracing, node_id, scenario_a_catalog,
    scenario_b_catalog, zero_root_catalog,
};
use pretty_assertions::assert_eq;

#[test]
fn scenario_a_root_completion_unlocks_child() {
    init_tracing();
    let engine = ProgressEngine::new(scenario_a_catalog());
    let (cause, root, child) = (cause_id(), node_id("R"), node_id("C1"));

    assert!(engine.is_unlocked(&cause, &root).unwrap());
    assert!(!engine.is_unlocked(&cause, &child).unwrap());

    let partial = engine.apply_donation_to_node(&cause, &root, 50.0).unwrap();
    assert!(!partial.completed_now);
    assert!(!engine.is_unlocked(&cause, &child).unwrap());

    let outcome = engine.apply_donation_to_node(&cause, &root, 50.0).unwrap();
    assert!(outcome.completed_now);
    assert!(outcome.progress.completed);
    assert_eq!(outcome.newly_unlocked, vec![child.clone()]);
    assert!(engine.is_unlocked(&cause, &child).unwrap());
    assert_eq!(engine.node_state(&cause, &child).unwrap(), NodeState::Unlocked);
}

#[test]
fn scenario_b_monthly_commitment_completes_at_requirement() {
    init_tracing();
    let engine = ProgressEngine::new(scenario_b_catalog());
    let (cause, monthly) = (cause_id(), node_id("M"));

    for expected in 1..=3u32 {
        assert!(!engine.is_complete(&cause, &monthly).unwrap());
        let outcome = engine.advance_monthly_commitment(&cause, &monthly, 1).unwrap();
        assert_eq!(outcome.progress.monthly_commitment_months_completed, expected);
        assert_eq!(outcome.completed_now, expected == 3);
    }
    assert!(engine.is_complete(&cause, &monthly).unwrap());

    let clamped = engine.advance_monthly_commitment(&cause, &monthly, 1).unwrap();
    assert_eq!(clamped.progress.monthly_commitment_months_completed, 3);
    assert!(!clamped.completed_now);
    assert!((engine.progress_ratio(&cause, &monthly).unwrap() - 1.0).abs() < f64::EPSILON);
}

#[test]
fn scenario_c_donation_gets_generated_id() {
    let engine = ProgressEngine::new(scenario_a_catalog());
    let npo = NonprofitId::from("npo-1");

    let record = engine.record_donation(&cause_id(), &npo, 25.0).unwrap();
    let history = engine.donation_history();

    assert_eq!(history.len(), 1);
    assert_eq!(history[0], record);
    assert!((history[0].amount_usd - 25.0).abs() < f64::EPSILON);
    assert!(record.id.to_string().starts_with("donation-"));

    let second = engine.record_donation(&cause_id(), &npo, 25.0).unwrap();
    assert_ne!(second.id, record.id);
}

#[test]
fn scenario_d_invalid_amount_leaves_history_untouched() {
    let engine = ProgressEngine::new(scenario_a_catalog());
    let err = engine
        .record_donation(&cause_id(), &NonprofitId::from("npo-1"), -5.0)
        .unwrap_err();

    assert!(matches!(err, EngineError::InvalidAmount(_)));
    assert!(err.is_input_error());
    assert!(engine.donation_history().is_empty());
    assert_eq!(engine.version(), 0);
    assert!(engine.journal().is_empty());
}

#[test]
fn donations_do_not_move_node_progress() {
    let engine = ProgressEngine::new(scenario_a_catalog());
    engine
        .record_donation(&cause_id(), &NonprofitId::from("npo-1"), 500.0)
        .unwrap();

    assert_eq!(engine.node_progress(&cause_id(), &node_id("R")).unwrap(), None);
    assert!(!engine.is_complete(&cause_id(), &node_id("R")).unwrap());
    assert!((engine.total_donated_for_cause(&cause_id()) - 500.0).abs() < f64::EPSILON);
}

#[test]
fn capstone_needs_every_parent() {
    let engine = ProgressEngine::new(capstone_catalog());
    let cause = cause_id();

    engine.apply_donation_to_node(&cause, &node_id("A"), 100.0).unwrap();
    assert!(!engine.is_unlocked(&cause, &node_id("CAP")).unwrap());

    let early = engine
        .apply_donation_to_node(&cause, &node_id("CAP"), 10.0)
        .unwrap();
    assert!(!early.completed_now);
    assert_eq!(engine.node_state(&cause, &node_id("CAP")).unwrap(), NodeState::Locked);

    let unlocking = engine.advance_monthly_commitment(&cause, &node_id("B"), 2).unwrap();
    assert_eq!(unlocking.newly_unlocked, vec![node_id("CAP")]);
    assert!(engine.is_unlocked(&cause, &node_id("CAP")).unwrap());
    assert_eq!(
        engine.node_state(&cause, &node_id("CAP")).unwrap(),
        NodeState::InProgress
    );
    let kept = engine.node_progress(&cause, &node_id("CAP")).unwrap().unwrap();
    assert!((kept.amount_donated_usd - 10.0).abs() < f64::EPSILON);
    assert!((engine.progress_ratio(&cause, &node_id("CAP")).unwrap() - 0.04).abs() < 1e-9);
}

#[test]
fn zero_target_root_rejects_monthly_advance() {
    let engine = ProgressEngine::new(zero_root_catalog());
    let err = engine
        .advance_monthly_commitment(&cause_id(), &node_id("Z"), 1)
        .unwrap_err();

    assert!(matches!(err, EngineError::WrongGoalType { .. }));
    assert!(err.is_input_error());
    assert_eq!(engine.version(), 0);
    assert_eq!(engine.snapshot(), Ledger::new());
}

#[test]
fn zero_target_root_is_complete_before_it_is_written() {
    let engine = ProgressEngine::new(zero_root_catalog());
    let (cause, root, child) = (cause_id(), node_id("Z"), node_id("C1"));

    // Completion is derived from the threshold; nothing is stored until touched
    assert_eq!(engine.node_progress(&cause, &root).unwrap(), None);
    assert!(engine.is_complete(&cause, &root).unwrap());
    assert_eq!(engine.node_state(&cause, &root).unwrap(), NodeState::Completed);
    assert!(engine.is_unlocked(&cause, &child).unwrap());
    assert!(engine.consistency_violations().is_empty());

    let touched = engine.apply_donation_to_node(&cause, &root, 5.0).unwrap();
    assert!(!touched.completed_now);
    assert!(touched.newly_unlocked.is_empty());
    let stored = engine.node_progress(&cause, &root).unwrap().unwrap();
    assert!(stored.completed);
    assert!(!stored.completed_by_override);
}

#[test]
fn unknown_ids_are_rejected_without_mutation() {
    let engine = ProgressEngine::new(scenario_a_catalog());
    assert!(matches!(
        engine.set_active_cause(&firedup_catalog::CauseId::from("nope")),
        Err(EngineError::UnknownCause(_))
    ));
    assert!(matches!(
        engine.apply_donation_to_node(&cause_id(), &node_id("nope"), 10.0),
        Err(EngineError::UnknownNode { .. })
    ));
    assert!(matches!(
        engine.tree(&firedup_catalog::CauseId::from("nope")),
        Err(EngineError::UnknownCause(_))
    ));
    assert_eq!(engine.snapshot(), Ledger::new());
}

#[test]
fn reset_restores_initial_state() {
    let engine = ProgressEngine::new(scenario_a_catalog());
    engine.set_active_cause(&cause_id()).unwrap();
    engine.apply_donation_to_node(&cause_id(), &node_id("R"), 100.0).unwrap();
    engine
        .record_donation(&cause_id(), &NonprofitId::from("npo-1"), 100.0)
        .unwrap();

    engine.reset_all();
    assert_eq!(engine.snapshot(), Ledger::new());
    assert!(!engine.is_complete(&cause_id(), &node_id("R")).unwrap());
    assert!(!engine.is_unlocked(&cause_id(), &node_id("C1")).unwrap());
    assert_eq!(engine.active_cause(), None);
}

#[test]
fn snapshot_is_detached_from_engine() {
    let engine = ProgressEngine::new(scenario_a_catalog());
    engine.apply_donation_to_node(&cause_id(), &node_id("R"), 10.0).unwrap();

    let snapshot = engine.snapshot();
    engine.apply_donation_to_node(&cause_id(), &node_id("R"), 10.0).unwrap();

    let before = snapshot.node_progress(&cause_id(), &node_id("R")).unwrap();
    assert!((before.amount_donated_usd - 10.0).abs() < f64::EPSILON);
    let after = engine.node_progress(&cause_id(), &node_id("R")).unwrap().unwrap();
    assert!((after.amount_donated_usd - 20.0).abs() < f64::EPSILON);
}

#[test]
fn journal_records_mutations_in_order() {
    let engine = ProgressEngine::new(scenario_a_catalog());
    engine.set_active_cause(&cause_id()).unwrap();
    engine.apply_donation_to_node(&cause_id(), &node_id("R"), 100.0).unwrap();
    engine.reset_all();

    let kinds: Vec<&'static str> = engine
        .journal()
        .entries()
        .iter()
        .map(|e| match e.event {
            EngineEvent::ActiveCauseChanged { .. } => "active",
            EngineEvent::ProgressApplied { .. } => "applied",
            EngineEvent::NodeCompleted { .. } => "completed",
            EngineEvent::NodeUnlocked { .. } => "unlocked",
            EngineEvent::LedgerReset => "reset",
            _ => "other",
        })
        .collect();
    assert_eq!(kinds, vec!["active", "applied", "completed", "unlocked", "reset"]);
    assert!(engine.journal().verify_integrity().is_ok());
}

#[test]
fn journal_keeps_only_the_newest_entries() {
    let engine = ProgressEngine::new(scenario_a_catalog()).with_journal_capacity(3);
    for _ in 0..5 {
        engine
            .record_donation(&cause_id(), &NonprofitId::from("npo-1"), 1.0)
            .unwrap();
    }

    let journal = engine.journal();
    assert_eq!(journal.len(), 3);
    assert_eq!(journal.total_appended(), 5);
    assert_eq!(journal.entries()[0].sequence, 2);
    assert!(journal.verify_integrity().is_ok());
    assert_eq!(engine.donation_history().len(), 5);
}

#[test]
fn builtin_environmental_tree_progresses() {
    let engine = ProgressEngine::new(builtin_catalog());
    let cause = firedup_catalog::CauseId::from("environmental");
    let root = engine.catalog().roots(&cause).unwrap()[0].id.clone();

    assert!(engine.is_complete(&cause, &root).unwrap());
    let unlocked = engine.unlocked_nodes(&cause).unwrap();
    assert!(unlocked.contains(&node_id("plant-trees")));
    assert!(!unlocked.contains(&node_id("capstone")));
    assert!(engine.consistency_violations().is_empty());
}
