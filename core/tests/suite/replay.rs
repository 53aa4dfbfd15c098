//! Replay properties observed through independent handles.

use std::time::Duration;

use serde_json::json;
use tribunal_core::{
    ChallengeOutcome, LedgerError, NodeId, NodeStatus, PendingDefStatus, Seq, ServiceError, Severity,
    project, project_prefix,
};

use crate::common::{Fixture, initialized, step};

/// A proof with some history in every entity kind.
fn busy_proof() -> Fixture {
    let fx = initialized();
    let s = &fx.service;
    s.claim("1", "alice", Duration::from_secs(60)).unwrap();
    s.create_node(step("1.1", "alice")).unwrap();
    s.create_node(step("1.2", "alice")).unwrap();
    s.create_node(step("1.1.1", "bob")).unwrap();
    s.refine("1", "alice").unwrap();
    s.request_definition("zero", "1.1").unwrap();
    s.add_definition("zero", "The additive identity.").unwrap();
    s.resolve_pending_def("zero", "zero").unwrap();
    let challenge = s
        .raise_challenge("1.2", "unjustified step", Severity::Major, "verifier")
        .unwrap();
    s.resolve_challenge(&challenge.value.to_string(), ChallengeOutcome::Admitted)
        .unwrap();
    s.archive("1.1.1").unwrap();
    fx
}

#[test]
fn independent_projections_agree() {
    let fx = busy_proof();
    let other = fx.reopen();
    let here = fx.service.state().unwrap();
    let there = other.state().unwrap();
    assert_eq!(here, there);
    assert_eq!(here.stats().skipped(), 0);
    assert_eq!(project(other.ledger()).unwrap(), here);
}

#[test]
fn every_node_hangs_off_an_existing_parent() {
    let fx = busy_proof();
    let state = fx.service.state().unwrap();
    for node in state.nodes() {
        match node.parent() {
            None => assert!(node.id.is_root()),
            Some(parent) => {
                let parent = state.node(&parent).expect("parent exists");
                assert!(parent.children.contains(&node.id));
                assert!(parent.created_seq < node.created_seq);
            }
        }
        for child in &node.children {
            assert_eq!(state.node(child).unwrap().parent().as_ref(), Some(&node.id));
        }
    }
    assert_eq!(state.nodes().count(), 4);
}

#[test]
fn foreign_records_are_skipped_and_counted() {
    let fx = initialized();
    let ledger = fx.service.ledger();
    ledger
        .append("node_teleported", &json!({"node": "1", "to": "mars"}))
        .unwrap();
    ledger
        .append("node_claimed", &json!({"node": "not an id"}))
        .unwrap();
    fx.service.claim_default("1", "alice").unwrap();

    let state = fx.service.state().unwrap();
    let stats = state.stats();
    assert_eq!(stats.unknown_kinds, 1);
    assert_eq!(stats.malformed, 1);
    assert_eq!(stats.applied, 2);
    assert_eq!(state.last_seq(), Some(Seq::new(4)));
    assert_eq!(state.node(&NodeId::root()).unwrap().owner(), Some("alice"));
}

#[test]
fn prefix_projection_shows_history() {
    let fx = busy_proof();
    let ledger = fx.service.ledger();

    let at_claim = project_prefix(ledger, Seq::new(2)).unwrap();
    let root = at_claim.node(&NodeId::root()).unwrap();
    assert_eq!(root.status, NodeStatus::Claimed);
    assert_eq!(at_claim.nodes().count(), 1);

    let now = fx.service.state().unwrap();
    assert_eq!(
        now.node(&NodeId::root()).unwrap().status,
        NodeStatus::Refined
    );
}

#[test]
fn truncated_trailing_record_is_a_storage_error() {
    let fx = initialized();
    let partial = br#"{"format":1,"seq":2,"kind":"node_claimed","payl"#;
    std::fs::write(fx.service.ledger().dir().join("000000000002.json"), partial).unwrap();

    match fx.service.state().unwrap_err() {
        ServiceError::Storage(LedgerError::Corrupt { seq, .. }) => assert_eq!(seq, Seq::new(2)),
        other => panic!("expected a corrupt record, got {other:?}"),
    }
    // Writers fail the same way; nothing is repaired behind the caller's back.
    assert!(matches!(
        fx.service.claim_default("1", "alice"),
        Err(ServiceError::Storage(LedgerError::Corrupt { .. }))
    ));
}

#[test]
fn orphaned_temp_files_do_not_disturb_replay() {
    let fx = initialized();
    std::fs::write(
        fx.service.ledger().dir().join(".tmp-crashed-writer"),
        b"{\"format\":1,",
    )
    .unwrap();

    let state = fx.service.state().unwrap();
    assert_eq!(state.last_seq(), Some(Seq::FIRST));
    let claimed = fx.service.claim_default("1", "alice").unwrap();
    assert_eq!(claimed.seq, Seq::new(2));
}

#[test]
fn closed_pending_definitions_stay_closed_after_reopen() {
    let fx = busy_proof();
    let reopened = fx.reopen();
    let pending = reopened.pending_defs().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].status, PendingDefStatus::Resolved);
    assert!(
        reopened
            .cancel_pending_def("zero")
            .unwrap_err()
            .as_conflict()
            .is_some()
    );
}
