//! Lifecycle, challenge and pending-definition rules through the facade.

use std::time::Duration;

use chrono::Duration as Span;
use tribunal_core::{
    ChallengeOutcome, ChallengeStatus, ConflictError, EntityKind, NodeAction, NodeStatus,
    PendingDefStatus, ServiceError, Severity,
};

use crate::common::{initialized, start_instant, step};

fn conflict(err: ServiceError) -> ConflictError {
    match err {
        ServiceError::Conflict(conflict) => conflict,
        other => panic!("expected a conflict, got {other:?}"),
    }
}

#[test]
fn lease_expiry_enables_reclaim() {
    let fx = initialized();
    let first = fx.service.claim("1", "A", Duration::from_secs(1)).unwrap();
    assert_eq!(first.value, start_instant() + Span::seconds(1));

    match conflict(fx.service.claim("1", "B", Duration::from_secs(1)).unwrap_err()) {
        ConflictError::NodeClaimed { owner, .. } => assert_eq!(owner, "A"),
        other => panic!("unexpected {other:?}"),
    }

    fx.clock.advance(Span::milliseconds(1500));
    fx.service.claim("1", "B", Duration::from_secs(1)).unwrap();
    let root = fx.service.node("1").unwrap();
    assert_eq!(root.owner(), Some("B"));
    assert_eq!(root.status, NodeStatus::Claimed);
}

#[test]
fn expired_holder_cannot_act() {
    let fx = initialized();
    fx.service.claim("1", "alice", Duration::from_secs(10)).unwrap();
    fx.clock.advance(Span::seconds(10));

    assert!(matches!(
        conflict(fx.service.refine("1", "alice").unwrap_err()),
        ConflictError::LeaseExpired { .. }
    ));
    assert!(matches!(
        conflict(fx.service.extend_claim("1", "alice", Duration::from_secs(10)).unwrap_err()),
        ConflictError::LeaseExpired { .. }
    ));
    let available: Vec<String> = fx
        .service
        .available_nodes()
        .unwrap()
        .iter()
        .map(|n| n.id.to_string())
        .collect();
    assert_eq!(available, ["1"]);
}

#[test]
fn extension_moves_the_deadline() {
    let fx = initialized();
    fx.service.claim("1", "alice", Duration::from_secs(10)).unwrap();
    fx.clock.advance(Span::seconds(8));
    let extended = fx
        .service
        .extend_claim("1", "alice", Duration::from_secs(10))
        .unwrap();
    assert_eq!(extended.value, start_instant() + Span::seconds(18));

    fx.clock.advance(Span::seconds(5));
    fx.service.accept("1", "alice").unwrap();
    let root = fx.service.node("1").unwrap();
    assert_eq!(root.status, NodeStatus::Accepted);
    assert!(root.lease.is_none());

    // A second claim by the holder is not an extension.
    let fx = initialized();
    fx.service.claim("1", "alice", Duration::from_secs(10)).unwrap();
    assert!(matches!(
        conflict(fx.service.claim("1", "alice", Duration::from_secs(10)).unwrap_err()),
        ConflictError::NodeClaimed { .. }
    ));
}

#[test]
fn release_returns_node_to_the_pool() {
    let fx = initialized();
    fx.service.claim_default("1", "alice").unwrap();
    assert!(matches!(
        conflict(fx.service.release("1", "bob").unwrap_err()),
        ConflictError::NotLeaseHolder { .. }
    ));
    fx.service.release("1", "alice").unwrap();
    let root = fx.service.node("1").unwrap();
    assert_eq!(root.status, NodeStatus::Unclaimed);
    assert_eq!(root.owner(), None);

    assert!(matches!(
        conflict(fx.service.release("1", "alice").unwrap_err()),
        ConflictError::IllegalTransition {
            current: NodeStatus::Unclaimed,
            action: NodeAction::Release,
            ..
        }
    ));
}

#[test]
fn archived_nodes_are_frozen() {
    let fx = initialized();
    fx.service.create_node(step("1.1", "alice")).unwrap();
    fx.service.archive("1.1").unwrap();

    assert!(matches!(
        conflict(fx.service.archive("1.1").unwrap_err()),
        ConflictError::IllegalTransition {
            current: NodeStatus::Archived,
            ..
        }
    ));
    assert!(fx.service.claim_default("1.1", "bob").is_err());
    assert!(fx.service.create_node(step("1.1.1", "bob")).is_err());
    assert!(
        fx.service
            .raise_challenge("1.1", "irrelevant", Severity::Minor, "carol")
            .is_err()
    );
}

#[test]
fn missing_nodes_are_not_found() {
    let fx = initialized();
    for err in [
        fx.service.claim_default("1.4", "alice").unwrap_err(),
        fx.service.create_node(step("1.4.1", "alice")).unwrap_err(),
        fx.service.request_definition("kernel", "1.2").unwrap_err(),
        fx.service.node("1.9").unwrap_err(),
    ] {
        assert!(
            matches!(
                err,
                ServiceError::NotFound {
                    entity: EntityKind::Node,
                    ..
                }
            ),
            "{err}"
        );
    }
}

#[test]
fn challenge_lifecycle() {
    let fx = initialized();
    fx.service.claim_default("1", "alice").unwrap();
    fx.service.refine("1", "alice").unwrap();

    let raised = fx
        .service
        .raise_challenge("1", "the base case is missing", Severity::Critical, "verifier")
        .unwrap();
    assert_eq!(fx.service.node("1").unwrap().status, NodeStatus::Challenged);
    assert!(matches!(
        conflict(
            fx.service
                .raise_challenge("1", "again", Severity::Note, "verifier")
                .unwrap_err()
        ),
        ConflictError::ChallengeAlreadyOpen { .. }
    ));

    let prefix = &raised.value.to_string()[..8];
    fx.service.withdraw_challenge(prefix).unwrap();
    assert_eq!(fx.service.node("1").unwrap().status, NodeStatus::Refined);
    assert!(matches!(
        conflict(fx.service.withdraw_challenge(prefix).unwrap_err()),
        ConflictError::ChallengeNotOpen {
            current: ChallengeStatus::Withdrawn,
            ..
        }
    ));

    let second = fx
        .service
        .raise_challenge("1", "induction step is wrong", Severity::Major, "verifier")
        .unwrap();
    fx.service
        .resolve_challenge(&second.value.to_string(), ChallengeOutcome::Refuted)
        .unwrap();
    assert_eq!(fx.service.node("1").unwrap().status, NodeStatus::Refuted);
    assert!(
        fx.service
            .resolve_challenge(&second.value.to_string(), ChallengeOutcome::Admitted)
            .is_err()
    );

    let all = fx.service.challenges().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, raised.value);
    assert!(fx.service.open_challenges().unwrap().is_empty());
    let resolved = fx.service.resolved_challenges().unwrap();
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].outcome, Some(ChallengeOutcome::Refuted));
    assert_eq!(fx.service.challenge(&second.value.to_string()).unwrap().id, second.value);
}

#[test]
fn duplicate_definition_names_are_rejected() {
    let fx = initialized();
    let first = fx.service.add_definition("ring", "A ring is ...").unwrap();
    match conflict(fx.service.add_definition("ring", "Something else").unwrap_err()) {
        ConflictError::DefinitionExists { name, existing } => {
            assert_eq!(name, "ring");
            assert_eq!(existing, first.value);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(fx.service.definitions().unwrap().len(), 1);
    assert_eq!(
        fx.service.definition_by_name("ring").unwrap().content,
        "A ring is ..."
    );
}

#[test]
fn pending_definition_resolution() {
    let fx = initialized();
    fx.service.create_node(step("1.1", "alice")).unwrap();
    let requested = fx.service.request_definition("monoid", "1.1").unwrap();

    assert!(matches!(
        conflict(fx.service.request_definition("monoid", "1.1").unwrap_err()),
        ConflictError::PendingDefExists { .. }
    ));
    assert!(
        fx.service
            .resolve_pending_def("monoid", "monoid")
            .unwrap_err()
            .is_not_found()
    );

    let defined = fx
        .service
        .add_definition("monoid", "A monoid is a semigroup with identity.")
        .unwrap();
    // Addressed by requesting node this time.
    let resolved = fx.service.resolve_pending_def("1.1", "monoid").unwrap();
    assert_eq!(resolved.value, requested.value);

    let pending = fx.service.pending_def(&requested.value.to_string()).unwrap();
    assert_eq!(pending.status, PendingDefStatus::Resolved);
    assert_eq!(pending.resolved_by, Some(defined.value));

    assert!(matches!(
        conflict(fx.service.cancel_pending_def("MONOID").unwrap_err()),
        ConflictError::PendingDefNotPending {
            current: PendingDefStatus::Resolved,
            ..
        }
    ));
    assert_eq!(fx.service.pending_defs().unwrap().len(), 1);
}

#[test]
fn ambiguous_pending_lookup_is_a_conflict() {
    let fx = initialized();
    fx.service.create_node(step("1.1", "alice")).unwrap();
    fx.service.create_node(step("1.2", "alice")).unwrap();
    fx.service.request_definition("kernel", "1.1").unwrap();
    fx.service.request_definition("kernel", "1.2").unwrap();

    assert!(matches!(
        conflict(fx.service.cancel_pending_def("kernel").unwrap_err()),
        ConflictError::Ambiguous {
            entity: EntityKind::PendingDef,
            count: 2,
            ..
        }
    ));
    // The requesting node disambiguates.
    fx.service.cancel_pending_def("1.2").unwrap();
    fx.service.cancel_pending_def("kernel").unwrap();
}

#[test]
fn child_authoring_respects_parent_lease() {
    let fx = initialized();
    fx.service.claim("1", "alice", Duration::from_secs(30)).unwrap();
    match conflict(fx.service.create_node(step("1.1", "bob")).unwrap_err()) {
        ConflictError::NotLeaseHolder { holder, requested, .. } => {
            assert_eq!(holder.as_deref(), Some("alice"));
            assert_eq!(requested, "bob");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(
        conflict(fx.service.create_node(step("1", "alice")).unwrap_err()),
        ConflictError::NodeExists { .. }
    ));
}

#[test]
fn challenges_wait_for_a_live_lease() {
    let fx = initialized();
    fx.service.claim("1", "alice", Duration::from_secs(3600)).unwrap();

    match conflict(
        fx.service
            .raise_challenge("1", "premature", Severity::Major, "mallory")
            .unwrap_err(),
    ) {
        ConflictError::NodeClaimed { owner, .. } => assert_eq!(owner, "alice"),
        other => panic!("unexpected {other:?}"),
    }
    let root = fx.service.node("1").unwrap();
    assert_eq!(root.status, NodeStatus::Claimed);
    assert_eq!(root.owner(), Some("alice"));
    assert!(fx.service.open_challenges().unwrap().is_empty());
    assert!(matches!(
        conflict(fx.service.claim_default("1", "bob").unwrap_err()),
        ConflictError::NodeClaimed { .. }
    ));
    fx.service.refine("1", "alice").unwrap();
}

#[test]
fn challenge_on_a_lapsed_claim_withdraws_to_unclaimed() {
    let fx = initialized();
    fx.service.claim("1", "alice", Duration::from_secs(60)).unwrap();
    fx.clock.advance(Span::seconds(61));

    let raised = fx
        .service
        .raise_challenge("1", "abandoned step", Severity::Minor, "verifier")
        .unwrap();
    assert_eq!(fx.service.node("1").unwrap().status, NodeStatus::Challenged);
    fx.service.withdraw_challenge(&raised.value.to_string()).unwrap();

    let root = fx.service.node("1").unwrap();
    assert_eq!(root.status, NodeStatus::Unclaimed);
    assert!(root.lease.is_none());
    fx.service.claim_default("1", "bob").unwrap();
    assert_eq!(fx.service.node("1").unwrap().owner(), Some("bob"));
}
