//! End-to-end scenarios through the service facade.

use std::time::Duration;

use tribunal_core::{ConflictError, NodeId, PendingDefStatus, ServiceError, content_hash};

use crate::common::{initialized, step};

#[test]
fn claim_then_extend_the_tree() {
    let fx = initialized();
    fx.service
        .claim("1", "alice", Duration::from_secs(60))
        .expect("claim root");
    let created = fx
        .service
        .create_node(step("1.1", "alice"))
        .expect("create child");
    assert_eq!(created.value, NodeId::parse("1.1").unwrap());

    let ids: Vec<String> = fx
        .service
        .list_nodes()
        .unwrap()
        .iter()
        .map(|node| node.id.to_string())
        .collect();
    assert_eq!(ids, ["1", "1.1"]);
}

#[test]
fn definitions_round_trip_by_name() {
    let fx = initialized();
    let content = "A group is a set with an associative binary operation, \
                   an identity element, and inverses.";
    let added = fx.service.add_definition("group", content).unwrap();

    let found = fx.service.definition_by_name("group").unwrap();
    assert_eq!(found.id, added.value);
    assert_eq!(found.content, content);
    assert_eq!(found.content_hash, content_hash(content));
    assert_eq!(found.created_at, crate::common::start_instant());

    assert!(fx.service.definition_by_name("Group").unwrap_err().is_not_found());
}

#[test]
fn cancelled_pending_definition_stays_cancelled() {
    let fx = initialized();
    fx.service.create_node(step("1.1", "alice")).unwrap();
    fx.service.create_node(step("1.2", "alice")).unwrap();

    let requested = fx.service.request_definition("kernel", "1.2").unwrap();
    let cancelled = fx.service.cancel_pending_def("kernel").unwrap();
    assert_eq!(cancelled.value, requested.value);

    let err = fx.service.cancel_pending_def("kernel").unwrap_err();
    match err {
        ServiceError::Conflict(ConflictError::PendingDefNotPending {
            id, term, current, ..
        }) => {
            assert_eq!(id, requested.value);
            assert_eq!(term, "kernel");
            assert_eq!(current, PendingDefStatus::Cancelled);
        }
        other => panic!("expected a not-pending conflict, got {other:?}"),
    }
    assert!(
        fx.service
            .resolve_pending_def("kernel", "kernel")
            .unwrap_err()
            .as_conflict()
            .is_some()
    );
}
