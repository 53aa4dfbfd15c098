//! Node lifecycle transitions.
//!
//! Every transition comes as a `check_*` / `apply_*` pair. The facade runs the
//! check against a fresh projection with the wall clock; replay runs the same
//! check with the instant recorded in the payload, so a record that was legal
//! when written is legal when folded. `apply_*` assumes its check passed.
//!
//! Lease expiry is never recorded: a lapsed lease is simply one whose
//! `expires_at` is not after the instant being evaluated.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tribunal_types::{NodeId, NodeStatus, NodeType, NonEmptyStaticStr, Seq};

use crate::error::{ConflictError, NodeAction, ServiceError};
use crate::events::{NodeArchived, NodeClaimed, NodeCreated, NodeOwnerAction, ProofInitialized};
use crate::state::{Lease, Node, ProofState};

/// Inference tag carried by the root node.
pub const CONJECTURE_INFERENCE: NonEmptyStaticStr = NonEmptyStaticStr::new("conjecture");

fn illegal(node: &Node, action: NodeAction) -> ServiceError {
    ConflictError::IllegalTransition {
        node: node.id.clone(),
        current: node.status,
        action,
    }
    .into()
}

/// The node must carry a lease held by `owner` that is still valid at `now`.
fn require_holder<'a>(
    state: &'a ProofState,
    id: &NodeId,
    owner: &str,
    now: DateTime<Utc>,
    action: NodeAction,
) -> Result<&'a Node, ServiceError> {
    state.require_initialized()?;
    let node = state.require_node(id)?;
    if node.status != NodeStatus::Claimed {
        return Err(illegal(node, action));
    }
    match &node.lease {
        Some(lease) if lease.is_held_by(owner, now) => Ok(node),
        Some(lease) if lease.owner != owner => Err(ConflictError::NotLeaseHolder {
            node: id.clone(),
            holder: Some(lease.owner.to_string()),
            requested: owner.to_string(),
        }
        .into()),
        Some(lease) => Err(ConflictError::LeaseExpired {
            node: id.clone(),
            owner: lease.owner.to_string(),
            expired_at: lease.expires_at,
        }
        .into()),
        None => Err(ConflictError::NotLeaseHolder {
            node: id.clone(),
            holder: None,
            requested: owner.to_string(),
        }
        .into()),
    }
}

// ── Initialization ───────────────────────────────────────────

pub(crate) fn check_init(state: &ProofState) -> Result<(), ServiceError> {
    if state.is_initialized() {
        return Err(ConflictError::AlreadyInitialized.into());
    }
    Ok(())
}

pub(crate) fn apply_init(state: &mut ProofState, seq: Seq, event: ProofInitialized) {
    state.catalog_version = Some(event.catalog_version);
    let root = NodeId::root();
    state.nodes.insert(
        root.clone(),
        Node {
            id: root,
            node_type: NodeType::Claim,
            content: event.conjecture,
            inference: CONJECTURE_INFERENCE.into(),
            author: event.author,
            status: NodeStatus::Unclaimed,
            lease: None,
            status_before_challenge: None,
            children: BTreeSet::new(),
            created_at: event.timestamp,
            created_seq: seq,
        },
    );
}

// ── Creation ─────────────────────────────────────────────────

/// A new node needs a live parent, a fresh id, and, when the parent is
/// under a valid lease, to be authored by that lease holder.
pub(crate) fn check_create(
    state: &ProofState,
    id: &NodeId,
    author: &str,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    state.require_initialized()?;
    if state.node(id).is_some() {
        return Err(ConflictError::NodeExists { node: id.clone() }.into());
    }
    // Only the root has no parent, and it exists once initialized.
    let parent_id = id
        .parent()
        .ok_or_else(|| ConflictError::NodeExists { node: id.clone() })?;
    let parent = state.require_node(&parent_id)?;
    if parent.status == NodeStatus::Archived {
        return Err(illegal(parent, NodeAction::AddChild));
    }
    if let Some(lease) = parent.valid_lease(now)
        && lease.owner != author
    {
        return Err(ConflictError::NotLeaseHolder {
            node: parent_id,
            holder: Some(lease.owner.to_string()),
            requested: author.to_string(),
        }
        .into());
    }
    Ok(())
}

pub(crate) fn apply_create(state: &mut ProofState, seq: Seq, event: NodeCreated) {
    if let Some(parent) = event.node.parent()
        && let Some(parent) = state.nodes.get_mut(&parent)
    {
        parent.children.insert(event.node.clone());
    }
    state.nodes.insert(
        event.node.clone(),
        Node {
            id: event.node,
            node_type: event.node_type,
            content: event.content,
            inference: event.inference,
            author: event.author,
            status: NodeStatus::Unclaimed,
            lease: None,
            status_before_challenge: None,
            children: BTreeSet::new(),
            created_at: event.timestamp,
            created_seq: seq,
        },
    );
}

// ── Claiming ─────────────────────────────────────────────────

/// A claim needs an unclaimed node, or a claimed one whose lease has lapsed.
/// A node under a valid lease rejects the claim naming the holder, even when
/// the holder itself asks; extending goes through [`check_extend`].
pub(crate) fn check_claim(
    state: &ProofState,
    id: &NodeId,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    state.require_initialized()?;
    let node = state.require_node(id)?;
    match node.status {
        NodeStatus::Unclaimed => Ok(()),
        NodeStatus::Claimed => match node.valid_lease(now) {
            Some(lease) => Err(ConflictError::NodeClaimed {
                node: id.clone(),
                owner: lease.owner.to_string(),
                expires_at: lease.expires_at,
            }
            .into()),
            None => Ok(()),
        },
        _ => Err(illegal(node, NodeAction::Claim)),
    }
}

pub(crate) fn check_extend(
    state: &ProofState,
    id: &NodeId,
    owner: &str,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    require_holder(state, id, owner, now, NodeAction::ExtendClaim).map(|_| ())
}

/// Replay rule for `node_claimed`: the valid holder re-issuing its lease is an
/// extension, anything else is a fresh claim.
pub(crate) fn check_claimed_event(
    state: &ProofState,
    event: &NodeClaimed,
) -> Result<(), ServiceError> {
    let extending = state
        .node(&event.node)
        .and_then(|node| node.lease.as_ref())
        .is_some_and(|lease| lease.is_held_by(&event.owner, event.timestamp));
    if extending {
        check_extend(state, &event.node, &event.owner, event.timestamp)
    } else {
        check_claim(state, &event.node, event.timestamp)
    }
}

pub(crate) fn apply_claim(state: &mut ProofState, event: NodeClaimed) {
    if let Some(node) = state.nodes.get_mut(&event.node) {
        node.status = NodeStatus::Claimed;
        node.lease = Some(Lease {
            owner: event.owner,
            expires_at: event.lease_expires_at,
        });
    }
}

// ── Holder actions ───────────────────────────────────────────

pub(crate) fn check_release(
    state: &ProofState,
    id: &NodeId,
    owner: &str,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    require_holder(state, id, owner, now, NodeAction::Release).map(|_| ())
}

pub(crate) fn check_refine(
    state: &ProofState,
    id: &NodeId,
    owner: &str,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    require_holder(state, id, owner, now, NodeAction::Refine).map(|_| ())
}

pub(crate) fn check_accept(
    state: &ProofState,
    id: &NodeId,
    owner: &str,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    require_holder(state, id, owner, now, NodeAction::Accept).map(|_| ())
}

/// Release, refine and accept all drop the lease and differ only in the
/// status they leave behind.
pub(crate) fn apply_settle(state: &mut ProofState, event: &NodeOwnerAction, status: NodeStatus) {
    if let Some(node) = state.nodes.get_mut(&event.node) {
        node.status = status;
        node.lease = None;
    }
}

// ── Archiving ────────────────────────────────────────────────

pub(crate) fn check_archive(state: &ProofState, id: &NodeId) -> Result<(), ServiceError> {
    state.require_initialized()?;
    let node = state.require_node(id)?;
    if node.status.is_terminal() {
        return Err(illegal(node, NodeAction::Archive));
    }
    Ok(())
}

pub(crate) fn apply_archive(state: &mut ProofState, event: &NodeArchived) {
    if let Some(node) = state.nodes.get_mut(&event.node) {
        node.status = NodeStatus::Archived;
        node.lease = None;
    }
}
