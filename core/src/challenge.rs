//! Challenge workflow.
//!
//! ```text
//! Open -> Resolved(admitted | refuted)
//!      -> Withdrawn
//! ```
//!
//! A node under a valid lease cannot be challenged; its holder's work is not
//! interrupted. Raising a challenge moves the node to `Challenged` and
//! remembers the prior status, with a lapsed claim remembered as
//! `Unclaimed`. Resolution settles the node as `Admitted` or `Refuted`;
//! withdrawal restores the prior status. An archived node is never moved by
//! either.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use tribunal_types::{ChallengeId, ChallengeStatus, NodeId, NodeStatus, Seq};

use crate::error::{ConflictError, EntityKind, NodeAction, ServiceError};
use crate::events::{ChallengeCreated, ChallengeResolved, ChallengeWithdrawn};
use crate::state::{Challenge, ProofState};

/// Find a challenge by full identity or by a unique identity prefix.
pub(crate) fn find_challenge<'a>(
    state: &'a ProofState,
    key: &str,
) -> Result<&'a Challenge, ServiceError> {
    let key = key.trim();
    if let Ok(id) = ChallengeId::from_str(key)
        && let Some(challenge) = state.challenge(&id)
    {
        return Ok(challenge);
    }
    let mut matches = state.challenges.values().filter(|c| c.id.matches_prefix(key));
    match (matches.next(), matches.next()) {
        (Some(challenge), None) => Ok(challenge),
        (Some(_), Some(_)) => Err(ConflictError::Ambiguous {
            entity: EntityKind::Challenge,
            key: key.to_string(),
            count: 2 + matches.count(),
        }
        .into()),
        (None, _) => Err(ServiceError::not_found(EntityKind::Challenge, key)),
    }
}

fn require_open(challenge: &Challenge) -> Result<(), ServiceError> {
    if challenge.is_open() {
        Ok(())
    } else {
        Err(ConflictError::ChallengeNotOpen {
            challenge: challenge.id,
            current: challenge.status,
        }
        .into())
    }
}

pub(crate) fn check_raise(
    state: &ProofState,
    node: &NodeId,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    state.require_initialized()?;
    let target = state.require_node(node)?;
    if target.status == NodeStatus::Archived {
        return Err(ConflictError::IllegalTransition {
            node: node.clone(),
            current: target.status,
            action: NodeAction::Challenge,
        }
        .into());
    }
    if let Some(lease) = target.valid_lease(now) {
        return Err(ConflictError::NodeClaimed {
            node: node.clone(),
            owner: lease.owner.to_string(),
            expires_at: lease.expires_at,
        }
        .into());
    }
    if let Some(open) = state.open_challenge_for(node) {
        return Err(ConflictError::ChallengeAlreadyOpen {
            node: node.clone(),
            challenge: open.id,
        }
        .into());
    }
    Ok(())
}

pub(crate) fn check_created_event(
    state: &ProofState,
    event: &ChallengeCreated,
) -> Result<(), ServiceError> {
    check_raise(state, &event.node, event.timestamp)?;
    if state.challenge(&event.id).is_some() {
        return Err(ConflictError::DuplicateId {
            entity: EntityKind::Challenge,
            id: event.id.to_string(),
        }
        .into());
    }
    Ok(())
}

pub(crate) fn apply_raise(state: &mut ProofState, seq: Seq, event: ChallengeCreated) {
    if let Some(node) = state.nodes.get_mut(&event.node) {
        // A claimed node only gets here once its lease has lapsed.
        let prior = match node.status {
            NodeStatus::Claimed => NodeStatus::Unclaimed,
            other => other,
        };
        node.status_before_challenge = Some(prior);
        node.status = NodeStatus::Challenged;
        node.lease = None;
    }
    state.open_challenges.insert(event.node.clone(), event.id);
    state.challenges.insert(
        event.id,
        Challenge {
            id: event.id,
            node: event.node,
            reason: event.reason,
            severity: event.severity,
            raised_by: event.raised_by,
            status: ChallengeStatus::Open,
            outcome: None,
            created_at: event.timestamp,
            created_seq: seq,
            closed_at: None,
        },
    );
}

/// Resolution and withdrawal are both legal only from `Open`.
pub(crate) fn check_close(state: &ProofState, id: &ChallengeId) -> Result<(), ServiceError> {
    state.require_initialized()?;
    let challenge = state
        .challenge(id)
        .ok_or_else(|| ServiceError::not_found(EntityKind::Challenge, id))?;
    require_open(challenge)
}

pub(crate) fn apply_resolve(state: &mut ProofState, event: &ChallengeResolved) {
    let Some(node_id) = close(state, &event.id, ChallengeStatus::Resolved, event.timestamp) else {
        return;
    };
    if let Some(challenge) = state.challenges.get_mut(&event.id) {
        challenge.outcome = Some(event.outcome);
    }
    settle_node(state, &node_id, event.outcome.node_status());
}

pub(crate) fn apply_withdraw(state: &mut ProofState, event: &ChallengeWithdrawn) {
    let Some(node_id) = close(state, &event.id, ChallengeStatus::Withdrawn, event.timestamp)
    else {
        return;
    };
    let restored = state
        .nodes
        .get(&node_id)
        .and_then(|node| node.status_before_challenge)
        .unwrap_or(NodeStatus::Unclaimed);
    settle_node(state, &node_id, restored);
}

/// Mark the challenge closed and return its node.
fn close(
    state: &mut ProofState,
    id: &ChallengeId,
    status: ChallengeStatus,
    at: DateTime<Utc>,
) -> Option<NodeId> {
    let challenge = state.challenges.get_mut(id)?;
    challenge.status = status;
    challenge.closed_at = Some(at);
    let node = challenge.node.clone();
    if state.open_challenges.get(&node) == Some(id) {
        state.open_challenges.remove(&node);
    }
    Some(node)
}

fn settle_node(state: &mut ProofState, id: &NodeId, status: NodeStatus) {
    if let Some(node) = state.nodes.get_mut(id) {
        node.status_before_challenge = None;
        if node.status != NodeStatus::Archived {
            node.status = status;
        }
    }
}
