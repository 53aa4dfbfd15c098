//! Pending-definition workflow.
//!
//! A node that relies on an undefined term raises a request; a human later
//! resolves it against an existing definition or cancels it.
//!
//! ```text
//! Pending -> Resolved(definition)
//!         -> Cancelled
//! ```
//!
//! Both outcomes are final. Re-applying either is a conflict, never a no-op.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use tribunal_types::{DefinitionId, NodeId, PendingDefId, PendingDefStatus, Seq};

use crate::error::{ConflictError, EntityKind, ServiceError};
use crate::events::{PendingDefCancelled, PendingDefCreated, PendingDefResolved};
use crate::state::{PendingDef, ProofState};

/// Lookup strategies, tried in order. The first one that matches anything
/// decides the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    ExactTerm,
    RequestingNode,
    ExactId,
    IdPrefix,
    TermIgnoringCase,
}

impl Strategy {
    const ORDER: [Strategy; 5] = [
        Strategy::ExactTerm,
        Strategy::RequestingNode,
        Strategy::ExactId,
        Strategy::IdPrefix,
        Strategy::TermIgnoringCase,
    ];

    fn matcher(self, key: &str) -> Option<Box<dyn Fn(&PendingDef) -> bool + '_>> {
        match self {
            Strategy::ExactTerm => Some(Box::new(move |p: &PendingDef| p.term == key)),
            Strategy::RequestingNode => {
                let node = NodeId::parse(key).ok()?;
                Some(Box::new(move |p: &PendingDef| p.node == node))
            }
            Strategy::ExactId => {
                let id = PendingDefId::from_str(key).ok()?;
                Some(Box::new(move |p: &PendingDef| p.id == id))
            }
            Strategy::IdPrefix => Some(Box::new(move |p: &PendingDef| p.id.matches_prefix(key))),
            Strategy::TermIgnoringCase => {
                let key = key.to_lowercase();
                Some(Box::new(move |p: &PendingDef| p.term.to_lowercase() == key))
            }
        }
    }
}

/// Resolve a human-supplied key to one pending-definition request.
///
/// Within the winning strategy a single candidate is returned directly. Among
/// several, the one still pending wins; several still pending is ambiguous;
/// none pending selects the most recent so that terminality errors surface
/// against the request the caller most likely meant.
pub(crate) fn find_pending_def<'a>(
    state: &'a ProofState,
    key: &str,
) -> Result<&'a PendingDef, ServiceError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(ServiceError::not_found(EntityKind::PendingDef, key));
    }
    for strategy in Strategy::ORDER {
        let Some(matches) = strategy.matcher(key) else {
            continue;
        };
        let candidates: Vec<&PendingDef> = state
            .pending_defs
            .values()
            .filter(|pending| matches(pending))
            .collect();
        if !candidates.is_empty() {
            return select(key, candidates);
        }
    }
    Err(ServiceError::not_found(EntityKind::PendingDef, key))
}

fn select<'a>(key: &str, candidates: Vec<&'a PendingDef>) -> Result<&'a PendingDef, ServiceError> {
    if let [only] = candidates.as_slice() {
        return Ok(*only);
    }
    let pending: Vec<&PendingDef> = candidates
        .iter()
        .copied()
        .filter(|candidate| candidate.is_pending())
        .collect();
    match pending.as_slice() {
        [only] => Ok(*only),
        [] => candidates
            .into_iter()
            .max_by_key(|candidate| candidate.created_seq)
            .ok_or_else(|| ServiceError::not_found(EntityKind::PendingDef, key)),
        several => Err(ConflictError::Ambiguous {
            entity: EntityKind::PendingDef,
            key: key.to_string(),
            count: several.len(),
        }
        .into()),
    }
}

fn require_pending(pending: &PendingDef) -> Result<(), ServiceError> {
    if pending.is_pending() {
        Ok(())
    } else {
        Err(ConflictError::PendingDefNotPending {
            id: pending.id,
            term: pending.term.to_string(),
            current: pending.status,
        }
        .into())
    }
}

/// The requesting node must exist and must not already have an open request
/// for the same term.
pub(crate) fn check_create(
    state: &ProofState,
    term: &str,
    node: &NodeId,
) -> Result<(), ServiceError> {
    state.require_initialized()?;
    state.require_node(node)?;
    if let Some(existing) = state
        .pending_defs
        .values()
        .find(|p| p.is_pending() && p.node == *node && p.term == term)
    {
        return Err(ConflictError::PendingDefExists {
            node: node.clone(),
            term: term.to_string(),
            existing: existing.id,
        }
        .into());
    }
    Ok(())
}

pub(crate) fn check_created_event(
    state: &ProofState,
    event: &PendingDefCreated,
) -> Result<(), ServiceError> {
    check_create(state, &event.term, &event.node)?;
    if state.pending_def(&event.id).is_some() {
        return Err(ConflictError::DuplicateId {
            entity: EntityKind::PendingDef,
            id: event.id.to_string(),
        }
        .into());
    }
    Ok(())
}

pub(crate) fn apply_create(state: &mut ProofState, seq: Seq, event: PendingDefCreated) {
    state.pending_defs.insert(
        event.id,
        PendingDef {
            id: event.id,
            term: event.term,
            node: event.node,
            status: PendingDefStatus::Pending,
            resolved_by: None,
            created_at: event.timestamp,
            created_seq: seq,
            closed_at: None,
        },
    );
}

/// The request must exist and still be pending.
pub(crate) fn check_open(state: &ProofState, id: &PendingDefId) -> Result<(), ServiceError> {
    state.require_initialized()?;
    let pending = state
        .pending_def(id)
        .ok_or_else(|| ServiceError::not_found(EntityKind::PendingDef, id))?;
    require_pending(pending)
}

pub(crate) fn check_resolve(
    state: &ProofState,
    id: &PendingDefId,
    definition: &DefinitionId,
) -> Result<(), ServiceError> {
    check_open(state, id)?;
    if state.definition(definition).is_none() {
        return Err(ServiceError::not_found(EntityKind::Definition, definition));
    }
    Ok(())
}

pub(crate) fn check_cancel(state: &ProofState, id: &PendingDefId) -> Result<(), ServiceError> {
    check_open(state, id)
}

pub(crate) fn apply_resolve(state: &mut ProofState, event: &PendingDefResolved) {
    close(
        state,
        &event.id,
        PendingDefStatus::Resolved,
        Some(event.definition),
        event.timestamp,
    );
}

pub(crate) fn apply_cancel(state: &mut ProofState, event: &PendingDefCancelled) {
    close(
        state,
        &event.id,
        PendingDefStatus::Cancelled,
        None,
        event.timestamp,
    );
}

fn close(
    state: &mut ProofState,
    id: &PendingDefId,
    status: PendingDefStatus,
    resolved_by: Option<DefinitionId>,
    at: DateTime<Utc>,
) {
    if let Some(pending) = state.pending_defs.get_mut(id) {
        pending.status = status;
        pending.resolved_by = resolved_by;
        pending.closed_at = Some(at);
    }
}
