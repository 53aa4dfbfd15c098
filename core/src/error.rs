//! Error taxonomy for proof operations.
//!
//! Validation errors are raised before any state is read. Not-found and
//! conflict errors carry enough context (identity, current vs. requested
//! state) for the caller to decide what to do next. Storage errors from the
//! ledger pass through unchanged. Nothing here is retried automatically.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tribunal_ledger::LedgerError;
use tribunal_types::{
    ChallengeId, ChallengeStatus, DefinitionId, NodeId, NodeIdError, NodeStatus, PendingDefId,
    PendingDefStatus,
};

use crate::config::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Proof,
    Node,
    Challenge,
    Definition,
    PendingDef,
}

impl EntityKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            EntityKind::Proof => "proof",
            EntityKind::Node => "node",
            EntityKind::Challenge => "challenge",
            EntityKind::Definition => "definition",
            EntityKind::PendingDef => "pending definition",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Node lifecycle operations, named in conflict errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeAction {
    Claim,
    ExtendClaim,
    Release,
    Refine,
    Accept,
    Archive,
    Challenge,
    AddChild,
}

impl NodeAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            NodeAction::Claim => "claim",
            NodeAction::ExtendClaim => "extend the claim on",
            NodeAction::Release => "release",
            NodeAction::Refine => "refine",
            NodeAction::Accept => "accept",
            NodeAction::Archive => "archive",
            NodeAction::Challenge => "challenge",
            NodeAction::AddChild => "add a child to",
        }
    }
}

impl fmt::Display for NodeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error(transparent)]
    NodeId(#[from] NodeIdError),
    #[error("{field} must not be empty or whitespace-only")]
    EmptyField { field: &'static str },
    #[error("lease duration must be positive")]
    NonPositiveLease,
    #[error("lease duration of {requested:?} exceeds the maximum of {max:?}")]
    LeaseTooLong { requested: Duration, max: Duration },
    #[error("recorded content hash of definition '{name}' does not match its content")]
    HashMismatch { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictError {
    #[error("proof is already initialized")]
    AlreadyInitialized,

    #[error("node {node} already exists")]
    NodeExists { node: NodeId },

    #[error("node {node} is claimed by {owner} until {expires_at}")]
    NodeClaimed {
        node: NodeId,
        owner: String,
        expires_at: DateTime<Utc>,
    },

    #[error("node {node} is not claimed by {requested} ({})", holder_label(.holder.as_deref()))]
    NotLeaseHolder {
        node: NodeId,
        holder: Option<String>,
        requested: String,
    },

    #[error("lease on node {node} held by {owner} expired at {expired_at}")]
    LeaseExpired {
        node: NodeId,
        owner: String,
        expired_at: DateTime<Utc>,
    },

    #[error("cannot {action} node {node}: status is {current}")]
    IllegalTransition {
        node: NodeId,
        current: NodeStatus,
        action: NodeAction,
    },

    #[error("node {node} already has open challenge {challenge}")]
    ChallengeAlreadyOpen { node: NodeId, challenge: ChallengeId },

    #[error("challenge {challenge} is {current}, not open")]
    ChallengeNotOpen {
        challenge: ChallengeId,
        current: ChallengeStatus,
    },

    #[error("definition '{name}' already exists as {existing}")]
    DefinitionExists { name: String, existing: DefinitionId },

    #[error("node {node} already has pending definition request {existing} for '{term}'")]
    PendingDefExists {
        node: NodeId,
        term: String,
        existing: PendingDefId,
    },

    #[error("pending definition {id} for '{term}' is {current}, no longer pending")]
    PendingDefNotPending {
        id: PendingDefId,
        term: String,
        current: PendingDefStatus,
    },

    #[error("{entity} {id} already exists")]
    DuplicateId { entity: EntityKind, id: String },

    #[error("'{key}' matches {count} {entity} entries; use a longer identity")]
    Ambiguous {
        entity: EntityKind,
        key: String,
        count: usize,
    },
}

fn holder_label(holder: Option<&str>) -> String {
    match holder {
        Some(owner) => format!("held by {owner}"),
        None => "not claimed".to_string(),
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("{entity} '{key}' not found")]
    NotFound { entity: EntityKind, key: String },

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    Storage(#[from] LedgerError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("gave up after losing {attempts} ledger races to concurrent writers")]
    Contention { attempts: u32 },
}

impl ServiceError {
    pub(crate) fn not_found(entity: EntityKind, key: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    #[must_use]
    pub fn as_conflict(&self) -> Option<&ConflictError> {
        match self {
            Self::Conflict(conflict) => Some(conflict),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<NodeIdError> for ServiceError {
    fn from(value: NodeIdError) -> Self {
        Self::Invalid(ValidationError::NodeId(value))
    }
}
