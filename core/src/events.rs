//! The closed catalog of ledger event kinds and their payloads.
//!
//! Each payload carries everything needed to apply its transition during
//! replay, including the instant it was captured at append time. Replay never
//! consults the wall clock.
//!
//! Tags are snake_case and stable. A ledger written by a newer catalog may
//! contain tags this build does not know; those decode to
//! [`Decoded::Unknown`] and are skipped by the projector.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tribunal_types::{
    ChallengeId, ChallengeOutcome, DefinitionId, NodeId, NodeType, NonEmptyString, PendingDefId,
    Severity,
};

/// Catalog version stamped into `proof_initialized` by this build.
pub const EVENT_CATALOG_VERSION: u32 = 1;

const fn first_catalog_version() -> u32 {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ProofInitialized,
    NodeCreated,
    NodeClaimed,
    NodeReleased,
    NodeRefined,
    NodeAccepted,
    NodeArchived,
    DefAdded,
    ChallengeCreated,
    ChallengeResolved,
    ChallengeWithdrawn,
    PendingDefCreated,
    PendingDefResolved,
    PendingDefCancelled,
}

impl EventKind {
    pub const ALL: [EventKind; 14] = [
        EventKind::ProofInitialized,
        EventKind::NodeCreated,
        EventKind::NodeClaimed,
        EventKind::NodeReleased,
        EventKind::NodeRefined,
        EventKind::NodeAccepted,
        EventKind::NodeArchived,
        EventKind::DefAdded,
        EventKind::ChallengeCreated,
        EventKind::ChallengeResolved,
        EventKind::ChallengeWithdrawn,
        EventKind::PendingDefCreated,
        EventKind::PendingDefResolved,
        EventKind::PendingDefCancelled,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            EventKind::ProofInitialized => "proof_initialized",
            EventKind::NodeCreated => "node_created",
            EventKind::NodeClaimed => "node_claimed",
            EventKind::NodeReleased => "node_released",
            EventKind::NodeRefined => "node_refined",
            EventKind::NodeAccepted => "node_accepted",
            EventKind::NodeArchived => "node_archived",
            EventKind::DefAdded => "def_added",
            EventKind::ChallengeCreated => "challenge_created",
            EventKind::ChallengeResolved => "challenge_resolved",
            EventKind::ChallengeWithdrawn => "challenge_withdrawn",
            EventKind::PendingDefCreated => "pending_def_created",
            EventKind::PendingDefResolved => "pending_def_resolved",
            EventKind::PendingDefCancelled => "pending_def_cancelled",
        }
    }

    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Payloads ─────────────────────────────────────────────────

/// Creates the root node `1` holding the conjecture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofInitialized {
    pub conjecture: NonEmptyString,
    pub author: NonEmptyString,
    /// Catalog of the build that started the proof.
    #[serde(default = "first_catalog_version")]
    pub catalog_version: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCreated {
    pub node: NodeId,
    pub node_type: NodeType,
    pub content: NonEmptyString,
    pub inference: NonEmptyString,
    pub author: NonEmptyString,
    pub timestamp: DateTime<Utc>,
}

/// A fresh claim, a reclaim after expiry, or the holder extending its lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeClaimed {
    pub node: NodeId,
    pub owner: NonEmptyString,
    pub lease_expires_at: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
}

/// Payload shared by release, refine and accept: the holder acting on its
/// own lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeOwnerAction {
    pub node: NodeId,
    pub owner: NonEmptyString,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeArchived {
    pub node: NodeId,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefAdded {
    pub id: DefinitionId,
    pub name: NonEmptyString,
    pub content: NonEmptyString,
    /// Lowercase hex SHA-256 of `content`.
    pub content_hash: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeCreated {
    pub id: ChallengeId,
    pub node: NodeId,
    pub reason: NonEmptyString,
    #[serde(default)]
    pub severity: Severity,
    pub raised_by: NonEmptyString,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeResolved {
    pub id: ChallengeId,
    pub outcome: ChallengeOutcome,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeWithdrawn {
    pub id: ChallengeId,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDefCreated {
    pub id: PendingDefId,
    pub term: NonEmptyString,
    pub node: NodeId,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDefResolved {
    pub id: PendingDefId,
    pub definition: DefinitionId,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDefCancelled {
    pub id: PendingDefId,
    pub timestamp: DateTime<Utc>,
}

// ── Event ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ProofInitialized(ProofInitialized),
    NodeCreated(NodeCreated),
    NodeClaimed(NodeClaimed),
    NodeReleased(NodeOwnerAction),
    NodeRefined(NodeOwnerAction),
    NodeAccepted(NodeOwnerAction),
    NodeArchived(NodeArchived),
    DefAdded(DefAdded),
    ChallengeCreated(ChallengeCreated),
    ChallengeResolved(ChallengeResolved),
    ChallengeWithdrawn(ChallengeWithdrawn),
    PendingDefCreated(PendingDefCreated),
    PendingDefResolved(PendingDefResolved),
    PendingDefCancelled(PendingDefCancelled),
}

/// Outcome of decoding a raw ledger record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Known(Event),
    /// A tag outside this build's catalog.
    Unknown(String),
}

#[derive(Debug, Error)]
#[error("payload does not match event kind {kind}: {source}")]
pub struct DecodeError {
    pub kind: EventKind,
    #[source]
    pub source: serde_json::Error,
}

fn payload<T: for<'de> Deserialize<'de>>(kind: EventKind, value: Value) -> Result<T, DecodeError> {
    serde_json::from_value(value).map_err(|source| DecodeError { kind, source })
}

impl Event {
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Event::ProofInitialized(_) => EventKind::ProofInitialized,
            Event::NodeCreated(_) => EventKind::NodeCreated,
            Event::NodeClaimed(_) => EventKind::NodeClaimed,
            Event::NodeReleased(_) => EventKind::NodeReleased,
            Event::NodeRefined(_) => EventKind::NodeRefined,
            Event::NodeAccepted(_) => EventKind::NodeAccepted,
            Event::NodeArchived(_) => EventKind::NodeArchived,
            Event::DefAdded(_) => EventKind::DefAdded,
            Event::ChallengeCreated(_) => EventKind::ChallengeCreated,
            Event::ChallengeResolved(_) => EventKind::ChallengeResolved,
            Event::ChallengeWithdrawn(_) => EventKind::ChallengeWithdrawn,
            Event::PendingDefCreated(_) => EventKind::PendingDefCreated,
            Event::PendingDefResolved(_) => EventKind::PendingDefResolved,
            Event::PendingDefCancelled(_) => EventKind::PendingDefCancelled,
        }
    }

    /// Instant captured when the event was appended.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Event::ProofInitialized(e) => e.timestamp,
            Event::NodeCreated(e) => e.timestamp,
            Event::NodeClaimed(e) => e.timestamp,
            Event::NodeReleased(e) | Event::NodeRefined(e) | Event::NodeAccepted(e) => e.timestamp,
            Event::NodeArchived(e) => e.timestamp,
            Event::DefAdded(e) => e.timestamp,
            Event::ChallengeCreated(e) => e.timestamp,
            Event::ChallengeResolved(e) => e.timestamp,
            Event::ChallengeWithdrawn(e) => e.timestamp,
            Event::PendingDefCreated(e) => e.timestamp,
            Event::PendingDefResolved(e) => e.timestamp,
            Event::PendingDefCancelled(e) => e.timestamp,
        }
    }

    pub fn encode(&self) -> serde_json::Result<Value> {
        match self {
            Event::ProofInitialized(e) => serde_json::to_value(e),
            Event::NodeCreated(e) => serde_json::to_value(e),
            Event::NodeClaimed(e) => serde_json::to_value(e),
            Event::NodeReleased(e) | Event::NodeRefined(e) | Event::NodeAccepted(e) => {
                serde_json::to_value(e)
            }
            Event::NodeArchived(e) => serde_json::to_value(e),
            Event::DefAdded(e) => serde_json::to_value(e),
            Event::ChallengeCreated(e) => serde_json::to_value(e),
            Event::ChallengeResolved(e) => serde_json::to_value(e),
            Event::ChallengeWithdrawn(e) => serde_json::to_value(e),
            Event::PendingDefCreated(e) => serde_json::to_value(e),
            Event::PendingDefResolved(e) => serde_json::to_value(e),
            Event::PendingDefCancelled(e) => serde_json::to_value(e),
        }
    }

    pub fn decode(tag: &str, value: Value) -> Result<Decoded, DecodeError> {
        let Some(kind) = EventKind::from_tag(tag) else {
            return Ok(Decoded::Unknown(tag.to_string()));
        };
        let event = match kind {
            EventKind::ProofInitialized => Event::ProofInitialized(payload(kind, value)?),
            EventKind::NodeCreated => Event::NodeCreated(payload(kind, value)?),
            EventKind::NodeClaimed => Event::NodeClaimed(payload(kind, value)?),
            EventKind::NodeReleased => Event::NodeReleased(payload(kind, value)?),
            EventKind::NodeRefined => Event::NodeRefined(payload(kind, value)?),
            EventKind::NodeAccepted => Event::NodeAccepted(payload(kind, value)?),
            EventKind::NodeArchived => Event::NodeArchived(payload(kind, value)?),
            EventKind::DefAdded => Event::DefAdded(payload(kind, value)?),
            EventKind::ChallengeCreated => Event::ChallengeCreated(payload(kind, value)?),
            EventKind::ChallengeResolved => Event::ChallengeResolved(payload(kind, value)?),
            EventKind::ChallengeWithdrawn => Event::ChallengeWithdrawn(payload(kind, value)?),
            EventKind::PendingDefCreated => Event::PendingDefCreated(payload(kind, value)?),
            EventKind::PendingDefResolved => Event::PendingDefResolved(payload(kind, value)?),
            EventKind::PendingDefCancelled => Event::PendingDefCancelled(payload(kind, value)?),
        };
        Ok(Decoded::Known(event))
    }
}
