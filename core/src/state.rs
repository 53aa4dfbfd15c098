//! Projected proof state.
//!
//! A `ProofState` is an owned snapshot produced by folding the ledger. It is
//! never written back and never cached across operations; mutation happens
//! only inside this crate while folding events.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use tribunal_types::{
    ChallengeId, ChallengeOutcome, ChallengeStatus, DefinitionId, NodeId, NodeStatus, NodeType,
    NonEmptyString, PendingDefId, PendingDefStatus, Seq, Severity,
};

use crate::error::{EntityKind, ServiceError};

/// Exclusive, time-bounded ownership of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub owner: NonEmptyString,
    pub expires_at: DateTime<Utc>,
}

impl Lease {
    /// A lease is valid strictly before its expiry instant.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    #[must_use]
    pub fn is_held_by(&self, owner: &str, now: DateTime<Utc>) -> bool {
        self.owner == owner && self.is_valid_at(now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub node_type: NodeType,
    pub content: NonEmptyString,
    pub inference: NonEmptyString,
    pub author: NonEmptyString,
    pub status: NodeStatus,
    pub lease: Option<Lease>,
    /// Status to restore if the open challenge is withdrawn.
    pub status_before_challenge: Option<NodeStatus>,
    pub children: BTreeSet<NodeId>,
    pub created_at: DateTime<Utc>,
    pub created_seq: Seq,
}

impl Node {
    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.id.parent()
    }

    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        self.lease.as_ref().map(|lease| lease.owner.as_str())
    }

    #[must_use]
    pub fn lease_expires_at(&self) -> Option<DateTime<Utc>> {
        self.lease.as_ref().map(|lease| lease.expires_at)
    }

    /// The lease, if one exists and has not lapsed at `now`.
    #[must_use]
    pub fn valid_lease(&self, now: DateTime<Utc>) -> Option<&Lease> {
        self.lease.as_ref().filter(|lease| lease.is_valid_at(now))
    }

    /// Open for a new claim: never claimed, or claimed with a lapsed lease.
    #[must_use]
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            NodeStatus::Unclaimed => true,
            NodeStatus::Claimed => self.valid_lease(now).is_none(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub id: ChallengeId,
    pub node: NodeId,
    pub reason: NonEmptyString,
    pub severity: Severity,
    pub raised_by: NonEmptyString,
    pub status: ChallengeStatus,
    pub outcome: Option<ChallengeOutcome>,
    pub created_at: DateTime<Utc>,
    pub created_seq: Seq,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Challenge {
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == ChallengeStatus::Open
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub id: DefinitionId,
    pub name: NonEmptyString,
    pub content: NonEmptyString,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    pub created_seq: Seq,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDef {
    pub id: PendingDefId,
    pub term: NonEmptyString,
    pub node: NodeId,
    pub status: PendingDefStatus,
    pub resolved_by: Option<DefinitionId>,
    pub created_at: DateTime<Utc>,
    pub created_seq: Seq,
    pub closed_at: Option<DateTime<Utc>>,
}

impl PendingDef {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == PendingDefStatus::Pending
    }
}

/// Counters describing how replay treated the records it read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub applied: u64,
    /// Tags outside this build's event catalog.
    pub unknown_kinds: u64,
    /// Payloads that did not decode as their declared kind.
    pub malformed: u64,
    /// Well-formed events that were illegal against the folded state.
    pub rejected: u64,
}

impl ReplayStats {
    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.unknown_kinds + self.malformed + self.rejected
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProofState {
    pub(crate) nodes: BTreeMap<NodeId, Node>,
    pub(crate) challenges: BTreeMap<ChallengeId, Challenge>,
    pub(crate) open_challenges: BTreeMap<NodeId, ChallengeId>,
    pub(crate) definitions: BTreeMap<DefinitionId, Definition>,
    pub(crate) definition_names: BTreeMap<String, DefinitionId>,
    pub(crate) pending_defs: BTreeMap<PendingDefId, PendingDef>,
    pub(crate) catalog_version: Option<u32>,
    pub(crate) last_seq: Option<Seq>,
    pub(crate) stats: ReplayStats,
}

impl ProofState {
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.nodes.contains_key(&NodeId::root())
    }

    pub(crate) fn require_initialized(&self) -> Result<(), ServiceError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(ServiceError::not_found(EntityKind::Proof, NodeId::root()))
        }
    }

    /// Highest sequence folded into this state.
    #[must_use]
    pub fn last_seq(&self) -> Option<Seq> {
        self.last_seq
    }

    /// The sequence a writer that validated against this state must land at.
    #[must_use]
    pub fn next_seq(&self) -> Seq {
        self.last_seq.map_or(Seq::FIRST, Seq::next)
    }

    #[must_use]
    pub fn stats(&self) -> ReplayStats {
        self.stats
    }

    /// Event catalog version the proof was started with.
    #[must_use]
    pub fn catalog_version(&self) -> Option<u32> {
        self.catalog_version
    }

    // ── Nodes ────────────────────────────────────────────────

    /// All nodes in tree order (`1`, `1.1`, `1.1.1`, `1.2`, ...).
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub(crate) fn require_node(&self, id: &NodeId) -> Result<&Node, ServiceError> {
        self.nodes
            .get(id)
            .ok_or_else(|| ServiceError::not_found(EntityKind::Node, id))
    }

    pub fn children(&self, id: &NodeId) -> impl Iterator<Item = &Node> {
        self.nodes
            .get(id)
            .into_iter()
            .flat_map(|node| node.children.iter())
            .filter_map(|child| self.nodes.get(child))
    }

    /// Nodes a prover could claim at `now`.
    pub fn available_nodes(&self, now: DateTime<Utc>) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(move |node| node.is_available(now))
    }

    // ── Challenges ───────────────────────────────────────────

    /// All challenges in the order they were raised.
    #[must_use]
    pub fn challenges(&self) -> Vec<&Challenge> {
        let mut all: Vec<&Challenge> = self.challenges.values().collect();
        all.sort_by_key(|challenge| challenge.created_seq);
        all
    }

    #[must_use]
    pub fn challenge(&self, id: &ChallengeId) -> Option<&Challenge> {
        self.challenges.get(id)
    }

    #[must_use]
    pub fn open_challenge_for(&self, node: &NodeId) -> Option<&Challenge> {
        self.open_challenges
            .get(node)
            .and_then(|id| self.challenges.get(id))
    }

    #[must_use]
    pub fn open_challenges(&self) -> Vec<&Challenge> {
        self.challenges_with(ChallengeStatus::Open)
    }

    #[must_use]
    pub fn resolved_challenges(&self) -> Vec<&Challenge> {
        self.challenges_with(ChallengeStatus::Resolved)
    }

    fn challenges_with(&self, status: ChallengeStatus) -> Vec<&Challenge> {
        let mut matching = self.challenges();
        matching.retain(|challenge| challenge.status == status);
        matching
    }

    // ── Definitions ──────────────────────────────────────────

    /// All definitions in the order they were added.
    #[must_use]
    pub fn definitions(&self) -> Vec<&Definition> {
        let mut all: Vec<&Definition> = self.definitions.values().collect();
        all.sort_by_key(|definition| definition.created_seq);
        all
    }

    #[must_use]
    pub fn definition(&self, id: &DefinitionId) -> Option<&Definition> {
        self.definitions.get(id)
    }

    /// Case-sensitive lookup by name.
    #[must_use]
    pub fn definition_by_name(&self, name: &str) -> Option<&Definition> {
        self.definition_names
            .get(name)
            .and_then(|id| self.definitions.get(id))
    }

    // ── Pending definitions ──────────────────────────────────

    /// All pending-definition requests in the order they were raised,
    /// including resolved and cancelled ones.
    #[must_use]
    pub fn pending_defs(&self) -> Vec<&PendingDef> {
        let mut all: Vec<&PendingDef> = self.pending_defs.values().collect();
        all.sort_by_key(|pending| pending.created_seq);
        all
    }

    #[must_use]
    pub fn pending_def(&self, id: &PendingDefId) -> Option<&PendingDef> {
        self.pending_defs.get(id)
    }
}
