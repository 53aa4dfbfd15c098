//! The proof service facade.
//!
//! Every mutating operation follows the same optimistic loop:
//!
//! 1. project a fresh [`ProofState`] from the ledger,
//! 2. validate the request against it at the current instant,
//! 3. compare-and-append exactly one event at `state.next_seq()`.
//!
//! If another writer landed a record first, the append fails with a sequence
//! conflict and the loop starts over from a new projection, so the request is
//! re-validated against the winner's effects. No state is cached between
//! operations, and no lock is held while validating.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tribunal_ledger::{Ledger, LedgerError};
use tribunal_types::{
    ChallengeId, ChallengeOutcome, DefinitionId, NodeId, NodeType, NonEmptyString, PendingDefId,
    Seq, Severity,
};

use crate::challenge;
use crate::clock::{Clock, SystemClock};
use crate::config::ProofConfig;
use crate::definition;
use crate::error::{EntityKind, ServiceError, ValidationError};
use crate::events::{
    ChallengeCreated, ChallengeResolved, ChallengeWithdrawn, DefAdded, EVENT_CATALOG_VERSION,
    Event, NodeArchived, NodeClaimed, NodeCreated, NodeOwnerAction, PendingDefCancelled,
    PendingDefCreated, PendingDefResolved, ProofInitialized,
};
use crate::lifecycle;
use crate::pending_def;
use crate::projector;
use crate::state::{Challenge, Definition, Node, PendingDef, ProofState};

/// Name of the ledger directory inside a proof directory.
pub const LEDGER_DIR_NAME: &str = "ledger";

/// Result of a mutating operation: where its event landed, plus whatever the
/// operation produced (a new identity, a lease expiry, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Appended<T> {
    pub seq: Seq,
    pub value: T,
}

/// Node fields supplied by the author of a new proof step.
#[derive(Debug, Clone, Copy)]
pub struct NewNode<'a> {
    pub id: &'a str,
    pub node_type: NodeType,
    pub content: &'a str,
    pub inference: &'a str,
    pub author: &'a str,
}

fn required(field: &'static str, value: &str) -> Result<NonEmptyString, ValidationError> {
    NonEmptyString::new(value).map_err(|_| ValidationError::EmptyField { field })
}

fn node_id(value: &str) -> Result<NodeId, ValidationError> {
    Ok(NodeId::parse(value)?)
}

#[derive(Debug)]
pub struct ProofService<C: Clock = SystemClock> {
    dir: PathBuf,
    ledger: Ledger,
    config: ProofConfig,
    clock: C,
}

impl ProofService<SystemClock> {
    /// Open a proof directory, creating it and its ledger if needed.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self, ServiceError> {
        let dir = dir.into();
        let config = ProofConfig::load(&dir)?;
        let ledger = Ledger::create(dir.join(LEDGER_DIR_NAME), config.ledger.ledger_options())?;
        Ok(Self::assemble(dir, ledger, config))
    }

    /// Open an existing proof directory. A missing ledger is a storage error.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ServiceError> {
        let dir = dir.into();
        let config = ProofConfig::load(&dir)?;
        let ledger = Ledger::open(dir.join(LEDGER_DIR_NAME), config.ledger.ledger_options())?;
        Ok(Self::assemble(dir, ledger, config))
    }

    fn assemble(dir: PathBuf, ledger: Ledger, config: ProofConfig) -> Self {
        Self {
            dir,
            ledger,
            config,
            clock: SystemClock,
        }
    }
}

impl<C: Clock> ProofService<C> {
    /// Swap the time source, typically for a [`ManualClock`](crate::ManualClock)
    /// in tests.
    pub fn with_clock<D: Clock>(self, clock: D) -> ProofService<D> {
        ProofService {
            dir: self.dir,
            ledger: self.ledger,
            config: self.config,
            clock,
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn config(&self) -> &ProofConfig {
        &self.config
    }

    #[must_use]
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    fn lease_length(&self, requested: Duration) -> Result<chrono::Duration, ValidationError> {
        if requested.is_zero() {
            return Err(ValidationError::NonPositiveLease);
        }
        let max = self.config.lease.max_duration();
        if requested > max {
            return Err(ValidationError::LeaseTooLong { requested, max });
        }
        chrono::Duration::from_std(requested)
            .map_err(|_| ValidationError::LeaseTooLong { requested, max })
    }

    /// `now + length`, refusing expiries chrono cannot represent.
    fn lease_expiry(
        &self,
        now: DateTime<Utc>,
        requested: Duration,
        length: chrono::Duration,
    ) -> Result<DateTime<Utc>, ValidationError> {
        now.checked_add_signed(length)
            .ok_or_else(|| ValidationError::LeaseTooLong {
                requested,
                max: self.config.lease.max_duration(),
            })
    }

    /// Validate-then-append with re-validation on lost sequence races.
    fn commit<T>(
        &self,
        mut plan: impl FnMut(&ProofState, DateTime<Utc>) -> Result<(Event, T), ServiceError>,
    ) -> Result<Appended<T>, ServiceError> {
        let attempts = self.config.ledger.max_append_attempts.max(1);
        for attempt in 1..=attempts {
            let state = projector::project(&self.ledger)?;
            let (event, value) = plan(&state, self.clock.now())?;
            let kind = event.kind();
            let payload = event.encode().map_err(LedgerError::Encode)?;
            match self
                .ledger
                .append_at(state.next_seq(), kind.as_str(), &payload)
            {
                Ok(seq) => return Ok(Appended { seq, value }),
                Err(e) if e.is_sequence_conflict() => {
                    tracing::debug!(attempt, %kind, "Lost ledger race, re-validating: {e}");
                }
                Err(e) => return Err(e.into()),
            }
        }
        tracing::warn!(attempts, dir = %self.dir.display(), "Giving up after repeated ledger races");
        Err(ServiceError::Contention { attempts })
    }

    // ── Proof & nodes ────────────────────────────────────────

    /// Create the root node `1` carrying the conjecture.
    pub fn init(&self, conjecture: &str, author: &str) -> Result<Appended<NodeId>, ServiceError> {
        let conjecture = required("conjecture", conjecture)?;
        let author = required("author", author)?;
        let appended = self.commit(|state, now| {
            lifecycle::check_init(state)?;
            let event = Event::ProofInitialized(ProofInitialized {
                conjecture: conjecture.clone(),
                author: author.clone(),
                catalog_version: EVENT_CATALOG_VERSION,
                timestamp: now,
            });
            Ok((event, NodeId::root()))
        })?;
        tracing::info!(dir = %self.dir.display(), %author, "Initialized proof");
        Ok(appended)
    }

    pub fn create_node(&self, node: NewNode<'_>) -> Result<Appended<NodeId>, ServiceError> {
        let id = node_id(node.id)?;
        let content = required("content", node.content)?;
        let inference = required("inference", node.inference)?;
        let author = required("author", node.author)?;
        self.commit(|state, now| {
            lifecycle::check_create(state, &id, &author, now)?;
            let event = Event::NodeCreated(NodeCreated {
                node: id.clone(),
                node_type: node.node_type,
                content: content.clone(),
                inference: inference.clone(),
                author: author.clone(),
                timestamp: now,
            });
            Ok((event, id.clone()))
        })
    }

    /// Claim a node for `duration`. Returns the lease expiry.
    pub fn claim(
        &self,
        node: &str,
        owner: &str,
        duration: Duration,
    ) -> Result<Appended<DateTime<Utc>>, ServiceError> {
        let id = node_id(node)?;
        let owner = required("owner", owner)?;
        let length = self.lease_length(duration)?;
        self.commit(|state, now| {
            lifecycle::check_claim(state, &id, now)?;
            let expires_at = self.lease_expiry(now, duration, length)?;
            Ok(claim_event(&id, &owner, now, expires_at))
        })
    }

    /// Claim a node for the configured default lease length.
    pub fn claim_default(
        &self,
        node: &str,
        owner: &str,
    ) -> Result<Appended<DateTime<Utc>>, ServiceError> {
        self.claim(node, owner, self.config.lease.default_duration())
    }

    /// Re-issue the caller's own valid lease, counting `duration` from now.
    pub fn extend_claim(
        &self,
        node: &str,
        owner: &str,
        duration: Duration,
    ) -> Result<Appended<DateTime<Utc>>, ServiceError> {
        let id = node_id(node)?;
        let owner = required("owner", owner)?;
        let length = self.lease_length(duration)?;
        self.commit(|state, now| {
            lifecycle::check_extend(state, &id, &owner, now)?;
            let expires_at = self.lease_expiry(now, duration, length)?;
            Ok(claim_event(&id, &owner, now, expires_at))
        })
    }

    pub fn release(&self, node: &str, owner: &str) -> Result<Appended<()>, ServiceError> {
        let id = node_id(node)?;
        let owner = required("owner", owner)?;
        self.commit(|state, now| {
            lifecycle::check_release(state, &id, &owner, now)?;
            Ok((Event::NodeReleased(owner_action(&id, &owner, now)), ()))
        })
    }

    pub fn refine(&self, node: &str, owner: &str) -> Result<Appended<()>, ServiceError> {
        let id = node_id(node)?;
        let owner = required("owner", owner)?;
        self.commit(|state, now| {
            lifecycle::check_refine(state, &id, &owner, now)?;
            Ok((Event::NodeRefined(owner_action(&id, &owner, now)), ()))
        })
    }

    pub fn accept(&self, node: &str, owner: &str) -> Result<Appended<()>, ServiceError> {
        let id = node_id(node)?;
        let owner = required("owner", owner)?;
        self.commit(|state, now| {
            lifecycle::check_accept(state, &id, &owner, now)?;
            Ok((Event::NodeAccepted(owner_action(&id, &owner, now)), ()))
        })
    }

    pub fn archive(&self, node: &str) -> Result<Appended<()>, ServiceError> {
        let id = node_id(node)?;
        self.commit(|state, now| {
            lifecycle::check_archive(state, &id)?;
            let event = Event::NodeArchived(NodeArchived {
                node: id.clone(),
                timestamp: now,
            });
            Ok((event, ()))
        })
    }

    // ── Definitions ──────────────────────────────────────────

    pub fn add_definition(
        &self,
        name: &str,
        content: &str,
    ) -> Result<Appended<DefinitionId>, ServiceError> {
        let name = required("name", name)?;
        let content = required("content", content)?;
        let hash = definition::content_hash(&content);
        self.commit(|state, now| {
            definition::check_add(state, &name)?;
            let id = DefinitionId::new_v4();
            let event = Event::DefAdded(DefAdded {
                id,
                name: name.clone(),
                content: content.clone(),
                content_hash: hash.clone(),
                timestamp: now,
            });
            Ok((event, id))
        })
    }

    // ── Challenges ───────────────────────────────────────────

    pub fn raise_challenge(
        &self,
        node: &str,
        reason: &str,
        severity: Severity,
        raised_by: &str,
    ) -> Result<Appended<ChallengeId>, ServiceError> {
        let id = node_id(node)?;
        let reason = required("reason", reason)?;
        let raised_by = required("raised_by", raised_by)?;
        self.commit(|state, now| {
            challenge::check_raise(state, &id, now)?;
            let challenge = ChallengeId::new_v4();
            let event = Event::ChallengeCreated(ChallengeCreated {
                id: challenge,
                node: id.clone(),
                reason: reason.clone(),
                severity,
                raised_by: raised_by.clone(),
                timestamp: now,
            });
            Ok((event, challenge))
        })
    }

    /// Resolve an open challenge, addressed by identity or unique prefix.
    pub fn resolve_challenge(
        &self,
        key: &str,
        outcome: ChallengeOutcome,
    ) -> Result<Appended<ChallengeId>, ServiceError> {
        let key = required("challenge", key)?;
        self.commit(|state, now| {
            let id = challenge::find_challenge(state, &key)?.id;
            challenge::check_close(state, &id)?;
            let event = Event::ChallengeResolved(ChallengeResolved {
                id,
                outcome,
                timestamp: now,
            });
            Ok((event, id))
        })
    }

    pub fn withdraw_challenge(&self, key: &str) -> Result<Appended<ChallengeId>, ServiceError> {
        let key = required("challenge", key)?;
        self.commit(|state, now| {
            let id = challenge::find_challenge(state, &key)?.id;
            challenge::check_close(state, &id)?;
            let event = Event::ChallengeWithdrawn(ChallengeWithdrawn { id, timestamp: now });
            Ok((event, id))
        })
    }

    // ── Pending definitions ──────────────────────────────────

    /// Record that `node` relies on `term`, which has no definition yet.
    pub fn request_definition(
        &self,
        term: &str,
        node: &str,
    ) -> Result<Appended<PendingDefId>, ServiceError> {
        let term = required("term", term)?;
        let id = node_id(node)?;
        self.commit(|state, now| {
            pending_def::check_create(state, &term, &id)?;
            let pending = PendingDefId::new_v4();
            let event = Event::PendingDefCreated(PendingDefCreated {
                id: pending,
                term: term.clone(),
                node: id.clone(),
                timestamp: now,
            });
            Ok((event, pending))
        })
    }

    /// Resolve a pending request against the definition named
    /// `definition_name`. The request is addressed by term, node id, identity,
    /// or identity prefix.
    pub fn resolve_pending_def(
        &self,
        key: &str,
        definition_name: &str,
    ) -> Result<Appended<PendingDefId>, ServiceError> {
        let key = required("pending definition", key)?;
        let definition_name = required("definition name", definition_name)?;
        self.commit(|state, now| {
            let pending = pending_def::find_pending_def(state, &key)?.id;
            pending_def::check_open(state, &pending)?;
            let definition = state
                .definition_by_name(&definition_name)
                .ok_or_else(|| ServiceError::not_found(EntityKind::Definition, &definition_name))?
                .id;
            pending_def::check_resolve(state, &pending, &definition)?;
            let event = Event::PendingDefResolved(PendingDefResolved {
                id: pending,
                definition,
                timestamp: now,
            });
            Ok((event, pending))
        })
    }

    pub fn cancel_pending_def(&self, key: &str) -> Result<Appended<PendingDefId>, ServiceError> {
        let key = required("pending definition", key)?;
        self.commit(|state, now| {
            let pending = pending_def::find_pending_def(state, &key)?.id;
            pending_def::check_cancel(state, &pending)?;
            let event = Event::PendingDefCancelled(PendingDefCancelled {
                id: pending,
                timestamp: now,
            });
            Ok((event, pending))
        })
    }

    // ── Reads ────────────────────────────────────────────────

    /// A fresh projection of the whole ledger.
    pub fn state(&self) -> Result<ProofState, ServiceError> {
        Ok(projector::project(&self.ledger)?)
    }

    pub fn node(&self, id: &str) -> Result<Node, ServiceError> {
        let id = node_id(id)?;
        self.state()?.require_node(&id).cloned()
    }

    /// All nodes in tree order.
    pub fn list_nodes(&self) -> Result<Vec<Node>, ServiceError> {
        Ok(self.state()?.nodes().cloned().collect())
    }

    /// Nodes that can be claimed right now.
    pub fn available_nodes(&self) -> Result<Vec<Node>, ServiceError> {
        let state = self.state()?;
        Ok(state.available_nodes(self.clock.now()).cloned().collect())
    }

    pub fn challenge(&self, key: &str) -> Result<Challenge, ServiceError> {
        let key = required("challenge", key)?;
        let state = self.state()?;
        challenge::find_challenge(&state, &key).cloned()
    }

    pub fn challenges(&self) -> Result<Vec<Challenge>, ServiceError> {
        Ok(self.state()?.challenges().into_iter().cloned().collect())
    }

    pub fn open_challenges(&self) -> Result<Vec<Challenge>, ServiceError> {
        Ok(self.state()?.open_challenges().into_iter().cloned().collect())
    }

    pub fn resolved_challenges(&self) -> Result<Vec<Challenge>, ServiceError> {
        Ok(self
            .state()?
            .resolved_challenges()
            .into_iter()
            .cloned()
            .collect())
    }

    /// Case-sensitive lookup by exact name.
    pub fn definition_by_name(&self, name: &str) -> Result<Definition, ServiceError> {
        let name = required("name", name)?;
        self.state()?
            .definition_by_name(&name)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(EntityKind::Definition, &name))
    }

    pub fn definitions(&self) -> Result<Vec<Definition>, ServiceError> {
        Ok(self.state()?.definitions().into_iter().cloned().collect())
    }

    pub fn pending_def(&self, key: &str) -> Result<PendingDef, ServiceError> {
        let key = required("pending definition", key)?;
        let state = self.state()?;
        pending_def::find_pending_def(&state, &key).cloned()
    }

    pub fn pending_defs(&self) -> Result<Vec<PendingDef>, ServiceError> {
        Ok(self.state()?.pending_defs().into_iter().cloned().collect())
    }
}

fn claim_event(
    id: &NodeId,
    owner: &NonEmptyString,
    now: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> (Event, DateTime<Utc>) {
    let event = Event::NodeClaimed(NodeClaimed {
        node: id.clone(),
        owner: owner.clone(),
        lease_expires_at: expires_at,
        timestamp: now,
    });
    (event, expires_at)
}

fn owner_action(id: &NodeId, owner: &NonEmptyString, now: DateTime<Utc>) -> NodeOwnerAction {
    NodeOwnerAction {
        node: id.clone(),
        owner: owner.clone(),
        timestamp: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::ConflictError;

    fn service() -> (tempfile::TempDir, ProofService) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(crate::config::CONFIG_FILE_NAME),
            "[lease]\nmax_seconds = 3600\n\n[ledger]\nsync = \"skip_sync\"\n",
        )
        .unwrap();
        let service = ProofService::create(dir.path()).unwrap();
        (dir, service)
    }

    #[test]
    fn validation_happens_before_any_read() {
        let dir = tempfile::tempdir().unwrap();
        let service = ProofService::create(dir.path()).unwrap();
        std::fs::remove_dir(dir.path().join(LEDGER_DIR_NAME)).unwrap();

        // With the ledger gone, anything that reached storage would fail
        // with a storage error instead.
        assert!(matches!(
            service.claim("1.0", "alice", Duration::from_secs(5)),
            Err(ServiceError::Invalid(ValidationError::NodeId(_)))
        ));
        assert!(matches!(
            service.claim("1", "  ", Duration::from_secs(5)),
            Err(ServiceError::Invalid(ValidationError::EmptyField { field: "owner" }))
        ));
        assert!(matches!(
            service.claim("1", "alice", Duration::ZERO),
            Err(ServiceError::Invalid(ValidationError::NonPositiveLease))
        ));
        assert!(matches!(
            service.claim("1", "alice", Duration::from_secs(5)),
            Err(ServiceError::Storage(_))
        ));
    }

    #[test]
    fn lease_longer_than_configured_maximum_is_rejected() {
        let (_dir, service) = service();
        service.init("P", "alice").unwrap();
        let err = service
            .claim("1", "alice", Duration::from_secs(3601))
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Invalid(ValidationError::LeaseTooLong { .. })
        ));
        service.claim("1", "alice", Duration::from_secs(3600)).unwrap();
    }

    #[test]
    fn unrepresentable_lease_expiry_is_rejected() {
        let (_dir, service) = service();
        service.init("P", "alice").unwrap();
        let clock = ManualClock::new(Utc::now());
        let service = service.with_clock(clock.clone());

        clock.set(DateTime::<Utc>::MAX_UTC - chrono::Duration::seconds(10));
        for result in [
            service.claim("1", "alice", Duration::from_secs(3600)),
            service.claim_default("1", "alice"),
        ] {
            assert!(matches!(
                result,
                Err(ServiceError::Invalid(ValidationError::LeaseTooLong { .. }))
            ));
        }
        assert_eq!(service.state().unwrap().last_seq(), Some(Seq::FIRST));
    }

    #[test]
    fn operations_before_init_report_missing_proof() {
        let (_dir, service) = service();
        let err = service.add_definition("group", "A group is...").unwrap_err();
        assert!(matches!(
            err,
            ServiceError::NotFound {
                entity: EntityKind::Proof,
                ..
            }
        ));
        assert!(service.list_nodes().unwrap().is_empty());
    }

    #[test]
    fn init_twice_conflicts() {
        let (_dir, service) = service();
        let first = service.init("P", "alice").unwrap();
        assert_eq!(first.seq, Seq::FIRST);
        assert_eq!(first.value, NodeId::root());
        let err = service.init("Q", "bob").unwrap_err();
        assert_eq!(err.as_conflict(), Some(&ConflictError::AlreadyInitialized));
        assert_eq!(
            service.state().unwrap().catalog_version(),
            Some(EVENT_CATALOG_VERSION)
        );
    }

    #[test]
    fn open_requires_an_existing_ledger() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ProofService::open(dir.path()),
            Err(ServiceError::Storage(LedgerError::MissingDirectory { .. }))
        ));
    }

    #[test]
    fn broken_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(crate::config::CONFIG_FILE_NAME), "[lease").unwrap();
        assert!(matches!(
            ProofService::create(dir.path()),
            Err(ServiceError::Config(_))
        ));
    }

    #[test]
    fn sequences_follow_appends() {
        let (_dir, service) = service();
        service.init("P", "alice").unwrap();
        let claim = service.claim_default("1", "alice").unwrap();
        assert_eq!(claim.seq, Seq::new(2));
        let release = service.release("1", "alice").unwrap();
        assert_eq!(release.seq, Seq::new(3));
        assert_eq!(service.state().unwrap().last_seq(), Some(Seq::new(3)));
    }
}
