//! Replay: fold the ledger into a [`ProofState`].
//!
//! The fold is deterministic. Records are visited in sequence order from an
//! empty state, and every decision depends only on the record and the state
//! folded so far.
//!
//! Records that cannot be applied do not stop replay:
//!
//! - unknown kinds (written by a newer catalog) are skipped,
//! - payloads that do not decode as their declared kind are skipped,
//! - events that are illegal against the folded state are skipped.
//!
//! Each skip is logged and counted in [`ReplayStats`](crate::ReplayStats).
//! Structural corruption detected by the ledger itself is not skipped; it
//! propagates as a storage error.

use tribunal_ledger::{Ledger, LedgerError, RawRecord, Visit};
use tribunal_types::{NodeStatus, Seq};

use crate::challenge;
use crate::definition;
use crate::error::ServiceError;
use crate::events::{Decoded, EVENT_CATALOG_VERSION, Event};
use crate::lifecycle;
use crate::pending_def;
use crate::state::ProofState;

/// Fold every record currently in the ledger.
pub fn project(ledger: &Ledger) -> Result<ProofState, LedgerError> {
    fold(ledger, None)
}

/// Fold only records with `seq <= upto`.
pub fn project_prefix(ledger: &Ledger, upto: Seq) -> Result<ProofState, LedgerError> {
    fold(ledger, Some(upto))
}

fn fold(ledger: &Ledger, upto: Option<Seq>) -> Result<ProofState, LedgerError> {
    let mut state = ProofState::default();
    ledger.scan::<LedgerError, _>(|record| {
        if upto.is_some_and(|limit| record.seq > limit) {
            return Ok(Visit::Stop);
        }
        apply_record(&mut state, record);
        Ok(Visit::Continue)
    })?;
    Ok(state)
}

/// Apply one raw record, skipping it if it cannot be applied.
fn apply_record(state: &mut ProofState, record: RawRecord) {
    let seq = record.seq;
    state.last_seq = Some(seq);

    let event = match Event::decode(&record.kind, record.payload) {
        Ok(Decoded::Known(event)) => event,
        Ok(Decoded::Unknown(kind)) => {
            tracing::debug!(%seq, kind = %kind, "Skipping ledger record of unknown kind");
            state.stats.unknown_kinds += 1;
            return;
        }
        Err(e) => {
            tracing::warn!(%seq, "Skipping malformed ledger record: {e}");
            state.stats.malformed += 1;
            return;
        }
    };

    if let Event::ProofInitialized(init) = &event
        && init.catalog_version > EVENT_CATALOG_VERSION
    {
        tracing::warn!(
            %seq,
            recorded = init.catalog_version,
            supported = EVENT_CATALOG_VERSION,
            "Proof was started by a newer event catalog; unknown kinds will be skipped"
        );
    }

    if let Err(e) = check(state, &event) {
        tracing::warn!(%seq, kind = %event.kind(), "Skipping inapplicable ledger record: {e}");
        state.stats.rejected += 1;
        return;
    }
    apply(state, seq, event);
    state.stats.applied += 1;
}

/// The same rules the facade enforces, evaluated at the recorded instant.
fn check(state: &ProofState, event: &Event) -> Result<(), ServiceError> {
    match event {
        Event::ProofInitialized(_) => lifecycle::check_init(state),
        Event::NodeCreated(e) => lifecycle::check_create(state, &e.node, &e.author, e.timestamp),
        Event::NodeClaimed(e) => lifecycle::check_claimed_event(state, e),
        Event::NodeReleased(e) => lifecycle::check_release(state, &e.node, &e.owner, e.timestamp),
        Event::NodeRefined(e) => lifecycle::check_refine(state, &e.node, &e.owner, e.timestamp),
        Event::NodeAccepted(e) => lifecycle::check_accept(state, &e.node, &e.owner, e.timestamp),
        Event::NodeArchived(e) => lifecycle::check_archive(state, &e.node),
        Event::DefAdded(e) => definition::check_added_event(state, e),
        Event::ChallengeCreated(e) => challenge::check_created_event(state, e),
        Event::ChallengeResolved(e) => challenge::check_close(state, &e.id),
        Event::ChallengeWithdrawn(e) => challenge::check_close(state, &e.id),
        Event::PendingDefCreated(e) => pending_def::check_created_event(state, e),
        Event::PendingDefResolved(e) => pending_def::check_resolve(state, &e.id, &e.definition),
        Event::PendingDefCancelled(e) => pending_def::check_cancel(state, &e.id),
    }
}

fn apply(state: &mut ProofState, seq: Seq, event: Event) {
    match event {
        Event::ProofInitialized(e) => lifecycle::apply_init(state, seq, e),
        Event::NodeCreated(e) => lifecycle::apply_create(state, seq, e),
        Event::NodeClaimed(e) => lifecycle::apply_claim(state, e),
        Event::NodeReleased(e) => lifecycle::apply_settle(state, &e, NodeStatus::Unclaimed),
        Event::NodeRefined(e) => lifecycle::apply_settle(state, &e, NodeStatus::Refined),
        Event::NodeAccepted(e) => lifecycle::apply_settle(state, &e, NodeStatus::Accepted),
        Event::NodeArchived(e) => lifecycle::apply_archive(state, &e),
        Event::DefAdded(e) => definition::apply_add(state, seq, e),
        Event::ChallengeCreated(e) => challenge::apply_raise(state, seq, e),
        Event::ChallengeResolved(e) => challenge::apply_resolve(state, &e),
        Event::ChallengeWithdrawn(e) => challenge::apply_withdraw(state, &e),
        Event::PendingDefCreated(e) => pending_def::apply_create(state, seq, e),
        Event::PendingDefResolved(e) => pending_def::apply_resolve(state, &e),
        Event::PendingDefCancelled(e) => pending_def::apply_cancel(state, &e),
    }
}
