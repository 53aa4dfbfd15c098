//! Named, immutable definitions.
//!
//! Names are unique and case-sensitive. A second definition under an existing
//! name is rejected rather than shadowing the first.

use sha2::{Digest, Sha256};
use tribunal_types::Seq;

use crate::error::{ConflictError, EntityKind, ServiceError, ValidationError};
use crate::events::DefAdded;
use crate::state::{Definition, ProofState};

/// Lowercase hex SHA-256 of definition content.
#[must_use]
pub fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

pub(crate) fn check_add(state: &ProofState, name: &str) -> Result<(), ServiceError> {
    state.require_initialized()?;
    if let Some(existing) = state.definition_by_name(name) {
        return Err(ConflictError::DefinitionExists {
            name: name.to_string(),
            existing: existing.id,
        }
        .into());
    }
    Ok(())
}

/// Replay rule for `def_added`: besides the name, the identity must be new
/// and the recorded hash must match the content.
pub(crate) fn check_added_event(state: &ProofState, event: &DefAdded) -> Result<(), ServiceError> {
    check_add(state, &event.name)?;
    if state.definition(&event.id).is_some() {
        return Err(ConflictError::DuplicateId {
            entity: EntityKind::Definition,
            id: event.id.to_string(),
        }
        .into());
    }
    if event.content_hash != content_hash(&event.content) {
        return Err(ValidationError::HashMismatch {
            name: event.name.to_string(),
        }
        .into());
    }
    Ok(())
}

pub(crate) fn apply_add(state: &mut ProofState, seq: Seq, event: DefAdded) {
    state
        .definition_names
        .insert(event.name.to_string(), event.id);
    state.definitions.insert(
        event.id,
        Definition {
            id: event.id,
            name: event.name,
            content: event.content,
            content_hash: event.content_hash,
            created_at: event.timestamp,
            created_seq: seq,
        },
    );
}
