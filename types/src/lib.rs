//! Core domain types for Tribunal.
//!
//! This crate contains pure domain types with no IO and minimal dependencies:
//! node paths, ledger sequence numbers, entity identities, lifecycle
//! enumerations and validated text. Everything here can be used from any
//! layer, including collaborators that only read projected state.

mod ids;
mod node_id;
mod status;
mod text;

pub use ids::{ChallengeId, DefinitionId, PendingDefId, Seq};
pub use node_id::{NodeId, NodeIdError};
pub use status::{
    ChallengeOutcome, ChallengeStatus, EnumKind, EnumParseError, NodeStatus, NodeType,
    PendingDefStatus, Severity,
};
pub use text::{EmptyStringError, NonEmptyStaticStr, NonEmptyString};
