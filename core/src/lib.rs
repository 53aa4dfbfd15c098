//! Proof-tree coordination for Tribunal.
//!
//! Every participant works against a shared proof directory. All state lives
//! in the append-only ledger; this crate decides what may be appended and how
//! the ledger folds back into a [`ProofState`]:
//!
//! - [`events`]: the closed catalog of event kinds and payloads
//! - [`projector`]: deterministic replay of the ledger
//! - [`ProofService`]: validate-then-append facade used by callers
//!
//! Lifecycle, challenge, definition and pending-definition rules are shared by
//! the facade and replay, so a record that was legal when written folds the
//! same way on every reader.

mod challenge;
pub mod clock;
pub mod config;
mod definition;
mod error;
pub mod events;
mod lifecycle;
mod pending_def;
pub mod projector;
mod service;
mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    ConfigError, LeaseConfig, LedgerConfig, MAX_LEASE_SECONDS, ProofConfig, SyncMode,
};
pub use definition::content_hash;
pub use error::{ConflictError, EntityKind, NodeAction, ServiceError, ValidationError};
pub use lifecycle::CONJECTURE_INFERENCE;
pub use projector::{project, project_prefix};
pub use service::{Appended, LEDGER_DIR_NAME, NewNode, ProofService};
pub use state::{Challenge, Definition, Lease, Node, PendingDef, ProofState, ReplayStats};

pub use tribunal_ledger::{Ledger, LedgerError, LedgerOptions};
pub use tribunal_types::{
    ChallengeId, ChallengeOutcome, ChallengeStatus, DefinitionId, NodeId, NodeStatus, NodeType,
    PendingDefId, PendingDefStatus, Seq, Severity,
};
