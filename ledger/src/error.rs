use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tribunal_types::Seq;

/// Why a structurally invalid record was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorruptReason {
    #[error("record is truncated")]
    Truncated,
    #[error("record is not a valid envelope: {0}")]
    Unparseable(String),
    #[error("envelope claims sequence {found}")]
    SeqMismatch { found: Seq },
    #[error("unsupported record format {0}")]
    UnsupportedFormat(u32),
}

/// Storage-level failures. None of these are recoverable locally: the caller
/// sees them unchanged and no automatic repair is attempted.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger directory {} does not exist", path.display())]
    MissingDirectory { path: PathBuf },

    #[error("ledger path {} is not a directory", path.display())]
    NotADirectory { path: PathBuf },

    #[error("ledger I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupt ledger record {seq} at {}: {reason}", path.display())]
    Corrupt {
        seq: Seq,
        path: PathBuf,
        reason: CorruptReason,
    },

    #[error("ledger has a gap: expected record {expected}, found {found}")]
    Gap { expected: Seq, found: Seq },

    /// Another writer already holds this sequence number.
    #[error("ledger sequence {seq} is already taken")]
    SequenceTaken { seq: Seq },

    #[error("ledger sequence {expected} is ahead of the next free sequence {next}")]
    SequenceAhead { expected: Seq, next: Seq },

    #[error("event kind must be a non-empty snake_case tag (got '{kind}')")]
    InvalidKind { kind: String },

    #[error("failed to encode ledger record: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("gave up appending after losing {attempts} sequence races")]
    Contention { attempts: u32 },
}

impl LedgerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True when a compare-and-append lost to a concurrent writer.
    #[must_use]
    pub fn is_sequence_conflict(&self) -> bool {
        matches!(self, Self::SequenceTaken { .. })
    }
}
