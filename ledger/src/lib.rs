//! Durable, append-only event ledger for Tribunal.
//!
//! The ledger is the single source of truth for proof state. It is an
//! untyped append/scan primitive shared by every participant process:
//!
//! ```text
//! <proof-dir>/ledger/
//! ├── 000000000001.json   one immutable record per sequence number
//! ├── 000000000002.json
//! └── .tmp-XXXXXX         in-flight write (ignored by readers)
//! ```
//!
//! Interpretation of `kind` and `payload` belongs to the projector in
//! `tribunal-core`.

mod error;
mod ledger;
mod record;

pub use error::{CorruptReason, LedgerError};
pub use ledger::{Ledger, LedgerOptions, Records, Visit};
pub use record::RawRecord;
