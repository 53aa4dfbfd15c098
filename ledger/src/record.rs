//! On-disk record envelope.
//!
//! Every record is one file named after its zero-padded sequence number:
//!
//! ```text
//! ledger/000000000001.json
//! {"format":1,"seq":1,"kind":"proof_initialized","timestamp":"...","payload":{...}}
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tribunal_types::Seq;

use crate::error::CorruptReason;

pub(crate) const RECORD_FORMAT: u32 = 1;
const SEQ_WIDTH: usize = 12;
const RECORD_EXTENSION: &str = "json";

/// An untyped ledger record as handed to scan visitors.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub seq: Seq,
    pub kind: String,
    pub timestamp: DateTime<Utc>,
    pub payload: Value,
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    format: u32,
    seq: Seq,
    kind: &'a str,
    timestamp: DateTime<Utc>,
    payload: &'a Value,
}

#[derive(Deserialize)]
struct Envelope {
    format: u32,
    seq: Seq,
    kind: String,
    timestamp: DateTime<Utc>,
    payload: Value,
}

pub(crate) fn encode(
    seq: Seq,
    kind: &str,
    timestamp: DateTime<Utc>,
    payload: &Value,
) -> serde_json::Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec(&EnvelopeRef {
        format: RECORD_FORMAT,
        seq,
        kind,
        timestamp,
        payload,
    })?;
    bytes.push(b'\n');
    Ok(bytes)
}

pub(crate) fn decode(expected: Seq, bytes: &[u8]) -> Result<RawRecord, CorruptReason> {
    let envelope: Envelope = serde_json::from_slice(bytes).map_err(|e| {
        if e.is_eof() {
            CorruptReason::Truncated
        } else {
            CorruptReason::Unparseable(e.to_string())
        }
    })?;
    if envelope.format != RECORD_FORMAT {
        return Err(CorruptReason::UnsupportedFormat(envelope.format));
    }
    if envelope.seq != expected {
        return Err(CorruptReason::SeqMismatch {
            found: envelope.seq,
        });
    }
    Ok(RawRecord {
        seq: envelope.seq,
        kind: envelope.kind,
        timestamp: envelope.timestamp,
        payload: envelope.payload,
    })
}

pub(crate) fn record_path(dir: &Path, seq: Seq) -> PathBuf {
    dir.join(format!(
        "{:0width$}.{RECORD_EXTENSION}",
        seq.value(),
        width = SEQ_WIDTH
    ))
}

/// Parse a record file name back into its sequence number. Anything else in
/// the directory (temp files, editor droppings) yields `None`.
pub(crate) fn parse_record_name(name: &str) -> Option<Seq> {
    let stem = name.strip_suffix(RECORD_EXTENSION)?.strip_suffix('.')?;
    if stem.len() != SEQ_WIDTH || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match stem.parse::<u64>() {
        Ok(0) | Err(_) => None,
        Ok(value) => Some(Seq::new(value)),
    }
}
