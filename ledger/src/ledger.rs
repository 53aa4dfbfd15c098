//! Append-only, strictly ordered event ledger.
//!
//! The ledger is a directory of immutable record files. Sequence numbers are
//! minted here and nowhere else: a record for sequence `n` is written only
//! after `n - 1` has been observed on disk, and it is linked into place with a
//! no-clobber persist, so two processes racing for the same number cannot
//! both succeed. The ledger does not interpret payloads.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::vec;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};
use tribunal_types::Seq;
use tribunal_utils::{AtomicWriteOptions, TEMP_PREFIX, atomic_write_new_with_options};

use crate::error::LedgerError;
use crate::record::{self, RawRecord};

pub type Result<T, E = LedgerError> = std::result::Result<T, E>;

/// Scan visitor verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Continue,
    Stop,
}

#[derive(Debug, Clone, Copy)]
pub struct LedgerOptions {
    pub write: AtomicWriteOptions,
    /// Upper bound on sequence races [`Ledger::append`] absorbs before
    /// reporting contention.
    pub max_append_attempts: u32,
}

impl Default for LedgerOptions {
    fn default() -> Self {
        Self {
            write: AtomicWriteOptions::default(),
            max_append_attempts: 32,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Ledger {
    dir: PathBuf,
    options: LedgerOptions,
}

impl Ledger {
    /// Open a ledger directory, creating it if needed.
    pub fn create(dir: impl Into<PathBuf>, options: LedgerOptions) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| LedgerError::io(&dir, e))?;
        Self::open(dir, options)
    }

    /// Open an existing ledger directory.
    pub fn open(dir: impl Into<PathBuf>, options: LedgerOptions) -> Result<Self> {
        let dir = dir.into();
        match fs::metadata(&dir) {
            Ok(meta) if meta.is_dir() => Ok(Self { dir, options }),
            Ok(_) => Err(LedgerError::NotADirectory { path: dir }),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(LedgerError::MissingDirectory { path: dir })
            }
            Err(e) => Err(LedgerError::io(&dir, e)),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append a record at the next free sequence number.
    ///
    /// Losing a race for a number is absorbed by re-reading the tail and
    /// trying the following number, up to `max_append_attempts` times.
    pub fn append(&self, kind: &str, payload: &Value) -> Result<Seq> {
        let attempts = self.options.max_append_attempts.max(1);
        for attempt in 1..=attempts {
            let next = self.next_seq()?;
            match self.append_at(next, kind, payload) {
                Ok(seq) => return Ok(seq),
                Err(LedgerError::SequenceTaken { seq }) => {
                    debug!(%seq, attempt, kind, "Lost ledger sequence race, retrying");
                }
                Err(e) => return Err(e),
            }
        }
        warn!(attempts, kind, "Ledger append gave up under contention");
        Err(LedgerError::Contention { attempts })
    }

    /// Append a record only if `expected` is exactly the next free sequence.
    ///
    /// This is the compare-and-append primitive: a writer that validated
    /// against the prefix ending at `expected - 1` either lands its record
    /// directly after that prefix or gets [`LedgerError::SequenceTaken`].
    pub fn append_at(&self, expected: Seq, kind: &str, payload: &Value) -> Result<Seq> {
        validate_kind(kind)?;

        let next = self.next_seq()?;
        if expected < next {
            return Err(LedgerError::SequenceTaken { seq: expected });
        }
        if expected > next {
            return Err(LedgerError::SequenceAhead { expected, next });
        }

        let bytes =
            record::encode(expected, kind, Utc::now(), payload).map_err(LedgerError::Encode)?;
        let path = record::record_path(&self.dir, expected);
        match atomic_write_new_with_options(&path, &bytes, self.options.write) {
            Ok(()) => {
                debug!(seq = %expected, kind, "Appended ledger record");
                Ok(expected)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(LedgerError::SequenceTaken { seq: expected })
            }
            Err(e) => Err(LedgerError::io(path, e)),
        }
    }

    /// Highest sequence number on disk, if any record exists.
    pub fn last_seq(&self) -> Result<Option<Seq>> {
        Ok(self.record_files()?.last().map(|(seq, _)| *seq))
    }

    pub fn next_seq(&self) -> Result<Seq> {
        Ok(self.last_seq()?.map_or(Seq::FIRST, Seq::next))
    }

    /// Lazily iterate records from sequence 1. The set of files is fixed when
    /// the iterator is created; records appended afterwards belong to the
    /// next scan.
    pub fn records(&self) -> Result<Records> {
        Ok(Records {
            files: self.record_files()?.into_iter(),
            failed: false,
        })
    }

    /// Visit every record in ascending order, starting from sequence 1.
    ///
    /// The visitor may stop early or fail; its error is returned unchanged.
    /// Structural corruption surfaces as [`LedgerError::Corrupt`] and ends the
    /// scan.
    pub fn scan<E, F>(&self, mut visit: F) -> Result<(), E>
    where
        E: From<LedgerError>,
        F: FnMut(RawRecord) -> Result<Visit, E>,
    {
        for record in self.records()? {
            if visit(record?)? == Visit::Stop {
                break;
            }
        }
        Ok(())
    }

    /// Record files sorted by sequence, verified to be gapless from 1.
    fn record_files(&self) -> Result<Vec<(Seq, PathBuf)>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| match e.kind() {
            ErrorKind::NotFound => LedgerError::MissingDirectory {
                path: self.dir.clone(),
            },
            _ => LedgerError::io(&self.dir, e),
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| LedgerError::io(&self.dir, e))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(TEMP_PREFIX) {
                continue;
            }
            match record::parse_record_name(&name) {
                Some(seq) => files.push((seq, entry.path())),
                None => debug!(file = %name, "Ignoring non-record file in ledger directory"),
            }
        }
        files.sort_unstable_by_key(|(seq, _)| *seq);

        let mut expected = Seq::FIRST;
        for (seq, _) in &files {
            if *seq != expected {
                return Err(LedgerError::Gap {
                    expected,
                    found: *seq,
                });
            }
            expected = expected.next();
        }
        Ok(files)
    }
}

fn validate_kind(kind: &str) -> Result<()> {
    let valid = !kind.is_empty()
        && kind
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(LedgerError::InvalidKind {
            kind: kind.to_string(),
        })
    }
}

/// Iterator over ledger records, see [`Ledger::records`].
#[derive(Debug)]
pub struct Records {
    files: vec::IntoIter<(Seq, PathBuf)>,
    failed: bool,
}

impl Iterator for Records {
    type Item = Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let (seq, path) = self.files.next()?;
        let result = fs::read(&path)
            .map_err(|e| LedgerError::io(&path, e))
            .and_then(|bytes| {
                record::decode(seq, &bytes)
                    .map_err(|reason| LedgerError::Corrupt { seq, path, reason })
            });
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}
