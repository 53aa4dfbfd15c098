//! Atomic file write helpers.
//!
//! Bytes are written to a temp file in the destination directory, optionally
//! synced, then linked into place. [`atomic_write_new_with_options`] refuses to replace an
//! existing file, which makes "create this exact path exactly once" safe to
//! race across processes: one writer wins and every other writer observes
//! `ErrorKind::AlreadyExists`. A process killed mid-write leaves only a
//! dot-prefixed temp file behind, never a partially written destination.

#[cfg(unix)]
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use tempfile::{Builder, NamedTempFile};
#[cfg(unix)]
use tracing::debug;

/// Prefix of in-flight temp files. Readers scanning the directory skip them.
pub const TEMP_PREFIX: &str = ".tmp-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSyncPolicy {
    SyncAll,
    SkipSync,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentDirSyncPolicy {
    SyncBestEffort,
    SkipSync,
}

#[derive(Debug, Clone, Copy)]
pub struct AtomicWriteOptions {
    /// File sync policy for the temp file before persisting.
    pub file_sync: FileSyncPolicy,
    /// Parent directory sync policy after the file has been persisted.
    pub parent_dir_sync: ParentDirSyncPolicy,
}

impl Default for AtomicWriteOptions {
    fn default() -> Self {
        Self {
            file_sync: FileSyncPolicy::SyncAll,
            parent_dir_sync: ParentDirSyncPolicy::SyncBestEffort,
        }
    }
}

impl AtomicWriteOptions {
    /// No fsync at all. For tests and throwaway directories.
    #[must_use]
    pub const fn unsynced() -> Self {
        Self {
            file_sync: FileSyncPolicy::SkipSync,
            parent_dir_sync: ParentDirSyncPolicy::SkipSync,
        }
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn staged_temp_file(
    parent: &Path,
    bytes: &[u8],
    options: AtomicWriteOptions,
) -> io::Result<NamedTempFile> {
    let mut tmp = Builder::new().prefix(TEMP_PREFIX).tempfile_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    if matches!(options.file_sync, FileSyncPolicy::SyncAll) {
        tmp.as_file().sync_all()?;
    }
    Ok(tmp)
}

/// Write `bytes` to `path`, failing with `ErrorKind::AlreadyExists` if the
/// destination already exists. The staged temp file is removed on failure.
pub fn atomic_write_new_with_options(
    path: impl AsRef<Path>,
    bytes: &[u8],
    options: AtomicWriteOptions,
) -> io::Result<()> {
    let path = path.as_ref();
    let parent = parent_dir(path);

    let tmp = staged_temp_file(parent, bytes, options)?;

    // Persist (link) but fail if the destination already exists. Dropping the
    // returned temp file on error unlinks it.
    if let Err(err) = tmp.persist_noclobber(path) {
        return Err(err.error);
    }

    if matches!(options.parent_dir_sync, ParentDirSyncPolicy::SyncBestEffort) {
        best_effort_sync_parent_dir(parent);
    }

    Ok(())
}

fn best_effort_sync_parent_dir(parent: &Path) {
    #[cfg(unix)]
    {
        if let Err(e) = File::open(parent).and_then(|d| d.sync_all()) {
            debug!(path = %parent.display(), "Parent directory sync_all failed (best-effort): {e}");
        }
    }

    // Directory handles cannot be synced portably elsewhere.
    #[cfg(not(unix))]
    let _ = parent;
}
