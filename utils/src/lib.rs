//! Shared infrastructure utilities for Tribunal.
//!
//! - **`atomic_write`**: Crash-safe, no-clobber file persistence (temp + link)

pub mod atomic_write;

pub use atomic_write::{
    AtomicWriteOptions, FileSyncPolicy, ParentDirSyncPolicy, TEMP_PREFIX,
    atomic_write_new_with_options,
};
