//! Per-proof configuration.
//!
//! An optional `tribunal.toml` next to the ledger tunes lease bounds and
//! ledger durability. A missing file means defaults.
//!
//! ```toml
//! [lease]
//! default_seconds = 300
//! max_seconds = 86400
//!
//! [ledger]
//! max_append_attempts = 32
//! sync = "sync_all"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tribunal_ledger::LedgerOptions;
use tribunal_utils::{AtomicWriteOptions, FileSyncPolicy, ParentDirSyncPolicy};

pub const CONFIG_FILE_NAME: &str = "tribunal.toml";

/// Ceiling for `lease.max_seconds`: one year.
pub const MAX_LEASE_SECONDS: u64 = 365 * 24 * 60 * 60;

const fn default_lease_seconds() -> u64 {
    300
}

const fn default_max_lease_seconds() -> u64 {
    24 * 60 * 60
}

const fn default_max_append_attempts() -> u32 {
    32
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config at {}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Invalid { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProofConfig {
    #[serde(default)]
    pub lease: LeaseConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LeaseConfig {
    /// Lease length used when a claim does not name one.
    #[serde(default = "default_lease_seconds")]
    pub default_seconds: u64,
    /// Longest lease a single claim may request.
    #[serde(default = "default_max_lease_seconds")]
    pub max_seconds: u64,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            default_seconds: default_lease_seconds(),
            max_seconds: default_max_lease_seconds(),
        }
    }
}

impl LeaseConfig {
    #[must_use]
    pub const fn default_duration(&self) -> Duration {
        Duration::from_secs(self.default_seconds)
    }

    #[must_use]
    pub const fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_seconds)
    }
}

/// Whether record files are fsynced before they become visible.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    #[default]
    SyncAll,
    /// Faster, but a power loss may leave a truncated record behind.
    SkipSync,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LedgerConfig {
    /// How many lost sequence races an operation absorbs before reporting
    /// contention.
    #[serde(default = "default_max_append_attempts")]
    pub max_append_attempts: u32,
    #[serde(default)]
    pub sync: SyncMode,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_append_attempts: default_max_append_attempts(),
            sync: SyncMode::default(),
        }
    }
}

impl LedgerConfig {
    #[must_use]
    pub fn ledger_options(&self) -> LedgerOptions {
        let write = match self.sync {
            SyncMode::SyncAll => AtomicWriteOptions {
                file_sync: FileSyncPolicy::SyncAll,
                parent_dir_sync: ParentDirSyncPolicy::SyncBestEffort,
            },
            SyncMode::SkipSync => AtomicWriteOptions {
                file_sync: FileSyncPolicy::SkipSync,
                parent_dir_sync: ParentDirSyncPolicy::SkipSync,
            },
        };
        LedgerOptions {
            write,
            max_append_attempts: self.max_append_attempts,
        }
    }
}

impl ProofConfig {
    /// Load `tribunal.toml` from a proof directory, falling back to defaults
    /// when the file does not exist.
    pub fn load(proof_dir: &Path) -> Result<Self, ConfigError> {
        let path = proof_dir.join(CONFIG_FILE_NAME);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read { path, source: err });
            }
        };
        Self::parse(&content, path)
    }

    fn parse(content: &str, path: PathBuf) -> Result<Self, ConfigError> {
        let config: Self = match toml::from_str(content) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                return Err(ConfigError::Parse { path, source: err });
            }
        };
        if let Err(reason) = config.validate() {
            return Err(ConfigError::Invalid { path, reason });
        }
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.lease.default_seconds == 0 {
            return Err("lease.default_seconds must be positive".to_string());
        }
        if self.lease.default_seconds > self.lease.max_seconds {
            return Err(format!(
                "lease.default_seconds ({}) exceeds lease.max_seconds ({})",
                self.lease.default_seconds, self.lease.max_seconds
            ));
        }
        if self.lease.max_seconds > MAX_LEASE_SECONDS {
            return Err(format!(
                "lease.max_seconds ({}) exceeds the ceiling of {MAX_LEASE_SECONDS}",
                self.lease.max_seconds
            ));
        }
        if self.ledger.max_append_attempts == 0 {
            return Err("ledger.max_append_attempts must be at least 1".to_string());
        }
        Ok(())
    }
}
