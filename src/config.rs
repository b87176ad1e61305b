//! Configuration for opening a case.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{CaseResult, StorageError, StorageFailure, ValidationError};

/// `SQLite` journal mode for the case database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    /// Write-ahead log: readers never block the single writer.
    #[default]
    Wal,
    /// Rollback journal.
    Delete,
}

impl JournalMode {
    pub(crate) const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "WAL",
            Self::Delete => "DELETE",
        }
    }
}

/// `SQLite` synchronous level for the case database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// fsync at critical moments; safe with WAL.
    #[default]
    Normal,
    /// fsync on every commit.
    Full,
}

impl SyncMode {
    pub(crate) const fn pragma_value(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Full => "FULL",
        }
    }
}

/// Configuration for a case database.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaseConfig {
    /// Number of pooled connections shared by readers and the writer.
    pub read_pool_size: usize,
    /// How long a statement waits on a locked database before failing (ms).
    pub busy_timeout_ms: u64,
    /// Journal mode applied to every connection.
    pub journal_mode: JournalMode,
    /// Synchronous level applied to every connection.
    pub synchronous: SyncMode,
}

impl Default for CaseConfig {
    fn default() -> Self {
        Self {
            read_pool_size: 4,
            busy_timeout_ms: 5_000,
            journal_mode: JournalMode::Wal,
            synchronous: SyncMode::Normal,
        }
    }
}

impl CaseConfig {
    const MAX_POOL_SIZE: usize = 64;

    /// Checks the configuration and returns it unchanged if usable.
    ///
    /// # Errors
    /// `ValidationError::InvalidConfig` for a zero or oversized pool, or a
    /// zero busy timeout.
    pub fn validate(self) -> Result<Self, ValidationError> {
        if self.read_pool_size == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "read_pool_size must be at least 1".to_string(),
            });
        }

        if self.read_pool_size > Self::MAX_POOL_SIZE {
            return Err(ValidationError::InvalidConfig {
                reason: format!(
                    "read_pool_size must be at most {} (got {})",
                    Self::MAX_POOL_SIZE, self.read_pool_size
                ),
            });
        }

        if self.busy_timeout_ms == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "busy_timeout_ms must be non-zero".to_string(),
            });
        }

        Ok(self)
    }

    /// Parses and validates a JSON configuration document.
    ///
    /// Missing fields take their default values.
    ///
    /// # Errors
    /// `ValidationError::InvalidConfig` if the document does not parse or
    /// fails [`CaseConfig::validate`].
    pub fn from_json_str(json: &str) -> Result<Self, ValidationError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ValidationError::InvalidConfig {
            reason: e.to_string(),
        })?;
        config.validate()
    }

    /// Loads and validates a JSON configuration file.
    ///
    /// # Errors
    /// A storage error if the file cannot be read, otherwise as
    /// [`CaseConfig::from_json_str`].
    pub fn load(path: impl AsRef<Path>) -> CaseResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            tracing::warn!(path = %path.display(), error = %e, "cannot read case config");
            StorageError::new("read", "config", path.display(), StorageFailure::Io)
        })?;
        Ok(Self::from_json_str(&raw)?)
    }
}
