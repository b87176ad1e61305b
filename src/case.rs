//! The case handle.
//!
//! A [`Case`] owns everything shared by the managers of one case: the
//! directory lock, the connection pool and the write lock. Managers handed
//! out by a case all serialize on that one lock.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::CaseConfig;
use crate::error::{CaseResult, StorageError, StorageFailure};
use crate::host::HostManager;
use crate::ingest::{IngestJobManager, IngestModuleManager};
use crate::manager::EntityManager;
use crate::person::PersonManager;
use crate::storage::{CaseLock, StorageHandle, WriteLock};

const DATABASE_FILE_NAME: &str = "case.db";
const KIND: &str = "case";

/// An open single-user case.
///
/// The directory lock is released once the case and every manager obtained
/// from it have been dropped; managers keep the pool, and with it the lock,
/// alive.
#[derive(Debug)]
pub struct Case {
    dir: PathBuf,
    storage: Arc<StorageHandle>,
    write_lock: Arc<WriteLock>,
}

impl Case {
    /// Opens the case in `dir` with default configuration, creating it if needed.
    ///
    /// # Errors
    /// See [`Case::open_with`].
    pub fn open(dir: impl AsRef<Path>) -> CaseResult<Self> {
        Self::open_with(dir, CaseConfig::default())
    }

    /// Opens the case in `dir`, creating the directory and database if needed.
    ///
    /// # Errors
    /// - `ValidationError::InvalidConfig` if `config` does not validate
    /// - `StorageError` with `StorageFailure::Locked` if the case is already open
    /// - `StorageError` if the directory or database cannot be opened
    pub fn open_with(dir: impl AsRef<Path>, config: CaseConfig) -> CaseResult<Self> {
        let config = config.validate()?;
        let dir = dir.as_ref().to_path_buf();

        fs::create_dir_all(&dir).map_err(|e| {
            tracing::warn!(path = %dir.display(), error = %e, "cannot create case directory");
            StorageError::new("create", KIND, dir.display(), StorageFailure::Io)
        })?;

        let lock = CaseLock::acquire(&dir).map_err(|e| {
            let failure = if e.kind() == ErrorKind::WouldBlock {
                StorageFailure::Locked
            } else {
                StorageFailure::Io
            };
            tracing::warn!(
                path = %dir.display(),
                holder = ?CaseLock::holder(&dir),
                error = %e,
                "cannot lock case directory"
            );
            StorageError::new("lock", KIND, dir.display(), failure)
        })?;

        let storage =
            StorageHandle::open(dir.join(DATABASE_FILE_NAME), &config)?.hold_case_lock(lock);
        tracing::info!(
            path = %dir.display(),
            pool = storage.pool_size(),
            journal = ?config.journal_mode,
            "case opened"
        );

        Ok(Self {
            dir,
            storage: Arc::new(storage),
            write_lock: Arc::new(WriteLock::new()),
        })
    }

    /// The case directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// The shared connection pool.
    #[must_use]
    pub fn storage(&self) -> &Arc<StorageHandle> {
        &self.storage
    }

    /// The case-wide write lock.
    #[must_use]
    pub fn write_lock(&self) -> &Arc<WriteLock> {
        &self.write_lock
    }

    /// Manager for persons.
    #[must_use]
    pub fn persons(&self) -> PersonManager {
        self.manager()
    }

    /// Manager for hosts.
    #[must_use]
    pub fn hosts(&self) -> HostManager {
        self.manager()
    }

    /// Manager for ingest jobs.
    #[must_use]
    pub fn ingest_jobs(&self) -> IngestJobManager {
        self.manager()
    }

    /// Manager for ingest modules.
    #[must_use]
    pub fn ingest_modules(&self) -> IngestModuleManager {
        self.manager()
    }

    fn manager<E: crate::manager::Record>(&self) -> EntityManager<E> {
        EntityManager::new(Arc::clone(&self.storage), Arc::clone(&self.write_lock))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CaseError;
    use tempfile::tempdir;

    #[test]
    fn test_open_creates_directory_and_database() {
        let root = tempdir().unwrap();
        let dir = root.path().join("cases").join("c1");
        let case = Case::open(&dir).unwrap();

        assert!(dir.join(DATABASE_FILE_NAME).exists());
        assert_eq!(case.path(), dir.as_path());
        assert_eq!(case.storage().pool_size(), CaseConfig::default().read_pool_size);
    }

    #[test]
    fn test_second_open_is_locked_out() {
        let dir = tempdir().unwrap();
        let first = Case::open(dir.path()).unwrap();

        let err = Case::open(dir.path()).unwrap_err();
        let CaseError::Storage(storage) = err else {
            panic!("expected storage error, got {err:?}");
        };
        assert_eq!(storage.failure(), StorageFailure::Locked);

        let persons = first.persons();
        drop(first);
        assert!(Case::open(dir.path()).is_err());

        drop(persons);
        Case::open(dir.path()).unwrap();
    }

    #[test]
    fn test_managers_share_one_write_lock() {
        let dir = tempdir().unwrap();
        let case = Case::open(dir.path()).unwrap();

        assert!(Arc::ptr_eq(case.persons().write_lock(), case.write_lock()));
        assert!(Arc::ptr_eq(case.hosts().write_lock(), case.ingest_jobs().write_lock()));

        let _guard = case.write_lock().acquire();
        assert!(case.ingest_modules().write_lock().is_locked());
    }

    #[test]
    fn test_data_survives_reopen() {
        let dir = tempdir().unwrap();
        let id = {
            let case = Case::open(dir.path()).unwrap();
            case.persons().create_or_get("Heidi").unwrap().id()
        };
        let case = Case::open(dir.path()).unwrap();
        assert_eq!(case.persons().get("heidi").unwrap().map(|p| p.id()), Some(id));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempdir().unwrap();
        let config = CaseConfig {
            read_pool_size: 0,
            ..CaseConfig::default()
        };
        assert!(Case::open_with(dir.path(), config).unwrap_err().is_validation());
    }
}
