//! Pooled connections to one case database.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use rusqlite::{Connection, OpenFlags};

use super::{schema, sqlite_error, CaseLock};
use crate::config::CaseConfig;
use crate::error::{CaseResult, StorageError, StorageFailure};

const KIND: &str = "case database";

/// Owns the connections to one case database.
///
/// Connections live in a bounded channel. [`StorageHandle::acquire`] takes
/// one out, blocking while all are in use, and the returned guard puts it
/// back when dropped. The handle does not serialize writers; that is the
/// job of [`WriteLock`](super::WriteLock).
pub struct StorageHandle {
    path: PathBuf,
    idle: Receiver<Connection>,
    returns: Sender<Connection>,
    size: usize,
    case_lock: Option<CaseLock>,
}

impl fmt::Debug for StorageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageHandle")
            .field("path", &self.path)
            .field("size", &self.size)
            .field("idle", &self.idle.len())
            .field("case_lock", &self.case_lock.as_ref().map(CaseLock::path))
            .finish()
    }
}

impl StorageHandle {
    /// Opens (creating if needed) the database file at `path` and fills the pool.
    ///
    /// # Errors
    /// - `ValidationError::InvalidConfig` if `config` does not validate
    /// - `StorageError` if the file cannot be opened or the tables cannot be created
    pub fn open(path: impl AsRef<Path>, config: &CaseConfig) -> CaseResult<Self> {
        let config = config.clone().validate()?;
        let path = path.as_ref().to_path_buf();
        let size = config.read_pool_size;
        let (returns, idle) = crossbeam_channel::bounded(size);

        for slot in 0..size {
            let conn = open_connection(&path, &config)
                .map_err(|e| sqlite_error("open", KIND, path.display(), &e))?;
            if slot == 0 {
                schema::create_tables(&conn)
                    .map_err(|e| sqlite_error("create tables in", KIND, path.display(), &e))?;
            }
            returns.try_send(conn).map_err(|_| {
                StorageError::new("open", KIND, path.display(), StorageFailure::Unavailable)
            })?;
        }

        tracing::debug!(path = %path.display(), pool = size, "opened case database");

        Ok(Self {
            path,
            idle,
            returns,
            size,
            case_lock: None,
        })
    }

    /// Keeps `lock` held for as long as the handle lives.
    pub(crate) fn hold_case_lock(mut self, lock: CaseLock) -> Self {
        self.case_lock = Some(lock);
        self
    }

    /// Path of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total number of pooled connections.
    #[must_use]
    pub const fn pool_size(&self) -> usize {
        self.size
    }

    /// Number of connections not currently checked out.
    #[must_use]
    pub fn idle_connections(&self) -> usize {
        self.idle.len()
    }

    /// Checks out a connection, blocking until one is free.
    pub(crate) fn acquire(&self) -> CaseResult<PooledConnection<'_>> {
        let conn = self.idle.recv().map_err(|_| {
            StorageError::new("acquire connection to", KIND, self.path.display(), StorageFailure::Unavailable)
        })?;
        Ok(PooledConnection {
            conn: Some(conn),
            returns: &self.returns,
        })
    }
}

/// A checked-out connection. Returned to the pool on drop.
pub(crate) struct PooledConnection<'a> {
    conn: Option<Connection>,
    returns: &'a Sender<Connection>,
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("connection present until drop")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if self.returns.try_send(conn).is_err() {
                tracing::warn!("connection pool full on return; closing connection");
            }
        }
    }
}

fn open_connection(path: &Path, config: &CaseConfig) -> rusqlite::Result<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(path, flags)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(&format!(
        "PRAGMA journal_mode = {};",
        config.journal_mode.pragma_value()
    ))?;
    conn.execute_batch(&format!(
        "PRAGMA synchronous = {};",
        config.synchronous.pragma_value()
    ))?;
    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    Ok(conn)
}
