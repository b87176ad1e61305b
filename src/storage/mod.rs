//! Storage layer for a case: pooled connections, the single-writer lock and
//! the cross-process case lock.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                    Case                      │
//! ├──────────────────────────────────────────────┤
//! │  ┌───────────────┐   ┌───────────────────┐   │
//! │  │ StorageHandle │   │    WriteLock      │   │
//! │  │ (conn pool)   │   │ (FIFO, per case)  │   │
//! │  └───────┬───────┘   └─────────┬─────────┘   │
//! │          └──────────┬──────────┘             │
//! │                     ↓                        │
//! │          ┌─────────────────────┐             │
//! │          │  CaseLock (flock)   │             │
//! │          └─────────────────────┘             │
//! └──────────────────────────────────────────────┘
//! ```

mod case_lock;
mod handle;
mod schema;
mod write_lock;

pub use case_lock::CaseLock;
pub use handle::StorageHandle;
pub use write_lock::{WriteGuard, WriteLock};

pub(crate) use handle::PooledConnection;

use std::fmt;

use rusqlite::ErrorCode;

use crate::error::{StorageError, StorageFailure};

/// Wraps a `SQLite` error with operation context.
///
/// The raw error is logged here and dropped; only its category survives.
pub(crate) fn sqlite_error(
    operation: &'static str,
    kind: &'static str,
    key: impl fmt::Display,
    err: &rusqlite::Error,
) -> StorageError {
    let failure = classify(err);
    tracing::warn!(operation, kind, key = %key, %failure, error = %err, "storage operation failed");
    StorageError::new(operation, kind, key, failure)
}

fn classify(err: &rusqlite::Error) -> StorageFailure {
    let rusqlite::Error::SqliteFailure(e, _) = err else {
        return StorageFailure::Other;
    };
    match e.code {
        ErrorCode::DatabaseBusy => StorageFailure::Busy,
        ErrorCode::DatabaseLocked | ErrorCode::FileLockingProtocolFailed => StorageFailure::Locked,
        ErrorCode::ConstraintViolation => StorageFailure::Constraint,
        ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase => StorageFailure::Corrupt,
        ErrorCode::SystemIoFailure | ErrorCode::DiskFull | ErrorCode::CannotOpen => {
            StorageFailure::Io
        }
        ErrorCode::ReadOnly | ErrorCode::PermissionDenied => StorageFailure::ReadOnly,
        _ => StorageFailure::Other,
    }
}

fn extended_code(err: &rusqlite::Error) -> Option<i32> {
    match err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            Some(e.extended_code)
        }
        _ => None,
    }
}

/// True if `err` is a UNIQUE or PRIMARY KEY violation.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        extended_code(err),
        Some(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}

/// True if `err` is a FOREIGN KEY violation.
pub(crate) fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    extended_code(err) == Some(rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY)
}
