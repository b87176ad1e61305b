//! Error types for casestore.
//!
//! All errors are strongly typed using thiserror so callers can match on
//! the failure class: bad input, a lifecycle violation, or a storage fault.
//! Storage faults carry the operation, entity kind and key they occurred on;
//! the underlying SQLite error is logged where it is wrapped and never
//! becomes part of the public error type.

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::ids::IngestJobId;

/// Caller-supplied input violates a precondition.
///
/// Always raised before any storage access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{kind} name cannot be empty")]
    EmptyName {
        kind: &'static str,
    },

    #[error("Required field '{field}' is missing")]
    MissingField {
        field: &'static str,
    },

    #[error("End date {end} precedes start date {start}")]
    EndBeforeStart {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Timestamp {seconds} is outside the supported range")]
    TimestampOutOfRange {
        seconds: i64,
    },

    #[error("'{identifier}' is not a valid column identifier")]
    InvalidIdentifier {
        identifier: String,
    },

    #[error("Module '{unique_name}' is listed more than once")]
    DuplicateModule {
        unique_name: String,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

/// An operation violates an entity's lifecycle contract.
///
/// Raising one of these never mutates in-memory or persisted state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainStateError {
    #[error("Ingest job {job_id} already ended at {end_date}")]
    EndDateAlreadySet {
        job_id: IngestJobId,
        end_date: DateTime<Utc>,
    },

    #[error("{kind} '{key}' not found")]
    NotFound {
        kind: &'static str,
        key: String,
    },

    #[error("{kind} name '{name}' is already taken")]
    NameTaken {
        kind: &'static str,
        name: String,
    },

    #[error("{kind} '{key}' is still referenced and cannot be removed")]
    InUse {
        kind: &'static str,
        key: String,
    },
}

/// Coarse category of a storage failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageFailure {
    /// The database stayed busy past the configured timeout.
    Busy,
    /// The case is locked by another process or handle.
    Locked,
    /// A constraint rejected the statement.
    Constraint,
    /// The database file is damaged or not a database.
    Corrupt,
    /// Disk or filesystem failure.
    Io,
    /// The database is read-only or access was denied.
    ReadOnly,
    /// No connection could be obtained.
    Unavailable,
    /// Anything else.
    Other,
}

impl fmt::Display for StorageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Busy => "database busy",
            Self::Locked => "case locked",
            Self::Constraint => "constraint violation",
            Self::Corrupt => "database corrupt",
            Self::Io => "I/O failure",
            Self::ReadOnly => "read-only database",
            Self::Unavailable => "storage unavailable",
            Self::Other => "storage failure",
        };
        f.write_str(s)
    }
}

/// Persistence failure wrapped with the context it happened in.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to {operation} {kind} '{key}': {failure}")]
pub struct StorageError {
    operation: &'static str,
    kind: &'static str,
    key: String,
    failure: StorageFailure,
}

impl StorageError {
    /// Creates a storage error for `operation` on the `kind` row named by `key`.
    #[must_use]
    pub fn new(
        operation: &'static str,
        kind: &'static str,
        key: impl fmt::Display,
        failure: StorageFailure,
    ) -> Self {
        Self {
            operation,
            kind,
            key: key.to_string(),
            failure,
        }
    }

    /// The operation that failed, e.g. `"create"`.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        self.operation
    }

    /// The entity kind the operation targeted.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        self.kind
    }

    /// The key (name or id) the operation targeted.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The failure category.
    #[must_use]
    pub const fn failure(&self) -> StorageFailure {
        self.failure
    }
}

/// Top-level error type for casestore.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaseError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Domain state error: {0}")]
    DomainState(#[from] DomainStateError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl CaseError {
    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a domain state error.
    #[must_use]
    pub const fn is_domain_state(&self) -> bool {
        matches!(self, Self::DomainState(_))
    }

    /// Returns true if this is a storage error.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if retrying the same call may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) | Self::DomainState(_) => false,
            Self::Storage(e) => matches!(e.failure, StorageFailure::Busy | StorageFailure::Locked),
        }
    }
}

/// Result type alias for casestore operations.
pub type CaseResult<T> = Result<T, CaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display_names_context() {
        let err = StorageError::new("create", "person", "Alice", StorageFailure::Io);
        let msg = err.to_string();
        assert!(msg.contains("create"));
        assert!(msg.contains("person"));
        assert!(msg.contains("Alice"));
        assert!(msg.contains("I/O failure"));
    }

    #[test]
    fn test_error_classification() {
        let err: CaseError = ValidationError::EmptyName { kind: "person" }.into();
        assert!(err.is_validation());
        assert!(!err.is_retryable());

        let err: CaseError = DomainStateError::NotFound {
            kind: "host",
            key: "7".to_string(),
        }
        .into();
        assert!(err.is_domain_state());

        let err: CaseError =
            StorageError::new("read", "person", "Bob", StorageFailure::Busy).into();
        assert!(err.is_storage());
        assert!(err.is_retryable());

        let err: CaseError =
            StorageError::new("read", "person", "Bob", StorageFailure::Corrupt).into();
        assert!(!err.is_retryable());
    }
}
