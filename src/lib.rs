//! # casestore - Concurrency and query-predicate core of a forensic case store
//!
//! A case is a directory holding one SQLite database shared by several entity
//! managers. This crate provides:
//!
//! - **Single-writer serialization**: every mutating operation across every
//!   entity kind runs under one case-wide, FIFO [`WriteLock`].
//! - **Create-or-get**: named entities are created at most once, even when
//!   callers race on the same name; all racers receive the same stored row.
//! - **Filters**: an immutable, structurally comparable [`Filter`] algebra
//!   that compiles to parameterized SQL conditions.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use casestore::{Case, Filter, CompileContext};
//!
//! let case = Case::open("/cases/2024-017")?;
//!
//! // Both calls return the same row.
//! let alice = case.persons().create_or_get("Alice")?;
//! let again = case.persons().create_or_get("ALICE")?;
//! assert_eq!(alice.id(), again.id());
//!
//! let host = case.hosts().create_or_get("WS-01")?;
//! case.hosts().set_person(host.id(), Some(alice.id()))?;
//!
//! let filter = Filter::hash_set("Known Bad").and(Filter::hide_known());
//! let predicate = filter.compile(&CompileContext::default());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Foundations
pub mod config;
pub mod error;
pub mod ids;
pub mod storage;

// Entity managers
pub mod case;
pub mod host;
pub mod ingest;
pub mod manager;
pub mod person;

// Query filters
pub mod filter;

pub use case::Case;
pub use config::{CaseConfig, JournalMode, SyncMode};
pub use error::{
    CaseError, CaseResult, DomainStateError, StorageError, StorageFailure, ValidationError,
};
pub use filter::{BoundValue, CompileContext, Filter, FilterColumn, FilterFingerprint, Predicate};
pub use host::{Host, HostManager};
pub use ids::{HostId, IngestJobId, IngestModuleId, PersonId};
pub use ingest::{
    IngestJob, IngestJobManager, IngestJobState, IngestModule, IngestModuleManager,
    IngestModuleType, NewIngestJob, NewIngestModule,
};
pub use manager::{EntityManager, NamedRecord, Record, Upsert, UpsertOutcome};
pub use person::{Person, PersonManager};
pub use storage::{CaseLock, StorageHandle, WriteGuard, WriteLock};
