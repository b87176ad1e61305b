//! Generic entity manager.
//!
//! An [`EntityManager<E>`] is the read/write entry point for one entity kind.
//! All managers of a case share one [`StorageHandle`] and one [`WriteLock`],
//! both injected at construction. Mutations run as one transaction while the
//! write lock is held; the guard and the pooled connection are released on
//! every exit path because both are scoped values.
//!
//! Per-kind operations (rename, end date, ...) live next to their entity type
//! as inherent impls on the concrete manager.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use rusqlite::{Connection, OptionalExtension, Row, ToSql, Transaction};

use crate::error::{CaseResult, DomainStateError, StorageError, StorageFailure, ValidationError};
use crate::storage::{self, StorageHandle, WriteLock};

/// A row type stored in its own table.
///
/// Implemented by every managed entity; the `SQLite` plumbing is crate-private.
pub trait Record: Sized + Send + 'static {
    /// Identifier type of the row.
    type Id: Copy + fmt::Display + ToSql + Send;

    /// Human-readable entity kind used in errors and logs.
    const KIND: &'static str;

    #[doc(hidden)]
    const TABLE: &'static str;

    #[doc(hidden)]
    const COLUMNS: &'static str;

    /// The store-assigned id.
    fn id(&self) -> Self::Id;

    #[doc(hidden)]
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Loads owned associations after the row itself has been read.
    #[doc(hidden)]
    fn load_associations(&mut self, _conn: &Connection) -> rusqlite::Result<()> {
        Ok(())
    }
}

/// A record with a unique natural key (its name).
pub trait NamedRecord: Record {
    /// Everything needed to insert a new row.
    type Draft: Send;

    #[doc(hidden)]
    const NAME_COLUMN: &'static str;

    /// The natural key the draft will be stored under.
    fn draft_name(draft: &Self::Draft) -> &str;

    /// The natural key of a stored row.
    fn name(&self) -> &str;

    /// Rejects drafts that must not reach storage.
    ///
    /// # Errors
    /// `ValidationError::EmptyName` by default for a blank name.
    fn validate(draft: &Self::Draft) -> Result<(), ValidationError> {
        if Self::draft_name(draft).trim().is_empty() {
            return Err(ValidationError::EmptyName { kind: Self::KIND });
        }
        Ok(())
    }

    #[doc(hidden)]
    fn insert(conn: &Connection, draft: &Self::Draft) -> rusqlite::Result<Self>;
}

/// Whether a create-or-get inserted the row or found it already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// This call inserted the row.
    Created,
    /// The insert hit the uniqueness constraint; the stored row was returned.
    Existing,
}

/// Result of [`EntityManager::upsert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upsert<E> {
    /// The stored entity.
    pub entity: E,
    /// How the entity was obtained.
    pub outcome: UpsertOutcome,
    /// The uniqueness conflict that was resolved, when the row already existed.
    pub recovered_conflict: Option<String>,
}

impl<E> Upsert<E> {
    /// True if this call created the row.
    #[must_use]
    pub fn created(&self) -> bool {
        self.outcome == UpsertOutcome::Created
    }

    /// Discards the outcome.
    #[must_use]
    pub fn into_entity(self) -> E {
        self.entity
    }
}

/// A uniqueness race lost during create-or-get.
///
/// Never leaves the crate: it is resolved by fetching the winning row. Only
/// its `Display` form is handed to callers; `detail` holds the raw `SQLite`
/// message and goes to the log.
#[derive(Debug)]
pub(crate) struct ConflictError {
    pub(crate) kind: &'static str,
    pub(crate) key: String,
    pub(crate) detail: String,
}

impl fmt::Display for ConflictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' already exists", self.kind, self.key)
    }
}

/// CRUD and create-or-get for one entity kind.
pub struct EntityManager<E> {
    storage: Arc<StorageHandle>,
    write_lock: Arc<WriteLock>,
    _kind: PhantomData<fn() -> E>,
}

impl<E> Clone for EntityManager<E> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            write_lock: Arc::clone(&self.write_lock),
            _kind: PhantomData,
        }
    }
}

impl<E> fmt::Debug for EntityManager<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityManager")
            .field("kind", &std::any::type_name::<E>())
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}

impl<E: Record> EntityManager<E> {
    /// Creates a manager over a case's shared storage and write lock.
    #[must_use]
    pub fn new(storage: Arc<StorageHandle>, write_lock: Arc<WriteLock>) -> Self {
        Self {
            storage,
            write_lock,
            _kind: PhantomData,
        }
    }

    /// The write lock this manager serializes on.
    #[must_use]
    pub fn write_lock(&self) -> &Arc<WriteLock> {
        &self.write_lock
    }

    /// Looks up a row by id.
    ///
    /// # Errors
    /// `StorageError` if the read fails.
    pub fn get_by_id(&self, id: E::Id) -> CaseResult<Option<E>> {
        self.read("read", id, |conn| fetch_by_id::<E>(conn, id))
    }

    /// All rows, ordered by id.
    ///
    /// # Errors
    /// `StorageError` if the read fails.
    pub fn list(&self) -> CaseResult<Vec<E>> {
        self.read("list", "*", |conn| {
            let sql = format!("SELECT {} FROM {} ORDER BY id", E::COLUMNS, E::TABLE);
            let mut stmt = conn.prepare_cached(&sql)?;
            let rows = stmt.query_map([], |row| E::from_row(row))?;
            let mut out = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            for entity in &mut out {
                entity.load_associations(conn)?;
            }
            Ok(out)
        })
    }

    /// Runs `f` on a pooled connection without taking the write lock.
    pub(crate) fn read<T>(
        &self,
        operation: &'static str,
        key: impl fmt::Display,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> CaseResult<T> {
        let conn = self.storage.acquire()?;
        f(&conn).map_err(|e| storage::sqlite_error(operation, E::KIND, key, &e).into())
    }

    /// Runs `f` in one transaction while holding the case write lock.
    ///
    /// The transaction commits only if `f` succeeds; otherwise it rolls back
    /// when dropped.
    pub(crate) fn write<T>(
        &self,
        operation: &'static str,
        key: impl fmt::Display,
        f: impl FnOnce(&Transaction<'_>) -> CaseResult<T>,
    ) -> CaseResult<T> {
        let _guard = self.write_lock.acquire();
        let mut conn = self.storage.acquire()?;
        let tx = conn
            .transaction()
            .map_err(|e| storage::sqlite_error(operation, E::KIND, &key, &e))?;
        let value = f(&tx)?;
        tx.commit()
            .map_err(|e| storage::sqlite_error(operation, E::KIND, &key, &e))?;
        Ok(value)
    }
}

impl<E: NamedRecord> EntityManager<E> {
    /// Creates the entity, or returns the stored one if the name is taken.
    ///
    /// Concurrent callers passing the same name all receive the same row.
    ///
    /// # Errors
    /// - `ValidationError` if the draft is rejected
    /// - `StorageError` if the insert fails for any reason other than the
    ///   name already being stored
    pub fn create_or_get(&self, draft: impl Into<E::Draft>) -> CaseResult<E> {
        self.upsert(draft).map(Upsert::into_entity)
    }

    /// Like [`create_or_get`](Self::create_or_get), also reporting whether
    /// this call created the row.
    ///
    /// # Errors
    /// As [`create_or_get`](Self::create_or_get).
    pub fn upsert(&self, draft: impl Into<E::Draft>) -> CaseResult<Upsert<E>> {
        let draft = draft.into();
        E::validate(&draft)?;
        let name = E::draft_name(&draft).to_string();
        self.write("create", &name, |tx| create_or_fetch::<E>(tx, &draft))
    }

    /// Looks up an entity by its natural key.
    ///
    /// # Errors
    /// `StorageError` if the read fails.
    pub fn get(&self, name: &str) -> CaseResult<Option<E>> {
        self.read("read", name, |conn| fetch_by_name::<E>(conn, name))
    }

    /// Deletes the entity with the given natural key.
    ///
    /// Returns whether a row was removed.
    ///
    /// # Errors
    /// - `DomainStateError::InUse` if other rows still reference it
    /// - `StorageError` if the delete fails
    pub fn delete(&self, name: &str) -> CaseResult<bool> {
        self.write("delete", name, |tx| {
            let sql = format!("DELETE FROM {} WHERE {} = ?1", E::TABLE, E::NAME_COLUMN);
            match tx.execute(&sql, [name]) {
                Ok(n) => {
                    tracing::debug!(kind = E::KIND, name, removed = n, "delete");
                    Ok(n > 0)
                }
                Err(e) if storage::is_foreign_key_violation(&e) => Err(DomainStateError::InUse {
                    kind: E::KIND,
                    key: name.to_string(),
                }
                .into()),
                Err(e) => Err(storage::sqlite_error("delete", E::KIND, name, &e).into()),
            }
        })
    }
}

pub(crate) fn fetch_by_id<E: Record>(conn: &Connection, id: E::Id) -> rusqlite::Result<Option<E>> {
    let sql = format!("SELECT {} FROM {} WHERE id = ?1", E::COLUMNS, E::TABLE);
    let found = conn
        .prepare_cached(&sql)?
        .query_row([id], |row| E::from_row(row))
        .optional()?;
    found
        .map(|mut entity| {
            entity.load_associations(conn)?;
            Ok(entity)
        })
        .transpose()
}

pub(crate) fn fetch_by_name<E: NamedRecord>(
    conn: &Connection,
    name: &str,
) -> rusqlite::Result<Option<E>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = ?1",
        E::COLUMNS,
        E::TABLE,
        E::NAME_COLUMN
    );
    let found = conn
        .prepare_cached(&sql)?
        .query_row([name], |row| E::from_row(row))
        .optional()?;
    found
        .map(|mut entity| {
            entity.load_associations(conn)?;
            Ok(entity)
        })
        .transpose()
}

/// Inserts `draft`, falling back to the stored row on a uniqueness conflict.
///
/// Must run while the caller holds the write lock.
pub(crate) fn create_or_fetch<E: NamedRecord>(
    conn: &Connection,
    draft: &E::Draft,
) -> CaseResult<Upsert<E>> {
    let name = E::draft_name(draft);
    let conflict = match E::insert(conn, draft) {
        Ok(entity) => {
            tracing::debug!(kind = E::KIND, name, id = %entity.id(), "created");
            return Ok(Upsert {
                entity,
                outcome: UpsertOutcome::Created,
                recovered_conflict: None,
            });
        }
        Err(e) if storage::is_unique_violation(&e) => ConflictError {
            kind: E::KIND,
            key: name.to_string(),
            detail: e.to_string(),
        },
        Err(e) => return Err(storage::sqlite_error("create", E::KIND, name, &e).into()),
    };

    match fetch_by_name::<E>(conn, name) {
        Ok(Some(entity)) => {
            tracing::debug!(
                kind = E::KIND,
                name,
                id = %entity.id(),
                conflict = %conflict,
                detail = %conflict.detail,
                "name already stored; returning existing row"
            );
            Ok(Upsert {
                entity,
                outcome: UpsertOutcome::Existing,
                recovered_conflict: Some(conflict.to_string()),
            })
        }
        Ok(None) => {
            // Unique violation on something other than the natural key.
            tracing::warn!(
                conflict = %conflict,
                detail = %conflict.detail,
                "uniqueness conflict without a matching row"
            );
            Err(StorageError::new("create", E::KIND, name, StorageFailure::Constraint).into())
        }
        Err(e) => Err(storage::sqlite_error("create", E::KIND, name, &e).into()),
    }
}
