//! Persons: named owners of hosts.
//!
//! Person names are unique under case-insensitive comparison, so
//! `create_or_get("Bob")` and `get("BOB")` address the same row. Only ASCII
//! letters are folded; see [`Person`].

use std::fmt;

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::error::{CaseResult, DomainStateError, ValidationError};
use crate::ids::PersonId;
use crate::manager::{fetch_by_id, EntityManager, NamedRecord, Record};
use crate::storage;

/// A person known to the case.
///
/// Name comparison folds ASCII letters only: `"Bob"` and `"BOB"` are the
/// same person, but `"Émile"` and `"émile"` are two.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Person {
    id: PersonId,
    name: String,
}

impl Person {
    /// The store-assigned id.
    #[must_use]
    pub const fn id(&self) -> PersonId {
        self.id
    }

    /// The person's name as stored.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (person {})", self.name, self.id)
    }
}

impl Record for Person {
    type Id = PersonId;

    const KIND: &'static str = "person";
    const TABLE: &'static str = "persons";
    const COLUMNS: &'static str = "id, name";

    fn id(&self) -> PersonId {
        self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
        })
    }
}

impl NamedRecord for Person {
    type Draft = String;

    const NAME_COLUMN: &'static str = "name";

    fn draft_name(draft: &String) -> &str {
        draft
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn insert(conn: &Connection, name: &String) -> rusqlite::Result<Self> {
        conn.prepare_cached("INSERT INTO persons(name) VALUES (?1)")?
            .execute([name])?;
        Ok(Self {
            id: PersonId::new(conn.last_insert_rowid()),
            name: name.clone(),
        })
    }
}

/// Manager for [`Person`] rows.
pub type PersonManager = EntityManager<Person>;

impl EntityManager<Person> {
    /// Renames a person.
    ///
    /// # Errors
    /// - `ValidationError::EmptyName` for a blank name
    /// - `DomainStateError::NotFound` if no person has this id
    /// - `DomainStateError::NameTaken` if another person already uses the name
    pub fn rename(&self, id: PersonId, new_name: &str) -> CaseResult<Person> {
        if new_name.trim().is_empty() {
            return Err(ValidationError::EmptyName { kind: Person::KIND }.into());
        }

        self.write("rename", id, |tx| {
            let updated = match tx.execute(
                "UPDATE persons SET name = ?1 WHERE id = ?2",
                params![new_name, id],
            ) {
                Ok(n) => n,
                Err(e) if storage::is_unique_violation(&e) => {
                    return Err(DomainStateError::NameTaken {
                        kind: Person::KIND,
                        name: new_name.to_string(),
                    }
                    .into());
                }
                Err(e) => return Err(storage::sqlite_error("rename", Person::KIND, id, &e).into()),
            };
            if updated == 0 {
                return Err(DomainStateError::NotFound {
                    kind: Person::KIND,
                    key: id.to_string(),
                }
                .into());
            }
            tracing::debug!(%id, new_name, "renamed person");

            fetch_by_id::<Person>(tx, id)
                .map_err(|e| storage::sqlite_error("rename", Person::KIND, id, &e))?
                .ok_or_else(|| {
                    DomainStateError::NotFound {
                        kind: Person::KIND,
                        key: id.to_string(),
                    }
                    .into()
                })
        })
    }
}
