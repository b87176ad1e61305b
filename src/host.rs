//! Hosts: machines data sources were collected from.
//!
//! A host may belong to a [`Person`]. Deleting the person clears the
//! backreference instead of deleting the host.

use std::fmt;

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::error::{CaseResult, DomainStateError, ValidationError};
use crate::ids::{HostId, PersonId};
use crate::manager::{fetch_by_id, EntityManager, NamedRecord, Record};
use crate::person::Person;
use crate::storage;

/// A host known to the case.
///
/// Host names are unique with ASCII-only case folding, as for [`Person`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Host {
    id: HostId,
    name: String,
    person_id: Option<PersonId>,
}

impl Host {
    /// The store-assigned id.
    #[must_use]
    pub const fn id(&self) -> HostId {
        self.id
    }

    /// The host name as stored.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The owning person, if one is assigned.
    #[must_use]
    pub const fn person_id(&self) -> Option<PersonId> {
        self.person_id
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (host {})", self.name, self.id)
    }
}

impl Record for Host {
    type Id = HostId;

    const KIND: &'static str = "host";
    const TABLE: &'static str = "hosts";
    const COLUMNS: &'static str = "id, name, person_id";

    fn id(&self) -> HostId {
        self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            person_id: row.get("person_id")?,
        })
    }
}

impl NamedRecord for Host {
    type Draft = String;

    const NAME_COLUMN: &'static str = "name";

    fn draft_name(draft: &String) -> &str {
        draft
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn insert(conn: &Connection, name: &String) -> rusqlite::Result<Self> {
        conn.prepare_cached("INSERT INTO hosts(name) VALUES (?1)")?
            .execute([name])?;
        Ok(Self {
            id: HostId::new(conn.last_insert_rowid()),
            name: name.clone(),
            person_id: None,
        })
    }
}

/// Manager for [`Host`] rows.
pub type HostManager = EntityManager<Host>;

fn host_not_found(id: HostId) -> DomainStateError {
    DomainStateError::NotFound {
        kind: Host::KIND,
        key: id.to_string(),
    }
}

impl EntityManager<Host> {
    /// Renames a host.
    ///
    /// # Errors
    /// - `ValidationError::EmptyName` for a blank name
    /// - `DomainStateError::NotFound` if no host has this id
    /// - `DomainStateError::NameTaken` if another host already uses the name
    pub fn rename(&self, id: HostId, new_name: &str) -> CaseResult<Host> {
        if new_name.trim().is_empty() {
            return Err(ValidationError::EmptyName { kind: Host::KIND }.into());
        }

        self.write("rename", id, |tx| {
            match tx.execute("UPDATE hosts SET name = ?1 WHERE id = ?2", params![new_name, id]) {
                Ok(0) => return Err(host_not_found(id).into()),
                Ok(_) => {}
                Err(e) if storage::is_unique_violation(&e) => {
                    return Err(DomainStateError::NameTaken {
                        kind: Host::KIND,
                        name: new_name.to_string(),
                    }
                    .into());
                }
                Err(e) => return Err(storage::sqlite_error("rename", Host::KIND, id, &e).into()),
            }

            fetch_by_id::<Host>(tx, id)
                .map_err(|e| storage::sqlite_error("rename", Host::KIND, id, &e))?
                .ok_or_else(|| host_not_found(id).into())
        })
    }

    /// Assigns the host to a person, or clears the assignment with `None`.
    ///
    /// # Errors
    /// - `DomainStateError::NotFound` if the host or the person does not exist
    pub fn set_person(&self, id: HostId, person: Option<PersonId>) -> CaseResult<Host> {
        self.write("assign person to", id, |tx| {
            match tx.execute(
                "UPDATE hosts SET person_id = ?1 WHERE id = ?2",
                params![person, id],
            ) {
                Ok(0) => return Err(host_not_found(id).into()),
                Ok(_) => {}
                Err(e) if storage::is_foreign_key_violation(&e) => {
                    return Err(DomainStateError::NotFound {
                        kind: Person::KIND,
                        key: person.map(|p| p.to_string()).unwrap_or_default(),
                    }
                    .into());
                }
                Err(e) => {
                    return Err(storage::sqlite_error("assign person to", Host::KIND, id, &e).into())
                }
            }
            tracing::debug!(host = %id, person = ?person, "host owner changed");

            fetch_by_id::<Host>(tx, id)
                .map_err(|e| storage::sqlite_error("assign person to", Host::KIND, id, &e))?
                .ok_or_else(|| host_not_found(id).into())
        })
    }

    /// All hosts owned by `person`, ordered by id.
    ///
    /// # Errors
    /// `StorageError` if the read fails.
    pub fn hosts_for_person(&self, person: PersonId) -> CaseResult<Vec<Host>> {
        self.read("list hosts of", person, |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, name, person_id FROM hosts WHERE person_id = ?1 ORDER BY id",
            )?;
            let rows = stmt.query_map([person], |row| Host::from_row(row))?;
            rows.collect()
        })
    }

    /// The person owning `host`, if any.
    ///
    /// # Errors
    /// `StorageError` if the read fails.
    pub fn person_of(&self, host: &Host) -> CaseResult<Option<Person>> {
        let Some(person) = host.person_id else {
            return Ok(None);
        };
        self.read("read owner of", host.id, |conn| fetch_by_id::<Person>(conn, person))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::Case;
    use crate::error::CaseError;
    use tempfile::tempdir;

    #[test]
    fn test_create_or_get_host() {
        let dir = tempdir().unwrap();
        let case = Case::open(dir.path()).unwrap();
        let hosts = case.hosts();

        let a = hosts.create_or_get("WS-01").unwrap();
        let b = hosts.create_or_get("ws-01").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.person_id(), None);
        assert_eq!(hosts.list().unwrap().len(), 1);
    }

    #[test]
    fn test_assign_and_clear_person() {
        let dir = tempdir().unwrap();
        let case = Case::open(dir.path()).unwrap();
        let hosts = case.hosts();
        let alice = case.persons().create_or_get("Alice").unwrap();

        let host = hosts.create_or_get("laptop").unwrap();
        let host = hosts.set_person(host.id(), Some(alice.id())).unwrap();
        assert_eq!(host.person_id(), Some(alice.id()));
        assert_eq!(hosts.person_of(&host).unwrap(), Some(alice.clone()));
        assert_eq!(hosts.hosts_for_person(alice.id()).unwrap(), vec![host.clone()]);

        let host = hosts.set_person(host.id(), None).unwrap();
        assert_eq!(host.person_id(), None);
        assert_eq!(hosts.person_of(&host).unwrap(), None);
    }

    #[test]
    fn test_assign_missing_person() {
        let dir = tempdir().unwrap();
        let case = Case::open(dir.path()).unwrap();
        let hosts = case.hosts();
        let host = hosts.create_or_get("desktop").unwrap();

        let err = hosts.set_person(host.id(), Some(PersonId::new(404))).unwrap_err();
        assert!(matches!(
            err,
            CaseError::DomainState(DomainStateError::NotFound { kind: "person", .. })
        ));
        assert_eq!(hosts.get_by_id(host.id()).unwrap(), Some(host));
    }

    #[test]
    fn test_assign_missing_host() {
        let dir = tempdir().unwrap();
        let case = Case::open(dir.path()).unwrap();

        let err = case.hosts().set_person(HostId::new(5), None).unwrap_err();
        assert!(matches!(
            err,
            CaseError::DomainState(DomainStateError::NotFound { kind: "host", .. })
        ));
    }

    #[test]
    fn test_deleting_person_clears_backreference() {
        let dir = tempdir().unwrap();
        let case = Case::open(dir.path()).unwrap();
        let hosts = case.hosts();
        let persons = case.persons();

        let bob = persons.create_or_get("Bob").unwrap();
        let host = hosts.create_or_get("server").unwrap();
        hosts.set_person(host.id(), Some(bob.id())).unwrap();

        assert!(persons.delete("bob").unwrap());
        let host = hosts.get("server").unwrap().unwrap();
        assert_eq!(host.person_id(), None);
    }

    #[test]
    fn test_rename_host() {
        let dir = tempdir().unwrap();
        let case = Case::open(dir.path()).unwrap();
        let hosts = case.hosts();

        let a = hosts.create_or_get("old-name").unwrap();
        hosts.create_or_get("taken").unwrap();

        let renamed = hosts.rename(a.id(), "new-name").unwrap();
        assert_eq!(renamed.name(), "new-name");
        assert!(matches!(
            hosts.rename(a.id(), "TAKEN").unwrap_err(),
            CaseError::DomainState(DomainStateError::NameTaken { .. })
        ));
    }
}
