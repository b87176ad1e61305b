//! Tables owned by the case store.
//!
//! Created idempotently when a case is opened. Names are compared with
//! `NOCASE` collation so the unique constraints on `persons.name` and
//! `hosts.name` are case-insensitive.

use rusqlite::Connection;

const CASE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS persons (
    id    INTEGER PRIMARY KEY AUTOINCREMENT,
    name  TEXT NOT NULL COLLATE NOCASE UNIQUE
);

CREATE TABLE IF NOT EXISTS hosts (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    name       TEXT NOT NULL COLLATE NOCASE UNIQUE,
    person_id  INTEGER REFERENCES persons(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_hosts_person ON hosts(person_id);

CREATE TABLE IF NOT EXISTS ingest_modules (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    display_name  TEXT NOT NULL,
    unique_name   TEXT NOT NULL UNIQUE,
    type          INTEGER NOT NULL,
    version       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS ingest_jobs (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    data_source_id  INTEGER NOT NULL,
    host_name       TEXT NOT NULL,
    start_date      INTEGER NOT NULL,
    end_date        INTEGER,
    settings_dir    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_ingest_jobs_data_source ON ingest_jobs(data_source_id);

CREATE TABLE IF NOT EXISTS ingest_job_modules (
    ingest_job_id      INTEGER NOT NULL REFERENCES ingest_jobs(id),
    module_id          INTEGER NOT NULL REFERENCES ingest_modules(id),
    pipeline_position  INTEGER NOT NULL,
    PRIMARY KEY (ingest_job_id, module_id)
);
";

/// Creates any missing case tables.
pub(crate) fn create_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(CASE_TABLES)
}
