//! Ingest jobs and the ingest modules they ran.
//!
//! A job is created running and completes exactly once, when its end date is
//! set. The end date is written to the database before it becomes visible in
//! memory, and a stored end date is never overwritten.
//!
//! Dates are stored as whole UNIX seconds; values are truncated to seconds
//! before they are written so memory and storage always agree.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::{CaseResult, DomainStateError, ValidationError};
use crate::ids::{IngestJobId, IngestModuleId};
use crate::manager::{create_or_fetch, EntityManager, NamedRecord, Record};
use crate::storage;

fn to_stored_seconds(ts: DateTime<Utc>) -> Result<DateTime<Utc>, ValidationError> {
    from_seconds(ts.timestamp()).ok_or(ValidationError::TimestampOutOfRange {
        seconds: ts.timestamp(),
    })
}

fn from_seconds(seconds: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0)
}

fn date_column(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let Some(seconds) = row.get::<_, Option<i64>>(column)? else {
        return Ok(None);
    };
    let index = row.as_ref().column_index(column)?;
    from_seconds(seconds)
        .map(Some)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(index, seconds))
}

/// Pipeline stage an ingest module runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestModuleType {
    /// Runs once per data source.
    DataSourceLevel,
    /// Runs once per file.
    FileLevel,
    /// Runs once per analysis result.
    DataArtifact,
    /// Runs on analysis results.
    AnalysisResult,
    /// Multiple stages.
    Multiple,
}

impl IngestModuleType {
    const fn code(self) -> i64 {
        match self {
            Self::DataSourceLevel => 0,
            Self::FileLevel => 1,
            Self::DataArtifact => 2,
            Self::AnalysisResult => 3,
            Self::Multiple => 4,
        }
    }

    const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::DataSourceLevel),
            1 => Some(Self::FileLevel),
            2 => Some(Self::DataArtifact),
            3 => Some(Self::AnalysisResult),
            4 => Some(Self::Multiple),
            _ => None,
        }
    }
}

impl fmt::Display for IngestModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DataSourceLevel => write!(f, "data source level"),
            Self::FileLevel => write!(f, "file level"),
            Self::DataArtifact => write!(f, "data artifact"),
            Self::AnalysisResult => write!(f, "analysis result"),
            Self::Multiple => write!(f, "multiple"),
        }
    }
}

/// An ingest module registered in the case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IngestModule {
    id: IngestModuleId,
    display_name: String,
    unique_name: String,
    module_type: IngestModuleType,
    version: String,
}

impl IngestModule {
    /// The store-assigned id.
    #[must_use]
    pub const fn id(&self) -> IngestModuleId {
        self.id
    }

    /// Name shown to users.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Stable, case-sensitive natural key.
    #[must_use]
    pub fn unique_name(&self) -> &str {
        &self.unique_name
    }

    /// Pipeline stage.
    #[must_use]
    pub const fn module_type(&self) -> IngestModuleType {
        self.module_type
    }

    /// Module version string.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }
}

/// Fields for registering an ingest module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIngestModule {
    /// Name shown to users.
    pub display_name: String,
    /// Stable natural key.
    pub unique_name: String,
    /// Pipeline stage.
    pub module_type: IngestModuleType,
    /// Module version string.
    pub version: String,
}

impl NewIngestModule {
    /// Creates a draft whose display name equals its unique name.
    #[must_use]
    pub fn new(
        unique_name: impl Into<String>,
        module_type: IngestModuleType,
        version: impl Into<String>,
    ) -> Self {
        let unique_name = unique_name.into();
        Self {
            display_name: unique_name.clone(),
            unique_name,
            module_type,
            version: version.into(),
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }
}

impl Record for IngestModule {
    type Id = IngestModuleId;

    const KIND: &'static str = "ingest module";
    const TABLE: &'static str = "ingest_modules";
    const COLUMNS: &'static str = "id, display_name, unique_name, type, version";

    fn id(&self) -> IngestModuleId {
        self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let code: i64 = row.get("type")?;
        let module_type = IngestModuleType::from_code(code).ok_or_else(|| {
            let index = row.as_ref().column_index("type").unwrap_or_default();
            rusqlite::Error::IntegralValueOutOfRange(index, code)
        })?;
        Ok(Self {
            id: row.get("id")?,
            display_name: row.get("display_name")?,
            unique_name: row.get("unique_name")?,
            module_type,
            version: row.get("version")?,
        })
    }
}

impl NamedRecord for IngestModule {
    type Draft = NewIngestModule;

    const NAME_COLUMN: &'static str = "unique_name";

    fn draft_name(draft: &NewIngestModule) -> &str {
        &draft.unique_name
    }

    fn name(&self) -> &str {
        &self.unique_name
    }

    fn insert(conn: &Connection, draft: &NewIngestModule) -> rusqlite::Result<Self> {
        conn.prepare_cached(
            "INSERT INTO ingest_modules(display_name, unique_name, type, version) \
             VALUES (?1, ?2, ?3, ?4)",
        )?
        .execute(params![
            draft.display_name,
            draft.unique_name,
            draft.module_type.code(),
            draft.version
        ])?;
        Ok(Self {
            id: IngestModuleId::new(conn.last_insert_rowid()),
            display_name: draft.display_name.clone(),
            unique_name: draft.unique_name.clone(),
            module_type: draft.module_type,
            version: draft.version.clone(),
        })
    }
}

/// Manager for [`IngestModule`] rows.
pub type IngestModuleManager = EntityManager<IngestModule>;

/// Lifecycle state of an ingest job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IngestJobState {
    /// No end date yet.
    Running,
    /// End date set; terminal.
    Completed,
}

/// One run of the ingest pipeline over a data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestJob {
    id: IngestJobId,
    data_source_id: i64,
    host_name: String,
    start_date: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
    settings_dir: String,
    modules: Vec<IngestModule>,
}

impl IngestJob {
    /// The store-assigned id.
    #[must_use]
    pub const fn id(&self) -> IngestJobId {
        self.id
    }

    /// Id of the data source the job ran over.
    #[must_use]
    pub const fn data_source_id(&self) -> i64 {
        self.data_source_id
    }

    /// Name of the machine the job ran on.
    #[must_use]
    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    /// When the job started.
    #[must_use]
    pub const fn start_date(&self) -> DateTime<Utc> {
        self.start_date
    }

    /// When the job ended, or `None` while it is running.
    #[must_use]
    pub const fn end_date(&self) -> Option<DateTime<Utc>> {
        self.end_date
    }

    /// Directory holding the job's settings.
    #[must_use]
    pub fn settings_dir(&self) -> &str {
        &self.settings_dir
    }

    /// Modules in pipeline order.
    #[must_use]
    pub fn modules(&self) -> &[IngestModule] {
        &self.modules
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> IngestJobState {
        if self.end_date.is_some() {
            IngestJobState::Completed
        } else {
            IngestJobState::Running
        }
    }
}

impl Record for IngestJob {
    type Id = IngestJobId;

    const KIND: &'static str = "ingest job";
    const TABLE: &'static str = "ingest_jobs";
    const COLUMNS: &'static str =
        "id, data_source_id, host_name, start_date, end_date, settings_dir";

    fn id(&self) -> IngestJobId {
        self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let start_date = date_column(row, "start_date")?
            .ok_or(rusqlite::Error::InvalidColumnType(
                3,
                "start_date".to_string(),
                rusqlite::types::Type::Null,
            ))?;
        Ok(Self {
            id: row.get("id")?,
            data_source_id: row.get("data_source_id")?,
            host_name: row.get("host_name")?,
            start_date,
            end_date: date_column(row, "end_date")?,
            settings_dir: row.get("settings_dir")?,
            modules: Vec::new(),
        })
    }

    fn load_associations(&mut self, conn: &Connection) -> rusqlite::Result<()> {
        let mut stmt = conn.prepare_cached(
            "SELECT m.id, m.display_name, m.unique_name, m.type, m.version \
             FROM ingest_job_modules jm JOIN ingest_modules m ON m.id = jm.module_id \
             WHERE jm.ingest_job_id = ?1 ORDER BY jm.pipeline_position",
        )?;
        let rows = stmt.query_map([self.id], |row| IngestModule::from_row(row))?;
        self.modules = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(())
    }
}

/// Fields for starting an ingest job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIngestJob {
    /// Id of the data source being ingested.
    pub data_source_id: i64,
    /// Name of the machine running the job.
    pub host_name: String,
    /// When the job started.
    pub start_date: DateTime<Utc>,
    /// Directory holding the job's settings.
    pub settings_dir: String,
    /// Modules in pipeline order; registered on demand.
    pub modules: Vec<NewIngestModule>,
}

/// Manager for [`IngestJob`] rows.
pub type IngestJobManager = EntityManager<IngestJob>;

impl EntityManager<IngestJob> {
    /// Records a new running job together with its module list.
    ///
    /// Modules not yet registered are created. The job row and its module
    /// associations are written in one transaction.
    ///
    /// # Errors
    /// - `ValidationError` for an empty host name, an empty or repeated module
    ///   name, or an unrepresentable start date
    /// - `StorageError` if any write fails; nothing is stored in that case
    pub fn begin(&self, job: NewIngestJob) -> CaseResult<IngestJob> {
        if job.host_name.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "host_name" }.into());
        }
        let mut seen = HashSet::with_capacity(job.modules.len());
        for module in &job.modules {
            IngestModule::validate(module)?;
            if !seen.insert(module.unique_name.as_str()) {
                return Err(ValidationError::DuplicateModule {
                    unique_name: module.unique_name.clone(),
                }
                .into());
            }
        }
        let start_date = to_stored_seconds(job.start_date)?;

        let key = format!("data source {}", job.data_source_id);
        self.write("begin", &key, |tx| {
            tx.execute(
                "INSERT INTO ingest_jobs(data_source_id, host_name, start_date, end_date, settings_dir) \
                 VALUES (?1, ?2, ?3, NULL, ?4)",
                params![job.data_source_id, job.host_name, start_date.timestamp(), job.settings_dir],
            )
            .map_err(|e| storage::sqlite_error("begin", IngestJob::KIND, &key, &e))?;
            let id = IngestJobId::new(tx.last_insert_rowid());

            let mut modules = Vec::with_capacity(job.modules.len());
            for (position, draft) in job.modules.iter().enumerate() {
                let module = create_or_fetch::<IngestModule>(tx, draft)?.into_entity();
                let position = i64::try_from(position).unwrap_or(i64::MAX);
                tx.execute(
                    "INSERT INTO ingest_job_modules(ingest_job_id, module_id, pipeline_position) \
                     VALUES (?1, ?2, ?3)",
                    params![id, module.id, position],
                )
                .map_err(|e| storage::sqlite_error("begin", IngestJob::KIND, id, &e))?;
                modules.push(module);
            }

            tracing::info!(
                job = %id,
                data_source = job.data_source_id,
                host = %job.host_name,
                modules = modules.len(),
                "ingest job started"
            );

            Ok(IngestJob {
                id,
                data_source_id: job.data_source_id,
                host_name: job.host_name.clone(),
                start_date,
                end_date: None,
                settings_dir: job.settings_dir.clone(),
                modules,
            })
        })
    }

    /// All jobs run over `data_source_id`, ordered by id.
    ///
    /// # Errors
    /// `StorageError` if the read fails.
    pub fn for_data_source(&self, data_source_id: i64) -> CaseResult<Vec<IngestJob>> {
        self.read("list jobs of", data_source_id, |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, data_source_id, host_name, start_date, end_date, settings_dir \
                 FROM ingest_jobs WHERE data_source_id = ?1 ORDER BY id",
            )?;
            let rows = stmt.query_map([data_source_id], |row| IngestJob::from_row(row))?;
            let mut jobs = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            for job in &mut jobs {
                job.load_associations(conn)?;
            }
            Ok(jobs)
        })
    }

    /// Completes `job` by setting its end date.
    ///
    /// The date is persisted first; `job` is updated only after the write
    /// commits. On any error `job.end_date()` is unchanged.
    ///
    /// # Errors
    /// - `DomainStateError::EndDateAlreadySet` if the job (in memory or in
    ///   storage) has already ended
    /// - `DomainStateError::NotFound` if the job row no longer exists
    /// - `ValidationError` if `end_date` precedes the start date
    /// - `StorageError` if the write fails
    pub fn set_end_date(&self, job: &mut IngestJob, end_date: DateTime<Utc>) -> CaseResult<()> {
        if let Some(existing) = job.end_date {
            return Err(DomainStateError::EndDateAlreadySet {
                job_id: job.id,
                end_date: existing,
            }
            .into());
        }
        let end_date = to_stored_seconds(end_date)?;
        if end_date < job.start_date {
            return Err(ValidationError::EndBeforeStart {
                start: job.start_date,
                end: end_date,
            }
            .into());
        }

        let id = job.id;
        self.write("set end date of", id, |tx| {
            let updated = tx
                .execute(
                    "UPDATE ingest_jobs SET end_date = ?1 WHERE id = ?2 AND end_date IS NULL",
                    params![end_date.timestamp(), id],
                )
                .map_err(|e| storage::sqlite_error("set end date of", IngestJob::KIND, id, &e))?;
            if updated == 1 {
                return Ok(());
            }

            let stored: Option<Option<i64>> = tx
                .query_row("SELECT end_date FROM ingest_jobs WHERE id = ?1", [id], |row| {
                    row.get(0)
                })
                .optional()
                .map_err(|e| storage::sqlite_error("set end date of", IngestJob::KIND, id, &e))?;
            Err(match stored.flatten().and_then(from_seconds) {
                Some(stored_end) => DomainStateError::EndDateAlreadySet {
                    job_id: id,
                    end_date: stored_end,
                },
                None => DomainStateError::NotFound {
                    kind: IngestJob::KIND,
                    key: id.to_string(),
                },
            }
            .into())
        })?;

        job.end_date = Some(end_date);
        tracing::info!(job = %id, end = %end_date, "ingest job completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::Case;
    use crate::error::CaseError;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).unwrap()
    }

    fn new_job(modules: Vec<NewIngestModule>) -> NewIngestJob {
        NewIngestJob {
            data_source_id: 7,
            host_name: "examiner-01".to_string(),
            start_date: at(1_000),
            settings_dir: "/settings/default".to_string(),
            modules,
        }
    }

    #[test]
    fn test_begin_records_running_job_with_modules() {
        let dir = tempdir().unwrap();
        let case = Case::open(dir.path()).unwrap();
        let jobs = case.ingest_jobs();

        let job = jobs
            .begin(new_job(vec![
                NewIngestModule::new("hash_lookup", IngestModuleType::FileLevel, "1.0"),
                NewIngestModule::new("recent_activity", IngestModuleType::DataSourceLevel, "2.1")
                    .with_display_name("Recent Activity"),
            ]))
            .unwrap();

        assert_eq!(job.state(), IngestJobState::Running);
        assert_eq!(job.end_date(), None);
        assert_eq!(job.modules().len(), 2);
        assert_eq!(job.modules()[1].display_name(), "Recent Activity");

        let stored = jobs.get_by_id(job.id()).unwrap().unwrap();
        assert_eq!(stored, job);
    }

    #[test]
    fn test_modules_are_shared_between_jobs() {
        let dir = tempdir().unwrap();
        let case = Case::open(dir.path()).unwrap();
        let jobs = case.ingest_jobs();
        let module = NewIngestModule::new("hash_lookup", IngestModuleType::FileLevel, "1.0");

        let a = jobs.begin(new_job(vec![module.clone()])).unwrap();
        let b = jobs.begin(new_job(vec![module])).unwrap();
        assert_eq!(a.modules()[0].id(), b.modules()[0].id());
        assert_eq!(case.ingest_modules().list().unwrap().len(), 1);
        assert_eq!(jobs.for_data_source(7).unwrap().len(), 2);
        assert!(jobs.for_data_source(8).unwrap().is_empty());
    }

    #[test]
    fn test_set_end_date_once() {
        let dir = tempdir().unwrap();
        let case = Case::open(dir.path()).unwrap();
        let jobs = case.ingest_jobs();
        let mut job = jobs.begin(new_job(Vec::new())).unwrap();

        jobs.set_end_date(&mut job, at(2_000)).unwrap();
        assert_eq!(job.end_date(), Some(at(2_000)));
        assert_eq!(job.state(), IngestJobState::Completed);

        let err = jobs.set_end_date(&mut job, at(3_000)).unwrap_err();
        assert_eq!(
            err,
            CaseError::DomainState(DomainStateError::EndDateAlreadySet {
                job_id: job.id(),
                end_date: at(2_000),
            })
        );
        assert_eq!(job.end_date(), Some(at(2_000)));
        let stored = jobs.get_by_id(job.id()).unwrap().unwrap();
        assert_eq!(stored.end_date(), Some(at(2_000)));
    }

    #[test]
    fn test_stale_copy_cannot_overwrite_stored_end_date() {
        let dir = tempdir().unwrap();
        let case = Case::open(dir.path()).unwrap();
        let jobs = case.ingest_jobs();
        let mut job = jobs.begin(new_job(Vec::new())).unwrap();
        let mut stale = job.clone();

        jobs.set_end_date(&mut job, at(2_000)).unwrap();
        let err = jobs.set_end_date(&mut stale, at(5_000)).unwrap_err();
        assert!(matches!(
            err,
            CaseError::DomainState(DomainStateError::EndDateAlreadySet { .. })
        ));
        assert_eq!(stale.end_date(), None);
        let stored = jobs.get_by_id(job.id()).unwrap().unwrap();
        assert_eq!(stored.end_date(), Some(at(2_000)));
    }

    #[test]
    fn test_failed_persist_leaves_end_date_unset() {
        let dir = tempdir().unwrap();
        let case = Case::open(dir.path()).unwrap();
        let jobs = case.ingest_jobs();
        let mut job = jobs.begin(new_job(Vec::new())).unwrap();

        // Make the UPDATE fail at the storage layer.
        {
            let conn = case.storage().acquire().unwrap();
            conn.execute_batch(
                "CREATE TRIGGER refuse_end BEFORE UPDATE OF end_date ON ingest_jobs \
                 BEGIN SELECT RAISE(ABORT, 'simulated failure'); END;",
            )
            .unwrap();
        }

        let err = jobs.set_end_date(&mut job, at(2_000)).unwrap_err();
        assert!(err.is_storage());
        assert_eq!(job.end_date(), None);
        assert_eq!(job.state(), IngestJobState::Running);
        let stored = jobs.get_by_id(job.id()).unwrap().unwrap();
        assert_eq!(stored.end_date(), None);
    }

    #[test]
    fn test_end_before_start_rejected() {
        let dir = tempdir().unwrap();
        let case = Case::open(dir.path()).unwrap();
        let jobs = case.ingest_jobs();
        let mut job = jobs.begin(new_job(Vec::new())).unwrap();

        let err = jobs.set_end_date(&mut job, at(10)).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(job.end_date(), None);
    }

    #[test]
    fn test_zero_is_a_real_end_date() {
        let dir = tempdir().unwrap();
        let case = Case::open(dir.path()).unwrap();
        let jobs = case.ingest_jobs();
        let mut job = jobs
            .begin(NewIngestJob {
                start_date: at(0),
                ..new_job(Vec::new())
            })
            .unwrap();

        jobs.set_end_date(&mut job, at(0)).unwrap();
        assert_eq!(job.end_date(), Some(at(0)));
        assert!(jobs.set_end_date(&mut job, at(1)).is_err());
    }

    #[test]
    fn test_end_date_for_missing_row() {
        let dir = tempdir().unwrap();
        let case = Case::open(dir.path()).unwrap();
        let jobs = case.ingest_jobs();
        let mut job = jobs.begin(new_job(Vec::new())).unwrap();
        {
            let conn = case.storage().acquire().unwrap();
            conn.execute("DELETE FROM ingest_jobs WHERE id = ?1", [job.id()])
                .unwrap();
        }

        let err = jobs.set_end_date(&mut job, at(2_000)).unwrap_err();
        assert!(matches!(
            err,
            CaseError::DomainState(DomainStateError::NotFound { .. })
        ));
        assert_eq!(job.end_date(), None);
    }

    #[test]
    fn test_begin_rejects_blank_module_name() {
        let dir = tempdir().unwrap();
        let case = Case::open(dir.path()).unwrap();
        let jobs = case.ingest_jobs();

        let err = jobs
            .begin(new_job(vec![NewIngestModule::new(
                " ",
                IngestModuleType::FileLevel,
                "1.0",
            )]))
            .unwrap_err();
        assert!(err.is_validation());
        assert!(jobs.list().unwrap().is_empty());
    }

    #[test]
    fn test_module_in_use_cannot_be_deleted() {
        let dir = tempdir().unwrap();
        let case = Case::open(dir.path()).unwrap();
        case.ingest_jobs()
            .begin(new_job(vec![NewIngestModule::new(
                "exif",
                IngestModuleType::FileLevel,
                "1.0",
            )]))
            .unwrap();

        let err = case.ingest_modules().delete("exif").unwrap_err();
        assert!(matches!(
            err,
            CaseError::DomainState(DomainStateError::InUse { .. })
        ));
        assert!(case.ingest_modules().get("exif").unwrap().is_some());
    }

    #[test]
    fn test_module_unique_name_is_case_sensitive() {
        let dir = tempdir().unwrap();
        let case = Case::open(dir.path()).unwrap();
        let modules = case.ingest_modules();

        let a = modules
            .create_or_get(NewIngestModule::new("Exif", IngestModuleType::FileLevel, "1"))
            .unwrap();
        let b = modules
            .create_or_get(NewIngestModule::new("exif", IngestModuleType::FileLevel, "1"))
            .unwrap();
        assert_ne!(a.id(), b.id());
        assert!(modules.get("EXIF").unwrap().is_none());
    }

    #[test]
    fn test_begin_rejects_repeated_module() {
        let dir = tempdir().unwrap();
        let case = Case::open(dir.path()).unwrap();
        let jobs = case.ingest_jobs();
        let module = NewIngestModule::new("hash_lookup", IngestModuleType::FileLevel, "1.0");

        let err = jobs
            .begin(new_job(vec![module.clone(), module]))
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(
            err,
            CaseError::Validation(ValidationError::DuplicateModule {
                unique_name: "hash_lookup".to_string(),
            })
        );
        assert!(jobs.list().unwrap().is_empty());
        assert!(case.ingest_modules().list().unwrap().is_empty());
    }

    #[test]
    fn test_out_of_range_date_reports_its_column() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn
            .query_row(
                "SELECT 1 AS start_date, ?1 AS end_date",
                [i64::MAX],
                |row| date_column(row, "end_date"),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            rusqlite::Error::IntegralValueOutOfRange(1, i64::MAX)
        ));
    }
}
