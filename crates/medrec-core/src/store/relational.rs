//! SQLite backend.
//!
//! One table per entity. The connection pool is built on first use and kept
//! for the life of the store. Statements run individually, without
//! transactions, so a composite read racing a write may see part of it.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use once_cell::sync::OnceCell;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Row};
use tracing::{debug, info, warn};

use super::{StorageBackend, StoreError, StoreResult, SCHEMA};
use crate::config::{BackendKind, StoreConfig};
use crate::dates;
use crate::models::{
    Assignment, Conditions, DocumentMeta, Patient, Record, RecordWithAssignments,
    RecordWithPatient, StoreState,
};

const PATIENT_COLUMNS: &str = "id, name, dob";
const RECORD_COLUMNS: &str = "id, patient_id, conditions, last_visit";
const ASSIGNMENT_COLUMNS: &str = "id, record_id, doctor, medication, notes, assigned_at";
const DOCUMENT_COLUMNS: &str =
    "id, patient_id, filename, original_name, mimetype, size, uploaded_at";

#[derive(Debug, Clone)]
enum Target {
    File(PathBuf),
    Memory,
}

/// Backend persisting entities as rows in SQLite.
pub struct RelationalStore {
    target: Target,
    max_connections: u32,
    busy_timeout: Duration,
    pool: OnceCell<Pool<SqliteConnectionManager>>,
}

impl RelationalStore {
    /// Store backed by the database file named in `config`.
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            target: Target::File(config.database.clone()),
            max_connections: config.pool_size,
            busy_timeout: Duration::from_millis(config.busy_timeout_ms),
            pool: OnceCell::new(),
        }
    }

    /// Private in-memory database (for testing).
    ///
    /// Each SQLite memory connection is its own database, so the pool is
    /// capped at a single connection.
    pub fn in_memory() -> Self {
        Self {
            target: Target::Memory,
            max_connections: 1,
            busy_timeout: Duration::from_millis(5000),
            pool: OnceCell::new(),
        }
    }

    /// Get the pool, creating it and the schema on first call.
    fn pool(&self) -> StoreResult<&Pool<SqliteConnectionManager>> {
        self.pool.get_or_try_init(|| self.create_pool())
    }

    fn create_pool(&self) -> StoreResult<Pool<SqliteConnectionManager>> {
        let manager = match &self.target {
            Target::File(path) => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        fs::create_dir_all(parent)?;
                    }
                }
                SqliteConnectionManager::file(path)
            }
            Target::Memory => SqliteConnectionManager::memory(),
        };
        let busy_timeout = self.busy_timeout;
        let manager = manager.with_init(move |conn| conn.busy_timeout(busy_timeout));

        let mut builder = Pool::builder().max_size(self.max_connections);
        if let Target::Memory = self.target {
            // Each in-memory connection is its own database; it must never be reaped.
            builder = builder.idle_timeout(None).max_lifetime(None);
        }
        let pool = builder.build(manager)?;
        pool.get()?.execute_batch(SCHEMA)?;

        info!(database = ?self.target, max_connections = self.max_connections, "SQLite pool ready");
        Ok(pool)
    }

    /// Get a connection from the pool.
    fn conn(&self) -> StoreResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool()?.get()?)
    }

    fn query_patients(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> StoreResult<Vec<Patient>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(args, |row| patient_from_row(row, 0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn query_records(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> StoreResult<Vec<Record>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(args, |row| RecordRow::from_row(row, 0))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.try_into()?);
        }
        Ok(records)
    }

    fn query_assignments(
        &self,
        sql: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> StoreResult<Vec<Assignment>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(args, assignment_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn query_documents(
        &self,
        sql: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> StoreResult<Vec<DocumentMeta>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(args, document_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Records left-joined to their patients, in insertion order.
    fn joined_records(&self) -> StoreResult<Vec<RecordWithPatient>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT r.id, r.patient_id, r.conditions, r.last_visit,
                   p.id, p.name, p.dob
            FROM records r
            LEFT JOIN patients p ON p.id = r.patient_id
            ORDER BY r.rowid
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            let record = RecordRow::from_row(row, 0)?;
            let patient_id: Option<String> = row.get(4)?;
            let patient = match patient_id {
                Some(_) => Some(patient_from_row(row, 4)?),
                None => None,
            };
            Ok((record, patient))
        })?;

        let mut joined = Vec::new();
        for row in rows {
            let (record, patient) = row?;
            joined.push(RecordWithPatient {
                record: record.try_into()?,
                patient,
            });
        }
        Ok(joined)
    }
}

impl StorageBackend for RelationalStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Relational
    }

    fn read_state(&self) -> StoreResult<StoreState> {
        Ok(StoreState {
            patients: self.query_patients(
                &format!("SELECT {} FROM patients ORDER BY rowid", PATIENT_COLUMNS),
                &[],
            )?,
            records: self.list_records()?,
            assignments: self.query_assignments(
                &format!("SELECT {} FROM assignments ORDER BY rowid", ASSIGNMENT_COLUMNS),
                &[],
            )?,
            documents: self.query_documents(
                &format!("SELECT {} FROM documents ORDER BY rowid", DOCUMENT_COLUMNS),
                &[],
            )?,
        })
    }

    fn write_state(&self, _state: &StoreState) -> StoreResult<()> {
        Err(StoreError::Unsupported(
            "whole-state write is only available on the document backend; use the add operations"
                .to_string(),
        ))
    }

    fn insert_patient(&self, patient: &Patient) -> StoreResult<()> {
        self.conn()?.execute(
            "INSERT INTO patients (id, name, dob) VALUES (?1, ?2, ?3)",
            params![patient.id, patient.name, patient.dob],
        )?;
        Ok(())
    }

    fn insert_record(&self, record: &Record) -> StoreResult<()> {
        let conditions_json = serde_json::to_string(&record.conditions)?;
        self.conn()?.execute(
            "INSERT INTO records (id, patient_id, conditions, last_visit) VALUES (?1, ?2, ?3, ?4)",
            params![record.id, record.patient_id, conditions_json, record.last_visit],
        )?;
        Ok(())
    }

    fn insert_assignment(&self, assignment: &Assignment) -> StoreResult<()> {
        self.conn()?.execute(
            r#"
            INSERT INTO assignments (
                id, record_id, doctor, medication, notes, assigned_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                assignment.id,
                assignment.record_id,
                assignment.doctor,
                assignment.medication,
                assignment.notes,
                assignment.assigned_at,
            ],
        )?;
        Ok(())
    }

    fn insert_document(&self, document: &DocumentMeta) -> StoreResult<()> {
        let size = i64::try_from(document.size)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
        self.conn()?.execute(
            r#"
            INSERT INTO documents (
                id, patient_id, filename, original_name, mimetype, size, uploaded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                document.id,
                document.patient_id,
                document.filename,
                document.original_name,
                document.mimetype,
                size,
                document.uploaded_at,
            ],
        )?;
        Ok(())
    }

    fn patient_by_id(&self, id: &str) -> StoreResult<Option<Patient>> {
        self.conn()?
            .query_row(
                &format!("SELECT {} FROM patients WHERE id = ?1", PATIENT_COLUMNS),
                [id],
                |row| patient_from_row(row, 0),
            )
            .optional()
            .map_err(Into::into)
    }

    fn patient_by_name_dob(&self, name: &str, dob: &str) -> StoreResult<Option<Patient>> {
        let mut matches = self.query_patients(
            &format!(
                "SELECT {} FROM patients WHERE name = ?1 AND dob = ?2 ORDER BY rowid LIMIT 2",
                PATIENT_COLUMNS
            ),
            &[&name, &dob],
        )?;
        if matches.len() > 1 {
            warn!(id = %matches[0].id, "Several patients share name and dob; using the first");
        }
        matches.truncate(1);
        Ok(matches.pop())
    }

    fn record_by_id(&self, id: &str) -> StoreResult<Option<Record>> {
        let row = self
            .conn()?
            .query_row(
                &format!("SELECT {} FROM records WHERE id = ?1", RECORD_COLUMNS),
                [id],
                |row| RecordRow::from_row(row, 0),
            )
            .optional()?;
        row.map(Record::try_from).transpose()
    }

    fn records_by_patient(&self, patient_id: &str) -> StoreResult<Vec<Record>> {
        self.query_records(
            &format!(
                "SELECT {} FROM records WHERE patient_id = ?1 ORDER BY rowid",
                RECORD_COLUMNS
            ),
            &[&patient_id],
        )
    }

    fn list_records(&self) -> StoreResult<Vec<Record>> {
        self.query_records(
            &format!("SELECT {} FROM records ORDER BY rowid", RECORD_COLUMNS),
            &[],
        )
    }

    fn list_records_with_patients(&self) -> StoreResult<Vec<RecordWithPatient>> {
        self.joined_records()
    }

    fn assignments_for_record(&self, record_id: &str) -> StoreResult<Vec<Assignment>> {
        self.query_assignments(
            &format!(
                "SELECT {} FROM assignments WHERE record_id = ?1 ORDER BY rowid",
                ASSIGNMENT_COLUMNS
            ),
            &[&record_id],
        )
    }

    fn records_with_assignments(&self) -> StoreResult<Vec<RecordWithAssignments>> {
        let joined = self.joined_records()?;

        // Grouped separately so assignment counts never duplicate record rows
        let mut by_record: HashMap<String, Vec<Assignment>> = HashMap::new();
        for assignment in self.query_assignments(
            &format!("SELECT {} FROM assignments ORDER BY rowid", ASSIGNMENT_COLUMNS),
            &[],
        )? {
            by_record
                .entry(assignment.record_id.clone())
                .or_default()
                .push(assignment);
        }

        let views: Vec<_> = joined
            .into_iter()
            .map(|entry| RecordWithAssignments {
                assignments: by_record.remove(&entry.record.id).unwrap_or_default(),
                record: entry.record,
                patient: entry.patient,
            })
            .collect();
        debug!(count = views.len(), "Assembled doctor view");
        Ok(views)
    }

    fn documents_for_patient(&self, patient_id: &str) -> StoreResult<Vec<DocumentMeta>> {
        self.query_documents(
            &format!(
                "SELECT {} FROM documents WHERE patient_id = ?1 ORDER BY rowid",
                DOCUMENT_COLUMNS
            ),
            &[&patient_id],
        )
    }
}

impl std::fmt::Debug for RelationalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationalStore")
            .field("target", &self.target)
            .field("max_connections", &self.max_connections)
            .field("connected", &self.pool.get().is_some())
            .finish()
    }
}

/// Read `id, name, dob` starting at column `offset`.
fn patient_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Patient> {
    let dob: String = row.get(offset + 2)?;
    Ok(Patient {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        dob: dates::normalize_date(&dob),
    })
}

fn assignment_from_row(row: &Row<'_>) -> rusqlite::Result<Assignment> {
    let assigned_at: String = row.get(5)?;
    Ok(Assignment {
        id: row.get(0)?,
        record_id: row.get(1)?,
        doctor: row.get(2)?,
        medication: row.get(3)?,
        notes: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        assigned_at: dates::normalize_timestamp(&assigned_at),
    })
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<DocumentMeta> {
    let size: i64 = row.get(5)?;
    let uploaded_at: String = row.get(6)?;
    Ok(DocumentMeta {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        filename: row.get(2)?,
        original_name: row.get(3)?,
        mimetype: row.get(4)?,
        size: u64::try_from(size).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Integer, Box::new(e))
        })?,
        uploaded_at: dates::normalize_timestamp(&uploaded_at),
    })
}

/// Intermediate row struct; `conditions` still holds JSON text.
struct RecordRow {
    id: String,
    patient_id: String,
    conditions: Option<String>,
    last_visit: Option<String>,
}

impl RecordRow {
    /// Read `id, patient_id, conditions, last_visit` starting at `offset`.
    fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(offset)?,
            patient_id: row.get(offset + 1)?,
            conditions: row.get(offset + 2)?,
            last_visit: row.get(offset + 3)?,
        })
    }
}

impl TryFrom<RecordRow> for Record {
    type Error = StoreError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        let conditions = match row.conditions.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => serde_json::from_str::<Option<Conditions>>(text)?
                .map(Conditions::into_vec)
                .unwrap_or_default(),
            _ => Vec::new(),
        };

        Ok(Record {
            id: row.id,
            patient_id: row.patient_id,
            conditions,
            last_visit: row
                .last_visit
                .map(|date| dates::normalize_date(&date))
                .unwrap_or_default(),
        })
    }
}
