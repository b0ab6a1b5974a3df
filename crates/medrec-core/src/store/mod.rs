//! Storage facade.
//!
//! [`Store`] is the only way to reach persisted state. It owns one
//! [`StorageBackend`], chosen once at construction, and applies the
//! creation rules (id generation, defaults, condition normalization) before
//! handing entities to it. Reads come back already in canonical shape, so
//! callers cannot tell which backend is active.

mod document;
mod relational;
mod schema;

pub use document::DocumentStore;
pub use relational::RelationalStore;
pub use schema::SCHEMA;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::{BackendKind, StoreConfig};
use crate::models::{
    Assignment, DocumentMeta, NewAssignment, NewDocument, NewPatient, NewRecord, Patient, Record,
    RecordWithAssignments, RecordWithPatient, StoreState,
};

/// Storage errors.
///
/// A lookup that finds nothing is not an error; it comes back as `None` or
/// an empty list.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        StoreError::LockPoisoned(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence capability shared by both backends.
///
/// Implementations receive fully formed entities and must return them in
/// canonical form (dates normalized, conditions as a sequence).
pub trait StorageBackend: Send + Sync {
    /// Which backend this is.
    fn kind(&self) -> BackendKind;

    /// Snapshot of the whole state.
    fn read_state(&self) -> StoreResult<StoreState>;

    /// Replace the whole state.
    fn write_state(&self, state: &StoreState) -> StoreResult<()>;

    fn insert_patient(&self, patient: &Patient) -> StoreResult<()>;
    fn insert_record(&self, record: &Record) -> StoreResult<()>;
    fn insert_assignment(&self, assignment: &Assignment) -> StoreResult<()>;
    fn insert_document(&self, document: &DocumentMeta) -> StoreResult<()>;

    fn patient_by_id(&self, id: &str) -> StoreResult<Option<Patient>>;

    /// First patient, in insertion order, matching both name and dob.
    fn patient_by_name_dob(&self, name: &str, dob: &str) -> StoreResult<Option<Patient>>;

    fn record_by_id(&self, id: &str) -> StoreResult<Option<Record>>;
    fn records_by_patient(&self, patient_id: &str) -> StoreResult<Vec<Record>>;
    fn list_records(&self) -> StoreResult<Vec<Record>>;
    fn list_records_with_patients(&self) -> StoreResult<Vec<RecordWithPatient>>;
    fn assignments_for_record(&self, record_id: &str) -> StoreResult<Vec<Assignment>>;
    fn records_with_assignments(&self) -> StoreResult<Vec<RecordWithAssignments>>;
    fn documents_for_patient(&self, patient_id: &str) -> StoreResult<Vec<DocumentMeta>>;
}

/// Uniform storage interface for route handlers.
pub struct Store {
    backend: Box<dyn StorageBackend>,
}

impl Store {
    /// Open the backend named by the configuration.
    ///
    /// Nothing touches disk here: the JSON document is created on first
    /// read and the connection pool on first query.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        config
            .validate()
            .map_err(|errors| StoreError::Config(errors.join("; ")))?;

        let backend: Box<dyn StorageBackend> = match config.backend {
            BackendKind::Document => Box::new(DocumentStore::new(&config.data_file)),
            BackendKind::Relational => Box::new(RelationalStore::new(config)),
        };
        info!(backend = %config.backend, "Storage backend selected");
        Ok(Self::with_backend(backend))
    }

    /// Wrap an already constructed backend.
    pub fn with_backend(backend: Box<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Which backend is serving this store.
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    // =========================================================================
    // Whole-state access
    // =========================================================================

    /// Snapshot of every entity.
    pub fn read_state(&self) -> StoreResult<StoreState> {
        self.backend.read_state()
    }

    /// Overwrite the whole state. Only the document backend supports this.
    pub fn write_state(&self, state: &StoreState) -> StoreResult<()> {
        self.backend.write_state(state)
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Persist a new patient and return it.
    pub fn add_patient(&self, new: NewPatient) -> StoreResult<Patient> {
        let patient = Patient::new(new.name, new.dob);
        debug!(id = %patient.id, "Adding patient");
        self.backend.insert_patient(&patient)?;
        Ok(patient)
    }

    /// Persist a new record.
    ///
    /// `conditions` is stored as a sequence even when a single string was
    /// given, and `last_visit` defaults to today's date.
    pub fn add_record(&self, new: NewRecord) -> StoreResult<Record> {
        let record = Record::new(new.patient_id, new.conditions, new.last_visit);
        debug!(id = %record.id, patient_id = %record.patient_id, "Adding record");
        self.backend.insert_record(&record)?;
        Ok(record)
    }

    /// Persist a new medication assignment; `notes` defaults to empty.
    pub fn add_assignment(&self, new: NewAssignment) -> StoreResult<Assignment> {
        let assignment = Assignment::new(new.record_id, new.doctor, new.medication, new.notes);
        debug!(id = %assignment.id, record_id = %assignment.record_id, "Adding assignment");
        self.backend.insert_assignment(&assignment)?;
        Ok(assignment)
    }

    /// Persist metadata for an uploaded document.
    pub fn add_document(&self, new: NewDocument) -> StoreResult<DocumentMeta> {
        let document = DocumentMeta::new(new);
        debug!(id = %document.id, patient_id = %document.patient_id, "Adding document");
        self.backend.insert_document(&document)?;
        Ok(document)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub fn get_patient_by_id(&self, id: &str) -> StoreResult<Option<Patient>> {
        self.backend.patient_by_id(id)
    }

    /// Login lookup. `(name, dob)` is not unique; the earliest match wins.
    pub fn get_patient_by_name_dob(&self, name: &str, dob: &str) -> StoreResult<Option<Patient>> {
        self.backend
            .patient_by_name_dob(name, &crate::dates::normalize_date(dob))
    }

    pub fn get_record_by_id(&self, id: &str) -> StoreResult<Option<Record>> {
        self.backend.record_by_id(id)
    }

    pub fn get_records_by_patient(&self, patient_id: &str) -> StoreResult<Vec<Record>> {
        self.backend.records_by_patient(patient_id)
    }

    pub fn get_assignments_for_record(&self, record_id: &str) -> StoreResult<Vec<Assignment>> {
        self.backend.assignments_for_record(record_id)
    }

    pub fn get_documents_for_patient(&self, patient_id: &str) -> StoreResult<Vec<DocumentMeta>> {
        self.backend.documents_for_patient(patient_id)
    }

    // =========================================================================
    // Composite reads
    // =========================================================================

    /// Every record, in the backend's natural order.
    pub fn list_records(&self) -> StoreResult<Vec<Record>> {
        self.backend.list_records()
    }

    /// Every record with its patient embedded.
    pub fn list_records_with_patients(&self) -> StoreResult<Vec<RecordWithPatient>> {
        self.backend.list_records_with_patients()
    }

    /// Doctor view: every record with its patient and assignments.
    pub fn get_all_records_with_assignments(&self) -> StoreResult<Vec<RecordWithAssignments>> {
        self.backend.records_with_assignments()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("backend", &self.backend.kind())
            .finish()
    }
}
