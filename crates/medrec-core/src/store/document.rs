//! JSON document backend.
//!
//! The whole state lives in one file. Reads parse the full document; every
//! add is read-modify-append-write under an in-process writer lock. Two
//! processes sharing one file can still overwrite each other's additions.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info, warn};

use super::{StorageBackend, StoreResult};
use crate::config::BackendKind;
use crate::models::{
    Assignment, DocumentMeta, Patient, Record, RecordWithAssignments, RecordWithPatient,
    StoreState,
};

/// Backend persisting everything as a single JSON document.
pub struct DocumentStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl DocumentStore {
    /// Create a store for the document at `path`. The file is created lazily.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the empty skeleton if no document exists yet.
    ///
    /// Callers must hold the writer lock.
    fn ensure_initialized(&self) -> StoreResult<()> {
        if self.path.exists() {
            return Ok(());
        }
        info!(path = ?self.path, "Creating empty store document");
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        self.persist(&StoreState::default())
    }

    /// Parse the document as it currently is on disk.
    fn read_document(&self) -> StoreResult<StoreState> {
        let raw = fs::read_to_string(&self.path)?;
        let state: StoreState = serde_json::from_str(&raw)?;
        Ok(state.canonicalized())
    }

    /// Load the full document, creating it first if needed.
    fn load(&self) -> StoreResult<StoreState> {
        if !self.path.exists() {
            let _guard = self.write_lock.lock()?;
            self.ensure_initialized()?;
        }
        self.read_document()
    }

    /// Overwrite the document via a sibling temp file and rename.
    fn persist(&self, state: &StoreState) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(state)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Read-modify-write under the writer lock.
    fn update<F>(&self, apply: F) -> StoreResult<()>
    where
        F: FnOnce(&mut StoreState),
    {
        let _guard = self.write_lock.lock()?;
        self.ensure_initialized()?;
        let mut state = self.read_document()?;
        apply(&mut state);
        self.persist(&state)
    }
}

impl StorageBackend for DocumentStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Document
    }

    fn read_state(&self) -> StoreResult<StoreState> {
        self.load()
    }

    fn write_state(&self, state: &StoreState) -> StoreResult<()> {
        let _guard = self.write_lock.lock()?;
        self.ensure_initialized()?;
        self.persist(state)
    }

    fn insert_patient(&self, patient: &Patient) -> StoreResult<()> {
        self.update(|state| state.patients.push(patient.clone()))
    }

    fn insert_record(&self, record: &Record) -> StoreResult<()> {
        self.update(|state| state.records.push(record.clone()))
    }

    fn insert_assignment(&self, assignment: &Assignment) -> StoreResult<()> {
        self.update(|state| state.assignments.push(assignment.clone()))
    }

    fn insert_document(&self, document: &DocumentMeta) -> StoreResult<()> {
        self.update(|state| state.documents.push(document.clone()))
    }

    fn patient_by_id(&self, id: &str) -> StoreResult<Option<Patient>> {
        let state = self.load()?;
        Ok(state.patients.into_iter().find(|p| p.id == id))
    }

    fn patient_by_name_dob(&self, name: &str, dob: &str) -> StoreResult<Option<Patient>> {
        let state = self.load()?;
        let mut matches = state
            .patients
            .into_iter()
            .filter(|p| p.name == name && p.dob == dob);
        let first = matches.next();
        if let Some(patient) = &first {
            if matches.next().is_some() {
                warn!(id = %patient.id, "Several patients share name and dob; using the first");
            }
        }
        Ok(first)
    }

    fn record_by_id(&self, id: &str) -> StoreResult<Option<Record>> {
        let state = self.load()?;
        Ok(state.records.into_iter().find(|r| r.id == id))
    }

    fn records_by_patient(&self, patient_id: &str) -> StoreResult<Vec<Record>> {
        let state = self.load()?;
        Ok(state
            .records
            .into_iter()
            .filter(|r| r.patient_id == patient_id)
            .collect())
    }

    fn list_records(&self) -> StoreResult<Vec<Record>> {
        Ok(self.load()?.records)
    }

    fn list_records_with_patients(&self) -> StoreResult<Vec<RecordWithPatient>> {
        let state = self.load()?;
        let patients = index_patients(&state.patients);
        Ok(state
            .records
            .into_iter()
            .map(|record| RecordWithPatient {
                patient: patients.get(record.patient_id.as_str()).cloned(),
                record,
            })
            .collect())
    }

    fn assignments_for_record(&self, record_id: &str) -> StoreResult<Vec<Assignment>> {
        let state = self.load()?;
        Ok(state
            .assignments
            .into_iter()
            .filter(|a| a.record_id == record_id)
            .collect())
    }

    fn records_with_assignments(&self) -> StoreResult<Vec<RecordWithAssignments>> {
        let state = self.load()?;
        let patients = index_patients(&state.patients);

        let mut by_record: HashMap<String, Vec<Assignment>> = HashMap::new();
        for assignment in state.assignments {
            by_record
                .entry(assignment.record_id.clone())
                .or_default()
                .push(assignment);
        }

        let views: Vec<_> = state
            .records
            .into_iter()
            .map(|record| RecordWithAssignments {
                patient: patients.get(record.patient_id.as_str()).cloned(),
                assignments: by_record.get(&record.id).cloned().unwrap_or_default(),
                record,
            })
            .collect();
        debug!(count = views.len(), "Assembled doctor view");
        Ok(views)
    }

    fn documents_for_patient(&self, patient_id: &str) -> StoreResult<Vec<DocumentMeta>> {
        let state = self.load()?;
        Ok(state
            .documents
            .into_iter()
            .filter(|d| d.patient_id == patient_id)
            .collect())
    }
}

/// Map patient id to patient. On duplicate ids the first occurrence wins.
fn index_patients(patients: &[Patient]) -> HashMap<&str, Patient> {
    let mut index = HashMap::with_capacity(patients.len());
    for patient in patients {
        index
            .entry(patient.id.as_str())
            .or_insert_with(|| patient.clone());
    }
    index
}
