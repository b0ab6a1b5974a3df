//! Whole-state snapshot and composite read shapes.

use serde::{Deserialize, Serialize};

use super::{Assignment, DocumentMeta, Patient, Record};

/// The complete persisted state, as held by the JSON document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreState {
    #[serde(default)]
    pub patients: Vec<Patient>,
    #[serde(default)]
    pub records: Vec<Record>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
    /// Absent from documents written before uploads were tracked
    #[serde(default)]
    pub documents: Vec<DocumentMeta>,
}

impl StoreState {
    /// Apply canonical date formatting to every entity.
    pub(crate) fn canonicalized(self) -> Self {
        Self {
            patients: self.patients.into_iter().map(Patient::canonicalized).collect(),
            records: self.records.into_iter().map(Record::canonicalized).collect(),
            assignments: self
                .assignments
                .into_iter()
                .map(Assignment::canonicalized)
                .collect(),
            documents: self
                .documents
                .into_iter()
                .map(DocumentMeta::canonicalized)
                .collect(),
        }
    }
}

/// A record with its patient resolved (`None` when the patient is missing).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordWithPatient {
    #[serde(flatten)]
    pub record: Record,
    pub patient: Option<Patient>,
}

/// The doctor-facing view: a record, its patient and its assignments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordWithAssignments {
    #[serde(flatten)]
    pub record: Record,
    pub patient: Option<Patient>,
    pub assignments: Vec<Assignment>,
}
