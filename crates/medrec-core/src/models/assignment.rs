//! Medication assignment models.

use serde::{Deserialize, Serialize};

use crate::dates;

/// A medication a doctor assigned against a record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    /// Opaque id, `asg-` prefixed
    pub id: String,
    pub record_id: String,
    /// Free-text doctor name
    pub doctor: String,
    pub medication: String,
    #[serde(default)]
    pub notes: String,
    /// Creation time (`YYYY-MM-DD HH:MM:SS`, UTC)
    pub assigned_at: String,
}

impl Assignment {
    /// Create an assignment stamped with the current time.
    pub fn new(record_id: String, doctor: String, medication: String, notes: Option<String>) -> Self {
        Self {
            id: super::generate_id("asg"),
            record_id,
            doctor,
            medication,
            notes: notes.unwrap_or_default(),
            assigned_at: dates::now_timestamp(),
        }
    }

    pub(crate) fn canonicalized(mut self) -> Self {
        self.assigned_at = dates::normalize_timestamp(&self.assigned_at);
        self
    }
}

/// Input for creating an assignment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewAssignment {
    pub record_id: String,
    pub doctor: String,
    pub medication: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewAssignment {
    pub fn new(
        record_id: impl Into<String>,
        doctor: impl Into<String>,
        medication: impl Into<String>,
    ) -> Self {
        Self {
            record_id: record_id.into(),
            doctor: doctor.into(),
            medication: medication.into(),
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}
