//! Patient models.

use serde::{Deserialize, Serialize};

use crate::dates;

/// A patient known to the system.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Patient {
    /// Opaque id, `pat-` prefixed
    pub id: String,
    /// Full name, used together with `dob` for login lookup
    pub name: String,
    /// Date of birth (`YYYY-MM-DD`)
    pub dob: String,
}

impl Patient {
    /// Create a patient with a freshly generated id.
    pub fn new(name: String, dob: String) -> Self {
        Self {
            id: super::generate_id("pat"),
            name,
            dob: dates::normalize_date(&dob),
        }
    }

    /// Return the patient with its date of birth in canonical form.
    pub(crate) fn canonicalized(mut self) -> Self {
        self.dob = dates::normalize_date(&self.dob);
        self
    }
}

/// Input for creating a patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewPatient {
    pub name: String,
    pub dob: String,
}

impl NewPatient {
    pub fn new(name: impl Into<String>, dob: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dob: dob.into(),
        }
    }
}
