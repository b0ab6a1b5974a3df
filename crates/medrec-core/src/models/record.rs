//! Medical record models.

use serde::{Deserialize, Deserializer, Serialize};

use crate::dates;

/// Conditions as supplied by a caller: one free-text string or a list.
///
/// Always materialized to a sequence before it is stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Conditions {
    Many(Vec<String>),
    One(String),
}

impl Conditions {
    /// Materialize as a sequence. A single string becomes a one-element list.
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Conditions::Many(conditions) => conditions,
            Conditions::One(condition) => vec![condition],
        }
    }
}

impl From<Vec<String>> for Conditions {
    fn from(conditions: Vec<String>) -> Self {
        Conditions::Many(conditions)
    }
}

impl From<String> for Conditions {
    fn from(condition: String) -> Self {
        Conditions::One(condition)
    }
}

impl From<&str> for Conditions {
    fn from(condition: &str) -> Self {
        Conditions::One(condition.to_string())
    }
}

/// A stored medical record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Opaque id, `rec-` prefixed
    pub id: String,
    /// Owning patient (not enforced by storage)
    pub patient_id: String,
    /// Diagnosed conditions, in the order given
    #[serde(default, deserialize_with = "deserialize_conditions")]
    pub conditions: Vec<String>,
    /// Date of last visit (`YYYY-MM-DD`)
    pub last_visit: String,
}

impl Record {
    /// Create a record, defaulting `last_visit` to today.
    pub fn new(patient_id: String, conditions: Conditions, last_visit: Option<String>) -> Self {
        let last_visit = last_visit
            .map(|date| dates::normalize_date(&date))
            .unwrap_or_else(dates::today);
        Self {
            id: super::generate_id("rec"),
            patient_id,
            conditions: conditions.into_vec(),
            last_visit,
        }
    }

    pub(crate) fn canonicalized(mut self) -> Self {
        self.last_visit = dates::normalize_date(&self.last_visit);
        self
    }
}

/// Input for creating a record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewRecord {
    pub patient_id: String,
    pub conditions: Conditions,
    #[serde(default)]
    pub last_visit: Option<String>,
}

impl NewRecord {
    pub fn new(patient_id: impl Into<String>, conditions: impl Into<Conditions>) -> Self {
        Self {
            patient_id: patient_id.into(),
            conditions: conditions.into(),
            last_visit: None,
        }
    }

    pub fn with_last_visit(mut self, last_visit: impl Into<String>) -> Self {
        self.last_visit = Some(last_visit.into());
        self
    }
}

/// Accept a list, a bare string or null for stored conditions.
fn deserialize_conditions<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Conditions>::deserialize(deserializer)?
        .map(Conditions::into_vec)
        .unwrap_or_default())
}
