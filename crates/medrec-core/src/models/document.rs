//! Uploaded document metadata.

use serde::{Deserialize, Serialize};

use crate::dates;

/// Metadata for a file a patient uploaded. The bytes live elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMeta {
    pub id: String,
    pub patient_id: String,
    /// Name the file is stored under
    pub filename: String,
    /// Name the file was uploaded with
    pub original_name: String,
    pub mimetype: String,
    /// Size in bytes
    pub size: u64,
    pub uploaded_at: String,
}

impl DocumentMeta {
    pub fn new(new: NewDocument) -> Self {
        Self {
            id: super::generate_id("doc"),
            patient_id: new.patient_id,
            filename: new.filename,
            original_name: new.original_name,
            mimetype: new.mimetype,
            size: new.size,
            uploaded_at: dates::now_timestamp(),
        }
    }

    pub(crate) fn canonicalized(mut self) -> Self {
        self.uploaded_at = dates::normalize_timestamp(&self.uploaded_at);
        self
    }
}

/// Input for recording an upload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewDocument {
    pub patient_id: String,
    pub filename: String,
    pub original_name: String,
    pub mimetype: String,
    pub size: u64,
}
