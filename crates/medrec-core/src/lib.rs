//! Medrec Core Library
//!
//! Storage layer for a small medical records service: patients, their
//! records, medication assignments made by doctors, and metadata for
//! uploaded documents.
//!
//! # Architecture
//!
//! ```text
//!             route handlers / CLI
//!                      │
//!               ┌──────▼──────┐
//!               │    Store    │  ids, defaults, normalization
//!               └──────┬──────┘
//!                      │ StorageBackend (chosen once)
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//!    DocumentStore           RelationalStore
//!   (one JSON file)      (SQLite tables, pooled)
//! ```
//!
//! Both backends return identical shapes: conditions are always a list,
//! dates are `YYYY-MM-DD` and timestamps `YYYY-MM-DD HH:MM:SS`.
//!
//! # Modules
//!
//! - [`store`]: the facade, the backend trait and both backends
//! - [`models`]: domain types (Patient, Record, Assignment, DocumentMeta)
//! - [`config`]: environment-driven backend selection
//! - [`dates`]: canonical date formatting

pub mod config;
pub mod dates;
pub mod models;
pub mod store;

// Re-export commonly used types
pub use config::{BackendKind, StoreConfig};
pub use models::{
    Assignment, Conditions, DocumentMeta, NewAssignment, NewDocument, NewPatient, NewRecord,
    Patient, Record, RecordWithAssignments, RecordWithPatient, StoreState,
};
pub use store::{DocumentStore, RelationalStore, StorageBackend, Store, StoreError, StoreResult};
