//! Domain models for the medical records store.

mod assignment;
mod document;
mod patient;
mod record;
mod state;

pub use assignment::*;
pub use document::*;
pub use patient::*;
pub use record::*;
pub use state::*;

/// Generate a fresh entity id of the form `<prefix>-<uuid>`.
pub(crate) fn generate_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4())
}
