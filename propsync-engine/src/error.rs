//! Error types for propsync-engine.

use std::path::PathBuf;

use thiserror::Error;

use propsync_core::error::DocumentError;
use propsync_core::types::{ResourceKind, ResourceName};

use crate::inspect::InspectError;

/// All errors that can arise while reconciling or migrating one resource.
///
/// Every variant is isolated to a single resource: the runner records it in
/// the per-resource failure list and carries on with the rest of the run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An error from the document store (I/O, parse, unsupported version).
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// The external column inspector failed for this resource.
    #[error("column inspection failed: {0}")]
    Inspect(#[from] InspectError),

    /// An existing document's resource name disagrees with the resource the
    /// path belongs to. The document is left untouched; this usually means a
    /// misplaced file.
    #[error("document at {path} describes '{found}', expected '{expected}'")]
    NameMismatch {
        path: PathBuf,
        expected: ResourceName,
        found: String,
    },

    /// An existing document has no section for the expected resource kind.
    #[error("document at {path} has no {kind} entries")]
    MissingSection { path: PathBuf, kind: ResourceKind },

    /// Migration target entry absent from the legacy document.
    #[error("no entry named '{name}' in legacy document at {path}")]
    NotInDocument { path: PathBuf, name: ResourceName },

    /// A document expected on disk was not found (migration source).
    #[error("no property document found at {path}")]
    MissingDocument { path: PathBuf },

    /// A legacy document could not be loaded for migration. Reported once per
    /// resource that targeted it.
    #[error("legacy document at {path} could not be loaded: {message}")]
    Legacy { path: PathBuf, message: String },

    /// Rewriting the residual legacy document failed after extraction.
    #[error("failed to rewrite legacy document at {path}: {message}")]
    Residual { path: PathBuf, message: String },
}
