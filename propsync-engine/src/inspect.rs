//! Column inspection seam.
//!
//! The engine never talks to a data warehouse itself; callers supply a
//! [`ColumnInspector`] that runs a zero-row introspection query and returns
//! the resource's current column names.

use thiserror::Error;

use propsync_core::types::ResourceDescriptor;

/// External source of a resource's current column names.
///
/// Implementations are shared across worker threads, so they must be `Sync`.
/// Errors are recorded per resource and never abort a whole run.
pub trait ColumnInspector: Sync {
    fn columns(&self, resource: &ResourceDescriptor) -> Result<Vec<String>, InspectError>;
}

/// Failure modes of a column inspection.
#[derive(Debug, Error)]
pub enum InspectError {
    /// The introspection query itself failed (compilation error, missing
    /// relation, missing helper macro…).
    #[error("query error: {message}")]
    Query { message: String },

    /// The data system could not be reached (connectivity, timeout).
    #[error("connection error: {message}")]
    Connection { message: String },

    /// The introspection ran but produced no parseable column list.
    #[error("unparseable inspection output: {message}")]
    Output { message: String },
}
