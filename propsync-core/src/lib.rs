//! # propsync-core
//!
//! Document model and on-disk store for resource property documents.
//!
//! A property document is the human-editable YAML file paired with a dbt
//! resource (model, seed, snapshot or analysis) that holds its description
//! and per-column metadata. [`types::DocumentFile`] is the in-memory form;
//! [`store`] reads and writes it atomically.

pub mod error;
pub mod store;
pub mod types;

pub use error::DocumentError;
pub use types::{
    ColumnSpec, DocumentFile, ResourceDescriptor, ResourceEntry, ResourceKind, ResourceName,
    FORMAT_VERSION, PROPERTY_EXTENSION,
};
