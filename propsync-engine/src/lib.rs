//! # propsync-engine
//!
//! Property reconciliation engine: merges freshly observed column lists into
//! property documents without destroying user edits, splits legacy
//! multi-resource documents into one document per resource, and runs both
//! across many resources on a bounded worker pool.
//!
//! Call [`runner::update_all`], [`runner::delete_all`] or
//! [`runner::migrate_all`] with the descriptors produced by an external
//! resource lister and (for updates) a [`ColumnInspector`] implementation.

pub mod error;
pub mod inspect;
pub mod migrate;
pub mod reconcile;
pub mod runner;

pub use error::EngineError;
pub use inspect::{ColumnInspector, InspectError};
pub use reconcile::{reconcile, Action};
pub use runner::{delete_all, migrate_all, update_all, RunConfig, RunReport};
