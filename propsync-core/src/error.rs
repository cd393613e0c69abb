//! Error types for propsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from document store operations.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Underlying I/O failure, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load — includes file path and line context from serde_yaml.
    #[error("failed to parse property document at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The file parsed but its `version` marker is not the supported one.
    #[error("unsupported property document version {found} at {path} (expected {expected})")]
    UnsupportedVersion {
        path: PathBuf,
        found: u32,
        expected: u32,
    },
}

/// Convenience constructor for [`DocumentError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DocumentError {
    DocumentError::Io {
        path: path.into(),
        source,
    }
}
