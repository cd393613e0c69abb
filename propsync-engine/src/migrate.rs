//! Legacy document splitting.
//!
//! Converts documents holding many resource entries into the engine's
//! one-resource-per-document form. This is a pure structural split: the
//! extracted entry's description, columns and extra keys move over verbatim,
//! with no column reconciliation.

use std::path::Path;

use propsync_core::types::{DocumentFile, ResourceKind, ResourceName};

use crate::error::EngineError;

/// Extract the entry of `kind` named `name` out of `legacy`.
///
/// Returns `(extracted, residual)`: a fresh single-resource document carrying
/// the entry unchanged, and the legacy document with that entry removed. The
/// caller persists both — and deletes the legacy file instead of persisting
/// the residual when [`DocumentFile::is_empty_shell`] holds afterwards.
///
/// `legacy_path` is only used to annotate the error when the entry is absent.
pub fn extract(
    mut legacy: DocumentFile,
    kind: ResourceKind,
    name: &ResourceName,
    legacy_path: &Path,
) -> Result<(DocumentFile, DocumentFile), EngineError> {
    let Some(entry) = legacy.take_entry(kind, &name.0) else {
        return Err(EngineError::NotInDocument {
            path: legacy_path.to_path_buf(),
            name: name.clone(),
        });
    };
    Ok((DocumentFile::new(kind, entry), legacy))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn legacy_doc() -> DocumentFile {
        serde_yaml::from_str(
            "\
version: 2
models:
- name: users
  description: All registered users.
  meta:
    owner: data-team
  columns:
  - name: user_id
    tests:
    - unique
- name: orders
  description: One row per order.
",
        )
        .expect("fixture")
    }

    #[test]
    fn extract_carries_entry_verbatim() {
        let (extracted, residual) = extract(
            legacy_doc(),
            ResourceKind::Model,
            &ResourceName::from("users"),
            &PathBuf::from("models/schema.yml"),
        )
        .expect("extract");

        assert_eq!(extracted.version, 2);
        assert_eq!(extracted.models.len(), 1);
        let entry = &extracted.models[0];
        assert_eq!(entry.name, "users");
        assert_eq!(entry.description, "All registered users.");
        assert!(entry.extra.contains_key("meta"));
        assert!(entry.columns[0].extra.contains_key("tests"));

        assert_eq!(residual.models.len(), 1);
        assert_eq!(residual.models[0].name, "orders");
    }

    #[test]
    fn extracting_last_entry_leaves_empty_shell() {
        let legacy = extract(
            legacy_doc(),
            ResourceKind::Model,
            &ResourceName::from("users"),
            &PathBuf::from("models/schema.yml"),
        )
        .expect("first extract")
        .1;

        let (_, residual) = extract(
            legacy,
            ResourceKind::Model,
            &ResourceName::from("orders"),
            &PathBuf::from("models/schema.yml"),
        )
        .expect("second extract");

        assert_eq!(residual.entry_count(), 0);
        assert!(residual.is_empty_shell());
    }

    #[test]
    fn missing_target_is_an_error() {
        let err = extract(
            legacy_doc(),
            ResourceKind::Model,
            &ResourceName::from("payments"),
            &PathBuf::from("models/schema.yml"),
        )
        .expect_err("absent entry");
        assert!(matches!(err, EngineError::NotInDocument { .. }));
    }

    #[test]
    fn kind_sections_are_independent() {
        let err = extract(
            legacy_doc(),
            ResourceKind::Seed,
            &ResourceName::from("users"),
            &PathBuf::from("models/schema.yml"),
        )
        .expect_err("wrong kind");
        assert!(matches!(err, EngineError::NotInDocument { .. }));
    }
}
