//! Column reconciliation.
//!
//! Merges a freshly observed column list into a resource's property document.
//! Only `name`, `description` and `columns` are interpreted; everything the
//! user added on top (entry description, tests, meta, sibling entries,
//! unrecognized top-level keys) is carried through verbatim.

use std::collections::HashMap;

use propsync_core::types::{ColumnSpec, DocumentFile, ResourceDescriptor, ResourceEntry};

use crate::error::EngineError;

/// Action taken for one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// A new property document was created.
    Created,
    /// An existing document's column set or order changed.
    Updated,
    /// Nothing to do — no write is performed.
    Unchanged,
    /// The property document was removed.
    Deleted,
    /// A legacy multi-resource entry was split into its own document.
    Migrated,
}

impl Action {
    pub fn label(self) -> &'static str {
        match self {
            Action::Created => "created",
            Action::Updated => "updated",
            Action::Unchanged => "unchanged",
            Action::Deleted => "deleted",
            Action::Migrated => "migrated",
        }
    }
}

/// Merge `observed` column names into the resource's property document.
///
/// With no existing document, builds a fresh single-entry document with one
/// blank-description column per observed name ([`Action::Created`]).
///
/// With an existing document, the entry named after the resource gets its
/// column list rebuilt in observed order: columns whose name survives keep
/// their full previous object, new names get blank columns, absent names are
/// dropped. Returns [`Action::Unchanged`] when the result is identical to the
/// input document, in which case the caller must not write.
pub fn reconcile(
    resource: &ResourceDescriptor,
    observed: &[String],
    existing: Option<DocumentFile>,
) -> Result<(DocumentFile, Action), EngineError> {
    let observed = dedupe_first_occurrence(observed);

    let Some(original) = existing else {
        let mut entry = ResourceEntry::blank(resource.name.0.clone());
        entry.columns = observed.iter().map(ColumnSpec::blank).collect();
        return Ok((DocumentFile::new(resource.kind, entry), Action::Created));
    };

    let path = resource.property_path();
    let section = original.section(resource.kind);
    if section.is_empty() {
        return Err(EngineError::MissingSection {
            path,
            kind: resource.kind,
        });
    }
    let Some(index) = section
        .iter()
        .position(|entry| entry.name == resource.name.0)
    else {
        return Err(EngineError::NameMismatch {
            path,
            expected: resource.name.clone(),
            found: section[0].name.clone(),
        });
    };

    let mut merged = original.clone();
    let entry = &mut merged.section_mut(resource.kind)[index];

    // Last occurrence wins if an existing document violates the unique-name
    // invariant.
    let mut previous: HashMap<String, ColumnSpec> = entry
        .columns
        .drain(..)
        .map(|column| (column.name.clone(), column))
        .collect();
    entry.columns = observed
        .iter()
        .map(|name| {
            previous
                .remove(name.as_str())
                .unwrap_or_else(|| ColumnSpec::blank(name))
        })
        .collect();

    let action = if merged == original {
        Action::Unchanged
    } else {
        Action::Updated
    };
    Ok((merged, action))
}

/// Collapse duplicate observed names to one column, first-occurrence order.
fn dedupe_first_occurrence(observed: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    observed
        .iter()
        .filter(|name| seen.insert(name.as_str()))
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
