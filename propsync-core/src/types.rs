//! Domain types for property documents.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.
//! Documents are serializable/deserializable via serde + serde_yaml, and every
//! key the engine does not interpret is carried in a flattened `extra` mapping
//! so user-authored content survives a rewrite verbatim.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;

/// Format marker required at the top of every property document.
pub const FORMAT_VERSION: u32 = 2;

/// Extension of property document files.
pub const PROPERTY_EXTENSION: &str = "yml";

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed resource name, unique within its kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceName(pub String);

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ResourceName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ResourceName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// The kind of a tracked resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    #[default]
    Model,
    Seed,
    Snapshot,
    Analysis,
}

impl ResourceKind {
    /// All supported kinds, in section order.
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Model,
        ResourceKind::Seed,
        ResourceKind::Snapshot,
        ResourceKind::Analysis,
    ];

    /// The plural YAML section key holding entries of this kind.
    pub fn section_key(self) -> &'static str {
        match self {
            ResourceKind::Model => "models",
            ResourceKind::Seed => "seeds",
            ResourceKind::Snapshot => "snapshots",
            ResourceKind::Analysis => "analyses",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Model => write!(f, "model"),
            ResourceKind::Seed => write!(f, "seed"),
            ResourceKind::Snapshot => write!(f, "snapshot"),
            ResourceKind::Analysis => write!(f, "analysis"),
        }
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "model" => Ok(ResourceKind::Model),
            "seed" => Ok(ResourceKind::Seed),
            "snapshot" => Ok(ResourceKind::Snapshot),
            "analysis" => Ok(ResourceKind::Analysis),
            other => Err(format!(
                "unsupported resource type '{other}'; expected: model, seed, snapshot, analysis"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Resource descriptor (input from the lister)
// ---------------------------------------------------------------------------

/// A selected resource, as produced by the external resource lister.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub kind: ResourceKind,
    pub name: ResourceName,
    /// Path of the resource's source artifact, relative to the project root.
    pub source_path: PathBuf,
    /// Property document currently describing the resource, when one exists
    /// somewhere other than the canonical per-resource location.
    pub patch_path: Option<PathBuf>,
}

impl ResourceDescriptor {
    pub fn new(kind: ResourceKind, name: impl Into<ResourceName>, source_path: PathBuf) -> Self {
        Self {
            kind,
            name: name.into(),
            source_path,
            patch_path: None,
        }
    }

    /// Canonical property document path: the source path with a `yml` extension.
    pub fn property_path(&self) -> PathBuf {
        self.source_path.with_extension(PROPERTY_EXTENSION)
    }
}

// ---------------------------------------------------------------------------
// Document model
// ---------------------------------------------------------------------------

/// One column of a resource entry.
///
/// `name` and `description` are the only keys the engine interprets; anything
/// else (tests, meta, tags, quoting…) rides along in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub extra: Mapping,
}

impl ColumnSpec {
    /// A fresh column with a blank description and no extra keys.
    pub fn blank(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            extra: Mapping::new(),
        }
    }
}

/// One resource entry inside a property document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ResourceEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub extra: Mapping,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<ColumnSpec>,
}

impl ResourceEntry {
    /// A fresh entry with a blank description and no columns.
    pub fn blank(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            extra: Mapping::new(),
            columns: Vec::new(),
        }
    }
}

/// The on-disk property document envelope.
///
/// Covers both forms the engine meets: the single-entry documents it emits and
/// legacy documents holding many entries, possibly across several sections.
/// Unrecognized top-level keys (e.g. `sources`) are preserved in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentFile {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<ResourceEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub seeds: Vec<ResourceEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub snapshots: Vec<ResourceEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub analyses: Vec<ResourceEntry>,
    #[serde(flatten)]
    pub extra: Mapping,
}

impl Default for DocumentFile {
    fn default() -> Self {
        Self {
            version: FORMAT_VERSION,
            models: Vec::new(),
            seeds: Vec::new(),
            snapshots: Vec::new(),
            analyses: Vec::new(),
            extra: Mapping::new(),
        }
    }
}

impl DocumentFile {
    /// A fresh version-2 document holding a single entry of `kind`.
    pub fn new(kind: ResourceKind, entry: ResourceEntry) -> Self {
        let mut doc = Self::default();
        doc.section_mut(kind).push(entry);
        doc
    }

    /// Entries of `kind`.
    pub fn section(&self, kind: ResourceKind) -> &Vec<ResourceEntry> {
        match kind {
            ResourceKind::Model => &self.models,
            ResourceKind::Seed => &self.seeds,
            ResourceKind::Snapshot => &self.snapshots,
            ResourceKind::Analysis => &self.analyses,
        }
    }

    /// Mutable entries of `kind`.
    pub fn section_mut(&mut self, kind: ResourceKind) -> &mut Vec<ResourceEntry> {
        match kind {
            ResourceKind::Model => &mut self.models,
            ResourceKind::Seed => &mut self.seeds,
            ResourceKind::Snapshot => &mut self.snapshots,
            ResourceKind::Analysis => &mut self.analyses,
        }
    }

    /// Total number of resource entries across all sections.
    pub fn entry_count(&self) -> usize {
        ResourceKind::ALL
            .iter()
            .map(|kind| self.section(*kind).len())
            .sum()
    }

    /// Remove and return the entry of `kind` named `name`, if present.
    pub fn take_entry(&mut self, kind: ResourceKind, name: &str) -> Option<ResourceEntry> {
        let section = self.section_mut(kind);
        let index = section.iter().position(|entry| entry.name == name)?;
        Some(section.remove(index))
    }

    /// True when only the format marker remains: no entries in any section and
    /// no unrecognized top-level keys.
    pub fn is_empty_shell(&self) -> bool {
        self.entry_count() == 0 && self.extra.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
