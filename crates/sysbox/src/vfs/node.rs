//! Filesystem node types.

use serde::{Deserialize, Serialize};

/// Whether a node is a plain file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Regular file with string content.
    File,
    /// Directory; children are the nodes whose parent path equals this path.
    Dir,
}

/// One entry of an embedded archive manifest.
///
/// Archives in the simulation are ordinary file nodes carrying a manifest in
/// their metadata; extraction materializes these entries next to the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    /// Destination path, relative to the archive's directory.
    pub path: String,
    /// File content to create.
    pub content: String,
    /// Whether the extracted file is hidden.
    #[serde(default)]
    pub hidden: bool,
    /// Whether the extracted file is executable.
    #[serde(default)]
    pub executable: bool,
}

/// Closed metadata record attached to every node.
///
/// The known uses are finite, so this is a fixed struct rather than an open
/// map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetadata {
    /// Embedded extraction manifest, present on simulated archives.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive: Option<Vec<ArchiveEntry>>,
    /// Transient updater artifact, removed by the cleanup script.
    #[serde(default)]
    pub updater_artifact: bool,
}

/// A single entry in the virtual filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Normalized absolute path, unique per workspace.
    pub path: String,
    /// Final path segment.
    pub name: String,
    /// File or directory.
    pub kind: NodeKind,
    /// File content; empty for directories.
    pub content: String,
    /// Hidden entries are omitted from listings unless `-a` is given.
    pub hidden: bool,
    /// Scripts require this bit before `./name` will run them.
    pub executable: bool,
    /// Closed metadata record.
    pub metadata: NodeMetadata,
    /// Monotonic counter bumped on every mutation.
    pub version: u64,
}

impl Node {
    /// Create a file node at `path` with the given content.
    pub fn file(path: impl Into<String>, content: impl Into<String>) -> Self {
        let path = path.into();
        let name = crate::path::basename(&path).to_string();
        Self {
            path,
            name,
            kind: NodeKind::File,
            content: content.into(),
            hidden: false,
            executable: false,
            metadata: NodeMetadata::default(),
            version: 1,
        }
    }

    /// Create a directory node at `path`.
    pub fn dir(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = crate::path::basename(&path).to_string();
        Self {
            path,
            name,
            kind: NodeKind::Dir,
            content: String::new(),
            hidden: false,
            executable: false,
            metadata: NodeMetadata::default(),
            version: 1,
        }
    }

    /// Mark the node hidden.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Attach an archive manifest.
    pub fn with_archive(mut self, entries: Vec<ArchiveEntry>) -> Self {
        self.metadata.archive = Some(entries);
        self
    }

    /// Flag the node as a transient updater artifact.
    pub fn updater_artifact(mut self) -> Self {
        self.metadata.updater_artifact = true;
        self
    }

    /// Whether this node is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Dir
    }
}
