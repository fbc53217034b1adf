//! In-memory virtual filesystem store.
//!
//! Nodes are keyed by normalized absolute path. A parent-path → child-name
//! index is maintained on every insert and remove so directory listings and
//! the readdir-style queries stay O(children) instead of rescanning the
//! whole map.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::path;
use crate::vfs::node::{Node, NodeKind};

/// Errors that can occur during filesystem store operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FsError {
    /// No node exists at the path.
    #[error("no such file or directory: {0}")]
    NotFound(String),
    /// Listing was attempted on a file.
    #[error("not a directory: {0}")]
    NotADirectory(String),
    /// A file operation was attempted on a directory.
    #[error("is a directory: {0}")]
    IsADirectory(String),
}

/// Directory entry returned from listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name.
    pub name: String,
    /// Whether this entry is a directory.
    pub kind: NodeKind,
}

/// A single workspace's virtual filesystem.
///
/// Serializes as the flat node list; the child index is rebuilt on load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Node>", into = "Vec<Node>")]
pub struct FsStore {
    nodes: BTreeMap<String, Node>,
    /// Parent path → names of direct children.
    children: HashMap<String, BTreeSet<String>>,
}

impl From<Vec<Node>> for FsStore {
    fn from(nodes: Vec<Node>) -> Self {
        Self::from_nodes(nodes)
    }
}

impl From<FsStore> for Vec<Node> {
    fn from(store: FsStore) -> Self {
        store.nodes.into_values().collect()
    }
}

impl FsStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the store from a flat node list (e.g. after loading from
    /// persistence). Later duplicates overwrite earlier ones.
    pub fn from_nodes(nodes: impl IntoIterator<Item = Node>) -> Self {
        let mut store = Self::new();
        for node in nodes {
            store.upsert(node);
        }
        store
    }

    /// Look up a node by normalized absolute path.
    pub fn get(&self, path: &str) -> Option<&Node> {
        self.nodes.get(path)
    }

    /// Number of nodes in the store.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the store holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over all nodes in path order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// List the direct children of `dir_path`, sorted lexicographically by
    /// name. Hidden entries are filtered unless `include_hidden`.
    pub fn list_children(
        &self,
        dir_path: &str,
        include_hidden: bool,
    ) -> Result<Vec<DirEntry>, FsError> {
        let dir = self
            .nodes
            .get(dir_path)
            .ok_or_else(|| FsError::NotFound(dir_path.to_string()))?;
        if dir.kind != NodeKind::Dir {
            return Err(FsError::NotADirectory(dir_path.to_string()));
        }

        let mut entries = Vec::new();
        if let Some(names) = self.children.get(dir_path) {
            for name in names {
                let child_path = join_child(dir_path, name);
                if let Some(child) = self.nodes.get(&child_path) {
                    if child.hidden && !include_hidden {
                        continue;
                    }
                    entries.push(DirEntry {
                        name: child.name.clone(),
                        kind: child.kind,
                    });
                }
            }
        }
        Ok(entries)
    }

    /// Insert or overwrite a node, bumping its version past any existing
    /// node at the same path.
    pub fn upsert(&mut self, mut node: Node) {
        if let Some(existing) = self.nodes.get(&node.path) {
            node.version = existing.version + 1;
        }
        let parent = path::parent(&node.path);
        if parent != node.path {
            self.children
                .entry(parent)
                .or_default()
                .insert(node.name.clone());
        }
        self.nodes.insert(node.path.clone(), node);
    }

    /// Remove the node at `path`. Returns `true` if a node was removed.
    pub fn remove(&mut self, path: &str) -> bool {
        match self.nodes.remove(path) {
            Some(node) => {
                let parent = path::parent(&node.path);
                if let Some(names) = self.children.get_mut(&parent) {
                    names.remove(&node.name);
                }
                true
            }
            None => false,
        }
    }

    /// Remove every node flagged as an updater artifact. Returns the removed
    /// paths in path order.
    pub fn remove_updater_artifacts(&mut self) -> Vec<String> {
        let targets: Vec<String> = self
            .nodes
            .values()
            .filter(|n| n.metadata.updater_artifact)
            .map(|n| n.path.clone())
            .collect();
        for target in &targets {
            self.remove(target);
        }
        targets
    }
}

fn join_child(dir_path: &str, name: &str) -> String {
    if dir_path == "/" {
        format!("/{name}")
    } else {
        format!("{dir_path}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FsStore {
        FsStore::from_nodes([
            Node::dir("/root"),
            Node::file("/root/b.txt", "b"),
            Node::file("/root/a.txt", "a"),
            Node::file("/root/.hidden", "h").hidden(),
            Node::dir("/root/sub"),
            Node::file("/root/sub/deep.txt", "deep"),
        ])
    }

    #[test]
    fn list_children_sorted_direct_only() {
        let store = sample();
        let entries = store.list_children("/root", false).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        // deep.txt is a grandchild and must not appear
        assert_eq!(names, ["a.txt", "b.txt", "sub"]);
    }

    #[test]
    fn hidden_entries_need_flag() {
        let store = sample();
        let all = store.list_children("/root", true).unwrap();
        assert!(all.iter().any(|e| e.name == ".hidden"));
        let visible = store.list_children("/root", false).unwrap();
        assert!(!visible.iter().any(|e| e.name == ".hidden"));
    }

    #[test]
    fn list_children_errors() {
        let store = sample();
        assert_eq!(
            store.list_children("/nope", false),
            Err(FsError::NotFound("/nope".to_string()))
        );
        assert_eq!(
            store.list_children("/root/a.txt", false),
            Err(FsError::NotADirectory("/root/a.txt".to_string()))
        );
    }

    #[test]
    fn upsert_bumps_version_on_overwrite() {
        let mut store = sample();
        let v1 = store.get("/root/a.txt").unwrap().version;
        store.upsert(Node::file("/root/a.txt", "updated"));
        let node = store.get("/root/a.txt").unwrap();
        assert_eq!(node.content, "updated");
        assert_eq!(node.version, v1 + 1);
    }

    #[test]
    fn remove_updates_index() {
        let mut store = sample();
        assert!(store.remove("/root/a.txt"));
        assert!(!store.remove("/root/a.txt"));
        let names: Vec<_> = store
            .list_children("/root", false)
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, ["b.txt", "sub"]);
    }

    #[test]
    fn remove_updater_artifacts_only_flagged() {
        let mut store = sample();
        store.upsert(Node::file("/root/updater.bin", "x").updater_artifact());
        let removed = store.remove_updater_artifacts();
        assert_eq!(removed, ["/root/updater.bin"]);
        assert!(store.get("/root/a.txt").is_some());
    }
}
