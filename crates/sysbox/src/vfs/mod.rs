//! Virtual filesystem: node types and the per-workspace store.
//!
//! Everything here is an in-memory simulation; no host filesystem access
//! ever happens. Paths are normalized absolute strings produced by
//! [`crate::path::resolve`].

mod node;
mod store;

pub use node::{ArchiveEntry, Node, NodeKind, NodeMetadata};
pub use store::{DirEntry, FsError, FsStore};
