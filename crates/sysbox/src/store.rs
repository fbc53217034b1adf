//! Collaborator seams for persistence and action logging.
//!
//! The core never talks to a database directly: the services load state
//! through these traits, mutate it in memory, and save it back. The
//! in-memory implementations here back the tests and the CLI; a real
//! deployment substitutes its own storage behind the same traits.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::bankers::BankersRound;
use crate::proc::{ProcessRecord, ProcessTable};
use crate::vfs::{FsStore, Node};
use crate::workspace::Workspace;

/// Storage-layer failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store reported an error.
    #[error("storage error: {0}")]
    Backend(String),
}

/// Everything one workspace persists: session state, filesystem, processes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceState {
    /// Session state (cwd, flags, score).
    pub workspace: Workspace,
    /// Filesystem nodes, keyed by path inside the store.
    pub fs: FsStore,
    /// Process records, keyed by pid inside the table.
    pub procs: ProcessTable,
}

impl WorkspaceState {
    /// Assemble a state from flat persisted collections.
    pub fn from_parts(
        workspace: Workspace,
        nodes: Vec<Node>,
        records: Vec<ProcessRecord>,
    ) -> Self {
        Self {
            workspace,
            fs: FsStore::from_nodes(nodes),
            procs: ProcessTable::from_records(records),
        }
    }
}

/// Persistence contract for round-1 workspaces.
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Load a workspace's full state, or `None` if it was never seeded.
    async fn load(&self, workspace_id: &str) -> Result<Option<WorkspaceState>, StoreError>;

    /// Persist a workspace's full state, replacing what was there.
    async fn save(&self, workspace_id: &str, state: &WorkspaceState) -> Result<(), StoreError>;
}

/// Persistence contract for round-2 sessions.
#[async_trait]
pub trait BankersStore: Send + Sync {
    /// Load a session's round state, or `None` if not initialized.
    async fn load(&self, session_id: &str) -> Result<Option<BankersRound>, StoreError>;

    /// Persist a session's round state.
    async fn save(&self, session_id: &str, round: &BankersRound) -> Result<(), StoreError>;

    /// Delete a session's round state. Returns whether anything was deleted.
    async fn delete(&self, session_id: &str) -> Result<bool, StoreError>;
}

/// Write-only sink for command/output audit records. The core never reads
/// these back.
#[async_trait]
pub trait ActionLog: Send + Sync {
    /// Append one record.
    async fn append(&self, workspace_id: &str, command: &str, output: &str);
}

/// One audit record, as captured by [`MemoryActionLog`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Unix milliseconds when the record was appended.
    pub timestamp_ms: u64,
    /// Workspace the command ran against.
    pub workspace_id: String,
    /// Raw command text.
    pub command: String,
    /// Rendered output.
    pub output: String,
}

/// In-memory [`GameStore`] for tests and the CLI.
#[derive(Debug, Default)]
pub struct InMemoryGameStore {
    states: RwLock<HashMap<String, WorkspaceState>>,
}

impl InMemoryGameStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GameStore for InMemoryGameStore {
    async fn load(&self, workspace_id: &str) -> Result<Option<WorkspaceState>, StoreError> {
        Ok(self.states.read().await.get(workspace_id).cloned())
    }

    async fn save(&self, workspace_id: &str, state: &WorkspaceState) -> Result<(), StoreError> {
        self.states
            .write()
            .await
            .insert(workspace_id.to_string(), state.clone());
        Ok(())
    }
}

/// In-memory [`BankersStore`] for tests and the CLI.
#[derive(Debug, Default)]
pub struct InMemoryBankersStore {
    rounds: RwLock<HashMap<String, BankersRound>>,
}

impl InMemoryBankersStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BankersStore for InMemoryBankersStore {
    async fn load(&self, session_id: &str) -> Result<Option<BankersRound>, StoreError> {
        Ok(self.rounds.read().await.get(session_id).cloned())
    }

    async fn save(&self, session_id: &str, round: &BankersRound) -> Result<(), StoreError> {
        self.rounds
            .write()
            .await
            .insert(session_id.to_string(), round.clone());
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<bool, StoreError> {
        Ok(self.rounds.write().await.remove(session_id).is_some())
    }
}

/// In-memory [`ActionLog`] that retains records for inspection in tests.
#[derive(Debug, Default)]
pub struct MemoryActionLog {
    records: RwLock<Vec<ActionRecord>>,
}

impl MemoryActionLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records appended so far.
    pub async fn records(&self) -> Vec<ActionRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl ActionLog for MemoryActionLog {
    async fn append(&self, workspace_id: &str, command: &str, output: &str) {
        self.records.write().await.push(ActionRecord {
            timestamp_ms: now_ms(),
            workspace_id: workspace_id.to_string(),
            command: command.to_string(),
            output: output.to_string(),
        });
    }
}

/// [`ActionLog`] that forwards records to `tracing` and keeps nothing.
#[derive(Debug, Default, Clone)]
pub struct TracingActionLog;

#[async_trait]
impl ActionLog for TracingActionLog {
    async fn append(&self, workspace_id: &str, command: &str, output: &str) {
        tracing::debug!(workspace_id, command, output, "command executed");
    }
}

/// Shared handles used by the services.
pub type SharedGameStore = Arc<dyn GameStore>;
/// Shared Banker's store handle.
pub type SharedBankersStore = Arc<dyn BankersStore>;
/// Shared action-log handle.
pub type SharedActionLog = Arc<dyn ActionLog>;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::{workspace_nodes, workspace_processes};

    #[tokio::test]
    async fn game_store_round_trips_state() {
        let store = InMemoryGameStore::new();
        assert!(store.load("ws-1").await.unwrap().is_none());

        let state = WorkspaceState::from_parts(
            Workspace::new(),
            workspace_nodes(),
            workspace_processes(),
        );
        store.save("ws-1", &state).await.unwrap();

        let loaded = store.load("ws-1").await.unwrap().unwrap();
        assert_eq!(loaded.workspace, state.workspace);
        assert_eq!(loaded.fs.len(), state.fs.len());
        assert!(loaded.fs.get("/system/root/readme.txt").is_some());
        assert!(loaded.procs.get(780).is_some());
    }

    #[tokio::test]
    async fn bankers_store_delete_reports_presence() {
        let store = InMemoryBankersStore::new();
        assert!(!store.delete("s-1").await.unwrap());

        let round = BankersRound::new(&crate::seed::bankers_problem()).unwrap();
        store.save("s-1", &round).await.unwrap();
        assert!(store.load("s-1").await.unwrap().is_some());
        assert!(store.delete("s-1").await.unwrap());
        assert!(store.load("s-1").await.unwrap().is_none());
    }

    #[test]
    fn workspace_state_survives_json_serialization() {
        let state = WorkspaceState::from_parts(
            Workspace::new(),
            workspace_nodes(),
            workspace_processes(),
        );
        let json = serde_json::to_string(&state).unwrap();
        let restored: WorkspaceState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, state);

        // Derived indexes must be rebuilt, not just the flat node list:
        // listings and kill cascades both depend on them.
        let listing = restored.fs.list_children("/system/root", true).unwrap();
        assert!(!listing.is_empty());
        assert_eq!(restored.procs.children(780), vec![781, 782]);
    }

    #[tokio::test]
    async fn memory_action_log_keeps_order() {
        let log = MemoryActionLog::new();
        log.append("ws-1", "pwd", "/system/root").await;
        log.append("ws-1", "ls", "(empty)").await;
        let records = log.records().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].command, "pwd");
        assert_eq!(records[1].command, "ls");
    }
}
