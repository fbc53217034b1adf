//! SysBox: Simulated Operating-System Escape Room
//!
//! SysBox drives a two-round systems-programming exercise: round 1 is a
//! restricted Unix-style shell over a virtual filesystem and process table,
//! with hidden milestones and a score; round 2 is a Banker's Algorithm
//! resource-allocation sandbox where unsafe requests are denied and rolled
//! back. Sessions persist through pluggable async stores, so the engine
//! itself stays pure and deterministic.

pub mod bankers;
mod path;
mod proc;
mod seed;
mod service;
mod shell;
mod store;
mod vfs;
mod workspace;

pub use proc::{ProcessRecord, ProcessTable};
pub use seed::{bankers_problem, workspace_nodes, workspace_processes};
pub use service::{BankersService, CommandResult, GameService, RoundView, ServiceError};
pub use shell::{Command, Interpreter, ParseError, ShellError, parse};
pub use store::{
    ActionLog, ActionRecord, BankersStore, GameStore, InMemoryBankersStore, InMemoryGameStore,
    MemoryActionLog, SharedActionLog, SharedBankersStore, SharedGameStore, StoreError,
    TracingActionLog, WorkspaceState,
};
pub use vfs::{ArchiveEntry, DirEntry, FsError, FsStore, Node, NodeKind, NodeMetadata};
pub use workspace::{MilestoneFlags, ROOT_CWD, Workspace};
