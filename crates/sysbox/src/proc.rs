//! Virtual process table.
//!
//! Processes are simulated records, never real host processes. The table
//! keeps a ppid → children index so kill cascades and forest rendering stay
//! O(children). `kill` cascades exactly one level: direct children die with
//! their parent, grandchildren are left orphaned.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

/// One simulated process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    /// Process id, unique per workspace.
    pub pid: u32,
    /// Parent pid. May reference a nonexistent pid, which makes this a root.
    pub ppid: u32,
    /// Process name, e.g. `updater.py`.
    pub name: String,
    /// Simulated CPU usage percentage.
    pub cpu_percent: u32,
    /// Open file paths reported by `lsof`.
    #[serde(default)]
    pub open_files: Vec<String>,
}

/// A single workspace's process table.
///
/// Serializes as the flat record list; the child index is rebuilt on load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<ProcessRecord>", into = "Vec<ProcessRecord>")]
pub struct ProcessTable {
    procs: BTreeMap<u32, ProcessRecord>,
    /// ppid → pids of direct children.
    children: HashMap<u32, BTreeSet<u32>>,
}

impl From<Vec<ProcessRecord>> for ProcessTable {
    fn from(records: Vec<ProcessRecord>) -> Self {
        Self::from_records(records)
    }
}

impl From<ProcessTable> for Vec<ProcessRecord> {
    fn from(table: ProcessTable) -> Self {
        table.procs.into_values().collect()
    }
}

impl ProcessTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the table from a flat record list.
    pub fn from_records(records: impl IntoIterator<Item = ProcessRecord>) -> Self {
        let mut table = Self::new();
        for record in records {
            table.insert(record);
        }
        table
    }

    /// Look up a process by pid.
    pub fn get(&self, pid: u32) -> Option<&ProcessRecord> {
        self.procs.get(&pid)
    }

    /// All processes, pid ascending.
    pub fn list(&self) -> impl Iterator<Item = &ProcessRecord> {
        self.procs.values()
    }

    /// Whether the table holds no processes.
    pub fn is_empty(&self) -> bool {
        self.procs.is_empty()
    }

    /// Direct children of `pid`, pid ascending.
    pub fn children(&self, pid: u32) -> Vec<u32> {
        self.children
            .get(&pid)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Insert or replace a process record.
    pub fn insert(&mut self, record: ProcessRecord) {
        if let Some(old) = self.procs.get(&record.pid) {
            if let Some(set) = self.children.get_mut(&old.ppid) {
                set.remove(&old.pid);
            }
        }
        self.children
            .entry(record.ppid)
            .or_default()
            .insert(record.pid);
        self.procs.insert(record.pid, record);
    }

    /// Remove `pid` and its direct children. Returns the removed pids in
    /// ascending order, or `None` if `pid` does not exist. The cascade is
    /// deliberately one level deep; grandchildren survive.
    pub fn remove(&mut self, pid: u32) -> Option<Vec<u32>> {
        if !self.procs.contains_key(&pid) {
            return None;
        }
        let mut removed: Vec<u32> = self.children(pid);
        removed.push(pid);
        removed.sort_unstable();
        for victim in &removed {
            if let Some(record) = self.procs.remove(victim) {
                if let Some(set) = self.children.get_mut(&record.ppid) {
                    set.remove(victim);
                }
            }
        }
        Some(removed)
    }

    /// Remove every process whose name matches one of `names`. Returns the
    /// removed pids in ascending order.
    pub fn remove_named(&mut self, names: &[&str]) -> Vec<u32> {
        let victims: Vec<u32> = self
            .procs
            .values()
            .filter(|p| names.contains(&p.name.as_str()))
            .map(|p| p.pid)
            .collect();
        for pid in &victims {
            if let Some(record) = self.procs.remove(pid) {
                if let Some(set) = self.children.get_mut(&record.ppid) {
                    set.remove(pid);
                }
            }
        }
        victims
    }

    /// Tabular listing: one line per process, pid ascending.
    pub fn render_table(&self) -> String {
        let lines: Vec<String> = self
            .procs
            .values()
            .map(|p| {
                format!(
                    "{:<10} {:>5} {:>5} {}%",
                    p.name, p.pid, p.ppid, p.cpu_percent
                )
            })
            .collect();
        lines.join("\n")
    }

    /// Hierarchical forest view. Roots are processes whose ppid is not in
    /// the table; ordering is pid ascending at every level.
    pub fn render_forest(&self) -> String {
        let mut out = String::new();
        for record in self.procs.values() {
            if !self.procs.contains_key(&record.ppid) {
                self.walk(record, "", &mut out);
            }
        }
        out.trim_end().to_string()
    }

    fn walk(&self, record: &ProcessRecord, prefix: &str, out: &mut String) {
        let _ = writeln!(out, "{prefix}{} {}", record.pid, record.name);
        let child_prefix = format!("{prefix} ├─ ");
        for pid in self.children(record.pid) {
            if let Some(child) = self.procs.get(&pid) {
                self.walk(child, &child_prefix, out);
            }
        }
    }
}
