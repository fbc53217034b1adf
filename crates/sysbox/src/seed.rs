//! Fixed seed data for new workspaces and Banker's sessions.
//!
//! These are configuration constants, not logic: every fresh workspace gets
//! the same filesystem tree and process table, and every fresh Banker's
//! session gets the same allocation problem, so test runs are reproducible.

use crate::bankers::BankersProblem;
use crate::proc::ProcessRecord;
use crate::vfs::{ArchiveEntry, Node};

/// Content marker for the first fragment (hidden file in modules/fs).
pub const FRAGMENT_ALPHA: &str = "FRAG-ALPHA";
/// Content marker for the second fragment (inside the trusted config).
pub const FRAGMENT_BETA: &str = "FRAG-BETA";
/// Content marker for the third fragment (inside the backup archive).
pub const FRAGMENT_GAMMA: &str = "FRAG-GAMMA";

/// The corrupted configuration file the player must restore.
pub const CONFIG_PATH: &str = "/system/root/modules/fs/mount.conf";
/// Marker line that proves the configuration was restored.
pub const RESTORED_MARKER: &str = "safe_mode=true";
/// Script that finishes stage 2 when executed.
pub const CLEANUP_SCRIPT: &str = "cleanup.sh";
/// Process names removed by the cleanup script.
pub const MALICIOUS_PROCESSES: &[&str] = &["updater.py", "worker.py"];
/// Bonus awarded on each stage's first completion.
pub const STAGE_BONUS: i64 = 50;

/// The seed filesystem tree rooted at `/system/root`.
pub fn workspace_nodes() -> Vec<Node> {
    let base = "/system/root";
    vec![
        Node::dir(base),
        Node::file(
            format!("{base}/readme.txt"),
            "Welcome to SysBox simulation\n",
        ),
        Node::dir(format!("{base}/tmp")),
        Node::file(format!("{base}/tmp/backup.tar.gz"), "").with_archive(vec![ArchiveEntry {
            path: "fragment3.txt".to_string(),
            content: FRAGMENT_GAMMA.to_string(),
            hidden: false,
            executable: false,
        }]),
        Node::dir(format!("{base}/modules")),
        Node::dir(format!("{base}/modules/fs")),
        Node::file(
            format!("{base}/modules/fs/mount.conf"),
            "# mount.conf  (corrupted)\ntype=ext4\nflags=rw\nprimary_mount=/dev/sda1\n\n# WARNING: missing mount_handler & safe_mode\n\n# MALICIOUS:\ninjector_flag=1\n",
        ),
        Node::file(
            format!("{base}/modules/fs/mount.clean"),
            "# mount.clean  (trusted)\ntype=ext4\nflags=rw\nprimary_mount=/dev/sda1\nmount_handler=v2.1\nsafe_mode=true\n\n# Internal note:\nFRAG-BETA\n",
        ),
        Node::file(format!("{base}/modules/fs/.secret.part"), FRAGMENT_ALPHA).hidden(),
        Node::dir(format!("{base}/modules/proc")),
        Node::file(
            format!("{base}/modules/proc/report.log"),
            "PROCESS MODULE REPORT\n\nA system scan detected unusual activity inside the running processes.\n\nClues: ...",
        ),
        Node::file(
            format!("{base}/modules/proc/cleanup.sh"),
            "#!/bin/sh\necho Cleanup",
        ),
        // Updater droppings, removed by the cleanup script.
        Node::dir("/opt"),
        Node::dir("/opt/updater"),
        Node::file("/opt/updater/updater.py", "import os\n# ...").updater_artifact(),
        Node::file("/opt/updater/keycache.db", "").hidden().updater_artifact(),
    ]
}

/// The seed process table: one updater with two workers.
pub fn workspace_processes() -> Vec<ProcessRecord> {
    vec![
        ProcessRecord {
            pid: 780,
            ppid: 1,
            name: "updater.py".to_string(),
            cpu_percent: 92,
            open_files: vec![
                "/opt/updater/updater.py".to_string(),
                "/tmp/keycache.db".to_string(),
                "/etc/autorun/updater.start".to_string(),
            ],
        },
        ProcessRecord {
            pid: 781,
            ppid: 780,
            name: "worker.py".to_string(),
            cpu_percent: 30,
            open_files: Vec::new(),
        },
        ProcessRecord {
            pid: 782,
            ppid: 780,
            name: "worker.py".to_string(),
            cpu_percent: 29,
            open_files: Vec::new(),
        },
    ]
}

/// The fixed Banker's Algorithm problem: seven processes, four resources.
pub fn bankers_problem() -> BankersProblem {
    BankersProblem {
        processes: ["P0", "P1", "P2", "P3", "P4", "P5", "P6"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        resources: ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect(),
        total_resources: vec![12, 6, 8, 9],
        allocation: vec![
            vec![0, 1, 0, 2], // P0
            vec![2, 0, 0, 0], // P1
            vec![3, 0, 2, 1], // P2
            vec![2, 1, 1, 1], // P3
            vec![0, 0, 2, 2], // P4
            vec![1, 0, 0, 0], // P5
            vec![1, 1, 1, 1], // P6
        ],
        max_demand: vec![
            vec![7, 5, 3, 4], // P0
            vec![3, 2, 2, 2], // P1
            vec![9, 0, 2, 2], // P2
            vec![2, 2, 2, 2], // P3
            vec![4, 3, 3, 3], // P4
            vec![5, 3, 3, 3], // P5
            vec![3, 2, 2, 2], // P6
        ],
    }
}
