//! Command interpreter for round 1.
//!
//! Executes parsed commands against one workspace's filesystem store and
//! process table. Every parsed command costs one point, even when it is
//! semantically rejected; semantic failures are rendered as shell-style
//! output lines, never surfaced as hard errors. After each command the
//! milestone predicates re-run, awarding stage bonuses exactly once.

use thiserror::Error;

use crate::path;
use crate::proc::ProcessTable;
use crate::seed::{
    CLEANUP_SCRIPT, CONFIG_PATH, FRAGMENT_ALPHA, FRAGMENT_BETA, FRAGMENT_GAMMA,
    MALICIOUS_PROCESSES, RESTORED_MARKER, STAGE_BONUS,
};
use crate::shell::parser::Command;
use crate::vfs::{FsError, FsStore, Node, NodeKind};
use crate::workspace::{MilestoneFlags, Workspace};

/// Banner appended when stage 1 first completes.
const STAGE1_BANNER: &str = "[SUCCESS] Filesystem configuration restored.\nFragments collected successfully.\nStage 2 unlocked: Process Module.";
/// Banner appended when stage 2 first completes.
const STAGE2_BANNER: &str = "[STAGE 2 COMPLETE] System fully restored.";

/// Semantic command failures. All of these are recovered locally: the
/// interpreter renders them as output text and the per-command deduction
/// still applies.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ShellError {
    /// Target file does not exist.
    #[error("{cmd}: {path}: No such file")]
    NoSuchFile {
        /// Command that failed.
        cmd: &'static str,
        /// Offending path as resolved.
        path: String,
    },
    /// Target path does not exist (file-or-directory commands).
    #[error("{cmd}: {path}: No such file or directory")]
    NoSuchPath {
        /// Command that failed.
        cmd: &'static str,
        /// Offending path as resolved.
        path: String,
    },
    /// `cd` target is absent or not a directory.
    #[error("cd: {path}: No such directory")]
    NoSuchDirectory {
        /// Offending path as typed.
        path: String,
    },
    /// A file operation hit a directory.
    #[error("{cmd}: {path}: Is a directory")]
    IsADirectory {
        /// Command that failed.
        cmd: &'static str,
        /// Offending path as resolved.
        path: String,
    },
    /// A directory operation hit a file.
    #[error("{cmd}: {path}: Not a directory")]
    NotADirectory {
        /// Command that failed.
        cmd: &'static str,
        /// Offending path as resolved.
        path: String,
    },
    /// Target process does not exist.
    #[error("{cmd}: {pid}: No such process")]
    NoSuchProcess {
        /// Command that failed.
        cmd: &'static str,
        /// Offending pid.
        pid: u32,
    },
    /// Script exists but is not marked executable.
    #[error("{script}: Permission denied")]
    PermissionDenied {
        /// Script name as typed.
        script: String,
    },
    /// Script does not exist.
    #[error("{script}: No such file")]
    ScriptNotFound {
        /// Script name as typed.
        script: String,
    },
    /// Archive node carries no extraction manifest.
    #[error("tar: {path}: no extraction manifest")]
    BadArchive {
        /// Offending path as resolved.
        path: String,
    },
}

/// Executes commands against one workspace's state.
#[derive(Debug)]
pub struct Interpreter<'a> {
    ws: &'a mut Workspace,
    fs: &'a mut FsStore,
    procs: &'a mut ProcessTable,
}

impl<'a> Interpreter<'a> {
    /// Borrow the three mutable pieces of a workspace for one command.
    pub fn new(ws: &'a mut Workspace, fs: &'a mut FsStore, procs: &'a mut ProcessTable) -> Self {
        Self { ws, fs, procs }
    }

    /// Execute one parsed command: deduct the per-command point, run the
    /// handler, then re-check the milestone predicates. Returns the rendered
    /// output.
    pub fn run(&mut self, cmd: &Command) -> String {
        self.ws.score -= 1;
        let prev = self.ws.flags;
        let mut output = match self.dispatch(cmd) {
            Ok(out) => out,
            Err(err) => err.to_string(),
        };
        self.check_milestones(prev, &mut output);
        output
    }

    fn dispatch(&mut self, cmd: &Command) -> Result<String, ShellError> {
        match cmd {
            Command::Ls { all, path } => self.ls(*all, path.as_deref()),
            Command::Pwd => Ok(self.ws.cwd.clone()),
            Command::Cd { path } => self.cd(path),
            Command::Cat { path } => self.cat(path),
            Command::Diff { left, right } => self.diff(left, right),
            Command::TarExtract { archive } => self.tar_extract(archive),
            Command::Cp { src, dst } => self.cp(src, dst),
            Command::Chmod { path } => self.chmod(path),
            Command::Run { script } => self.run_script(script),
            Command::Ps { forest } => Ok(self.ps(*forest)),
            Command::Lsof { pid } => self.lsof(*pid),
            Command::Kill { pid } => self.kill(*pid),
            Command::Rm { path } => self.rm(path),
        }
    }

    fn resolve(&self, input: &str) -> String {
        path::resolve(&self.ws.cwd, input)
    }

    fn ls(&self, all: bool, target: Option<&str>) -> Result<String, ShellError> {
        let dir = self.resolve(target.unwrap_or("."));
        let entries = self.fs.list_children(&dir, all).map_err(|err| match err {
            FsError::NotFound(path) => ShellError::NoSuchPath { cmd: "ls", path },
            FsError::NotADirectory(path) => ShellError::NotADirectory { cmd: "ls", path },
            FsError::IsADirectory(path) => ShellError::IsADirectory { cmd: "ls", path },
        })?;
        if entries.is_empty() {
            return Ok("(empty)".to_string());
        }
        let names: Vec<String> = entries
            .into_iter()
            .map(|entry| match entry.kind {
                NodeKind::Dir => format!("{}/", entry.name),
                NodeKind::File => entry.name,
            })
            .collect();
        Ok(names.join("  "))
    }

    fn cd(&mut self, target: &str) -> Result<String, ShellError> {
        let dest = self.resolve(target);
        match self.fs.get(&dest) {
            Some(node) if node.is_dir() => {
                self.ws.cwd = dest;
                Ok(String::new())
            }
            _ => Err(ShellError::NoSuchDirectory {
                path: target.to_string(),
            }),
        }
    }

    fn cat(&mut self, target: &str) -> Result<String, ShellError> {
        let resolved = self.resolve(target);
        let node = self
            .fs
            .get(&resolved)
            .ok_or_else(|| ShellError::NoSuchFile {
                cmd: "cat",
                path: target.to_string(),
            })?;
        if node.is_dir() {
            return Err(ShellError::IsADirectory {
                cmd: "cat",
                path: target.to_string(),
            });
        }
        let content = node.content.clone();
        self.collect_fragments(&content);
        Ok(content)
    }

    /// Fragment detection is content-addressed: reading any file whose
    /// content carries a marker collects that fragment.
    fn collect_fragments(&mut self, content: &str) {
        let flags = &mut self.ws.flags;
        for (marker, flag) in [
            (FRAGMENT_ALPHA, &mut flags.fragment_alpha),
            (FRAGMENT_BETA, &mut flags.fragment_beta),
            (FRAGMENT_GAMMA, &mut flags.fragment_gamma),
        ] {
            if !*flag && content.contains(marker) {
                *flag = true;
                tracing::info!(marker, "fragment collected");
            }
        }
    }

    fn diff(&self, left: &str, right: &str) -> Result<String, ShellError> {
        let node_a = self.file_node("diff", left)?;
        let node_b = self.file_node("diff", right)?;
        if node_a.content == node_b.content {
            return Ok("Files are identical".to_string());
        }
        let lines_a: Vec<&str> = node_a.content.lines().collect();
        let lines_b: Vec<&str> = node_b.content.lines().collect();
        let mut chunks = Vec::new();
        for i in 0..lines_a.len().max(lines_b.len()) {
            let a = lines_a.get(i).copied().unwrap_or("");
            let b = lines_b.get(i).copied().unwrap_or("");
            if a != b {
                chunks.push(format!("{}c\n- {}\n+ {}", i + 1, a, b));
            }
        }
        Ok(chunks.join("\n"))
    }

    fn file_node(&self, cmd: &'static str, target: &str) -> Result<&Node, ShellError> {
        let resolved = self.resolve(target);
        let node = self
            .fs
            .get(&resolved)
            .ok_or_else(|| ShellError::NoSuchFile {
                cmd,
                path: target.to_string(),
            })?;
        if node.is_dir() {
            return Err(ShellError::IsADirectory {
                cmd,
                path: target.to_string(),
            });
        }
        Ok(node)
    }

    fn tar_extract(&mut self, archive: &str) -> Result<String, ShellError> {
        let resolved = self.resolve(archive);
        let node = self
            .fs
            .get(&resolved)
            .ok_or_else(|| ShellError::NoSuchFile {
                cmd: "tar",
                path: archive.to_string(),
            })?;
        if node.is_dir() {
            return Err(ShellError::IsADirectory {
                cmd: "tar",
                path: archive.to_string(),
            });
        }
        let manifest = node
            .metadata
            .archive
            .clone()
            .ok_or_else(|| ShellError::BadArchive {
                path: archive.to_string(),
            })?;

        // Entries extract next to the archive. Re-extraction is a per-file
        // no-op: existing nodes are left untouched.
        let archive_dir = path::parent(&resolved);
        let mut created = Vec::new();
        for entry in manifest {
            let dest = path::resolve(&archive_dir, &entry.path);
            if self.fs.get(&dest).is_some() {
                continue;
            }
            let mut file = Node::file(dest.clone(), entry.content);
            file.hidden = entry.hidden;
            file.executable = entry.executable;
            self.fs.upsert(file);
            created.push(dest);
        }
        if created.is_empty() {
            return Ok("tar: nothing to extract".to_string());
        }
        let lines: Vec<String> = created.into_iter().map(|p| format!("x {p}")).collect();
        Ok(lines.join("\n"))
    }

    fn cp(&mut self, src: &str, dst: &str) -> Result<String, ShellError> {
        let src_path = self.resolve(src);
        let dst_path = self.resolve(dst);
        let source = self
            .fs
            .get(&src_path)
            .ok_or_else(|| ShellError::NoSuchPath {
                cmd: "cp",
                path: src.to_string(),
            })?;

        let mut copy = source.clone();
        copy.path = dst_path.clone();
        copy.name = path::basename(&dst_path).to_string();
        self.fs.upsert(copy);

        if dst_path == CONFIG_PATH {
            self.ws.flags.config_copied = true;
        }
        Ok(String::new())
    }

    fn chmod(&mut self, target: &str) -> Result<String, ShellError> {
        let resolved = self.resolve(target);
        let node = self
            .fs
            .get(&resolved)
            .ok_or_else(|| ShellError::NoSuchFile {
                cmd: "chmod",
                path: target.to_string(),
            })?;
        // Idempotent: already-executable targets are left untouched.
        if !node.executable {
            let mut updated = node.clone();
            updated.executable = true;
            self.fs.upsert(updated);
        }
        Ok(String::new())
    }

    fn run_script(&mut self, script: &str) -> Result<String, ShellError> {
        let resolved = self.resolve(script);
        let node = self
            .fs
            .get(&resolved)
            .ok_or_else(|| ShellError::ScriptNotFound {
                script: script.to_string(),
            })?;
        if !node.executable {
            return Err(ShellError::PermissionDenied {
                script: script.to_string(),
            });
        }
        if script == CLEANUP_SCRIPT {
            let killed = self.procs.remove_named(MALICIOUS_PROCESSES);
            let removed = self.fs.remove_updater_artifacts();
            self.ws.flags.stage2_complete = true;
            tracing::info!(?killed, ?removed, "cleanup script executed");
            return Ok(format!(
                "[CLEANUP] Removing /opt/updater/*\n[CLEANUP] updater removed.\n{STAGE2_BANNER}"
            ));
        }
        Ok(format!("{script}: (script runs, but nothing special happened)"))
    }

    fn ps(&self, forest: bool) -> String {
        if forest {
            self.procs.render_forest()
        } else {
            self.procs.render_table()
        }
    }

    fn lsof(&self, pid: u32) -> Result<String, ShellError> {
        let record = self
            .procs
            .get(pid)
            .ok_or(ShellError::NoSuchProcess { cmd: "lsof", pid })?;
        if record.open_files.is_empty() {
            Ok("(no files open)".to_string())
        } else {
            Ok(record.open_files.join("\n"))
        }
    }

    fn kill(&mut self, pid: u32) -> Result<String, ShellError> {
        let removed = self
            .procs
            .remove(pid)
            .ok_or(ShellError::NoSuchProcess { cmd: "kill", pid })?;
        let children: Vec<String> = removed
            .iter()
            .filter(|&&victim| victim != pid)
            .map(|victim| victim.to_string())
            .collect();
        let mut out = format!("[OK] Terminated process {pid}");
        if !children.is_empty() {
            out.push_str(&format!(
                "\n[OK] Terminated child processes: {}",
                children.join(", ")
            ));
        }
        Ok(out)
    }

    fn rm(&mut self, target: &str) -> Result<String, ShellError> {
        let resolved = self.resolve(target);
        if self.fs.remove(&resolved) {
            Ok(String::new())
        } else {
            Err(ShellError::NoSuchPath {
                cmd: "rm",
                path: target.to_string(),
            })
        }
    }

    /// Milestone predicates. Monotonic: each stage flag is only ever set,
    /// and each bonus is awarded exactly once, on the first transition.
    fn check_milestones(&mut self, prev: MilestoneFlags, output: &mut String) {
        if !self.ws.flags.stage1_complete && self.stage1_satisfied() {
            self.ws.flags.stage1_complete = true;
            self.ws.score += STAGE_BONUS;
            tracing::info!(score = self.ws.score, "stage 1 complete");
            append_line(output, STAGE1_BANNER);
        }
        if !prev.stage2_complete && self.ws.flags.stage2_complete {
            self.ws.score += STAGE_BONUS;
            tracing::info!(score = self.ws.score, "stage 2 complete");
            if !output.contains(STAGE2_BANNER) {
                append_line(output, STAGE2_BANNER);
            }
        }
    }

    fn stage1_satisfied(&self) -> bool {
        let flags = &self.ws.flags;
        let restored = self
            .fs
            .get(CONFIG_PATH)
            .is_some_and(|node| node.content.contains(RESTORED_MARKER));
        flags.fragment_alpha
            && flags.fragment_beta
            && flags.fragment_gamma
            && flags.config_copied
            && restored
    }
}

fn append_line(output: &mut String, line: &str) {
    if !output.is_empty() {
        output.push('\n');
    }
    output.push_str(line);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::{workspace_nodes, workspace_processes};
    use crate::shell::parser::parse;

    struct Fixture {
        ws: Workspace,
        fs: FsStore,
        procs: ProcessTable,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                ws: Workspace::new(),
                fs: FsStore::from_nodes(workspace_nodes()),
                procs: ProcessTable::from_records(workspace_processes()),
            }
        }

        fn run(&mut self, raw: &str) -> String {
            let cmd = parse(raw).unwrap();
            Interpreter::new(&mut self.ws, &mut self.fs, &mut self.procs).run(&cmd)
        }
    }

    #[test]
    fn cat_fragment_sets_flag_and_deducts() {
        let mut fx = Fixture::new();
        let out = fx.run("cat /system/root/modules/fs/.secret.part");
        assert_eq!(out, FRAGMENT_ALPHA);
        assert!(fx.ws.flags.fragment_alpha);
        assert_eq!(fx.ws.score, -1);
    }

    #[test]
    fn cd_to_missing_directory_fails_softly() {
        let mut fx = Fixture::new();
        let out = fx.run("cd /nowhere");
        assert_eq!(out, "cd: /nowhere: No such directory");
        assert_eq!(fx.ws.cwd, "/system/root");
        assert_eq!(fx.ws.score, -1);
    }

    #[test]
    fn score_deducts_one_per_command_without_bonuses() {
        let mut fx = Fixture::new();
        for raw in ["pwd", "ls", "cat readme.txt", "cd modules", "pwd"] {
            fx.run(raw);
        }
        assert_eq!(fx.ws.score, -5);
    }

    #[test]
    fn ls_filters_hidden_and_marks_directories() {
        let mut fx = Fixture::new();
        let visible = fx.run("ls modules/fs");
        assert_eq!(visible, "mount.clean  mount.conf");
        let all = fx.run("ls -a modules/fs");
        assert_eq!(all, ".secret.part  mount.clean  mount.conf");
        let root = fx.run("ls");
        assert_eq!(root, "modules/  readme.txt  tmp/");
    }

    #[test]
    fn cat_on_directory_is_rejected() {
        let mut fx = Fixture::new();
        let out = fx.run("cat modules");
        assert_eq!(out, "cat: modules: Is a directory");
    }

    #[test]
    fn diff_reports_differing_lines() {
        let mut fx = Fixture::new();
        fx.fs.upsert(Node::file("/system/root/a.txt", "same\nold\n"));
        fx.fs
            .upsert(Node::file("/system/root/b.txt", "same\nnew\nextra\n"));
        let out = fx.run("diff a.txt b.txt");
        assert_eq!(out, "2c\n- old\n+ new\n3c\n- \n+ extra");
        fx.fs.upsert(Node::file("/system/root/b.txt", "same\nold\n"));
        assert_eq!(fx.run("diff a.txt b.txt"), "Files are identical");
    }

    #[test]
    fn tar_extraction_is_idempotent() {
        let mut fx = Fixture::new();
        let first = fx.run("tar -xvzf tmp/backup.tar.gz");
        assert_eq!(first, "x /system/root/tmp/fragment3.txt");
        let count = fx.fs.len();
        let second = fx.run("tar -xvzf tmp/backup.tar.gz");
        assert_eq!(second, "tar: nothing to extract");
        assert_eq!(fx.fs.len(), count);
        assert_eq!(
            fx.fs.get("/system/root/tmp/fragment3.txt").unwrap().content,
            FRAGMENT_GAMMA
        );
    }

    #[test]
    fn tar_on_plain_file_reports_bad_archive() {
        let mut fx = Fixture::new();
        let out = fx.run("tar -xvzf readme.txt");
        assert_eq!(out, "tar: readme.txt: no extraction manifest");
    }

    #[test]
    fn stage1_completes_once_with_bonus() {
        let mut fx = Fixture::new();
        fx.run("cat modules/fs/.secret.part"); // alpha
        fx.run("cat modules/fs/mount.clean"); // beta
        fx.run("tar -xvzf tmp/backup.tar.gz");
        fx.run("cat tmp/fragment3.txt"); // gamma
        assert!(!fx.ws.flags.stage1_complete);

        let out = fx.run("cp modules/fs/mount.clean modules/fs/mount.conf");
        assert!(out.contains("[SUCCESS] Filesystem configuration restored."));
        assert!(fx.ws.flags.stage1_complete);
        // 5 commands at -1 each, plus the stage bonus.
        assert_eq!(fx.ws.score, -5 + STAGE_BONUS);

        // Repeating the copy must not award the bonus again.
        let again = fx.run("cp modules/fs/mount.clean modules/fs/mount.conf");
        assert!(!again.contains("[SUCCESS]"));
        assert_eq!(fx.ws.score, -6 + STAGE_BONUS);
    }

    #[test]
    fn stage1_requires_all_fragments() {
        let mut fx = Fixture::new();
        fx.run("cat modules/fs/.secret.part");
        let out = fx.run("cp modules/fs/mount.clean modules/fs/mount.conf");
        assert!(!out.contains("[SUCCESS]"));
        assert!(!fx.ws.flags.stage1_complete);
    }

    #[test]
    fn script_requires_execute_permission() {
        let mut fx = Fixture::new();
        fx.run("cd modules/proc");
        let denied = fx.run("./cleanup.sh");
        assert_eq!(denied, "cleanup.sh: Permission denied");
        assert!(!fx.ws.flags.stage2_complete);

        let missing = fx.run("./ghost.sh");
        assert_eq!(missing, "ghost.sh: No such file");
    }

    #[test]
    fn cleanup_script_finishes_stage2() {
        let mut fx = Fixture::new();
        fx.run("cd modules/proc");
        fx.run("chmod +x cleanup.sh");
        let score_before = fx.ws.score;
        let out = fx.run("./cleanup.sh");
        assert!(out.contains("[STAGE 2 COMPLETE] System fully restored."));
        // Banner appears once even though the handler emits it itself.
        assert_eq!(out.matches("[STAGE 2 COMPLETE]").count(), 1);
        assert!(fx.ws.flags.stage2_complete);
        assert!(fx.ws.completed());
        assert_eq!(fx.ws.score, score_before - 1 + STAGE_BONUS);
        // Malicious processes and updater artifacts are gone.
        assert!(fx.procs.is_empty());
        assert!(fx.fs.get("/opt/updater/updater.py").is_none());
        assert!(fx.fs.get("/opt/updater/keycache.db").is_none());
        assert!(fx.fs.get("/system/root/readme.txt").is_some());
    }

    #[test]
    fn kill_removes_parent_and_direct_children_only() {
        let mut fx = Fixture::new();
        fx.procs.insert(crate::proc::ProcessRecord {
            pid: 900,
            ppid: 1,
            name: "logd".to_string(),
            cpu_percent: 2,
            open_files: Vec::new(),
        });
        let out = fx.run("kill -9 780");
        assert_eq!(
            out,
            "[OK] Terminated process 780\n[OK] Terminated child processes: 781, 782"
        );
        assert!(fx.procs.get(780).is_none());
        assert!(fx.procs.get(781).is_none());
        assert!(fx.procs.get(782).is_none());
        assert!(fx.procs.get(900).is_some());
    }

    #[test]
    fn kill_missing_process_fails_softly() {
        let mut fx = Fixture::new();
        let out = fx.run("kill -9 4242");
        assert_eq!(out, "kill: 4242: No such process");
        assert_eq!(fx.ws.score, -1);
    }

    #[test]
    fn lsof_lists_open_files_or_marker() {
        let mut fx = Fixture::new();
        let out = fx.run("lsof -p 780");
        assert_eq!(
            out,
            "/opt/updater/updater.py\n/tmp/keycache.db\n/etc/autorun/updater.start"
        );
        assert_eq!(fx.run("lsof -p 781"), "(no files open)");
        assert_eq!(fx.run("lsof -p 4242"), "lsof: 4242: No such process");
    }

    #[test]
    fn rm_removes_exact_node() {
        let mut fx = Fixture::new();
        assert_eq!(fx.run("rm readme.txt"), "");
        assert!(fx.fs.get("/system/root/readme.txt").is_none());
        assert_eq!(
            fx.run("rm readme.txt"),
            "rm: readme.txt: No such file or directory"
        );
    }

    #[test]
    fn pwd_and_cd_track_cwd() {
        let mut fx = Fixture::new();
        assert_eq!(fx.run("pwd"), "/system/root");
        assert_eq!(fx.run("cd modules/fs"), "");
        assert_eq!(fx.run("pwd"), "/system/root/modules/fs");
        assert_eq!(fx.run("cd .."), "");
        assert_eq!(fx.run("pwd"), "/system/root/modules");
    }
}
