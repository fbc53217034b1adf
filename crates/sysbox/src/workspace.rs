//! Per-player shell session state.

use serde::{Deserialize, Serialize};

/// Starting directory for every fresh workspace.
pub const ROOT_CWD: &str = "/system/root";

/// Milestone markers for round 1.
///
/// The set is finite and closed, so each flag is a named field rather than
/// an open map. All flags are monotonic: once set they are never cleared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneFlags {
    /// FRAG-ALPHA marker discovered via `cat`.
    pub fragment_alpha: bool,
    /// FRAG-BETA marker discovered via `cat`.
    pub fragment_beta: bool,
    /// FRAG-GAMMA marker discovered via `cat`.
    pub fragment_gamma: bool,
    /// The trusted config was copied over the corrupted one.
    pub config_copied: bool,
    /// Stage 1 (filesystem restoration) complete.
    pub stage1_complete: bool,
    /// Stage 2 (process cleanup) complete; the session is finished.
    pub stage2_complete: bool,
}

/// One player's shell session: cwd, milestone flags and score.
///
/// Mutated only by the shell interpreter; the surrounding service persists
/// it after every command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    /// Current working directory, a normalized absolute path.
    pub cwd: String,
    /// Milestone markers.
    pub flags: MilestoneFlags,
    /// Cumulative score. May go negative; never clamped.
    pub score: i64,
}

impl Default for Workspace {
    fn default() -> Self {
        Self {
            cwd: ROOT_CWD.to_string(),
            flags: MilestoneFlags::default(),
            score: 0,
        }
    }
}

impl Workspace {
    /// Create a fresh workspace at the fixed root.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the session is fully completed. Derived from the final-stage
    /// flag so it cannot drift from it.
    pub fn completed(&self) -> bool {
        self.flags.stage2_complete
    }
}
