//! Round-2 session state around the safety engine.
//!
//! [`BankersRound`] owns one session's matrices plus the game-level pieces
//! the engine deliberately knows nothing about: the append-only history,
//! the score, and completion tracking. The scoring rules live here because
//! they decide when the round ends.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bankers::engine::{
    BankersEngine, BankersError, BankersProblem, RequestOutcome, SafetyReport,
};

/// Penalty for any denied request, regardless of denial reason.
pub const DENIAL_PENALTY: i64 = 5;
/// Bonus when a request drives a process's need to zero.
pub const PROCESS_BONUS: i64 = 10;
/// One-time bonus when every process has completed.
pub const ROUND_BONUS: i64 = 20;
/// One-time bonus for a first safety check that finds a safe state.
pub const SAFETY_BONUS: i64 = 5;
/// Bonus for an explicit resource release.
pub const RELEASE_BONUS: i64 = 5;

/// Round-level failures. These bypass scoring entirely.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoundError {
    /// The round has already been completed.
    #[error("round already completed")]
    Completed,
    /// The request vector is all zeros.
    #[error("request must have at least one non-zero resource value")]
    EmptyRequest,
    /// The process has nothing allocated to release.
    #[error("process has no resources to release")]
    NothingToRelease,
    /// Engine-level validation failure (bad shape or index).
    #[error(transparent)]
    Engine(#[from] BankersError),
}

/// Kind of history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundAction {
    /// Session initialized from the seed problem.
    Initialize,
    /// Safety algorithm run on demand.
    CheckSafety,
    /// Resource request, granted or denied.
    Request,
    /// Explicit resource release.
    Release,
    /// A process reached zero need and was auto-released.
    Complete,
    /// Every process completed; the round is over.
    RoundComplete,
}

/// One append-only history record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Unix milliseconds when the action happened.
    pub timestamp_ms: u64,
    /// What happened.
    pub action: RoundAction,
    /// Affected process name, or `SYSTEM` for round-level actions.
    pub process: String,
    /// The request vector, for request entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<Vec<u32>>,
    /// Whether the action succeeded.
    pub granted: bool,
    /// Human-readable outcome.
    pub reason: String,
    /// Witness sequence from a safety check, when one ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safe_sequence: Option<Vec<String>>,
}

/// Result of [`BankersRound::request`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestReport {
    /// Whether the request was granted.
    pub granted: bool,
    /// Denial reason, when not granted.
    pub reason: Option<String>,
    /// Safety check run against the speculative state, when one ran.
    pub safety: Option<SafetyReport>,
    /// The target process completed and was auto-released.
    pub process_completed: bool,
    /// Every process has now completed.
    pub round_completed: bool,
}

/// One Banker's session: engine state plus history, score and completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankersRound {
    engine: BankersEngine,
    total_resources: Vec<u32>,
    /// Processes that have reached zero need and been auto-released.
    finished: Vec<bool>,
    history: Vec<HistoryEntry>,
    score: i64,
    completed: bool,
    safety_checked: bool,
}

impl BankersRound {
    /// Start a fresh round from the seeded problem.
    pub fn new(problem: &BankersProblem) -> Result<Self, BankersError> {
        let engine = BankersEngine::from_problem(problem)?;
        let finished = vec![false; problem.processes.len()];
        let mut round = Self {
            engine,
            total_resources: problem.total_resources.clone(),
            finished,
            history: Vec::new(),
            score: 0,
            completed: false,
            safety_checked: false,
        };
        round.push_history(
            RoundAction::Initialize,
            "SYSTEM",
            None,
            true,
            "Round 2 initialized",
            None,
        );
        Ok(round)
    }

    /// The underlying engine state.
    pub fn engine(&self) -> &BankersEngine {
        &self.engine
    }

    /// Total system resources per resource kind.
    pub fn total_resources(&self) -> &[u32] {
        &self.total_resources
    }

    /// Append-only action history.
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Current session score.
    pub fn score(&self) -> i64 {
        self.score
    }

    /// Whether every process has completed.
    pub fn completed(&self) -> bool {
        self.completed
    }

    /// Run the safety algorithm and record the result.
    ///
    /// The first check of the session awards a one-time bonus, but only if
    /// the checked state is safe.
    pub fn check_safety(&mut self) -> SafetyReport {
        let report = self.engine.is_safe();
        if !self.safety_checked {
            self.safety_checked = true;
            if report.safe {
                self.score += SAFETY_BONUS;
            }
        }
        let reason = if report.safe {
            "System is in safe state"
        } else {
            "System is in unsafe state"
        };
        self.push_history(
            RoundAction::CheckSafety,
            "SYSTEM",
            None,
            report.safe,
            reason,
            Some(report.safe_sequence.clone()),
        );
        report
    }

    /// Validate and apply a resource request for process `i`.
    ///
    /// Denials (exceeds need, insufficient available, unsafe state) are
    /// reported in the [`RequestReport`] and cost [`DENIAL_PENALTY`] points;
    /// malformed requests (bad shape, bad index, all zeros, completed round)
    /// fail outright and leave the score alone.
    pub fn request(&mut self, i: usize, request: &[u32]) -> Result<RequestReport, RoundError> {
        if self.completed {
            return Err(RoundError::Completed);
        }
        if request.iter().all(|&amount| amount == 0) {
            return Err(RoundError::EmptyRequest);
        }

        let outcome = match self.engine.request(i, request) {
            Ok(outcome) => outcome,
            Err(
                err @ (BankersError::ExceedsNeed { .. } | BankersError::ExceedsAvailable { .. }),
            ) => RequestOutcome {
                granted: false,
                reason: Some(err.to_string()),
                safety: None,
            },
            Err(err) => return Err(err.into()),
        };

        let process = self.engine.processes()[i].clone();
        let mut report = RequestReport {
            granted: outcome.granted,
            reason: outcome.reason.clone(),
            safety: outcome.safety.clone(),
            process_completed: false,
            round_completed: false,
        };

        if !outcome.granted {
            self.score -= DENIAL_PENALTY;
            tracing::debug!(process = %process, reason = ?outcome.reason, "request denied");
        } else if self.engine.is_finished(i) {
            // Zero need: auto-release and credit the completion.
            self.engine.release(i)?;
            self.finished[i] = true;
            self.score += PROCESS_BONUS;
            report.process_completed = true;
            self.push_history(
                RoundAction::Complete,
                &process,
                None,
                true,
                "Process completed - all resources auto-released",
                None,
            );
            if self.finished.iter().all(|&done| done) {
                self.completed = true;
                self.score += ROUND_BONUS;
                report.round_completed = true;
                tracing::info!("all processes completed, round finished");
                self.push_history(
                    RoundAction::RoundComplete,
                    "SYSTEM",
                    None,
                    true,
                    "All processes completed! Round 2 finished",
                    None,
                );
            }
        }

        let reason = report
            .reason
            .clone()
            .unwrap_or_else(|| "Request granted".to_string());
        let safe_sequence = report
            .safety
            .as_ref()
            .map(|safety| safety.safe_sequence.clone());
        self.push_history(
            RoundAction::Request,
            &process,
            Some(request.to_vec()),
            report.granted,
            &reason,
            safe_sequence,
        );
        Ok(report)
    }

    /// Explicitly release everything process `i` holds.
    pub fn release(&mut self, i: usize) -> Result<Vec<u32>, RoundError> {
        if i >= self.engine.processes().len() {
            return Err(RoundError::Engine(BankersError::NoSuchProcess(i)));
        }
        if self.engine.allocation()[i].iter().all(|&held| held == 0) {
            return Err(RoundError::NothingToRelease);
        }
        let available = self.engine.release(i)?;
        self.score += RELEASE_BONUS;
        let process = self.engine.processes()[i].clone();
        self.push_history(
            RoundAction::Release,
            &process,
            None,
            true,
            "Resources released successfully",
            None,
        );
        Ok(available)
    }

    fn push_history(
        &mut self,
        action: RoundAction,
        process: &str,
        request: Option<Vec<u32>>,
        granted: bool,
        reason: &str,
        safe_sequence: Option<Vec<String>>,
    ) {
        self.history.push(HistoryEntry {
            timestamp_ms: now_ms(),
            action,
            process: process.to_string(),
            request,
            granted,
            reason: reason.to_string(),
            safe_sequence,
        });
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
