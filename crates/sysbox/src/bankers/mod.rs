//! Banker's Algorithm deadlock-avoidance sandbox.
//!
//! This module provides:
//! - [`BankersEngine`] - the pure safety-algorithm state machine
//! - [`BankersRound`] - one session's engine plus history, score and
//!   completion tracking
//!
//! The engine never touches persistence; the surrounding service loads a
//! round, drives it, and saves it back as one transaction.

mod engine;
mod round;

pub use engine::{
    BankersEngine, BankersError, BankersProblem, RequestOutcome, SafetyReport, SafetyStep,
};
pub use round::{
    BankersRound, DENIAL_PENALTY, HistoryEntry, PROCESS_BONUS, RELEASE_BONUS, ROUND_BONUS,
    RequestReport, RoundAction, RoundError, SAFETY_BONUS,
};
