//! Banker's Algorithm safety engine.
//!
//! Pure and deterministic over its inputs: the engine validates requests,
//! runs the classic safety algorithm, and applies requests with a
//! speculate-then-rollback discipline. A denied request leaves the matrices
//! exactly as they were; the caller persists whatever state the engine
//! reports back.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from request validation and engine construction.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BankersError {
    /// Matrix or vector shape does not match the problem dimensions.
    #[error("shape mismatch: expected {expected} entries, got {got}")]
    ShapeMismatch {
        /// Expected length.
        expected: usize,
        /// Actual length.
        got: usize,
    },
    /// Process index out of range.
    #[error("no such process index: {0}")]
    NoSuchProcess(usize),
    /// A request entry exceeds the process's remaining need.
    #[error("request exceeds maximum need for resource {resource}")]
    ExceedsNeed {
        /// Name of the first offending resource.
        resource: String,
    },
    /// A request entry exceeds the currently available amount.
    #[error("insufficient {resource} available")]
    ExceedsAvailable {
        /// Name of the first offending resource.
        resource: String,
    },
    /// Allocation exceeds max demand in the initial matrices.
    #[error("allocation exceeds max demand for process {process}, resource {resource}")]
    AllocationExceedsMax {
        /// Offending process name.
        process: String,
        /// Offending resource name.
        resource: String,
    },
}

/// A fixed resource-allocation problem, as seeded for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankersProblem {
    /// Ordered process names.
    pub processes: Vec<String>,
    /// Ordered resource names.
    pub resources: Vec<String>,
    /// Total system instances per resource.
    pub total_resources: Vec<u32>,
    /// Initial allocation matrix (process × resource).
    pub allocation: Vec<Vec<u32>>,
    /// Maximum demand matrix (same shape).
    pub max_demand: Vec<Vec<u32>>,
}

impl BankersProblem {
    /// Initial available vector: totals minus the allocation column sums.
    pub fn initial_available(&self) -> Vec<u32> {
        let mut available = self.total_resources.clone();
        for row in &self.allocation {
            for (j, amount) in row.iter().enumerate() {
                available[j] -= amount;
            }
        }
        available
    }
}

/// One step of the safety algorithm's witness trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyStep {
    /// Process chosen at this step.
    pub process: String,
    /// Its need vector at the time it ran.
    pub need: Vec<u32>,
    /// Its allocation vector, released into `work`.
    pub allocation: Vec<u32>,
    /// Work vector before the release.
    pub work_before: Vec<u32>,
    /// Work vector after the release.
    pub work_after: Vec<u32>,
}

/// Result of running the safety algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyReport {
    /// Whether every process could finish.
    pub safe: bool,
    /// A witness ordering when safe; empty otherwise.
    pub safe_sequence: Vec<String>,
    /// Per-step trace of the simulation.
    pub steps: Vec<SafetyStep>,
    /// Processes that could not finish when unsafe; empty otherwise.
    pub unfinished: Vec<String>,
}

/// Outcome of [`BankersEngine::request`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOutcome {
    /// Whether the request was granted.
    pub granted: bool,
    /// Denial reason, when not granted.
    pub reason: Option<String>,
    /// The safety check run against the speculative state, when validation
    /// passed.
    pub safety: Option<SafetyReport>,
}

/// The Banker's Algorithm state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankersEngine {
    processes: Vec<String>,
    resources: Vec<String>,
    allocation: Vec<Vec<u32>>,
    max_demand: Vec<Vec<u32>>,
    available: Vec<u32>,
    need: Vec<Vec<u32>>,
}

impl BankersEngine {
    /// Build an engine from explicit matrices, validating shapes and the
    /// `allocation ≤ max_demand` invariant. `need` is derived eagerly.
    pub fn new(
        processes: Vec<String>,
        resources: Vec<String>,
        allocation: Vec<Vec<u32>>,
        max_demand: Vec<Vec<u32>>,
        available: Vec<u32>,
    ) -> Result<Self, BankersError> {
        let n = processes.len();
        let m = resources.len();
        check_len(available.len(), m)?;
        check_len(allocation.len(), n)?;
        check_len(max_demand.len(), n)?;
        for row in allocation.iter().chain(max_demand.iter()) {
            check_len(row.len(), m)?;
        }
        for (i, (alloc_row, max_row)) in allocation.iter().zip(&max_demand).enumerate() {
            for (j, (alloc, max)) in alloc_row.iter().zip(max_row).enumerate() {
                if alloc > max {
                    return Err(BankersError::AllocationExceedsMax {
                        process: processes[i].clone(),
                        resource: resources[j].clone(),
                    });
                }
            }
        }
        let need = allocation
            .iter()
            .zip(&max_demand)
            .map(|(alloc_row, max_row)| {
                alloc_row
                    .iter()
                    .zip(max_row)
                    .map(|(alloc, max)| max - alloc)
                    .collect()
            })
            .collect();
        Ok(Self {
            processes,
            resources,
            allocation,
            max_demand,
            available,
            need,
        })
    }

    /// Build an engine from a seeded problem at its initial state.
    pub fn from_problem(problem: &BankersProblem) -> Result<Self, BankersError> {
        let available = problem.initial_available();
        Self::new(
            problem.processes.clone(),
            problem.resources.clone(),
            problem.allocation.clone(),
            problem.max_demand.clone(),
            available,
        )
    }

    /// Ordered process names.
    pub fn processes(&self) -> &[String] {
        &self.processes
    }

    /// Ordered resource names.
    pub fn resources(&self) -> &[String] {
        &self.resources
    }

    /// Current allocation matrix.
    pub fn allocation(&self) -> &[Vec<u32>] {
        &self.allocation
    }

    /// Maximum demand matrix.
    pub fn max_demand(&self) -> &[Vec<u32>] {
        &self.max_demand
    }

    /// Current available vector.
    pub fn available(&self) -> &[u32] {
        &self.available
    }

    /// Current need matrix (`max_demand - allocation`).
    pub fn need(&self) -> &[Vec<u32>] {
        &self.need
    }

    /// Whether process `i` has driven its need vector to all-zero.
    pub fn is_finished(&self, i: usize) -> bool {
        self.need.get(i).is_some_and(|row| row.iter().all(|&n| n == 0))
    }

    /// Validate a request without applying it.
    ///
    /// Checks resource-by-resource in resource order; the first failing
    /// resource decides the error (exceeds-need before insufficient-available
    /// for the same resource).
    pub fn validate_request(&self, i: usize, request: &[u32]) -> Result<(), BankersError> {
        if i >= self.processes.len() {
            return Err(BankersError::NoSuchProcess(i));
        }
        check_len(request.len(), self.resources.len())?;
        for (j, &amount) in request.iter().enumerate() {
            if amount > self.need[i][j] {
                return Err(BankersError::ExceedsNeed {
                    resource: self.resources[j].clone(),
                });
            }
            if amount > self.available[j] {
                return Err(BankersError::ExceedsAvailable {
                    resource: self.resources[j].clone(),
                });
            }
        }
        Ok(())
    }

    /// Run the classic safety algorithm against the current state.
    ///
    /// The scan always restarts from index 0 after a grant, so the
    /// lowest-index eligible process wins every round; the witness sequence
    /// is therefore fully deterministic.
    pub fn is_safe(&self) -> SafetyReport {
        let mut work = self.available.clone();
        let mut finish = vec![false; self.processes.len()];
        let mut safe_sequence = Vec::new();
        let mut steps = Vec::new();

        let mut found = true;
        while found && safe_sequence.len() < self.processes.len() {
            found = false;
            for i in 0..self.processes.len() {
                if finish[i] {
                    continue;
                }
                let can_run = self.need[i].iter().zip(&work).all(|(need, avail)| need <= avail);
                if can_run {
                    let work_before = work.clone();
                    for (j, slot) in work.iter_mut().enumerate() {
                        *slot += self.allocation[i][j];
                    }
                    finish[i] = true;
                    safe_sequence.push(self.processes[i].clone());
                    steps.push(SafetyStep {
                        process: self.processes[i].clone(),
                        need: self.need[i].clone(),
                        allocation: self.allocation[i].clone(),
                        work_before,
                        work_after: work.clone(),
                    });
                    found = true;
                    break;
                }
            }
        }

        let safe = safe_sequence.len() == self.processes.len();
        let unfinished = if safe {
            Vec::new()
        } else {
            self.processes
                .iter()
                .zip(&finish)
                .filter(|(_, done)| !**done)
                .map(|(name, _)| name.clone())
                .collect()
        };
        SafetyReport {
            safe,
            safe_sequence: if safe { safe_sequence } else { Vec::new() },
            steps,
            unfinished,
        }
    }

    /// Validate and apply a request.
    ///
    /// A valid request is applied speculatively, then the safety algorithm
    /// runs; if the resulting state is unsafe, all three mutated vectors are
    /// rolled back before returning. On denial the state is observably
    /// identical to the state before the call.
    pub fn request(&mut self, i: usize, request: &[u32]) -> Result<RequestOutcome, BankersError> {
        self.validate_request(i, request)?;

        for (j, &amount) in request.iter().enumerate() {
            self.available[j] -= amount;
            self.allocation[i][j] += amount;
            self.need[i][j] -= amount;
        }

        let safety = self.is_safe();
        if safety.safe {
            return Ok(RequestOutcome {
                granted: true,
                reason: None,
                safety: Some(safety),
            });
        }

        // Rollback: the denial must retain no partial mutation.
        for (j, &amount) in request.iter().enumerate() {
            self.available[j] += amount;
            self.allocation[i][j] -= amount;
            self.need[i][j] += amount;
        }
        Ok(RequestOutcome {
            granted: false,
            reason: Some("Request would lead to unsafe state".to_string()),
            safety: Some(safety),
        })
    }

    /// Return process `i`'s full allocation to the available pool, zero its
    /// allocation row and reset its need to its max demand. Returns the new
    /// available vector.
    pub fn release(&mut self, i: usize) -> Result<Vec<u32>, BankersError> {
        if i >= self.processes.len() {
            return Err(BankersError::NoSuchProcess(i));
        }
        for j in 0..self.resources.len() {
            self.available[j] += self.allocation[i][j];
            self.allocation[i][j] = 0;
            self.need[i][j] = self.max_demand[i][j];
        }
        Ok(self.available.clone())
    }
}

fn check_len(got: usize, expected: usize) -> Result<(), BankersError> {
    if got == expected {
        Ok(())
    } else {
        Err(BankersError::ShapeMismatch { expected, got })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::bankers_problem;

    fn seeded() -> BankersEngine {
        BankersEngine::from_problem(&bankers_problem()).unwrap()
    }

    fn assert_conservation(engine: &BankersEngine, totals: &[u32]) {
        for j in 0..totals.len() {
            let allocated: u32 = engine.allocation().iter().map(|row| row[j]).sum();
            assert_eq!(allocated + engine.available()[j], totals[j], "resource {j}");
        }
    }

    fn assert_need_invariant(engine: &BankersEngine) {
        for i in 0..engine.processes().len() {
            for j in 0..engine.resources().len() {
                assert_eq!(
                    engine.need()[i][j],
                    engine.max_demand()[i][j] - engine.allocation()[i][j]
                );
            }
        }
    }

    #[test]
    fn initial_state_is_safe() {
        let report = seeded().is_safe();
        assert!(report.safe);
        assert_eq!(report.safe_sequence.len(), 7);
        assert!(report.unfinished.is_empty());
    }

    #[test]
    fn safety_is_deterministic() {
        let engine = seeded();
        let first = engine.is_safe();
        for _ in 0..3 {
            assert_eq!(engine.is_safe().safe_sequence, first.safe_sequence);
        }
    }

    #[test]
    fn tie_break_is_lowest_index_first() {
        // All three processes are eligible immediately; the witness must
        // pick them strictly in index order.
        let engine = BankersEngine::new(
            vec!["P0".into(), "P1".into(), "P2".into()],
            vec!["A".into()],
            vec![vec![1], vec![1], vec![1]],
            vec![vec![2], vec![2], vec![2]],
            vec![3],
        )
        .unwrap();
        let report = engine.is_safe();
        assert!(report.safe);
        assert_eq!(report.safe_sequence, ["P0", "P1", "P2"]);
    }

    #[test]
    fn request_exceeding_need_is_rejected() {
        let mut engine = seeded();
        // need[P1] = [1, 2, 2, 2]; 2 units of A exceed it.
        let err = engine.request(1, &[2, 0, 0, 0]).unwrap_err();
        assert_eq!(
            err,
            BankersError::ExceedsNeed {
                resource: "A".to_string()
            }
        );
    }

    #[test]
    fn request_exceeding_available_is_rejected() {
        let mut engine = seeded();
        // available = [3, 3, 2, 2]; P0 may need up to 7 A but only 3 exist.
        let err = engine.request(0, &[4, 0, 0, 0]).unwrap_err();
        assert_eq!(
            err,
            BankersError::ExceedsAvailable {
                resource: "A".to_string()
            }
        );
    }

    #[test]
    fn first_failing_resource_wins_in_resource_order() {
        let mut engine = seeded();
        // Both B and C entries are bad for P2 (need row [6, 0, 0, 1]); the
        // reported resource must be B, the earlier one.
        let err = engine.request(2, &[0, 1, 1, 0]).unwrap_err();
        assert_eq!(
            err,
            BankersError::ExceedsNeed {
                resource: "B".to_string()
            }
        );
    }

    #[test]
    fn granted_request_preserves_invariants() {
        let problem = bankers_problem();
        let mut engine = seeded();
        let outcome = engine.request(1, &[1, 0, 2, 0]).unwrap();
        assert!(outcome.granted);
        assert_eq!(engine.allocation()[1], [3, 0, 2, 0]);
        assert_eq!(engine.available(), [2, 3, 0, 2]);
        assert_conservation(&engine, &problem.total_resources);
        assert_need_invariant(&engine);
    }

    #[test]
    fn unsafe_request_rolls_back_atomically() {
        // One resource, two processes, each holding 1 of 3 with max 3.
        // Granting 1 more to P0 leaves work=0 with both needing 1: unsafe.
        let mut engine = BankersEngine::new(
            vec!["P0".into(), "P1".into()],
            vec!["A".into()],
            vec![vec![1], vec![1]],
            vec![vec![3], vec![3]],
            vec![1],
        )
        .unwrap();
        let before = engine.clone();
        let outcome = engine.request(0, &[1]).unwrap();
        assert!(!outcome.granted);
        assert_eq!(
            outcome.reason.as_deref(),
            Some("Request would lead to unsafe state")
        );
        assert_eq!(engine, before);
    }

    #[test]
    fn release_returns_full_allocation() {
        let problem = bankers_problem();
        let mut engine = seeded();
        let available = engine.release(2).unwrap();
        assert_eq!(available, [6, 3, 4, 3]);
        assert_eq!(engine.allocation()[2], [0, 0, 0, 0]);
        assert_eq!(engine.need()[2], engine.max_demand()[2]);
        assert_conservation(&engine, &problem.total_resources);
        assert_need_invariant(&engine);
    }

    #[test]
    fn shape_and_index_validation() {
        let mut engine = seeded();
        assert!(matches!(
            engine.request(1, &[1, 0, 2]),
            Err(BankersError::ShapeMismatch {
                expected: 4,
                got: 3
            })
        ));
        assert!(matches!(
            engine.request(9, &[0, 0, 0, 0]),
            Err(BankersError::NoSuchProcess(9))
        ));
    }

    #[test]
    fn construction_rejects_allocation_over_max() {
        let err = BankersEngine::new(
            vec!["P0".into()],
            vec!["A".into()],
            vec![vec![3]],
            vec![vec![2]],
            vec![0],
        )
        .unwrap_err();
        assert!(matches!(err, BankersError::AllocationExceedsMax { .. }));
    }
}
