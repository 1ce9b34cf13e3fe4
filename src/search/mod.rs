//! Search controllers and what they share: deadlines, outcomes, checkpoints.

pub mod annealing;
pub mod domain;
pub mod hill_climb;
pub mod pails;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::config::SearchConfig;
use crate::error::Result;
use crate::solution::SolutionFile;
use crate::state::SolutionState;
use crate::telemetry::Telemetry;

/// Wall-clock budget, checked once per iteration.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    limit: Duration,
}

impl Deadline {
    pub fn after(limit: Duration) -> Deadline {
        Deadline {
            start: Instant::now(),
            limit,
        }
    }

    pub fn expired(&self) -> bool {
        self.start.elapsed() >= self.limit
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    pub fn remaining(&self) -> Duration {
        self.limit.saturating_sub(self.start.elapsed())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerKind {
    HillClimb,
    Annealing,
    Pails,
}

/// One checkpoint of the best state during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct BestRecord {
    pub iteration: u64,
    pub elapsed_ms: u64,
    pub unscheduled_mandatory: u64,
    // all hard violations for hill-climbing and annealing, the patient-side
    // total for PA-ILS
    pub hard_violations: u64,
    pub soft_cost: f64,
}

pub struct SearchOutcome<'a> {
    /// Best state found. For hill-climbing and annealing this is feasible
    /// unless no feasible state was ever seen, in which case it is the
    /// starting state.
    pub best: SolutionState<'a>,
    pub iterations: u64,
    pub history: Vec<BestRecord>,
}

/// Where a controller sends each new best state.
pub trait Checkpoint {
    fn persist(&mut self, best: &SolutionState) -> Result<()>;
}

pub struct NoCheckpoint;

impl Checkpoint for NoCheckpoint {
    fn persist(&mut self, _best: &SolutionState) -> Result<()> {
        Ok(())
    }
}

/// Rewrites a solution file on every improvement.
pub struct SolutionFileCheckpoint {
    path: PathBuf,
}

impl SolutionFileCheckpoint {
    pub fn new(path: impl Into<PathBuf>) -> SolutionFileCheckpoint {
        SolutionFileCheckpoint { path: path.into() }
    }
}

impl Checkpoint for SolutionFileCheckpoint {
    fn persist(&mut self, best: &SolutionState) -> Result<()> {
        SolutionFile::from_state(best).write(&self.path)
    }
}

pub fn run_controller<'a>(
    kind: ControllerKind,
    state: SolutionState<'a>,
    budget: Duration,
    config: &SearchConfig,
    telemetry: &mut Telemetry,
    checkpoint: &mut dyn Checkpoint,
) -> Result<SearchOutcome<'a>> {
    let deadline = Deadline::after(budget);
    let mut rng = StdRng::seed_from_u64(config.seed);
    info!(?kind, budget_secs = budget.as_secs_f64(), seed = config.seed, "starting controller");
    let outcome = match kind {
        ControllerKind::HillClimb => {
            hill_climb::run(state, &deadline, &config.hill_climb, &mut rng, telemetry, checkpoint)?
        }
        ControllerKind::Annealing => {
            annealing::run(state, &deadline, &config.annealing, &mut rng, telemetry, checkpoint)?
        }
        ControllerKind::Pails => pails::run(state, &deadline, &config.pails, &mut rng, telemetry, checkpoint)?,
    };
    info!(
        ?kind,
        iterations = outcome.iterations,
        hard = outcome.best.hard_violations,
        soft = outcome.best.soft_cost,
        "controller finished"
    );
    Ok(outcome)
}

/// PA-ILS for up to half the budget, then annealing from its best state.
pub fn run_pipeline<'a>(
    state: SolutionState<'a>,
    budget: Duration,
    config: &SearchConfig,
    telemetry: &mut Telemetry,
    checkpoint: &mut dyn Checkpoint,
) -> Result<SearchOutcome<'a>> {
    let deadline = Deadline::after(budget);
    let feasibility = run_controller(ControllerKind::Pails, state, budget / 2, config, telemetry, checkpoint)?;
    let mut history = feasibility.history;
    let optimized = run_controller(
        ControllerKind::Annealing,
        feasibility.best,
        deadline.remaining(),
        config,
        telemetry,
        checkpoint,
    )?;
    history.extend(optimized.history);
    Ok(SearchOutcome {
        best: optimized.best,
        iterations: feasibility.iterations + optimized.iterations,
        history,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::{Assignment, NurseCoverage};
    use crate::fixtures;
    use crate::state::load_initial_state;

    #[test]
    fn zero_budget_returns_start() {
        let instance = fixtures::small_instance(8);
        let state = load_initial_state(
            &instance,
            Assignment::unassigned(instance.patients.len()),
            NurseCoverage::round_robin(&instance),
        )
        .unwrap();
        let expected = state.assignment().clone();
        let outcome = run_controller(
            ControllerKind::HillClimb,
            state,
            Duration::ZERO,
            &SearchConfig::default(),
            &mut Telemetry::disabled(),
            &mut NoCheckpoint,
        )
        .unwrap();
        assert_eq!(outcome.iterations, 0);
        assert_eq!(outcome.best.assignment(), &expected);
    }

    #[test]
    fn checkpoint_writes_solution_file() {
        let instance = fixtures::tiny_instance();
        let state = load_initial_state(&instance, Assignment::unassigned(1), NurseCoverage::round_robin(&instance)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("best.json");
        SolutionFileCheckpoint::new(&path).persist(&state).unwrap();
        let file = SolutionFile::read(&path).unwrap();
        assert_eq!(file.patients[0].admission_day, None);
        assert_eq!(file.nurses[0].assignments.len(), 3);
    }

    #[test]
    fn deadline_reports_remaining_time() {
        let deadline = Deadline::after(Duration::from_secs(3600));
        assert!(!deadline.expired());
        assert!(deadline.remaining() > Duration::from_secs(3500));
        assert!(Deadline::after(Duration::ZERO).expired());
    }
}
