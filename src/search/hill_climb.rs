use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};

use crate::assignment::Slot;
use crate::builder::Instance;
use crate::config::HillClimbConfig;
use crate::error::Result;
use crate::moves::Move;
use crate::search::{BestRecord, Checkpoint, Deadline, SearchOutcome};
use crate::state::SolutionState;
use crate::telemetry::{HillClimbRow, Telemetry};

/// SetAssignment candidates: the middle half of each patient's window,
/// every `room_stride`-th compatible room and the first theater that fits.
pub fn candidate_slots(instance: &Instance, room_stride: usize) -> Vec<(usize, Slot)> {
    let stride = room_stride.max(1);
    let mut candidates = Vec::new();
    if instance.days == 0 {
        return candidates;
    }
    for (p, patient) in instance.patients.iter().enumerate() {
        let last = patient.last_day.min(instance.days - 1);
        if patient.release_day > last {
            continue;
        }
        let span = last - patient.release_day;
        for day in patient.release_day + span / 4..=last - span / 4 {
            let Some(theater) = instance
                .theaters
                .iter()
                .position(|t| t.availability[day] >= patient.surgery_duration)
            else {
                continue;
            };
            for room in (0..instance.rooms.len()).step_by(stride) {
                if patient.is_compatible(room) {
                    candidates.push((p, Slot::new(day, room, theater)));
                }
            }
        }
    }
    candidates
}

fn best_record(iteration: u64, deadline: &Deadline, state: &SolutionState) -> BestRecord {
    BestRecord {
        iteration,
        elapsed_ms: deadline.elapsed_ms(),
        unscheduled_mandatory: 0,
        hard_violations: state.hard_violations,
        soft_cost: state.soft_cost,
    }
}

pub fn run<'a, R: Rng>(
    mut state: SolutionState<'a>,
    deadline: &Deadline,
    config: &HillClimbConfig,
    rng: &mut R,
    telemetry: &mut Telemetry,
    checkpoint: &mut dyn Checkpoint,
) -> Result<SearchOutcome<'a>> {
    let candidates = candidate_slots(state.instance(), config.room_stride);
    let log_every = config.log_every.max(1);
    let worsening_probability = config.worsening_probability.clamp(0.0, 1.0);
    debug!(candidates = candidates.len(), "hill-climbing candidate set built");

    state.refresh();
    let mut history = Vec::new();
    let mut best = None;
    if state.is_feasible() {
        history.push(best_record(0, deadline, &state));
        checkpoint.persist(&state)?;
        best = Some(state.clone());
    }

    let mut iteration = 0;
    let mut improvements = 0;
    while !deadline.expired() && !candidates.is_empty() {
        iteration += 1;

        let sample = candidates
            .choose_multiple(rng, config.sample_size.max(1))
            .filter(|(p, slot)| state.slot(*p) != Some(*slot))
            .copied()
            .collect::<Vec<_>>();
        if let Some(&(patient, slot)) = sample.choose(rng) {
            let (old_hard, old_soft) = (state.hard_violations, state.soft_cost);
            let applied = Move::set_assignment(&state, patient, slot).apply(&mut state);
            state.refresh();

            let delta = state.soft_cost - old_soft;
            let accept = state.is_feasible()
                && (delta <= 0.0 || (delta <= config.worsening_limit && rng.gen_bool(worsening_probability)));
            if accept {
                applied.commit();
                let better = best
                    .as_ref()
                    .map_or(true, |b: &SolutionState| state.soft_cost < b.soft_cost);
                if better {
                    improvements += 1;
                    history.push(best_record(iteration, deadline, &state));
                    checkpoint.persist(&state)?;
                    info!(iteration, soft = state.soft_cost, "hill-climbing found a better solution");
                    best = Some(state.clone());
                }
            } else {
                applied.undo(&mut state);
                state.hard_violations = old_hard;
                state.soft_cost = old_soft;
            }
        }

        if iteration % log_every == 0 {
            telemetry.record(&HillClimbRow {
                iteration,
                elapsed_ms: deadline.elapsed_ms(),
                current_cost: state.soft_cost,
                best_cost: best.as_ref().map(|b| b.soft_cost),
                hard_violations: state.hard_violations,
                improvements,
            })?;
        }
    }
    telemetry.flush()?;

    Ok(SearchOutcome {
        best: best.unwrap_or(state),
        iterations: iteration,
        history,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::{Assignment, NurseCoverage};
    use crate::fixtures;
    use crate::search::NoCheckpoint;
    use crate::state::load_initial_state;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::Duration;

    #[test]
    fn candidates_stay_inside_windows() {
        let instance = fixtures::small_instance(2);
        let candidates = candidate_slots(&instance, 2);
        assert!(!candidates.is_empty());
        for (p, slot) in candidates {
            let patient = &instance.patients[p];
            assert!(patient.in_window(slot.day));
            assert!(patient.is_compatible(slot.room));
            assert_eq!(slot.room % 2, 0);
            assert!(instance.theaters[slot.theater].availability[slot.day] >= patient.surgery_duration);
        }
    }

    #[derive(Default)]
    struct CountingCheckpoint {
        soft_costs: Vec<f64>,
    }

    impl Checkpoint for CountingCheckpoint {
        fn persist(&mut self, best: &SolutionState) -> Result<()> {
            self.soft_costs.push(best.soft_cost);
            Ok(())
        }
    }

    #[test]
    fn best_is_feasible_and_improves() {
        // both optional and unscheduled: feasible, yet placing one of them pays
        let instance = fixtures::pair_instance();
        let state = load_initial_state(&instance, Assignment::unassigned(2), NurseCoverage::round_robin(&instance)).unwrap();
        let start_cost = state.soft_cost;
        let mut checkpoint = CountingCheckpoint::default();
        let mut rng = StdRng::seed_from_u64(5);
        let outcome = run(
            state,
            &Deadline::after(Duration::from_millis(100)),
            &HillClimbConfig::default(),
            &mut rng,
            &mut Telemetry::disabled(),
            &mut checkpoint,
        )
        .unwrap();

        assert!(outcome.iterations > 0);
        assert_eq!(outcome.history.len(), 2);
        assert!(outcome.history.iter().all(|record| record.hard_violations == 0));
        for pair in outcome.history.windows(2) {
            assert!(pair[1].soft_cost < pair[0].soft_cost);
        }
        assert_eq!(outcome.best.hard_violations, 0);
        assert!(outcome.best.soft_cost < start_cost);
        // the other patient would mix genders in the only room
        assert_eq!(outcome.best.assignment().scheduled().count(), 1);
        let recorded = outcome.history.iter().map(|record| record.soft_cost).collect::<Vec<_>>();
        assert_eq!(checkpoint.soft_costs, recorded);
    }

    #[test]
    fn equal_cost_moves_keep_best() {
        // moving the one patient between rooms costs the same, so it is
        // accepted but never recorded as a new best
        let instance = fixtures::tiny_instance();
        let mut assignment = Assignment::unassigned(1);
        assignment.set(0, Some(Slot::new(0, 0, 0)));
        let state = load_initial_state(&instance, assignment, NurseCoverage::round_robin(&instance)).unwrap();
        let config = HillClimbConfig {
            room_stride: 1,
            log_every: 1,
            ..HillClimbConfig::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hill.csv");
        let mut telemetry = Telemetry::to_path(&path).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let outcome = run(
            state,
            &Deadline::after(Duration::from_millis(30)),
            &config,
            &mut rng,
            &mut telemetry,
            &mut NoCheckpoint,
        )
        .unwrap();
        drop(telemetry);

        assert!(outcome.iterations > 0);
        assert_eq!(outcome.history.len(), 1);
        assert_eq!(outcome.best.soft_cost, 0.0);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.lines().count() > 1);
        assert!(text.lines().skip(1).all(|line| line.split(',').nth(2) == Some("0.0")));
    }
}
