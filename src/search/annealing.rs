use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};

use crate::assignment::Slot;
use crate::config::AnnealingConfig;
use crate::error::Result;
use crate::moves::Move;
use crate::search::{BestRecord, Checkpoint, Deadline, SearchOutcome};
use crate::state::SolutionState;
use crate::telemetry::{AnnealingRow, Telemetry};

/// Geometric cooling with a floor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Schedule {
    temperature: f64,
    floor: f64,
    alpha: f64,
}

impl Schedule {
    pub fn new(config: &AnnealingConfig) -> Schedule {
        Schedule {
            temperature: config.initial_temperature.max(config.final_temperature),
            floor: config.final_temperature,
            alpha: config.alpha,
        }
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn cool(&mut self) {
        self.temperature = (self.temperature * self.alpha).max(self.floor);
    }

    pub fn accepts<R: Rng>(&self, delta: f64, rng: &mut R) -> bool {
        delta < 0.0 || rng.gen::<f64>() < (-delta / self.temperature).exp()
    }
}

fn random_slot<R: Rng>(state: &SolutionState, patient: usize, rng: &mut R) -> Slot {
    let instance = state.instance();
    let p = &instance.patients[patient];
    let last = p.last_day.min(instance.days - 1);
    let day = if p.release_day <= last {
        rng.gen_range(p.release_day..=last)
    } else {
        rng.gen_range(0..instance.days)
    };
    Slot::new(
        day,
        rng.gen_range(0..instance.rooms.len()),
        rng.gen_range(0..instance.theaters.len()),
    )
}

/// Draws one neighbour uniformly over the three move kinds.
///
/// `None` when the draw is a no-op or pairs a nurse with a shift outside
/// their working shifts; the caller skips the iteration.
pub fn pick_move<R: Rng>(state: &SolutionState, config: &AnnealingConfig, rng: &mut R) -> Option<Move> {
    let instance = state.instance();
    let patients = instance.patients.len();
    if patients == 0 || instance.days == 0 || instance.rooms.is_empty() || instance.theaters.is_empty() {
        return None;
    }
    match rng.gen_range(0..3) {
        0 => {
            let patient = rng.gen_range(0..patients);
            if !instance.patients[patient].mandatory && rng.gen::<f64>() < config.remove_probability {
                state.slot(patient)?;
                return Some(Move::remove_assignment(state, patient));
            }
            let slot = random_slot(state, patient, rng);
            if state.slot(patient) == Some(slot) {
                return None;
            }
            Some(Move::set_assignment(state, patient, slot))
        }
        1 => {
            if patients < 2 {
                return None;
            }
            let a = rng.gen_range(0..patients);
            let b = rng.gen_range(0..patients);
            if a == b || state.slot(a) == state.slot(b) {
                return None;
            }
            Some(Move::swap_assignments(state, a, b))
        }
        _ => {
            let nurses = instance.nurses.len();
            if nurses < 2 || instance.shifts() == 0 {
                return None;
            }
            let shift = rng.gen_range(0..instance.shifts());
            let nurse_a = rng.gen_range(0..nurses);
            let nurse_b = rng.gen_range(0..nurses);
            if nurse_a == nurse_b || !instance.nurses[nurse_a].works(shift) || !instance.nurses[nurse_b].works(shift) {
                return None;
            }
            let room_a = state.coverage().rooms(nurse_a, shift).choose(rng).copied();
            let room_b = state.coverage().rooms(nurse_b, shift).choose(rng).copied();
            Move::swap_nurse_coverage(state, nurse_a, nurse_b, shift, room_a, room_b)
        }
    }
}

pub fn run<'a, R: Rng>(
    mut state: SolutionState<'a>,
    deadline: &Deadline,
    config: &AnnealingConfig,
    rng: &mut R,
    telemetry: &mut Telemetry,
    checkpoint: &mut dyn Checkpoint,
) -> Result<SearchOutcome<'a>> {
    let log_every = config.log_every.max(1);
    let mut schedule = Schedule::new(config);

    state.refresh();
    let mut history = Vec::new();
    let mut best: Option<SolutionState<'a>> = None;
    if state.is_feasible() {
        history.push(BestRecord {
            iteration: 0,
            elapsed_ms: deadline.elapsed_ms(),
            unscheduled_mandatory: 0,
            hard_violations: 0,
            soft_cost: state.soft_cost,
        });
        checkpoint.persist(&state)?;
        best = Some(state.clone());
    } else {
        debug!(hard = state.hard_violations, "annealing starts from an infeasible state");
    }

    let mut iteration = 0;
    while !deadline.expired() {
        iteration += 1;

        if let Some(mv) = pick_move(&state, config, rng) {
            let (old_hard, old_soft) = (state.hard_violations, state.soft_cost);
            let applied = mv.apply(&mut state);
            state.refresh();

            if state.is_feasible() && schedule.accepts(state.soft_cost - old_soft, rng) {
                applied.commit();
                if best.as_ref().map_or(true, |b| state.soft_cost < b.soft_cost) {
                    history.push(BestRecord {
                        iteration,
                        elapsed_ms: deadline.elapsed_ms(),
                        unscheduled_mandatory: 0,
                        hard_violations: 0,
                        soft_cost: state.soft_cost,
                    });
                    checkpoint.persist(&state)?;
                    info!(
                        iteration,
                        soft = state.soft_cost,
                        temperature = schedule.temperature(),
                        "annealing found a better solution"
                    );
                    best = Some(state.clone());
                }
            } else {
                applied.undo(&mut state);
                state.hard_violations = old_hard;
                state.soft_cost = old_soft;
            }
        }

        if iteration % log_every == 0 {
            telemetry.record(&AnnealingRow {
                iteration,
                elapsed_ms: deadline.elapsed_ms(),
                current_cost: state.soft_cost,
                best_cost: best.as_ref().map(|b| b.soft_cost),
                temperature: schedule.temperature(),
            })?;
        }
        schedule.cool();
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
    use crate::evaluator::evaluate;
    use crate::fixtures;
    use crate::search::NoCheckpoint;
    use crate::state::load_initial_state;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::fs;
    use std::time::Duration;

    #[test]
    fn cooling_stops_at_floor() {
        let config = AnnealingConfig {
            initial_temperature: 10.0,
            final_temperature: 1.0,
            alpha: 0.5,
            ..AnnealingConfig::default()
        };
        let mut schedule = Schedule::new(&config);
        for _ in 0..10 {
            schedule.cool();
        }
        assert_eq!(schedule.temperature(), 1.0);
    }

    #[test]
    fn improvements_are_always_accepted() {
        let schedule = Schedule::new(&AnnealingConfig::default());
        let mut rng = StdRng::seed_from_u64(0);
        assert!((0..100).all(|_| schedule.accepts(-1.0, &mut rng)));
        let cold = Schedule::new(&AnnealingConfig {
            initial_temperature: 1e-9,
            final_temperature: 1e-9,
            ..AnnealingConfig::default()
        });
        assert!((0..100).all(|_| !cold.accepts(1000.0, &mut rng)));
    }

    #[test]
    fn picked_nurse_swaps_use_working_nurses() {
        let instance = fixtures::small_instance(3);
        let state = load_initial_state(
            &instance,
            Assignment::unassigned(instance.patients.len()),
            NurseCoverage::round_robin(&instance),
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let config = AnnealingConfig::default();
        for _ in 0..500 {
            if let Some(Move::SwapNurseCoverage {
                nurse_a, nurse_b, shift, ..
            }) = pick_move(&state, &config, &mut rng)
            {
                assert_ne!(nurse_a, nurse_b);
                assert!(instance.nurses[nurse_a].works(shift));
                assert!(instance.nurses[nurse_b].works(shift));
            }
        }
    }

    #[test]
    fn best_stays_feasible() {
        let instance = fixtures::pair_instance();
        let state = load_initial_state(&instance, Assignment::unassigned(2), NurseCoverage::round_robin(&instance)).unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sa.csv");
        let mut telemetry = Telemetry::to_path(&path).unwrap();
        let config = AnnealingConfig {
            log_every: 10,
            ..AnnealingConfig::default()
        };
        let outcome = run(
            state,
            &Deadline::after(Duration::from_millis(100)),
            &config,
            &mut rng,
            &mut telemetry,
            &mut NoCheckpoint,
        )
        .unwrap();
        drop(telemetry);

        assert_eq!(evaluate(&outcome.best).hard(), 0);
        for pair in outcome.history.windows(2) {
            assert!(pair[1].soft_cost <= pair[0].soft_cost);
        }
        if outcome.iterations >= 10 {
            let text = fs::read_to_string(&path).unwrap();
            assert!(text.starts_with("iteration,elapsed_ms,current_cost,best_cost,temperature"));
        }
    }
}
