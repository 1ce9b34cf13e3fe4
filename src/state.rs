use tracing::warn;

use crate::assignment::{Assignment, NurseCoverage, Slot};
use crate::builder::{CareProfile, Instance};
use crate::error::{Error, Result};
use crate::evaluator::{evaluate, Evaluation};

/// Someone lying in a room on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Resident {
    Occupant(usize),
    Patient(usize),
}

/// Lookup tables derived from an assignment and a nurse coverage.
///
/// Every table must equal what `Indices::scan` produces for the same
/// assignment and coverage. Occupancy lists are kept sorted for that reason.
#[derive(Debug, Clone, PartialEq)]
pub struct Indices {
    pub room_day_occupancy: Vec<Vec<Vec<Resident>>>,
    pub nurse_shift_load: Vec<Vec<u32>>,
    pub room_shift_nurse: Vec<Vec<Option<usize>>>,
    pub surgeon_day_load: Vec<Vec<u32>>,
    pub theater_day_load: Vec<Vec<u32>>,
}

impl Indices {
    pub fn scan(instance: &Instance, assignment: &Assignment, coverage: &NurseCoverage) -> Indices {
        let days = instance.days;
        let shifts = instance.shifts();
        let mut room_day_occupancy = vec![vec![Vec::new(); days]; instance.rooms.len()];
        let mut surgeon_day_load = vec![vec![0; days]; instance.surgeons.len()];
        let mut theater_day_load = vec![vec![0; days]; instance.theaters.len()];

        for (o, occupant) in instance.occupants.iter().enumerate() {
            for day in 0..occupant.care.length_of_stay.min(days) {
                room_day_occupancy[occupant.room][day].push(Resident::Occupant(o));
            }
        }
        for (p, slot) in assignment.scheduled() {
            let patient = &instance.patients[p];
            surgeon_day_load[patient.surgeon][slot.day] += patient.surgery_duration;
            theater_day_load[slot.theater][slot.day] += patient.surgery_duration;
            for day in stay_days(slot.day, patient.care.length_of_stay, days) {
                room_day_occupancy[slot.room][day].push(Resident::Patient(p));
            }
        }
        room_day_occupancy
            .iter_mut()
            .flatten()
            .for_each(|residents| residents.sort_unstable());

        let mut room_shift_nurse = vec![vec![None; shifts]; instance.rooms.len()];
        for (nurse, shift, room) in coverage.entries() {
            room_shift_nurse[room][shift] = Some(nurse);
        }

        let mut nurse_shift_load = vec![vec![0; shifts]; instance.nurses.len()];
        for room in 0..instance.rooms.len() {
            for shift in 0..shifts {
                if let Some(nurse) = room_shift_nurse[room][shift] {
                    let day = instance.shift_day(shift);
                    nurse_shift_load[nurse][shift] += room_day_occupancy[room][day]
                        .iter()
                        .map(|&r| care_at(instance, assignment, r, shift).map_or(0, |(w, _)| w))
                        .sum::<u32>();
                }
            }
        }

        Indices {
            room_day_occupancy,
            nurse_shift_load,
            room_shift_nurse,
            surgeon_day_load,
            theater_day_load,
        }
    }
}

/// Days of a stay that fall inside the horizon.
pub fn stay_days(admission: usize, length_of_stay: usize, days: usize) -> std::ops::Range<usize> {
    admission..(admission + length_of_stay).min(days)
}

pub fn care_profile<'i>(instance: &'i Instance, resident: Resident) -> &'i CareProfile {
    match resident {
        Resident::Occupant(o) => &instance.occupants[o].care,
        Resident::Patient(p) => &instance.patients[p].care,
    }
}

/// Workload and required skill of a resident at a global shift, if present.
pub fn care_at(
    instance: &Instance,
    assignment: &Assignment,
    resident: Resident,
    shift: usize,
) -> Option<(u32, u32)> {
    let admission = match resident {
        Resident::Occupant(_) => 0,
        Resident::Patient(p) => assignment.get(p)?.day,
    };
    let rel = shift.checked_sub(admission * instance.shifts_per_day())?;
    let care = care_profile(instance, resident);
    Some((*care.workload.get(rel)?, *care.skill_required.get(rel)?))
}

/// Mutable assignment plus nurse coverage and the indices derived from them.
///
/// All mutation goes through `reassign` and `transfer_room`, which keep the
/// indices in step over the whole length of stay.
#[derive(Debug, Clone)]
pub struct SolutionState<'a> {
    instance: &'a Instance,
    assignment: Assignment,
    coverage: NurseCoverage,
    indices: Indices,
    pub hard_violations: u64,
    pub soft_cost: f64,
}

/// Builds a state from an external starting point and evaluates it.
///
/// Coverage that puts two nurses on one room-shift keeps the later nurse.
pub fn load_initial_state(
    instance: &Instance,
    assignment: Assignment,
    mut coverage: NurseCoverage,
) -> Result<SolutionState<'_>> {
    if assignment.len() != instance.patients.len() {
        return Err(Error::LengthMismatch {
            what: "assignment".into(),
            expected: instance.patients.len(),
            found: assignment.len(),
        });
    }
    if coverage.num_nurses() != instance.nurses.len() {
        return Err(Error::LengthMismatch {
            what: "nurse coverage".into(),
            expected: instance.nurses.len(),
            found: coverage.num_nurses(),
        });
    }
    if coverage.num_nurses() > 0 && coverage.num_shifts() != instance.shifts() {
        return Err(Error::LengthMismatch {
            what: "nurse coverage shifts".into(),
            expected: instance.shifts(),
            found: coverage.num_shifts(),
        });
    }
    for (p, slot) in assignment.scheduled() {
        check_slot(instance, p, slot)?;
    }
    for (nurse, _, room) in coverage.entries() {
        if room >= instance.rooms.len() {
            return Err(Error::UnknownId {
                kind: "room",
                id: format!("#{} covered by {}", room, instance.nurses[nurse].id),
            });
        }
    }

    let mut owner = vec![vec![None; instance.shifts()]; instance.rooms.len()];
    for (nurse, shift, room) in coverage.entries() {
        owner[room][shift] = Some(nurse);
    }
    let mut dropped = 0;
    for nurse in 0..instance.nurses.len() {
        for shift in 0..instance.shifts() {
            let rooms = coverage.rooms_mut(nurse, shift);
            let before = rooms.len();
            rooms.retain(|&room| owner[room][shift] == Some(nurse));
            dropped += before - rooms.len();
        }
    }
    if dropped > 0 {
        warn!(dropped, "room-shifts covered by several nurses; keeping the last nurse");
    }

    let indices = Indices::scan(instance, &assignment, &coverage);
    let mut state = SolutionState {
        instance,
        assignment,
        coverage,
        indices,
        hard_violations: 0,
        soft_cost: 0.0,
    };
    state.refresh();
    Ok(state)
}

fn check_slot(instance: &Instance, patient: usize, slot: Slot) -> Result<()> {
    let id = &instance.patients[patient].id;
    if slot.day >= instance.days {
        return Err(Error::OutOfHorizon {
            what: format!("admission of {}", id),
            day: slot.day,
            days: instance.days,
        });
    }
    if slot.room >= instance.rooms.len() {
        return Err(Error::UnknownId {
            kind: "room",
            id: format!("#{} for {}", slot.room, id),
        });
    }
    if slot.theater >= instance.theaters.len() {
        return Err(Error::UnknownId {
            kind: "theater",
            id: format!("#{} for {}", slot.theater, id),
        });
    }
    Ok(())
}

impl<'a> SolutionState<'a> {
    pub fn instance(&self) -> &'a Instance {
        self.instance
    }

    pub fn assignment(&self) -> &Assignment {
        &self.assignment
    }

    pub fn coverage(&self) -> &NurseCoverage {
        &self.coverage
    }

    pub fn indices(&self) -> &Indices {
        &self.indices
    }

    pub fn slot(&self, patient: usize) -> Option<Slot> {
        self.assignment.get(patient)
    }

    pub fn occupancy(&self, room: usize, day: usize) -> &[Resident] {
        &self.indices.room_day_occupancy[room][day]
    }

    pub fn nurse_load(&self, nurse: usize, shift: usize) -> u32 {
        self.indices.nurse_shift_load[nurse][shift]
    }

    pub fn room_nurse(&self, room: usize, shift: usize) -> Option<usize> {
        self.indices.room_shift_nurse[room][shift]
    }

    pub fn surgeon_load(&self, surgeon: usize, day: usize) -> u32 {
        self.indices.surgeon_day_load[surgeon][day]
    }

    pub fn theater_load(&self, theater: usize, day: usize) -> u32 {
        self.indices.theater_day_load[theater][day]
    }

    /// Full evaluation, cached into `hard_violations` and `soft_cost`.
    pub fn refresh(&mut self) -> Evaluation {
        let evaluation = evaluate(self);
        self.hard_violations = evaluation.violations.total();
        self.soft_cost = evaluation.soft_cost;
        evaluation
    }

    pub fn is_feasible(&self) -> bool {
        self.hard_violations == 0
    }

    /// True when the incremental indices match a fresh scan.
    pub fn check_indices(&self) -> bool {
        self.indices == Indices::scan(self.instance, &self.assignment, &self.coverage)
    }

    /// Moves a patient to `slot` (or unschedules it) and returns the old slot.
    pub(crate) fn reassign(&mut self, patient: usize, slot: Option<Slot>) -> Option<Slot> {
        let old = self.assignment.get(patient);
        if let Some(old) = old {
            self.place(patient, old, false);
        }
        self.assignment.set(patient, slot);
        if let Some(slot) = slot {
            self.place(patient, slot, true);
        }
        old
    }

    fn place(&mut self, patient: usize, slot: Slot, install: bool) {
        let instance = self.instance;
        let p = &instance.patients[patient];
        let spd = instance.shifts_per_day();
        let resident = Resident::Patient(patient);
        let indices = &mut self.indices;

        let apply = |value: &mut u32, delta: u32| {
            if install {
                *value += delta;
            } else {
                *value -= delta;
            }
        };
        apply(&mut indices.surgeon_day_load[p.surgeon][slot.day], p.surgery_duration);
        apply(&mut indices.theater_day_load[slot.theater][slot.day], p.surgery_duration);

        for day in stay_days(slot.day, p.care.length_of_stay, instance.days) {
            let residents = &mut indices.room_day_occupancy[slot.room][day];
            match residents.binary_search(&resident) {
                Ok(pos) if !install => {
                    residents.remove(pos);
                }
                Err(pos) if install => residents.insert(pos, resident),
                _ => {}
            }
            for k in 0..spd {
                let shift = day * spd + k;
                if let Some(nurse) = indices.room_shift_nurse[slot.room][shift] {
                    let workload = p.care.workload[shift - slot.day * spd];
                    apply(&mut indices.nurse_shift_load[nurse][shift], workload);
                }
            }
        }
    }

    /// Total workload in a room during a shift.
    pub fn room_workload(&self, room: usize, shift: usize) -> u32 {
        let day = self.instance.shift_day(shift);
        self.indices.room_day_occupancy[room][day]
            .iter()
            .map(|&r| care_at(self.instance, &self.assignment, r, shift).map_or(0, |(w, _)| w))
            .sum()
    }

    /// Hands `room` at `shift` from one nurse's index entry to another's.
    /// The coverage lists are edited by the caller.
    pub(crate) fn transfer_room(&mut self, room: usize, shift: usize, from: usize, to: usize) {
        let workload = self.room_workload(room, shift);
        self.indices.nurse_shift_load[from][shift] -= workload;
        self.indices.nurse_shift_load[to][shift] += workload;
        self.indices.room_shift_nurse[room][shift] = Some(to);
    }

    pub(crate) fn coverage_mut(&mut self) -> &mut NurseCoverage {
        &mut self.coverage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn check_initial_indices() {
        let instance = fixtures::tiny_instance();
        let mut assignment = Assignment::unassigned(1);
        assignment.set(0, Some(Slot::new(0, 0, 0)));
        let coverage = NurseCoverage::round_robin(&instance);
        let state = load_initial_state(&instance, assignment, coverage).unwrap();

        assert_eq!(state.occupancy(0, 0), &[Resident::Patient(0)]);
        assert!(state.occupancy(1, 0).is_empty());
        assert_eq!(state.surgeon_load(0, 0), 120);
        assert_eq!(state.theater_load(0, 0), 120);
        assert_eq!(state.room_nurse(0, 1), Some(0));
        assert_eq!(state.nurse_load(0, 0), 60);
        assert_eq!(state.nurse_load(0, 2), 0);
        assert!(state.check_indices());
    }

    #[test]
    fn out_of_horizon_admission_is_rejected() {
        let instance = fixtures::tiny_instance();
        let mut assignment = Assignment::unassigned(1);
        assignment.set(0, Some(Slot::new(3, 0, 0)));
        let coverage = NurseCoverage::empty(1, 3);
        let result = load_initial_state(&instance, assignment, coverage);
        assert!(matches!(result, Err(Error::OutOfHorizon { day: 3, .. })));
    }

    #[test]
    fn wrong_assignment_length_is_rejected() {
        let instance = fixtures::tiny_instance();
        let result = load_initial_state(&instance, Assignment::unassigned(4), NurseCoverage::empty(1, 3));
        assert!(matches!(result, Err(Error::LengthMismatch { expected: 1, found: 4, .. })));
    }

    #[test]
    fn double_coverage_keeps_later_nurse() {
        let instance = fixtures::small_instance(11);
        let mut coverage = NurseCoverage::empty(instance.nurses.len(), instance.shifts());
        coverage.assign(0, 0, 1);
        coverage.assign(2, 0, 1);
        let state = load_initial_state(&instance, Assignment::unassigned(instance.patients.len()), coverage).unwrap();
        assert!(!state.coverage().covers(0, 0, 1));
        assert!(state.coverage().covers(2, 0, 1));
        assert_eq!(state.room_nurse(1, 0), Some(2));
    }

    #[test]
    fn reassign_keeps_indices_consistent() {
        let instance = fixtures::small_instance(5);
        let coverage = NurseCoverage::round_robin(&instance);
        let mut state = load_initial_state(&instance, Assignment::unassigned(instance.patients.len()), coverage).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..200 {
            let patient = rng.gen_range(0..instance.patients.len());
            let slot = if rng.gen_bool(0.2) {
                None
            } else {
                Some(Slot::new(
                    rng.gen_range(0..instance.days),
                    rng.gen_range(0..instance.rooms.len()),
                    rng.gen_range(0..instance.theaters.len()),
                ))
            };
            state.reassign(patient, slot);
            assert!(state.check_indices());
        }
    }

    #[test]
    fn stay_is_clipped_to_horizon() {
        assert_eq!(stay_days(5, 4, 7), 5..7);
        assert_eq!(stay_days(0, 2, 7), 0..2);
    }
}
