use itertools::Itertools;
use serde::Serialize;

use crate::builder::{Gender, Instance, Weights};
use crate::state::{care_at, stay_days, Indices, Resident, SolutionState};

/// Hard-rule violation counts. Each count is additive, not a flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Violations {
    pub unscheduled_mandatory: u64,
    pub room_capacity: u64,
    pub gender_mix: u64,
    pub room_compatibility: u64,
    pub surgeon_overtime: u64,
    pub theater_overtime: u64,
    pub admission_day: u64,
    pub nurse_presence: u64,
    pub uncovered_room: u64,
}

impl Violations {
    pub fn total(&self) -> u64 {
        self.patient_side() + self.nurse_presence + self.uncovered_room
    }

    /// Counts that patient moves can change: everything but nurse coverage.
    pub fn patient_side(&self) -> u64 {
        self.unscheduled_mandatory
            + self.room_capacity
            + self.gender_mix
            + self.room_compatibility
            + self.surgeon_overtime
            + self.theater_overtime
            + self.admission_day
    }

    /// Room-level counts used to break ties between equally bad slots.
    pub fn composite(&self) -> u64 {
        self.gender_mix + self.room_capacity + self.admission_day + self.room_compatibility
    }

    /// Lexicographic objective: unscheduled mandatory first, then the rest.
    pub fn key(&self) -> (u64, u64) {
        (self.unscheduled_mandatory, self.patient_side())
    }
}

/// Unweighted soft-cost components, in weight order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CostComponents {
    pub age_mix: u64,
    pub skill_shortfall: u64,
    pub continuity: u64,
    pub excess_workload: u64,
    pub open_theater: u64,
    pub surgeon_transfer: u64,
    pub patient_delay: u64,
    pub unscheduled_optional: u64,
}

impl CostComponents {
    pub fn as_array(&self) -> [u64; 8] {
        [
            self.age_mix,
            self.skill_shortfall,
            self.continuity,
            self.excess_workload,
            self.open_theater,
            self.surgeon_transfer,
            self.patient_delay,
            self.unscheduled_optional,
        ]
    }

    pub fn weighted(&self, weights: &Weights) -> f64 {
        self.as_array()
            .iter()
            .zip(weights.as_array())
            .map(|(&c, w)| c as f64 * w)
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub violations: Violations,
    pub components: CostComponents,
    pub soft_cost: f64,
}

impl Evaluation {
    pub fn hard(&self) -> u64 {
        self.violations.total()
    }
}

/// Full evaluation from a fresh scan of the assignment and coverage.
///
/// Does not read the state's incremental indices.
pub fn evaluate(state: &SolutionState) -> Evaluation {
    let instance = state.instance();
    let fresh = Indices::scan(instance, state.assignment(), state.coverage());
    let violations = scan_violations(state, &fresh);
    let components = scan_costs(state, &fresh);
    Evaluation {
        violations,
        soft_cost: components.weighted(&instance.weights),
        components,
    }
}

/// Hard part of `evaluate` only.
pub fn violations(state: &SolutionState) -> Violations {
    let fresh = Indices::scan(state.instance(), state.assignment(), state.coverage());
    scan_violations(state, &fresh)
}

fn gender_count(instance: &Instance, residents: &[Resident]) -> (u64, u64) {
    residents.iter().fold((0, 0), |(a, b), &r| {
        let gender = match r {
            Resident::Occupant(o) => instance.occupants[o].care.gender,
            Resident::Patient(p) => instance.patients[p].care.gender,
        };
        match gender {
            Gender::A => (a + 1, b),
            Gender::B => (a, b + 1),
        }
    })
}

fn age_group(instance: &Instance, resident: Resident) -> usize {
    match resident {
        Resident::Occupant(o) => instance.occupants[o].care.age_group,
        Resident::Patient(p) => instance.patients[p].care.age_group,
    }
}

fn scan_violations(state: &SolutionState, fresh: &Indices) -> Violations {
    let instance = state.instance();
    let mut v = Violations::default();

    for (p, patient) in instance.patients.iter().enumerate() {
        match state.slot(p) {
            None => {
                if patient.mandatory {
                    v.unscheduled_mandatory += 1;
                }
            }
            Some(slot) => {
                if !patient.is_compatible(slot.room) {
                    v.room_compatibility += 1;
                }
                if !patient.in_window(slot.day) {
                    v.admission_day += 1;
                }
            }
        }
    }

    for (room, days) in fresh.room_day_occupancy.iter().enumerate() {
        for residents in days {
            let occupied = residents.len();
            v.room_capacity += occupied.saturating_sub(instance.rooms[room].capacity) as u64;
            let (a, b) = gender_count(instance, residents);
            v.gender_mix += a.min(b);
        }
    }

    for (surgeon, loads) in fresh.surgeon_day_load.iter().enumerate() {
        for (day, &load) in loads.iter().enumerate() {
            v.surgeon_overtime += load.saturating_sub(instance.surgeons[surgeon].max_surgery_time[day]) as u64;
        }
    }
    for (theater, loads) in fresh.theater_day_load.iter().enumerate() {
        for (day, &load) in loads.iter().enumerate() {
            v.theater_overtime += load.saturating_sub(instance.theaters[theater].availability[day]) as u64;
        }
    }

    for room in 0..instance.rooms.len() {
        for shift in 0..instance.shifts() {
            match fresh.room_shift_nurse[room][shift] {
                Some(nurse) => {
                    if !instance.nurses[nurse].works(shift) {
                        v.nurse_presence += 1;
                    }
                }
                None => {
                    if !fresh.room_day_occupancy[room][instance.shift_day(shift)].is_empty() {
                        v.uncovered_room += 1;
                    }
                }
            }
        }
    }
    v
}

fn scan_costs(state: &SolutionState, fresh: &Indices) -> CostComponents {
    let instance = state.instance();
    let assignment = state.assignment();
    let spd = instance.shifts_per_day();
    let mut c = CostComponents::default();

    for residents in fresh.room_day_occupancy.iter().flatten() {
        if residents.len() > 1 {
            if let Some((lo, hi)) = residents.iter().map(|&r| age_group(instance, r)).minmax().into_option() {
                c.age_mix += (hi - lo) as u64;
            }
        }
    }

    for room in 0..instance.rooms.len() {
        for shift in 0..instance.shifts() {
            let Some(nurse) = fresh.room_shift_nurse[room][shift] else {
                continue;
            };
            let skill = instance.nurses[nurse].skill_level;
            for &r in &fresh.room_day_occupancy[room][instance.shift_day(shift)] {
                if let Some((_, required)) = care_at(instance, assignment, r, shift) {
                    c.skill_shortfall += required.saturating_sub(skill) as u64;
                }
            }
        }
    }

    let distinct_nurses = |room: usize, shifts: std::ops::Range<usize>| {
        shifts
            .filter_map(|s| fresh.room_shift_nurse[room][s])
            .unique()
            .count() as u64
    };
    for occupant in &instance.occupants {
        let end = occupant.care.length_of_stay.min(instance.days) * spd;
        c.continuity += distinct_nurses(occupant.room, 0..end);
    }
    for (p, slot) in assignment.scheduled() {
        let days = stay_days(slot.day, instance.patients[p].care.length_of_stay, instance.days);
        c.continuity += distinct_nurses(slot.room, days.start * spd..days.end * spd);
    }

    for (nurse, loads) in fresh.nurse_shift_load.iter().enumerate() {
        for (shift, &load) in loads.iter().enumerate() {
            c.excess_workload += load.saturating_sub(instance.nurses[nurse].max_load[shift]) as u64;
        }
    }

    c.open_theater = fresh
        .theater_day_load
        .iter()
        .flatten()
        .filter(|&&load| load > 0)
        .count() as u64;

    // distinct (surgeon, day, theater) triples minus distinct (surgeon, day) pairs
    let used = assignment
        .scheduled()
        .map(|(p, slot)| (instance.patients[p].surgeon, slot.day, slot.theater))
        .sorted_unstable()
        .dedup()
        .collect_vec();
    let surgeon_days = used.iter().map(|&(s, d, _)| (s, d)).dedup().count();
    c.surgeon_transfer = (used.len() - surgeon_days) as u64;

    for (p, patient) in instance.patients.iter().enumerate() {
        match state.slot(p) {
            Some(slot) => c.patient_delay += slot.day.saturating_sub(patient.release_day) as u64,
            None if !patient.mandatory => c.unscheduled_optional += 1,
            None => {}
        }
    }
    c
}
