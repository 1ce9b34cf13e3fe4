//! Progressive-acceptance iterated local search.
//!
//! Drives the patient-side hard violations to zero, ranking states by the
//! pair (unscheduled mandatory, patient-side total). A probability `p` picks
//! between a guided neighbourhood aimed at a violation present in the current
//! state and a light random perturbation. `p` drifts towards 1 and is reset
//! when it saturates or when the search reverts to its best state.

use std::cmp::Reverse;
use std::collections::BTreeSet;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};

use crate::assignment::Slot;
use crate::builder::{Gender, Instance};
use crate::config::PailsConfig;
use crate::error::Result;
use crate::evaluator::{violations, Violations};
use crate::moves::Move;
use crate::search::domain::Domain;
use crate::search::{BestRecord, Checkpoint, Deadline, SearchOutcome};
use crate::state::{care_profile, Resident, SolutionState};
use crate::telemetry::{LogStatus, Telemetry, ViolationRow};

/// Best state so far and the counts it is ranked by.
struct Incumbent<'a> {
    state: SolutionState<'a>,
    violations: Violations,
}

impl<'a> Incumbent<'a> {
    fn new(state: &SolutionState<'a>, violations: Violations) -> Incumbent<'a> {
        let mut state = state.clone();
        state.refresh();
        Incumbent { state, violations }
    }

    fn key(&self) -> (u64, u64) {
        self.violations.key()
    }

    fn record(&self, iteration: u64, deadline: &Deadline) -> BestRecord {
        BestRecord {
            iteration,
            elapsed_ms: deadline.elapsed_ms(),
            unscheduled_mandatory: self.violations.unscheduled_mandatory,
            hard_violations: self.violations.patient_side(),
            soft_cost: self.state.soft_cost,
        }
    }
}

/// The progressive acceptance control.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Progression {
    decrement: f64,
    p: f64,
}

impl Progression {
    fn new(config: &PailsConfig) -> Progression {
        let mut progression = Progression { decrement: 0.0, p: 0.0 };
        progression.reset(config);
        progression
    }

    fn advance(&mut self, config: &PailsConfig) {
        self.decrement *= config.decay_factor;
        self.p = 1.0 - self.decrement;
    }

    fn reset(&mut self, config: &PailsConfig) {
        self.decrement = config.initial_decrement;
        self.advance(config);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Neighbourhood {
    Repair,
    Kick,
    KickOut,
    Gender,
    Capacity,
    Admission,
    Compatibility,
    SurgeonOvertime,
    TheaterOvertime,
    Swap,
}

fn residents_patients(residents: &[Resident]) -> impl Iterator<Item = usize> + '_ {
    residents.iter().filter_map(|r| match r {
        Resident::Patient(p) => Some(*p),
        Resident::Occupant(_) => None,
    })
}

fn is_mixed(instance: &Instance, residents: &[Resident]) -> bool {
    let mut genders = residents.iter().map(|&r| care_profile(instance, r).gender);
    let Some(first) = genders.next() else {
        return false;
    };
    genders.any(|g: Gender| g != first)
}

fn breaks_window(state: &SolutionState, patient: usize) -> bool {
    let p = &state.instance().patients[patient];
    p.mandatory && state.slot(patient).map_or(false, |slot| !p.in_window(slot.day))
}

struct Search<'c, 'a, R> {
    current: SolutionState<'a>,
    domain: Domain,
    config: &'c PailsConfig,
    progression: Progression,
    rng: &'c mut R,
}

impl<'c, 'a, R: Rng> Search<'c, 'a, R> {
    fn instance(&self) -> &'a Instance {
        self.current.instance()
    }

    fn guided(&mut self) -> bool {
        self.rng.gen::<f64>() < self.progression.p
    }

    fn score(&self) -> u64 {
        violations(&self.current).patient_side()
    }

    fn edit(&self, patient: usize, slot: Option<Slot>) -> Move {
        match slot {
            Some(slot) => Move::set_assignment(&self.current, patient, slot),
            None => Move::remove_assignment(&self.current, patient),
        }
    }

    fn place(&mut self, patient: usize, slot: Option<Slot>) {
        self.edit(patient, slot).apply(&mut self.current).commit();
    }

    /// Violations the state would have with `patient` at `slot`.
    fn probe(&mut self, patient: usize, slot: Option<Slot>) -> Violations {
        let applied = self.edit(patient, slot).apply(&mut self.current);
        let outcome = violations(&self.current);
        applied.undo(&mut self.current);
        outcome
    }

    fn scheduled(&self) -> Vec<usize> {
        self.current.assignment().scheduled().map(|(p, _)| p).collect()
    }

    /// Unscheduled mandatory patients, most constrained first.
    fn unscheduled_mandatory(&self) -> Vec<usize> {
        let instance = self.instance();
        let mut pending = (0..instance.patients.len())
            .filter(|&p| instance.patients[p].mandatory && self.current.slot(p).is_none())
            .collect::<Vec<_>>();
        pending.sort_by_key(|&p| {
            let patient = &instance.patients[p];
            (
                self.domain.size(p),
                patient.last_day.saturating_sub(patient.release_day),
                Reverse(patient.care.length_of_stay),
            )
        });
        pending
    }

    /// Places `patient` in the best sampled slot of its domain.
    ///
    /// The first samples walk the day by room grid, the rest are random.
    /// Ranked by patient-side total, then the room-level counts, then day.
    fn schedule_best_slot(&mut self, patient: usize) {
        if !self.domain.is_schedulable(patient) {
            return;
        }
        let days = self.domain.days(patient).to_vec();
        let rooms = self.domain.rooms(patient).to_vec();
        let theaters = self.domain.theaters(patient).to_vec();
        let grid = days.len() * rooms.len();
        let deterministic = grid.min(self.config.deterministic_span);
        let samples = self.config.max_samples.min(grid * theaters.len());

        let mut best: Option<((u64, u64, usize), Slot)> = None;
        for i in 0..samples {
            let (day, room) = if i < deterministic {
                (days[i / rooms.len() % days.len()], rooms[i % rooms.len()])
            } else {
                (
                    days[self.rng.gen_range(0..days.len())],
                    rooms[self.rng.gen_range(0..rooms.len())],
                )
            };
            let theater = theaters[self.rng.gen_range(0..theaters.len())];
            let slot = Slot::new(day, room, theater);
            let v = self.probe(patient, Some(slot));
            let score = (v.patient_side(), v.composite(), day);
            if best.map_or(true, |(b, _)| score < b) {
                best = Some((score, slot));
            }
        }
        match best {
            Some((_, slot)) => self.place(patient, Some(slot)),
            None => self.place(patient, None),
        }
    }

    fn repair(&mut self) {
        let pending = self.unscheduled_mandatory();
        if pending.is_empty() {
            return;
        }
        let target = if self.guided() {
            pending[0]
        } else {
            pending[self.rng.gen_range(0..pending.len())]
        };
        self.schedule_best_slot(target);
    }

    /// Gives an unscheduled mandatory patient the slot of a scheduled one
    /// inside its window, preferring an optional victim.
    fn kick(&mut self) {
        let instance = self.instance();
        let Some(&target) = self.unscheduled_mandatory().choose(&mut *self.rng) else {
            return;
        };
        let window = &instance.patients[target];
        let candidates = self
            .current
            .assignment()
            .scheduled()
            .filter(|(_, slot)| window.in_window(slot.day))
            .map(|(p, _)| p)
            .collect::<Vec<_>>();
        let Some(&victim) = candidates
            .iter()
            .find(|&&p| !instance.patients[p].mandatory)
            .or_else(|| candidates.first())
        else {
            return;
        };
        let slot = self.current.slot(victim);
        self.place(target, slot);
        if instance.patients[victim].mandatory {
            self.schedule_best_slot(victim);
        } else {
            self.place(victim, None);
        }
    }

    fn kick_out(&mut self) {
        let instance = self.instance();
        let Some(&target) = self.unscheduled_mandatory().choose(&mut *self.rng) else {
            return;
        };
        let window = &instance.patients[target];
        let optionals = self
            .current
            .assignment()
            .scheduled()
            .filter(|&(p, slot)| !instance.patients[p].mandatory && window.in_window(slot.day))
            .map(|(p, _)| p)
            .collect::<Vec<_>>();
        let Some(&victim) = optionals.choose(&mut *self.rng) else {
            self.kick();
            return;
        };
        let slot = self.current.slot(victim);
        self.place(target, slot);
        self.place(victim, None);
    }

    /// Moves `patient` to the domain room that lowers the score the most.
    fn move_to_best_room(&mut self, patient: usize, start: u64) -> bool {
        let Some(slot) = self.current.slot(patient) else {
            return false;
        };
        let mut best: Option<(u64, Slot)> = None;
        for room in self.domain.rooms(patient).to_vec() {
            if room == slot.room {
                continue;
            }
            let candidate = Slot { room, ..slot };
            let score = self.probe(patient, Some(candidate)).patient_side();
            if score < best.map_or(start, |(b, _)| b) {
                best = Some((score, candidate));
            }
        }
        match best {
            Some((_, candidate)) => {
                self.place(patient, Some(candidate));
                true
            }
            None => false,
        }
    }

    fn fix_gender(&mut self) {
        let instance = self.instance();
        let spots = (0..instance.rooms.len())
            .flat_map(|room| (0..instance.days).map(move |day| (room, day)))
            .filter(|&(room, day)| is_mixed(instance, self.current.occupancy(room, day)))
            .collect::<Vec<_>>();
        let Some(&(room, day)) = spots.choose(&mut *self.rng) else {
            return;
        };
        let mut conflict = residents_patients(self.current.occupancy(room, day)).collect::<Vec<_>>();
        if conflict.is_empty() {
            return;
        }
        conflict.sort_by_key(|&p| instance.patients[p].mandatory);
        let start = self.score();

        // another room, same days
        let mut best: Option<(u64, usize, Slot)> = None;
        for &p in &conflict {
            let Some(slot) = self.current.slot(p) else {
                continue;
            };
            for room in self.domain.rooms(p).to_vec() {
                if room == slot.room {
                    continue;
                }
                let candidate = Slot { room, ..slot };
                let score = self.probe(p, Some(candidate)).patient_side();
                if score < best.map_or(start, |(b, _, _)| b) {
                    best = Some((score, p, candidate));
                }
            }
        }
        if let Some((_, p, candidate)) = best {
            self.place(p, Some(candidate));
            return;
        }

        // same room, another day
        for &p in &conflict {
            let Some(slot) = self.current.slot(p) else {
                continue;
            };
            for day in self.domain.days(p).to_vec() {
                if day == slot.day {
                    continue;
                }
                let candidate = Slot { day, ..slot };
                if self.probe(p, Some(candidate)).patient_side() < start {
                    self.place(p, Some(candidate));
                    return;
                }
            }
        }

        let loosest = conflict
            .iter()
            .copied()
            .find(|&p| !instance.patients[p].mandatory)
            .or_else(|| conflict.iter().copied().max_by_key(|&p| self.domain.days(p).len()));
        if let Some(p) = loosest {
            self.schedule_best_slot(p);
            if self.score() < start {
                return;
            }
        }

        if let Some(&p) = conflict.iter().find(|&&p| !instance.patients[p].mandatory) {
            self.place(p, None);
        }
    }

    fn fix_capacity(&mut self) {
        let instance = self.instance();
        let mut crowded = Vec::new();
        for (room, r) in instance.rooms.iter().enumerate() {
            for day in 0..instance.days {
                let residents = self.current.occupancy(room, day);
                if residents.len() > r.capacity {
                    crowded.extend(residents_patients(residents));
                }
            }
        }
        let optional = crowded
            .iter()
            .copied()
            .filter(|&p| !instance.patients[p].mandatory)
            .collect::<Vec<_>>();
        let pool = if optional.is_empty() { &crowded } else { &optional };
        let Some(&p) = pool.choose(&mut *self.rng) else {
            return;
        };

        let start = self.score();
        if self.move_to_best_room(p, start) {
            return;
        }
        let Some(slot) = self.current.slot(p) else {
            return;
        };
        let days = self
            .domain
            .days(p)
            .iter()
            .copied()
            .filter(|&d| d != slot.day)
            .collect::<Vec<_>>();
        if let Some(&day) = days.choose(&mut *self.rng) {
            let candidate = Slot { day, ..slot };
            if self.probe(p, Some(candidate)).patient_side() < start {
                self.place(p, Some(candidate));
                return;
            }
        }
        if !instance.patients[p].mandatory {
            self.place(p, None);
        }
    }

    fn fix_admission(&mut self) {
        let instance = self.instance();
        let scheduled = self.current.assignment().scheduled().collect::<Vec<_>>();
        for (p, slot) in scheduled {
            let patient = &instance.patients[p];
            if patient.in_window(slot.day) {
                continue;
            }
            if let Some(&day) = self.domain.days(p).choose(&mut *self.rng) {
                self.place(p, Some(Slot { day, ..slot }));
                return;
            }
            if !patient.mandatory {
                self.place(p, None);
                return;
            }
        }
    }

    fn fix_compatibility(&mut self) {
        let instance = self.instance();
        let scheduled = self.current.assignment().scheduled().collect::<Vec<_>>();
        for (p, slot) in scheduled {
            let patient = &instance.patients[p];
            if patient.is_compatible(slot.room) {
                continue;
            }
            if let Some(&room) = self.domain.rooms(p).choose(&mut *self.rng) {
                self.place(p, Some(Slot { room, ..slot }));
                return;
            }
            if !patient.mandatory {
                self.place(p, None);
                return;
            }
        }
    }

    fn fix_surgeon_overtime(&mut self) {
        let instance = self.instance();
        let overloads = (0..instance.surgeons.len())
            .flat_map(|s| (0..instance.days).map(move |d| (s, d)))
            .filter(|&(s, d)| self.current.surgeon_load(s, d) > instance.surgeons[s].max_surgery_time[d])
            .collect::<Vec<_>>();
        let Some(&(surgeon, day)) = overloads.choose(&mut *self.rng) else {
            return;
        };
        let candidates = self
            .current
            .assignment()
            .scheduled()
            .filter(|&(p, slot)| slot.day == day && instance.patients[p].surgeon == surgeon)
            .collect::<Vec<_>>();
        let Some(&(p, slot)) = candidates.choose(&mut *self.rng) else {
            return;
        };
        let days = self
            .domain
            .days(p)
            .iter()
            .copied()
            .filter(|&d| d != day)
            .collect::<Vec<_>>();
        match days.choose(&mut *self.rng) {
            Some(&day) => self.place(p, Some(Slot { day, ..slot })),
            None => self.drop_optional(p, &candidates),
        }
    }

    fn fix_theater_overtime(&mut self) {
        let instance = self.instance();
        let overloads = (0..instance.theaters.len())
            .flat_map(|t| (0..instance.days).map(move |d| (t, d)))
            .filter(|&(t, d)| self.current.theater_load(t, d) > instance.theaters[t].availability[d])
            .collect::<Vec<_>>();
        let Some(&(theater, day)) = overloads.choose(&mut *self.rng) else {
            return;
        };
        let candidates = self
            .current
            .assignment()
            .scheduled()
            .filter(|&(_, slot)| slot.day == day && slot.theater == theater)
            .collect::<Vec<_>>();
        let Some(&(p, slot)) = candidates.choose(&mut *self.rng) else {
            return;
        };
        let duration = instance.patients[p].surgery_duration;
        let theaters = self
            .domain
            .theaters(p)
            .iter()
            .copied()
            .filter(|&t| t != theater && instance.theaters[t].availability[day] >= duration)
            .collect::<Vec<_>>();
        if let Some(&theater) = theaters.choose(&mut *self.rng) {
            self.place(p, Some(Slot { theater, ..slot }));
            return;
        }
        let days = self
            .domain
            .days(p)
            .iter()
            .copied()
            .filter(|&d| d != day)
            .collect::<Vec<_>>();
        match days.choose(&mut *self.rng) {
            Some(&day) => self.place(p, Some(Slot { day, ..slot })),
            None => self.drop_optional(p, &candidates),
        }
    }

    /// Unschedules `patient` if optional, otherwise another optional
    /// contributor to the same overload.
    fn drop_optional(&mut self, patient: usize, contributors: &[(usize, Slot)]) {
        let instance = self.instance();
        let victim = if instance.patients[patient].mandatory {
            let optional = contributors
                .iter()
                .map(|&(p, _)| p)
                .filter(|&p| !instance.patients[p].mandatory)
                .collect::<Vec<_>>();
            optional.choose(&mut *self.rng).copied()
        } else {
            Some(patient)
        };
        if let Some(victim) = victim {
            self.place(victim, None);
        }
    }

    /// Swaps two scheduled patients unless a mandatory one leaves its window.
    fn swap(&mut self) {
        let scheduled = self.scheduled();
        if scheduled.len() < 2 {
            return;
        }
        let pair = scheduled.choose_multiple(&mut *self.rng, 2).copied().collect::<Vec<_>>();
        let applied = Move::swap_assignments(&self.current, pair[0], pair[1]).apply(&mut self.current);
        if breaks_window(&self.current, pair[0]) || breaks_window(&self.current, pair[1]) {
            applied.undo(&mut self.current);
        } else {
            applied.commit();
        }
    }

    /// Redraws the day, room or theater of one scheduled patient.
    fn shuffle(&mut self) {
        let Some(&p) = self.scheduled().choose(&mut *self.rng) else {
            return;
        };
        let Some(slot) = self.current.slot(p) else {
            return;
        };
        let candidate = match self.rng.gen_range(0..3) {
            0 => self.domain.days(p).choose(&mut *self.rng).map(|&day| Slot { day, ..slot }),
            1 => self.domain.rooms(p).choose(&mut *self.rng).map(|&room| Slot { room, ..slot }),
            _ => self
                .domain
                .theaters(p)
                .choose(&mut *self.rng)
                .map(|&theater| Slot { theater, ..slot }),
        };
        if let Some(candidate) = candidate {
            self.place(p, Some(candidate));
        }
    }

    fn perturb_randomly(&mut self) {
        if self.rng.gen_bool(0.5) {
            self.swap();
        } else {
            self.shuffle();
        }
    }

    /// Unschedules every optional patient involved in a room-level violation.
    fn purge(&mut self) -> usize {
        let instance = self.instance();
        let misplaced = self
            .current
            .assignment()
            .scheduled()
            .filter(|&(p, slot)| {
                let patient = &instance.patients[p];
                !patient.mandatory && (!patient.in_window(slot.day) || !patient.is_compatible(slot.room))
            })
            .map(|(p, _)| p)
            .collect::<Vec<_>>();
        for &p in &misplaced {
            self.place(p, None);
        }

        let mut crowded = BTreeSet::new();
        for (room, r) in instance.rooms.iter().enumerate() {
            for day in 0..instance.days {
                let residents = self.current.occupancy(room, day);
                if residents.len() > r.capacity || is_mixed(instance, residents) {
                    crowded.extend(residents_patients(residents).filter(|&p| !instance.patients[p].mandatory));
                }
            }
        }
        for &p in &crowded {
            self.place(p, None);
        }
        misplaced.len() + crowded.len()
    }

    fn explore(&mut self, neighbourhood: Neighbourhood) {
        match neighbourhood {
            Neighbourhood::Repair => self.repair(),
            Neighbourhood::Kick => self.kick(),
            Neighbourhood::KickOut => self.kick_out(),
            Neighbourhood::Gender => self.fix_gender(),
            Neighbourhood::Capacity => self.fix_capacity(),
            Neighbourhood::Admission => self.fix_admission(),
            Neighbourhood::Compatibility => self.fix_compatibility(),
            Neighbourhood::SurgeonOvertime => self.fix_surgeon_overtime(),
            Neighbourhood::TheaterOvertime => self.fix_theater_overtime(),
            Neighbourhood::Swap => self.swap(),
        }
    }

    /// Schedules the missing mandatory patients.
    fn phase_one(&mut self) {
        if self.guided() {
            let neighbourhood = match self.rng.gen_range(0..10) {
                0..=5 => Neighbourhood::Repair,
                6..=8 => Neighbourhood::KickOut,
                _ => Neighbourhood::Kick,
            };
            self.explore(neighbourhood);
        } else {
            self.perturb_randomly();
        }
        for p in self.unscheduled_mandatory() {
            self.schedule_best_slot(p);
        }
    }

    /// Works on the remaining violations once every mandatory patient is in.
    fn phase_two(&mut self, now: &Violations) {
        if self.guided() {
            let weighted = [
                (now.gender_mix, Neighbourhood::Gender, 2),
                (now.room_capacity, Neighbourhood::Capacity, 2),
                (now.admission_day, Neighbourhood::Admission, 2),
                (now.room_compatibility, Neighbourhood::Compatibility, 1),
                (now.surgeon_overtime, Neighbourhood::SurgeonOvertime, 2),
                (now.theater_overtime, Neighbourhood::TheaterOvertime, 2),
                (1, Neighbourhood::Swap, 1),
            ];
            let pool = weighted
                .iter()
                .filter(|(count, _, _)| *count > 0)
                .flat_map(|&(_, n, weight)| std::iter::repeat(n).take(weight))
                .collect::<Vec<_>>();
            if let Some(&neighbourhood) = pool.choose(&mut *self.rng) {
                self.explore(neighbourhood);
            }
        } else {
            self.perturb_randomly();
        }
        if now.surgeon_overtime > 0 {
            self.fix_surgeon_overtime();
        }
        if now.theater_overtime > 0 {
            self.fix_theater_overtime();
        }
        if now.room_capacity > 0 {
            self.fix_capacity();
        }
        if now.gender_mix > 0 {
            self.fix_gender();
        }
    }
}

pub fn run<'a, R: Rng>(
    state: SolutionState<'a>,
    deadline: &Deadline,
    config: &PailsConfig,
    rng: &mut R,
    telemetry: &mut Telemetry,
    checkpoint: &mut dyn Checkpoint,
) -> Result<SearchOutcome<'a>> {
    let domain = Domain::new(state.instance());
    let start = violations(&state);
    let mut best = Incumbent::new(&state, start);
    let mut search = Search {
        current: state,
        domain,
        config,
        progression: Progression::new(config),
        rng,
    };
    let update_every = config.update_every.max(1);
    let log_every = config.log_every.max(1);

    info!(
        unscheduled_mandatory = start.unscheduled_mandatory,
        violations = start.patient_side(),
        "PA-ILS starting"
    );
    let mut log = vec![ViolationRow {
        iteration: 0,
        elapsed_ms: 0,
        violations: start.patient_side(),
        status: LogStatus::Initial,
    }];
    let mut history = vec![best.record(0, deadline)];

    let mut iteration = 0;
    let mut no_progress = 0;
    let mut improved_since_log = false;
    while best.key() != (0, 0) {
        if deadline.expired() {
            info!(iteration, violations = best.violations.patient_side(), "PA-ILS out of time");
            log.push(ViolationRow {
                iteration,
                elapsed_ms: deadline.elapsed_ms(),
                violations: best.violations.patient_side(),
                status: LogStatus::Timeout,
            });
            break;
        }

        let now = violations(&search.current);
        if now.unscheduled_mandatory > 0 {
            search.phase_one();
        } else {
            search.phase_two(&now);
        }
        if iteration % update_every == 0 {
            search.progression.advance(config);
        }

        let after = violations(&search.current);
        if after.key() < best.key() {
            best = Incumbent::new(&search.current, after);
            no_progress = 0;
            improved_since_log = true;
            history.push(best.record(iteration + 1, deadline));
            checkpoint.persist(&best.state)?;
            info!(
                iteration,
                unscheduled_mandatory = after.unscheduled_mandatory,
                violations = after.patient_side(),
                "PA-ILS improved"
            );
        } else {
            no_progress += 1;

            let stuck_with_all_mandatory = best.violations.unscheduled_mandatory == 0;
            if no_progress > config.purge_after && stuck_with_all_mandatory && best.violations.patient_side() > 0 {
                let purged = search.purge();
                let purged_violations = violations(&search.current);
                debug!(iteration, purged, violations = purged_violations.patient_side(), "purged optional patients");
                if purged_violations.key() < best.key() {
                    best = Incumbent::new(&search.current, purged_violations);
                    no_progress = 0;
                    improved_since_log = true;
                    history.push(best.record(iteration + 1, deadline));
                    checkpoint.persist(&best.state)?;
                }
            }
            if no_progress > config.max_no_progress
                && stuck_with_all_mandatory
                && best.violations.patient_side() > config.revert_threshold
            {
                debug!(iteration, "reverting to best");
                search.current = best.state.clone();
                no_progress = 0;
                search.progression.reset(config);
            }
        }

        if iteration % log_every == 0 {
            let status = if best.key() == (0, 0) {
                LogStatus::Optimal
            } else if improved_since_log {
                LogStatus::Better
            } else {
                LogStatus::NoImprovement
            };
            log.push(ViolationRow {
                iteration: iteration + 1,
                elapsed_ms: deadline.elapsed_ms(),
                violations: after.patient_side(),
                status,
            });
            improved_since_log = false;
        }

        iteration += 1;
        if search.progression.p > config.saturation {
            search.progression.reset(config);
        }
    }

    log.push(ViolationRow {
        iteration,
        elapsed_ms: deadline.elapsed_ms(),
        violations: best.violations.patient_side(),
        status: LogStatus::Final,
    });
    for row in &log {
        telemetry.record(row)?;
    }
    telemetry.flush()?;

    info!(
        iterations = iteration,
        unscheduled_mandatory = best.violations.unscheduled_mandatory,
        violations = best.violations.patient_side(),
        "PA-ILS finished"
    );
    Ok(SearchOutcome {
        best: best.state,
        iterations: iteration,
        history,
    })
}
