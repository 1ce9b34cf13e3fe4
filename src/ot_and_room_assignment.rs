use std::cmp::Reverse;

use itertools::Itertools;
use rand::Rng;
use tracing::{debug, info};

use crate::assignment::{Assignment, NurseCoverage, Slot};
use crate::builder::{Gender, Instance};
use crate::error::Result;
use crate::evaluator::violations;
use crate::state::{load_initial_state, stay_days, SolutionState};
use crate::surgery_assignment::lp_relax_day_assign_per_surgeon;

/// Largest item into the largest bin with room left, first fit.
///
/// Items and bins are `(index, size)`. Returns the item indices packed into
/// each bin (by bin index) and the items that fit nowhere.
pub fn biggest_in_biggest_bin_pack(
    items: &mut [(usize, u32)],
    bins: &mut [(usize, u32)],
) -> (Vec<Vec<usize>>, Vec<usize>) {
    let num_bins = bins.iter().map(|b| b.0 + 1).max().unwrap_or(0);
    let mut bin_assignment: Vec<Vec<usize>> = vec![vec![]; num_bins];
    let mut unpacked = Vec::new();

    items.sort_by_key(|item| Reverse(item.1));
    bins.sort_by_key(|bin| Reverse(bin.1));

    for item in items.iter() {
        match bins.iter_mut().find(|bin| item.1 <= bin.1) {
            Some(bin) => {
                bin_assignment[bin.0].push(item.0);
                bin.1 -= item.1;
            }
            None => unpacked.push(item.0),
        }
    }
    (bin_assignment, unpacked)
}

/// Beds and genders per room-day while rooms are handed out.
struct RoomLedger {
    free: Vec<Vec<usize>>,
    gender: Vec<Vec<Option<Gender>>>,
}

impl RoomLedger {
    fn new(instance: &Instance) -> RoomLedger {
        let mut free = instance
            .rooms
            .iter()
            .map(|room| vec![room.capacity; instance.days])
            .collect_vec();
        let mut gender = vec![vec![None; instance.days]; instance.rooms.len()];
        for occupant in &instance.occupants {
            for day in stay_days(0, occupant.care.length_of_stay, instance.days) {
                free[occupant.room][day] = free[occupant.room][day].saturating_sub(1);
                gender[occupant.room][day] = Some(occupant.care.gender);
            }
        }
        RoomLedger { free, gender }
    }

    fn fits(&self, room: usize, days: std::ops::Range<usize>, gender: Gender) -> bool {
        days.into_iter()
            .all(|day| self.free[room][day] > 0 && self.gender[room][day].map_or(true, |g| g == gender))
    }

    fn admit(&mut self, room: usize, days: std::ops::Range<usize>, gender: Gender) {
        for day in days {
            self.free[room][day] -= 1;
            self.gender[room][day] = Some(gender);
        }
    }
}

/// Builds a first candidate plan from scratch.
///
/// Days come from the per-surgeon LP, theaters from bin packing each day's
/// surgeries, rooms by first fit without gender clashes or overfull rooms,
/// and nurse coverage round robin. Patients that do not fit at some stage
/// stay unscheduled; the plan may still violate hard rules.
pub fn build_initial_state<'a, R: Rng>(instance: &'a Instance, rng: &mut R) -> Result<SolutionState<'a>> {
    let num_patients = instance.patients.len();
    let mut day_of = vec![None; num_patients];
    for surgeon_idx in 0..instance.surgeons.len() {
        let per_day = lp_relax_day_assign_per_surgeon(instance, surgeon_idx, rng)?;
        for (day, queue) in per_day.iter().enumerate().take(instance.days) {
            for &patient_idx in queue {
                day_of[patient_idx] = Some(day);
            }
        }
    }

    let mut theater_of = vec![None; num_patients];
    for day in 0..instance.days {
        let mut items = (0..num_patients)
            .filter(|&p| day_of[p] == Some(day))
            .map(|p| (p, instance.patients[p].surgery_duration))
            .collect_vec();
        let mut bins = instance
            .theaters
            .iter()
            .enumerate()
            .map(|(idx, theater)| (idx, theater.availability[day]))
            .collect_vec();
        let (packed, unpacked) = biggest_in_biggest_bin_pack(&mut items, &mut bins);
        for (theater_idx, patients) in packed.into_iter().enumerate() {
            for patient_idx in patients {
                theater_of[patient_idx] = Some(theater_idx);
            }
        }
        if !unpacked.is_empty() {
            debug!(day, dropped = unpacked.len(), "surgeries left without a theater");
        }
    }

    let mut ledger = RoomLedger::new(instance);
    let mut assignment = Assignment::unassigned(num_patients);
    let order = (0..num_patients)
        .filter_map(|p| Some((p, day_of[p]?, theater_of[p]?)))
        .sorted_by_key(|&(p, day, _)| {
            let patient = &instance.patients[p];
            (!patient.mandatory, day, Reverse(patient.care.length_of_stay))
        })
        .collect_vec();
    for (patient_idx, day, theater_idx) in order {
        let patient = &instance.patients[patient_idx];
        let stay = stay_days(day, patient.care.length_of_stay, instance.days);
        let room = (0..instance.rooms.len())
            .find(|&room| patient.is_compatible(room) && ledger.fits(room, stay.clone(), patient.care.gender));
        match room {
            Some(room_idx) => {
                ledger.admit(room_idx, stay, patient.care.gender);
                assignment.set(patient_idx, Some(Slot::new(day, room_idx, theater_idx)));
            }
            None => debug!(patient = %patient.id, day, "no room for patient"),
        }
    }

    let state = load_initial_state(instance, assignment, NurseCoverage::round_robin(instance))?;
    let counts = violations(&state);
    info!(
        scheduled = state.assignment().scheduled().count(),
        unscheduled_mandatory = counts.unscheduled_mandatory,
        hard = state.hard_violations,
        soft = state.soft_cost,
        "initial plan built"
    );
    Ok(state)
}
