use std::collections::HashSet;
use std::fmt;

use itertools::Itertools;
use tracing::debug;

use crate::builder::{CareProfile, Gender, Instance};
use crate::error::{Error, Result};
use crate::evaluator::{CostComponents, Violations};
use crate::solution::SolutionFile;

/// Independent certification of a solution file.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub violations: Violations,
    pub components: CostComponents,
    weights: [f64; 8],
}

const HARD_NAMES: [&str; 9] = [
    "Unscheduled mandatory",
    "Room capacity",
    "Room gender mix",
    "Patient room compatibility",
    "Surgeon overtime",
    "Operating theater overtime",
    "Admission day",
    "Nurse presence",
    "Uncovered room",
];

const SOFT_NAMES: [&str; 8] = [
    "Age groups mix",
    "Minimum skill level",
    "Continuity of care",
    "Excessive nurse workload",
    "Open operating theater",
    "Surgeon transfer",
    "Patient delay",
    "Unscheduled optional",
];

impl Report {
    pub fn total_violations(&self) -> u64 {
        self.violations.total()
    }

    pub fn total_cost(&self) -> f64 {
        self.components
            .as_array()
            .iter()
            .zip(self.weights)
            .map(|(&c, w)| c as f64 * w)
            .sum()
    }

    fn hard_array(&self) -> [u64; 9] {
        let v = &self.violations;
        [
            v.unscheduled_mandatory,
            v.room_capacity,
            v.gender_mix,
            v.room_compatibility,
            v.surgeon_overtime,
            v.theater_overtime,
            v.admission_day,
            v.nurse_presence,
            v.uncovered_room,
        ]
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "VIOLATIONS:")?;
        for (name, count) in HARD_NAMES.iter().zip(self.hard_array()) {
            writeln!(f, "{:.<30}{}", format!("{}:", name), count)?;
        }
        writeln!(f, "Total violations = {}", self.total_violations())?;
        writeln!(f)?;
        writeln!(f, "COSTS (weight x cost):")?;
        for ((name, count), weight) in SOFT_NAMES.iter().zip(self.components.as_array()).zip(self.weights) {
            writeln!(
                f,
                "{:.<30}{} ({} x {})",
                format!("{}:", name),
                count as f64 * weight,
                weight,
                count
            )?;
        }
        write!(f, "Total cost = {}", self.total_cost())
    }
}

struct Stay<'i> {
    care: &'i CareProfile,
    admission: usize,
}

impl Stay<'_> {
    fn at(&self, shift: usize, spd: usize) -> Option<(u32, u32)> {
        let rel = shift.checked_sub(self.admission * spd)?;
        Some((*self.care.workload.get(rel)?, *self.care.skill_required.get(rel)?))
    }
}

/// Re-derives every count from the file's ids without going through `SolutionState`.
pub fn validate(instance: &Instance, solution: &SolutionFile) -> Result<Report> {
    let days = instance.days;
    let spd = instance.shifts_per_day();
    let shifts = instance.shifts();
    let mut v = Violations::default();
    let mut c = CostComponents::default();

    // (patient, day, room, theater)
    let mut admitted = Vec::new();
    let mut listed = HashSet::new();
    for entry in &solution.patients {
        let p = instance.patient_idx(&entry.id)?;
        if !listed.insert(p) {
            return Err(Error::DuplicateEntry {
                kind: "patient",
                id: entry.id.clone(),
            });
        }
        if let Some(day) = entry.admission_day {
            if day >= days {
                return Err(Error::OutOfHorizon {
                    what: format!("admission of {}", entry.id),
                    day,
                    days,
                });
            }
            let room = entry
                .room
                .as_deref()
                .ok_or_else(|| Error::MissingField(format!("room of patient {}", entry.id)))?;
            let theater = entry
                .operating_theater
                .as_deref()
                .ok_or_else(|| Error::MissingField(format!("operating_theater of patient {}", entry.id)))?;
            let (room, theater) = (instance.room_idx(room)?, instance.theater_idx(theater)?);
            admitted.push((p, day, room, theater));
        }
    }
    let scheduled: HashSet<usize> = admitted.iter().map(|a| a.0).collect();

    for (p, patient) in instance.patients.iter().enumerate() {
        if scheduled.contains(&p) {
            continue;
        }
        if patient.mandatory {
            debug!(patient = %patient.id, "mandatory patient not admitted");
            v.unscheduled_mandatory += 1;
        } else {
            c.unscheduled_optional += 1;
        }
    }

    let mut rooms: Vec<Vec<Vec<Stay>>> = (0..instance.rooms.len()).map(|_| (0..days).map(|_| Vec::new()).collect()).collect();
    for occupant in &instance.occupants {
        for day in 0..occupant.care.length_of_stay.min(days) {
            rooms[occupant.room][day].push(Stay {
                care: &occupant.care,
                admission: 0,
            });
        }
    }

    let mut surgeon_time = vec![vec![0u32; days]; instance.surgeons.len()];
    let mut theater_time = vec![vec![0u32; days]; instance.theaters.len()];
    let mut surgeon_theaters = HashSet::new();
    for &(p, day, room, theater) in &admitted {
        let patient = &instance.patients[p];
        if !patient.in_window(day) {
            debug!(patient = %patient.id, day, "admission outside window");
            v.admission_day += 1;
        }
        if !patient.is_compatible(room) {
            debug!(patient = %patient.id, room = %instance.rooms[room].id, "incompatible room");
            v.room_compatibility += 1;
        }
        c.patient_delay += day.saturating_sub(patient.release_day) as u64;
        surgeon_time[patient.surgeon][day] += patient.surgery_duration;
        theater_time[theater][day] += patient.surgery_duration;
        surgeon_theaters.insert((patient.surgeon, day, theater));
        for d in day..(day + patient.care.length_of_stay).min(days) {
            rooms[room][d].push(Stay {
                care: &patient.care,
                admission: day,
            });
        }
    }

    for (s, surgeon) in instance.surgeons.iter().enumerate() {
        for day in 0..days {
            let over = surgeon_time[s][day].saturating_sub(surgeon.max_surgery_time[day]);
            if over > 0 {
                debug!(surgeon = %surgeon.id, day, over, "surgeon overtime");
            }
            v.surgeon_overtime += over as u64;
            let theaters = surgeon_theaters.iter().filter(|&&(x, d, _)| x == s && d == day).count();
            c.surgeon_transfer += theaters.saturating_sub(1) as u64;
        }
    }
    for (t, theater) in instance.theaters.iter().enumerate() {
        for day in 0..days {
            let used = theater_time[t][day];
            if used > 0 {
                c.open_theater += 1;
            }
            let over = used.saturating_sub(theater.availability[day]);
            if over > 0 {
                debug!(theater = %theater.id, day, over, "theater overtime");
            }
            v.theater_overtime += over as u64;
        }
    }

    for (r, room) in instance.rooms.iter().enumerate() {
        for (day, stays) in rooms[r].iter().enumerate() {
            if stays.len() > room.capacity {
                debug!(room = %room.id, day, occupants = stays.len(), "room over capacity");
                v.room_capacity += (stays.len() - room.capacity) as u64;
            }
            let a = stays.iter().filter(|s| s.care.gender == Gender::A).count();
            let b = stays.len() - a;
            if a > 0 && b > 0 {
                debug!(room = %room.id, day, "genders mixed");
                v.gender_mix += a.min(b) as u64;
            }
            if stays.len() > 1 {
                if let Some((lo, hi)) = stays.iter().map(|s| s.care.age_group).minmax().into_option() {
                    c.age_mix += (hi - lo) as u64;
                }
            }
        }
    }

    // room -> shift -> nurse; the later nurse in instance order wins
    let mut covering: Vec<Vec<Option<usize>>> = vec![vec![None; shifts]; instance.rooms.len()];
    let mut entries = Vec::new();
    for nurse in &solution.nurses {
        let n = instance.nurse_idx(&nurse.id)?;
        for assignment in &nurse.assignments {
            if assignment.day >= days {
                return Err(Error::OutOfHorizon {
                    what: format!("assignment of nurse {}", nurse.id),
                    day: assignment.day,
                    days,
                });
            }
            let s = assignment.day * spd + instance.shift_type_idx(&assignment.shift)?;
            for room in &assignment.rooms {
                entries.push((n, s, instance.room_idx(room)?));
            }
        }
    }
    entries.sort_by_key(|&(n, _, _)| n);
    for (n, s, r) in entries {
        covering[r][s] = Some(n);
    }

    let mut load = vec![vec![0u32; shifts]; instance.nurses.len()];
    for (r, room) in instance.rooms.iter().enumerate() {
        for s in 0..shifts {
            let stays = &rooms[r][s / spd];
            match covering[r][s] {
                None if !stays.is_empty() => {
                    debug!(room = %room.id, shift = s, "room without nurse");
                    v.uncovered_room += 1;
                }
                None => {}
                Some(n) => {
                    let nurse = &instance.nurses[n];
                    if !nurse.works(s) {
                        debug!(nurse = %nurse.id, shift = s, "nurse assigned off shift");
                        v.nurse_presence += 1;
                    }
                    for stay in stays {
                        if let Some((workload, skill)) = stay.at(s, spd) {
                            load[n][s] += workload;
                            c.skill_shortfall += skill.saturating_sub(nurse.skill_level) as u64;
                        }
                    }
                }
            }
        }
    }

    for (n, nurse) in instance.nurses.iter().enumerate() {
        for s in 0..shifts {
            c.excess_workload += load[n][s].saturating_sub(nurse.max_load[s]) as u64;
        }
    }

    let continuity = |room: usize, first: usize, last: usize| {
        (first * spd..last * spd)
            .filter_map(|s| covering[room][s])
            .collect::<HashSet<_>>()
            .len() as u64
    };
    for occupant in &instance.occupants {
        c.continuity += continuity(occupant.room, 0, occupant.care.length_of_stay.min(days));
    }
    for &(p, day, room, _) in &admitted {
        let end = (day + instance.patients[p].care.length_of_stay).min(days);
        c.continuity += continuity(room, day, end);
    }

    Ok(Report {
        violations: v,
        components: c,
        weights: instance.weights.as_array(),
    })
}
