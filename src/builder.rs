use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Minutes per time unit stored in instance files.
pub const TIME_SCALE: u32 = 60;

// File shape of an instance. Converted into `Instance` by `Instance::from_file`.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct InstanceFile {
    pub days: usize,
    pub skill_levels: u32,
    pub shift_types: Vec<String>,
    pub age_groups: Vec<String>,
    pub weights: Weights,
    #[serde(default)]
    pub occupants: Vec<OccupantRecord>,
    pub patients: Vec<PatientRecord>,
    pub surgeons: Vec<SurgeonRecord>,
    pub operating_theaters: Vec<TheaterRecord>,
    pub rooms: Vec<RoomRecord>,
    pub nurses: Vec<NurseRecord>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Weights {
    pub room_mixed_age: f64,
    pub room_nurse_skill: f64,
    pub continuity_of_care: f64,
    pub nurse_eccessive_workload: f64,
    pub open_operating_theater: f64,
    pub surgeon_transfer: f64,
    pub patient_delay: f64,
    pub unscheduled_optional: f64,
}

impl Weights {
    pub fn as_array(&self) -> [f64; 8] {
        [
            self.room_mixed_age,
            self.room_nurse_skill,
            self.continuity_of_care,
            self.nurse_eccessive_workload,
            self.open_operating_theater,
            self.surgeon_transfer,
            self.patient_delay,
            self.unscheduled_optional,
        ]
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gender {
    A,
    B,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct OccupantRecord {
    pub id: String,
    pub gender: Gender,
    pub age_group: String,
    pub length_of_stay: usize,
    pub workload_produced: Vec<u32>,
    pub skill_level_required: Vec<u32>,
    pub room_id: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct PatientRecord {
    pub id: String,
    pub mandatory: bool,
    pub gender: Gender,
    pub age_group: String,
    pub length_of_stay: usize,
    pub surgery_release_day: usize,
    #[serde(default)]
    pub surgery_due_day: Option<usize>,
    pub surgery_duration: u32,
    pub surgeon_id: String,
    #[serde(default)]
    pub incompatible_room_ids: Option<Vec<String>>,
    pub workload_produced: Vec<u32>,
    pub skill_level_required: Vec<u32>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct SurgeonRecord {
    pub id: String,
    pub max_surgery_time: Vec<u32>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct TheaterRecord {
    pub id: String,
    pub availability: Vec<u32>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct RoomRecord {
    pub id: String,
    pub capacity: usize,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct NurseRecord {
    pub id: String,
    pub skill_level: u32,
    pub working_shifts: Vec<WorkingShiftRecord>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct WorkingShiftRecord {
    pub day: usize,
    pub shift: String,
    pub max_load: u32,
}

/// Per-shift care needs shared by patients and occupants.
///
/// `workload` and `skill_required` are indexed by the shift relative to the
/// admission day, so they hold `length_of_stay * shifts_per_day` entries.
#[derive(Debug, Clone, PartialEq)]
pub struct CareProfile {
    pub gender: Gender,
    pub age_group: usize,
    pub length_of_stay: usize,
    pub workload: Vec<u32>,
    pub skill_required: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Patient {
    pub id: String,
    pub mandatory: bool,
    pub release_day: usize,
    pub due_day: Option<usize>,
    // due day for mandatory patients, last horizon day otherwise
    pub last_day: usize,
    pub surgeon: usize,
    pub surgery_duration: u32,
    pub incompatible_rooms: Vec<bool>,
    pub care: CareProfile,
}

impl Patient {
    pub fn is_compatible(&self, room: usize) -> bool {
        !self.incompatible_rooms[room]
    }

    pub fn in_window(&self, day: usize) -> bool {
        day >= self.release_day && day <= self.last_day
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Occupant {
    pub id: String,
    pub room: usize,
    pub care: CareProfile,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Surgeon {
    pub id: String,
    pub max_surgery_time: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Theater {
    pub id: String,
    pub availability: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    pub id: String,
    pub capacity: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Nurse {
    pub id: String,
    pub skill_level: u32,
    pub working: Vec<bool>,
    pub max_load: Vec<u32>,
}

impl Nurse {
    pub fn works(&self, shift: usize) -> bool {
        self.working[shift]
    }
}

/// Immutable problem data with id lookups.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub days: usize,
    pub skill_levels: u32,
    pub shift_types: Vec<String>,
    pub age_groups: Vec<String>,
    pub weights: Weights,
    pub occupants: Vec<Occupant>,
    pub patients: Vec<Patient>,
    pub surgeons: Vec<Surgeon>,
    pub theaters: Vec<Theater>,
    pub rooms: Vec<Room>,
    pub nurses: Vec<Nurse>,
    patient_index: HashMap<String, usize>,
    room_index: HashMap<String, usize>,
    theater_index: HashMap<String, usize>,
    nurse_index: HashMap<String, usize>,
}

fn index_ids<'a>(
    kind: &'static str,
    ids: impl Iterator<Item = &'a String>,
) -> Result<HashMap<String, usize>> {
    let mut index = HashMap::new();
    for (idx, id) in ids.enumerate() {
        if index.insert(id.clone(), idx).is_some() {
            return Err(Error::DuplicateEntry {
                kind,
                id: id.clone(),
            });
        }
    }
    Ok(index)
}

fn lookup(index: &HashMap<String, usize>, kind: &'static str, id: &str) -> Result<usize> {
    index.get(id).copied().ok_or_else(|| Error::UnknownId {
        kind,
        id: id.to_string(),
    })
}

fn check_len(what: String, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(Error::LengthMismatch {
            what,
            expected,
            found,
        });
    }
    Ok(())
}

fn scaled(values: &[u32]) -> Vec<u32> {
    values.iter().map(|v| v * TIME_SCALE).collect()
}

impl Instance {
    pub fn from_file(file: InstanceFile) -> Result<Instance> {
        let spd = file.shift_types.len();
        let days = file.days;
        let shifts = days * spd;

        let age_index = index_ids("age group", file.age_groups.iter())?;
        let shift_index = index_ids("shift type", file.shift_types.iter())?;
        let room_index = index_ids("room", file.rooms.iter().map(|r| &r.id))?;
        let surgeon_index = index_ids("surgeon", file.surgeons.iter().map(|s| &s.id))?;
        let theater_index = index_ids("theater", file.operating_theaters.iter().map(|t| &t.id))?;
        let patient_index = index_ids("patient", file.patients.iter().map(|p| &p.id))?;
        let nurse_index = index_ids("nurse", file.nurses.iter().map(|n| &n.id))?;
        index_ids("occupant", file.occupants.iter().map(|o| &o.id))?;

        let care = |id: &str,
                    gender: Gender,
                    age_group: &str,
                    length_of_stay: usize,
                    workload: &[u32],
                    skill: &[u32]|
         -> Result<CareProfile> {
            let expected = length_of_stay * spd;
            check_len(format!("workload_produced of {}", id), expected, workload.len())?;
            check_len(format!("skill_level_required of {}", id), expected, skill.len())?;
            Ok(CareProfile {
                gender,
                age_group: lookup(&age_index, "age group", age_group)?,
                length_of_stay,
                workload: scaled(workload),
                skill_required: skill.to_vec(),
            })
        };

        let surgeons = file
            .surgeons
            .iter()
            .map(|s| {
                check_len(format!("max_surgery_time of {}", s.id), days, s.max_surgery_time.len())?;
                Ok(Surgeon {
                    id: s.id.clone(),
                    max_surgery_time: scaled(&s.max_surgery_time),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let theaters = file
            .operating_theaters
            .iter()
            .map(|t| {
                check_len(format!("availability of {}", t.id), days, t.availability.len())?;
                Ok(Theater {
                    id: t.id.clone(),
                    availability: scaled(&t.availability),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let rooms = file
            .rooms
            .iter()
            .map(|r| Room {
                id: r.id.clone(),
                capacity: r.capacity,
            })
            .collect::<Vec<_>>();

        let occupants = file
            .occupants
            .iter()
            .map(|o| {
                Ok(Occupant {
                    id: o.id.clone(),
                    room: lookup(&room_index, "room", &o.room_id)?,
                    care: care(
                        &o.id,
                        o.gender,
                        &o.age_group,
                        o.length_of_stay,
                        &o.workload_produced,
                        &o.skill_level_required,
                    )?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let patients = file
            .patients
            .iter()
            .map(|p| {
                let due_day = if p.mandatory {
                    Some(p.surgery_due_day.ok_or_else(|| {
                        Error::MissingField(format!("surgery_due_day of mandatory patient {}", p.id))
                    })?)
                } else {
                    None
                };
                let mut incompatible_rooms = vec![false; rooms.len()];
                for room_id in p.incompatible_room_ids.iter().flatten() {
                    incompatible_rooms[lookup(&room_index, "room", room_id)?] = true;
                }
                Ok(Patient {
                    id: p.id.clone(),
                    mandatory: p.mandatory,
                    release_day: p.surgery_release_day,
                    due_day,
                    last_day: due_day.unwrap_or(days.saturating_sub(1)),
                    surgeon: lookup(&surgeon_index, "surgeon", &p.surgeon_id)?,
                    surgery_duration: p.surgery_duration * TIME_SCALE,
                    incompatible_rooms,
                    care: care(
                        &p.id,
                        p.gender,
                        &p.age_group,
                        p.length_of_stay,
                        &p.workload_produced,
                        &p.skill_level_required,
                    )?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let nurses = file
            .nurses
            .iter()
            .map(|n| {
                let mut working = vec![false; shifts];
                let mut max_load = vec![0; shifts];
                for ws in &n.working_shifts {
                    if ws.day >= days {
                        return Err(Error::OutOfHorizon {
                            what: format!("working shift of nurse {}", n.id),
                            day: ws.day,
                            days,
                        });
                    }
                    let s = ws.day * spd + lookup(&shift_index, "shift type", &ws.shift)?;
                    working[s] = true;
                    max_load[s] = ws.max_load * TIME_SCALE;
                }
                Ok(Nurse {
                    id: n.id.clone(),
                    skill_level: n.skill_level,
                    working,
                    max_load,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Instance {
            days,
            skill_levels: file.skill_levels,
            shift_types: file.shift_types,
            age_groups: file.age_groups,
            weights: file.weights,
            occupants,
            patients,
            surgeons,
            theaters,
            rooms,
            nurses,
            patient_index,
            room_index,
            theater_index,
            nurse_index,
        })
    }

    pub fn shifts_per_day(&self) -> usize {
        self.shift_types.len()
    }

    pub fn shifts(&self) -> usize {
        self.days * self.shifts_per_day()
    }

    pub fn shift_day(&self, shift: usize) -> usize {
        shift / self.shifts_per_day()
    }

    pub fn patient_idx(&self, id: &str) -> Result<usize> {
        lookup(&self.patient_index, "patient", id)
    }

    pub fn room_idx(&self, id: &str) -> Result<usize> {
        lookup(&self.room_index, "room", id)
    }

    pub fn theater_idx(&self, id: &str) -> Result<usize> {
        lookup(&self.theater_index, "theater", id)
    }

    pub fn nurse_idx(&self, id: &str) -> Result<usize> {
        lookup(&self.nurse_index, "nurse", id)
    }

    pub fn shift_type_idx(&self, name: &str) -> Result<usize> {
        self.shift_types
            .iter()
            .position(|s| s == name)
            .ok_or_else(|| Error::UnknownId {
                kind: "shift type",
                id: name.to_string(),
            })
    }
}

pub fn deserialize(data: &str) -> Result<Instance> {
    let file: InstanceFile = serde_json::from_str(data)?;
    Instance::from_file(file)
}

pub fn instance_build(path: impl AsRef<Path>) -> Result<Instance> {
    let data = fs::read_to_string(path)?;
    deserialize(&data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn check_deserialize() {
        let result = deserialize(fixtures::TINY);
        let Ok(instance) = result else {
            panic!("{}", result.err().unwrap());
        };
        assert_eq!(instance.days, 1);
        assert_eq!(instance.shifts_per_day(), 3);
        assert_eq!(instance.rooms.len(), 2);
        assert_eq!(instance.patients.len(), 1);
        assert_eq!(instance.nurses[0].working, vec![true, true, true]);
    }

    #[test]
    fn durations_are_scaled_on_load() {
        let instance = deserialize(fixtures::TINY).unwrap();
        let patient = &instance.patients[0];
        assert_eq!(patient.surgery_duration, 2 * TIME_SCALE);
        assert_eq!(patient.care.workload, vec![TIME_SCALE, TIME_SCALE, 0]);
        assert_eq!(instance.surgeons[0].max_surgery_time, vec![8 * TIME_SCALE]);
        assert_eq!(instance.theaters[0].availability, vec![10 * TIME_SCALE]);
        assert_eq!(instance.nurses[0].max_load, vec![10 * TIME_SCALE; 3]);
    }

    #[test]
    fn check_windows_and_lookups() {
        let instance = fixtures::small_instance(7);
        for patient in &instance.patients {
            if patient.mandatory {
                assert_eq!(Some(patient.last_day), patient.due_day);
            } else {
                assert_eq!(patient.last_day, instance.days - 1);
            }
        }
        assert_eq!(instance.room_idx("r1").unwrap(), 1);
        assert!(matches!(
            instance.nurse_idx("nobody"),
            Err(Error::UnknownId { kind: "nurse", .. })
        ));
    }

    #[test]
    fn unknown_room_is_rejected() {
        let data = fixtures::TINY.replace(r#""incompatible_room_ids": []"#, r#""incompatible_room_ids": ["r9"]"#);
        let result = deserialize(&data);
        let Err(Error::UnknownId { kind, id }) = result else {
            panic!("expected unknown id, got {:?}", result);
        };
        assert_eq!(kind, "room");
        assert_eq!(id, "r9");
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let data = fixtures::TINY.replace(r#""workload_produced": [1, 1, 0]"#, r#""workload_produced": [1, 1]"#);
        let result = deserialize(&data);
        let Err(Error::LengthMismatch { expected, found, .. }) = result else {
            panic!("expected length mismatch, got {:?}", result);
        };
        assert_eq!((expected, found), (3, 2));
    }

    #[test]
    fn mandatory_without_due_day_is_rejected() {
        let data = fixtures::TINY.replace(r#""surgery_due_day": 0,"#, "");
        assert!(matches!(deserialize(&data), Err(Error::MissingField(_))));
    }

    #[test]
    fn check_weights_order() {
        let instance = deserialize(fixtures::TINY).unwrap();
        let w = instance.weights.as_array();
        assert_eq!(w[0], instance.weights.room_mixed_age);
        assert_eq!(w[3], instance.weights.nurse_eccessive_workload);
        assert_eq!(w[7], instance.weights.unscheduled_optional);
    }
}
