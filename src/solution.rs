use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::assignment::{Assignment, NurseCoverage, Slot};
use crate::builder::Instance;
use crate::error::{Error, Result};
use crate::state::{load_initial_state, SolutionState};

/// File shape of a solution.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SolutionFile {
    pub patients: Vec<PatientEntry>,
    pub nurses: Vec<NurseEntry>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PatientEntry {
    pub id: String,
    #[serde(with = "admission_day")]
    pub admission_day: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operating_theater: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NurseEntry {
    pub id: String,
    pub assignments: Vec<ShiftEntry>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ShiftEntry {
    pub day: usize,
    pub shift: String,
    pub rooms: Vec<String>,
}

// `admission_day` is either a day number or the string "none".
mod admission_day {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Day(usize),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &Option<usize>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(day) => serializer.serialize_u64(*day as u64),
            None => serializer.serialize_str("none"),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<usize>, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Day(day) => Ok(Some(day)),
            Raw::Text(text) if text == "none" => Ok(None),
            Raw::Text(text) => Err(D::Error::custom(format!("invalid admission_day `{}`", text))),
        }
    }
}

impl SolutionFile {
    /// Patients and nurses in instance order; shifts with no rooms are left out.
    pub fn from_state(state: &SolutionState) -> SolutionFile {
        let instance = state.instance();
        let patients = instance
            .patients
            .iter()
            .enumerate()
            .map(|(p, patient)| {
                let slot = state.slot(p);
                PatientEntry {
                    id: patient.id.clone(),
                    admission_day: slot.map(|s| s.day),
                    room: slot.map(|s| instance.rooms[s.room].id.clone()),
                    operating_theater: slot.map(|s| instance.theaters[s.theater].id.clone()),
                }
            })
            .collect();

        let spd = instance.shifts_per_day();
        let nurses = instance
            .nurses
            .iter()
            .enumerate()
            .map(|(n, nurse)| NurseEntry {
                id: nurse.id.clone(),
                assignments: (0..instance.shifts())
                    .filter(|&s| !state.coverage().rooms(n, s).is_empty())
                    .map(|s| ShiftEntry {
                        day: s / spd,
                        shift: instance.shift_types[s % spd].clone(),
                        rooms: state
                            .coverage()
                            .rooms(n, s)
                            .iter()
                            .map(|&r| instance.rooms[r].id.clone())
                            .collect(),
                    })
                    .collect(),
            })
            .collect();

        SolutionFile { patients, nurses }
    }

    /// Resolves ids against the instance. Patients not listed stay unscheduled.
    pub fn to_assignment(&self, instance: &Instance) -> Result<(Assignment, NurseCoverage)> {
        let mut assignment = Assignment::unassigned(instance.patients.len());
        let mut seen = HashSet::new();
        for entry in &self.patients {
            let p = instance.patient_idx(&entry.id)?;
            if !seen.insert(p) {
                return Err(Error::DuplicateEntry {
                    kind: "patient",
                    id: entry.id.clone(),
                });
            }
            let Some(day) = entry.admission_day else {
                continue;
            };
            let room = entry
                .room
                .as_deref()
                .ok_or_else(|| Error::MissingField(format!("room of patient {}", entry.id)))?;
            let theater = entry
                .operating_theater
                .as_deref()
                .ok_or_else(|| Error::MissingField(format!("operating_theater of patient {}", entry.id)))?;
            assignment.set(
                p,
                Some(Slot::new(day, instance.room_idx(room)?, instance.theater_idx(theater)?)),
            );
        }

        let spd = instance.shifts_per_day();
        let mut coverage = NurseCoverage::empty(instance.nurses.len(), instance.shifts());
        for entry in &self.nurses {
            let n = instance.nurse_idx(&entry.id)?;
            for shift in &entry.assignments {
                if shift.day >= instance.days {
                    return Err(Error::OutOfHorizon {
                        what: format!("assignment of nurse {}", entry.id),
                        day: shift.day,
                        days: instance.days,
                    });
                }
                let s = shift.day * spd + instance.shift_type_idx(&shift.shift)?;
                for room in &shift.rooms {
                    coverage.assign(n, s, instance.room_idx(room)?);
                }
            }
        }
        Ok((assignment, coverage))
    }

    pub fn to_state<'a>(&self, instance: &'a Instance) -> Result<SolutionState<'a>> {
        let (assignment, coverage) = self.to_assignment(instance)?;
        load_initial_state(instance, assignment, coverage)
    }

    pub fn read(path: impl AsRef<Path>) -> Result<SolutionFile> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::evaluate;
    use crate::fixtures;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn check_admission_day_forms() {
        let data = r#"{
            "patients": [
                { "id": "p0", "admission_day": 0, "room": "r1", "operating_theater": "t0" },
                { "id": "p1", "admission_day": "none" }
            ],
            "nurses": [
                { "id": "n0", "assignments": [{ "day": 0, "shift": "late", "rooms": ["r1"] }] }
            ]
        }"#;
        let file: SolutionFile = serde_json::from_str(data).unwrap();
        assert_eq!(file.patients[0].admission_day, Some(0));
        assert_eq!(file.patients[1].admission_day, None);

        let text = serde_json::to_string(&file.patients[1]).unwrap();
        assert_eq!(text, r#"{"id":"p1","admission_day":"none"}"#);

        let bad = r#"{ "id": "p1", "admission_day": "later" }"#;
        assert!(serde_json::from_str::<PatientEntry>(bad).is_err());
    }

    #[test]
    fn unknown_patient_is_rejected() {
        let instance = fixtures::tiny_instance();
        let file = SolutionFile {
            patients: vec![PatientEntry {
                id: "ghost".into(),
                admission_day: None,
                room: None,
                operating_theater: None,
            }],
            nurses: vec![],
        };
        let result = file.to_state(&instance);
        assert!(matches!(result, Err(Error::UnknownId { kind: "patient", .. })));
    }

    #[test]
    fn duplicate_patient_is_rejected() {
        let instance = fixtures::tiny_instance();
        let entry = PatientEntry {
            id: "p0".into(),
            admission_day: None,
            room: None,
            operating_theater: None,
        };
        let file = SolutionFile {
            patients: vec![entry.clone(), entry],
            nurses: vec![],
        };
        assert!(matches!(file.to_state(&instance), Err(Error::DuplicateEntry { .. })));
    }

    #[test]
    fn round_trip_through_file_preserves_evaluation() {
        let instance = fixtures::small_instance(21);
        let mut rng = StdRng::seed_from_u64(21);
        let mut assignment = Assignment::unassigned(instance.patients.len());
        for p in 0..instance.patients.len() {
            if rng.gen_bool(0.8) {
                assignment.set(
                    p,
                    Some(Slot::new(
                        rng.gen_range(0..instance.days),
                        rng.gen_range(0..instance.rooms.len()),
                        rng.gen_range(0..instance.theaters.len()),
                    )),
                );
            }
        }
        let state = load_initial_state(&instance, assignment, NurseCoverage::round_robin(&instance)).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("solution.json");
        SolutionFile::from_state(&state).write(&path).unwrap();
        let reloaded = SolutionFile::read(&path).unwrap().to_state(&instance).unwrap();

        assert_eq!(reloaded.assignment(), state.assignment());
        assert_eq!(reloaded.hard_violations, state.hard_violations);
        assert_eq!(reloaded.soft_cost, state.soft_cost);
        assert_eq!(evaluate(&reloaded), evaluate(&state));
    }
}
