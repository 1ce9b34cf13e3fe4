use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

use crate::builder::{deserialize, Instance};

// 2 rooms, 1 day, 1 mandatory patient, 1 nurse working every shift.
// Continuity and open-theater weights are zero so the trivial plan costs nothing.
pub(crate) const TINY: &str = r#"{
    "days": 1,
    "skill_levels": 3,
    "shift_types": ["early", "late", "night"],
    "age_groups": ["infant", "adult", "elderly"],
    "weights": {
        "room_mixed_age": 5,
        "room_nurse_skill": 1,
        "continuity_of_care": 0,
        "nurse_eccessive_workload": 10,
        "open_operating_theater": 0,
        "surgeon_transfer": 1,
        "patient_delay": 10,
        "unscheduled_optional": 300
    },
    "occupants": [],
    "patients": [
        {
            "id": "p0",
            "mandatory": true,
            "gender": "A",
            "age_group": "adult",
            "length_of_stay": 1,
            "surgery_release_day": 0,
            "surgery_due_day": 0,
            "surgery_duration": 2,
            "surgeon_id": "s0",
            "incompatible_room_ids": [],
            "workload_produced": [1, 1, 0],
            "skill_level_required": [1, 1, 0]
        }
    ],
    "surgeons": [{ "id": "s0", "max_surgery_time": [8] }],
    "operating_theaters": [{ "id": "t0", "availability": [10] }],
    "rooms": [{ "id": "r0", "capacity": 2 }, { "id": "r1", "capacity": 2 }],
    "nurses": [
        {
            "id": "n0",
            "skill_level": 2,
            "working_shifts": [
                { "day": 0, "shift": "early", "max_load": 10 },
                { "day": 0, "shift": "late", "max_load": 10 },
                { "day": 0, "shift": "night", "max_load": 10 }
            ]
        }
    ]
}"#;

pub(crate) fn tiny_instance() -> Instance {
    deserialize(TINY).unwrap()
}

fn patient_json(id: &str, gender: &str, mandatory: bool, due: Option<usize>, los: usize, spd: usize) -> Value {
    let mut patient = json!({
        "id": id,
        "mandatory": mandatory,
        "gender": gender,
        "age_group": "adult",
        "length_of_stay": los,
        "surgery_release_day": 0,
        "surgery_duration": 1,
        "surgeon_id": "s0",
        "incompatible_room_ids": [],
        "workload_produced": vec![1; los * spd],
        "skill_level_required": vec![1; los * spd]
    });
    if let Some(due) = due {
        patient["surgery_due_day"] = json!(due);
    }
    patient
}

// 1 day, 1 room of capacity 2, two optional patients of opposite gender.
pub(crate) fn pair_instance() -> Instance {
    let data = json!({
        "days": 1,
        "skill_levels": 3,
        "shift_types": ["early", "late", "night"],
        "age_groups": ["infant", "adult", "elderly"],
        "weights": {
            "room_mixed_age": 5, "room_nurse_skill": 1, "continuity_of_care": 1,
            "nurse_eccessive_workload": 10, "open_operating_theater": 30,
            "surgeon_transfer": 1, "patient_delay": 10, "unscheduled_optional": 300
        },
        "occupants": [],
        "patients": [
            patient_json("pa", "A", false, None, 1, 3),
            patient_json("pb", "B", false, None, 1, 3)
        ],
        "surgeons": [{ "id": "s0", "max_surgery_time": [8] }],
        "operating_theaters": [{ "id": "t0", "availability": [10] }],
        "rooms": [{ "id": "r0", "capacity": 2 }],
        "nurses": [{
            "id": "n0",
            "skill_level": 2,
            "working_shifts": [
                { "day": 0, "shift": "early", "max_load": 10 },
                { "day": 0, "shift": "late", "max_load": 10 },
                { "day": 0, "shift": "night", "max_load": 10 }
            ]
        }]
    });
    deserialize(&data.to_string()).unwrap()
}

// 2 days, 1 room of capacity 1, one mandatory patient due on day 0 whose
// surgeon never operates; no assignment can satisfy it.
pub(crate) fn hopeless_instance() -> Instance {
    let data = json!({
        "days": 2,
        "skill_levels": 3,
        "shift_types": ["early", "late", "night"],
        "age_groups": ["infant", "adult", "elderly"],
        "weights": {
            "room_mixed_age": 5, "room_nurse_skill": 1, "continuity_of_care": 1,
            "nurse_eccessive_workload": 10, "open_operating_theater": 30,
            "surgeon_transfer": 1, "patient_delay": 10, "unscheduled_optional": 300
        },
        "occupants": [],
        "patients": [patient_json("pm", "A", true, Some(0), 1, 3)],
        "surgeons": [{ "id": "s0", "max_surgery_time": [0, 0] }],
        "operating_theaters": [{ "id": "t0", "availability": [0, 0] }],
        "rooms": [{ "id": "r0", "capacity": 1 }],
        "nurses": []
    });
    deserialize(&data.to_string()).unwrap()
}

// 2 days, 2 single-bed rooms, two optional 1h patients of the same gender.
// Day capacities of the surgeon and the one theater are given in hours.
pub(crate) fn overtime_instance(surgeon: [u32; 2], theater: [u32; 2]) -> Instance {
    let shifts = (0..2)
        .flat_map(|day| {
            ["early", "late", "night"].map(|shift| json!({ "day": day, "shift": shift, "max_load": 10 }))
        })
        .collect::<Vec<_>>();
    let data = json!({
        "days": 2,
        "skill_levels": 3,
        "shift_types": ["early", "late", "night"],
        "age_groups": ["infant", "adult", "elderly"],
        "weights": {
            "room_mixed_age": 5, "room_nurse_skill": 1, "continuity_of_care": 1,
            "nurse_eccessive_workload": 10, "open_operating_theater": 30,
            "surgeon_transfer": 1, "patient_delay": 10, "unscheduled_optional": 300
        },
        "occupants": [],
        "patients": [
            patient_json("po", "A", false, None, 1, 3),
            patient_json("pq", "A", false, None, 1, 3)
        ],
        "surgeons": [{ "id": "s0", "max_surgery_time": surgeon }],
        "operating_theaters": [{ "id": "t0", "availability": theater }],
        "rooms": [{ "id": "r0", "capacity": 1 }, { "id": "r1", "capacity": 1 }],
        "nurses": [{ "id": "n0", "skill_level": 2, "working_shifts": shifts }]
    });
    deserialize(&data.to_string()).unwrap()
}

/// Random but well-formed instance used by property-style tests.
pub(crate) fn small_instance(seed: u64) -> Instance {
    let mut rng = StdRng::seed_from_u64(seed);
    let days = 7;
    let shift_types = ["early", "late", "night"];
    let spd = shift_types.len();
    let age_groups = ["infant", "adult", "elderly"];
    let num_rooms = 4;

    let rooms = (0..num_rooms)
        .map(|r| json!({ "id": format!("r{}", r), "capacity": rng.gen_range(1..=3) }))
        .collect::<Vec<_>>();
    let surgeons = (0..3)
        .map(|s| {
            let times = (0..days).map(|_| rng.gen_range(0..=8)).collect::<Vec<u32>>();
            json!({ "id": format!("s{}", s), "max_surgery_time": times })
        })
        .collect::<Vec<_>>();
    let theaters = (0..2)
        .map(|t| {
            let avail = (0..days).map(|_| rng.gen_range(0..=10)).collect::<Vec<u32>>();
            json!({ "id": format!("t{}", t), "availability": avail })
        })
        .collect::<Vec<_>>();

    let care = |los: usize, rng: &mut StdRng| {
        let workload = (0..los * spd).map(|_| rng.gen_range(0..=3)).collect::<Vec<u32>>();
        let skill = (0..los * spd).map(|_| rng.gen_range(0..=2)).collect::<Vec<u32>>();
        (workload, skill)
    };

    let occupants = (0..2)
        .map(|o| {
            let los = rng.gen_range(1..=3);
            let (workload, skill) = care(los, &mut rng);
            json!({
                "id": format!("a{}", o),
                "gender": if rng.gen_bool(0.5) { "A" } else { "B" },
                "age_group": age_groups[rng.gen_range(0..age_groups.len())],
                "length_of_stay": los,
                "workload_produced": workload,
                "skill_level_required": skill,
                "room_id": format!("r{}", rng.gen_range(0..num_rooms))
            })
        })
        .collect::<Vec<_>>();

    let patients = (0..12)
        .map(|p| {
            let mandatory = rng.gen_bool(0.5);
            let release = rng.gen_range(0..days - 2);
            let los = rng.gen_range(1..=4);
            let (workload, skill) = care(los, &mut rng);
            let incompatible = if rng.gen_bool(0.2) {
                vec![format!("r{}", rng.gen_range(0..num_rooms))]
            } else {
                vec![]
            };
            let mut patient = json!({
                "id": format!("p{:02}", p),
                "mandatory": mandatory,
                "gender": if rng.gen_bool(0.5) { "A" } else { "B" },
                "age_group": age_groups[rng.gen_range(0..age_groups.len())],
                "length_of_stay": los,
                "surgery_release_day": release,
                "surgery_duration": rng.gen_range(1..=3),
                "surgeon_id": format!("s{}", rng.gen_range(0..3)),
                "incompatible_room_ids": incompatible,
                "workload_produced": workload,
                "skill_level_required": skill
            });
            if mandatory {
                patient["surgery_due_day"] = json!((release + rng.gen_range(0..=3)).min(days - 1));
            }
            patient
        })
        .collect::<Vec<_>>();

    let nurses = (0..6)
        .map(|n| {
            let mut working_shifts = vec![];
            for day in 0..days {
                for shift in shift_types {
                    if rng.gen_bool(0.6) {
                        working_shifts.push(json!({
                            "day": day,
                            "shift": shift,
                            "max_load": rng.gen_range(3..=10)
                        }));
                    }
                }
            }
            json!({
                "id": format!("n{}", n),
                "skill_level": rng.gen_range(0..=2),
                "working_shifts": working_shifts
            })
        })
        .collect::<Vec<_>>();

    let data = json!({
        "days": days,
        "skill_levels": 3,
        "shift_types": shift_types,
        "age_groups": age_groups,
        "weights": {
            "room_mixed_age": 5, "room_nurse_skill": 1, "continuity_of_care": 1,
            "nurse_eccessive_workload": 10, "open_operating_theater": 30,
            "surgeon_transfer": 1, "patient_delay": 10, "unscheduled_optional": 300
        },
        "occupants": occupants,
        "patients": patients,
        "surgeons": surgeons,
        "operating_theaters": theaters,
        "rooms": rooms,
        "nurses": nurses
    });
    deserialize(&data.to_string()).unwrap()
}
