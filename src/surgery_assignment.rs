use std::collections::{BTreeMap, VecDeque};

use minilp::{ComparisonOp, OptimizationDirection, Problem, Variable};
use rand::Rng;
use tracing::debug;

use crate::builder::Instance;
use crate::error::{Error, Result};

// keeps a mandatory patient in the LP unless the surgeon truly has no room
const MANDATORY_PENALTY: f64 = 1.0e6;

/// Admission days for one surgeon's patients.
///
/// Solves the LP relaxation of the day assignment, then rounds it: patients
/// are taken in ascending entropy of their LP distribution and draw a day
/// from it, skipping days the surgeon can no longer fit them into.
///
/// Returns `instance.days + 1` queues; the last one holds the patients left
/// unscheduled.
pub fn lp_relax_day_assign_per_surgeon<R: Rng>(
    instance: &Instance,
    surgeon_idx: usize,
    rng: &mut R,
) -> Result<Vec<VecDeque<usize>>> {
    let days = instance.days;
    let capacities = &instance.surgeons[surgeon_idx].max_surgery_time;
    let weights = &instance.weights;
    let patients = (0..instance.patients.len())
        .filter(|&p| instance.patients[p].surgeon == surgeon_idx)
        .collect::<Vec<_>>();

    // Setting up LP: X_{patient, day}, with day == days meaning unscheduled
    let mut problem = Problem::new(OptimizationDirection::Minimize);
    let mut variable_dict: BTreeMap<usize, BTreeMap<usize, Variable>> = BTreeMap::new();
    for &patient_idx in &patients {
        let patient = &instance.patients[patient_idx];
        let mut patient_dict = BTreeMap::new();
        if days > 0 {
            let last = patient.last_day.min(days - 1);
            for day in patient.release_day..=last {
                if patient.surgery_duration <= capacities[day] {
                    let delay = (day - patient.release_day) as f64;
                    patient_dict.insert(day, problem.add_var(weights.patient_delay * delay, (0.0, 1.0)));
                }
            }
        }
        let left_out = if patient.mandatory {
            MANDATORY_PENALTY
        } else {
            weights.unscheduled_optional
        };
        patient_dict.insert(days, problem.add_var(left_out, (0.0, 1.0)));

        // Patient spread constraint
        problem.add_constraint(patient_dict.values().map(|&var| (var, 1.0)), ComparisonOp::Eq, 1.0);
        variable_dict.insert(patient_idx, patient_dict);
    }

    // Capacity constraints
    for day in 0..days {
        let summands = variable_dict
            .iter()
            .filter_map(|(&patient_idx, patient_dict)| {
                let duration = instance.patients[patient_idx].surgery_duration as f64;
                patient_dict.get(&day).map(|&var| (var, duration))
            })
            .collect::<Vec<_>>();
        if !summands.is_empty() {
            problem.add_constraint(summands, ComparisonOp::Le, capacities[day] as f64);
        }
    }

    let solution_of_lp = problem.solve().map_err(|err| {
        Error::Construction(format!(
            "day LP for surgeon {} failed: {}",
            instance.surgeons[surgeon_idx].id, err
        ))
    })?;
    debug!(
        surgeon = %instance.surgeons[surgeon_idx].id,
        objective = solution_of_lp.objective(),
        "day LP solved"
    );

    // Most decided patients are rounded first
    let mut patient_entropy_vector = variable_dict
        .iter()
        .map(|(&patient_idx, patient_dict)| {
            let entropy = patient_dict
                .values()
                .map(|&var| solution_of_lp[var])
                .filter(|&x| x > 0.0)
                .map(|x| -x * x.log2())
                .sum::<f64>();
            (patient_idx, entropy)
        })
        .collect::<Vec<_>>();
    patient_entropy_vector.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut patient_assignment_vec: Vec<VecDeque<usize>> = vec![VecDeque::new(); days + 1];
    let mut available_capacities = capacities.clone();
    for (patient_idx, _) in patient_entropy_vector {
        let duration = instance.patients[patient_idx].surgery_duration;
        let mut options = variable_dict[&patient_idx]
            .iter()
            .map(|(&day, &var)| (day, solution_of_lp[var].max(0.0)))
            .collect::<Vec<_>>();

        let chosen = loop {
            let total = options.iter().map(|o| o.1).sum::<f64>();
            if total <= f64::EPSILON {
                // what is left has no LP mass; take the first day that still fits
                break options
                    .iter()
                    .map(|o| o.0)
                    .find(|&day| day < days && duration <= available_capacities[day])
                    .unwrap_or(days);
            }
            let draw = rng.gen::<f64>() * total;
            let mut cumul_prob = 0.0;
            let position = options
                .iter()
                .position(|o| {
                    cumul_prob += o.1;
                    draw < cumul_prob
                })
                .unwrap_or(options.len() - 1);
            let day = options[position].0;
            if day == days || duration <= available_capacities[day] {
                break day;
            }
            options.remove(position);
        };

        if chosen < days {
            available_capacities[chosen] -= duration;
        }
        patient_assignment_vec[chosen].push_back(patient_idx);
    }

    Ok(patient_assignment_vec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn check_lp_relax_day_assign_per_surgeon() {
        for seed in 0..5 {
            let instance = fixtures::small_instance(seed);
            let mut rng = StdRng::seed_from_u64(seed);
            for surgeon_idx in 0..instance.surgeons.len() {
                let Ok(per_day) = lp_relax_day_assign_per_surgeon(&instance, surgeon_idx, &mut rng) else {
                    panic!("day assignment failed")
                };
                assert_eq!(per_day.len(), instance.days + 1);

                let mut seen = per_day.iter().flatten().copied().collect::<Vec<_>>();
                seen.sort_unstable();
                let expected = (0..instance.patients.len())
                    .filter(|&p| instance.patients[p].surgeon == surgeon_idx)
                    .collect::<Vec<_>>();
                assert_eq!(seen, expected);

                for (day, queue) in per_day.iter().enumerate().take(instance.days) {
                    let load = queue.iter().map(|&p| instance.patients[p].surgery_duration).sum::<u32>();
                    assert!(load <= instance.surgeons[surgeon_idx].max_surgery_time[day]);
                    assert!(queue.iter().all(|&p| instance.patients[p].in_window(day)));
                }
            }
        }
    }

    #[test]
    fn trivial_patient_gets_release_day() {
        let instance = fixtures::tiny_instance();
        let mut rng = StdRng::seed_from_u64(0);
        let per_day = lp_relax_day_assign_per_surgeon(&instance, 0, &mut rng).unwrap();
        assert_eq!(per_day[0], VecDeque::from([0]));
        assert!(per_day[1].is_empty());
    }

    #[test]
    fn surgeon_without_time_leaves_patient_out() {
        let instance = fixtures::hopeless_instance();
        let mut rng = StdRng::seed_from_u64(0);
        let per_day = lp_relax_day_assign_per_surgeon(&instance, 0, &mut rng).unwrap();
        assert_eq!(per_day[instance.days], VecDeque::from([0]));
    }
}
