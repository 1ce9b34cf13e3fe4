use crate::builder::Instance;

/// Per-patient admission days, rooms and theaters that cannot trivially
/// break a hard rule on their own.
///
/// Built once per run; the instance never changes underneath it.
#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    days: Vec<Vec<usize>>,
    rooms: Vec<Vec<usize>>,
    theaters: Vec<Vec<usize>>,
}

impl Domain {
    pub fn new(instance: &Instance) -> Domain {
        let mut days = Vec::with_capacity(instance.patients.len());
        let mut rooms = Vec::with_capacity(instance.patients.len());
        let mut theaters = Vec::with_capacity(instance.patients.len());

        for patient in &instance.patients {
            let duration = patient.surgery_duration;
            let surgeon = &instance.surgeons[patient.surgeon];
            let last = patient.last_day.min(instance.days.saturating_sub(1));
            let valid_days = (patient.release_day..=last)
                .filter(|&d| d < instance.days)
                .filter(|&d| surgeon.max_surgery_time[d] >= duration)
                .filter(|&d| instance.theaters.iter().any(|t| t.availability[d] >= duration))
                .collect::<Vec<_>>();
            let valid_theaters = (0..instance.theaters.len())
                .filter(|&t| valid_days.iter().any(|&d| instance.theaters[t].availability[d] >= duration))
                .collect();
            rooms.push((0..instance.rooms.len()).filter(|&r| patient.is_compatible(r)).collect());
            theaters.push(valid_theaters);
            days.push(valid_days);
        }

        Domain { days, rooms, theaters }
    }

    pub fn days(&self, patient: usize) -> &[usize] {
        &self.days[patient]
    }

    pub fn rooms(&self, patient: usize) -> &[usize] {
        &self.rooms[patient]
    }

    pub fn theaters(&self, patient: usize) -> &[usize] {
        &self.theaters[patient]
    }

    /// Number of day-room pairs; small means tightly constrained.
    pub fn size(&self, patient: usize) -> usize {
        self.days[patient].len() * self.rooms[patient].len()
    }

    pub fn is_schedulable(&self, patient: usize) -> bool {
        !self.days[patient].is_empty() && !self.rooms[patient].is_empty() && !self.theaters[patient].is_empty()
    }
}
