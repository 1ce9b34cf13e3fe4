use itertools::Itertools;

use crate::builder::Instance;

/// Admission day, room and operating theater of a scheduled patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot {
    pub day: usize,
    pub room: usize,
    pub theater: usize,
}

impl Slot {
    pub fn new(day: usize, room: usize, theater: usize) -> Slot {
        Slot { day, room, theater }
    }
}

/// One optional slot per patient, in instance order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    slots: Vec<Option<Slot>>,
}

impl Assignment {
    pub fn unassigned(num_patients: usize) -> Assignment {
        Assignment {
            slots: vec![None; num_patients],
        }
    }

    pub fn get(&self, patient: usize) -> Option<Slot> {
        self.slots[patient]
    }

    pub fn set(&mut self, patient: usize, slot: Option<Slot>) {
        self.slots[patient] = slot;
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, Option<Slot>)> + '_ {
        self.slots.iter().copied().enumerate()
    }

    pub fn scheduled(&self) -> impl Iterator<Item = (usize, Slot)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(patient, slot)| slot.map(|slot| (patient, slot)))
    }
}

/// Rooms covered by each nurse on each global shift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NurseCoverage {
    // nurse -> shift -> rooms
    rooms: Vec<Vec<Vec<usize>>>,
}

impl NurseCoverage {
    pub fn empty(num_nurses: usize, num_shifts: usize) -> NurseCoverage {
        NurseCoverage {
            rooms: vec![vec![Vec::new(); num_shifts]; num_nurses],
        }
    }

    /// Deals every room of every shift to that shift's working nurses in turn,
    /// most skilled first. Shifts without a working nurse stay uncovered.
    pub fn round_robin(instance: &Instance) -> NurseCoverage {
        let mut coverage = NurseCoverage::empty(instance.nurses.len(), instance.shifts());
        for shift in 0..instance.shifts() {
            let working = (0..instance.nurses.len())
                .filter(|&n| instance.nurses[n].works(shift))
                .sorted_by_key(|&n| std::cmp::Reverse(instance.nurses[n].skill_level))
                .collect_vec();
            if working.is_empty() {
                continue;
            }
            for room in 0..instance.rooms.len() {
                coverage.rooms[working[room % working.len()]][shift].push(room);
            }
        }
        coverage
    }

    pub fn num_nurses(&self) -> usize {
        self.rooms.len()
    }

    pub fn num_shifts(&self) -> usize {
        self.rooms.first().map_or(0, |shifts| shifts.len())
    }

    pub fn rooms(&self, nurse: usize, shift: usize) -> &[usize] {
        &self.rooms[nurse][shift]
    }

    pub(crate) fn rooms_mut(&mut self, nurse: usize, shift: usize) -> &mut Vec<usize> {
        &mut self.rooms[nurse][shift]
    }

    pub fn assign(&mut self, nurse: usize, shift: usize, room: usize) {
        let rooms = &mut self.rooms[nurse][shift];
        if !rooms.contains(&room) {
            rooms.push(room);
        }
    }

    pub fn covers(&self, nurse: usize, shift: usize, room: usize) -> bool {
        self.rooms[nurse][shift].contains(&room)
    }

    /// `(nurse, shift, room)` triples in nurse, shift, list order.
    pub fn entries(&self) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        self.rooms.iter().enumerate().flat_map(|(nurse, shifts)| {
            shifts
                .iter()
                .enumerate()
                .flat_map(move |(shift, rooms)| rooms.iter().map(move |&room| (nurse, shift, room)))
        })
    }
}
