use crate::assignment::Slot;
use crate::state::SolutionState;

/// An edit of a `SolutionState`, built against the state it will be applied to.
///
/// `apply` consumes the move and hands back an `AppliedMove` holding exactly what
/// is needed to invert it, so a move runs once and is undone at most once.
/// Moves never judge feasibility.
#[derive(Debug, Clone, PartialEq)]
pub enum Move {
    SetAssignment {
        patient: usize,
        before: Option<Slot>,
        after: Slot,
    },
    RemoveAssignment {
        patient: usize,
        before: Option<Slot>,
    },
    SwapAssignments {
        a: usize,
        b: usize,
        slot_a: Option<Slot>,
        slot_b: Option<Slot>,
    },
    SwapNurseCoverage {
        nurse_a: usize,
        nurse_b: usize,
        shift: usize,
        // (room, position in the nurse's list)
        room_a: Option<(usize, usize)>,
        room_b: Option<(usize, usize)>,
    },
}

impl Move {
    pub fn set_assignment(state: &SolutionState, patient: usize, slot: Slot) -> Move {
        Move::SetAssignment {
            patient,
            before: state.slot(patient),
            after: slot,
        }
    }

    pub fn remove_assignment(state: &SolutionState, patient: usize) -> Move {
        Move::RemoveAssignment {
            patient,
            before: state.slot(patient),
        }
    }

    pub fn swap_assignments(state: &SolutionState, a: usize, b: usize) -> Move {
        Move::SwapAssignments {
            a,
            b,
            slot_a: state.slot(a),
            slot_b: state.slot(b),
        }
    }

    /// `room_a` goes from `nurse_a` to `nurse_b` and `room_b` the other way.
    ///
    /// Either room may be absent, not both. Returns `None` when a named room
    /// is not covered by the named nurse on that shift.
    pub fn swap_nurse_coverage(
        state: &SolutionState,
        nurse_a: usize,
        nurse_b: usize,
        shift: usize,
        room_a: Option<usize>,
        room_b: Option<usize>,
    ) -> Option<Move> {
        if nurse_a == nurse_b || (room_a.is_none() && room_b.is_none()) {
            return None;
        }
        let locate = |nurse: usize, room: Option<usize>| -> Option<Option<(usize, usize)>> {
            match room {
                None => Some(None),
                Some(room) => {
                    let pos = state.coverage().rooms(nurse, shift).iter().position(|&r| r == room)?;
                    Some(Some((room, pos)))
                }
            }
        };
        Some(Move::SwapNurseCoverage {
            nurse_a,
            nurse_b,
            shift,
            room_a: locate(nurse_a, room_a)?,
            room_b: locate(nurse_b, room_b)?,
        })
    }

    pub fn apply(self, state: &mut SolutionState) -> AppliedMove {
        match self {
            Move::SetAssignment { patient, before, after } => {
                state.reassign(patient, Some(after));
                AppliedMove(Memento::Slots(vec![(patient, before)]))
            }
            Move::RemoveAssignment { patient, before } => {
                state.reassign(patient, None);
                AppliedMove(Memento::Slots(vec![(patient, before)]))
            }
            Move::SwapAssignments { a, b, slot_a, slot_b } => {
                state.reassign(a, slot_b);
                state.reassign(b, slot_a);
                AppliedMove(Memento::Slots(vec![(a, slot_a), (b, slot_b)]))
            }
            Move::SwapNurseCoverage {
                nurse_a,
                nurse_b,
                shift,
                room_a,
                room_b,
            } => {
                if let Some((_, pos)) = room_a {
                    state.coverage_mut().rooms_mut(nurse_a, shift).remove(pos);
                }
                if let Some((_, pos)) = room_b {
                    state.coverage_mut().rooms_mut(nurse_b, shift).remove(pos);
                }
                if let Some((room, _)) = room_a {
                    state.coverage_mut().rooms_mut(nurse_b, shift).push(room);
                    state.transfer_room(room, shift, nurse_a, nurse_b);
                }
                if let Some((room, _)) = room_b {
                    state.coverage_mut().rooms_mut(nurse_a, shift).push(room);
                    state.transfer_room(room, shift, nurse_b, nurse_a);
                }
                AppliedMove(Memento::Coverage {
                    nurse_a,
                    nurse_b,
                    shift,
                    room_a,
                    room_b,
                })
            }
        }
    }
}

#[derive(Debug)]
enum Memento {
    // patients and the slots they held before the move
    Slots(Vec<(usize, Option<Slot>)>),
    Coverage {
        nurse_a: usize,
        nurse_b: usize,
        shift: usize,
        room_a: Option<(usize, usize)>,
        room_b: Option<(usize, usize)>,
    },
}

/// A move that has been applied and can still be taken back.
#[must_use = "an applied move must be committed or undone"]
#[derive(Debug)]
pub struct AppliedMove(Memento);

impl AppliedMove {
    /// Restores the state to exactly what it was before `apply`.
    pub fn undo(self, state: &mut SolutionState) {
        match self.0 {
            Memento::Slots(before) => {
                for (patient, slot) in before {
                    state.reassign(patient, slot);
                }
            }
            Memento::Coverage {
                nurse_a,
                nurse_b,
                shift,
                room_a,
                room_b,
            } => {
                if let Some((room, _)) = room_b {
                    state.coverage_mut().rooms_mut(nurse_a, shift).pop();
                    state.transfer_room(room, shift, nurse_a, nurse_b);
                }
                if let Some((room, _)) = room_a {
                    state.coverage_mut().rooms_mut(nurse_b, shift).pop();
                    state.transfer_room(room, shift, nurse_b, nurse_a);
                }
                if let Some((room, pos)) = room_b {
                    state.coverage_mut().rooms_mut(nurse_b, shift).insert(pos, room);
                }
                if let Some((room, pos)) = room_a {
                    state.coverage_mut().rooms_mut(nurse_a, shift).insert(pos, room);
                }
            }
        }
    }

    pub fn commit(self) {}
}
