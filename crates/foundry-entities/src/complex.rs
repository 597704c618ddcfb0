//! Complex: a named grouping of Structures with a built-percentage
//! threshold, plus the `Complex`/membership-row pair it is built from.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use foundry_core::{ComplexId, StructureId};

use crate::state::EntityState;

/// A join row between a Complex and one of its member Structures.
///
/// Earlier membership-tracking code carried a `state` field on this join
/// row that was never written past its zero value — a stub. It is kept
/// here as an inert marker with no semantic meaning: nothing reads it, and
/// `Complex::state` never consults it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipObserved;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Complex {
    pub id: ComplexId,
    pub name: String,
    /// Percentage (0..=100) of built members required for the complex
    /// itself to be considered built.
    pub built_percentage: u8,
    members: BTreeSet<StructureId>,
}

impl Complex {
    pub fn new(name: impl Into<String>, built_percentage: u8) -> Self {
        Complex {
            id: ComplexId::new(),
            name: name.into(),
            built_percentage: built_percentage.min(100),
            members: BTreeSet::new(),
        }
    }

    /// Mutates only the membership join set; never touches a member
    /// Structure's own state.
    pub fn add_structure(&mut self, structure: StructureId) -> MembershipObserved {
        self.members.insert(structure);
        MembershipObserved
    }

    pub fn remove_structure(&mut self, structure: StructureId) {
        self.members.remove(&structure);
    }

    pub fn members(&self) -> impl Iterator<Item = &StructureId> {
        self.members.iter()
    }

    /// `built` iff `(built members / total members) * 100 >= threshold`.
    /// A complex with zero members is never built regardless of threshold
    /// (an empty grouping has nothing to confirm as built). `lookup` is a
    /// caller-supplied snapshot of member states — this stays a pure
    /// function over freshly read rows, same pattern as `can_start`.
    pub fn state(&self, lookup: impl Fn(StructureId) -> EntityState) -> EntityState {
        if self.members.is_empty() {
            return EntityState::Planned;
        }
        let total = self.members.len();
        let built = self.members.iter().filter(|&&s| lookup(s).is_built()).count();
        let percentage = (built * 100) as f64 / total as f64;
        if percentage >= self.built_percentage as f64 {
            EntityState::Built
        } else {
            EntityState::Planned
        }
    }
}
