//! # Register Allocator
//!
//! Four general-purpose registers, no spilling. Values hold an [`AllocationId`]
//! rather than a physical register, so an allocation can be moved to another
//! slot (see [`RegisterAllocator::require`]) without invalidating the values
//! that refer to it.

use crate::error::{Error, Result};
use crate::location::Location;

/// Number of physical registers available to expressions
pub const REGISTER_COUNT: usize = 4;

/// Slot holding function return values (`eax`)
pub const RETURN_SLOT: usize = 0;

/// Register names by slot, as 8, 16 and 32-bit views
const REGISTER_NAMES: [[&str; 3]; REGISTER_COUNT] = [
    ["al", "ax", "eax"],
    ["bl", "bx", "ebx"],
    ["cl", "cx", "ecx"],
    ["dl", "dx", "edx"],
];

/// Handle identifying one logical register allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AllocationId(pub u32);

/// An allocation moved out of a slot that was required for something else
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    /// The allocation that moved
    pub id: AllocationId,
    /// Slot it occupied
    pub from: usize,
    /// Slot it occupies now
    pub to: usize,
}

/// Result of claiming a specific slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    /// The new allocation in the required slot
    pub id: AllocationId,
    /// Move needed to evacuate the previous occupant, if any
    pub relocation: Option<Relocation>,
}

/// Name of a register slot viewed at `size` bytes
pub fn register_name(slot: usize, size: u32) -> &'static str {
    let view = match size {
        1 => 0,
        2 => 1,
        _ => 2,
    };
    REGISTER_NAMES[slot % REGISTER_COUNT][view]
}

/// Tracks which physical registers hold live allocations
#[derive(Debug, Default)]
pub struct RegisterAllocator {
    /// Live allocation per slot
    slots: [Option<AllocationId>; REGISTER_COUNT],
    /// Slots touched since the last [`reset_used`](Self::reset_used)
    used: [bool; REGISTER_COUNT],
    /// Next allocation id to hand out
    next_id: u32,
}

impl RegisterAllocator {
    /// Creates an allocator with every register free
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh_id(&mut self) -> AllocationId {
        let id = AllocationId(self.next_id);
        self.next_id += 1;
        id
    }

    fn claim(&mut self, slot: usize) -> AllocationId {
        let id = self.fresh_id();
        self.slots[slot] = Some(id);
        self.used[slot] = true;
        id
    }

    fn first_free(&self, except: Option<usize>) -> Option<usize> {
        (0..REGISTER_COUNT).find(|&slot| Some(slot) != except && self.slots[slot].is_none())
    }

    /// Allocates the first free register
    pub fn allocate(&mut self, location: &Location) -> Result<AllocationId> {
        let slot = self.first_free(None).ok_or_else(|| Error::OutOfRegisters {
            location: location.clone(),
        })?;
        let id = self.claim(slot);
        tracing::trace!("allocated {:?} in {}", id, register_name(slot, 4));
        Ok(id)
    }

    /// Allocates a specific slot, moving its current occupant elsewhere first
    ///
    /// The caller must emit the returned relocation before using either register.
    pub fn require(&mut self, slot: usize, location: &Location) -> Result<Reservation> {
        let mut relocation = None;

        if let Some(occupant) = self.slots[slot] {
            let target = self
                .first_free(Some(slot))
                .ok_or_else(|| Error::OutOfRegisters {
                    location: location.clone(),
                })?;
            self.slots[target] = Some(occupant);
            self.used[target] = true;
            self.slots[slot] = None;
            tracing::trace!(
                "relocated {:?} from {} to {}",
                occupant,
                register_name(slot, 4),
                register_name(target, 4)
            );
            relocation = Some(Relocation {
                id: occupant,
                from: slot,
                to: target,
            });
        }

        let id = self.claim(slot);
        Ok(Reservation { id, relocation })
    }

    /// Releases an allocation; ids that are no longer resident are ignored
    pub fn free(&mut self, id: AllocationId) {
        if let Some(slot) = self.slot_of(id) {
            self.slots[slot] = None;
        }
    }

    /// Physical slot currently holding `id`
    pub fn slot_of(&self, id: AllocationId) -> Option<usize> {
        self.slots.iter().position(|&occupant| occupant == Some(id))
    }

    /// Forgets which registers were touched (at function entry)
    pub fn reset_used(&mut self) {
        self.used = [false; REGISTER_COUNT];
    }

    /// Slots touched since the last reset, in ascending order
    pub fn used_slots(&self) -> Vec<usize> {
        (0..REGISTER_COUNT).filter(|&slot| self.used[slot]).collect()
    }

    /// True when no allocation is live
    pub fn all_free(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Number of live allocations
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}
