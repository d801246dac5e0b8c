// Copyright 2025 herald contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Owner identities and the directory that tracks their liveness.
//!
//! The bus never owns the objects that subscribe to it. Instead, an owner is
//! represented by an [`OwnerId`] handle into an [`OwnerDirectory`] arena: the
//! host registers an owner when the underlying object comes into existence,
//! flips its active flag as the object enables/disables, and despawns it when
//! the object is destroyed. Validity checks are O(1) slot lookups, so holding
//! a stale `OwnerId` is always safe and simply reads as "dead".

use serde::{Deserialize, Serialize};
use std::fmt;

/// A unique identifier for a subscription owner.
///
/// It combines an index with a generation count so that a despawned owner's
/// slot can be recycled without old handles resurrecting: a recycled index
/// carries a higher generation, and any `OwnerId` holding the previous
/// generation reads as dead forever after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId {
    index: u32,
    generation: u32,
}

impl OwnerId {
    /// Returns the slot index of this owner.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Returns the generation at which this handle was issued.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner {}v{}", self.index, self.generation)
    }
}

/// An error raised by [`OwnerDirectory`] operations on stale handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerError {
    /// The `OwnerId` refers to a despawned or recycled slot.
    Stale(OwnerId),
}

impl fmt::Display for OwnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnerError::Stale(id) => write!(f, "stale owner handle: {id}"),
        }
    }
}

impl std::error::Error for OwnerError {}

/// One arena slot. `state` is `Some` only while the owner is alive.
struct OwnerSlot {
    generation: u32,
    state: Option<OwnerState>,
}

struct OwnerState {
    active: bool,
}

/// Arena of live owners, with O(1) spawn, despawn and liveness queries.
///
/// Despawned indices are recycled through a free list; the generation of a
/// recycled slot is incremented so previously issued handles cannot alias the
/// new occupant.
#[derive(Default)]
pub struct OwnerDirectory {
    slots: Vec<OwnerSlot>,
    freed: Vec<u32>,
}

impl OwnerDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            freed: Vec::new(),
        }
    }

    /// Registers a new owner and returns its handle. Owners start active.
    pub fn spawn(&mut self) -> OwnerId {
        let state = OwnerState { active: true };
        if let Some(index) = self.freed.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation += 1;
            slot.state = Some(state);
            OwnerId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(OwnerSlot {
                generation: 0,
                state: Some(state),
            });
            OwnerId {
                index,
                generation: 0,
            }
        }
    }

    /// Removes an owner from the directory, invalidating its handle.
    ///
    /// Fails with [`OwnerError::Stale`] if the owner is already gone.
    pub fn despawn(&mut self, id: OwnerId) -> Result<(), OwnerError> {
        let slot = self.live_slot_mut(id)?;
        slot.state = None;
        self.freed.push(id.index);
        Ok(())
    }

    /// Sets the active flag of a live owner.
    ///
    /// Fails with [`OwnerError::Stale`] if the owner is gone.
    pub fn set_active(&mut self, id: OwnerId, active: bool) -> Result<(), OwnerError> {
        let slot = self.live_slot_mut(id)?;
        if let Some(state) = slot.state.as_mut() {
            state.active = active;
        }
        Ok(())
    }

    /// Returns `true` if the handle refers to a live owner.
    #[must_use]
    pub fn is_alive(&self, id: OwnerId) -> bool {
        self.slots
            .get(id.index as usize)
            .map_or(false, |slot| {
                slot.generation == id.generation && slot.state.is_some()
            })
    }

    /// Returns `true` if the owner is alive and currently active.
    #[must_use]
    pub fn is_active(&self, id: OwnerId) -> bool {
        self.slots
            .get(id.index as usize)
            .and_then(|slot| {
                if slot.generation == id.generation {
                    slot.state.as_ref()
                } else {
                    None
                }
            })
            .map_or(false, |state| state.active)
    }

    /// Returns the number of live owners.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.slots.len() - self.freed.len()
    }

    fn live_slot_mut(&mut self, id: OwnerId) -> Result<&mut OwnerSlot, OwnerError> {
        match self.slots.get_mut(id.index as usize) {
            Some(slot) if slot.generation == id.generation && slot.state.is_some() => Ok(slot),
            _ => Err(OwnerError::Stale(id)),
        }
    }
}
