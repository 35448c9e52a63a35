// Copyright 2024 Nathan Hoos
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

//! Slot-indexed registry mapping opaque 32-bit handles to owned
//! objects. Raw pointers never cross the boundary; callers hold
//! handles, and the table's generation counters and pin counts catch
//! double-free and use-after-free instead of letting them corrupt
//! memory.
//!
//! The table itself does no locking; the boundary layer wraps each
//! table in one global mutex and keeps heavy work outside of it, either
//! on snapshots (the optimistic-commit protocol) or on pinned objects.
//!
//! # Optimistic commit
//! In-place mutators snapshot the object and its generation under the
//! lock, compute unlocked, then re-acquire and compare generations: a
//! mismatch means a concurrent commit or removal interfered and the
//! result is discarded. Commit and removal both bump the generation, so
//! the counter doubles as the compare-and-swap token.

pub type Handle = u32;

pub const INVALID_HANDLE: Handle = u32::MAX;

struct Slot<T> {
    obj: Option<Box<T>>,
    generation: u32,
    pins: u32,
    pending_free: bool,
}

fn next_generation(generation: u32) -> u32 {
    // Generation 0 is reserved for "never used"; skip it on wrap.
    let bumped = generation.wrapping_add(1);
    if bumped == 0 {
        1
    } else {
        bumped
    }
}

pub struct HandleTable<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<Handle>,
}

impl<T> HandleTable<T> {
    pub fn new() -> Self {
        HandleTable {
            slots: Vec::new(),
            free_list: Vec::new(),
        }
    }

    fn live_slot(&self, h: Handle) -> Option<&Slot<T>> {
        let slot = self.slots.get(h as usize)?;
        if slot.obj.is_none() || slot.pending_free {
            return None;
        }
        Some(slot)
    }

    fn live_slot_mut(&mut self, h: Handle) -> Option<&mut Slot<T>> {
        let slot = self.slots.get_mut(h as usize)?;
        if slot.obj.is_none() || slot.pending_free {
            return None;
        }
        Some(slot)
    }

    /// Stores `obj` and returns its handle, reusing a free slot when one
    /// exists. Reuse bumps the slot generation (skipping 0), so stale
    /// observers of the previous occupant can notice.
    pub fn insert(&mut self, obj: T) -> Handle {
        match self.free_list.pop() {
            Some(idx) => {
                let slot = &mut self.slots[idx as usize];
                slot.obj = Some(Box::new(obj));
                slot.generation = next_generation(slot.generation);
                slot.pins = 0;
                slot.pending_free = false;
                idx
            }
            None => {
                self.slots.push(Slot {
                    obj: Some(Box::new(obj)),
                    generation: 1,
                    pins: 0,
                    pending_free: false,
                });
                (self.slots.len() - 1) as Handle
            }
        }
    }

    pub fn get(&mut self, h: Handle) -> Option<&mut T> {
        self.live_slot_mut(h).and_then(|slot| slot.obj.as_deref_mut())
    }

    pub fn get_const(&self, h: Handle) -> Option<&T> {
        self.live_slot(h).and_then(|slot| slot.obj.as_deref())
    }

    pub fn generation(&self, h: Handle) -> Option<u32> {
        self.live_slot(h).map(|slot| slot.generation)
    }

    pub fn bump_generation(&mut self, h: Handle) -> Option<u32> {
        let slot = self.live_slot_mut(h)?;
        slot.generation = next_generation(slot.generation);
        Some(slot.generation)
    }

    /// Pins the object and returns a raw pointer to it. The pointee is a
    /// stable heap allocation and stays alive until the pin count drops
    /// to zero, even across an intervening `remove`. Callers must pair
    /// every pin with an [`HandleTable::unpin`].
    pub fn pin_const(&mut self, h: Handle) -> Option<*const T> {
        let slot = self.live_slot_mut(h)?;
        slot.pins += 1;
        slot.obj.as_deref().map(|obj| obj as *const T)
    }

    /// Releases one pin. Dropping the last pin of a pending-free slot
    /// destroys the object and recycles the slot.
    pub fn unpin(&mut self, h: Handle) -> bool {
        let Some(slot) = self.slots.get_mut(h as usize) else {
            return false;
        };
        if slot.obj.is_none() || slot.pins == 0 {
            return false;
        }
        slot.pins -= 1;
        if slot.pins == 0 && slot.pending_free {
            slot.obj = None;
            slot.pending_free = false;
            self.free_list.push(h);
        }
        true
    }

    /// Removes a live handle. A pinned object is only marked
    /// pending-free; destruction happens on the unpin that drops the
    /// count to zero. Either way the generation is bumped and the handle
    /// stops resolving immediately.
    pub fn remove(&mut self, h: Handle) -> bool {
        let Some(slot) = self.slots.get_mut(h as usize) else {
            return false;
        };
        if slot.obj.is_none() || slot.pending_free {
            return false;
        }
        slot.generation = next_generation(slot.generation);
        if slot.pins > 0 {
            slot.pending_free = true;
        } else {
            slot.obj = None;
            self.free_list.push(h);
        }
        true
    }

    /// Swaps a fresh body into a live slot and bumps the generation:
    /// the commit half of the optimistic protocol. The old body is
    /// destroyed.
    pub fn replace(&mut self, h: Handle, obj: T) -> bool {
        match self.live_slot_mut(h) {
            Some(slot) => {
                slot.obj = Some(Box::new(obj));
                slot.generation = next_generation(slot.generation);
                true
            }
            None => false,
        }
    }

    pub fn live_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.obj.is_some() && !slot.pending_free)
            .count()
    }

    /// Drops everything, pins included. Global teardown only.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free_list.clear();
    }
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_remove() {
        let mut table: HandleTable<String> = HandleTable::new();
        let h = table.insert("hello".to_string());
        assert_eq!(table.get_const(h).map(String::as_str), Some("hello"));
        assert!(table.remove(h));
        assert!(table.get_const(h).is_none());
        assert!(table.get(h).is_none());
    }

    #[test]
    fn double_remove_is_invalid() {
        let mut table: HandleTable<i32> = HandleTable::new();
        let h = table.insert(7);
        assert!(table.remove(h));
        assert!(!table.remove(h));
    }

    #[test]
    fn unknown_handles_are_invalid() {
        let mut table: HandleTable<i32> = HandleTable::new();
        assert!(table.get_const(3).is_none());
        assert!(!table.remove(INVALID_HANDLE));
        assert!(table.generation(0).is_none());
    }

    #[test]
    fn pinned_remove_defers_destruction() {
        let mut table: HandleTable<i32> = HandleTable::new();
        let h = table.insert(42);
        let ptr = table.pin_const(h).unwrap();
        assert!(table.remove(h));
        // Handle is dead to lookups, but the pinned body survives.
        assert!(table.get_const(h).is_none());
        assert_eq!(unsafe { *ptr }, 42);
        // Slot is not recycled while pinned.
        assert_eq!(table.live_count(), 0);
        assert!(table.unpin(h));
        // Now the slot is reusable.
        let h2 = table.insert(43);
        assert_eq!(h2, h);
        assert_eq!(table.get_const(h2), Some(&43));
    }

    #[test]
    fn slot_reuse_bumps_generation() {
        let mut table: HandleTable<i32> = HandleTable::new();
        let h = table.insert(1);
        let g1 = table.generation(h).unwrap();
        table.remove(h);
        let h2 = table.insert(2);
        assert_eq!(h, h2);
        let g2 = table.generation(h2).unwrap();
        assert_ne!(g1, g2);
        assert_ne!(g2, 0);
    }

    #[test]
    fn replace_bumps_generation() {
        let mut table: HandleTable<i32> = HandleTable::new();
        let h = table.insert(1);
        let g1 = table.generation(h).unwrap();
        assert!(table.replace(h, 2));
        assert_eq!(table.get_const(h), Some(&2));
        assert_ne!(table.generation(h).unwrap(), g1);
        assert!(!table.replace(INVALID_HANDLE, 9));
    }

    #[test]
    fn optimistic_commit_detects_interference() {
        let mut table: HandleTable<i32> = HandleTable::new();
        let h = table.insert(10);
        // Snapshot phase.
        let snapshot = *table.get_const(h).unwrap() + 5;
        let gen = table.generation(h).unwrap();
        // Concurrent writer commits first.
        table.bump_generation(h);
        // Our commit must observe the mismatch and give up.
        if table.generation(h) == Some(gen) {
            table.replace(h, snapshot);
        }
        assert_eq!(table.get_const(h), Some(&10));
    }

    #[test]
    fn generation_skips_zero_on_wrap() {
        assert_eq!(next_generation(u32::MAX), 1);
        assert_eq!(next_generation(0), 1);
        assert_eq!(next_generation(1), 2);
    }
}
