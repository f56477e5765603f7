//! Generational slot table: a generic arena keyed by `(index, generation)`
//! handles, used for the parameter, entity, and constraint tables (spec
//! §4.2). Grounded directly on the `FF_DECLARE_GENTABLE`/`FF_DEFINE_GENTABLE`
//! macro pair in `original_source/freeform.h`.
//!
//! A slot is `(generation, alive, next_free, payload)`. Destruction bumps
//! the generation and pushes the slot onto an intrusive free-list head, so a
//! reused slot is immediately distinguishable from the handle that pointed
//! at its previous occupant. The table never shrinks and never reuses an
//! index without bumping its generation.

use tracing::trace;

use crate::handle::{Handle, INVALID_INDEX};

/// Hard cap on slots per table, matching the 16-bit index space (spec §4.2,
/// §7 "Capacity exhaustion").
const MAX_CAPACITY: usize = 0xFFFF;

/// Minimum number of slots added by one growth step.
const MIN_GROWTH: usize = 64;

struct Slot<T> {
    generation: u32,
    alive: bool,
    next_free: u16,
    payload: T,
}

/// A generational arena over payload type `T`, addressed by `Handle<Tag>`.
///
/// `T` must implement `Default` so that freshly grown slots (not yet handed
/// out by [`SlotTable::create`]) have a well-defined payload, matching the
/// zero-initialization the original C performs with `memset`.
pub struct SlotTable<Tag, T> {
    slots: Vec<Slot<T>>,
    free_head: u16,
    alive_count: u32,
    _tag: std::marker::PhantomData<fn() -> Tag>,
}

impl<Tag, T: Default> SlotTable<Tag, T> {
    /// Allocates `initial_capacity` dead slots and links them into the
    /// free-list (spec §4.2 `init`).
    pub fn init(initial_capacity: usize) -> Self {
        let mut table = Self {
            slots: Vec::new(),
            free_head: INVALID_INDEX,
            alive_count: 0,
            _tag: std::marker::PhantomData,
        };
        if initial_capacity > 0 {
            table.grow(initial_capacity);
        }
        table
    }

    /// Total number of slots ever allocated (alive + free), capped at 65535.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots currently alive.
    pub fn alive_count(&self) -> usize {
        self.alive_count as usize
    }

    fn grow(&mut self, add: usize) {
        if add == 0 {
            return;
        }
        let current = self.slots.len();
        let new_cap = (current + add).min(MAX_CAPACITY);
        if new_cap <= current {
            return; // at the 65535 ceiling already
        }
        for i in current..new_cap {
            self.slots.push(Slot {
                generation: 1,
                alive: false,
                next_free: (i + 1) as u16, // chained below; last entry patched after
                payload: T::default(),
            });
        }
        // Link the newly grown range onto the existing free-list head, last
        // slot first so iteration order of `create` calls is ascending by
        // index (matches the C `grow`'s tail-patch-then-prepend shape).
        self.slots[new_cap - 1].next_free = self.free_head;
        self.free_head = current as u16;
        trace!(added = new_cap - current, capacity = new_cap, "slot table grew");
    }

    /// Pops the free-list head (growing geometrically first if it is
    /// empty), installs `payload`, and returns the fresh handle. Returns
    /// [`Handle::INVALID`] if the table is already at its 65535-slot
    /// ceiling (spec §7 "Capacity exhaustion").
    pub fn create(&mut self, payload: T) -> Handle<Tag> {
        if self.free_head == INVALID_INDEX {
            let cap = self.slots.len();
            let add = if cap < MIN_GROWTH { MIN_GROWTH } else { cap / 2 };
            self.grow(add.max(1));
            if self.free_head == INVALID_INDEX {
                return Handle::INVALID;
            }
        }
        let idx = self.free_head;
        let slot = &mut self.slots[idx as usize];
        self.free_head = slot.next_free;
        slot.alive = true;
        slot.payload = payload;
        self.alive_count += 1;
        Handle::new(idx, slot.generation)
    }

    fn valid_index(&self, handle: Handle<Tag>) -> bool {
        handle.index != INVALID_INDEX && (handle.index as usize) < self.slots.len()
    }

    /// `true` iff `handle` currently matches a live slot.
    pub fn alive(&self, handle: Handle<Tag>) -> bool {
        if !self.valid_index(handle) {
            return false;
        }
        let slot = &self.slots[handle.index as usize];
        slot.alive && slot.generation == handle.generation
    }

    /// Marks the slot dead, bumps its generation, and pushes it onto the
    /// free-list head. Returns `false` if `handle` did not match a live
    /// slot (spec §7 "Dead-handle lookup").
    pub fn destroy(&mut self, handle: Handle<Tag>) -> bool {
        if !self.alive(handle) {
            return false;
        }
        let idx = handle.index;
        let slot = &mut self.slots[idx as usize];
        slot.alive = false;
        slot.generation = slot.generation.wrapping_add(1);
        slot.next_free = self.free_head;
        self.free_head = idx;
        self.alive_count -= 1;
        true
    }

    /// Immutable lookup; `None` unless `handle` matches a live slot.
    pub fn get(&self, handle: Handle<Tag>) -> Option<&T> {
        if !self.alive(handle) {
            return None;
        }
        Some(&self.slots[handle.index as usize].payload)
    }

    /// Mutable lookup; `None` unless `handle` matches a live slot.
    pub fn get_mut(&mut self, handle: Handle<Tag>) -> Option<&mut T> {
        if !self.alive(handle) {
            return None;
        }
        Some(&mut self.slots[handle.index as usize].payload)
    }

    /// Visits every live `(handle, payload)` pair in ascending table-index
    /// order. The linker (spec §4.4) relies on this order being stable for
    /// the duration of one relink.
    pub fn for_each_live(&self, mut f: impl FnMut(Handle<Tag>, &T)) {
        for (i, slot) in self.slots.iter().enumerate() {
            if slot.alive {
                f(Handle::new(i as u16, slot.generation), &slot.payload);
            }
        }
    }

    /// Mutable variant of [`SlotTable::for_each_live`].
    pub fn for_each_live_mut(&mut self, mut f: impl FnMut(Handle<Tag>, &mut T)) {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.alive {
                f(Handle::new(i as u16, slot.generation), &mut slot.payload);
            }
        }
    }
}
