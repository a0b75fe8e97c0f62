//! One owning store per heap kind.
//!
//! A [`Store`] is a slab of slots addressed by `(index, generation)`
//! handles, with a free list for reuse — the arena-of-indices rendering
//! of a size-class free-list allocator. The generation is bumped when a
//! slot is freed, so a stale handle panics at dereference instead of
//! aliasing whatever object reused the slot. A stale handle is an engine
//! bug (a missed root), never a user error.

/// The collector's two-area liveness tag. The meaning of each color
/// swaps at cycle start; "live this cycle" is whatever color the heap
/// currently considers `current`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Color {
    White,
    Black,
}

impl Color {
    #[inline]
    pub fn flip(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

#[derive(Debug)]
struct Slot<T> {
    gen: u32,
    color: Color,
    value: Option<T>,
}

/// Slab of generation-checked slots for one heap kind.
#[derive(Debug)]
pub struct Store<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> Default for Store<T> {
    fn default() -> Self {
        Store {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }
}

impl<T> Store<T> {
    pub fn new() -> Self {
        Store::default()
    }

    /// Number of live objects.
    pub fn live(&self) -> usize {
        self.live
    }

    /// Allocate a slot, coloring it `color`, and return `(index, gen)`.
    pub fn alloc(&mut self, value: T, color: Color) -> (u32, u32) {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.color = color;
            slot.value = Some(value);
            (index, slot.gen)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                gen: 0,
                color,
                value: Some(value),
            });
            (index, 0)
        }
    }

    fn slot(&self, index: usize, gen: u32) -> &Slot<T> {
        let slot = &self.slots[index];
        assert_eq!(slot.gen, gen, "stale heap handle (slot {index})");
        slot
    }

    /// Dereference a handle.
    ///
    /// # Panics
    /// On a freed or stale handle (engine bug).
    pub fn get(&self, index: usize, gen: u32) -> &T {
        match &self.slot(index, gen).value {
            Some(v) => v,
            None => panic!("dangling heap handle (slot {index})"),
        }
    }

    /// Dereference a handle mutably.
    ///
    /// # Panics
    /// On a freed or stale handle (engine bug).
    pub fn get_mut(&mut self, index: usize, gen: u32) -> &mut T {
        let slot = &mut self.slots[index];
        assert_eq!(slot.gen, gen, "stale heap handle (slot {index})");
        match &mut slot.value {
            Some(v) => v,
            None => panic!("dangling heap handle (slot {index})"),
        }
    }

    /// Recolor a live slot. Returns `true` if the color changed (the
    /// object had not been marked this cycle yet).
    pub fn mark(&mut self, index: usize, gen: u32, color: Color) -> bool {
        let slot = &mut self.slots[index];
        assert_eq!(slot.gen, gen, "stale heap handle (slot {index})");
        if slot.color == color {
            false
        } else {
            slot.color = color;
            true
        }
    }

    /// Free every live slot still carrying the *previous* area color.
    /// Returns the number of objects reclaimed.
    pub fn sweep(&mut self, keep: Color) -> usize {
        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.value.is_some() && slot.color != keep {
                slot.value = None;
                slot.gen = slot.gen.wrapping_add(1);
                self.free.push(index as u32);
                freed += 1;
            }
        }
        self.live -= freed;
        freed
    }
}
