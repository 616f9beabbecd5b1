//! Unique identifier allocation
//!
//! [`Ids`] hands out small integer ids and recycles released ones. Released
//! ids are reused most-recently-released first, so the free list behaves as
//! a stack.

/// Identifier allocator with a recycling free list
///
/// A single allocator is meant to have a single owner; it is not shared
/// between threads.
#[derive(Debug, Clone)]
pub struct Ids {
    /// First id this allocator issues
    base: u32,
    /// Next never-issued id
    last: u32,
    /// Released ids waiting for reuse
    free_list: Vec<u32>,
}

impl Ids {
    /// Create an allocator whose first fresh id is `base`
    pub fn new(base: u32) -> Self {
        Self {
            base,
            last: base,
            free_list: Vec::new(),
        }
    }

    /// Return an id not currently held by any other caller of this allocator
    ///
    /// # Panics
    ///
    /// Panics when the free list is empty and every id below `u32::MAX` has
    /// been issued.
    pub fn unique_id(&mut self) -> u32 {
        if let Some(id) = self.free_list.pop() {
            return id;
        }

        let id = self.last;
        let Some(next) = id.checked_add(1) else {
            panic!("id space exhausted: all ids from {} are live", self.base);
        };
        self.last = next;
        id
    }

    /// Give an id back for reuse
    ///
    /// Releasing the same id twice without reallocating it in between is a
    /// programming error. Ids outside the issued range are ignored.
    pub fn release_id(&mut self, id: u32) {
        if id < self.base || id >= self.last {
            debug_assert!(false, "id {id} was never issued by this allocator");
            log::warn!("Ignoring release of id {} never issued by this allocator", id);
            return;
        }
        debug_assert!(!self.free_list.contains(&id), "id {id} released twice");
        self.free_list.push(id);
    }

    /// Number of ids currently parked in the free list
    pub fn free_count(&self) -> usize {
        self.free_list.len()
    }

    /// Number of ids currently held by callers
    pub fn live_count(&self) -> usize {
        ((self.last - self.base) as usize).saturating_sub(self.free_list.len())
    }
}

impl Default for Ids {
    fn default() -> Self {
        Self::new(0)
    }
}
