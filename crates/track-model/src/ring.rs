//! Fixed-capacity ring buffer for bounded per-session histories.

use serde::{Serialize, Serializer};

/// A fixed-capacity circular buffer.
///
/// Pushing into a full buffer overwrites the oldest entry. Iteration is
/// always oldest first. Storage is allocated once and reused; entries are
/// addressed through a write cursor instead of shifting.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    slots: Vec<T>,
    capacity: usize,
    /// Slot the next push writes to. While the buffer is filling this equals
    /// `slots.len()`; once full it is the index of the oldest entry.
    next: usize,
}

impl<T> RingBuffer<T> {
    /// Create an empty buffer. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            next: 0,
        }
    }

    /// Append an entry, evicting and returning the oldest one when full.
    pub fn push(&mut self, value: T) -> Option<T> {
        let evicted = if self.slots.len() < self.capacity {
            self.slots.push(value);
            None
        } else {
            Some(std::mem::replace(&mut self.slots[self.next], value))
        };
        self.next = (self.next + 1) % self.capacity;
        evicted
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entry at `index`, counting from the oldest (0).
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.slots.len() {
            return None;
        }
        Some(&self.slots[(self.next + index) % self.slots.len()])
    }

    /// Entry `back` positions before the newest (0 = newest).
    pub fn nth_newest(&self, back: usize) -> Option<&T> {
        let len = self.slots.len();
        if back >= len {
            return None;
        }
        self.get(len - 1 - back)
    }

    /// The most recently pushed entry.
    pub fn newest(&self) -> Option<&T> {
        self.nth_newest(0)
    }

    /// The oldest retained entry.
    pub fn oldest(&self) -> Option<&T> {
        self.get(0)
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        let (newer, older) = self.slots.split_at(self.next.min(self.slots.len()));
        older.iter().chain(newer.iter())
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.next = 0;
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Copy the contents out, oldest first.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

impl<T> Extend<T> for RingBuffer<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}

impl<T: Serialize> Serialize for RingBuffer<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}
