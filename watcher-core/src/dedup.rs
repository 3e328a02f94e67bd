//! Bounded recency cache of normalized lines.
//!
//! The overlay keeps showing the same chat lines across consecutive samples;
//! this window makes each line count once per session. FIFO eviction, O(1)
//! membership via a set mirrored from the queue.

use std::collections::{HashSet, VecDeque};

pub const DEFAULT_CAPACITY: usize = 50;

#[derive(Debug, Clone)]
pub struct DedupWindow {
    capacity: usize,
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl Default for DedupWindow {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl DedupWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity + 1),
            members: HashSet::with_capacity(capacity + 1),
        }
    }

    /// Returns true (state unchanged) if `line` is already in the window.
    /// Otherwise records it, evicting the oldest entry past capacity, and returns false.
    pub fn seen(&mut self, line: &str) -> bool {
        if self.members.contains(line) {
            return true;
        }

        self.order.push_back(line.to_string());
        self.members.insert(line.to_string());

        while self.order.len() > self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.members.remove(&old);
            }
        }

        false
    }

    /// Forget everything (capture region or configuration changed).
    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
