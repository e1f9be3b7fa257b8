//! Scrollback: rows that have scrolled off the top of the primary screen.
//!
//! Rows keep their cells (attributes, hyperlinks, wide flags) and their
//! `wrapped` marker. A `VecDeque` ring gives O(1) push and eviction. Rows
//! evicted past capacity are counted so every row keeps a stable absolute
//! index: `discarded() + position`.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::grid::Row;

/// Bounded history buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scrollback {
    lines: VecDeque<Row>,
    capacity: usize,
    /// Rows ever evicted or cleared from the front.
    discarded: u64,
}

impl Scrollback {
    /// A capacity of `0` disables history: every pushed row is discarded.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
            discarded: 0,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Rows that have left history for good.
    #[must_use]
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    pub(crate) fn set_discarded(&mut self, discarded: u64) {
        self.discarded = discarded;
    }

    /// Append a row, returning the oldest row if capacity forced it out.
    pub fn push(&mut self, row: Row) -> Option<Row> {
        if self.capacity == 0 {
            self.discarded += 1;
            return Some(row);
        }
        let evicted = if self.lines.len() >= self.capacity {
            self.discarded += 1;
            self.lines.pop_front()
        } else {
            None
        };
        self.lines.push_back(row);
        evicted
    }

    /// Row by index, 0 = oldest retained.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Row> {
        self.lines.get(index)
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Row> {
        self.lines.iter()
    }

    /// Drop all history. The rows count as discarded.
    pub fn clear(&mut self) {
        self.discarded += self.lines.len() as u64;
        self.lines.clear();
    }
}

impl Default for Scrollback {
    fn default() -> Self {
        Self::new(0)
    }
}
