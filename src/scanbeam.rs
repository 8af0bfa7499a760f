//! The queue of heights at which the active edge list changes.

use std::collections::BTreeSet;

/// A deduplicated queue of `y` coordinates, popped in increasing order.
#[derive(Clone, Debug, Default)]
pub(crate) struct Scanbeam {
    ys: BTreeSet<i64>,
}

impl Scanbeam {
    /// Schedules `y`; scheduling a height twice has no extra effect.
    pub fn push(&mut self, y: i64) {
        self.ys.insert(y);
    }

    pub fn pop_min(&mut self) -> Option<i64> {
        self.ys.pop_first()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.ys.len()
    }
}
