//! The list of local minima, which feeds new bounds into the sweep.

use crate::bound::BoundIdx;

/// A place where one or two bounds start.
///
/// Closed rings always produce both bounds. Open polylines produce a single
/// bound at their end points, and possibly a second one holding horizontal
/// edges that were moved off the left bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct LocalMinimum {
    pub left_bound: Option<BoundIdx>,
    pub right_bound: Option<BoundIdx>,
    pub y: i64,
    /// Does one of the bounds start with horizontal edges?
    pub has_horizontal: bool,
}

/// The local minima of all the input paths, popped in sweep order.
#[derive(Clone, Debug, Default)]
pub(crate) struct LocalMinimumList {
    minima: Vec<LocalMinimum>,
    cursor: usize,
}

impl LocalMinimumList {
    pub fn push(&mut self, lm: LocalMinimum) {
        self.minima.push(lm);
    }

    pub fn len(&self) -> usize {
        self.minima.len()
    }

    /// Drops every minimum from `len` onwards.
    pub fn truncate(&mut self, len: usize) {
        self.minima.truncate(len);
    }

    pub fn iter(&self) -> impl Iterator<Item = &LocalMinimum> + '_ {
        self.minima.iter()
    }

    /// Sorts the minima into sweep order and rewinds the cursor.
    ///
    /// Minima at the same height that start with a horizontal edge come first.
    /// The sort is stable, so otherwise minima come out in insertion order.
    pub fn reset(&mut self) {
        self.minima.sort_by_key(|lm| (lm.y, !lm.has_horizontal));
        self.cursor = 0;
    }

    /// Pops the next minimum, provided that it starts at height `y`.
    pub fn pop_at(&mut self, y: i64) -> Option<LocalMinimum> {
        let lm = self.minima.get(self.cursor)?;
        if lm.y == y {
            self.cursor += 1;
            Some(*lm)
        } else {
            None
        }
    }

    /// Are there any minima left to pop?
    pub fn has_pending(&self) -> bool {
        self.cursor < self.minima.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lm(y: i64, has_horizontal: bool, idx: usize) -> LocalMinimum {
        LocalMinimum {
            left_bound: Some(BoundIdx(idx)),
            right_bound: None,
            y,
            has_horizontal,
        }
    }

    #[test]
    fn pops_in_sweep_order() {
        let mut list = LocalMinimumList::default();
        list.push(lm(5, false, 0));
        list.push(lm(1, false, 1));
        list.push(lm(5, true, 2));
        list.push(lm(1, false, 3));
        list.reset();

        assert_eq!(list.pop_at(0), None);
        assert_eq!(list.pop_at(1).unwrap().left_bound, Some(BoundIdx(1)));
        assert_eq!(list.pop_at(1).unwrap().left_bound, Some(BoundIdx(3)));
        assert_eq!(list.pop_at(1), None);
        assert!(list.has_pending());
        // The horizontal one jumps the queue.
        assert_eq!(list.pop_at(5).unwrap().left_bound, Some(BoundIdx(2)));
        assert_eq!(list.pop_at(5).unwrap().left_bound, Some(BoundIdx(0)));
        assert!(!list.has_pending());
        assert_eq!(list.pop_at(5), None);
    }
}
