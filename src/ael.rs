//! The active edge list: the bounds that cross the sweep line, in order of
//! their horizontal position.
//!
//! The list is intrusive: the links live in the bounds themselves
//! (`prev_in_ael` and `next_in_ael`) and we only keep track of the head.

use crate::{
    bound::{Bound, BoundIdx, BoundVec},
    scanbeam::Scanbeam,
    Error,
};

#[derive(Clone, Debug, Default)]
pub(crate) struct ActiveEdgeList {
    pub head: Option<BoundIdx>,
}

/// Should `e2` come before `e1` in the active edge list?
///
/// Bounds are ordered by their current position. Ties are broken by looking
/// at where the two bounds go next: whichever is further to the left at the
/// lower of the two upper endpoints comes first.
pub(crate) fn e2_inserts_before_e1(e1: &Bound, e2: &Bound) -> bool {
    if e2.curr.x == e1.curr.x {
        let (t1, t2) = (e1.top(), e2.top());
        if t2.y < t1.y {
            t2.x < e1.x_at(t2.y)
        } else {
            t1.x > e2.x_at(t1.y)
        }
    } else {
        e2.curr.x < e1.curr.x
    }
}

impl ActiveEdgeList {
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Iterates over the list, from left to right.
    pub fn iter<'a>(&self, bounds: &'a BoundVec<Bound>) -> impl Iterator<Item = BoundIdx> + 'a {
        std::iter::successors(self.head, move |&b| bounds[b].next_in_ael)
    }

    pub fn contains(&self, bounds: &BoundVec<Bound>, b: BoundIdx) -> bool {
        self.head == Some(b) || bounds[b].prev_in_ael.is_some()
    }

    /// Inserts `b` into the list at its sorted position.
    ///
    /// If `start` is provided, the search for the position begins there; the
    /// caller promises that `b` belongs somewhere after it.
    pub fn insert(&mut self, bounds: &mut BoundVec<Bound>, b: BoundIdx, start: Option<BoundIdx>) {
        let Some(head) = self.head else {
            bounds[b].prev_in_ael = None;
            bounds[b].next_in_ael = None;
            self.head = Some(b);
            return;
        };

        if start.is_none() && e2_inserts_before_e1(&bounds[head], &bounds[b]) {
            bounds[b].prev_in_ael = None;
            bounds[b].next_in_ael = Some(head);
            bounds[head].prev_in_ael = Some(b);
            self.head = Some(b);
            return;
        }

        let mut cur = start.unwrap_or(head);
        while let Some(next) = bounds[cur].next_in_ael {
            if e2_inserts_before_e1(&bounds[next], &bounds[b]) {
                break;
            }
            cur = next;
        }
        let next = bounds[cur].next_in_ael;
        bounds[b].next_in_ael = next;
        if let Some(next) = next {
            bounds[next].prev_in_ael = Some(b);
        }
        bounds[b].prev_in_ael = Some(cur);
        bounds[cur].next_in_ael = Some(b);
    }

    /// Removes `b` from the list. Removing a bound that isn't in the list does nothing.
    pub fn delete(&mut self, bounds: &mut BoundVec<Bound>, b: BoundIdx) {
        let prev = bounds[b].prev_in_ael;
        let next = bounds[b].next_in_ael;
        if prev.is_none() && next.is_none() && self.head != Some(b) {
            return;
        }
        match prev {
            Some(p) => bounds[p].next_in_ael = next,
            None => self.head = next,
        }
        if let Some(n) = next {
            bounds[n].prev_in_ael = prev;
        }
        bounds[b].prev_in_ael = None;
        bounds[b].next_in_ael = None;
    }

    /// Exchanges the positions of two bounds in the list.
    pub fn swap(&mut self, bounds: &mut BoundVec<Bound>, b1: BoundIdx, b2: BoundIdx) {
        // If either one has already been removed, there's nothing to do. (A
        // bound that is alone in the list also has equal links, but then there
        // isn't another one to swap with.)
        if bounds[b1].next_in_ael == bounds[b1].prev_in_ael
            || bounds[b2].next_in_ael == bounds[b2].prev_in_ael
        {
            return;
        }

        if bounds[b1].next_in_ael == Some(b2) {
            self.swap_adjacent(bounds, b1, b2);
        } else if bounds[b2].next_in_ael == Some(b1) {
            self.swap_adjacent(bounds, b2, b1);
        } else {
            let next1 = bounds[b1].next_in_ael;
            let prev1 = bounds[b1].prev_in_ael;
            let next2 = bounds[b2].next_in_ael;
            let prev2 = bounds[b2].prev_in_ael;

            bounds[b1].next_in_ael = next2;
            if let Some(n) = next2 {
                bounds[n].prev_in_ael = Some(b1);
            }
            bounds[b1].prev_in_ael = prev2;
            if let Some(p) = prev2 {
                bounds[p].next_in_ael = Some(b1);
            }
            bounds[b2].next_in_ael = next1;
            if let Some(n) = next1 {
                bounds[n].prev_in_ael = Some(b2);
            }
            bounds[b2].prev_in_ael = prev1;
            if let Some(p) = prev1 {
                bounds[p].next_in_ael = Some(b2);
            }
        }

        if bounds[b1].prev_in_ael.is_none() {
            self.head = Some(b1);
        } else if bounds[b2].prev_in_ael.is_none() {
            self.head = Some(b2);
        }
    }

    // Swaps `left` and `right`, where `right` immediately follows `left`.
    fn swap_adjacent(&mut self, bounds: &mut BoundVec<Bound>, left: BoundIdx, right: BoundIdx) {
        let next = bounds[right].next_in_ael;
        let prev = bounds[left].prev_in_ael;
        if let Some(n) = next {
            bounds[n].prev_in_ael = Some(left);
        }
        if let Some(p) = prev {
            bounds[p].next_in_ael = Some(right);
        }
        bounds[right].prev_in_ael = prev;
        bounds[right].next_in_ael = Some(left);
        bounds[left].prev_in_ael = Some(right);
        bounds[left].next_in_ael = next;
    }

    /// Moves `b` on to its next edge, keeping its place in the list.
    ///
    /// Fails if `b` is already on its last edge.
    pub fn advance(
        &mut self,
        bounds: &mut BoundVec<Bound>,
        b: BoundIdx,
        scanbeam: &mut Scanbeam,
    ) -> Result<(), Error> {
        let bound = &mut bounds[b];
        if bound.next_edge().is_none() {
            return Err(Error::InvalidState {
                what: "advanced a bound past its last edge",
                y: bound.curr.y,
            });
        }
        bound.current_edge += 1;
        bound.curr = bound.bot();
        tracing::trace!(bound = ?b, edge = ?bound.edge(), "advanced");
        if !bound.is_horizontal() {
            scanbeam.push(bound.top().y);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    use super::*;
    use crate::{bound::add_line, geom::Point, minima::LocalMinimumList};

    // Makes one bound out of each polyline, all of which should be ascending.
    fn make_bounds(lines: &[Vec<(i64, i64)>]) -> BoundVec<Bound> {
        let mut bounds = BoundVec::default();
        let mut minima = LocalMinimumList::default();
        for line in lines {
            let pts: Vec<_> = line.iter().map(|&p| Point::from(p)).collect();
            add_line(&mut bounds, &mut minima, &pts);
        }
        assert_eq!(bounds.len(), lines.len());
        bounds
    }

    fn order(ael: &ActiveEdgeList, bounds: &BoundVec<Bound>) -> Vec<usize> {
        ael.iter(bounds).map(|b| b.0).collect()
    }

    // Checks that the forward and backward links agree.
    fn check_links(ael: &ActiveEdgeList, bounds: &BoundVec<Bound>) {
        let mut prev = None;
        for b in ael.iter(bounds) {
            assert_eq!(bounds[b].prev_in_ael, prev);
            prev = Some(b);
        }
    }

    #[test]
    fn insert_sorted() {
        let mut bounds = make_bounds(&[
            vec![(5, 0), (5, 10)],
            vec![(0, 0), (0, 10)],
            vec![(10, 0), (10, 10)],
            // Ties with the first, but heads off to the left.
            vec![(5, 0), (3, 10)],
        ]);
        let mut ael = ActiveEdgeList::default();
        for b in bounds.indices().collect::<Vec<_>>() {
            ael.insert(&mut bounds, b, None);
        }
        assert_eq!(order(&ael, &bounds), vec![1, 3, 0, 2]);
        check_links(&ael, &bounds);
        assert!(bounds.indices().all(|b| ael.contains(&bounds, b)));
    }

    #[test]
    fn tie_break_on_lower_top() {
        // Both start at the origin. The second one is shorter, so the
        // comparison happens at its top, where it is further left.
        let bounds = make_bounds(&[vec![(0, 0), (10, 10)], vec![(0, 0), (2, 5)]]);
        assert!(e2_inserts_before_e1(&bounds[BoundIdx(0)], &bounds[BoundIdx(1)]));
        assert!(!e2_inserts_before_e1(&bounds[BoundIdx(1)], &bounds[BoundIdx(0)]));
    }

    #[test]
    fn delete_unlinked_is_noop() {
        let mut bounds = make_bounds(&[vec![(0, 0), (0, 10)], vec![(5, 0), (5, 10)]]);
        let mut ael = ActiveEdgeList::default();
        ael.insert(&mut bounds, BoundIdx(0), None);

        ael.delete(&mut bounds, BoundIdx(1));
        assert_eq!(order(&ael, &bounds), vec![0]);

        ael.delete(&mut bounds, BoundIdx(0));
        assert!(ael.is_empty());
        ael.delete(&mut bounds, BoundIdx(0));
        assert!(ael.is_empty());
    }

    #[test]
    fn swap_adjacent_and_distant() {
        let mut bounds = make_bounds(&[
            vec![(0, 0), (0, 10)],
            vec![(1, 0), (1, 10)],
            vec![(2, 0), (2, 10)],
            vec![(3, 0), (3, 10)],
        ]);
        let mut ael = ActiveEdgeList::default();
        for b in bounds.indices().collect::<Vec<_>>() {
            ael.insert(&mut bounds, b, None);
        }

        ael.swap(&mut bounds, BoundIdx(0), BoundIdx(1));
        assert_eq!(order(&ael, &bounds), vec![1, 0, 2, 3]);
        check_links(&ael, &bounds);

        ael.swap(&mut bounds, BoundIdx(3), BoundIdx(1));
        assert_eq!(order(&ael, &bounds), vec![3, 0, 2, 1]);
        check_links(&ael, &bounds);

        // Swapping with something that isn't in the list does nothing.
        ael.delete(&mut bounds, BoundIdx(2));
        ael.swap(&mut bounds, BoundIdx(2), BoundIdx(0));
        assert_eq!(order(&ael, &bounds), vec![3, 0, 1]);
    }

    #[test]
    fn advance() {
        let mut bounds = make_bounds(&[vec![(0, 0), (0, 5), (3, 5), (4, 10)]]);
        let mut ael = ActiveEdgeList::default();
        let mut scanbeam = Scanbeam::default();
        let b = BoundIdx(0);
        ael.insert(&mut bounds, b, None);

        ael.advance(&mut bounds, b, &mut scanbeam).unwrap();
        assert!(bounds[b].is_horizontal());
        assert_eq!(bounds[b].curr, Point::new(0, 5));
        // Horizontal edges don't schedule anything.
        assert_eq!(scanbeam.pop_min(), None);

        ael.advance(&mut bounds, b, &mut scanbeam).unwrap();
        assert_eq!(bounds[b].curr, Point::new(3, 5));
        assert_eq!(scanbeam.pop_min(), Some(10));
        assert_eq!(ael.head, Some(b));

        assert_matches!(
            ael.advance(&mut bounds, b, &mut scanbeam),
            Err(Error::InvalidState { .. })
        );
    }

    proptest! {
        #[test]
        fn insertion_order_is_sorted(xs in proptest::collection::vec((-20i64..20, -20i64..20), 1..12)) {
            let lines: Vec<_> = xs.iter().map(|&(x0, x1)| vec![(x0, 0), (x1, 10)]).collect();
            let mut bounds = make_bounds(&lines);
            let mut ael = ActiveEdgeList::default();
            for b in bounds.indices().collect::<Vec<_>>() {
                ael.insert(&mut bounds, b, None);
            }
            check_links(&ael, &bounds);
            let ord = order(&ael, &bounds);
            prop_assert_eq!(ord.len(), xs.len());
            for w in ord.windows(2) {
                let (a, b) = (&bounds[BoundIdx(w[0])], &bounds[BoundIdx(w[1])]);
                prop_assert!(a.curr.x <= b.curr.x);
                if a.curr.x == b.curr.x {
                    prop_assert!(a.top().x <= b.top().x);
                }
            }
        }
    }
}
