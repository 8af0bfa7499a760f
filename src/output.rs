//! Output rings, and stitching them together.
//!
//! While the sweep runs, every contributing bound appends points to an output
//! ring. A ring is a circular doubly-linked chain of points: the ring's
//! `points` is its left-most end (where the left bound writes) and
//! `points.prev` is its right-most end (where the right bound writes). When two
//! bounds with different rings meet at a local maximum the rings get spliced
//! together, and once the sweep is over the recorded joins merge rings that
//! share collinear edges.

use std::collections::HashMap;

use crate::{
    ael::ActiveEdgeList,
    bound::{Bound, BoundIdx, BoundVec, Side},
    geom::{pt2_is_between, signed_area, slopes_equal, slopes_equal4, Point, HORIZONTAL_DX},
    ClipOptions, Error, Solution,
};

typed_vec!(
    /// An index into the arena of output points.
    OutPtVec,
    OutPtIdx,
    "pt"
);
typed_vec!(
    /// An index into the arena of output rings.
    RingVec,
    RingIdx,
    "ring"
);

#[derive(Clone, Copy, Debug)]
pub(crate) struct OutPt {
    pub pt: Point,
    /// The ring this point was created for. That ring may since have been
    /// merged into another one; see [`Output::resolve`].
    pub ring: RingIdx,
    pub next: OutPtIdx,
    pub prev: OutPtIdx,
}

#[derive(Clone, Debug)]
pub(crate) struct OutRing {
    /// The ring that this one was merged into, or this ring itself.
    pub idx: RingIdx,
    /// The left-most end of the ring, or `None` if the ring was merged away
    /// or cleaned out of existence.
    pub points: Option<OutPtIdx>,
    pub is_hole: bool,
    pub is_open: bool,
    /// The ring that immediately contains this one, if we know about it.
    pub first_left: Option<RingIdx>,
}

/// A request to merge two output points that lie on a shared collinear edge.
///
/// For a horizontal join, `off_point` has the same `y` as the points and
/// marks the other end of the shared horizontal stretch. Otherwise both
/// points are at the bottom of the shared edge and `off_point` is above them
/// on it.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Join {
    pub point1: OutPtIdx,
    pub point2: OutPtIdx,
    pub off_point: Point,
}

/// The start of a horizontal output edge that may later turn out to overlap
/// with another horizontal output edge on the same scanline.
#[derive(Clone, Copy, Debug)]
pub(crate) struct GhostJoin {
    pub point: OutPtIdx,
    pub off_point: Point,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct Output {
    pub points: OutPtVec<OutPt>,
    pub rings: RingVec<OutRing>,
    pub joins: Vec<Join>,
    pub ghost_joins: Vec<GhostJoin>,
}

/// Where two horizontal spans overlap, if they overlap in more than a point.
pub(crate) fn get_overlap(a1: i64, a2: i64, b1: i64, b2: i64) -> Option<(i64, i64)> {
    let (a_min, a_max) = (a1.min(a2), a1.max(a2));
    let (b_min, b_max) = (b1.min(b2), b1.max(b2));
    let left = a_min.max(b_min);
    let right = a_max.min(b_max);
    (left < right).then_some((left, right))
}

/// Do the horizontal spans `seg1a -- seg1b` and `seg2a -- seg2b` overlap in more than a point?
pub(crate) fn horz_segments_overlap(seg1a: i64, seg1b: i64, seg2a: i64, seg2b: i64) -> bool {
    get_overlap(seg1a, seg1b, seg2a, seg2b).is_some()
}

impl Output {
    pub fn point(&self, op: OutPtIdx) -> Point {
        self.points[op].pt
    }

    fn next(&self, op: OutPtIdx) -> OutPtIdx {
        self.points[op].next
    }

    fn prev(&self, op: OutPtIdx) -> OutPtIdx {
        self.points[op].prev
    }

    // Iterates over a circular chain of points, starting at `start`.
    fn chain(&self, start: OutPtIdx) -> impl Iterator<Item = OutPtIdx> + '_ {
        let mut cur = Some(start);
        std::iter::from_fn(move || {
            let ret = cur?;
            let next = self.points[ret].next;
            cur = (next != start).then_some(next);
            Some(ret)
        })
    }

    fn new_ring(&mut self, is_open: bool) -> RingIdx {
        let idx = RingIdx(self.rings.len());
        self.rings.push(OutRing {
            idx,
            points: None,
            is_hole: false,
            is_open,
            first_left: None,
        })
    }

    fn new_point(&mut self, pt: Point, ring: RingIdx) -> OutPtIdx {
        let idx = OutPtIdx(self.points.len());
        self.points.push(OutPt {
            pt,
            ring,
            next: idx,
            prev: idx,
        })
    }

    /// Follows the chain of merged rings to the ring that is still alive.
    pub fn resolve(&self, mut ring: RingIdx) -> RingIdx {
        while self.rings[ring].idx != ring {
            ring = self.rings[ring].idx;
        }
        ring
    }

    /// Adds a point to the ring that `b` is writing to, starting a new ring if necessary.
    ///
    /// Returns the new point. If the new point would duplicate the end of the
    /// ring that `b` writes to, nothing is added and that end is returned.
    pub fn add_point(
        &mut self,
        bounds: &mut BoundVec<Bound>,
        b: BoundIdx,
        pt: Point,
    ) -> Result<OutPtIdx, Error> {
        let Some(ring) = bounds[b].ring else {
            let ring = self.new_ring(bounds[b].is_open());
            let op = self.new_point(pt, ring);
            self.rings[ring].points = Some(op);
            if !bounds[b].is_open() {
                self.set_hole_state(bounds, b, ring);
            }
            bounds[b].ring = Some(ring);
            tracing::trace!(bound = ?b, ?ring, ?pt, "new ring");
            return Ok(op);
        };

        let first = self.rings[ring].points.ok_or(Error::InvalidState {
            what: "added a point to a ring that has been closed",
            y: pt.y,
        })?;
        let to_front = bounds[b].side == Side::Left;
        if to_front && pt == self.point(first) {
            return Ok(first);
        }
        let last = self.prev(first);
        if !to_front && pt == self.point(last) {
            return Ok(last);
        }

        let op = self.new_point(pt, ring);
        self.points[op].next = first;
        self.points[op].prev = last;
        self.points[last].next = op;
        self.points[first].prev = op;
        if to_front {
            self.rings[ring].points = Some(op);
        }
        Ok(op)
    }

    // A new ring is a hole if it has an odd number of rings to its left,
    // ignoring the ones that we're completely to the right of.
    fn set_hole_state(&mut self, bounds: &BoundVec<Bound>, b: BoundIdx, ring: RingIdx) {
        let mut tmp: Option<RingIdx> = None;
        let mut e = bounds[b].prev_in_ael;
        while let Some(idx) = e {
            let other = &bounds[idx];
            if let Some(r) = other.ring {
                if other.winding_delta != 0 {
                    tmp = match tmp {
                        None => Some(r),
                        Some(t) if t == r => None,
                        t => t,
                    };
                }
            }
            e = other.prev_in_ael;
        }
        self.rings[ring].first_left = tmp;
        self.rings[ring].is_hole = tmp.is_some_and(|t| !self.rings[t].is_hole);
    }

    /// The point most recently added by `b`, which must be contributing.
    pub fn last_point(&self, bounds: &BoundVec<Bound>, b: BoundIdx) -> Option<OutPtIdx> {
        let first = self.rings[bounds[b].ring?].points?;
        Some(match bounds[b].side {
            Side::Left => first,
            Side::Right => self.prev(first),
        })
    }

    pub fn add_join(&mut self, point1: OutPtIdx, point2: OutPtIdx, off_point: Point) {
        tracing::trace!(?point1, ?point2, ?off_point, "join");
        self.joins.push(Join {
            point1,
            point2,
            off_point,
        });
    }

    pub fn add_ghost_join(&mut self, point: OutPtIdx, off_point: Point) {
        self.ghost_joins.push(GhostJoin { point, off_point });
    }

    /// Starts a new ring at a local minimum, shared by the bounds `e1` and `e2`.
    pub fn add_local_min_poly(
        &mut self,
        bounds: &mut BoundVec<Bound>,
        e1: BoundIdx,
        e2: BoundIdx,
        pt: Point,
    ) -> Result<OutPtIdx, Error> {
        let (left, right) = if bounds[e2].is_horizontal() || bounds[e1].dx() < bounds[e2].dx() {
            (e1, e2)
        } else {
            (e2, e1)
        };
        let result = self.add_point(bounds, left, pt)?;
        bounds[right].ring = bounds[left].ring;
        bounds[left].side = Side::Left;
        bounds[right].side = Side::Right;

        let prev = if bounds[left].prev_in_ael == Some(right) {
            bounds[right].prev_in_ael
        } else {
            bounds[left].prev_in_ael
        };

        // If the bound to our left runs along our left edge, their output
        // will need to be joined up with ours.
        if let Some(prev) = prev {
            let (p, e) = (&bounds[prev], &bounds[left]);
            if p.ring.is_some() && p.top().y > pt.y && e.top().y > pt.y {
                let x_prev = p.x_at(pt.y);
                let x_e = e.x_at(pt.y);
                if x_prev == x_e
                    && e.winding_delta != 0
                    && p.winding_delta != 0
                    && slopes_equal4(
                        Point::new(x_prev, pt.y),
                        p.top(),
                        Point::new(x_e, pt.y),
                        e.top(),
                    )
                {
                    let off_point = e.top();
                    let op = self.add_point(bounds, prev, pt)?;
                    self.add_join(result, op, off_point);
                }
            }
        }
        Ok(result)
    }

    /// Closes off the output of the bounds `e1` and `e2` at a local maximum.
    pub fn add_local_max_poly(
        &mut self,
        bounds: &mut BoundVec<Bound>,
        ael: &ActiveEdgeList,
        e1: BoundIdx,
        e2: BoundIdx,
        pt: Point,
    ) -> Result<(), Error> {
        self.add_point(bounds, e1, pt)?;
        if bounds[e2].is_open() {
            self.add_point(bounds, e2, pt)?;
        }
        match (bounds[e1].ring, bounds[e2].ring) {
            (Some(r1), Some(r2)) if r1 == r2 => {
                bounds[e1].ring = None;
                bounds[e2].ring = None;
            }
            (Some(r1), Some(r2)) if r1 < r2 => self.append_polygon(bounds, ael, e1, e2),
            (Some(_), Some(_)) => self.append_polygon(bounds, ael, e2, e1),
            _ => {
                return Err(Error::InvalidState {
                    what: "closed a local maximum of a non-contributing bound",
                    y: pt.y,
                })
            }
        }
        Ok(())
    }

    // Appends the ring of `e2` onto the ring of `e1`. Both bounds must be contributing.
    fn append_polygon(
        &mut self,
        bounds: &mut BoundVec<Bound>,
        ael: &ActiveEdgeList,
        e1: BoundIdx,
        e2: BoundIdx,
    ) {
        let (Some(r1), Some(r2)) = (bounds[e1].ring, bounds[e2].ring) else {
            return;
        };
        let hole_state = self.hole_state_ring(r1, r2);

        let (Some(p1_lft), Some(p2_lft)) = (self.rings[r1].points, self.rings[r2].points) else {
            return;
        };
        let p1_rt = self.prev(p1_lft);
        let p2_rt = self.prev(p2_lft);

        let side = bounds[e1].side;
        match (side, bounds[e2].side) {
            (Side::Left, Side::Left) => {
                // z y x a b c
                self.reverse_links(p2_lft);
                self.points[p2_lft].next = p1_lft;
                self.points[p1_lft].prev = p2_lft;
                self.points[p1_rt].next = p2_rt;
                self.points[p2_rt].prev = p1_rt;
                self.rings[r1].points = Some(p2_rt);
            }
            (Side::Left, Side::Right) => {
                // x y z a b c
                self.points[p2_rt].next = p1_lft;
                self.points[p1_lft].prev = p2_rt;
                self.points[p2_lft].prev = p1_rt;
                self.points[p1_rt].next = p2_lft;
                self.rings[r1].points = Some(p2_lft);
            }
            (Side::Right, Side::Right) => {
                // a b c z y x
                self.reverse_links(p2_lft);
                self.points[p1_rt].next = p2_rt;
                self.points[p2_rt].prev = p1_rt;
                self.points[p2_lft].next = p1_lft;
                self.points[p1_lft].prev = p2_lft;
            }
            (Side::Right, Side::Left) => {
                // a b c x y z
                self.points[p1_rt].next = p2_lft;
                self.points[p2_lft].prev = p1_rt;
                self.points[p1_lft].prev = p2_rt;
                self.points[p2_rt].next = p1_lft;
            }
        }

        if hole_state == r2 {
            if self.rings[r2].first_left != Some(r1) {
                self.rings[r1].first_left = self.rings[r2].first_left;
            }
            self.rings[r1].is_hole = self.rings[r2].is_hole;
        }
        self.rings[r2].points = None;
        self.rings[r2].first_left = Some(r1);

        bounds[e1].ring = None;
        bounds[e2].ring = None;
        let obsolete = ael.iter(bounds).find(|&b| bounds[b].ring == Some(r2));
        if let Some(b) = obsolete {
            bounds[b].ring = Some(r1);
            bounds[b].side = side;
        }
        self.rings[r2].idx = self.rings[r1].idx;
    }

    fn reverse_links(&mut self, start: OutPtIdx) {
        let mut op = start;
        loop {
            let p = &mut self.points[op];
            let next = p.next;
            std::mem::swap(&mut p.next, &mut p.prev);
            op = next;
            if op == start {
                break;
            }
        }
    }

    // Is `r2` one of the rings that contain `r1`?
    fn ring1_right_of_ring2(&self, r1: RingIdx, r2: RingIdx) -> bool {
        let mut r = r1;
        // The containment chain can't be longer than the number of rings.
        for _ in 0..self.rings.len() {
            match self.rings[r].first_left {
                Some(f) if f == r2 => return true,
                Some(f) => r = f,
                None => return false,
            }
        }
        false
    }

    // Of two rings that are about to be merged, which one has the correct
    // hole state (and containing ring) for the merged result?
    fn hole_state_ring(&self, r1: RingIdx, r2: RingIdx) -> RingIdx {
        if self.ring1_right_of_ring2(r1, r2) {
            r2
        } else if self.ring1_right_of_ring2(r2, r1) {
            r1
        } else {
            self.lowermost_ring(r1, r2)
        }
    }

    // The lowest (then left-most) point of the ring. If the ring passes
    // through that point more than once, this picks the visit with the
    // flattest edges.
    fn bottom_point(&self, start: OutPtIdx) -> OutPtIdx {
        let mut best = start;
        let mut dups = None;
        let mut p = self.next(best);
        while p != best {
            let (pt, best_pt) = (self.point(p), self.point(best));
            if pt < best_pt {
                best = p;
                dups = None;
            } else if pt == best_pt && self.next(p) != best && self.prev(p) != best {
                dups = Some(p);
            }
            p = self.next(p);
        }

        if let Some(mut dup) = dups {
            // Here `p == best`, and every duplicate shares its position.
            while dup != p {
                if !self.first_is_bottom_point(p, dup) {
                    best = dup;
                }
                dup = self.next(dup);
                while self.point(dup) != self.point(best) {
                    dup = self.next(dup);
                }
            }
        }
        best
    }

    // Of two visits to the same bottom point, is the first one the outer one?
    fn first_is_bottom_point(&self, b1: OutPtIdx, b2: OutPtIdx) -> bool {
        let abs_dx = |b: OutPtIdx, forward: bool| {
            let step = |op| if forward { self.next(op) } else { self.prev(op) };
            let pt = self.point(b);
            let mut q = step(b);
            while self.point(q) == pt && q != b {
                q = step(q);
            }
            let q = self.point(q);
            if q.y == pt.y {
                HORIZONTAL_DX
            } else {
                ((q.x - pt.x) as f64 / (q.y - pt.y) as f64).abs()
            }
        };
        let (dx1p, dx1n) = (abs_dx(b1, false), abs_dx(b1, true));
        let (dx2p, dx2n) = (abs_dx(b2, false), abs_dx(b2, true));

        if dx1p.max(dx1n) == dx2p.max(dx2n) && dx1p.min(dx1n) == dx2p.min(dx2n) {
            self.chain_area(b1) > 0.0
        } else {
            (dx1p >= dx2p && dx1p >= dx2n) || (dx1n >= dx2p && dx1n >= dx2n)
        }
    }

    fn lowermost_ring(&self, r1: RingIdx, r2: RingIdx) -> RingIdx {
        let (Some(p1), Some(p2)) = (self.rings[r1].points, self.rings[r2].points) else {
            return r1;
        };
        let b1 = self.bottom_point(p1);
        let b2 = self.bottom_point(p2);
        let (pt1, pt2) = (self.point(b1), self.point(b2));
        if pt1 < pt2 {
            r1
        } else if pt2 < pt1 {
            r2
        } else if self.next(b1) == b1 {
            r2
        } else if self.prev(b1) == b1 || self.first_is_bottom_point(b1, b2) {
            r1
        } else {
            r2
        }
    }

    /// Twice the signed area of a closed ring, walking it in `next` order.
    fn area(&self, ring: RingIdx) -> f64 {
        match self.rings[ring].points {
            Some(start) => self.chain_area(start),
            None => 0.0,
        }
    }

    fn chain_area(&self, start: OutPtIdx) -> f64 {
        let mut a = 0.0;
        for op in self.chain(start) {
            let (prev, p) = (self.point(self.prev(op)), self.point(op));
            a += (prev.x as f64 + p.x as f64) * (p.y as f64 - prev.y as f64);
        }
        a
    }

    // Puts the ring in the output orientation: holes go one way and
    // everything else goes the other way.
    fn orient(&mut self, ring: RingIdx, reverse_output: bool) {
        let r = &self.rings[ring];
        let Some(start) = r.points else {
            return;
        };
        if (r.is_hole ^ reverse_output) == (self.area(ring) > 0.0) {
            self.reverse_links(start);
        }
    }

    /// Is `pt` inside the ring that contains `start`? Returns `None` if `pt`
    /// is on the ring's boundary.
    fn point_in_ring(&self, pt: Point, start: OutPtIdx) -> Option<bool> {
        let mut inside = false;
        let side = |a: Point, b: Point| {
            (a.x as i128 - pt.x as i128) * (b.y as i128 - pt.y as i128)
                - (b.x as i128 - pt.x as i128) * (a.y as i128 - pt.y as i128)
        };
        for op in self.chain(start) {
            let a = self.point(op);
            let b = self.point(self.next(op));
            if b.y == pt.y && (b.x == pt.x || (a.y == pt.y && ((b.x > pt.x) == (a.x < pt.x)))) {
                return None;
            }
            if (a.y < pt.y) != (b.y < pt.y) {
                if a.x >= pt.x && b.x > pt.x {
                    inside = !inside;
                } else if a.x >= pt.x || b.x > pt.x {
                    let d = side(a, b);
                    if d == 0 {
                        return None;
                    }
                    if (d > 0) == (b.y > a.y) {
                        inside = !inside;
                    }
                }
            }
        }
        Some(inside)
    }

    // Does `outer` contain `inner`? Decided by the first vertex of `inner`
    // that isn't on the boundary of `outer`.
    fn ring_contains(&self, outer: RingIdx, inner: RingIdx) -> bool {
        let (Some(outer), Some(inner)) = (self.rings[outer].points, self.rings[inner].points) else {
            return false;
        };
        self.chain(inner)
            .find_map(|op| self.point_in_ring(self.point(op), outer))
            .unwrap_or(true)
    }

    fn dup_point(&mut self, op: OutPtIdx, insert_after: bool) -> OutPtIdx {
        let OutPt { pt, ring, .. } = self.points[op];
        let new = self.new_point(pt, ring);
        if insert_after {
            let next = self.next(op);
            self.points[new].next = next;
            self.points[new].prev = op;
            self.points[next].prev = new;
            self.points[op].next = new;
        } else {
            let prev = self.prev(op);
            self.points[new].prev = prev;
            self.points[new].next = op;
            self.points[prev].next = new;
            self.points[op].prev = new;
        }
        new
    }

    fn update_point_rings(&mut self, ring: RingIdx) {
        let Some(start) = self.rings[ring].points else {
            return;
        };
        let pts: Vec<_> = self.chain(start).collect();
        for op in pts {
            self.points[op].ring = ring;
        }
    }

    // Finds the neighbor of `op` that heads up towards `off_point` along a
    // non-horizontal join. The boolean is true if that neighbor is `op.prev`.
    fn join_neighbor(&self, op: OutPtIdx, off_point: Point) -> Option<(OutPtIdx, bool)> {
        let pt = self.point(op);
        let heads_away = |b: OutPtIdx| {
            let b_pt = self.point(b);
            b_pt.y < pt.y || !slopes_equal(pt, b_pt, off_point)
        };

        let mut b = self.next(op);
        while self.point(b) == pt && b != op {
            b = self.next(b);
        }
        if !heads_away(b) {
            return Some((b, false));
        }
        b = self.prev(op);
        while self.point(b) == pt && b != op {
            b = self.prev(b);
        }
        (!heads_away(b)).then_some((b, true))
    }

    // Tries to merge the two chains at the points of the join. If the two
    // points belong to the same ring, the ring gets split in two instead.
    fn join_points(&mut self, j: &mut Join, r1: RingIdx, r2: RingIdx) -> bool {
        let mut op1 = j.point1;
        let mut op2 = j.point2;

        if self.point(op1).y == j.off_point.y {
            // A horizontal join. The points may be anywhere on the horizontal
            // edges, so first find the extent of those edges.
            let y = |op| self.point(op).y;
            let mut op1b = op1;
            while y(self.prev(op1)) == y(op1) && self.prev(op1) != op1b && self.prev(op1) != op2 {
                op1 = self.prev(op1);
            }
            while y(self.next(op1b)) == y(op1b) && self.next(op1b) != op1 && self.next(op1b) != op2
            {
                op1b = self.next(op1b);
            }
            if self.next(op1b) == op1 || self.next(op1b) == op2 {
                // A flat ring.
                return false;
            }

            let mut op2b = op2;
            while y(self.prev(op2)) == y(op2) && self.prev(op2) != op2b && self.prev(op2) != op1b {
                op2 = self.prev(op2);
            }
            while y(self.next(op2b)) == y(op2b) && self.next(op2b) != op2 && self.next(op2b) != op1
            {
                op2b = self.next(op2b);
            }
            if self.next(op2b) == op2 || self.next(op2b) == op1 {
                return false;
            }

            let x = |op| self.point(op).x;
            let Some((left, right)) = get_overlap(x(op1), x(op1b), x(op2), x(op2b)) else {
                return false;
            };

            // Joining the overlapping edges creates a spike that gets removed
            // later. Choose which side to discard so that op1 and op2 (which
            // other joins might refer to) survive.
            let in_overlap = |op| (left..=right).contains(&x(op));
            let (pt, discard_left) = if in_overlap(op1) {
                (self.point(op1), x(op1) > x(op1b))
            } else if in_overlap(op2) {
                (self.point(op2), x(op2) > x(op2b))
            } else if in_overlap(op1b) {
                (self.point(op1b), x(op1b) > x(op1))
            } else {
                (self.point(op2b), x(op2b) > x(op2))
            };
            j.point1 = op1;
            j.point2 = op2;
            self.join_horz(op1, op1b, op2, op2b, pt, discard_left)
        } else {
            // Both points are at the bottom of a shared edge. Find out which
            // way along each ring the shared edge goes.
            let Some((op1b, reverse1)) = self.join_neighbor(op1, j.off_point) else {
                return false;
            };
            let Some((op2b, reverse2)) = self.join_neighbor(op2, j.off_point) else {
                return false;
            };
            if op1b == op1 || op2b == op2 || op1b == op2b || (r1 == r2 && reverse1 == reverse2) {
                return false;
            }

            let op1b = if reverse1 {
                let op1b = self.dup_point(op1, false);
                let op2b = self.dup_point(op2, true);
                self.points[op1].prev = op2;
                self.points[op2].next = op1;
                self.points[op1b].next = op2b;
                self.points[op2b].prev = op1b;
                op1b
            } else {
                let op1b = self.dup_point(op1, true);
                let op2b = self.dup_point(op2, false);
                self.points[op1].next = op2;
                self.points[op2].prev = op1;
                self.points[op1b].prev = op2b;
                self.points[op2b].next = op1b;
                op1b
            };
            j.point1 = op1;
            j.point2 = op1b;
            true
        }
    }

    // Moves along a horizontal run of points starting at `op`, to the
    // place where the join at `pt` should cut it. Returns the cut point and
    // its duplicate.
    fn cut_horizontal(
        &mut self,
        mut op: OutPtIdx,
        left_to_right: bool,
        pt: Point,
        discard_left: bool,
    ) -> (OutPtIdx, OutPtIdx) {
        let insert_after = if left_to_right {
            loop {
                let next = self.point(self.next(op));
                if next.x > pt.x || next.x < self.point(op).x || next.y != pt.y {
                    break;
                }
                op = self.next(op);
            }
            if discard_left && self.point(op).x != pt.x {
                op = self.next(op);
            }
            !discard_left
        } else {
            loop {
                let next = self.point(self.next(op));
                if next.x < pt.x || next.x > self.point(op).x || next.y != pt.y {
                    break;
                }
                op = self.next(op);
            }
            if !discard_left && self.point(op).x != pt.x {
                op = self.next(op);
            }
            discard_left
        };
        let mut opb = self.dup_point(op, insert_after);
        if self.point(opb) != pt {
            op = opb;
            self.points[op].pt = pt;
            opb = self.dup_point(op, insert_after);
        }
        (op, opb)
    }

    fn join_horz(
        &mut self,
        op1: OutPtIdx,
        op1b: OutPtIdx,
        op2: OutPtIdx,
        op2b: OutPtIdx,
        pt: Point,
        discard_left: bool,
    ) -> bool {
        let ltr1 = self.point(op1).x <= self.point(op1b).x;
        let ltr2 = self.point(op2).x <= self.point(op2b).x;
        if ltr1 == ltr2 {
            return false;
        }

        let (op1, op1b) = self.cut_horizontal(op1, ltr1, pt, discard_left);
        let (op2, op2b) = self.cut_horizontal(op2, ltr2, pt, discard_left);

        if ltr1 == discard_left {
            self.points[op1].prev = op2;
            self.points[op2].next = op1;
            self.points[op1b].next = op2b;
            self.points[op2b].prev = op1b;
        } else {
            self.points[op1].next = op2;
            self.points[op2].prev = op1;
            self.points[op1b].prev = op2b;
            self.points[op2b].next = op1b;
        }
        true
    }

    fn join_common_edges(&mut self, reverse_output: bool) {
        for i in 0..self.joins.len() {
            let mut join = self.joins[i];
            let r1 = self.resolve(self.points[join.point1].ring);
            let r2 = self.resolve(self.points[join.point2].ring);
            let (ring1, ring2) = (&self.rings[r1], &self.rings[r2]);
            if ring1.points.is_none() || ring2.points.is_none() {
                continue;
            }
            if ring1.is_open || ring2.is_open {
                continue;
            }

            let hole_state = if r1 == r2 {
                r1
            } else {
                self.hole_state_ring(r1, r2)
            };
            if !self.join_points(&mut join, r1, r2) {
                continue;
            }

            if r1 == r2 {
                // We split a ring in two.
                self.rings[r1].points = Some(join.point1);
                let r2 = self.new_ring(false);
                self.rings[r2].points = Some(join.point2);
                self.update_point_rings(r2);

                self.rings[r2].is_hole = self.rings[r1].is_hole;
                if self.ring_contains(r1, r2) {
                    self.rings[r2].first_left = Some(r1);
                } else if self.ring_contains(r2, r1) {
                    self.rings[r2].first_left = self.rings[r1].first_left;
                    self.rings[r1].first_left = Some(r2);
                } else {
                    self.rings[r2].first_left = self.rings[r1].first_left;
                }
                // Both halves keep the direction they had in the oriented
                // ring, so their areas still add up to the ring's area. A
                // half that lies along the other half's boundary can't be
                // classified by containment, so the direction decides.
                for r in [r1, r2] {
                    let a = self.area(r);
                    if a != 0.0 {
                        self.rings[r].is_hole = (a < 0.0) != reverse_output;
                    }
                }
            } else {
                // We merged two rings into one.
                self.rings[r2].points = None;
                self.rings[r2].idx = self.rings[r1].idx;
                self.rings[r1].is_hole = self.rings[hole_state].is_hole;
                if hole_state == r2 {
                    self.rings[r1].first_left = self.rings[r2].first_left;
                }
                self.rings[r2].first_left = Some(r1);
            }
        }
    }

    // Removes duplicate points and (unless `preserve_collinear`) the middle
    // points of collinear runs. Spikes are always removed.
    fn fixup_polygon(&mut self, ring: RingIdx, preserve_collinear: bool) {
        let Some(mut pp) = self.rings[ring].points else {
            return;
        };
        let mut last_ok = None;
        loop {
            let (prev, next) = (self.prev(pp), self.next(pp));
            if prev == pp || prev == next {
                self.rings[ring].points = None;
                return;
            }
            let (p0, p1, p2) = (self.point(prev), self.point(pp), self.point(next));
            let redundant = p1 == p2
                || p1 == p0
                || (slopes_equal(p0, p1, p2)
                    && (!preserve_collinear || !pt2_is_between(p0, p1, p2)));
            if redundant {
                last_ok = None;
                self.points[prev].next = next;
                self.points[next].prev = prev;
                pp = prev;
            } else if last_ok == Some(pp) {
                break;
            } else {
                last_ok.get_or_insert(pp);
                pp = next;
            }
        }
        self.rings[ring].points = Some(pp);
    }

    // Removes consecutive duplicate points from an open ring.
    fn fixup_polyline(&mut self, ring: RingIdx) {
        let Some(start) = self.rings[ring].points else {
            return;
        };
        let mut pp = start;
        let mut last = self.prev(start);
        while pp != last {
            pp = self.next(pp);
            let prev = self.prev(pp);
            if self.point(pp) == self.point(prev) {
                if pp == last {
                    last = prev;
                }
                let next = self.next(pp);
                self.points[prev].next = next;
                self.points[next].prev = prev;
                pp = prev;
            }
        }
        if pp == self.prev(pp) {
            self.rings[ring].points = None;
        }
    }

    /// Tidies up the output rings and collects them into a solution.
    pub fn finish(&mut self, options: &ClipOptions) -> Solution {
        for ring in self.rings.indices().collect::<Vec<_>>() {
            if !self.rings[ring].is_open {
                self.orient(ring, options.reverse_output);
            }
        }

        tracing::debug!(joins = self.joins.len(), "joining common edges");
        self.join_common_edges(options.reverse_output);

        for ring in self.rings.indices().collect::<Vec<_>>() {
            if self.rings[ring].is_open {
                self.fixup_polyline(ring);
            } else {
                self.fixup_polygon(ring, options.preserve_collinear);
            }
        }

        let mut solution = Solution::default();
        for (_, ring) in self.rings.iter() {
            let Some(start) = ring.points else {
                continue;
            };
            let pts: Vec<Point> = self.chain(start).map(|op| self.point(op)).collect();
            if ring.is_open {
                if pts.len() >= 2 {
                    solution.polylines.push(pts);
                }
            } else if pts.len() >= 3 {
                solution.polygons.push(pts);
            }
        }
        drop_cancelling_polygons(&mut solution.polygons);
        solution
    }
}

// Removes polygons with no area, and pairs of polygons that trace the same
// points in opposite directions.
fn drop_cancelling_polygons(polygons: &mut Vec<Vec<Point>>) {
    fn canonical(mut pts: Vec<Point>) -> Vec<Point> {
        let start = pts
            .iter()
            .enumerate()
            .min_by_key(|(_, p)| **p)
            .map_or(0, |(i, _)| i);
        pts.rotate_left(start);
        pts
    }

    let mut keep = vec![true; polygons.len()];
    let mut unmatched: HashMap<Vec<Point>, Vec<usize>> = HashMap::new();
    for (i, poly) in polygons.iter().enumerate() {
        if signed_area(poly) == 0.0 {
            keep[i] = false;
            continue;
        }
        let reversed = canonical(poly.iter().rev().copied().collect());
        if let Some(j) = unmatched.get_mut(&reversed).and_then(Vec::pop) {
            keep[i] = false;
            keep[j] = false;
        } else {
            unmatched.entry(canonical(poly.clone())).or_default().push(i);
        }
    }

    if keep.iter().all(|&k| k) {
        return;
    }
    tracing::debug!(
        dropped = keep.iter().filter(|&&k| !k).count(),
        "dropping cancelling polygons"
    );
    let mut keep = keep.into_iter();
    polygons.retain(|_| keep.next().unwrap_or(true));
}
