//! The sweep-line itself.
//!
//! A [`Sweep`] owns everything that changes while the sweep line moves: a copy
//! of the bounds, the local minima, the scanbeam, the active edge list, the
//! stack of horizontal bounds waiting to be processed and the output rings.
//! Each step of the sweep handles one scanbeam, the horizontal strip between
//! two consecutive heights at which something happens:
//!
//! 1. new bounds starting at the bottom of the scanbeam are inserted,
//! 2. horizontal edges lying on the bottom of the scanbeam are processed,
//! 3. bounds that cross each other inside the scanbeam are swapped, and
//! 4. bounds that end at the top of the scanbeam are advanced or removed.

use crate::{
    ael::ActiveEdgeList,
    bound::{Bound, BoundIdx, BoundVec},
    geom::{round, slopes_equal4, Edge, Point},
    minima::LocalMinimumList,
    output::{horz_segments_overlap, OutPtIdx, Output},
    scanbeam::Scanbeam,
    winding::{is_contributing, set_winding_count, ClipConfig},
    ClipOptions, ClipType, Error, FillRule, PolyType, Solution,
};

/// Two adjacent bounds that cross within the current scanbeam.
#[derive(Clone, Copy, Debug)]
struct IntersectNode {
    e1: BoundIdx,
    e2: BoundIdx,
    pt: Point,
}

/// One run of the sweep-line algorithm.
#[derive(Debug)]
pub(crate) struct Sweep {
    config: ClipConfig,
    options: ClipOptions,
    bounds: BoundVec<Bound>,
    minima: LocalMinimumList,
    scanbeam: Scanbeam,
    ael: ActiveEdgeList,
    /// Horizontal bounds waiting to be processed. Last in, first out.
    horizontals: Vec<BoundIdx>,
    output: Output,
}

// The direction in which a horizontal edge gets traversed, and its extent.
fn horz_direction(e: &Edge) -> (bool, i64, i64) {
    if e.bot.x < e.top.x {
        (true, e.bot.x, e.top.x)
    } else {
        (false, e.top.x, e.bot.x)
    }
}

// The winding number of a bound, as interpreted by a fill rule.
fn fill_count(fill: FillRule, count: i32) -> i32 {
    match fill {
        FillRule::Positive => count,
        FillRule::Negative => -count,
        FillRule::EvenOdd | FillRule::NonZero => count.abs(),
    }
}

/// Where the current edges of two bounds cross.
///
/// The result is clamped to the current scanbeam: it is never below the
/// bottom of the scanbeam (`e1.curr.y`) and never above the lower of the two
/// edges' tops.
fn intersect_point(e1: &Bound, e2: &Bound) -> Point {
    let (edge1, edge2) = (e1.edge(), e2.edge());
    let mut ip = if edge1.dx == edge2.dx {
        let y = e1.curr.y;
        Point::new(edge1.x_at(y), y)
    } else if edge1.dx == 0.0 {
        let x = edge1.bot.x;
        let y = if edge2.is_horizontal() {
            edge2.bot.y
        } else {
            let b2 = edge2.bot.y as f64 - edge2.bot.x as f64 / edge2.dx;
            round(x as f64 / edge2.dx + b2)
        };
        Point::new(x, y)
    } else if edge2.dx == 0.0 {
        let x = edge2.bot.x;
        let y = if edge1.is_horizontal() {
            edge1.bot.y
        } else {
            let b1 = edge1.bot.y as f64 - edge1.bot.x as f64 / edge1.dx;
            round(x as f64 / edge1.dx + b1)
        };
        Point::new(x, y)
    } else {
        let b1 = edge1.bot.x as f64 - edge1.bot.y as f64 * edge1.dx;
        let b2 = edge2.bot.x as f64 - edge2.bot.y as f64 * edge2.dx;
        let q = (b2 - b1) / (edge1.dx - edge2.dx);
        let x = if edge1.dx.abs() < edge2.dx.abs() {
            edge1.dx * q + b1
        } else {
            edge2.dx * q + b2
        };
        Point::new(round(x), round(q))
    };

    if ip.y > edge1.top.y || ip.y > edge2.top.y {
        ip.y = edge1.top.y.min(edge2.top.y);
        ip.x = if edge1.dx.abs() < edge2.dx.abs() {
            edge1.x_at(ip.y)
        } else {
            edge2.x_at(ip.y)
        };
    }
    if ip.y < e1.curr.y {
        ip.y = e1.curr.y;
        // Use the more vertical edge to get the x coordinate.
        ip.x = if edge1.dx.abs() > edge2.dx.abs() {
            edge2.x_at(ip.y)
        } else {
            edge1.x_at(ip.y)
        };
    }
    ip
}

impl Sweep {
    pub fn new(
        config: ClipConfig,
        options: ClipOptions,
        bounds: BoundVec<Bound>,
        mut minima: LocalMinimumList,
    ) -> Self {
        minima.reset();
        let mut scanbeam = Scanbeam::default();
        for lm in minima.iter() {
            scanbeam.push(lm.y);
        }
        Sweep {
            config,
            options,
            bounds,
            minima,
            scanbeam,
            ael: ActiveEdgeList::default(),
            horizontals: Vec::new(),
            output: Output::default(),
        }
    }

    /// Runs the sweep to completion and collects the output.
    pub fn run(mut self) -> Result<Solution, Error> {
        self.sweep().inspect_err(|e| tracing::warn!("sweep failed: {e}"))?;
        Ok(self.output.finish(&self.options))
    }

    fn sweep(&mut self) -> Result<(), Error> {
        let Some(mut bot_y) = self.scanbeam.pop_min() else {
            return Ok(());
        };
        self.insert_local_minima(bot_y)?;
        loop {
            let Some(top_y) = self.scanbeam.pop_min() else {
                if self.minima.has_pending() {
                    return Err(Error::InvalidState {
                        what: "local minima left over after the scanbeam ran out",
                        y: bot_y,
                    });
                }
                break;
            };
            self.process_horizontals()?;
            self.output.ghost_joins.clear();
            self.process_intersections(top_y)?;
            self.process_edges_at_top(top_y)?;
            bot_y = top_y;
            self.insert_local_minima(bot_y)?;
        }
        Ok(())
    }

    // If the neighbor `n` of a contributing bound `b` is at the same position,
    // it gets a vertex at `pt` too. Both bounds must be closed.
    fn touch_neighbor(
        &mut self,
        b: BoundIdx,
        n: Option<BoundIdx>,
        pt: Point,
    ) -> Result<(), Error> {
        let Some(n) = n else {
            return Ok(());
        };
        let (bb, nb) = (&self.bounds[b], &self.bounds[n]);
        if bb.ring.is_some()
            && nb.ring.is_some()
            && nb.curr.x == bb.curr.x
            && bb.winding_delta != 0
            && nb.winding_delta != 0
        {
            self.output.add_point(&mut self.bounds, n, pt)?;
        }
        Ok(())
    }

    fn insert_local_minima(&mut self, bot_y: i64) -> Result<(), Error> {
        let mut count = 0;
        while let Some(lm) = self.minima.pop_at(bot_y) {
            count += 1;
            let (lb, rb) = (lm.left_bound, lm.right_bound);
            let mut p1 = None;

            match (lb, rb) {
                (Some(lb), Some(rb)) => {
                    self.ael.insert(&mut self.bounds, lb, None);
                    self.ael.insert(&mut self.bounds, rb, Some(lb));
                    set_winding_count(&self.config, &mut self.bounds, &self.ael, lb);
                    let (wc, wc2) = (
                        self.bounds[lb].winding_count,
                        self.bounds[lb].winding_count2,
                    );
                    self.bounds[rb].winding_count = wc;
                    self.bounds[rb].winding_count2 = wc2;
                    if is_contributing(&self.config, &self.bounds[lb]) {
                        let pt = self.bounds[lb].bot();
                        p1 = Some(self.output.add_local_min_poly(&mut self.bounds, lb, rb, pt)?);
                        let lb_curr = self.bounds[lb].curr;
                        self.touch_neighbor(lb, self.bounds[lb].prev_in_ael, lb_curr)?;
                        self.touch_neighbor(rb, self.bounds[rb].next_in_ael, lb_curr)?;
                    }
                    self.scanbeam.push(self.bounds[lb].top().y);
                }
                (Some(b), None) | (None, Some(b)) => {
                    self.ael.insert(&mut self.bounds, b, None);
                    set_winding_count(&self.config, &mut self.bounds, &self.ael, b);
                    if is_contributing(&self.config, &self.bounds[b]) {
                        let pt = self.bounds[b].bot();
                        p1 = Some(self.output.add_point(&mut self.bounds, b, pt)?);
                        let curr = self.bounds[b].curr;
                        self.touch_neighbor(b, self.bounds[b].prev_in_ael, curr)?;
                        self.touch_neighbor(b, self.bounds[b].next_in_ael, curr)?;
                    }
                    if rb.is_none() {
                        self.scanbeam.push(self.bounds[b].top().y);
                    }
                }
                (None, None) => continue,
            }

            if let Some(rb) = rb {
                let b = &self.bounds[rb];
                if b.is_horizontal() {
                    if let Some(next) = b.next_edge() {
                        self.scanbeam.push(next.top.y);
                    }
                    self.horizontals.push(rb);
                } else {
                    self.scanbeam.push(b.top().y);
                }
            }

            let (Some(lb), Some(rb)) = (lb, rb) else {
                continue;
            };

            if let Some(p1) = p1 {
                self.join_ghosts(rb, p1);
                self.join_left_neighbor(lb, p1)?;
            }

            if self.bounds[lb].next_in_ael != Some(rb) {
                if let Some(p1) = p1 {
                    self.join_right_bound(rb, p1)?;
                }
                // Everything between the new bounds needs to be crossed by
                // the right bound, which starts out to their left.
                let pt = self.bounds[lb].curr;
                let mut e = self.bounds[lb].next_in_ael;
                while let Some(idx) = e {
                    if idx == rb {
                        break;
                    }
                    self.intersect_edges(rb, idx, pt)?;
                    e = self.bounds[idx].next_in_ael;
                }
            }
        }
        if count > 0 {
            tracing::debug!(y = bot_y, count, "inserted local minima");
        }
        Ok(())
    }

    // A new horizontal right bound that overlaps a ghost join turns it into a real join.
    fn join_ghosts(&mut self, rb: BoundIdx, p1: OutPtIdx) {
        let b = &self.bounds[rb];
        if !b.is_horizontal() || b.winding_delta == 0 {
            return;
        }
        let (bot_x, top_x) = (b.bot().x, b.top().x);
        let promoted: Vec<_> = self
            .output
            .ghost_joins
            .iter()
            .filter(|g| horz_segments_overlap(self.output.point(g.point).x, g.off_point.x, bot_x, top_x))
            .copied()
            .collect();
        for g in promoted {
            self.output.add_join(g.point, p1, g.off_point);
        }
    }

    // If a new left bound starts on top of a collinear contributing bound,
    // their output needs joining.
    fn join_left_neighbor(&mut self, lb: BoundIdx, p1: OutPtIdx) -> Result<(), Error> {
        let l = &self.bounds[lb];
        let Some(prev) = l.prev_in_ael else {
            return Ok(());
        };
        let p = &self.bounds[prev];
        if l.ring.is_some()
            && p.curr.x == l.bot().x
            && p.ring.is_some()
            && slopes_equal4(p.bot(), p.top(), l.curr, l.top())
            && l.winding_delta != 0
            && p.winding_delta != 0
        {
            let (bot, top) = (l.bot(), l.top());
            let p2 = self.output.add_point(&mut self.bounds, prev, bot)?;
            self.output.add_join(p1, p2, top);
        }
        Ok(())
    }

    fn join_right_bound(&mut self, rb: BoundIdx, p1: OutPtIdx) -> Result<(), Error> {
        let r = &self.bounds[rb];
        let Some(prev) = r.prev_in_ael else {
            return Ok(());
        };
        let p = &self.bounds[prev];
        if r.ring.is_some()
            && p.ring.is_some()
            && slopes_equal4(p.curr, p.top(), r.curr, r.top())
            && r.winding_delta != 0
            && p.winding_delta != 0
        {
            let (bot, top) = (r.bot(), r.top());
            let p2 = self.output.add_point(&mut self.bounds, prev, bot)?;
            self.output.add_join(p1, p2, top);
        }
        Ok(())
    }

    fn swap_sides(&mut self, e1: BoundIdx, e2: BoundIdx) {
        let side = self.bounds[e1].side;
        self.bounds[e1].side = self.bounds[e2].side;
        self.bounds[e2].side = side;
    }

    fn swap_rings(&mut self, e1: BoundIdx, e2: BoundIdx) {
        let ring = self.bounds[e1].ring;
        self.bounds[e1].ring = self.bounds[e2].ring;
        self.bounds[e2].ring = ring;
    }

    /// Handles the crossing of two bounds at `pt`.
    ///
    /// Above the crossing, `e1` must be to the right of `e2`.
    fn intersect_edges(&mut self, e1: BoundIdx, e2: BoundIdx, pt: Point) -> Result<(), Error> {
        let config = self.config;
        let (b1, b2) = (&self.bounds[e1], &self.bounds[e2]);
        let e1_contributing = b1.ring.is_some();
        let e2_contributing = b2.ring.is_some();
        let (d1, d2) = (b1.winding_delta, b2.winding_delta);

        if d1 == 0 || d2 == 0 {
            return self.intersect_open(e1, e2, pt);
        }

        if b1.poly_type == b2.poly_type {
            if config.is_even_odd(b1) {
                let wc = b1.winding_count;
                self.bounds[e1].winding_count = self.bounds[e2].winding_count;
                self.bounds[e2].winding_count = wc;
            } else {
                let b1 = &mut self.bounds[e1];
                b1.winding_count = if b1.winding_count + d2 == 0 {
                    -b1.winding_count
                } else {
                    b1.winding_count + d2
                };
                let b2 = &mut self.bounds[e2];
                b2.winding_count = if b2.winding_count - d1 == 0 {
                    -b2.winding_count
                } else {
                    b2.winding_count - d1
                };
            }
        } else {
            let (e1_even_odd, e2_even_odd) = (config.is_even_odd(b1), config.is_even_odd(b2));
            let b1 = &mut self.bounds[e1];
            b1.winding_count2 = if !e2_even_odd {
                b1.winding_count2 + d2
            } else if b1.winding_count2 == 0 {
                1
            } else {
                0
            };
            let b2 = &mut self.bounds[e2];
            b2.winding_count2 = if !e1_even_odd {
                b2.winding_count2 - d1
            } else if b2.winding_count2 == 0 {
                1
            } else {
                0
            };
        }

        let (b1, b2) = (&self.bounds[e1], &self.bounds[e2]);
        let e1_wc = fill_count(config.fill(b1.poly_type), b1.winding_count);
        let e2_wc = fill_count(config.fill(b2.poly_type), b2.winding_count);
        let e1_wc2 = fill_count(config.other_fill(b1.poly_type), b1.winding_count2);
        let e2_wc2 = fill_count(config.other_fill(b2.poly_type), b2.winding_count2);
        let same_type = b1.poly_type == b2.poly_type;
        let e1_is_clip = b1.poly_type == PolyType::Clip;
        let zero_or_one = |wc: i32| wc == 0 || wc == 1;

        if e1_contributing && e2_contributing {
            if !zero_or_one(e1_wc)
                || !zero_or_one(e2_wc)
                || (!same_type && config.clip_type != ClipType::Xor)
            {
                self.output
                    .add_local_max_poly(&mut self.bounds, &self.ael, e1, e2, pt)?;
            } else {
                self.output.add_point(&mut self.bounds, e1, pt)?;
                self.output.add_point(&mut self.bounds, e2, pt)?;
                self.swap_sides(e1, e2);
                self.swap_rings(e1, e2);
            }
        } else if e1_contributing {
            if zero_or_one(e2_wc) {
                self.output.add_point(&mut self.bounds, e1, pt)?;
                self.swap_sides(e1, e2);
                self.swap_rings(e1, e2);
            }
        } else if e2_contributing {
            if zero_or_one(e1_wc) {
                self.output.add_point(&mut self.bounds, e2, pt)?;
                self.swap_sides(e1, e2);
                self.swap_rings(e1, e2);
            }
        } else if zero_or_one(e1_wc) && zero_or_one(e2_wc) {
            // Neither is contributing yet, but maybe they start a new ring here.
            let starts_ring = if !same_type {
                true
            } else if e1_wc == 1 && e2_wc == 1 {
                match config.clip_type {
                    ClipType::Intersection => e1_wc2 > 0 && e2_wc2 > 0,
                    ClipType::Union => e1_wc2 <= 0 && e2_wc2 <= 0,
                    ClipType::Difference => {
                        (e1_is_clip && e1_wc2 > 0 && e2_wc2 > 0)
                            || (!e1_is_clip && e1_wc2 <= 0 && e2_wc2 <= 0)
                    }
                    ClipType::Xor => true,
                }
            } else {
                self.swap_sides(e1, e2);
                false
            };
            if starts_ring {
                self.output.add_local_min_poly(&mut self.bounds, e1, e2, pt)?;
            }
        }
        Ok(())
    }

    // Crossings that involve an open polyline only ever toggle the
    // polyline's output on or off.
    fn intersect_open(&mut self, e1: BoundIdx, e2: BoundIdx, pt: Point) -> Result<(), Error> {
        let clip_type = self.config.clip_type;
        let (b1, b2) = (&self.bounds[e1], &self.bounds[e2]);
        let (d1, d2) = (b1.winding_delta, b2.winding_delta);
        let e1_contributing = b1.ring.is_some();
        let e2_contributing = b2.ring.is_some();

        if d1 == 0 && d2 == 0 {
            return Ok(());
        }
        if b1.poly_type == b2.poly_type && d1 != d2 && clip_type == ClipType::Union {
            if d1 == 0 {
                if e2_contributing {
                    self.output.add_point(&mut self.bounds, e1, pt)?;
                    if e1_contributing {
                        self.bounds[e1].ring = None;
                    }
                }
            } else if e1_contributing {
                self.output.add_point(&mut self.bounds, e2, pt)?;
                if e2_contributing {
                    self.bounds[e2].ring = None;
                }
            }
        } else if b1.poly_type != b2.poly_type {
            if d1 == 0
                && b2.winding_count.abs() == 1
                && (clip_type != ClipType::Union || b2.winding_count2 == 0)
            {
                self.output.add_point(&mut self.bounds, e1, pt)?;
                if e1_contributing {
                    self.bounds[e1].ring = None;
                }
            } else if d2 == 0
                && b1.winding_count.abs() == 1
                && (clip_type != ClipType::Union || b1.winding_count2 == 0)
            {
                self.output.add_point(&mut self.bounds, e2, pt)?;
                if e2_contributing {
                    self.bounds[e2].ring = None;
                }
            }
        }
        Ok(())
    }

    fn process_horizontals(&mut self) -> Result<(), Error> {
        while let Some(h) = self.horizontals.pop() {
            self.process_horizontal(h)?;
        }
        Ok(())
    }

    // A horizontal output edge from `op` might overlap with the output of
    // horizontals that are still waiting on the stack.
    fn join_pending_horizontals(&mut self, h: BoundIdx, op: OutPtIdx) {
        let hb = &self.bounds[h];
        let (bot_x, top_x) = (hb.bot().x, hb.top().x);
        for &other in self.horizontals.iter().rev() {
            let ob = &self.bounds[other];
            if ob.ring.is_some() && horz_segments_overlap(bot_x, top_x, ob.bot().x, ob.top().x) {
                if let Some(op2) = self.output.last_point(&self.bounds, other) {
                    self.output.add_join(op2, op, ob.top());
                }
            }
        }
    }

    fn next_in_direction(&self, b: BoundIdx, left_to_right: bool) -> Option<BoundIdx> {
        if left_to_right {
            self.bounds[b].next_in_ael
        } else {
            self.bounds[b].prev_in_ael
        }
    }

    /// Moves a horizontal bound along its horizontal edges, crossing every
    /// bound that it passes.
    fn process_horizontal(&mut self, h: BoundIdx) -> Result<(), Error> {
        let is_open = self.bounds[h].is_open();
        let (mut ltr, mut left, mut right) = horz_direction(self.bounds[h].edge());

        let hb = &self.bounds[h];
        let horizontal_run = hb.edges[hb.current_edge..]
            .iter()
            .take_while(|e| e.is_horizontal())
            .count();
        let last_horz_edge = hb.current_edge + horizontal_run.saturating_sub(1);
        // If the horizontals run all the way to the end of the bound, we'll
        // meet the bound we share a maximum with.
        let max_pair = if last_horz_edge + 1 == hb.edges.len() {
            hb.maximum_bound
        } else {
            None
        };

        let mut op1 = None;
        loop {
            let is_last_horz = self.bounds[h].current_edge == last_horz_edge;
            let mut e = self.next_in_direction(h, ltr);
            while let Some(eidx) = e {
                let e_curr = self.bounds[eidx].curr;
                if (ltr && e_curr.x > right) || (!ltr && e_curr.x < left) {
                    break;
                }

                // Also stop at the end of an intermediate horizontal edge if the
                // bound goes on to the right of `e`.
                let hb = &self.bounds[h];
                if e_curr.x == hb.top().x {
                    if let Some(next) = hb.next_edge() {
                        if self.bounds[eidx].dx() > next.dx {
                            break;
                        }
                    }
                }

                if self.bounds[h].ring.is_some() && !is_open {
                    let op = self.output.add_point(&mut self.bounds, h, e_curr)?;
                    op1 = Some(op);
                    self.join_pending_horizontals(h, op);
                    let bot = self.bounds[h].bot();
                    self.output.add_ghost_join(op, bot);
                }

                if Some(eidx) == max_pair && is_last_horz && self.bounds[eidx].next_edge().is_none()
                {
                    if self.bounds[h].ring.is_some() {
                        let top = self.bounds[h].top();
                        self.output
                            .add_local_max_poly(&mut self.bounds, &self.ael, h, eidx, top)?;
                    }
                    self.ael.delete(&mut self.bounds, h);
                    self.ael.delete(&mut self.bounds, eidx);
                    return Ok(());
                }

                let pt = Point::new(e_curr.x, self.bounds[h].curr.y);
                if ltr {
                    self.intersect_edges(h, eidx, pt)?;
                } else {
                    self.intersect_edges(eidx, h, pt)?;
                }
                let e_next = self.next_in_direction(eidx, ltr);
                self.ael.swap(&mut self.bounds, h, eidx);
                e = e_next;
            }

            if !self.bounds[h].next_edge().is_some_and(Edge::is_horizontal) {
                break;
            }
            self.ael.advance(&mut self.bounds, h, &mut self.scanbeam)?;
            if self.bounds[h].ring.is_some() {
                let bot = self.bounds[h].bot();
                self.output.add_point(&mut self.bounds, h, bot)?;
            }
            (ltr, left, right) = horz_direction(self.bounds[h].edge());
        }

        if self.bounds[h].ring.is_some() && op1.is_none() {
            if let Some(op) = self.output.last_point(&self.bounds, h) {
                self.join_pending_horizontals(h, op);
                let top = self.bounds[h].top();
                self.output.add_ghost_join(op, top);
            }
        }

        if self.bounds[h].next_edge().is_some() {
            if self.bounds[h].ring.is_some() {
                let top = self.bounds[h].top();
                let op1 = self.output.add_point(&mut self.bounds, h, top)?;
                self.ael.advance(&mut self.bounds, h, &mut self.scanbeam)?;
                if self.bounds[h].is_open() {
                    return Ok(());
                }
                // The bound isn't horizontal any more. If it now runs along a
                // contributing neighbor, their output needs joining.
                let hb = &self.bounds[h];
                let (bot, top) = (hb.bot(), hb.top());
                let neighbor = [hb.prev_in_ael, hb.next_in_ael]
                    .into_iter()
                    .flatten()
                    .find(|&n| {
                        let nb = &self.bounds[n];
                        nb.curr == bot
                            && nb.winding_delta != 0
                            && nb.ring.is_some()
                            && nb.curr.y < nb.top().y
                            && hb.edge().slopes_equal(nb.edge())
                    });
                if let Some(n) = neighbor {
                    let op2 = self.output.add_point(&mut self.bounds, n, bot)?;
                    self.output.add_join(op1, op2, top);
                }
            } else {
                self.ael.advance(&mut self.bounds, h, &mut self.scanbeam)?;
            }
        } else {
            if self.bounds[h].ring.is_some() {
                let top = self.bounds[h].top();
                self.output.add_point(&mut self.bounds, h, top)?;
            }
            self.ael.delete(&mut self.bounds, h);
        }
        Ok(())
    }

    fn process_intersections(&mut self, top_y: i64) -> Result<(), Error> {
        if self.ael.is_empty() {
            return Ok(());
        }
        let mut list = self.build_intersect_list(top_y);
        if list.len() > 1 && !self.fixup_intersection_order(&mut list) {
            return Err(Error::IntersectionOrder { y: top_y });
        }
        if !list.is_empty() {
            tracing::trace!(y = top_y, count = list.len(), "processing intersections");
        }
        for node in list {
            self.intersect_edges(node.e1, node.e2, node.pt)?;
            self.ael.swap(&mut self.bounds, node.e1, node.e2);
        }
        Ok(())
    }

    // Finds the crossings within the scanbeam by bubble-sorting the active
    // bounds according to their position at the top of the scanbeam. Every
    // swap is a crossing.
    fn build_intersect_list(&mut self, top_y: i64) -> Vec<IntersectNode> {
        let mut sorted: Vec<BoundIdx> = self.ael.iter(&self.bounds).collect();
        for &b in &sorted {
            let x = self.bounds[b].x_at(top_y);
            self.bounds[b].curr.x = x;
        }

        let mut list = Vec::new();
        let mut end = sorted.len();
        while end > 1 {
            let mut modified = false;
            for i in 0..end - 1 {
                let (e, next) = (sorted[i], sorted[i + 1]);
                if self.bounds[e].curr.x > self.bounds[next].curr.x {
                    let mut pt = intersect_point(&self.bounds[e], &self.bounds[next]);
                    if pt.y > top_y {
                        pt = Point::new(self.bounds[e].x_at(top_y), top_y);
                    }
                    list.push(IntersectNode { e1: e, e2: next, pt });
                    sorted.swap(i, i + 1);
                    modified = true;
                }
            }
            if !modified {
                break;
            }
            end -= 1;
        }
        list
    }

    // Crossings have to be processed between bounds that are adjacent at the
    // time. Sorts them from bottom to top and then, where necessary, moves
    // later crossings forward so that this holds.
    fn fixup_intersection_order(&self, list: &mut [IntersectNode]) -> bool {
        let mut order: Vec<BoundIdx> = self.ael.iter(&self.bounds).collect();
        let mut pos = vec![usize::MAX; self.bounds.len()];
        for (i, b) in order.iter().enumerate() {
            pos[b.0] = i;
        }
        list.sort_by_key(|node| node.pt.y);

        let adjacent = |node: &IntersectNode, pos: &[usize]| pos[node.e1.0].abs_diff(pos[node.e2.0]) == 1;
        for i in 0..list.len() {
            if !adjacent(&list[i], &pos) {
                let Some(j) = (i + 1..list.len()).find(|&j| adjacent(&list[j], &pos)) else {
                    return false;
                };
                list.swap(i, j);
            }
            let (e1, e2) = (list[i].e1, list[i].e2);
            let (p1, p2) = (pos[e1.0], pos[e2.0]);
            order.swap(p1, p2);
            pos[e1.0] = p2;
            pos[e2.0] = p1;
        }
        true
    }

    // The bound that shares `b`'s maximum, provided that it's active and
    // has reached its last edge.
    fn maxima_pair(&self, b: BoundIdx) -> Option<BoundIdx> {
        let pair = self.bounds[b].maximum_bound?;
        let p = &self.bounds[pair];
        (p.next_edge().is_none() && self.ael.contains(&self.bounds, pair)).then_some(pair)
    }

    fn process_edges_at_top(&mut self, top_y: i64) -> Result<(), Error> {
        let mut e = self.ael.head;
        while let Some(idx) = e {
            let b = &self.bounds[idx];
            // Maxima whose pair ends in a horizontal edge get finished off
            // while processing that horizontal.
            let is_maxima = b.is_maxima(top_y)
                && !b.maximum_bound.is_some_and(|pair| {
                    self.bounds[pair]
                        .edges
                        .last()
                        .is_some_and(Edge::is_horizontal)
                });

            if is_maxima {
                let prev = b.prev_in_ael;
                self.do_maxima(idx)?;
                e = match prev {
                    Some(p) => self.bounds[p].next_in_ael,
                    None => self.ael.head,
                };
            } else {
                if b.is_intermediate(top_y) && b.next_edge().is_some_and(Edge::is_horizontal) {
                    self.ael.advance(&mut self.bounds, idx, &mut self.scanbeam)?;
                    if self.bounds[idx].ring.is_some() {
                        let bot = self.bounds[idx].bot();
                        self.output.add_point(&mut self.bounds, idx, bot)?;
                    }
                    self.horizontals.push(idx);
                } else {
                    let x = self.bounds[idx].x_at(top_y);
                    self.bounds[idx].curr = Point::new(x, top_y);
                }
                e = self.bounds[idx].next_in_ael;
            }
        }

        self.process_horizontals()?;

        // Move bounds on to their next edges.
        let mut e = self.ael.head;
        while let Some(idx) = e {
            if self.bounds[idx].is_intermediate(top_y) {
                let op = if self.bounds[idx].ring.is_some() {
                    let top = self.bounds[idx].top();
                    Some(self.output.add_point(&mut self.bounds, idx, top)?)
                } else {
                    None
                };
                self.ael.advance(&mut self.bounds, idx, &mut self.scanbeam)?;

                let b = &self.bounds[idx];
                if let Some(op) = op {
                    if b.winding_delta != 0 {
                        let (bot, top, curr) = (b.bot(), b.top(), b.curr);
                        let neighbor = [b.prev_in_ael, b.next_in_ael]
                            .into_iter()
                            .flatten()
                            .find(|&n| {
                                let nb = &self.bounds[n];
                                nb.curr == bot
                                    && nb.ring.is_some()
                                    && nb.curr.y < nb.top().y
                                    && slopes_equal4(curr, top, nb.curr, nb.top())
                                    && nb.winding_delta != 0
                            });
                        if let Some(n) = neighbor {
                            let op2 = self.output.add_point(&mut self.bounds, n, bot)?;
                            self.output.add_join(op, op2, top);
                        }
                    }
                }
            }
            e = self.bounds[idx].next_in_ael;
        }
        Ok(())
    }

    // Finishes a bound that ends at a local maximum.
    fn do_maxima(&mut self, e: BoundIdx) -> Result<(), Error> {
        let top = self.bounds[e].top();
        let Some(pair) = self.maxima_pair(e) else {
            if self.bounds[e].ring.is_some() {
                self.output.add_point(&mut self.bounds, e, top)?;
            }
            self.ael.delete(&mut self.bounds, e);
            return Ok(());
        };

        // Cross everything between us and our pair.
        let mut next = self.bounds[e].next_in_ael;
        while let Some(n) = next {
            if n == pair {
                break;
            }
            self.intersect_edges(e, n, top)?;
            self.ael.swap(&mut self.bounds, e, n);
            next = self.bounds[e].next_in_ael;
        }

        match (self.bounds[e].ring, self.bounds[pair].ring) {
            (None, None) => {}
            (Some(_), Some(_)) => {
                self.output
                    .add_local_max_poly(&mut self.bounds, &self.ael, e, pair, top)?;
            }
            _ if self.bounds[e].is_open() => {
                for b in [e, pair] {
                    if self.bounds[b].ring.is_some() {
                        self.output.add_point(&mut self.bounds, b, top)?;
                        self.bounds[b].ring = None;
                    }
                }
            }
            _ => {
                return Err(Error::InvalidState {
                    what: "only one of the bounds at a local maximum is contributing",
                    y: top.y,
                });
            }
        }
        self.ael.delete(&mut self.bounds, e);
        self.ael.delete(&mut self.bounds, pair);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{geom::signed_area, Clipper};

    fn path(coords: &[(i64, i64)]) -> Vec<Point> {
        coords.iter().map(|&p| Point::from(p)).collect()
    }

    fn rect(x0: i64, y0: i64, x1: i64, y1: i64) -> Vec<Point> {
        path(&[(x0, y0), (x1, y0), (x1, y1), (x0, y1)])
    }

    fn session(subject: &[Vec<Point>], clip: &[Vec<Point>], clip_type: ClipType) -> Sweep {
        let mut clipper = Clipper::new();
        clipper.add_paths(subject, PolyType::Subject, true).unwrap();
        clipper.add_paths(clip, PolyType::Clip, true).unwrap();
        clipper.session(clip_type, FillRule::NonZero, FillRule::NonZero)
    }

    fn total_area(solution: &Solution) -> f64 {
        solution.polygons.iter().map(|p| signed_area(p)).sum()
    }

    #[test]
    fn intersection_point_of_crossing_edges() {
        let mut clipper = Clipper::new();
        clipper
            .add_path(&path(&[(0, 0), (10, 10), (0, 20), (-5, 10)]), PolyType::Subject, true)
            .unwrap();
        clipper
            .add_path(&path(&[(10, 0), (0, 10), (10, 20), (15, 10)]), PolyType::Subject, true)
            .unwrap();
        let sweep = clipper.session(ClipType::Union, FillRule::NonZero, FillRule::NonZero);
        let rising = sweep
            .bounds
            .iter()
            .find(|(_, b)| b.edges[0].bot == Point::new(0, 0) && b.edges[0].top == Point::new(10, 10))
            .map(|(_, b)| b.clone())
            .unwrap();
        let falling = sweep
            .bounds
            .iter()
            .find(|(_, b)| b.edges[0].bot == Point::new(10, 0) && b.edges[0].top == Point::new(0, 10))
            .map(|(_, b)| b.clone())
            .unwrap();
        assert_eq!(intersect_point(&rising, &falling), Point::new(5, 5));
        assert_eq!(intersect_point(&falling, &rising), Point::new(5, 5));
    }

    #[test]
    fn coincident_minimum_of_opposite_types_makes_a_join() {
        let mut sweep = session(
            &[rect(0, 0, 10, 10)],
            &[rect(0, 0, 10, 20)],
            ClipType::Xor,
        );
        sweep.sweep().unwrap();
        assert!(!sweep.output.joins.is_empty());
        let solution = sweep.output.finish(&ClipOptions::default());
        assert_eq!(total_area(&solution), 100.0);
    }

    #[test]
    fn shared_edge_union_is_joined() {
        let sweep = session(&[rect(0, 0, 10, 10), rect(10, 0, 20, 10)], &[], ClipType::Union);
        let solution = sweep.run().unwrap();
        assert_eq!(solution.polygons.len(), 1);
        assert_eq!(solution.polygons[0].len(), 4);
        assert_eq!(signed_area(&solution.polygons[0]), 200.0);
    }

    #[test]
    fn crossing_triangles() {
        // Two triangles whose sides cross in the middle of a scanbeam.
        let a = path(&[(0, 0), (20, 0), (10, 20)]);
        let b = path(&[(0, 10), (10, -10), (20, 10)]);
        let inter = session(&[a.clone()], &[b.clone()], ClipType::Intersection)
            .run()
            .unwrap();
        let union = session(&[a.clone()], &[b.clone()], ClipType::Union)
            .run()
            .unwrap();
        let xor = session(&[a.clone()], &[b.clone()], ClipType::Xor).run().unwrap();
        assert_eq!(inter.polygons.len(), 1);
        assert_eq!(union.polygons.len(), 1);
        let (ai, au, ax) = (total_area(&inter), total_area(&union), total_area(&xor));
        assert!(ai > 0.0);
        // Both triangles have area 200.
        assert!((ai + au - 400.0).abs() < 2.0, "{ai} {au}");
        assert!((ax - (au - ai)).abs() < 2.0, "{ax} {au} {ai}");
    }

    #[test]
    fn hole_is_reported_with_negative_area() {
        let solution = session(&[rect(0, 0, 30, 30)], &[rect(10, 10, 20, 20)], ClipType::Difference)
            .run()
            .unwrap();
        assert_eq!(solution.polygons.len(), 2);
        let mut areas: Vec<f64> = solution.polygons.iter().map(|p| signed_area(p)).collect();
        areas.sort_by(f64::total_cmp);
        assert_eq!(areas, vec![-100.0, 900.0]);
    }

    #[test]
    fn open_line_clipped_by_rect() {
        let mut clipper = Clipper::new();
        clipper
            .add_path(&path(&[(5, -5), (5, 15)]), PolyType::Subject, false)
            .unwrap();
        clipper
            .add_path(&rect(0, 0, 10, 10), PolyType::Clip, true)
            .unwrap();
        let solution = clipper
            .execute(ClipType::Intersection, FillRule::NonZero, FillRule::NonZero)
            .unwrap();
        assert!(solution.polygons.is_empty());
        assert_eq!(solution.polylines.len(), 1);
        let mut line = solution.polylines[0].clone();
        line.sort();
        assert_eq!(line, path(&[(5, 0), (5, 10)]));
    }

    proptest! {
        // Disjoint rectangles in a row come out unchanged, whichever way
        // round they were given.
        #[test]
        fn disjoint_rects_survive_union(
            sizes in proptest::collection::vec((1i64..20, 1i64..20, any::<bool>()), 1..6)
        ) {
            let mut rects = Vec::new();
            for (i, &(w, h, ccw)) in sizes.iter().enumerate() {
                let x = 30 * i as i64;
                let mut r = rect(x, 0, x + w, h);
                if !ccw {
                    r.reverse();
                }
                rects.push(r);
            }
            let solution = session(&rects, &[], ClipType::Union).run().unwrap();
            prop_assert_eq!(solution.polygons.len(), sizes.len());
            for poly in &solution.polygons {
                prop_assert_eq!(poly.len(), 4);
                prop_assert!(signed_area(poly) > 0.0);
            }
            let expected: i64 = sizes.iter().map(|&(w, h, _)| w * h).sum();
            prop_assert_eq!(total_area(&solution), expected as f64);
        }
    }
}
