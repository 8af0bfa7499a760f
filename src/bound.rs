//! Splitting input paths into bounds.
//!
//! A bound is a run of edges along which `y` never decreases, going from a
//! local minimum of its path up to a local maximum. Every local minimum of a
//! closed ring starts two bounds, one on each side; the sweep walks up both of
//! them until they meet again at a local maximum.

use std::collections::VecDeque;

use crate::{
    geom::{pt2_is_between, slopes_equal, Edge, Point},
    minima::{LocalMinimum, LocalMinimumList},
    output::RingIdx,
    Error, PolyType,
};

typed_vec!(
    /// An index into the arena of bounds.
    BoundVec,
    BoundIdx,
    "b"
);

/// Which side of the output ring a bound is currently writing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Side {
    Left,
    Right,
}

#[derive(Clone, Debug)]
pub(crate) struct Bound {
    /// The edges, bottom to top. Never empty.
    pub edges: Vec<Edge>,
    /// The edge that is currently crossing the sweep line.
    pub current_edge: usize,
    /// Where the current edge crosses the sweep line.
    pub curr: Point,
    pub side: Side,
    pub poly_type: PolyType,
    /// +1 or -1 for ring bounds, depending on the direction in which the
    /// ring's path runs along the bound. Zero for open polylines.
    pub winding_delta: i32,
    pub winding_count: i32,
    pub winding_count2: i32,
    /// The output ring we're adding points to, if we're contributing.
    pub ring: Option<RingIdx>,
    /// The bound that finishes at the same local maximum as this one.
    pub maximum_bound: Option<BoundIdx>,
    pub prev_in_ael: Option<BoundIdx>,
    pub next_in_ael: Option<BoundIdx>,
}

impl Bound {
    fn new(edges: Vec<Edge>, poly_type: PolyType, winding_delta: i32, side: Side) -> Self {
        debug_assert!(!edges.is_empty());
        Bound {
            curr: edges[0].bot,
            edges,
            current_edge: 0,
            side,
            poly_type,
            winding_delta,
            winding_count: 0,
            winding_count2: 0,
            ring: None,
            maximum_bound: None,
            prev_in_ael: None,
            next_in_ael: None,
        }
    }

    pub fn edge(&self) -> &Edge {
        &self.edges[self.current_edge]
    }

    /// The edge after the current one, unless we're on the last edge.
    pub fn next_edge(&self) -> Option<&Edge> {
        self.edges.get(self.current_edge + 1)
    }

    pub fn is_horizontal(&self) -> bool {
        self.edge().is_horizontal()
    }

    pub fn is_open(&self) -> bool {
        self.winding_delta == 0
    }

    pub fn top(&self) -> Point {
        self.edge().top
    }

    pub fn bot(&self) -> Point {
        self.edge().bot
    }

    pub fn dx(&self) -> f64 {
        self.edge().dx
    }

    pub fn x_at(&self, y: i64) -> i64 {
        self.edge().x_at(y)
    }

    /// Does our current edge finish exactly at the height `y`, with another edge to follow?
    pub fn is_intermediate(&self, y: i64) -> bool {
        self.top().y == y && self.next_edge().is_some()
    }

    /// Does our last edge finish exactly at the height `y`?
    pub fn is_maxima(&self, y: i64) -> bool {
        self.top().y == y && self.next_edge().is_none()
    }
}

/// Cleans up the vertices of a closed ring: duplicate points, spikes and
/// (unless `preserve_collinear` is set) collinear points are removed.
///
/// Returns `None` if fewer than three vertices survive.
pub(crate) fn ring_vertices(points: &[Point], preserve_collinear: bool) -> Option<Vec<Point>> {
    let mut pts = points.to_vec();
    let mut i = 0;
    // How many vertices in a row we've checked and kept.
    let mut kept = 0;
    while pts.len() >= 3 && kept < pts.len() {
        let n = pts.len();
        let prev = pts[(i + n - 1) % n];
        let cur = pts[i];
        let next = pts[(i + 1) % n];
        let redundant = cur == next
            || cur == prev
            || (slopes_equal(prev, cur, next)
                && (!preserve_collinear || !pt2_is_between(prev, cur, next)));
        if redundant {
            pts.remove(i);
            // Removing a vertex can make its predecessor redundant.
            i = (i + pts.len() - 1) % pts.len();
            kept = 0;
        } else {
            i = (i + 1) % n;
            kept += 1;
        }
    }
    (pts.len() >= 3).then_some(pts)
}

/// Cleans up the vertices of an open polyline: consecutive duplicates are removed.
///
/// Returns `None` if fewer than two vertices survive.
pub(crate) fn line_vertices(points: &[Point]) -> Option<Vec<Point>> {
    let mut pts = points.to_vec();
    pts.dedup();
    (pts.len() >= 2).then_some(pts)
}

// Builds the edges of a closed ring, rotated so that the first edge starts at
// the highest vertex that has a descending edge leaving it. That's always a
// local maximum, and any horizontal plateau it belongs to ends up at the back
// of the list where it will join the last bound towards a maximum.
fn start_on_local_maximum(vertices: &[Point]) -> Option<VecDeque<Edge>> {
    let n = vertices.len();
    let start = (0..n)
        .filter(|&i| vertices[(i + 1) % n].y < vertices[i].y)
        .max_by_key(|&i| (vertices[i].y, std::cmp::Reverse(i)))?;
    Some(
        (0..n)
            .map(|k| {
                let i = (start + k) % n;
                Edge::new(vertices[i], vertices[(i + 1) % n])
            })
            .collect(),
    )
}

// Peels off the edges from the front of `edges` that run downwards to the
// next local minimum, and returns them in bottom-to-top order.
fn create_bound_towards_minimum(edges: &mut VecDeque<Edge>) -> Vec<Edge> {
    if edges.len() == 1 {
        let mut e = edges.pop_front().into_iter().collect::<Vec<_>>();
        if e[0].is_horizontal() {
            e[0].reverse_horizontal();
        }
        return e;
    }

    if edges[0].is_horizontal() {
        edges[0].reverse_horizontal();
    }
    let mut edge_is_horizontal = edges[0].is_horizontal();
    let mut y_increasing_before_last_horizontal = false;
    let mut next = 1;
    while next < edges.len() {
        let edge = edges[next - 1];
        let next_edge = edges[next];
        let next_is_horizontal = next_edge.is_horizontal();
        if !next_is_horizontal && !edge_is_horizontal && edge.bot == next_edge.bot {
            break;
        }
        if !next_is_horizontal && edge_is_horizontal {
            if y_increasing_before_last_horizontal
                && (next_edge.bot == edge.bot || next_edge.bot == edge.top)
            {
                break;
            }
        } else if !y_increasing_before_last_horizontal
            && !edge_is_horizontal
            && next_is_horizontal
            && (edge.bot == next_edge.top || edge.bot == next_edge.bot)
        {
            y_increasing_before_last_horizontal = true;
        }
        edge_is_horizontal = next_is_horizontal;
        if edge_is_horizontal {
            edges[next].reverse_horizontal();
        }
        next += 1;
    }

    let mut bound: Vec<Edge> = edges.drain(..next).collect();
    bound.reverse();
    bound
}

// Peels off the edges from the front of `edges` that run upwards to the next
// local maximum.
fn create_bound_towards_maximum(edges: &mut VecDeque<Edge>) -> Vec<Edge> {
    if edges.len() == 1 {
        return edges.drain(..).collect();
    }

    let mut edge_is_horizontal = edges[0].is_horizontal();
    let mut y_decreasing_before_last_horizontal = false;
    let mut next = 1;
    while next < edges.len() {
        let edge = edges[next - 1];
        let next_edge = edges[next];
        let next_is_horizontal = next_edge.is_horizontal();
        if !next_is_horizontal && !edge_is_horizontal && edge.top == next_edge.top {
            break;
        }
        if !next_is_horizontal && edge_is_horizontal {
            if y_decreasing_before_last_horizontal
                && (next_edge.top == edge.bot || next_edge.top == edge.top)
            {
                break;
            }
        } else if !y_decreasing_before_last_horizontal
            && !edge_is_horizontal
            && next_is_horizontal
            && (edge.top == next_edge.top || edge.top == next_edge.bot)
        {
            y_decreasing_before_last_horizontal = true;
        }
        edge_is_horizontal = next_is_horizontal;
        next += 1;
    }

    edges.drain(..next).collect()
}

// Makes every horizontal edge in the bound start where its predecessor ends.
fn fix_horizontals(bound: &mut [Edge]) {
    if bound.len() < 2 {
        return;
    }
    if bound[0].is_horizontal() && bound[1].bot != bound[0].top {
        bound[0].reverse_horizontal();
    }
    for i in 1..bound.len() {
        if bound[i].is_horizontal() && bound[i - 1].top != bound[i].bot {
            bound[i].reverse_horizontal();
        }
    }
}

// Moves the horizontal edges at the start of `left` to the start of `right`,
// so that the left bound of a minimum never starts out horizontal.
fn move_horizontals_on_left_to_right(left: &mut Vec<Edge>, right: &mut Vec<Edge>) {
    let n = leading_horizontals(left);
    if n == 0 {
        return;
    }
    for e in &mut left[..n] {
        e.reverse_horizontal();
    }
    let mut moved: Vec<Edge> = left.drain(..n).collect();
    moved.reverse();
    right.splice(0..0, moved);
}

fn leading_horizontals(edges: &[Edge]) -> usize {
    edges.iter().take_while(|e| e.is_horizontal()).count()
}

/// Adds the bounds and local minima of one closed ring.
///
/// `vertices` should already have been cleaned by [`ring_vertices`]. Nothing is
/// added if the ring turns out to be malformed.
pub(crate) fn add_ring(
    bounds: &mut BoundVec<Bound>,
    minima: &mut LocalMinimumList,
    vertices: &[Point],
    poly_type: PolyType,
    index: usize,
) -> Result<(), Error> {
    let bounds_len = bounds.len();
    let minima_len = minima.len();
    let ret = add_ring_inner(bounds, minima, vertices, poly_type, index);
    if ret.is_err() {
        bounds.truncate(bounds_len);
        minima.truncate(minima_len);
    }
    ret
}

fn add_ring_inner(
    bounds: &mut BoundVec<Bound>,
    minima: &mut LocalMinimumList,
    vertices: &[Point],
    poly_type: PolyType,
    index: usize,
) -> Result<(), Error> {
    let malformed = Error::MalformedPath { index };
    let first_bound = bounds.len();
    let mut edges = start_on_local_maximum(vertices).ok_or(malformed)?;

    let mut first_minimum = None;
    let mut last_maximum: Option<BoundIdx> = None;
    while !edges.is_empty() {
        let mut to_min = create_bound_towards_minimum(&mut edges);
        if edges.is_empty() {
            return Err(malformed);
        }
        let mut to_max = create_bound_towards_maximum(&mut edges);
        fix_horizontals(&mut to_min);
        fix_horizontals(&mut to_max);

        let min_lead = leading_horizontals(&to_min);
        let max_lead = leading_horizontals(&to_max);
        if min_lead == to_min.len() || max_lead == to_max.len() {
            return Err(malformed);
        }
        let has_horizontal = min_lead > 0 || max_lead > 0;
        let minimum_is_left = if has_horizontal {
            if to_max[max_lead].bot.x > to_min[min_lead].bot.x {
                move_horizontals_on_left_to_right(&mut to_min, &mut to_max);
                true
            } else {
                move_horizontals_on_left_to_right(&mut to_max, &mut to_min);
                false
            }
        } else {
            to_max[max_lead].dx >= to_min[min_lead].dx
        };

        let y = to_min[0].bot.y;
        let (min_side, max_side) = if minimum_is_left {
            (Side::Left, Side::Right)
        } else {
            (Side::Right, Side::Left)
        };
        // The sweep goes up in `y`, and a counter-clockwise ring heads down to
        // its minimum on its left side. Giving that bound +1 makes the inside
        // of a counter-clockwise ring wind +1.
        let min_idx = bounds.push(Bound::new(to_min, poly_type, 1, min_side));
        let max_idx = bounds.push(Bound::new(to_max, poly_type, -1, max_side));
        match last_maximum {
            Some(lm) => {
                bounds[lm].maximum_bound = Some(min_idx);
                bounds[min_idx].maximum_bound = Some(lm);
            }
            None => first_minimum = Some(min_idx),
        }
        last_maximum = Some(max_idx);

        let (left, right) = if minimum_is_left {
            (min_idx, max_idx)
        } else {
            (max_idx, min_idx)
        };
        minima.push(LocalMinimum {
            left_bound: Some(left),
            right_bound: Some(right),
            y,
            has_horizontal,
        });
    }

    let (Some(first), Some(last)) = (first_minimum, last_maximum) else {
        return Err(malformed);
    };
    bounds[last].maximum_bound = Some(first);
    bounds[first].maximum_bound = Some(last);

    // Every bound of a ring must be paired with exactly one other bound at its maximum.
    for b in (first_bound..bounds.len()).map(BoundIdx) {
        match bounds[b].maximum_bound {
            Some(other) if bounds[other].maximum_bound == Some(b) && other != b => {}
            _ => return Err(malformed),
        }
    }
    tracing::trace!(index, bounds = bounds.len() - first_bound, "added ring");
    Ok(())
}

/// Adds the bounds and local minima of one open polyline.
///
/// `vertices` should already have been cleaned by [`line_vertices`].
pub(crate) fn add_line(
    bounds: &mut BoundVec<Bound>,
    minima: &mut LocalMinimumList,
    vertices: &[Point],
) {
    let mut edges: VecDeque<Edge> = vertices
        .windows(2)
        .map(|w| Edge::new(w[0], w[1]))
        .collect();

    let starts_ascending = vertices
        .windows(2)
        .find(|w| w[0].y != w[1].y)
        .is_some_and(|w| w[1].y > w[0].y);

    let mut last_maximum = None;
    if starts_ascending {
        // The start of the line is a local minimum, with only one bound.
        let mut to_max = create_bound_towards_maximum(&mut edges);
        fix_horizontals(&mut to_max);
        last_maximum = Some(push_lone_bound(bounds, minima, to_max));
    }

    while !edges.is_empty() {
        let mut to_min = create_bound_towards_minimum(&mut edges);
        fix_horizontals(&mut to_min);
        if edges.is_empty() {
            // The end of the line is a local minimum.
            let b = push_lone_bound(bounds, minima, to_min);
            if let Some(lm) = last_maximum {
                bounds[lm].maximum_bound = Some(b);
                bounds[b].maximum_bound = Some(lm);
            }
            break;
        }

        let mut to_max = create_bound_towards_maximum(&mut edges);
        fix_horizontals(&mut to_max);
        let min_lead = leading_horizontals(&to_min);
        let max_lead = leading_horizontals(&to_max);
        let has_horizontal = min_lead > 0 || max_lead > 0;
        let minimum_is_left = if max_lead < to_max.len()
            && (min_lead == to_min.len() || to_max[max_lead].dx < to_min[min_lead].dx)
        {
            move_horizontals_on_left_to_right(&mut to_max, &mut to_min);
            false
        } else {
            move_horizontals_on_left_to_right(&mut to_min, &mut to_max);
            true
        };

        let y = to_min[0].bot.y;
        let (min_side, max_side) = if minimum_is_left {
            (Side::Left, Side::Right)
        } else {
            (Side::Right, Side::Left)
        };
        let min_idx = bounds.push(Bound::new(to_min, PolyType::Subject, 0, min_side));
        let max_idx = bounds.push(Bound::new(to_max, PolyType::Subject, 0, max_side));
        if let Some(lm) = last_maximum {
            bounds[lm].maximum_bound = Some(min_idx);
            bounds[min_idx].maximum_bound = Some(lm);
        }
        last_maximum = Some(max_idx);

        let (left, right) = if minimum_is_left {
            (min_idx, max_idx)
        } else {
            (max_idx, min_idx)
        };
        minima.push(LocalMinimum {
            left_bound: Some(left),
            right_bound: Some(right),
            y,
            has_horizontal,
        });
    }
}

// Adds a local minimum at an end point of an open polyline. Returns the bound
// that climbs away from the end point.
fn push_lone_bound(
    bounds: &mut BoundVec<Bound>,
    minima: &mut LocalMinimumList,
    mut edges: Vec<Edge>,
) -> BoundIdx {
    let lead = leading_horizontals(&edges);
    let y = edges[0].bot.y;
    let has_horizontal = lead > 0;
    if lead < edges.len() && edges[lead].dx < 0.0 {
        // Leaning to the left, so this is a left bound.
        let mut right = Vec::new();
        move_horizontals_on_left_to_right(&mut edges, &mut right);
        let left = bounds.push(Bound::new(edges, PolyType::Subject, 0, Side::Left));
        let right = (!right.is_empty())
            .then(|| bounds.push(Bound::new(right, PolyType::Subject, 0, Side::Right)));
        minima.push(LocalMinimum {
            left_bound: Some(left),
            right_bound: right,
            y,
            has_horizontal,
        });
        left
    } else {
        let right = bounds.push(Bound::new(edges, PolyType::Subject, 0, Side::Right));
        minima.push(LocalMinimum {
            left_bound: None,
            right_bound: Some(right),
            y,
            has_horizontal,
        });
        right
    }
}
