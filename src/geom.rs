//! Geometric primitives: integer points, straight edges and the slope predicates
//! that the sweep relies on.

/// The largest coordinate magnitude we accept.
///
/// Differences of two coordinates always fit in an `i64`, and products of two
/// differences always fit in an `i128`.
pub const MAX_COORD: i64 = 0x3FFF_FFFF_FFFF_FFFF;

/// The inverse slope we assign to horizontal edges.
///
/// It compares larger than the inverse slope of any non-horizontal edge.
pub(crate) const HORIZONTAL_DX: f64 = 1.0e40;

/// A two-dimensional point with integer coordinates.
///
/// Points are sorted by `y` and then by `x`, for the convenience of the sweep
/// (which moves in increasing `y`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: i64,
    /// Vertical coordinate.
    ///
    /// The sweep line moves in the direction of increasing `y`, so the
    /// documentation calls smaller `y` "below" and larger `y` "above".
    pub y: i64,
}

impl Ord for Point {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.y, self.x).cmp(&(other.y, other.x))
    }
}

impl PartialOrd for Point {
    #[inline(always)]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Debug for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:?}, {:?})", self.x, self.y)
    }
}

impl Point {
    /// Create a new point.
    pub fn new(x: i64, y: i64) -> Self {
        Point { x, y }
    }

    /// Is this point inside the supported coordinate range?
    pub fn in_range(&self) -> bool {
        (-MAX_COORD..=MAX_COORD).contains(&self.x) && (-MAX_COORD..=MAX_COORD).contains(&self.y)
    }

    /// Converts to a `kurbo` point, dividing both coordinates by `scale`.
    pub fn to_kurbo(self, scale: f64) -> kurbo::Point {
        kurbo::Point::new(self.x as f64 / scale, self.y as f64 / scale)
    }

    /// Converts from a `kurbo` point, multiplying both coordinates by `scale`
    /// and rounding to the nearest integer.
    pub fn from_kurbo(p: kurbo::Point, scale: f64) -> Self {
        Point::new(round(p.x * scale), round(p.y * scale))
    }
}

impl From<(i64, i64)> for Point {
    fn from((x, y): (i64, i64)) -> Self {
        Self { x, y }
    }
}

/// Rounds to the nearest integer, with halves going away from zero.
///
/// Out-of-range values saturate.
pub(crate) fn round(x: f64) -> i64 {
    x.round() as i64
}

// The cross product of (b - a) and (c - a).
fn cross(a: Point, b: Point, c: Point) -> i128 {
    (b.x as i128 - a.x as i128) * (c.y as i128 - a.y as i128)
        - (b.y as i128 - a.y as i128) * (c.x as i128 - a.x as i128)
}

/// Do the segments `p1 -- p2` and `p2 -- p3` have the same slope?
pub(crate) fn slopes_equal(p1: Point, p2: Point, p3: Point) -> bool {
    cross(p1, p2, p3) == 0
}

/// Do the segments `p1 -- p2` and `p3 -- p4` have the same slope?
pub(crate) fn slopes_equal4(p1: Point, p2: Point, p3: Point, p4: Point) -> bool {
    let lhs = (p1.y as i128 - p2.y as i128) * (p3.x as i128 - p4.x as i128);
    let rhs = (p1.x as i128 - p2.x as i128) * (p3.y as i128 - p4.y as i128);
    lhs == rhs
}

/// Assuming the three points are collinear, is `p2` strictly between the other two?
pub(crate) fn pt2_is_between(p1: Point, p2: Point, p3: Point) -> bool {
    if p1 == p3 || p1 == p2 || p3 == p2 {
        false
    } else if p1.x != p3.x {
        (p2.x > p1.x) == (p2.x < p3.x)
    } else {
        (p2.y > p1.y) == (p2.y < p3.y)
    }
}

/// The signed area enclosed by a closed polyline.
///
/// Counter-clockwise polylines (when `y` points up) have positive area.
pub fn signed_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut a = 0.0;
    let mut prev = points[points.len() - 1];
    for &p in points {
        a += (prev.x as f64 + p.x as f64) * (p.y as f64 - prev.y as f64);
        prev = p;
    }
    a * 0.5
}

/// A straight edge of an input path, in sweep-line order.
///
/// `bot` is the endpoint that the sweep line reaches first. For a horizontal
/// edge both endpoints are reached together; the bound builder flips them so
/// that `bot` is the end that connects to the previous edge of the bound.
#[derive(Clone, Copy, PartialEq)]
pub(crate) struct Edge {
    pub bot: Point,
    pub top: Point,
    /// The inverse slope, `dx / dy`, or `HORIZONTAL_DX`.
    pub dx: f64,
}

impl std::fmt::Debug for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} -- {:?}", self.bot, self.top)
    }
}

impl Edge {
    /// Creates the edge between two consecutive path vertices.
    pub fn new(current: Point, next: Point) -> Self {
        let (bot, top) = if current.y <= next.y {
            (current, next)
        } else {
            (next, current)
        };
        let dy = top.y - bot.y;
        let dx = if dy == 0 {
            HORIZONTAL_DX
        } else {
            (top.x - bot.x) as f64 / dy as f64
        };
        Edge { bot, top, dx }
    }

    pub fn is_horizontal(&self) -> bool {
        self.bot.y == self.top.y
    }

    /// Swaps the `x` coordinates of the endpoints of a horizontal edge.
    ///
    /// This makes the edge's `bot` line up with the adjoining edge that
    /// precedes it in its bound.
    pub fn reverse_horizontal(&mut self) {
        debug_assert!(self.is_horizontal());
        std::mem::swap(&mut self.top.x, &mut self.bot.x);
    }

    /// The horizontal position of this edge at height `y`.
    ///
    /// Exact at the top endpoint, and rounded elsewhere.
    pub fn x_at(&self, y: i64) -> i64 {
        if y == self.top.y {
            self.top.x
        } else if self.is_horizontal() {
            self.bot.x
        } else {
            self.bot.x + round(self.dx * (y - self.bot.y) as f64)
        }
    }

    /// Do these two edges lie on parallel lines?
    pub fn slopes_equal(&self, other: &Edge) -> bool {
        slopes_equal4(self.bot, self.top, other.bot, other.top)
    }
}
