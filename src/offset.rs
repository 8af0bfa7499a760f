//! Growing and shrinking polygons, and thickening polylines.
//!
//! Every input path is offset on its own, producing a rough outline that may
//! intersect itself at concave corners. The outlines are then merged with a
//! union under the positive fill rule, which removes the self-intersections.

use kurbo::Vec2;

use crate::{
    geom::{round, signed_area, Point, MAX_COORD},
    ClipOptions, ClipType, Clipper, Error, FillRule, PolyType,
};

const DEFAULT_ARC_TOLERANCE: f64 = 0.25;

/// How corners are treated when offsetting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum JoinType {
    /// Corners are cut off at distance `delta` from the original vertex.
    #[default]
    Square,
    /// Corners are rounded off with an arc of radius `delta`.
    Round,
    /// Corners are extended to a point, unless that point would be further
    /// than the miter limit from the original vertex, in which case they get
    /// squared off.
    Miter,
}

/// How the ends of a path are treated when offsetting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum EndType {
    /// The path is a closed polygon, and gets grown or shrunk.
    #[default]
    ClosedPolygon,
    /// The path is closed, and gets thickened into a band.
    ClosedLine,
    /// The path is open, and its ends are cut off flush.
    OpenButt,
    /// The path is open, and its ends are extended by `delta` and squared off.
    OpenSquare,
    /// The path is open, and its ends are rounded off.
    OpenRound,
}

impl EndType {
    fn is_closed(self) -> bool {
        matches!(self, EndType::ClosedPolygon | EndType::ClosedLine)
    }
}

/// Parameters for offsetting.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct OffsetOptions {
    /// The join type used by [`offset_paths`].
    pub join_type: JoinType,
    /// The end type used by [`offset_paths`].
    pub end_type: EndType,
    /// The furthest that a mitered corner may stick out, as a multiple of
    /// the offset distance. Values below 2 are treated as 2.
    pub miter_limit: f64,
    /// The largest distance that a rounded corner may deviate from a true
    /// arc. It is capped at a quarter of the offset distance; non-positive
    /// values mean the default of 0.25.
    pub arc_tolerance: f64,
}

impl Default for OffsetOptions {
    fn default() -> Self {
        OffsetOptions {
            join_type: JoinType::default(),
            end_type: EndType::default(),
            miter_limit: 2.0,
            arc_tolerance: DEFAULT_ARC_TOLERANCE,
        }
    }
}

#[derive(Clone, Debug)]
struct OffsetPath {
    points: Vec<Point>,
    join_type: JoinType,
    end_type: EndType,
}

/// Offsets a collection of paths.
///
/// Each path can have its own join type and end type. Closed polygons grow
/// for positive offsets and shrink for negative offsets; everything else is
/// only offset for positive distances.
#[derive(Clone, Debug, Default)]
pub struct ClipperOffset {
    options: OffsetOptions,
    paths: Vec<OffsetPath>,
    // The path and vertex index of the bottom-most (then left-most) vertex
    // of any closed polygon. That polygon is an outer one.
    lowest: Option<(usize, usize)>,
}

fn unit_normal(p1: Point, p2: Point) -> Vec2 {
    if p1 == p2 {
        return Vec2::ZERO;
    }
    let d = Vec2::new((p2.x - p1.x) as f64, (p2.y - p1.y) as f64).normalize();
    Vec2::new(d.y, -d.x)
}

impl ClipperOffset {
    /// Creates an empty `ClipperOffset`.
    pub fn new(options: OffsetOptions) -> Self {
        ClipperOffset {
            options,
            ..Self::default()
        }
    }

    /// Adds a path to be offset.
    ///
    /// Duplicate consecutive points are ignored. Closed polygons with fewer
    /// than three distinct points are ignored entirely.
    pub fn add_path(&mut self, path: &[Point], join_type: JoinType, end_type: EndType) {
        let mut end = path.len();
        if end == 0 {
            return;
        }
        if end_type.is_closed() {
            while end > 1 && path[0] == path[end - 1] {
                end -= 1;
            }
        }
        let mut points = path[..end].to_vec();
        points.dedup();
        if end_type == EndType::ClosedPolygon && points.len() < 3 {
            return;
        }

        if end_type == EndType::ClosedPolygon {
            let (k, lowest) = points
                .iter()
                .enumerate()
                .min_by_key(|(_, p)| **p)
                .map(|(k, p)| (k, *p))
                .expect("a polygon with three points has a lowest one");
            let lower = match self.lowest {
                None => true,
                Some((i, j)) => lowest < self.paths[i].points[j],
            };
            if lower {
                self.lowest = Some((self.paths.len(), k));
            }
        }
        self.paths.push(OffsetPath {
            points,
            join_type,
            end_type,
        });
    }

    /// Adds several paths with the same join type and end type.
    pub fn add_paths<P: AsRef<[Point]>>(&mut self, paths: &[P], join_type: JoinType, end_type: EndType) {
        for path in paths {
            self.add_path(path.as_ref(), join_type, end_type);
        }
    }

    /// Removes all paths.
    pub fn clear(&mut self) {
        self.paths.clear();
        self.lowest = None;
    }

    // Orients closed polygons so that outer ones have positive area, and
    // closed lines so that they all have positive area.
    fn oriented_paths(&self) -> Vec<OffsetPath> {
        let mut paths = self.paths.clone();
        let flip_polygons = self
            .lowest
            .is_some_and(|(i, _)| signed_area(&paths[i].points) < 0.0);
        for path in &mut paths {
            let positive = signed_area(&path.points) >= 0.0;
            let reverse = match path.end_type {
                EndType::ClosedPolygon => flip_polygons,
                EndType::ClosedLine => !positive,
                _ => false,
            };
            if reverse {
                path.points.reverse();
            }
        }
        paths
    }

    /// Offsets all the paths by `delta`, and returns the outlines.
    ///
    /// Outer outlines have positive signed area, and holes negative.
    pub fn execute(&self, delta: f64) -> Result<Vec<Vec<Point>>, Error> {
        let paths = self.oriented_paths();
        let outlines = Offsetter::new(&self.options, delta).offset(&paths);
        tracing::debug!(paths = paths.len(), outlines = outlines.len(), delta, "offset");

        if delta > 0.0 {
            let mut clipper = Clipper::new();
            add_outlines(&mut clipper, &outlines)?;
            let solution = clipper.execute(ClipType::Union, FillRule::Positive, FillRule::Positive)?;
            return Ok(solution.polygons);
        }

        // Put everything inside a big negatively-oriented rectangle, and take
        // the negative union. The shrunken outlines end up as holes in the
        // rectangle; after reversing and removing the rectangle, they come
        // out with the right orientation.
        let mut clipper = Clipper::with_options(ClipOptions {
            reverse_output: true,
            ..ClipOptions::default()
        });
        let Some(first) = outlines.iter().flatten().next() else {
            return Ok(Vec::new());
        };
        let (mut left, mut right, mut bottom, mut top) = (first.x, first.x, first.y, first.y);
        for p in outlines.iter().flatten() {
            left = left.min(p.x);
            right = right.max(p.x);
            bottom = bottom.min(p.y);
            top = top.max(p.y);
        }
        add_outlines(&mut clipper, &outlines)?;
        let lower = |v: i64| v.saturating_sub(10).max(-MAX_COORD);
        let upper = |v: i64| v.saturating_add(10).min(MAX_COORD);
        let outer = [
            Point::new(lower(left), lower(bottom)),
            Point::new(lower(left), upper(top)),
            Point::new(upper(right), upper(top)),
            Point::new(upper(right), lower(bottom)),
        ];
        clipper.add_path(&outer, PolyType::Subject, true)?;
        let mut polygons = clipper
            .execute(ClipType::Union, FillRule::Negative, FillRule::Negative)?
            .polygons;
        let biggest = polygons
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| signed_area(a).abs().total_cmp(&signed_area(b).abs()))
            .map(|(i, _)| i);
        if let Some(i) = biggest {
            polygons.remove(i);
        }
        Ok(polygons)
    }
}

// Outlines that collapse to nothing are skipped.
fn add_outlines(clipper: &mut Clipper, outlines: &[Vec<Point>]) -> Result<(), Error> {
    for outline in outlines {
        match clipper.add_path(outline, PolyType::Subject, true) {
            Ok(()) | Err(Error::MalformedPath { .. }) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Offsets a collection of paths by `delta`, using the join and end types from `options`.
pub fn offset_paths<P: AsRef<[Point]>>(
    paths: &[P],
    delta: f64,
    options: &OffsetOptions,
) -> Result<Vec<Vec<Point>>, Error> {
    let mut co = ClipperOffset::new(*options);
    co.add_paths(paths, options.join_type, options.end_type);
    co.execute(delta)
}

/// The state for building the rough outlines of one offset operation.
struct Offsetter {
    delta: f64,
    // Rotation by one step of a round corner.
    sin: f64,
    cos: f64,
    steps: f64,
    steps_per_rad: f64,
    // Squared reciprocal of the miter limit, doubled.
    miter_lim: f64,
    // The sine of the angle at the current corner.
    sin_a: f64,
    normals: Vec<Vec2>,
    dest: Vec<Point>,
}

impl Offsetter {
    fn new(options: &OffsetOptions, delta: f64) -> Self {
        let miter_lim = if options.miter_limit > 2.0 {
            2.0 / (options.miter_limit * options.miter_limit)
        } else {
            0.5
        };
        let abs_delta = delta.abs();
        let tolerance = if options.arc_tolerance <= 0.0 {
            DEFAULT_ARC_TOLERANCE
        } else {
            options.arc_tolerance.min(abs_delta * DEFAULT_ARC_TOLERANCE)
        };
        let mut steps = std::f64::consts::PI / (1.0 - tolerance / abs_delta).acos();
        // Don't use more steps than there are pixels around the arc.
        if steps > abs_delta * std::f64::consts::PI {
            steps = abs_delta * std::f64::consts::PI;
        }
        let angle = std::f64::consts::TAU / steps;
        let sin = if delta < 0.0 { -angle.sin() } else { angle.sin() };
        Offsetter {
            delta,
            sin,
            cos: angle.cos(),
            steps,
            steps_per_rad: steps / std::f64::consts::TAU,
            miter_lim,
            sin_a: 0.0,
            normals: Vec::new(),
            dest: Vec::new(),
        }
    }

    fn shift(&self, p: Point, n: Vec2) -> Point {
        Point::new(
            round(p.x as f64 + n.x * self.delta),
            round(p.y as f64 + n.y * self.delta),
        )
    }

    fn offset(&mut self, paths: &[OffsetPath]) -> Vec<Vec<Point>> {
        if self.delta.abs() < 1e-20 {
            return paths
                .iter()
                .filter(|p| p.end_type == EndType::ClosedPolygon)
                .map(|p| p.points.clone())
                .collect();
        }

        let mut outlines = Vec::with_capacity(paths.len() * 2);
        for path in paths {
            let src = &path.points[..];
            let len = src.len();
            if len == 0
                || (self.delta <= 0.0 && (len < 3 || path.end_type != EndType::ClosedPolygon))
            {
                continue;
            }
            self.dest.clear();
            if len == 1 {
                self.offset_single_point(src[0], path.join_type);
                outlines.push(std::mem::take(&mut self.dest));
                continue;
            }

            self.normals.clear();
            self.normals
                .extend(src.windows(2).map(|w| unit_normal(w[0], w[1])));
            if path.end_type.is_closed() {
                self.normals.push(unit_normal(src[len - 1], src[0]));
            } else {
                self.normals.push(self.normals[len - 2]);
            }

            match path.end_type {
                EndType::ClosedPolygon => {
                    let mut k = len - 1;
                    for j in 0..len {
                        self.offset_point(src, j, &mut k, path.join_type);
                    }
                    outlines.push(std::mem::take(&mut self.dest));
                }
                EndType::ClosedLine => {
                    let mut k = len - 1;
                    for j in 0..len {
                        self.offset_point(src, j, &mut k, path.join_type);
                    }
                    outlines.push(std::mem::take(&mut self.dest));

                    // Now go the other way round.
                    let n = self.normals[len - 1];
                    for j in (1..len).rev() {
                        self.normals[j] = -self.normals[j - 1];
                    }
                    self.normals[0] = -n;
                    let mut k = 0;
                    for j in (0..len).rev() {
                        self.offset_point(src, j, &mut k, path.join_type);
                    }
                    outlines.push(std::mem::take(&mut self.dest));
                }
                EndType::OpenButt | EndType::OpenSquare | EndType::OpenRound => {
                    self.offset_open(src, path.join_type, path.end_type);
                    outlines.push(std::mem::take(&mut self.dest));
                }
            }
        }
        outlines
    }

    fn offset_single_point(&mut self, p: Point, join_type: JoinType) {
        if join_type == JoinType::Round {
            let mut v = Vec2::new(1.0, 0.0);
            let mut j = 1.0;
            while j <= self.steps {
                self.dest.push(self.shift(p, v));
                v = Vec2::new(v.x * self.cos - self.sin * v.y, v.x * self.sin + v.y * self.cos);
                j += 1.0;
            }
        } else {
            for v in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                self.dest.push(self.shift(p, Vec2::from(v)));
            }
        }
    }

    // Goes out along one side of an open path, around its far end, and back
    // along the other side.
    fn offset_open(&mut self, src: &[Point], join_type: JoinType, end_type: EndType) {
        let len = src.len();
        let mut k = 0;
        for j in 1..len - 1 {
            self.offset_point(src, j, &mut k, join_type);
        }

        let j = len - 1;
        if end_type == EndType::OpenButt {
            let n = self.normals[j];
            self.dest.push(self.shift(src[j], n));
            self.dest.push(self.shift(src[j], -n));
        } else {
            self.sin_a = 0.0;
            self.normals[j] = -self.normals[j];
            if end_type == EndType::OpenSquare {
                self.do_square(src, j, len - 2);
            } else {
                self.do_round(src, j, len - 2);
            }
        }

        for j in (1..len).rev() {
            self.normals[j] = -self.normals[j - 1];
        }
        self.normals[0] = -self.normals[1];

        let mut k = len - 1;
        for j in (1..len - 1).rev() {
            self.offset_point(src, j, &mut k, join_type);
        }

        if end_type == EndType::OpenButt {
            let n = self.normals[0];
            self.dest.push(self.shift(src[0], -n));
            self.dest.push(self.shift(src[0], n));
        } else {
            self.sin_a = 0.0;
            if end_type == EndType::OpenSquare {
                self.do_square(src, 0, 1);
            } else {
                self.do_round(src, 0, 1);
            }
        }
    }

    // Offsets the corner at `src[j]`, between the edges with normals `k` and `j`.
    fn offset_point(&mut self, src: &[Point], j: usize, k: &mut usize, join_type: JoinType) {
        let (nj, nk) = (self.normals[j], self.normals[*k]);
        self.sin_a = nk.cross(nj);
        if (self.sin_a * self.delta).abs() < 1.0 {
            // The edges are almost parallel. If they go the same way, one
            // point is enough.
            if nk.dot(nj) > 0.0 {
                self.dest.push(self.shift(src[j], nk));
                return;
            }
        } else {
            self.sin_a = self.sin_a.clamp(-1.0, 1.0);
        }

        if self.sin_a * self.delta < 0.0 {
            // A concave corner. The outline loops back through the vertex, and
            // the loop gets removed by the union afterwards.
            self.dest.push(self.shift(src[j], nk));
            self.dest.push(src[j]);
            self.dest.push(self.shift(src[j], nj));
        } else {
            match join_type {
                JoinType::Miter => {
                    let r = 1.0 + nj.dot(nk);
                    if r >= self.miter_lim {
                        self.do_miter(src, j, *k, r);
                    } else {
                        self.do_square(src, j, *k);
                    }
                }
                JoinType::Square => self.do_square(src, j, *k),
                JoinType::Round => self.do_round(src, j, *k),
            }
        }
        *k = j;
    }

    fn do_square(&mut self, src: &[Point], j: usize, k: usize) {
        let (nj, nk) = (self.normals[j], self.normals[k]);
        let dx = (self.sin_a.atan2(nk.dot(nj)) / 4.0).tan();
        let p = src[j];
        self.dest.push(self.shift(p, Vec2::new(nk.x - nk.y * dx, nk.y + nk.x * dx)));
        self.dest.push(self.shift(p, Vec2::new(nj.x + nj.y * dx, nj.y - nj.x * dx)));
    }

    fn do_miter(&mut self, src: &[Point], j: usize, k: usize, r: f64) {
        let n = (self.normals[k] + self.normals[j]) / r;
        self.dest.push(self.shift(src[j], n));
    }

    fn do_round(&mut self, src: &[Point], j: usize, k: usize) {
        let (nj, nk) = (self.normals[j], self.normals[k]);
        let a = self.sin_a.atan2(nk.dot(nj));
        let steps = (round(self.steps_per_rad * a.abs()) as usize).max(1);

        let mut v = nk;
        for _ in 0..steps {
            self.dest.push(self.shift(src[j], v));
            v = Vec2::new(v.x * self.cos - self.sin * v.y, v.x * self.sin + v.y * self.cos);
        }
        self.dest.push(self.shift(src[j], nj));
    }
}
