#![deny(missing_docs)]
#![doc = include_str!("../README.md")]

#[macro_use]
mod typed_vec;

mod ael;
mod bound;
mod clipper;
mod geom;
mod minima;
pub mod offset;
mod output;
mod scanbeam;
mod sweep;
mod winding;

pub use clipper::Clipper;
pub use geom::{signed_area, Point, MAX_COORD};
use kurbo::Shape;
pub use offset::{offset_paths, ClipperOffset, EndType, JoinType, OffsetOptions};

/// A fill rule tells us how to decide whether a point is "inside" a collection of paths.
///
/// The winding number of a point counts how many times the paths wind
/// around it, with counter-clockwise windings counting as positive.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FillRule {
    /// The point is "inside" if its winding number is odd.
    EvenOdd,
    /// The point is "inside" if its winding number is non-zero.
    NonZero,
    /// The point is "inside" if its winding number is positive.
    Positive,
    /// The point is "inside" if its winding number is negative.
    Negative,
}

/// Binary operations between sets.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ClipType {
    /// A point is in the intersection of two sets if it is in both.
    Intersection,
    /// A point is in the union of two sets if it is in either one.
    Union,
    /// A point is in the difference of two sets if it is in the first but not the second.
    Difference,
    /// A point is in the exclusive-or of two sets if it is in one or the other, but not both.
    Xor,
}

/// Which of the two sets in a binary operation a path belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PolyType {
    /// The first set. Subject paths can be open polylines.
    Subject,
    /// The second set.
    Clip,
}

/// Options for clipping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ClipOptions {
    /// Output outer rings with negative area and holes with positive area,
    /// instead of the other way around.
    pub reverse_output: bool,
    /// Keep vertices in the middle of straight edges, in the input and in the
    /// output. Vertices that double back on themselves are still removed.
    pub preserve_collinear: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Clipping failed.
pub enum Error {
    /// An input coordinate was larger (in absolute value) than [`MAX_COORD`],
    /// or not finite.
    CoordinateOutOfRange,
    /// An input path had too few distinct vertices to describe anything.
    MalformedPath {
        /// The index of the path, counting every path offered to the clipper.
        index: usize,
    },
    /// An open path was given as a clip path.
    OpenClipPath,
    /// The sweep got into a state that should be impossible.
    InvalidState {
        /// What went wrong.
        what: &'static str,
        /// The position of the sweep line.
        y: i64,
    },
    /// The crossings within a scanbeam couldn't be put in an order that only
    /// swaps neighboring edges.
    IntersectionOrder {
        /// The top of the scanbeam.
        y: i64,
    },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::CoordinateOutOfRange => write!(f, "an input coordinate was out of range"),
            Error::MalformedPath { index } => write!(f, "input path {index} was degenerate"),
            Error::OpenClipPath => write!(f, "clip paths must be closed"),
            Error::InvalidState { what, y } => write!(f, "invalid sweep state at y = {y}: {what}"),
            Error::IntersectionOrder { y } => {
                write!(f, "failed to order the intersections below y = {y}")
            }
        }
    }
}

impl std::error::Error for Error {}

/// The output of a clipping operation.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Solution {
    /// Closed output rings.
    ///
    /// Outer rings have positive signed area and holes have negative signed
    /// area (unless [`ClipOptions::reverse_output`] was set). The last point
    /// is not repeated.
    pub polygons: Vec<Vec<Point>>,
    /// Open output polylines, the parts of the open subject paths that
    /// survived the operation.
    pub polylines: Vec<Vec<Point>>,
}

impl Solution {
    /// Converts the closed rings to a path, dividing all coordinates by `scale`.
    pub fn to_bez_path(&self, scale: f64) -> kurbo::BezPath {
        let mut path = kurbo::BezPath::new();
        for ring in &self.polygons {
            let mut points = ring.iter().map(|p| p.to_kurbo(scale));
            let Some(first) = points.next() else {
                continue;
            };
            path.move_to(first);
            for p in points {
                path.line_to(p);
            }
            path.close_path();
        }
        path
    }
}

/// Flattens a path into closed rings with integer coordinates.
///
/// Coordinates are multiplied by `scale` and rounded. Curves are
/// approximated by polylines to within `tolerance` (in the unscaled
/// coordinates). Every subpath is treated as closed.
pub fn rings_from_bez_path(path: &kurbo::BezPath, scale: f64, tolerance: f64) -> Vec<Vec<Point>> {
    let mut rings = Vec::new();
    let mut ring = Vec::new();
    kurbo::flatten(path.iter(), tolerance, |el| match el {
        kurbo::PathEl::MoveTo(p) => {
            if !ring.is_empty() {
                rings.push(std::mem::take(&mut ring));
            }
            ring.push(Point::from_kurbo(p, scale));
        }
        kurbo::PathEl::LineTo(p) => ring.push(Point::from_kurbo(p, scale)),
        kurbo::PathEl::ClosePath => {
            if !ring.is_empty() {
                rings.push(std::mem::take(&mut ring));
            }
        }
        kurbo::PathEl::QuadTo(..) | kurbo::PathEl::CurveTo(..) => unreachable!(),
    });
    if !ring.is_empty() {
        rings.push(ring);
    }
    rings
}

/// Computes a boolean operation between two sets, each of which is described as a collection of closed paths.
///
/// Coordinates are multiplied by `scale` and rounded to integers before
/// clipping, so `scale` determines the precision of the result. Use
/// [`Solution::to_bez_path`] with the same `scale` to get back to the
/// original coordinates. Rings that degenerate after rounding are ignored.
pub fn binary_op(
    set_a: &kurbo::BezPath,
    set_b: &kurbo::BezPath,
    fill_rule: FillRule,
    op: ClipType,
    scale: f64,
) -> Result<Solution, Error> {
    let finite = |path: &kurbo::BezPath| {
        path.elements()
            .iter()
            .all(|el| el.end_point().map_or(true, |p| p.is_finite()))
    };
    if !finite(set_a) || !finite(set_b) {
        return Err(Error::CoordinateOutOfRange);
    }
    // Find the extremal values, to make sure that everything fits.
    let bbox = set_a.bounding_box().union(set_b.bounding_box());
    let min = bbox.min_x().min(bbox.min_y());
    let max = bbox.max_x().max(bbox.max_y());
    let m = min.abs().max(max.abs()) * scale;
    if !m.is_finite() || m > MAX_COORD as f64 {
        return Err(Error::CoordinateOutOfRange);
    }

    let tolerance = 0.25 / scale;
    let mut clipper = Clipper::new();
    for (set, poly_type) in [(set_a, PolyType::Subject), (set_b, PolyType::Clip)] {
        for ring in rings_from_bez_path(set, scale, tolerance) {
            match clipper.add_path(&ring, poly_type, true) {
                Ok(()) | Err(Error::MalformedPath { .. }) => {}
                Err(e) => return Err(e),
            }
        }
    }
    clipper.execute(op, fill_rule, fill_rule)
}

#[cfg(test)]
mod tests {
    use kurbo::{BezPath, Shape as _};

    use super::*;

    #[test]
    fn two_squares() {
        fn to_bez(mut points: impl Iterator<Item = (f64, f64)>) -> BezPath {
            let p = points.next().unwrap();
            let mut ret = BezPath::default();
            ret.move_to(p);
            for q in points {
                ret.line_to(q);
            }
            ret.line_to(p);
            ret
        }
        let a = vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        let b = vec![(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)];
        let output = binary_op(
            &to_bez(a.into_iter()),
            &to_bez(b.into_iter()),
            FillRule::EvenOdd,
            ClipType::Intersection,
            100.0,
        )
        .unwrap();

        assert_eq!(output.polygons.len(), 1);
        assert_eq!(signed_area(&output.polygons[0]), 2500.0);
        let path = output.to_bez_path(100.0);
        assert!((path.area().abs() - 0.25).abs() < 1e-9);
        assert_eq!(path.bounding_box(), kurbo::Rect::new(0.0, 0.0, 0.5, 0.5));
    }

    #[test]
    fn curves_are_flattened() {
        let circle = kurbo::Circle::new((0.0, 0.0), 1.0).to_path(0.01);
        let rings = rings_from_bez_path(&circle, 1000.0, 0.001);
        assert_eq!(rings.len(), 1);
        assert!(rings[0].len() > 8);
        let area = signed_area(&rings[0]) / 1e6;
        assert!((area - std::f64::consts::PI).abs() < 0.01);
    }

    #[test]
    fn huge_input() {
        let mut a = BezPath::new();
        a.move_to((0.0, 0.0));
        a.line_to((f64::INFINITY, 0.0));
        a.line_to((0.0, 1.0));
        a.close_path();
        assert_eq!(
            binary_op(&a, &BezPath::new(), FillRule::NonZero, ClipType::Union, 1.0),
            Err(Error::CoordinateOutOfRange)
        );
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            Error::MalformedPath { index: 3 }.to_string(),
            "input path 3 was degenerate"
        );
        assert_eq!(
            Error::IntersectionOrder { y: -2 }.to_string(),
            "failed to order the intersections below y = -2"
        );
    }

    #[test]
    fn options_from_json() {
        let options: ClipOptions = serde_json::from_str(r#"{"reverse_output": true}"#).unwrap();
        assert!(options.reverse_output);
        assert!(!options.preserve_collinear);
    }
}
