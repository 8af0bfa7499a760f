//! Collecting input paths and running boolean operations on them.

use crate::{
    bound::{add_line, add_ring, line_vertices, ring_vertices, Bound, BoundVec},
    geom::Point,
    minima::LocalMinimumList,
    sweep::Sweep,
    winding::ClipConfig,
    ClipOptions, ClipType, Error, FillRule, PolyType, Solution,
};

/// Computes boolean operations between a set of subject paths and a set of clip paths.
///
/// Paths are split into bounds as they are added, so adding a path that
/// can't be clipped fails immediately and leaves the `Clipper` unchanged.
/// After that, [`Clipper::execute`] can be called any number of times with
/// different operations and fill rules.
///
/// ```
/// use scanclip::{Clipper, ClipType, FillRule, Point, PolyType};
///
/// let square = |x: i64, y: i64| {
///     vec![Point::new(x, y), Point::new(x + 10, y), Point::new(x + 10, y + 10), Point::new(x, y + 10)]
/// };
/// let mut clipper = Clipper::new();
/// clipper.add_path(&square(0, 0), PolyType::Subject, true).unwrap();
/// clipper.add_path(&square(5, 5), PolyType::Clip, true).unwrap();
/// let solution = clipper.execute(ClipType::Intersection, FillRule::NonZero, FillRule::NonZero).unwrap();
/// assert_eq!(solution.polygons.len(), 1);
/// assert_eq!(scanclip::signed_area(&solution.polygons[0]), 25.0);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Clipper {
    options: ClipOptions,
    bounds: BoundVec<Bound>,
    minima: LocalMinimumList,
    // How many paths we've been offered, including rejected ones. Used for
    // the index in error messages.
    path_count: usize,
}

impl Clipper {
    /// Creates a `Clipper` with the default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a `Clipper` with the given options.
    pub fn with_options(options: ClipOptions) -> Self {
        Clipper {
            options,
            ..Self::default()
        }
    }

    /// The options that this `Clipper` was created with.
    pub fn options(&self) -> &ClipOptions {
        &self.options
    }

    /// Adds a path.
    ///
    /// Closed paths (`closed == true`) are rings: the last point connects back
    /// to the first. Open paths are polylines and can only be subjects.
    ///
    /// Fails if a coordinate is out of range, if an open path is given as a
    /// clip path, or if there is nothing left of the path after removing
    /// duplicate points (and, for rings, collinear points and spikes).
    pub fn add_path(&mut self, path: &[Point], poly_type: PolyType, closed: bool) -> Result<(), Error> {
        let index = self.path_count;
        self.path_count += 1;

        if !path.iter().all(Point::in_range) {
            return Err(Error::CoordinateOutOfRange);
        }
        if closed {
            let vertices = ring_vertices(path, self.options.preserve_collinear)
                .ok_or(Error::MalformedPath { index })?;
            add_ring(&mut self.bounds, &mut self.minima, &vertices, poly_type, index)
        } else {
            if poly_type == PolyType::Clip {
                return Err(Error::OpenClipPath);
            }
            let vertices = line_vertices(path).ok_or(Error::MalformedPath { index })?;
            add_line(&mut self.bounds, &mut self.minima, &vertices);
            Ok(())
        }
    }

    /// Adds several paths of the same type.
    ///
    /// Stops at the first path that fails; the paths before it stay added.
    pub fn add_paths<P: AsRef<[Point]>>(
        &mut self,
        paths: &[P],
        poly_type: PolyType,
        closed: bool,
    ) -> Result<(), Error> {
        for path in paths {
            self.add_path(path.as_ref(), poly_type, closed)?;
        }
        Ok(())
    }

    /// Removes all paths.
    pub fn clear(&mut self) {
        self.bounds = BoundVec::default();
        self.minima = LocalMinimumList::default();
        self.path_count = 0;
    }

    /// Computes a boolean operation between the subject and the clip paths.
    ///
    /// The subject paths are filled according to `subject_fill`, and the clip
    /// paths according to `clip_fill`.
    pub fn execute(
        &self,
        clip_type: ClipType,
        subject_fill: FillRule,
        clip_fill: FillRule,
    ) -> Result<Solution, Error> {
        tracing::debug!(
            ?clip_type,
            ?subject_fill,
            ?clip_fill,
            bounds = self.bounds.len(),
            minima = self.minima.len(),
            "executing"
        );
        self.session(clip_type, subject_fill, clip_fill).run()
    }

    /// A fresh sweep over a copy of our bounds.
    pub(crate) fn session(&self, clip_type: ClipType, subject_fill: FillRule, clip_fill: FillRule) -> Sweep {
        let config = ClipConfig {
            clip_type,
            subject_fill,
            clip_fill,
        };
        Sweep::new(config, self.options, self.bounds.clone(), self.minima.clone())
    }
}
