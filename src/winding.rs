//! Winding numbers, and deciding which bounds contribute to the output.
//!
//! Every bound carries two winding numbers for the region immediately to its
//! right: `winding_count` counts the paths of its own type, and
//! `winding_count2` counts the paths of the other type.

use crate::{
    ael::ActiveEdgeList,
    bound::{Bound, BoundIdx, BoundVec},
    ClipType, FillRule, PolyType,
};

/// The boolean operation and fill rules that a sweep is computing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ClipConfig {
    pub clip_type: ClipType,
    pub subject_fill: FillRule,
    pub clip_fill: FillRule,
}

impl ClipConfig {
    /// The fill rule of paths of type `ty`.
    pub fn fill(&self, ty: PolyType) -> FillRule {
        match ty {
            PolyType::Subject => self.subject_fill,
            PolyType::Clip => self.clip_fill,
        }
    }

    /// The fill rule of paths of the other type.
    pub fn other_fill(&self, ty: PolyType) -> FillRule {
        match ty {
            PolyType::Subject => self.clip_fill,
            PolyType::Clip => self.subject_fill,
        }
    }

    pub fn is_even_odd(&self, b: &Bound) -> bool {
        self.fill(b.poly_type) == FillRule::EvenOdd
    }

    pub fn is_even_odd_alt(&self, b: &Bound) -> bool {
        self.other_fill(b.poly_type) == FillRule::EvenOdd
    }
}

/// Computes the winding counts of a bound that was just inserted into the active edge list.
///
/// The counts are derived from the nearest bound of the same type to the left,
/// so everything to the left of `b` must already have correct counts.
pub(crate) fn set_winding_count(
    config: &ClipConfig,
    bounds: &mut BoundVec<Bound>,
    ael: &ActiveEdgeList,
    b: BoundIdx,
) {
    let (count, count2) = winding_count(config, bounds, ael, b);
    bounds[b].winding_count = count;
    bounds[b].winding_count2 = count2;
}

fn winding_count(
    config: &ClipConfig,
    bounds: &BoundVec<Bound>,
    ael: &ActiveEdgeList,
    b: BoundIdx,
) -> (i32, i32) {
    let bound = &bounds[b];
    let delta = bound.winding_delta;

    // The closest bound of the same type to our left, ignoring open lines.
    let mut e = bound.prev_in_ael;
    while let Some(idx) = e {
        let other = &bounds[idx];
        if other.poly_type == bound.poly_type && other.winding_delta != 0 {
            break;
        }
        e = other.prev_in_ael;
    }

    let count;
    let mut count2;
    // Where to start scanning for the other type's winding number.
    let scan_start;
    match e {
        None => {
            count = if delta == 0 {
                if config.fill(bound.poly_type) == FillRule::Negative {
                    -1
                } else {
                    1
                }
            } else {
                delta
            };
            count2 = 0;
            scan_start = ael.head;
        }
        Some(e) => {
            let prev = &bounds[e];
            if delta == 0 && config.clip_type != ClipType::Union {
                count = 1;
            } else if config.is_even_odd(bound) {
                count = if delta == 0 {
                    // Is the open line inside a closed path of its own type?
                    let mut inside = true;
                    let mut e2 = prev.prev_in_ael;
                    while let Some(idx) = e2 {
                        let other = &bounds[idx];
                        if other.poly_type == prev.poly_type && other.winding_delta != 0 {
                            inside = !inside;
                        }
                        e2 = other.prev_in_ael;
                    }
                    if inside {
                        0
                    } else {
                        1
                    }
                } else {
                    delta
                };
            } else if prev.winding_count * prev.winding_delta < 0 {
                // The previous bound takes the winding number towards zero, so
                // we're outside of its path.
                count = if prev.winding_count.abs() > 1 {
                    // ...but still inside another one.
                    if prev.winding_delta * delta < 0 {
                        prev.winding_count
                    } else {
                        prev.winding_count + delta
                    }
                } else if delta == 0 {
                    1
                } else {
                    delta
                };
            } else {
                // The previous bound takes the winding number away from zero,
                // so we're inside its path.
                count = if delta == 0 {
                    if prev.winding_count < 0 {
                        prev.winding_count - 1
                    } else {
                        prev.winding_count + 1
                    }
                } else if prev.winding_delta * delta < 0 {
                    prev.winding_count
                } else {
                    prev.winding_count + delta
                };
            }
            count2 = prev.winding_count2;
            scan_start = prev.next_in_ael;
        }
    }

    // Everything between the start of the scan and us changes the other
    // winding number (and the ones of our type cancel out in even-odd mode).
    let even_odd_alt = config.is_even_odd_alt(bound);
    let mut e = scan_start;
    while let Some(idx) = e {
        if idx == b {
            break;
        }
        let other = &bounds[idx];
        if even_odd_alt {
            if other.winding_delta != 0 {
                count2 = if count2 == 0 { 1 } else { 0 };
            }
        } else {
            count2 += other.winding_delta;
        }
        e = other.next_in_ael;
    }
    (count, count2)
}

/// Does the bound `b` lie on the boundary of the result of the boolean operation?
pub(crate) fn is_contributing(config: &ClipConfig, b: &Bound) -> bool {
    let fill = config.fill(b.poly_type);
    let other = config.other_fill(b.poly_type);

    let on_own_boundary = match fill {
        // An open line that has been flagged as inside a closed path doesn't count.
        FillRule::EvenOdd => b.winding_delta != 0 || b.winding_count == 1,
        FillRule::NonZero => b.winding_count.abs() == 1,
        FillRule::Positive => b.winding_count == 1,
        FillRule::Negative => b.winding_count == -1,
    };
    if !on_own_boundary {
        return false;
    }

    let inside_other = || match other {
        FillRule::EvenOdd | FillRule::NonZero => b.winding_count2 != 0,
        FillRule::Positive => b.winding_count2 > 0,
        FillRule::Negative => b.winding_count2 < 0,
    };
    match config.clip_type {
        ClipType::Intersection => inside_other(),
        ClipType::Union => !inside_other(),
        ClipType::Difference => match b.poly_type {
            PolyType::Subject => !inside_other(),
            PolyType::Clip => inside_other(),
        },
        // Closed paths always contribute to a xor, but open lines only
        // contribute where they're outside the other type.
        ClipType::Xor => b.winding_delta != 0 || !inside_other(),
    }
}
