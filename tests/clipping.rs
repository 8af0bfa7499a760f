use assert_matches::assert_matches;
use proptest::prelude::*;
use scanclip::{
    signed_area, ClipOptions, ClipType, Clipper, Error, FillRule, Point, PolyType, Solution,
};

fn path(coords: &[(i64, i64)]) -> Vec<Point> {
    coords.iter().map(|&p| Point::from(p)).collect()
}

fn rect(x0: i64, y0: i64, x1: i64, y1: i64) -> Vec<Point> {
    path(&[(x0, y0), (x1, y0), (x1, y1), (x0, y1)])
}

fn clip(
    subject: &[Vec<Point>],
    clip: &[Vec<Point>],
    clip_type: ClipType,
    fill: FillRule,
) -> Solution {
    let mut clipper = Clipper::new();
    clipper.add_paths(subject, PolyType::Subject, true).unwrap();
    clipper.add_paths(clip, PolyType::Clip, true).unwrap();
    clipper.execute(clip_type, fill, fill).unwrap()
}

fn total_area(solution: &Solution) -> f64 {
    solution.polygons.iter().map(|p| signed_area(p)).sum()
}

fn sorted(points: &[Point]) -> Vec<Point> {
    let mut points = points.to_vec();
    points.sort();
    points
}

#[test]
fn convex_self_union_round_trip() {
    let pentagon = path(&[(0, 0), (10, 0), (13, 8), (5, 14), (-3, 8)]);
    for input in [pentagon.clone(), pentagon.iter().rev().copied().collect()] {
        let out = clip(&[input], &[], ClipType::Union, FillRule::NonZero);
        assert_eq!(out.polygons.len(), 1);
        assert_eq!(sorted(&out.polygons[0]), sorted(&pentagon));
        assert!(signed_area(&out.polygons[0]) > 0.0);
        assert!(out.polylines.is_empty());
    }
}

#[test]
fn disjoint_squares() {
    let out = clip(
        &[rect(0, 0, 10, 10), rect(20, 0, 30, 10)],
        &[],
        ClipType::Union,
        FillRule::NonZero,
    );
    assert_eq!(out.polygons.len(), 2);
    for poly in &out.polygons {
        assert_eq!(poly.len(), 4);
        assert_eq!(signed_area(poly), 100.0);
    }
}

#[test]
fn overlapping_squares() {
    let a = [rect(0, 0, 10, 10)];
    let b = [rect(5, 0, 15, 10)];

    let inter = clip(&a, &b, ClipType::Intersection, FillRule::NonZero);
    assert_eq!(inter.polygons.len(), 1);
    assert_eq!(sorted(&inter.polygons[0]), sorted(&rect(5, 0, 10, 10)));

    let union = clip(&a, &b, ClipType::Union, FillRule::NonZero);
    assert_eq!(union.polygons.len(), 1);
    assert_eq!(sorted(&union.polygons[0]), sorted(&rect(0, 0, 15, 10)));

    let xor = clip(&a, &b, ClipType::Xor, FillRule::NonZero);
    assert_eq!(xor.polygons.len(), 2);
    for poly in &xor.polygons {
        assert_eq!(signed_area(poly), 50.0);
    }

    let diff = clip(&a, &b, ClipType::Difference, FillRule::NonZero);
    assert_eq!(diff.polygons.len(), 1);
    assert_eq!(sorted(&diff.polygons[0]), sorted(&rect(0, 0, 5, 10)));
}

#[test]
fn diagonally_overlapping_squares() {
    let a = [rect(0, 0, 10, 10)];
    let b = [rect(5, 5, 15, 15)];

    let inter = clip(&a, &b, ClipType::Intersection, FillRule::NonZero);
    assert_eq!(inter.polygons.len(), 1);
    assert_eq!(total_area(&inter), 25.0);

    let union = clip(&a, &b, ClipType::Union, FillRule::NonZero);
    assert_eq!(union.polygons.len(), 1);
    assert_eq!(union.polygons[0].len(), 8);
    assert_eq!(total_area(&union), 175.0);

    let xor = clip(&a, &b, ClipType::Xor, FillRule::NonZero);
    assert_eq!(total_area(&xor), 150.0);
}

#[test]
fn hole() {
    let out = clip(
        &[rect(0, 0, 30, 30)],
        &[rect(10, 10, 20, 20)],
        ClipType::Difference,
        FillRule::NonZero,
    );
    assert_eq!(out.polygons.len(), 2);
    assert_eq!(total_area(&out), 800.0);
    assert!(out.polygons.iter().any(|p| signed_area(p) == -100.0));

    let mut clipper = Clipper::with_options(ClipOptions {
        reverse_output: true,
        ..ClipOptions::default()
    });
    clipper.add_path(&rect(0, 0, 30, 30), PolyType::Subject, true).unwrap();
    clipper.add_path(&rect(10, 10, 20, 20), PolyType::Clip, true).unwrap();
    let reversed = clipper
        .execute(ClipType::Difference, FillRule::NonZero, FillRule::NonZero)
        .unwrap();
    assert_eq!(total_area(&reversed), -800.0);
}

#[test]
fn fill_rules_on_self_overlap() {
    // Two overlapping squares of the same type and orientation: the overlap
    // has winding number 2.
    let subject = [rect(0, 0, 10, 10), rect(5, 0, 15, 10)];
    let non_zero = clip(&subject, &[], ClipType::Union, FillRule::NonZero);
    assert_eq!(total_area(&non_zero), 150.0);
    let even_odd = clip(&subject, &[], ClipType::Union, FillRule::EvenOdd);
    assert_eq!(total_area(&even_odd), 100.0);

    let cw = [rect(0, 0, 10, 10).into_iter().rev().collect::<Vec<_>>()];
    assert!(clip(&cw, &[], ClipType::Union, FillRule::Positive)
        .polygons
        .is_empty());
    assert_eq!(
        total_area(&clip(&cw, &[], ClipType::Union, FillRule::Negative)),
        100.0
    );
}

#[test]
fn degenerate_ring_is_rejected() {
    let mut clipper = Clipper::new();
    assert_matches!(
        clipper.add_path(&path(&[(0, 0), (10, 0), (0, 0)]), PolyType::Subject, true),
        Err(Error::MalformedPath { index: 0 })
    );
    assert_matches!(
        clipper.add_path(&path(&[(0, 0), (10, 0), (20, 0), (10, 0)]), PolyType::Clip, true),
        Err(Error::MalformedPath { index: 1 })
    );
    clipper.add_path(&rect(0, 0, 1, 1), PolyType::Subject, true).unwrap();
}

#[test]
fn polyline_difference() {
    let mut clipper = Clipper::new();
    clipper
        .add_path(&path(&[(5, -10), (5, 20)]), PolyType::Subject, false)
        .unwrap();
    clipper.add_path(&rect(0, 0, 10, 10), PolyType::Clip, true).unwrap();
    let out = clipper
        .execute(ClipType::Difference, FillRule::NonZero, FillRule::NonZero)
        .unwrap();
    assert!(out.polygons.is_empty());
    let mut pieces: Vec<_> = out.polylines.iter().map(|l| sorted(l)).collect();
    pieces.sort();
    assert_eq!(
        pieces,
        vec![path(&[(5, -10), (5, 0)]), path(&[(5, 10), (5, 20)])]
    );
}

#[test]
fn solution_serializes() -> anyhow::Result<()> {
    let out = clip(&[rect(0, 0, 10, 10)], &[], ClipType::Union, FillRule::NonZero);
    let json = serde_json::to_string(&out)?;
    let back: Solution = serde_json::from_str(&json)?;
    assert_eq!(back, out);
    Ok(())
}

// Concentric squares with the given orientations, from the inside out.
fn nested_squares(orientations: &[bool]) -> Vec<Vec<Point>> {
    orientations
        .iter()
        .enumerate()
        .map(|(i, &ccw)| {
            let r = 10 * (i as i64 + 1);
            let square = rect(-r, -r, r, r);
            if ccw {
                square
            } else {
                square.into_iter().rev().collect()
            }
        })
        .collect()
}

fn is_inside(fill: FillRule, winding: i32) -> bool {
    match fill {
        FillRule::EvenOdd => winding % 2 != 0,
        FillRule::NonZero => winding != 0,
        FillRule::Positive => winding > 0,
        FillRule::Negative => winding < 0,
    }
}

fn rect_area(a: &[i64; 4]) -> i64 {
    (a[2] - a[0]) * (a[3] - a[1])
}

fn arb_rect() -> impl Strategy<Value = [i64; 4]> {
    (-50i64..50, -50i64..50, 1i64..40, 1i64..40).prop_map(|(x, y, w, h)| [x, y, x + w, y + h])
}

proptest! {
    // The winding number steps through zero (and back) as we go inwards
    // through the squares.
    #[test]
    fn winding_through_zero(
        orientations in proptest::collection::vec(any::<bool>(), 1..6),
        fill in prop_oneof![
            Just(FillRule::EvenOdd),
            Just(FillRule::NonZero),
            Just(FillRule::Positive),
            Just(FillRule::Negative),
        ],
    ) {
        let squares = nested_squares(&orientations);
        let out = clip(&squares, &[], ClipType::Union, fill);

        let mut expected = 0;
        for j in 0..orientations.len() {
            let winding: i32 = orientations[j..].iter().map(|&ccw| if ccw { 1 } else { -1 }).sum();
            if is_inside(fill, winding) {
                let (outer, inner) = (20 * (j as i64 + 1), 20 * j as i64);
                expected += outer * outer - inner * inner;
            }
        }
        prop_assert_eq!(total_area(&out), expected as f64);
    }

    #[test]
    fn inclusion_exclusion(a in arb_rect(), b in arb_rect()) {
        let sa = [rect(a[0], a[1], a[2], a[3])];
        let sb = [rect(b[0], b[1], b[2], b[3])];
        let inter = total_area(&clip(&sa, &sb, ClipType::Intersection, FillRule::NonZero));
        let union = total_area(&clip(&sa, &sb, ClipType::Union, FillRule::NonZero));
        let xor = total_area(&clip(&sa, &sb, ClipType::Xor, FillRule::NonZero));
        let diff = total_area(&clip(&sa, &sb, ClipType::Difference, FillRule::NonZero));

        let expected_inter = (a[2].min(b[2]) - a[0].max(b[0])).max(0)
            * (a[3].min(b[3]) - a[1].max(b[1])).max(0);
        prop_assert_eq!(inter, expected_inter as f64);
        prop_assert_eq!(union + inter, (rect_area(&a) + rect_area(&b)) as f64);
        prop_assert_eq!(xor, union - inter);
        prop_assert_eq!(diff, (rect_area(&a) - expected_inter) as f64);
    }
}

fn clip_with(
    subject: &[Vec<Point>],
    clip: &[Vec<Point>],
    clip_type: ClipType,
    subject_fill: FillRule,
    clip_fill: FillRule,
) -> Solution {
    let mut clipper = Clipper::new();
    clipper.add_paths(subject, PolyType::Subject, true).unwrap();
    clipper.add_paths(clip, PolyType::Clip, true).unwrap();
    clipper.execute(clip_type, subject_fill, clip_fill).unwrap()
}

fn reversed(points: Vec<Point>) -> Vec<Point> {
    points.into_iter().rev().collect()
}

// The winding number of the unit cell whose lower left corner is `(x, y)`,
// for a collection of axis-aligned rectangles.
fn cell_winding(rects: &[Vec<Point>], x: i64, y: i64) -> i32 {
    rects
        .iter()
        .filter(|r| {
            let lo = r.iter().copied().reduce(|a, b| Point::new(a.x.min(b.x), a.y.min(b.y)));
            let hi = r.iter().copied().reduce(|a, b| Point::new(a.x.max(b.x), a.y.max(b.y)));
            let (lo, hi) = (lo.unwrap(), hi.unwrap());
            lo.x <= x && x < hi.x && lo.y <= y && y < hi.y
        })
        .map(|r| if signed_area(r) > 0.0 { 1 } else { -1 })
        .sum()
}

// The area of a clipping operation on rectangles with corners in `0..=GRID`,
// counted one unit cell at a time.
fn grid_area(
    subject: &[Vec<Point>],
    clip: &[Vec<Point>],
    clip_type: ClipType,
    subject_fill: FillRule,
    clip_fill: FillRule,
) -> f64 {
    let mut area = 0;
    for x in 0..GRID {
        for y in 0..GRID {
            let s = is_inside(subject_fill, cell_winding(subject, x, y));
            let c = is_inside(clip_fill, cell_winding(clip, x, y));
            let inside = match clip_type {
                ClipType::Intersection => s && c,
                ClipType::Union => s || c,
                ClipType::Difference => s && !c,
                ClipType::Xor => s != c,
            };
            area += inside as i64;
        }
    }
    area as f64
}

const GRID: i64 = 6;

fn arb_grid_rect() -> impl Strategy<Value = Vec<Point>> {
    (0..GRID, 0..GRID, 1..=GRID, 1..=GRID, any::<bool>()).prop_map(|(x, y, w, h, ccw)| {
        let r = rect(x, y, (x + w).min(GRID), (y + h).min(GRID));
        if ccw {
            r
        } else {
            reversed(r)
        }
    })
}

fn arb_fill() -> impl Strategy<Value = FillRule> {
    prop_oneof![
        Just(FillRule::EvenOdd),
        Just(FillRule::NonZero),
        Just(FillRule::Positive),
        Just(FillRule::Negative),
    ]
}

fn arb_clip_type() -> impl Strategy<Value = ClipType> {
    prop_oneof![
        Just(ClipType::Intersection),
        Just(ClipType::Union),
        Just(ClipType::Difference),
        Just(ClipType::Xor),
    ]
}

proptest! {
    // Small grids make lots of shared vertices, coincident edges and
    // overlapping horizontals.
    #[test]
    fn matches_cell_winding(
        subject in proptest::collection::vec(arb_grid_rect(), 1..4),
        clip in proptest::collection::vec(arb_grid_rect(), 1..4),
        clip_type in arb_clip_type(),
        subject_fill in arb_fill(),
        clip_fill in arb_fill(),
    ) {
        let out = clip_with(&subject, &clip, clip_type, subject_fill, clip_fill);
        prop_assert_eq!(
            total_area(&out),
            grid_area(&subject, &clip, clip_type, subject_fill, clip_fill)
        );
    }
}

// Every combination of clip type and fill rules, checked against the cell count.
fn check_all_ops(subject: &[Vec<Point>], clip: &[Vec<Point>]) {
    let fills = [
        FillRule::EvenOdd,
        FillRule::NonZero,
        FillRule::Positive,
        FillRule::Negative,
    ];
    let ops = [
        ClipType::Intersection,
        ClipType::Union,
        ClipType::Difference,
        ClipType::Xor,
    ];
    for op in ops {
        for sf in fills {
            for cf in fills {
                let out = clip_with(subject, clip, op, sf, cf);
                assert_eq!(
                    total_area(&out),
                    grid_area(subject, clip, op, sf, cf),
                    "{op:?} {sf:?} {cf:?}"
                );
            }
        }
    }
}

#[test]
fn doubled_strip_through_rectangle() {
    let strip = path(&[(2, 6), (3, 6), (3, 1), (2, 1)]);
    let bar = path(&[(1, 4), (1, 6), (5, 6), (5, 4)]);

    let opposite = [bar.clone(), strip.clone(), reversed(strip.clone())];
    let out = clip(&opposite, &[], ClipType::Union, FillRule::EvenOdd);
    assert_eq!(total_area(&out), 8.0);
    assert!(out.polygons.iter().all(|p| signed_area(p) > 0.0));

    let same = [bar.clone(), strip.clone(), strip.clone()];
    let out = clip(&same, &[], ClipType::Union, FillRule::EvenOdd);
    assert_eq!(total_area(&out), 8.0);
    assert!(out.polygons.iter().all(|p| signed_area(p) > 0.0));

    // Under non-zero the two copies add up below the bar, or cancel out.
    assert_eq!(
        total_area(&clip(&same, &[], ClipType::Union, FillRule::NonZero)),
        11.0
    );
    assert_eq!(
        total_area(&clip(&opposite, &[], ClipType::Union, FillRule::NonZero)),
        8.0
    );

    check_all_ops(&opposite, &[]);
    check_all_ops(&[bar.clone()], &[strip.clone(), reversed(strip.clone())]);
    check_all_ops(&[strip.clone(), strip], &[bar]);
}

#[test]
fn rings_sharing_a_local_minimum() {
    // Both rings start at (0, 0) and share their bottom edge and left edge.
    let short = rect(0, 0, 2, 2);
    let tall = rect(0, 0, 2, 4);
    let xor = clip(&[short.clone()], &[tall.clone()], ClipType::Xor, FillRule::NonZero);
    assert_eq!(total_area(&xor), 4.0);
    let union = clip(&[short.clone()], &[tall.clone()], ClipType::Union, FillRule::NonZero);
    assert_eq!(total_area(&union), 8.0);

    check_all_ops(&[short.clone(), tall.clone()], &[]);
    check_all_ops(&[short.clone()], &[reversed(tall.clone())]);
    check_all_ops(&[short, reversed(tall.clone())], &[tall]);
}

#[test]
fn shared_horizontal_edges() {
    // Stacked rectangles meet along y = 2.
    let lower = rect(0, 0, 4, 2);
    let upper = rect(0, 2, 4, 4);
    let union = clip(&[lower.clone(), upper.clone()], &[], ClipType::Union, FillRule::NonZero);
    assert_eq!(union.polygons.len(), 1);
    assert_eq!(total_area(&union), 16.0);

    // Overlapping horizontal edges on both the top and the bottom.
    let left = rect(0, 0, 3, 2);
    let right = rect(1, 0, 4, 2);
    let xor = clip(&[left.clone()], &[right.clone()], ClipType::Xor, FillRule::NonZero);
    assert_eq!(total_area(&xor), 4.0);

    let notch = rect(1, 2, 3, 4);
    check_all_ops(&[lower.clone(), notch.clone()], &[upper]);
    check_all_ops(&[left, reversed(right)], &[lower, reversed(notch)]);
}

#[test]
fn line_touching_polygon_edge_adds_no_vertex() {
    let square = rect(0, 0, 10, 10);
    let mut clipper = Clipper::with_options(ClipOptions {
        preserve_collinear: true,
        ..ClipOptions::default()
    });
    clipper.add_path(&square, PolyType::Subject, true).unwrap();
    // The line's lowest point is on the square's right edge.
    clipper
        .add_path(&path(&[(10, 5), (15, 8)]), PolyType::Subject, false)
        .unwrap();
    let out = clipper
        .execute(ClipType::Union, FillRule::NonZero, FillRule::NonZero)
        .unwrap();
    assert_eq!(out.polygons.len(), 1);
    assert_eq!(sorted(&out.polygons[0]), sorted(&square));
}
