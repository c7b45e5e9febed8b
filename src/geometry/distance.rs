//! Planar distance and measurement primitives.
//!
//! All distances ignore z. Lines are slices of points; polygons are
//! [`Polygon`] values whose ring 0 is the outer boundary.

use super::*;
use crate::errors::*;
use itertools::Itertools;
use snafu::prelude::*;

pub fn distance_pt_pt(p1: &Point, p2: &Point) -> f64 {
    ((p2.x - p1.x).powi(2) + (p2.y - p1.y).powi(2)).sqrt()
}

/// Distance from `p` to the segment `a`-`b`.
pub fn distance_pt_seg(p: &Point, a: &Point, b: &Point) -> f64 {
    if a.x == b.x && a.y == b.y {
        return distance_pt_pt(p, a);
    }
    let length_sq = (b.x - a.x).powi(2) + (b.y - a.y).powi(2);
    // position of the projection of p along a-b, 0 at a and 1 at b
    let r = ((p.x - a.x) * (b.x - a.x) + (p.y - a.y) * (b.y - a.y)) / length_sq;
    if r < 0.0 {
        return distance_pt_pt(p, a);
    }
    if r > 1.0 {
        return distance_pt_pt(p, b);
    }
    let s = ((a.y - p.y) * (b.x - a.x) - (a.x - p.x) * (b.y - a.y)) / length_sq;
    s.abs() * length_sq.sqrt()
}

/// Distance between the segments `a`-`b` and `c`-`d`, `0.0` if they cross.
pub fn distance_seg_seg(a: &Point, b: &Point, c: &Point, d: &Point) -> f64 {
    if a.x == b.x && a.y == b.y {
        return distance_pt_seg(a, c, d);
    }
    if c.x == d.x && c.y == d.y {
        return distance_pt_seg(d, a, b);
    }
    let endpoint_distance = || {
        distance_pt_seg(a, c, d)
            .min(distance_pt_seg(b, c, d))
            .min(distance_pt_seg(c, a, b))
            .min(distance_pt_seg(d, a, b))
    };
    let r_top = (a.y - c.y) * (d.x - c.x) - (a.x - c.x) * (d.y - c.y);
    let s_top = (a.y - c.y) * (b.x - a.x) - (a.x - c.x) * (b.y - a.y);
    let bottom = (b.x - a.x) * (d.y - c.y) - (b.y - a.y) * (d.x - c.x);
    if bottom == 0.0 {
        // parallel or collinear
        return endpoint_distance();
    }
    let r = r_top / bottom;
    let s = s_top / bottom;
    if !(0.0..=1.0).contains(&r) || !(0.0..=1.0).contains(&s) {
        endpoint_distance()
    } else {
        0.0
    }
}

/// Distance from `p` to the closest segment of `line`.
///
/// A single point line is treated as that point.
pub fn distance_pt_line(p: &Point, line: &[Point]) -> f64 {
    match line {
        [] => f64::INFINITY,
        [only] => distance_pt_pt(p, only),
        _ => line
            .iter()
            .tuple_windows()
            .map(|(start, end)| distance_pt_seg(p, start, end))
            .fold(f64::INFINITY, f64::min),
    }
}

pub fn distance_line_line(l1: &[Point], l2: &[Point]) -> f64 {
    if l1.len() < 2 {
        return l1
            .first()
            .map(|p| distance_pt_line(p, l2))
            .unwrap_or(f64::INFINITY);
    }
    if l2.len() < 2 {
        return l2
            .first()
            .map(|p| distance_pt_line(p, l1))
            .unwrap_or(f64::INFINITY);
    }
    let mut result = f64::INFINITY;
    for (start, end) in l1.iter().tuple_windows() {
        for (start2, end2) in l2.iter().tuple_windows() {
            result = result.min(distance_seg_seg(start, end, start2, end2));
            if result <= 0.0 {
                // intersection
                return 0.0;
            }
        }
    }
    result
}

/// Crossing-number test of `p` against a closed `ring`.
///
/// Points exactly on the boundary may go either way.
pub fn point_in_ring(p: &Point, ring: &[Point]) -> bool {
    let mut crossings = 0usize;
    for (v1, v2) in ring.iter().tuple_windows() {
        let upward = v1.y <= p.y && v2.y > p.y;
        let downward = v1.y > p.y && v2.y <= p.y;
        if upward || downward {
            let vt = (p.y - v1.y) / (v2.y - v1.y);
            if p.x < v1.x + vt * (v2.x - v1.x) {
                crossings += 1;
            }
        }
    }
    crossings % 2 == 1
}

/// Inside the outer ring and outside every hole.
pub fn point_in_polygon(p: &Point, poly: &Polygon) -> bool {
    match poly.outer_ring() {
        Some(outer) if point_in_ring(p, outer) => {
            !poly.holes().iter().any(|hole| point_in_ring(p, hole))
        }
        _ => false,
    }
}

/// `0.0` inside the polygon, else the distance to the boundary that is
/// closest in the topological sense (a hole containing `p`, or the outer ring).
pub fn distance_pt_poly(p: &Point, poly: &Polygon) -> f64 {
    let Some(outer) = poly.outer_ring() else {
        return f64::INFINITY;
    };
    if point_in_ring(p, outer) {
        for hole in poly.holes() {
            if point_in_ring(p, hole) {
                return distance_pt_line(p, hole);
            }
        }
        0.0
    } else {
        distance_pt_line(p, outer)
    }
}

pub fn distance_line_poly(line: &[Point], poly: &Polygon) -> f64 {
    let mut min_dist = f64::INFINITY;
    for ring in poly.rings.iter() {
        min_dist = min_dist.min(distance_line_line(line, ring));
        if min_dist <= 0.0 {
            return 0.0;
        }
    }
    // no boundary crossing, so the line is entirely inside or outside
    match (line.first(), poly.outer_ring()) {
        (Some(first), Some(outer)) if point_in_ring(first, outer) => {
            if poly.holes().iter().any(|hole| point_in_ring(first, hole)) {
                min_dist
            } else {
                0.0
            }
        }
        _ => min_dist,
    }
}

pub fn distance_poly_poly(poly1: &Polygon, poly2: &Polygon) -> f64 {
    let first_of = |poly: &Polygon| poly.outer_ring().and_then(|r| r.first()).copied();
    if let Some(p) = first_of(poly1) {
        if point_in_polygon(&p, poly2) {
            return 0.0;
        }
    }
    if let Some(p) = first_of(poly2) {
        if point_in_polygon(&p, poly1) {
            return 0.0;
        }
    }
    let mut min_dist = f64::INFINITY;
    for ring in poly1.rings.iter() {
        min_dist = min_dist.min(distance_line_poly(ring, poly2));
        if min_dist <= 0.0 {
            return 0.0;
        }
    }
    min_dist
}

pub fn distance_sub_objects(o1: &SubObject, o2: &SubObject) -> f64 {
    match (o1, o2) {
        (SubObject::Point(p1), SubObject::Point(p2)) => distance_pt_pt(p1, p2),
        (SubObject::Point(p), SubObject::Line(l)) | (SubObject::Line(l), SubObject::Point(p)) => {
            distance_pt_line(p, l)
        }
        (SubObject::Point(p), SubObject::Polygon(poly))
        | (SubObject::Polygon(poly), SubObject::Point(p)) => distance_pt_poly(p, poly),
        (SubObject::Line(l1), SubObject::Line(l2)) => distance_line_line(l1, l2),
        (SubObject::Line(l), SubObject::Polygon(poly))
        | (SubObject::Polygon(poly), SubObject::Line(l)) => distance_line_poly(l, poly),
        (SubObject::Polygon(p1), SubObject::Polygon(p2)) => distance_poly_poly(p1, p2),
    }
}

pub(crate) fn path_length_2d(points: &[Point]) -> f64 {
    points
        .iter()
        .tuple_windows()
        .map(|(a, b)| distance_pt_pt(a, b))
        .sum()
}

pub(crate) fn path_length_3d(points: &[Point]) -> f64 {
    points
        .iter()
        .tuple_windows()
        .map(|(a, b)| ((b.x - a.x).powi(2) + (b.y - a.y).powi(2) + (b.z - a.z).powi(2)).sqrt())
        .sum()
}

impl Geometry {
    /// Minimum planar distance between any two sub-objects of `self` and `other`.
    ///
    /// Returns `None` if either geometry has no sub-objects.
    pub fn distance(&self, other: &Geometry) -> Result<Option<f64>> {
        check_srid(self.srid(), other.srid())?;
        let mut result: Option<f64> = None;
        for o1 in self.sub_objects() {
            for o2 in other.sub_objects() {
                let d = distance_sub_objects(o1, o2);
                let current = result.map_or(d, |r| r.min(d));
                if current <= 0.0 {
                    return Ok(Some(0.0));
                }
                result = Some(current);
            }
        }
        Ok(result)
    }

    /// The point `fraction` of the way along a single line, measured by
    /// planar length.
    ///
    /// `fraction` must lie in `[0, 1]`; 0 and 1 give the exact end points.
    /// For 3D lines z is interpolated along with x and y.
    pub fn line_interpolate_point(&self, fraction: f64) -> Result<Geometry> {
        ensure!(
            (0.0..=1.0).contains(&fraction),
            InvalidArgumentSnafu {
                description: format!("line fraction must be within [0, 1], got {fraction}")
            }
        );
        let line = match self.sub_objects() {
            [SubObject::Line(points)] if self.kind() == GeometryKind::Single(SubObjectKind::Line) => {
                points
            }
            _ => {
                return InvalidArgumentSnafu {
                    description: format!(
                        "can only interpolate along a LINESTRING, got a {}",
                        self.geometry_type_name()
                    ),
                }
                .fail()
            }
        };
        let point = interpolate_along(line, fraction).context(InvalidArgumentSnafu {
            description: "cannot interpolate along a line without points",
        })?;
        Geometry::new(
            self.srid(),
            self.is_3d(),
            GeometryKind::Single(SubObjectKind::Point),
            vec![point.into()],
        )
    }
}

/// The point `fraction` of the planar length along `line`.
fn interpolate_along(line: &[Point], fraction: f64) -> Option<Point> {
    let (first, last) = (line.first()?, line.last()?);
    let length = path_length_2d(line);
    if fraction == 0.0 || length == 0.0 {
        return Some(*first);
    }
    if fraction == 1.0 {
        return Some(*last);
    }
    let target = fraction * length;
    let mut walked = 0.0;
    for (a, b) in line.iter().tuple_windows() {
        let segment = distance_pt_pt(a, b);
        if target < walked + segment {
            let t = (target - walked) / segment;
            return Some(Point::new_3d(
                a.x + (b.x - a.x) * t,
                a.y + (b.y - a.y) * t,
                a.z + (b.z - a.z) * t,
            ));
        }
        walked += segment;
    }
    // rounding left the target just past the last segment
    Some(*last)
}
