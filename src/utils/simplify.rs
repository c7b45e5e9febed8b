use crate::{
    errors::*,
    geometry::{distance::distance_pt_seg, *},
};
use snafu::prelude::*;

/// Closed rings need at least this many points to keep three distinct vertices.
const MIN_RING_POINTS: usize = 4;

fn check_tolerance(tolerance: f64) -> Result<()> {
    ensure!(
        tolerance.is_finite() && tolerance >= 0.0,
        DegenerateGeometrySnafu {
            description: format!("simplification tolerance must be finite and >= 0, got {tolerance}"),
        }
    );
    Ok(())
}

/// The point in `points[start + 1..end]` farthest from the segment
/// `start`-`end`, with its distance.
///
/// The first of several equally far points wins.
fn find_split(points: &[Point], start: usize, end: usize) -> Option<(usize, f64)> {
    if start + 1 >= end {
        return None;
    }
    let (a, b) = (&points[start], &points[end]);
    let mut farthest: Option<(usize, f64)> = None;
    for (index, point) in points.iter().enumerate().take(end).skip(start + 1) {
        let distance = distance_pt_seg(point, a, b);
        match farthest {
            Some((_, max_distance)) if distance <= max_distance => (),
            _ => farthest = Some((index, distance)),
        }
    }
    farthest
}

/// Reduce the number of points on `polyline` using Douglas–Peucker algorithm,
/// such that no removed point is farther than `tolerance` from the result.
///
/// The first and last points are always kept. Distances are planar, z
/// values are carried along.
pub fn simplify_points(polyline: &[Point], tolerance: f64) -> Result<Vec<Point>> {
    check_tolerance(tolerance)?;
    if polyline.len() <= 2 {
        // Can't reduce this any further.
        return Ok(polyline.to_vec());
    }
    let mut simplified = Vec::with_capacity(polyline.len());
    simplified.push(polyline[0]);
    let mut start = 0;
    // ends of the ranges still to be examined, the innermost on top
    let mut ends = vec![polyline.len() - 1];
    while let Some(&end) = ends.last() {
        match find_split(polyline, start, end) {
            Some((split, distance)) if distance > tolerance => ends.push(split),
            _ => {
                simplified.push(polyline[end]);
                start = end;
                ends.pop();
            }
        }
    }
    Ok(simplified)
}

/// Simplify every ring of a polygon on its own.
///
/// Holes that collapse below four points are dropped. If the outer ring
/// collapses, the whole polygon is dropped and `None` returned.
pub fn simplify_polygon(rings: &[Vec<Point>], tolerance: f64) -> Result<Option<Vec<Vec<Point>>>> {
    let mut simplified_rings = Vec::with_capacity(rings.len());
    for (index, ring) in rings.iter().enumerate() {
        let simplified = simplify_points(ring, tolerance)?;
        if simplified.len() < MIN_RING_POINTS {
            if index == 0 {
                log::debug!(
                    "Outer ring of {} points collapsed to {}, dropping the polygon",
                    ring.len(),
                    simplified.len()
                );
                return Ok(None);
            }
            log::debug!(
                "Hole {index} of {} points collapsed to {}, dropping it",
                ring.len(),
                simplified.len()
            );
            continue;
        }
        simplified_rings.push(simplified);
    }
    if simplified_rings.is_empty() {
        return Ok(None);
    }
    Ok(Some(simplified_rings))
}

/// Simplify all lines and polygons of `geometry`. Points are kept as they are.
///
/// Dropped polygons shrink the geometry. If nothing survives, the result is
/// the empty geometry of the same SRID.
pub fn simplify_geometry(geometry: &Geometry, tolerance: f64) -> Result<Geometry> {
    check_tolerance(tolerance)?;
    if geometry.kind() == GeometryKind::BoxOnly {
        return Ok(geometry.clone());
    }
    let mut objects = Vec::with_capacity(geometry.num_objects());
    for object in geometry.sub_objects() {
        match object {
            SubObject::Point(_) => objects.push(object.clone()),
            SubObject::Line(points) => objects.push(SubObject::Line(simplify_points(points, tolerance)?)),
            SubObject::Polygon(poly) => {
                if let Some(rings) = simplify_polygon(&poly.rings, tolerance)? {
                    objects.push(SubObject::Polygon(Polygon::new(rings)));
                }
            }
        }
    }
    if objects.is_empty() {
        log::debug!(
            "Simplifying a {} with tolerance {tolerance} dropped everything",
            geometry.geometry_type_name()
        );
        return Ok(Geometry::empty(geometry.srid(), geometry.kind()));
    }
    Geometry::new(geometry.srid(), geometry.is_3d(), geometry.kind(), objects)
}
