//! Ordering of geometries by their 2D boxes, for sorting and
//! grouping rather than spatial search.
//!
//! Boxes compare field by field in the order `xmin`, `ymin`, `xmax`,
//! `ymax`. Fields within [`FP_TOLERANCE`] of each other count as equal.

use super::{compress, IndexKey};
use crate::{errors::*, geometry::*};
use std::cmp::Ordering;

fn field_cmp(a: f64, b: f64) -> Ordering {
    if fp_eq(a, b) {
        Ordering::Equal
    } else if a < b {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

/// Lexicographic comparison of two boxes.
pub fn box_cmp(a: &Box2D, b: &Box2D) -> Ordering {
    field_cmp(a.xmin, b.xmin)
        .then_with(|| field_cmp(a.ymin, b.ymin))
        .then_with(|| field_cmp(a.xmax, b.xmax))
        .then_with(|| field_cmp(a.ymax, b.ymax))
}

/// Compare two keys by their boxes. Keys of different SRIDs do not compare.
pub fn key_cmp(a: &IndexKey, b: &IndexKey) -> Result<Ordering> {
    check_srid(a.srid, b.srid)?;
    Ok(box_cmp(&a.bbox, &b.bbox))
}

/// Compare two geometries by the keys [`compress`] derives for them.
///
/// Empty geometries have no box and sort before everything else.
pub fn geometry_cmp(a: &Geometry, b: &Geometry) -> Result<Ordering> {
    check_srid(a.srid(), b.srid())?;
    Ok(match (compress(a), compress(b)) {
        (Some(a), Some(b)) => box_cmp(&a.bbox, &b.bbox),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
    })
}

pub fn geometry_lt(a: &Geometry, b: &Geometry) -> Result<bool> {
    geometry_cmp(a, b).map(Ordering::is_lt)
}

pub fn geometry_le(a: &Geometry, b: &Geometry) -> Result<bool> {
    geometry_cmp(a, b).map(Ordering::is_le)
}

/// Box equality within tolerance, not equality of the geometries.
pub fn geometry_eq(a: &Geometry, b: &Geometry) -> Result<bool> {
    geometry_cmp(a, b).map(Ordering::is_eq)
}

pub fn geometry_ge(a: &Geometry, b: &Geometry) -> Result<bool> {
    geometry_cmp(a, b).map(Ordering::is_ge)
}

pub fn geometry_gt(a: &Geometry, b: &Geometry) -> Result<bool> {
    geometry_cmp(a, b).map(Ordering::is_gt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::from_text;

    fn g(text: &str) -> Geometry {
        from_text(text).unwrap()
    }

    #[test]
    fn test_fields_compare_in_order() {
        let base = Box2D::new(0.0, 0.0, 1.0, 1.0);
        assert_eq!(Ordering::Equal, box_cmp(&base, &base));
        assert_eq!(Ordering::Less, box_cmp(&base, &Box2D::new(0.5, -5.0, 0.6, -4.0)));
        // xmin ties, ymin decides
        assert_eq!(Ordering::Greater, box_cmp(&base, &Box2D::new(0.0, -1.0, 9.0, 9.0)));
        // xmin and ymin tie, xmax decides
        assert_eq!(Ordering::Less, box_cmp(&base, &Box2D::new(0.0, 0.0, 2.0, 0.5)));
        // only ymax differs
        assert_eq!(Ordering::Greater, box_cmp(&base, &Box2D::new(0.0, 0.0, 1.0, 0.5)));
        // differences below the tolerance do not count
        assert_eq!(Ordering::Equal, box_cmp(&base, &Box2D::new(1.0e-9, 0.0, 1.0, 1.0 + 1.0e-9)));
    }

    #[test]
    fn test_key_cmp_checks_srid() {
        let a = IndexKey::new(Box2D::new(0.0, 0.0, 1.0, 1.0), 4326);
        let b = IndexKey::new(Box2D::new(1.0, 0.0, 2.0, 1.0), 4326);
        assert_eq!(Ordering::Less, key_cmp(&a, &b).unwrap());
        assert_eq!(Ordering::Greater, key_cmp(&b, &a).unwrap());
        let elsewhere = IndexKey::new(a.bbox, 3857);
        assert!(matches!(key_cmp(&a, &elsewhere), Err(GeoError::SridMismatch { .. })));
    }

    #[test]
    fn test_geometry_predicates() {
        let left = g("LINESTRING(0 0,1 1)");
        let right = g("POINT(5 0)");
        let same_box = g("MULTIPOINT(0 0,1 1)");
        assert!(geometry_lt(&left, &right).unwrap());
        assert!(!geometry_lt(&right, &left).unwrap());
        assert!(geometry_gt(&right, &left).unwrap());
        assert!(geometry_le(&left, &same_box).unwrap());
        assert!(geometry_ge(&left, &same_box).unwrap());
        assert!(geometry_eq(&left, &same_box).unwrap());
        assert!(!geometry_lt(&left, &same_box).unwrap());
        assert!(!geometry_eq(&left, &right).unwrap());
        assert!(geometry_lt(&left, &g("SRID=4326;POINT(9 9)")).is_err());
    }

    #[test]
    fn test_empty_sorts_first() {
        let empty = g("GEOMETRYCOLLECTION(EMPTY)");
        let point = g("POINT(-100 -100)");
        assert_eq!(Ordering::Less, geometry_cmp(&empty, &point).unwrap());
        assert_eq!(Ordering::Greater, geometry_cmp(&point, &empty).unwrap());
        assert!(geometry_eq(&empty, &g("MULTIPOLYGON(EMPTY)")).unwrap());
        // a box-only geometry compares by its box like any other
        assert!(geometry_eq(&g("BOX(1 2,3 4)"), &g("LINESTRING(1 2,3 4)")).unwrap());
    }
}
