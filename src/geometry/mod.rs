use approx::{abs_diff_eq, AbsDiffEq};
use std::fmt;

pub mod container;
pub mod distance;
pub mod nd;
pub mod planar;

pub use container::{Geometry, GeometryKind, GeometryType, Polygon, SubObject, SubObjectKind};
pub use nd::BoxND;
pub use planar::{Box2D, Box3D};

/// Absolute tolerance used by all "fuzzy" floating point comparisons.
pub const FP_TOLERANCE: f64 = 1.0e-6;

/// The spatial reference id of a geometry nobody assigned one to.
pub const UNKNOWN_SRID: i32 = -1;

pub fn fp_eq(a: f64, b: f64) -> bool {
    abs_diff_eq!(a, b, epsilon = FP_TOLERANCE)
}

pub fn fp_lt(a: f64, b: f64) -> bool {
    b - a > FP_TOLERANCE
}

pub fn fp_le(a: f64, b: f64) -> bool {
    a - b <= FP_TOLERANCE
}

pub fn fp_gt(a: f64, b: f64) -> bool {
    a - b > FP_TOLERANCE
}

pub fn fp_ge(a: f64, b: f64) -> bool {
    b - a <= FP_TOLERANCE
}

type FloatSize = f64;

/// A coordinate triple.
///
/// 2D geometries store `z == 0.0`; whether the z value carries meaning is
/// decided by the owning [`Geometry`], not by the point.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Point {
    pub x: FloatSize,
    pub y: FloatSize,
    pub z: FloatSize,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Point { x, y, z: 0.0 }
    }

    pub const fn new_3d(x: f64, y: f64, z: f64) -> Self {
        Point { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Equality within [`FP_TOLERANCE`] on all three axes.
    pub fn same_as(&self, other: &Point) -> bool {
        abs_diff_eq!(self, other, epsilon = FP_TOLERANCE)
    }

    pub fn translated(&self, dx: f64, dy: f64, dz: f64) -> Point {
        Point {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }
}

impl AsRef<Point> for Point {
    fn as_ref(&self) -> &Point {
        self
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "・({},{},{})", self.x, self.y, self.z)
    }
}

impl AbsDiffEq for Point {
    type Epsilon = f64;

    fn default_epsilon() -> Self::Epsilon {
        f64::EPSILON
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        self.x.abs_diff_eq(&other.x, epsilon)
            && self.y.abs_diff_eq(&other.y, epsilon)
            && self.z.abs_diff_eq(&other.z, epsilon)
    }
}

/// Types implementing this trait can be checked for intersections with `Rhs`
pub trait Intersecting<Rhs = Self> {
    type IntersectionShape;
    /// Returns `true` if `self` intersects with `other`.
    fn intersects(&self, other: &Rhs) -> bool;
    /// Produce the shape of the intersection, if possible
    fn intersection(&self, other: &Rhs) -> Option<Self::IntersectionShape>;
    /// Returns true if `other` not only intersects `self`, but is completely
    /// contained within the confines of this shape
    fn contains(&self, other: &Rhs) -> bool;
}

/// Can produce a unitless area
pub trait HasArea {
    /// Unitless area of this geometry
    ///
    /// Has no meaning, except for comparisons
    fn area(&self) -> f64;
}

pub trait Extending<Rhs = Self>
where
    Rhs: HasArea,
{
    /// Produces a new geometry of the given type
    /// that is like `geometry`, but extended to fit `self`
    fn extend(&self, geometry: Rhs) -> Rhs;

    /// Same as extend, but only return the area that was added.
    ///
    /// Never negative.
    fn extend_area(&self, geometry: Rhs) -> f64 {
        let original_area = geometry.area();
        let extended = self.extend(geometry);
        let extended_area = extended.area();
        (extended_area - original_area).max(0.0)
    }
}

pub trait Bounding {
    /// The 2D box covering `self`, if it has one.
    fn bounding_box(&self) -> Option<Box2D>;

    /// Calculate a box that contains all entries of an iterator.
    ///
    /// Entries without a box are ignored; `None` if no entry has one.
    fn bound_all<'a>(entries: impl Iterator<Item = &'a Self>) -> Option<Box2D>
    where
        Self: 'a,
    {
        entries
            .filter_map(|e| e.bounding_box())
            .reduce(|acc, b| acc.union(&b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fuzzy_comparisons() {
        assert!(fp_eq(1.0, 1.0 + 1.0e-7));
        assert!(!fp_eq(1.0, 1.0 + 1.0e-5));
        assert!(fp_le(1.0 + 1.0e-7, 1.0));
        assert!(!fp_lt(1.0, 1.0 + 1.0e-7));
        assert!(fp_lt(1.0, 1.1));
        assert!(fp_ge(1.0, 1.0 + 1.0e-7));
        assert!(!fp_gt(1.0 + 1.0e-7, 1.0));
        assert!(fp_gt(1.1, 1.0));
    }

    #[test]
    fn test_point_sameness() {
        let p1 = Point::new(1.0, 2.0);
        let p2 = Point::new(1.0 + 1.0e-9, 2.0);
        assert!(p1.same_as(&p2));
        assert_ne!(p1, p2);
        let p3 = Point::new_3d(1.0, 2.0, 1.0);
        assert!(!p1.same_as(&p3));
        assert_eq!(Point::new_3d(2.0, 3.0, 1.0), p3.translated(1.0, 1.0, 0.0));
    }
}
