use super::*;
use std::fmt;

/// An axis-aligned 2D box, the key type of the tree index.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Box2D {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Box2D {
    /// Create a box from two opposite corners given in any order.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        let b = Box2D {
            xmin: x1.min(x2),
            ymin: y1.min(y2),
            xmax: x1.max(x2),
            ymax: y1.max(y2),
        };
        if cfg!(test) {
            b.assert_legal();
        }
        b
    }

    /// The degenerate box around a single point.
    pub fn around(p: &Point) -> Self {
        Box2D {
            xmin: p.x,
            ymin: p.y,
            xmax: p.x,
            ymax: p.y,
        }
    }

    pub fn from_points<'a>(mut points: impl Iterator<Item = &'a Point>) -> Option<Self> {
        let first = points.next()?;
        let mut b = Box2D::around(first);
        for p in points {
            b.xmin = b.xmin.min(p.x);
            b.ymin = b.ymin.min(p.y);
            b.xmax = b.xmax.max(p.x);
            b.ymax = b.ymax.max(p.y);
        }
        Some(b)
    }

    pub fn assert_legal(&self) {
        assert!(
            self.xmin <= self.xmax && self.ymin <= self.ymax,
            "Box {} is illegal!",
            self
        );
    }

    pub fn is_finite(&self) -> bool {
        self.xmin.is_finite()
            && self.ymin.is_finite()
            && self.xmax.is_finite()
            && self.ymax.is_finite()
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// Half the perimeter.
    pub fn margin(&self) -> f64 {
        self.width().abs() + self.height().abs()
    }

    pub fn union(&self, other: &Box2D) -> Box2D {
        Box2D {
            xmin: self.xmin.min(other.xmin),
            ymin: self.ymin.min(other.ymin),
            xmax: self.xmax.max(other.xmax),
            ymax: self.ymax.max(other.ymax),
        }
    }

    /// Area of the overlapping region, `0.0` if the boxes are disjoint.
    pub fn overlap_area(&self, other: &Box2D) -> f64 {
        let dx = self.xmax.min(other.xmax) - self.xmin.max(other.xmin);
        let dy = self.ymax.min(other.ymax) - self.ymin.max(other.ymin);
        if dx <= 0.0 || dy <= 0.0 {
            0.0
        } else {
            dx * dy
        }
    }

    /// Grow the box by `distance` in every direction.
    pub fn expand(&self, distance: f64) -> Box2D {
        Box2D::new(
            self.xmin - distance,
            self.ymin - distance,
            self.xmax + distance,
            self.ymax + distance,
        )
    }

    pub fn overlaps(&self, other: &Box2D) -> bool {
        let x_overlap = (fp_ge(self.xmax, other.xmax) && fp_le(self.xmin, other.xmax))
            || (fp_ge(other.xmax, self.xmax) && fp_le(other.xmin, self.xmax));
        let y_overlap = (fp_ge(self.ymax, other.ymax) && fp_le(self.ymin, other.ymax))
            || (fp_ge(other.ymax, self.ymax) && fp_le(other.ymin, self.ymax));
        x_overlap && y_overlap
    }

    pub fn contains_box(&self, other: &Box2D) -> bool {
        fp_ge(self.xmax, other.xmax)
            && fp_le(self.xmin, other.xmin)
            && fp_ge(self.ymax, other.ymax)
            && fp_le(self.ymin, other.ymin)
    }

    pub fn contained_by(&self, other: &Box2D) -> bool {
        other.contains_box(self)
    }

    /// Strictly left of `other`.
    pub fn left(&self, other: &Box2D) -> bool {
        fp_lt(self.xmax, other.xmin)
    }

    /// Does not extend to the right of `other`.
    pub fn overleft(&self, other: &Box2D) -> bool {
        fp_le(self.xmax, other.xmax)
    }

    /// Strictly right of `other`.
    pub fn right(&self, other: &Box2D) -> bool {
        fp_gt(self.xmin, other.xmax)
    }

    /// Does not extend to the left of `other`.
    pub fn overright(&self, other: &Box2D) -> bool {
        fp_ge(self.xmin, other.xmin)
    }

    pub fn below(&self, other: &Box2D) -> bool {
        fp_lt(self.ymax, other.ymin)
    }

    pub fn overbelow(&self, other: &Box2D) -> bool {
        fp_le(self.ymax, other.ymax)
    }

    pub fn above(&self, other: &Box2D) -> bool {
        fp_gt(self.ymin, other.ymax)
    }

    pub fn overabove(&self, other: &Box2D) -> bool {
        fp_ge(self.ymin, other.ymin)
    }

    /// Fuzzy equality of both corners.
    pub fn same(&self, other: &Box2D) -> bool {
        fp_eq(self.xmin, other.xmin)
            && fp_eq(self.ymin, other.ymin)
            && fp_eq(self.xmax, other.xmax)
            && fp_eq(self.ymax, other.ymax)
    }
}

impl fmt::Display for Box2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BOX({} {},{} {})",
            self.xmin, self.ymin, self.xmax, self.ymax
        )
    }
}

impl Intersecting<Point> for Box2D {
    type IntersectionShape = Point;

    fn intersects(&self, other: &Point) -> bool {
        self.overlaps(&Box2D::around(other))
    }

    fn intersection(&self, other: &Point) -> Option<Self::IntersectionShape> {
        if self.intersects(other) {
            Some(*other)
        } else {
            None
        }
    }

    fn contains(&self, other: &Point) -> bool {
        self.contains_box(&Box2D::around(other))
    }
}

impl Intersecting for Box2D {
    type IntersectionShape = Box2D;

    fn intersects(&self, other: &Box2D) -> bool {
        self.overlaps(other)
    }

    fn intersection(&self, other: &Box2D) -> Option<Self::IntersectionShape> {
        let xmin = self.xmin.max(other.xmin);
        let xmax = self.xmax.min(other.xmax);
        let ymin = self.ymin.max(other.ymin);
        let ymax = self.ymax.min(other.ymax);
        if xmin <= xmax && ymin <= ymax {
            Some(Box2D {
                xmin,
                ymin,
                xmax,
                ymax,
            })
        } else {
            None
        }
    }

    fn contains(&self, other: &Box2D) -> bool {
        self.contains_box(other)
    }
}

impl HasArea for Box2D {
    fn area(&self) -> f64 {
        self.width().abs() * self.height().abs()
    }
}

impl Extending for Box2D {
    fn extend(&self, geometry: Box2D) -> Box2D {
        geometry.union(self)
    }
}

impl Extending<Box2D> for Point {
    fn extend(&self, geometry: Box2D) -> Box2D {
        geometry.union(&Box2D::around(self))
    }
}

impl Bounding for Box2D {
    fn bounding_box(&self) -> Option<Box2D> {
        Some(*self)
    }
}

impl Bounding for Point {
    fn bounding_box(&self) -> Option<Box2D> {
        Some(Box2D::around(self))
    }
}

impl AsRef<Box2D> for Box2D {
    fn as_ref(&self) -> &Box2D {
        self
    }
}

/// The axis-aligned bounding volume cached on every geometry.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Box3D {
    pub low_corner: Point,
    pub high_corner: Point,
}

impl Box3D {
    pub fn new(low_corner: Point, high_corner: Point) -> Self {
        let b = Box3D {
            low_corner: Point::new_3d(
                low_corner.x.min(high_corner.x),
                low_corner.y.min(high_corner.y),
                low_corner.z.min(high_corner.z),
            ),
            high_corner: Point::new_3d(
                low_corner.x.max(high_corner.x),
                low_corner.y.max(high_corner.y),
                low_corner.z.max(high_corner.z),
            ),
        };
        if cfg!(test) {
            b.assert_legal();
        }
        b
    }

    pub fn around(p: &Point) -> Self {
        Box3D {
            low_corner: *p,
            high_corner: *p,
        }
    }

    /// The exact bounds of a run of coordinates, `None` if there are none.
    pub fn from_points<'a>(mut points: impl Iterator<Item = &'a Point>) -> Option<Self> {
        let first = points.next()?;
        let mut b = Box3D::around(first);
        for p in points {
            b.low_corner.x = b.low_corner.x.min(p.x);
            b.low_corner.y = b.low_corner.y.min(p.y);
            b.low_corner.z = b.low_corner.z.min(p.z);
            b.high_corner.x = b.high_corner.x.max(p.x);
            b.high_corner.y = b.high_corner.y.max(p.y);
            b.high_corner.z = b.high_corner.z.max(p.z);
        }
        Some(b)
    }

    pub fn assert_legal(&self) {
        assert!(
            self.low_corner.x <= self.high_corner.x
                && self.low_corner.y <= self.high_corner.y
                && self.low_corner.z <= self.high_corner.z,
            "Box {} is illegal!",
            self
        );
    }

    pub fn is_finite(&self) -> bool {
        self.low_corner.is_finite() && self.high_corner.is_finite()
    }

    pub fn union(&self, other: &Box3D) -> Box3D {
        Box3D {
            low_corner: Point::new_3d(
                self.low_corner.x.min(other.low_corner.x),
                self.low_corner.y.min(other.low_corner.y),
                self.low_corner.z.min(other.low_corner.z),
            ),
            high_corner: Point::new_3d(
                self.high_corner.x.max(other.high_corner.x),
                self.high_corner.y.max(other.high_corner.y),
                self.high_corner.z.max(other.high_corner.z),
            ),
        }
    }

    /// Union of two optional boxes, where `None` is the empty box.
    pub fn union_opt(a: Option<Box3D>, b: Option<Box3D>) -> Option<Box3D> {
        match (a, b) {
            (Some(a), Some(b)) => Some(a.union(&b)),
            (a, None) => a,
            (None, b) => b,
        }
    }

    pub fn overlaps(&self, other: &Box3D) -> bool {
        self.to_box2d().overlaps(&other.to_box2d())
            && fp_le(self.low_corner.z, other.high_corner.z)
            && fp_le(other.low_corner.z, self.high_corner.z)
    }

    pub fn contains_box(&self, other: &Box3D) -> bool {
        self.to_box2d().contains_box(&other.to_box2d())
            && fp_le(self.low_corner.z, other.low_corner.z)
            && fp_ge(self.high_corner.z, other.high_corner.z)
    }

    pub fn same(&self, other: &Box3D) -> bool {
        self.low_corner.same_as(&other.low_corner) && self.high_corner.same_as(&other.high_corner)
    }

    pub fn volume(&self) -> f64 {
        self.area() * (self.high_corner.z - self.low_corner.z).abs()
    }

    pub fn expand(&self, distance: f64) -> Box3D {
        Box3D::new(
            self.low_corner.translated(-distance, -distance, -distance),
            self.high_corner.translated(distance, distance, distance),
        )
    }

    /// Drop the z range.
    pub fn to_box2d(&self) -> Box2D {
        Box2D {
            xmin: self.low_corner.x,
            ymin: self.low_corner.y,
            xmax: self.high_corner.x,
            ymax: self.high_corner.y,
        }
    }
}

impl From<Box2D> for Box3D {
    fn from(b: Box2D) -> Self {
        Box3D {
            low_corner: Point::new(b.xmin, b.ymin),
            high_corner: Point::new(b.xmax, b.ymax),
        }
    }
}

impl HasArea for Box3D {
    /// Area of the xy projection.
    fn area(&self) -> f64 {
        self.to_box2d().area()
    }
}

impl Bounding for Box3D {
    fn bounding_box(&self) -> Option<Box2D> {
        Some(self.to_box2d())
    }
}

impl fmt::Display for Box3D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BOX3D({} {} {},{} {} {})",
            self.low_corner.x,
            self.low_corner.y,
            self.low_corner.z,
            self.high_corner.x,
            self.high_corner.y,
            self.high_corner.z
        )
    }
}
