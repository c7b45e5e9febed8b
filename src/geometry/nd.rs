use super::*;
use crate::errors::*;
use itertools::Itertools;
use snafu::prelude::*;
use std::fmt;

/// Maximum number of axes a [`BoxND`] can describe (x, y, z, m).
pub const MAX_DIMS: usize = 4;

/// An axis-aligned box of 1 to [`MAX_DIMS`] dimensions.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "RawBoxND")]
pub struct BoxND {
    ndims: usize,
    mins: [f64; MAX_DIMS],
    maxs: [f64; MAX_DIMS],
}

/// Serialized form of [`BoxND`], checked before it becomes one.
#[derive(serde::Deserialize)]
struct RawBoxND {
    ndims: usize,
    mins: [f64; MAX_DIMS],
    maxs: [f64; MAX_DIMS],
}

impl TryFrom<RawBoxND> for BoxND {
    type Error = GeoError;

    fn try_from(raw: RawBoxND) -> Result<Self> {
        check_ndims(raw.ndims)?;
        Ok(BoxND {
            ndims: raw.ndims,
            mins: raw.mins,
            maxs: raw.maxs,
        })
    }
}

fn check_ndims(ndims: usize) -> Result<()> {
    ensure!(
        (1..=MAX_DIMS).contains(&ndims),
        DegenerateGeometrySnafu {
            description: format!("a box needs between 1 and {MAX_DIMS} dimensions, got {ndims}")
        }
    );
    Ok(())
}

impl BoxND {
    /// Build a box from per-axis `(min, max)` ranges.
    ///
    /// Ranges given in the wrong order are swapped.
    pub fn from_ranges(ranges: &[(f64, f64)]) -> Result<Self> {
        check_ndims(ranges.len())?;
        let mut mins = [0.0; MAX_DIMS];
        let mut maxs = [0.0; MAX_DIMS];
        for (axis, (lo, hi)) in ranges.iter().enumerate() {
            mins[axis] = lo.min(*hi);
            maxs[axis] = lo.max(*hi);
        }
        Ok(BoxND {
            ndims: ranges.len(),
            mins,
            maxs,
        })
    }

    pub fn ndims(&self) -> usize {
        self.ndims
    }

    /// Lower bound on `axis`, `None` past the last axis.
    pub fn min(&self, axis: usize) -> Option<f64> {
        self.mins[..self.ndims].get(axis).copied()
    }

    pub fn max(&self, axis: usize) -> Option<f64> {
        self.maxs[..self.ndims].get(axis).copied()
    }

    /// `false` if any bound is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.mins[..self.ndims]
            .iter()
            .chain(self.maxs[..self.ndims].iter())
            .all(|v| v.is_finite())
    }

    fn check_dims(&self, other: &BoxND) -> Result<()> {
        ensure!(
            self.ndims == other.ndims,
            DimensionMismatchSnafu {
                left: self.ndims,
                right: other.ndims
            }
        );
        Ok(())
    }

    pub fn union(&self, other: &BoxND) -> Result<BoxND> {
        self.check_dims(other)?;
        let mut result = *self;
        result.union_in_place(other);
        Ok(result)
    }

    /// Grow `self` to cover `other` and return whether anything changed.
    ///
    /// Both boxes must have the same number of dimensions.
    pub(crate) fn union_in_place(&mut self, other: &BoxND) -> bool {
        debug_assert_eq!(self.ndims, other.ndims);
        let mut grew = false;
        for axis in 0..self.ndims {
            if other.mins[axis] < self.mins[axis] {
                self.mins[axis] = other.mins[axis];
                grew = true;
            }
            if other.maxs[axis] > self.maxs[axis] {
                self.maxs[axis] = other.maxs[axis];
                grew = true;
            }
        }
        grew
    }

    pub fn overlaps(&self, other: &BoxND) -> Result<bool> {
        self.check_dims(other)?;
        Ok((0..self.ndims).all(|axis| {
            fp_le(self.mins[axis], other.maxs[axis]) && fp_le(other.mins[axis], self.maxs[axis])
        }))
    }

    pub fn contains(&self, other: &BoxND) -> Result<bool> {
        self.check_dims(other)?;
        Ok((0..self.ndims).all(|axis| {
            fp_le(self.mins[axis], other.mins[axis]) && fp_ge(self.maxs[axis], other.maxs[axis])
        }))
    }

    pub fn same(&self, other: &BoxND) -> bool {
        self.ndims == other.ndims
            && (0..self.ndims).all(|axis| {
                fp_eq(self.mins[axis], other.mins[axis]) && fp_eq(self.maxs[axis], other.maxs[axis])
            })
    }

    /// Product of the per-axis extents (the "volume" of the box).
    pub fn size(&self) -> f64 {
        (0..self.ndims)
            .map(|axis| (self.maxs[axis] - self.mins[axis]).abs())
            .product()
    }
}

impl From<Box2D> for BoxND {
    fn from(b: Box2D) -> Self {
        BoxND {
            ndims: 2,
            mins: [b.xmin, b.ymin, 0.0, 0.0],
            maxs: [b.xmax, b.ymax, 0.0, 0.0],
        }
    }
}

impl From<Box3D> for BoxND {
    fn from(b: Box3D) -> Self {
        BoxND {
            ndims: 3,
            mins: [b.low_corner.x, b.low_corner.y, b.low_corner.z, 0.0],
            maxs: [b.high_corner.x, b.high_corner.y, b.high_corner.z, 0.0],
        }
    }
}

impl HasArea for BoxND {
    fn area(&self) -> f64 {
        self.size()
    }
}

impl Bounding for BoxND {
    fn bounding_box(&self) -> Option<Box2D> {
        if self.ndims < 2 {
            None
        } else {
            Some(Box2D {
                xmin: self.mins[0],
                ymin: self.mins[1],
                xmax: self.maxs[0],
                ymax: self.maxs[1],
            })
        }
    }
}

impl fmt::Display for BoxND {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GIDX(({}),({}))",
            self.mins[..self.ndims].iter().join(" "),
            self.maxs[..self.ndims].iter().join(" ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nd_union_and_size() {
        let a = BoxND::from_ranges(&[(0.0, 1.0), (0.0, 2.0), (0.0, 3.0)]).unwrap();
        let b = BoxND::from_ranges(&[(2.0, 1.0), (-1.0, 0.0), (1.0, 1.0)]).unwrap();
        assert_eq!(3, a.ndims());
        assert_eq!(6.0, a.size());
        assert_eq!(0.0, b.size());
        let u = a.union(&b).unwrap();
        assert_eq!(Some(2.0), u.max(0));
        assert_eq!(Some(-1.0), u.min(1));
        assert!(u.contains(&a).unwrap());
        assert!(u.contains(&b).unwrap());
        assert!(a.overlaps(&b).unwrap());
        assert_eq!("GIDX((0 0 0),(1 2 3))", a.to_string());
    }

    #[test]
    fn test_nd_dimension_mismatch() {
        let flat = BoxND::from(Box2D::new(0.0, 0.0, 1.0, 1.0));
        let deep = BoxND::from(Box3D::new(Point::new_3d(0.0, 0.0, 0.0), Point::new_3d(1.0, 1.0, 1.0)));
        assert!(matches!(
            flat.union(&deep),
            Err(GeoError::DimensionMismatch { left: 2, right: 3, .. })
        ));
        assert!(flat.overlaps(&deep).is_err());
        assert!(!flat.same(&deep));
        assert!(BoxND::from_ranges(&[]).is_err());
        assert!(BoxND::from_ranges(&[(0.0, 1.0); 5]).is_err());
    }

    #[test]
    fn test_nd_union_in_place_reports_growth() {
        let mut acc = BoxND::from(Box2D::new(0.0, 0.0, 10.0, 10.0));
        assert!(!acc.union_in_place(&BoxND::from(Box2D::new(1.0, 1.0, 2.0, 2.0))));
        assert!(acc.union_in_place(&BoxND::from(Box2D::new(5.0, 5.0, 15.0, 15.0))));
        assert_eq!(Some(Box2D::new(0.0, 0.0, 15.0, 15.0)), acc.bounding_box());
    }

    #[test]
    fn test_nd_axes_past_the_end() {
        let flat = BoxND::from(Box2D::new(0.0, 1.0, 2.0, 3.0));
        assert_eq!(Some(3.0), flat.max(1));
        assert_eq!(None, flat.min(2));
        assert_eq!(None, flat.max(MAX_DIMS));
        assert_eq!(None, flat.min(usize::MAX));
    }

    #[test]
    fn test_nd_decoded_dims_are_checked() {
        let raw = |ndims| RawBoxND {
            ndims,
            mins: [0.0; MAX_DIMS],
            maxs: [1.0; MAX_DIMS],
        };
        for ndims in [0, MAX_DIMS + 1, 99] {
            assert!(matches!(
                BoxND::try_from(raw(ndims)),
                Err(GeoError::DegenerateGeometry { .. })
            ));
        }
        let b = BoxND::try_from(raw(MAX_DIMS)).unwrap();
        assert_eq!(1.0, b.size());
        assert_eq!(Some(1.0), b.max(MAX_DIMS - 1));
    }
}
