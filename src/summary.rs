//! Bounding-box synopsis of a contiguous block of stored values.
//!
//! A [`BlockSummary`] is fed every value of one block, one at a time, and
//! later used to decide whether a scan can skip the block altogether.

use crate::{
    errors::*,
    geometry::{nd::MAX_DIMS, *},
};
use snafu::prelude::*;

/// A value that can be folded into a [`BlockSummary`].
pub trait SummaryValue {
    /// The box of this value, or `None` for the empty sentinel.
    ///
    /// Fails if the value is not empty but no usable box can be derived.
    fn summary_box(&self) -> Result<Option<BoxND>>;

    /// The spatial reference of the value, if it carries one.
    fn summary_srid(&self) -> Option<i32> {
        None
    }
}

impl SummaryValue for Geometry {
    fn summary_box(&self) -> Result<Option<BoxND>> {
        if self.is_empty() {
            return Ok(None);
        }
        let bbox = self.bbox().context(BoxUnavailableSnafu {
            description: format!("{} holds objects but has no box", self.geometry_type_name()),
        })?;
        let summary_box = if self.is_3d() {
            BoxND::from(*bbox)
        } else {
            BoxND::from(bbox.to_box2d())
        };
        ensure!(
            summary_box.is_finite(),
            BoxUnavailableSnafu {
                description: format!("{summary_box} has non-finite bounds"),
            }
        );
        Ok(Some(summary_box))
    }

    fn summary_srid(&self) -> Option<i32> {
        Some(self.srid())
    }
}

impl SummaryValue for BoxND {
    fn summary_box(&self) -> Result<Option<BoxND>> {
        ensure!(
            self.is_finite(),
            BoxUnavailableSnafu {
                description: format!("{self} has non-finite bounds"),
            }
        );
        Ok(Some(*self))
    }
}

/// The union of the boxes of all values of a block, plus what the box
/// cannot tell.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct BlockSummary {
    bbox: Option<BoxND>,
    /// When set, every box is padded or truncated to this many axes.
    fixed_dims: Option<usize>,
    srid: Option<i32>,
    has_nulls: bool,
    contains_empty: bool,
    unmergeable: bool,
}

impl BlockSummary {
    /// A summary that takes its dimensionality from the first box it sees.
    pub fn new() -> Self {
        BlockSummary::default()
    }

    /// A summary that stores boxes of exactly `dims` axes.
    ///
    /// Missing axes of smaller values are zero, extra axes are ignored, so
    /// such a summary never becomes unmergeable.
    pub fn with_dims(dims: usize) -> Result<Self> {
        ensure!(
            (1..=MAX_DIMS).contains(&dims),
            DegenerateGeometrySnafu {
                description: format!("a block summary needs between 1 and {MAX_DIMS} dimensions, got {dims}"),
            }
        );
        Ok(BlockSummary {
            fixed_dims: Some(dims),
            ..BlockSummary::default()
        })
    }

    pub fn bbox(&self) -> Option<&BoxND> {
        self.bbox.as_ref()
    }

    pub fn has_nulls(&self) -> bool {
        self.has_nulls
    }

    pub fn contains_empty(&self) -> bool {
        self.contains_empty
    }

    /// Values of different dimensionality were seen, the box no longer
    /// describes the block.
    pub fn is_unmergeable(&self) -> bool {
        self.unmergeable
    }

    /// Fold one value into the summary. `None` is a null value.
    ///
    /// Returns whether the summary changed.
    pub fn add_value<T>(&mut self, candidate: Option<&T>) -> Result<bool>
    where
        T: SummaryValue + ?Sized,
    {
        let Some(value) = candidate else {
            let changed = !self.has_nulls;
            self.has_nulls = true;
            return Ok(changed);
        };
        let Some(value_box) = value.summary_box()? else {
            let changed = !self.contains_empty;
            self.contains_empty = true;
            return Ok(changed);
        };
        let value_box = match self.fixed_dims {
            Some(dims) => with_ndims(&value_box, dims)?,
            None => value_box,
        };
        self.note_srid(value.summary_srid());
        Ok(self.add_box(value_box))
    }

    fn note_srid(&mut self, srid: Option<i32>) {
        let Some(srid) = srid else {
            return;
        };
        match self.srid {
            None => self.srid = Some(srid),
            Some(known) if known != srid => {
                log::warn!("Block mixes SRIDs {known} and {srid}, summarizing coordinates as they are");
            }
            Some(_) => (),
        }
    }

    fn add_box(&mut self, value_box: BoxND) -> bool {
        let Some(current) = self.bbox.as_mut() else {
            self.bbox = Some(value_box);
            return true;
        };
        if self.unmergeable {
            return false;
        }
        if current.ndims() != value_box.ndims() {
            log::debug!(
                "Block summary of {} dimensions received a {}-dimensional box, marking it unmergeable",
                current.ndims(),
                value_box.ndims()
            );
            self.unmergeable = true;
            return true;
        }
        current.union_in_place(&value_box)
    }

    /// Fold another summary of the same column into this one.
    ///
    /// Returns whether this summary changed.
    pub fn merge(&mut self, other: &BlockSummary) -> bool {
        let mut changed = false;
        if other.has_nulls && !self.has_nulls {
            self.has_nulls = true;
            changed = true;
        }
        if other.contains_empty && !self.contains_empty {
            self.contains_empty = true;
            changed = true;
        }
        self.note_srid(other.srid);
        if other.unmergeable && !self.unmergeable {
            log::debug!("Merging an unmergeable block summary");
            self.unmergeable = true;
            if self.bbox.is_none() {
                self.bbox = other.bbox;
            }
            return true;
        }
        if let Some(other_box) = other.bbox {
            changed |= self.add_box(other_box);
        }
        changed
    }

    /// Whether a value of this block may overlap `query`.
    ///
    /// Only answers `false` when the summary proves that nothing in the
    /// block can intersect the query box.
    pub fn may_match(&self, query: &BoxND) -> bool {
        if self.unmergeable {
            return true;
        }
        let Some(bbox) = self.bbox.as_ref() else {
            // only nulls and empties, neither overlaps anything
            return false;
        };
        // compare on the axes both boxes have
        let axes = query.ndims().min(bbox.ndims());
        match (with_ndims(bbox, axes), with_ndims(query, axes)) {
            (Ok(bbox), Ok(query)) => bbox.overlaps(&query).unwrap_or(true),
            _ => true,
        }
    }

    /// Back to the state of a block that has not seen any value.
    pub fn reset(&mut self) {
        *self = BlockSummary {
            fixed_dims: self.fixed_dims,
            ..BlockSummary::default()
        };
    }
}

/// Pad with zero-width axes at 0, or drop trailing axes.
fn with_ndims(value: &BoxND, dims: usize) -> Result<BoxND> {
    if value.ndims() == dims {
        return Ok(*value);
    }
    let ranges: Vec<(f64, f64)> = (0..dims)
        .map(|axis| (value.min(axis).unwrap_or(0.0), value.max(axis).unwrap_or(0.0)))
        .collect();
    BoxND::from_ranges(&ranges)
}
