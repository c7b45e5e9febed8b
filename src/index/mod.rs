//! Support operations for a balanced tree index over 2D boxes, and an
//! in-memory R-tree that is driven entirely by them.
//!
//! The tree never looks at geometries. It stores [`IndexKey`]s derived by
//! [`compress`], places new keys with [`penalty`], splits overfull nodes
//! with [`pick_split`], maintains parent keys with [`union`] and prunes
//! searches with [`consistent`].

use crate::{errors::*, geometry::*};
use snafu::prelude::*;
use std::cmp::Ordering;

pub mod btree;
pub mod r_tree;

/// Shape parameters of the in-memory R-tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct IndexConfig {
    /// Maximum number of entries per node.
    pub node_width: usize,
    /// Minimum number of entries of every non-root node.
    pub min_fill: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            node_width: 32,
            min_fill: 8,
        }
    }
}

impl IndexConfig {
    /// A split of a full node plus one entry must be able to satisfy
    /// `min_fill` on both sides.
    pub fn validate(&self) -> Result<()> {
        ensure_whatever!(
            self.min_fill >= 1 && self.node_width >= 3,
            "an index needs node_width >= 3 and min_fill >= 1, got {} and {}",
            self.node_width,
            self.min_fill
        );
        ensure_whatever!(
            2 * self.min_fill <= self.node_width + 1,
            "min_fill {} is too large for node_width {}",
            self.min_fill,
            self.node_width
        );
        Ok(())
    }
}

/// What the index stores for one value: its 2D box and SRID.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct IndexKey {
    pub bbox: Box2D,
    pub srid: i32,
}

impl IndexKey {
    pub fn new(bbox: Box2D, srid: i32) -> Self {
        IndexKey { bbox, srid }
    }
}

impl AsRef<Box2D> for IndexKey {
    fn as_ref(&self) -> &Box2D {
        &self.bbox
    }
}

impl Bounding for IndexKey {
    fn bounding_box(&self) -> Option<Box2D> {
        Some(self.bbox)
    }
}

impl HasArea for IndexKey {
    fn area(&self) -> f64 {
        self.bbox.area()
    }
}

/// Derive the key of a leaf value.
///
/// Empty geometries have no meaningful box and are not indexed.
pub fn compress(geometry: &Geometry) -> Option<IndexKey> {
    if geometry.is_empty() {
        log::trace!("Not indexing an empty geometry (srid={})", geometry.srid());
        return None;
    }
    let bbox = geometry.bounding_box()?;
    Some(IndexKey::new(bbox, geometry.srid()))
}

/// Keys are stored as they are used.
pub fn decompress(key: IndexKey) -> IndexKey {
    key
}

/// The key covering all `keys`.
///
/// Fails for an empty slice and for keys of different SRIDs.
pub fn union(keys: &[IndexKey]) -> Result<IndexKey> {
    let (first, rest) = keys.split_first().context(DegenerateGeometrySnafu {
        description: "cannot build the union of zero index keys",
    })?;
    rest.iter().try_fold(*first, |acc, key| {
        check_srid(acc.srid, key.srid)?;
        Ok(IndexKey::new(acc.bbox.union(&key.bbox), acc.srid))
    })
}

/// Area added to `existing` by extending it to cover `new`. Never negative.
pub fn penalty(existing: &Box2D, new: &Box2D) -> f64 {
    new.extend_area(*existing)
}

/// Exact equality of two optional keys. Two missing keys are the same.
pub fn same_key(a: Option<&Box2D>, b: Option<&Box2D>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        (None, None) => true,
        _ => false,
    }
}

/// The result of [`pick_split`], referring to entries by their input index.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub left: Vec<usize>,
    pub right: Vec<usize>,
    pub left_key: Box2D,
    pub right_key: Box2D,
}

impl Split {
    fn seeded(entries: &[Box2D], left_seed: usize, right_seed: usize) -> Self {
        let capacity = entries.len();
        let mut left = Vec::with_capacity(capacity);
        let mut right = Vec::with_capacity(capacity);
        left.push(left_seed);
        right.push(right_seed);
        Split {
            left,
            right,
            left_key: entries[left_seed],
            right_key: entries[right_seed],
        }
    }

    fn assign(&mut self, index: usize, entry: &Box2D, to_left: bool) {
        if to_left {
            self.left.push(index);
            self.left_key = self.left_key.union(entry);
        } else {
            self.right.push(index);
            self.right_key = self.right_key.union(entry);
        }
    }

    /// Distribute `values`, given in input order, over the two groups.
    pub fn partition<T>(&self, values: Vec<T>) -> (Vec<T>, Vec<T>) {
        let mut goes_left = vec![false; values.len()];
        for index in self.left.iter() {
            if let Some(flag) = goes_left.get_mut(*index) {
                *flag = true;
            }
        }
        let (left, right): (Vec<_>, Vec<_>) = values
            .into_iter()
            .enumerate()
            .partition(|(index, _)| goes_left[*index]);
        (
            left.into_iter().map(|(_, v)| v).collect(),
            right.into_iter().map(|(_, v)| v).collect(),
        )
    }

    fn smaller_group(&self) -> usize {
        self.left.len().min(self.right.len())
    }
}

/// Space two boxes waste when they share a node.
fn waste(a: &Box2D, b: &Box2D) -> f64 {
    a.union(b).area() - a.overlap_area(b)
}

/// The pair with the largest waste. On ties the first pair found wins.
fn pick_seeds(entries: &[Box2D]) -> (usize, usize) {
    let mut seeds = (0, 1);
    let mut max_waste = waste(&entries[0], &entries[1]);
    for (i, a) in entries.iter().enumerate() {
        for (j, b) in entries.iter().enumerate().skip(i + 1) {
            let w = waste(a, b);
            if w > max_waste {
                max_waste = w;
                seeds = (i, j);
            }
        }
    }
    seeds
}

/// Divide an overfull node's entries into two groups.
///
/// Quadratic seed selection followed by a greedy least-enlargement
/// assignment in input order. Ties go to the smaller group, and to the
/// left group if both are equally large. If one group ends up holding a
/// single entry out of four or more, the entries are split by area instead
/// (see [`area_sort_split`]).
///
/// Both groups are non-empty and together hold every input index exactly
/// once.
pub fn pick_split(entries: &[Box2D]) -> Result<Split> {
    ensure!(
        entries.len() >= 2,
        DegenerateGeometrySnafu {
            description: format!("cannot split {} index entries", entries.len())
        }
    );
    let (left_seed, right_seed) = pick_seeds(entries);
    let mut split = Split::seeded(entries, left_seed, right_seed);
    for (index, entry) in entries.iter().enumerate() {
        if index == left_seed || index == right_seed {
            continue;
        }
        let left_cost = penalty(&split.left_key, entry);
        let right_cost = penalty(&split.right_key, entry);
        let to_left = match left_cost.partial_cmp(&right_cost) {
            Some(Ordering::Less) => true,
            Some(Ordering::Greater) => false,
            _ => split.left.len() <= split.right.len(),
        };
        split.assign(index, entry, to_left);
    }
    if entries.len() >= 4 && split.smaller_group() == 1 {
        log::debug!(
            "Quadratic split of {} entries isolated a single entry, splitting by area instead",
            entries.len()
        );
        return area_sort_split(entries);
    }
    Ok(split)
}

/// Sort the entries by area and cut the sorted sequence in half.
///
/// Equal areas keep their input order.
pub fn area_sort_split(entries: &[Box2D]) -> Result<Split> {
    ensure!(
        entries.len() >= 2,
        DegenerateGeometrySnafu {
            description: format!("cannot split {} index entries", entries.len())
        }
    );
    let mut order: Vec<usize> = (0..entries.len()).collect();
    order.sort_by(|a, b| entries[*a].area().total_cmp(&entries[*b].area()));
    let middle = order.len() / 2;
    let mut split = Split::seeded(entries, order[0], order[middle]);
    for (position, index) in order.iter().enumerate() {
        if position == 0 || position == middle {
            continue;
        }
        split.assign(*index, &entries[*index], position < middle);
    }
    Ok(split)
}

/// Query operators a tree search can answer.
///
/// The discriminants are the customary R-tree strategy numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(u16)]
pub enum Strategy {
    Left = 1,
    OverLeft = 2,
    Overlap = 3,
    OverRight = 4,
    Right = 5,
    Same = 6,
    Contains = 7,
    ContainedBy = 8,
    OverBelow = 9,
    Below = 10,
    Above = 11,
    OverAbove = 12,
}

impl Strategy {
    pub const ALL: [Strategy; 12] = [
        Strategy::Left,
        Strategy::OverLeft,
        Strategy::Overlap,
        Strategy::OverRight,
        Strategy::Right,
        Strategy::Same,
        Strategy::Contains,
        Strategy::ContainedBy,
        Strategy::OverBelow,
        Strategy::Below,
        Strategy::Above,
        Strategy::OverAbove,
    ];

    pub fn number(self) -> u16 {
        self as u16
    }

    pub fn from_number(number: u16) -> Option<Self> {
        Strategy::ALL.iter().copied().find(|s| s.number() == number)
    }

    /// The predicate itself, as applied to a leaf key.
    pub fn leaf_matches(self, key: &Box2D, query: &Box2D) -> bool {
        match self {
            Strategy::Left => key.left(query),
            Strategy::OverLeft => key.overleft(query),
            Strategy::Overlap => key.overlaps(query),
            Strategy::OverRight => key.overright(query),
            Strategy::Right => key.right(query),
            Strategy::Same => key.same(query),
            Strategy::Contains => key.contains_box(query),
            Strategy::ContainedBy => key.contained_by(query),
            Strategy::OverBelow => key.overbelow(query),
            Strategy::Below => key.below(query),
            Strategy::Above => key.above(query),
            Strategy::OverAbove => key.overabove(query),
        }
    }

    /// Whether any box covered by the internal `key` can satisfy
    /// [`Strategy::leaf_matches`].
    pub fn internal_matches(self, key: &Box2D, query: &Box2D) -> bool {
        match self {
            Strategy::Left => !key.overright(query),
            Strategy::OverLeft => !key.right(query),
            Strategy::Overlap | Strategy::ContainedBy => key.overlaps(query),
            Strategy::OverRight => !key.left(query),
            Strategy::Right => !key.overleft(query),
            Strategy::Same | Strategy::Contains => key.contains_box(query),
            Strategy::OverBelow => !key.above(query),
            Strategy::Below => !key.overabove(query),
            Strategy::Above => !key.overbelow(query),
            Strategy::OverAbove => !key.below(query),
        }
    }
}

/// Decide whether the subtree (or leaf value) under `key` may hold matches
/// for `query`.
///
/// Keys and queries of different SRIDs are an error, not a miss.
pub fn consistent(
    key: &IndexKey,
    query: &IndexKey,
    strategy: Strategy,
    is_leaf: bool,
) -> Result<bool> {
    check_srid(key.srid, query.srid)?;
    Ok(if is_leaf {
        strategy.leaf_matches(&key.bbox, &query.bbox)
    } else {
        strategy.internal_matches(&key.bbox, &query.bbox)
    })
}
