use super::*;

use std::fmt;

pub mod in_memory;
mod nodes;

pub use nodes::{IdRef, InternalNode, Leaf, NodeId, NodeRef, RTree};

/// Owns the nodes of an [`RTree`] and hands out shared references to them.
pub trait NodeManager<V> {
    fn get(&self, id: NodeId) -> NodeRef<V>;
    fn fresh_leaf(&mut self) -> IdRef<V>;
    fn fresh_internal(&mut self) -> IdRef<V>;
    fn num_nodes(&self) -> usize;
}

/// Shape of a tree, as reported by [`RTree::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct TreeStats {
    pub entries: usize,
    pub leaves: usize,
    pub internal_nodes: usize,
    pub allocated_nodes: usize,
    pub height: usize,
}

impl fmt::Display for TreeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries in {} leaves and {} internal nodes, height {}",
            self.entries, self.leaves, self.internal_nodes, self.height
        )
    }
}
