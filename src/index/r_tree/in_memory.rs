use super::*;

use std::{cell::RefCell, rc::Rc};

pub type RTree<V> = nodes::RTree<V, InMemoryNodeManager<V>>;

pub fn new<V>(config: IndexConfig) -> Result<RTree<V>> {
    nodes::RTree::new(InMemoryNodeManager::new(config.node_width), config)
}

pub fn with_capacity<V>(config: IndexConfig, capacity: usize) -> Result<RTree<V>> {
    // assume all nodes are half-filled
    let avg_fill_degree = (config.node_width / 2).max(2);
    let mut num_nodes = capacity / avg_fill_degree;
    let mut last_summand = num_nodes;
    while last_summand > 0 {
        last_summand /= avg_fill_degree;
        num_nodes += last_summand;
    }
    nodes::RTree::new(
        InMemoryNodeManager::with_capacity(config.node_width, num_nodes + 1),
        config,
    )
}

pub struct InMemoryNodeManager<V> {
    node_width: usize,
    nodes: Vec<NodeRef<V>>,
}

impl<V> InMemoryNodeManager<V> {
    fn new(node_width: usize) -> Self {
        InMemoryNodeManager {
            node_width,
            nodes: Vec::new(),
        }
    }

    fn with_capacity(node_width: usize, capacity: usize) -> Self {
        InMemoryNodeManager {
            node_width,
            nodes: Vec::with_capacity(capacity),
        }
    }

    fn push(&mut self, node: NodeRef<V>) -> IdRef<V> {
        let id = self.nodes.len();
        self.nodes.push(node.clone());
        IdRef { id, node }
    }
}

impl<V> NodeManager<V> for InMemoryNodeManager<V> {
    /// Node ids are only ever handed out by this manager.
    fn get(&self, id: NodeId) -> NodeRef<V> {
        self.nodes[id].clone()
    }

    fn fresh_leaf(&mut self) -> IdRef<V> {
        let leaf = Rc::new(RefCell::new(Leaf::with_capacity(self.node_width)));
        self.push(NodeRef::Leaf(leaf))
    }

    fn fresh_internal(&mut self) -> IdRef<V> {
        let inode = Rc::new(RefCell::new(InternalNode::with_capacity(self.node_width)));
        self.push(NodeRef::Internal(inode))
    }

    fn num_nodes(&self) -> usize {
        self.nodes.len()
    }
}
