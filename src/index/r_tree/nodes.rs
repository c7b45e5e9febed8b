use super::*;

use std::{cell::RefCell, cmp::Ordering, collections::VecDeque, marker::PhantomData, rc::Rc};

pub struct RTree<V, M>
where
    M: NodeManager<V>,
{
    root: NodeId,
    manager: M,
    config: IndexConfig,
    srid: Option<i32>,
    len: usize,
    marker: PhantomData<V>,
}

impl<V, M> RTree<V, M>
where
    M: NodeManager<V>,
{
    pub fn new(mut manager: M, config: IndexConfig) -> Result<Self> {
        config.validate()?;
        let root = manager.fresh_leaf();
        Ok(RTree {
            root: root.id,
            manager,
            config,
            srid: None,
            len: 0,
            marker: PhantomData,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// The SRID shared by all keys, once the first key was inserted.
    pub fn srid(&self) -> Option<i32> {
        self.srid
    }

    /// The key covering the whole tree.
    pub fn root_key(&self) -> Option<IndexKey> {
        let srid = self.srid?;
        let root = self.manager.get(self.root);
        self.node_key(&root).ok().map(|bbox| IndexKey::new(bbox, srid))
    }

    fn node_key(&self, node: &NodeRef<V>) -> Result<Box2D> {
        let srid = self.srid.unwrap_or(UNKNOWN_SRID);
        let keys: Vec<IndexKey> = node
            .entry_boxes()
            .into_iter()
            .map(|bbox| IndexKey::new(bbox, srid))
            .collect();
        Ok(union(&keys)?.bbox)
    }

    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats {
            allocated_nodes: self.manager.num_nodes(),
            ..TreeStats::default()
        };
        let mut to_visit: VecDeque<(NodeRef<V>, usize)> = VecDeque::with_capacity(1);
        to_visit.push_back((self.manager.get(self.root), 1));
        while let Some((current, depth)) = to_visit.pop_front() {
            stats.height = stats.height.max(depth);
            match current {
                NodeRef::Internal(node) => {
                    stats.internal_nodes += 1;
                    for ChildEntry(_, id) in node.borrow().entries.iter() {
                        to_visit.push_back((self.manager.get(*id), depth + 1));
                    }
                }
                NodeRef::Leaf(leaf) => {
                    stats.leaves += 1;
                    stats.entries += leaf.borrow().entries.len();
                }
            }
        }
        stats
    }

    /// Checks the whole tree to determine it is sound
    pub fn assert_invariants(&self) {
        let mut to_search: VecDeque<(IdRef<V>, usize)> = VecDeque::with_capacity(1);
        to_search.push_back((self.manager.get(self.root).with_id(self.root), 1));
        let mut leaf_depth: Option<usize> = None;
        let mut entries = 0;
        while let Some((
            IdRef {
                node: current_node,
                id: current_id,
            },
            depth,
        )) = to_search.pop_front()
        {
            let is_root = current_id == self.root;
            assert_eq!(is_root, current_node.get_parent().is_none());
            let len = current_node.len();
            assert!(len <= self.config.node_width, "node {current_id} holds {len} entries");
            if !is_root {
                assert!(self.config.min_fill <= len, "node {current_id} holds {len} entries");
            }
            match &current_node {
                NodeRef::Internal(node) => {
                    if is_root {
                        assert!(2 <= len);
                    }
                    for ChildEntry(bbox, id) in node.borrow().entries.iter() {
                        let child = self.manager.get(*id);
                        assert_eq!(child.get_parent(), Some(current_id));
                        let child_key = self.node_key(&child).expect("non-root nodes are never empty");
                        assert_eq!(*bbox, child_key, "stale key for child {id} of {current_id}");
                        to_search.push_back((child.with_id(*id), depth + 1));
                    }
                }
                NodeRef::Leaf(_) => {
                    entries += len;
                    match leaf_depth {
                        Some(expected) => assert_eq!(expected, depth, "leaves at different depths"),
                        None => leaf_depth = Some(depth),
                    }
                }
            }
        }
        assert_eq!(self.len, entries);
    }
}

impl<V, M> RTree<V, M>
where
    V: Clone,
    M: NodeManager<V>,
{
    /// All values whose key satisfies `strategy` with respect to `query`.
    ///
    /// Subtrees are pruned with the relaxed internal predicate and every leaf
    /// key is checked exactly, so the result holds no false positives.
    pub fn search(&self, query: &IndexKey, strategy: Strategy) -> Result<Vec<V>> {
        let mut results: Vec<V> = Vec::new();
        let Some(srid) = self.srid else {
            return Ok(results);
        };

        let mut to_search: VecDeque<NodeRef<V>> = VecDeque::with_capacity(1);
        to_search.push_back(self.manager.get(self.root));

        while let Some(current) = to_search.pop_front() {
            match current {
                NodeRef::Internal(node) => {
                    for ChildEntry(bounds, id) in node.borrow().entries.iter() {
                        if consistent(&IndexKey::new(*bounds, srid), query, strategy, false)? {
                            to_search.push_back(self.manager.get(*id));
                        }
                    }
                }
                NodeRef::Leaf(leaf) => {
                    for entry in leaf.borrow().entries.iter() {
                        if consistent(&IndexKey::new(entry.key, srid), query, strategy, true)? {
                            results.push(entry.value.clone());
                        }
                    }
                }
            }
        }
        Ok(results)
    }

    /// Updates the tree to include `value` under `key`
    pub fn insert(&mut self, key: IndexKey, value: V) -> Result<()> {
        let srid = *self.srid.get_or_insert(key.srid);
        check_srid(srid, key.srid)?;
        let entry = LeafEntry {
            key: key.bbox,
            value,
        };
        let target_leaf = self.choose_leaf(&key.bbox);
        let NodeRef::Leaf(leaf) = &target_leaf.node else {
            whatever!("descent for {} ended at internal node {}", key.bbox, target_leaf.id);
        };
        if leaf.borrow().entries.len() < self.config.node_width {
            leaf.borrow_mut().entries.push(entry);
            self.adjust_tree(target_leaf, None)?;
        } else {
            let new_leaf = self.split_leaf(&target_leaf, entry)?;
            self.adjust_tree(target_leaf, Some(new_leaf))?;
        }
        self.len += 1;
        Ok(())
    }

    fn choose_leaf(&self, key: &Box2D) -> IdRef<V> {
        let mut current = self.manager.get(self.root).with_id(self.root);
        loop {
            let best_id = match &current.node {
                NodeRef::Internal(node) => node.borrow().best_fit(key),
                NodeRef::Leaf(_) => None,
            };
            match best_id {
                Some(id) => current = self.manager.get(id).with_id(id),
                None => return current,
            }
        }
    }

    fn adjust_tree(&mut self, mut node: IdRef<V>, mut split_node_opt: Option<IdRef<V>>) -> Result<()> {
        while let Some(parent_id) = node.get_parent() {
            let parent = self.manager.get(parent_id);
            let NodeRef::Internal(inode) = &parent else {
                whatever!("parent {parent_id} of node {} is a leaf", node.id);
            };
            let node_key = self.node_key(&node.node)?;
            inode.borrow_mut().update_bounding_box(node.id, node_key)?;
            if let Some(split_node) = split_node_opt.take() {
                if inode.borrow().entries.len() < self.config.node_width {
                    let split_key = self.node_key(&split_node.node)?;
                    inode.borrow_mut().entries.push(ChildEntry(split_key, split_node.id));
                    split_node.node.set_parent(parent_id);
                } else {
                    let id_parent = parent.clone().with_id(parent_id);
                    split_node_opt = Some(self.split_internal(&id_parent, split_node)?);
                }
            }
            // set up next iteration
            node = parent.with_id(parent_id);
        }
        // done when node is root
        if let Some(split_node) = split_node_opt {
            // grow tree
            let new_root = self.manager.fresh_internal();
            node.node.set_parent(new_root.id);
            split_node.node.set_parent(new_root.id);
            let children = vec![
                ChildEntry(self.node_key(&node.node)?, node.id),
                ChildEntry(self.node_key(&split_node.node)?, split_node.id),
            ];
            if let NodeRef::Internal(root) = &new_root.node {
                root.borrow_mut().entries = children;
            }
            log::trace!(
                "R-tree grew a new root {} above nodes {} and {}",
                new_root.id,
                node.id,
                split_node.id
            );
            self.root = new_root.id;
        }
        Ok(())
    }

    /// Quadratic split, unless it would leave a node below the minimum fill.
    fn choose_split(&self, boxes: &[Box2D]) -> Result<Split> {
        let split = pick_split(boxes)?;
        if split.left.len() >= self.config.min_fill && split.right.len() >= self.config.min_fill {
            return Ok(split);
        }
        log::debug!(
            "Split of {} entries into {}/{} underfills a node, splitting by area instead",
            boxes.len(),
            split.left.len(),
            split.right.len()
        );
        area_sort_split(boxes)
    }

    /// Take a full target `leaf` and a value to be added
    /// and create and return a new sibling leaf,
    /// spreading the old values plus `entry` over both leaves
    fn split_leaf(&mut self, leaf: &IdRef<V>, entry: LeafEntry<V>) -> Result<IdRef<V>> {
        let NodeRef::Leaf(old_leaf) = &leaf.node else {
            whatever!("node {} is not a leaf", leaf.id);
        };
        let mut entries = std::mem::take(&mut old_leaf.borrow_mut().entries);
        entries.push(entry);
        let boxes: Vec<Box2D> = entries.iter().map(|e| e.key).collect();
        let split = self.choose_split(&boxes)?;
        let (left, right) = split.partition(entries);
        old_leaf.borrow_mut().entries = left;
        let new_leaf = self.manager.fresh_leaf();
        if let NodeRef::Leaf(l) = &new_leaf.node {
            l.borrow_mut().entries = right;
        }
        Ok(new_leaf)
    }

    /// Take a full target `node` and a `new_child` to be added
    /// and create and return a new sibling node,
    /// spreading the old children plus `new_child` over both nodes
    fn split_internal(&mut self, node: &IdRef<V>, new_child: IdRef<V>) -> Result<IdRef<V>> {
        let NodeRef::Internal(inode) = &node.node else {
            whatever!("node {} is not an internal node", node.id);
        };
        let new_child_key = self.node_key(&new_child.node)?;
        let mut children = std::mem::take(&mut inode.borrow_mut().entries);
        children.push(ChildEntry(new_child_key, new_child.id));
        let boxes: Vec<Box2D> = children.iter().map(|c| c.0).collect();
        let split = self.choose_split(&boxes)?;
        let (left, right) = split.partition(children);
        for ChildEntry(_, id) in left.iter() {
            self.manager.get(*id).set_parent(node.id);
        }
        inode.borrow_mut().entries = left;
        let sibling = self.manager.fresh_internal();
        for ChildEntry(_, id) in right.iter() {
            self.manager.get(*id).set_parent(sibling.id);
        }
        if let NodeRef::Internal(s) = &sibling.node {
            s.borrow_mut().entries = right;
        }
        Ok(sibling)
    }
}

pub type NodeId = usize;

pub struct IdRef<V> {
    pub(crate) id: NodeId,
    pub(crate) node: NodeRef<V>,
}

impl<V> IdRef<V> {
    fn get_parent(&self) -> Option<NodeId> {
        self.node.get_parent()
    }
}

impl<V> Clone for IdRef<V> {
    fn clone(&self) -> Self {
        IdRef {
            id: self.id,
            node: self.node.clone(),
        }
    }
}

#[derive(Debug)]
pub enum NodeRef<V> {
    Internal(Rc<RefCell<InternalNode>>),
    Leaf(Rc<RefCell<Leaf<V>>>),
}

impl<V> NodeRef<V> {
    pub(super) fn with_id(self, id: NodeId) -> IdRef<V> {
        IdRef { id, node: self }
    }

    pub(super) fn len(&self) -> usize {
        match self {
            NodeRef::Internal(n) => n.borrow().entries.len(),
            NodeRef::Leaf(l) => l.borrow().entries.len(),
        }
    }

    pub(super) fn get_parent(&self) -> Option<NodeId> {
        match self {
            NodeRef::Internal(n) => n.borrow().parent,
            NodeRef::Leaf(l) => l.borrow().parent,
        }
    }

    pub(super) fn set_parent(&self, parent_id: NodeId) {
        match self {
            NodeRef::Internal(n) => n.borrow_mut().parent = Some(parent_id),
            NodeRef::Leaf(l) => l.borrow_mut().parent = Some(parent_id),
        }
    }

    fn entry_boxes(&self) -> Vec<Box2D> {
        match self {
            NodeRef::Internal(n) => n.borrow().entries.iter().map(|c| c.0).collect(),
            NodeRef::Leaf(l) => l.borrow().entries.iter().map(|e| e.key).collect(),
        }
    }
}

impl<V> Clone for NodeRef<V> {
    fn clone(&self) -> Self {
        match self {
            NodeRef::Internal(n) => NodeRef::Internal(n.clone()),
            NodeRef::Leaf(l) => NodeRef::Leaf(l.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub(super) struct LeafEntry<V> {
    pub(super) key: Box2D,
    pub(super) value: V,
}

#[derive(Debug)]
pub struct Leaf<V> {
    parent: Option<NodeId>,
    entries: Vec<LeafEntry<V>>,
}

impl<V> Leaf<V> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Leaf {
            parent: None,
            entries: Vec::with_capacity(capacity),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(super) struct ChildEntry(pub(super) Box2D, pub(super) NodeId);

#[derive(Debug)]
pub struct InternalNode {
    parent: Option<NodeId>,
    entries: Vec<ChildEntry>,
}

impl InternalNode {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        InternalNode {
            parent: None,
            entries: Vec::with_capacity(capacity),
        }
    }

    fn update_bounding_box(&mut self, at_node_id: NodeId, new_bounding_box: Box2D) -> Result<()> {
        for ChildEntry(bbox, id) in self.entries.iter_mut() {
            if *id == at_node_id {
                *bbox = new_bounding_box;
                return Ok(());
            }
        }
        whatever!(
            "No entry matched node id={}, got entries for {:?}",
            at_node_id,
            self.entries.iter().map(|entry| entry.1).collect::<Vec<NodeId>>()
        )
    }

    /// The child needing the least enlargement to cover `key`,
    /// preferring the smaller child on ties.
    fn best_fit(&self, key: &Box2D) -> Option<NodeId> {
        let mut entries = self.entries.iter();
        let mut current = entries.next()?;
        let mut current_enlargement = penalty(&current.0, key);
        for entry in entries {
            let entry_enlargement = penalty(&entry.0, key);
            match current_enlargement.partial_cmp(&entry_enlargement) {
                Some(Ordering::Less) | None => continue,
                Some(Ordering::Equal) => {
                    if current.0.area() > entry.0.area() {
                        current = entry;
                        current_enlargement = entry_enlargement;
                    }
                }
                Some(Ordering::Greater) => {
                    current = entry;
                    current_enlargement = entry_enlargement;
                }
            }
        }
        Some(current.1)
    }
}
