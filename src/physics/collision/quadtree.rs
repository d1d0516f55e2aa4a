//! A quadtree spatial index for finding possibly overlapping bodies.
//!
//! Nodes are stored in a flat list and address their children by index.
//! A node does not store its own bounding box; it is recomputed from the root
//! bounds and the quadrants taken on the way down.

use super::AABB;
use crate::math::Vec2;

/// Parameters for the creation of a quadtree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct QuadTreeParams {
    /// How many levels can exist below the root.
    pub max_depth: usize,
    /// A leaf splits when it holds more than this many entries.
    pub split_threshold: usize,
}

impl Default for QuadTreeParams {
    fn default() -> Self {
        Self {
            max_depth: 4,
            split_threshold: 8,
        }
    }
}

/// One quarter of a node. Top means smaller y.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quadrant {
    TopLeft = 0,
    TopRight = 1,
    BottomLeft = 2,
    BottomRight = 3,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::TopLeft,
        Quadrant::TopRight,
        Quadrant::BottomLeft,
        Quadrant::BottomRight,
    ];

    fn from_sides(left: bool, top: bool) -> Self {
        match (left, top) {
            (true, true) => Quadrant::TopLeft,
            (false, true) => Quadrant::TopRight,
            (true, false) => Quadrant::BottomLeft,
            (false, false) => Quadrant::BottomRight,
        }
    }

    /// The bounds of this quadrant within a parent node's bounds.
    pub fn bounds_within(self, parent: &AABB) -> AABB {
        let quarter = parent.half_extents / 2.0;
        let offset = match self {
            Quadrant::TopLeft => Vec2::new(-quarter.x, -quarter.y),
            Quadrant::TopRight => Vec2::new(quarter.x, -quarter.y),
            Quadrant::BottomLeft => Vec2::new(-quarter.x, quarter.y),
            Quadrant::BottomRight => Vec2::new(quarter.x, quarter.y),
        };
        AABB::new(parent.center + offset, quarter)
    }

    /// The single quadrant a box fits in entirely, if any.
    /// A box touching or crossing a midpoint line fits in none.
    pub fn fitting(node_bounds: &AABB, aabb: &AABB) -> Option<Quadrant> {
        let mid = node_bounds.center;
        let left = aabb.right() < mid.x;
        let right = aabb.left() > mid.x;
        let top = aabb.bottom() < mid.y;
        let bottom = aabb.top() > mid.y;
        if (left || right) && (top || bottom) {
            Some(Quadrant::from_sides(left, top))
        } else {
            None
        }
    }

    /// Every quadrant a query box may reach into.
    ///
    /// This is deliberately broader than [`fitting`][Self::fitting]:
    /// a box is stored in at most one quadrant but can overlap up to four.
    pub fn reached(node_bounds: &AABB, aabb: &AABB) -> impl Iterator<Item = Quadrant> {
        let mid = node_bounds.center;
        let reaches_left = aabb.left() < mid.x;
        let reaches_right = aabb.right() > mid.x;
        let reaches_top = aabb.top() < mid.y;
        let reaches_bottom = aabb.bottom() > mid.y;
        Quadrant::ALL.into_iter().filter(move |q| {
            let horizontal = match q {
                Quadrant::TopLeft | Quadrant::BottomLeft => reaches_left,
                Quadrant::TopRight | Quadrant::BottomRight => reaches_right,
            };
            let vertical = match q {
                Quadrant::TopLeft | Quadrant::TopRight => reaches_top,
                Quadrant::BottomLeft | Quadrant::BottomRight => reaches_bottom,
            };
            horizontal && vertical
        })
    }
}

#[derive(Clone, Copy, Debug)]
struct Entry<T> {
    item: T,
    // the box the item was inserted with, used to find it again on removal
    aabb: AABB,
}

#[derive(Clone, Debug)]
struct Node<T> {
    depth: usize,
    children: Option<[usize; 4]>,
    entries: Vec<Entry<T>>,
}

impl<T> Node<T> {
    fn new(depth: usize) -> Self {
        Node {
            depth,
            children: None,
            entries: Vec::new(),
        }
    }
}

/// Debug information about a single node of the tree.
#[derive(Clone, Copy, Debug)]
pub struct NodeInfo {
    pub bounds: AABB,
    pub depth: usize,
    pub item_count: usize,
    pub is_leaf: bool,
}

/// Stores items by bounding box and answers "what might overlap this box".
///
/// Items are identified by equality of `T`, which is meant to be a handle
/// such as a [`BodyKey`][crate::physics::BodyKey]: two different bodies with
/// identical geometry are still different items.
/// Inserting the same item twice is not checked and yields it twice in queries.
#[derive(Clone, Debug)]
pub struct QuadTree<T> {
    bounds: AABB,
    params: QuadTreeParams,
    nodes: Vec<Node<T>>,
    len: usize,
}

impl<T: Copy + PartialEq> QuadTree<T> {
    pub fn new(bounds: AABB, params: QuadTreeParams) -> Self {
        QuadTree {
            bounds,
            params,
            nodes: vec![Node::new(0)],
            len: 0,
        }
    }

    #[inline]
    pub fn bounds(&self) -> AABB {
        self.bounds
    }

    #[inline]
    pub fn params(&self) -> QuadTreeParams {
        self.params
    }

    /// Number of stored items.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Remove every item and collapse the tree back to a single leaf.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.nodes.push(Node::new(0));
        self.len = 0;
    }

    /// Change the root bounds and rebuild the tree from scratch.
    pub fn resize(&mut self, bounds: AABB, items: impl IntoIterator<Item = (T, AABB)>) {
        self.clear();
        self.bounds = bounds;
        for (item, aabb) in items {
            self.insert(item, aabb);
        }
    }

    pub fn insert(&mut self, item: T, aabb: AABB) {
        let (node_idx, bounds) = self.descend(&aabb);
        self.nodes[node_idx].entries.push(Entry { item, aabb });
        self.len += 1;

        let node = &self.nodes[node_idx];
        if node.children.is_none()
            && node.entries.len() > self.params.split_threshold
            && node.depth < self.params.max_depth
        {
            self.split(node_idx, bounds);
        }
    }

    /// Remove an item that was inserted with the given box.
    /// Returns false if it wasn't found.
    pub fn remove(&mut self, item: T, aabb: &AABB) -> bool {
        let (node_idx, _) = self.descend(aabb);
        let entries = &mut self.nodes[node_idx].entries;
        match entries.iter().position(|e| e.item == item) {
            Some(pos) => {
                entries.remove(pos);
                self.len -= 1;
                true
            }
            None => false,
        }
    }

    /// Check whether an item inserted with the given box is in the tree.
    pub fn contains(&self, item: T, aabb: &AABB) -> bool {
        let (node_idx, _) = self.descend(aabb);
        self.nodes[node_idx].entries.iter().any(|e| e.item == item)
    }

    /// Get every item whose box might overlap the given box.
    ///
    /// The result is a superset of the actual overlaps.
    /// If the box belongs to an item in the tree, that item is included too.
    pub fn potential_neighbors(&self, aabb: &AABB) -> Vec<T> {
        let mut out = Vec::new();
        self.retrieve_into(aabb, &mut out);
        out
    }

    /// Like [`potential_neighbors`][Self::potential_neighbors]
    /// but appends to an existing buffer.
    pub fn retrieve_into(&self, aabb: &AABB, out: &mut Vec<T>) {
        let mut stack: Vec<(usize, AABB)> = vec![(0, self.bounds)];
        while let Some((node_idx, bounds)) = stack.pop() {
            let node = &self.nodes[node_idx];
            out.extend(node.entries.iter().map(|e| e.item));
            if let Some(children) = node.children {
                for q in Quadrant::reached(&bounds, aabb) {
                    stack.push((children[q as usize], q.bounds_within(&bounds)));
                }
            }
        }
    }

    /// Iterate over every item and the box it was inserted with.
    pub fn entries(&self) -> impl Iterator<Item = (T, AABB)> + '_ {
        self.nodes
            .iter()
            .flat_map(|n| n.entries.iter().map(|e| (e.item, e.aabb)))
    }

    /// Generate a list of nodes for debug drawing.
    pub fn node_infos(&self) -> Vec<NodeInfo> {
        let mut infos = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(usize, AABB)> = vec![(0, self.bounds)];
        while let Some((node_idx, bounds)) = stack.pop() {
            let node = &self.nodes[node_idx];
            infos.push(NodeInfo {
                bounds,
                depth: node.depth,
                item_count: node.entries.len(),
                is_leaf: node.children.is_none(),
            });
            if let Some(children) = node.children {
                for q in Quadrant::ALL.iter().rev() {
                    stack.push((children[*q as usize], q.bounds_within(&bounds)));
                }
            }
        }
        infos
    }

    /// Walk down to the deepest existing node a box fits in entirely,
    /// returning its index and bounds.
    fn descend(&self, aabb: &AABB) -> (usize, AABB) {
        let mut node_idx = 0;
        let mut bounds = self.bounds;
        while let Some(children) = self.nodes[node_idx].children {
            match Quadrant::fitting(&bounds, aabb) {
                Some(q) => {
                    node_idx = children[q as usize];
                    bounds = q.bounds_within(&bounds);
                }
                None => break,
            }
        }
        (node_idx, bounds)
    }

    fn split(&mut self, node_idx: usize, bounds: AABB) {
        let depth = self.nodes[node_idx].depth + 1;
        let first = self.nodes.len();
        self.nodes.extend((0..4).map(|_| Node::new(depth)));
        let children = [first, first + 1, first + 2, first + 3];
        self.nodes[node_idx].children = Some(children);

        let entries = std::mem::take(&mut self.nodes[node_idx].entries);
        for entry in entries {
            match Quadrant::fitting(&bounds, &entry.aabb) {
                Some(q) => self.nodes[children[q as usize]].entries.push(entry),
                None => self.nodes[node_idx].entries.push(entry),
            }
        }
    }
}
