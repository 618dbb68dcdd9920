//! Quadtree spatial index over feature envelopes
//!
//! This module provides an adaptive quadtree that answers "which items have an
//! envelope intersecting this rectangle". Each envelope is stored at the deepest
//! node that fully contains it, so a query only descends into nodes overlapping
//! the search window. The query is conservative: it never drops an item whose
//! envelope intersects the window.

use crate::utils;
use geo::{Coord, Rect};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum depth of the quadtree to prevent infinite recursion
const MAX_DEPTH: u32 = 16;

/// Number of entries a leaf holds before it is subdivided
const MAX_ENTRIES_PER_NODE: usize = 8;

/// Relative padding applied to the root bounds so boundary envelopes still fit a child
const ROOT_PADDING_FACTOR: f64 = 0.01;

/// An envelope stored in the quadtree, tagged with the caller's item index
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct IndexedEnvelope {
    /// Caller-defined item index (position of the feature in its layer)
    item: usize,
    /// Axis-aligned envelope of the item
    envelope: Rect<f64>,
}

/// Root container for the envelope index
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Quadtree {
    /// Root node, `None` until the first envelope is inserted
    root: Option<QuadtreeNode>,
    /// Number of indexed envelopes
    len: usize,
}

/// A single node in the quadtree
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct QuadtreeNode {
    /// Bounds covered by this node
    bounding_box: Rect<f64>,
    /// Depth level in the tree (0 = root)
    level: u32,
    /// Envelopes stored at this node (those not fully inside a single child)
    entries: Vec<IndexedEnvelope>,
    /// Child nodes (NW, NE, SW, SE) if subdivided
    children: Option<Box<[QuadtreeNode; 4]>>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Quadtree {
    /// Create a new empty quadtree
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a quadtree from `(item, envelope)` pairs in one pass
    ///
    /// The root is sized to cover every envelope, so no rebuild happens during loading.
    pub fn bulk_load(items: impl IntoIterator<Item = (usize, Rect<f64>)>) -> Self {
        let entries: Vec<IndexedEnvelope> = items
            .into_iter()
            .map(|(item, envelope)| IndexedEnvelope { item, envelope })
            .collect();

        let Some(bounds) = entries
            .iter()
            .map(|entry| entry.envelope)
            .reduce(utils::rect_union)
        else {
            return Self::new();
        };

        Self::from_entries(QuadtreeNode::new_root(bounds, 0.0), entries)
    }

    /// Insert a single envelope
    ///
    /// If the envelope falls outside the current root bounds the tree is rebuilt
    /// under a root at least twice as wide, which keeps every node's bounds fixed
    /// once created and bounds the number of rebuilds for a growing layer.
    pub fn insert(&mut self, item: usize, envelope: Rect<f64>) {
        let entry = IndexedEnvelope { item, envelope };

        match self.bounding_box() {
            Some(bounds) if utils::rect_contains(bounds, envelope) => {
                if let Some(root) = self.root.as_mut() {
                    root.insert(entry);
                    self.len += 1;
                }
            }
            Some(bounds) => {
                let mut entries = self.entries();
                entries.push(entry);
                tracing::trace!(
                    "Rebuilding envelope index to cover {} entries",
                    entries.len()
                );
                let root = QuadtreeNode::new_root(
                    utils::rect_union(bounds, envelope),
                    bounds.width().max(bounds.height()),
                );
                *self = Self::from_entries(root, entries);
            }
            None => {
                *self = Self::from_entries(QuadtreeNode::new_root(envelope, 0.0), vec![entry]);
            }
        }
    }

    /// Query for items whose envelope intersects `window`
    ///
    /// Item indices are returned in ascending order so callers see candidates
    /// in layer order regardless of tree shape.
    pub fn query(&self, window: Rect<f64>) -> Vec<usize> {
        let mut results = Vec::new();
        if let Some(root) = &self.root {
            root.query_entries(window, &mut results);
        }
        results.sort_unstable();
        results
    }

    /// Number of indexed envelopes
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the index is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bounds covered by the root node, `None` when empty
    #[inline]
    pub fn bounding_box(&self) -> Option<Rect<f64>> {
        self.root.as_ref().map(|root| root.bounding_box)
    }

    /// Depth of the deepest node (0 for a single root)
    pub fn depth(&self) -> u32 {
        self.root.as_ref().map_or(0, QuadtreeNode::max_level)
    }

    /// Fill `root` with `entries`, all of which must fit inside its bounds
    fn from_entries(mut root: QuadtreeNode, entries: Vec<IndexedEnvelope>) -> Self {
        let len = entries.len();
        for entry in entries {
            root.insert(entry);
        }

        Self {
            root: Some(root),
            len,
        }
    }

    /// Collect every stored entry
    fn entries(&self) -> Vec<IndexedEnvelope> {
        let mut entries = Vec::with_capacity(self.len);
        if let Some(root) = &self.root {
            root.collect_entries(&mut entries);
        }
        entries
    }
}

impl QuadtreeNode {
    /// Create a square root node covering `bounds` with a small margin
    ///
    /// The half side is never smaller than `min_half_side`.
    fn new_root(bounds: Rect<f64>, min_half_side: f64) -> Self {
        let center = bounds.center();
        let half_side = bounds.width().max(bounds.height()) / 2.0;
        // Degenerate bounds (a point or an axis-aligned line) still need a non-zero area
        let half_side = (half_side * (1.0 + ROOT_PADDING_FACTOR) + 1.0).max(min_half_side);

        let bounding_box = Rect::new(
            Coord {
                x: center.x - half_side,
                y: center.y - half_side,
            },
            Coord {
                x: center.x + half_side,
                y: center.y + half_side,
            },
        );

        Self::new_child(bounding_box, 0)
    }

    /// Create a child node with the given bounding box and level
    fn new_child(bounding_box: Rect<f64>, level: u32) -> Self {
        Self {
            bounding_box,
            level,
            entries: Vec::new(),
            children: None,
        }
    }

    /// Subdivide this node into 4 children
    fn subdivide(&mut self) {
        if self.children.is_some() {
            return; // Already subdivided
        }

        let min = self.bounding_box.min();
        let max = self.bounding_box.max();
        let mid_x = (min.x + max.x) / 2.0;
        let mid_y = (min.y + max.y) / 2.0;

        let child_level = self.level + 1;

        // Create 4 children: NW, NE, SW, SE
        let nw = QuadtreeNode::new_child(
            Rect::new(Coord { x: min.x, y: mid_y }, Coord { x: mid_x, y: max.y }),
            child_level,
        );
        let ne = QuadtreeNode::new_child(
            Rect::new(Coord { x: mid_x, y: mid_y }, Coord { x: max.x, y: max.y }),
            child_level,
        );
        let sw = QuadtreeNode::new_child(
            Rect::new(Coord { x: min.x, y: min.y }, Coord { x: mid_x, y: mid_y }),
            child_level,
        );
        let se = QuadtreeNode::new_child(
            Rect::new(Coord { x: mid_x, y: min.y }, Coord { x: max.x, y: mid_y }),
            child_level,
        );

        self.children = Some(Box::new([nw, ne, sw, se]));
    }

    /// Insert an entry at the deepest node that fully contains its envelope
    fn insert(&mut self, entry: IndexedEnvelope) {
        if let Some(children) = &mut self.children {
            if let Some(child) = children
                .iter_mut()
                .find(|child| utils::rect_contains(child.bounding_box, entry.envelope))
            {
                child.insert(entry);
                return;
            }
            self.entries.push(entry);
            return;
        }

        self.entries.push(entry);

        if self.entries.len() > MAX_ENTRIES_PER_NODE && self.level < MAX_DEPTH {
            self.subdivide();
            // Push entries down where they fit a single child; the rest stay here
            for entry in std::mem::take(&mut self.entries) {
                self.insert(entry);
            }
        }
    }

    /// Query this node and its children for entries intersecting the window
    fn query_entries(&self, window: Rect<f64>, results: &mut Vec<usize>) {
        // Every entry below this node lies inside its bounds
        if !utils::rects_intersect(self.bounding_box, window) {
            return;
        }

        for entry in &self.entries {
            if utils::rects_intersect(entry.envelope, window) {
                results.push(entry.item);
            }
        }

        if let Some(children) = &self.children {
            for child in children.iter() {
                child.query_entries(window, results);
            }
        }
    }

    fn collect_entries(&self, out: &mut Vec<IndexedEnvelope>) {
        out.extend_from_slice(&self.entries);
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.collect_entries(out);
            }
        }
    }

    fn max_level(&self) -> u32 {
        self.children
            .as_ref()
            .and_then(|children| children.iter().map(QuadtreeNode::max_level).max())
            .unwrap_or(self.level)
    }
}
