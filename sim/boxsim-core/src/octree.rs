//! Per-sub-step spatial partition.
//!
//! The octree is rebuilt from scratch every sub-step over the bodies' loose
//! bounds. Nodes live in an arena and refer to each other by [`NodeId`];
//! each item records, per depth, every node it was registered in. The
//! deepest such level is what a body uses to find its neighbors.
//!
//! # Example
//!
//! ```
//! use boxsim_core::{Aabb, Octree};
//! use boxsim_types::{BodyHandle, PartitionConfig};
//! use nalgebra::{Point3, Vector3};
//!
//! let items: Vec<_> = (0..3)
//!     .map(|i| {
//!         let center = Point3::new(f64::from(i), 0.0, 0.0);
//!         (BodyHandle::new(i as usize), Aabb::new(center, Vector3::new(0.6, 0.6, 0.6)))
//!     })
//!     .collect();
//!
//! let mut octree = Octree::build(&items, &PartitionConfig::default());
//! assert_eq!(octree.len(), 1);
//!
//! let membership = octree.take_memberships().remove(0);
//! let neighbors = octree.take_neighbors(BodyHandle::new(0), &membership);
//! assert_eq!(neighbors, vec![BodyHandle::new(1), BodyHandle::new(2)]);
//! ```

use boxsim_types::{BodyHandle, PartitionConfig};
use hashbrown::HashSet;
use nalgebra::Point3;
use tracing::trace;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::geometry::Aabb;

/// Index of a node in an [`Octree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeId(pub usize);

impl NodeId {
    /// Get the raw index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// One octree node.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OctreeNode {
    /// Region covered by the node.
    pub bounds: Aabb,
    /// Depth below the root (root is 0).
    pub depth: usize,
    /// Octant index within the parent (bit 0 → -x, bit 1 → -y, bit 2 → -z).
    pub octant: usize,
    /// Either empty or exactly 8 children.
    pub children: Vec<NodeId>,
    /// Items assigned to the node when the tree was built.
    pub items: Vec<BodyHandle>,
}

impl OctreeNode {
    /// Whether the node was not subdivided.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// The nodes an item was registered in, per depth.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PartitionMembership {
    levels: Vec<Vec<NodeId>>,
}

impl PartitionMembership {
    fn register(&mut self, depth: usize, node: NodeId) {
        if self.levels.len() <= depth {
            self.levels.resize_with(depth + 1, Vec::new);
        }
        self.levels[depth].push(node);
    }

    /// Nodes at the deepest level this item reached.
    #[must_use]
    pub fn deepest(&self) -> &[NodeId] {
        self.levels.last().map_or(&[], Vec::as_slice)
    }

    /// Nodes at `depth`, empty if the item never reached it.
    #[must_use]
    pub fn level(&self, depth: usize) -> &[NodeId] {
        self.levels.get(depth).map_or(&[], Vec::as_slice)
    }

    /// Number of depth levels recorded.
    #[must_use]
    pub fn depth_count(&self) -> usize {
        self.levels.len()
    }

    /// Whether no node was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Forget every recorded node.
    pub fn clear(&mut self) {
        self.levels.clear();
    }
}

/// Arena-allocated octree over body bounds.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Octree {
    nodes: Vec<OctreeNode>,
    /// Item lists consumed by neighbor queries; parallel to `nodes`.
    live: Vec<Vec<BodyHandle>>,
    memberships: Vec<PartitionMembership>,
}

impl Octree {
    /// Build and subdivide an octree over `items`.
    ///
    /// The root tightly bounds every item. Item membership lists are indexed
    /// by [`BodyHandle::index`]; handles absent from `items` get an empty
    /// membership.
    #[must_use]
    pub fn build(items: &[(BodyHandle, Aabb)], config: &PartitionConfig) -> Self {
        let bounds = items
            .iter()
            .map(|(_, aabb)| *aabb)
            .reduce(|acc, aabb| acc.union(&aabb))
            .unwrap_or_default();

        let slots = items.iter().map(|(h, _)| h.index() + 1).max().unwrap_or(0);
        let mut tree = Self {
            nodes: vec![OctreeNode {
                bounds,
                depth: 0,
                octant: 0,
                children: Vec::new(),
                items: items.iter().map(|(h, _)| *h).collect(),
            }],
            live: Vec::new(),
            memberships: vec![PartitionMembership::default(); slots],
        };

        let mut lookup = vec![Aabb::default(); slots];
        for (handle, aabb) in items {
            lookup[handle.index()] = *aabb;
        }

        tree.subdivide(NodeId(0), &lookup, config);
        tree.live = tree.nodes.iter().map(|n| n.items.clone()).collect();

        trace!(
            nodes = tree.nodes.len(),
            max_depth = tree.max_depth(),
            items = items.len(),
            "octree built"
        );

        tree
    }

    fn subdivide(&mut self, id: NodeId, lookup: &[Aabb], config: &PartitionConfig) {
        let (bounds, depth, item_count) = {
            let node = &self.nodes[id.0];
            for item in &node.items {
                self.memberships[item.index()].register(node.depth, id);
            }
            (node.bounds, node.depth, node.items.len())
        };

        if item_count <= config.max_leaf_items
            || bounds.half_extents.min() < config.min_half_extent
            || depth >= config.max_depth
        {
            return;
        }

        let child_half = bounds.half_extents * 0.5;
        let mut children = Vec::with_capacity(8);
        for octant in 0..8 {
            let center: Point3<f64> =
                bounds.center + crate::geometry::octant_sign(octant).component_mul(&child_half);
            let child_bounds = Aabb::new(center, child_half);
            let items = self.nodes[id.0]
                .items
                .iter()
                .copied()
                .filter(|h| lookup[h.index()].overlaps(&child_bounds))
                .collect();

            let child = NodeId(self.nodes.len());
            self.nodes.push(OctreeNode {
                bounds: child_bounds,
                depth: depth + 1,
                octant,
                children: Vec::new(),
                items,
            });
            children.push(child);
        }
        self.nodes[id.0].children.clone_from(&children);

        for child in children {
            if self.nodes[child.0].items.len() < item_count {
                self.subdivide(child, lookup, config);
            }
        }
    }

    /// All nodes, root first.
    #[must_use]
    pub fn nodes(&self) -> &[OctreeNode] {
        &self.nodes
    }

    /// The root node.
    #[must_use]
    pub fn root(&self) -> &OctreeNode {
        &self.nodes[0]
    }

    /// Look up a node.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&OctreeNode> {
        self.nodes.get(id.0)
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: there is at least a root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Deepest node depth.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    /// Leaf nodes in arena order.
    pub fn leaves(&self) -> impl Iterator<Item = &OctreeNode> {
        self.nodes.iter().filter(|n| n.is_leaf())
    }

    /// Membership recorded for `item` during the build.
    ///
    /// Empty once [`Octree::take_memberships`] has been called.
    #[must_use]
    pub fn membership(&self, item: BodyHandle) -> Option<&PartitionMembership> {
        self.memberships.get(item.index())
    }

    /// Move every item's membership out of the tree, indexed by handle.
    pub fn take_memberships(&mut self) -> Vec<PartitionMembership> {
        std::mem::take(&mut self.memberships)
    }

    /// Other items sharing any of `item`'s deepest nodes, without duplicates.
    ///
    /// `item` is removed from those nodes afterwards, so a later query by
    /// one of its neighbors does not report it again.
    pub fn take_neighbors(
        &mut self,
        item: BodyHandle,
        membership: &PartitionMembership,
    ) -> Vec<BodyHandle> {
        let mut seen = HashSet::new();
        let mut neighbors = Vec::new();
        for node in membership.deepest() {
            let Some(items) = self.live.get_mut(node.0) else {
                continue;
            };
            for other in items.iter().copied() {
                if other != item && seen.insert(other) {
                    neighbors.push(other);
                }
            }
            items.retain(|h| *h != item);
        }
        neighbors
    }

    /// Items still present in `node` after neighbor queries.
    #[must_use]
    pub fn live_items(&self, node: NodeId) -> &[BodyHandle] {
        self.live.get(node.0).map_or(&[], Vec::as_slice)
    }
}
