//! Bounding Volume Hierarchy over merged triangles.
//!
//! The tree is stored flattened in depth-first order: an inner node's left
//! child immediately follows it and its right child is stored by index.
//! Children therefore always sit after their parent, which lets `refit`
//! recompute bounds with a single reverse sweep.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lux_math::{Aabb, Vec3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{EncodeError, EncodeResult};
use crate::progress::Progress;

/// Number of buckets evaluated per axis by the SAH split.
const SAH_BINS: usize = 32;

/// Relative cost of visiting an inner node vs. intersecting a triangle.
const TRAVERSAL_COST: f32 = 1.25;
const TRIANGLE_INTERSECT_COST: f32 = 1.0;

/// How a node's triangles are partitioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitStrategy {
    /// Split the longest centroid axis at its midpoint.
    Center,
    /// Split the longest centroid axis at the mean centroid.
    Average,
    /// Binned surface area heuristic.
    Sah,
}

/// BVH construction options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BvhOptions {
    pub strategy: SplitStrategy,
    /// Nodes at this depth become leaves regardless of size
    pub max_depth: u32,
    /// Nodes with at most this many triangles become leaves
    pub max_leaf_size: u32,
    /// Compute whole-scene bounds on the merged geometry
    pub set_bounding_box: bool,
    /// Store nodes in an `Arc` so other threads can read them without copying
    pub shared_buffer: bool,
}

impl Default for BvhOptions {
    fn default() -> Self {
        Self {
            strategy: SplitStrategy::Sah,
            max_depth: 40,
            max_leaf_size: 10,
            set_bounding_box: true,
            shared_buffer: false,
        }
    }
}

/// Leaf or inner payload of a flattened node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BvhNodeKind {
    /// `count` triangles starting at `offset` in [`Bvh::primitives`].
    Leaf { offset: u32, count: u32 },
    /// Left child is the next node; `right` is the right child's index.
    Inner { right: u32, axis: u8 },
}

/// A flattened BVH node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BvhNode {
    pub bounds: Aabb,
    pub kind: BvhNodeKind,
}

#[derive(Debug, Clone)]
enum NodeStorage {
    Owned(Vec<BvhNode>),
    Shared(Arc<[BvhNode]>),
}

impl NodeStorage {
    fn new(nodes: Vec<BvhNode>, shared: bool) -> Self {
        if shared {
            NodeStorage::Shared(nodes.into())
        } else {
            NodeStorage::Owned(nodes)
        }
    }

    fn as_slice(&self) -> &[BvhNode] {
        match self {
            NodeStorage::Owned(nodes) => nodes,
            NodeStorage::Shared(nodes) => nodes,
        }
    }
}

/// A BVH over an indexed triangle list.
#[derive(Debug, Clone)]
pub struct Bvh {
    nodes: NodeStorage,
    /// Triangle indices in leaf order
    primitives: Vec<u32>,
    options: BvhOptions,
}

/// Per-build scratch state.
struct Builder<'a, 'p> {
    triangle_bounds: &'a [Aabb],
    centroids: &'a [Vec3],
    options: BvhOptions,
    nodes: Vec<BvhNode>,
    finished: usize,
    total: usize,
    progress: &'a mut Progress<'p>,
    cancel: &'a AtomicBool,
}

impl Bvh {
    /// Build a BVH over `indices` (three per triangle) into `positions`.
    pub fn build(positions: &[Vec3], indices: &[u32], options: BvhOptions) -> Self {
        let cancel = AtomicBool::new(false);
        let mut progress = Progress::new(None);
        // Only cancellation can fail and nothing cancels this build
        Self::build_with(positions, indices, options, &mut progress, &cancel)
            .unwrap_or_else(|_| Self::empty(options))
    }

    /// Build with progress reporting and cooperative cancellation.
    pub(crate) fn build_with(
        positions: &[Vec3],
        indices: &[u32],
        options: BvhOptions,
        progress: &mut Progress<'_>,
        cancel: &AtomicBool,
    ) -> EncodeResult<Self> {
        let triangle_bounds = triangle_bounds(positions, indices);
        let total = triangle_bounds.len();
        if total == 0 {
            return Ok(Self::empty(options));
        }
        let centroids: Vec<Vec3> = triangle_bounds.iter().map(Aabb::centroid).collect();
        let mut primitives: Vec<u32> = (0..total as u32).collect();

        let mut builder = Builder {
            triangle_bounds: &triangle_bounds,
            centroids: &centroids,
            options,
            nodes: Vec::with_capacity(2 * total / options.max_leaf_size.max(1) as usize + 1),
            finished: 0,
            total,
            progress,
            cancel,
        };
        builder.build_node(&mut primitives, 0, 0)?;

        log::debug!(
            "Built BVH: {} triangles, {} nodes ({:?})",
            total,
            builder.nodes.len(),
            options.strategy
        );

        Ok(Self {
            nodes: NodeStorage::new(builder.nodes, options.shared_buffer),
            primitives,
            options,
        })
    }

    fn empty(options: BvhOptions) -> Self {
        Self {
            nodes: NodeStorage::new(Vec::new(), options.shared_buffer),
            primitives: Vec::new(),
            options,
        }
    }

    /// Recompute every node's bounds from the current positions.
    ///
    /// Topology is untouched: `indices` must describe the same triangles
    /// (count and connectivity) the tree was built over.
    pub fn refit(&mut self, positions: &[Vec3], indices: &[u32]) {
        let triangle_bounds = triangle_bounds(positions, indices);
        if triangle_bounds.len() != self.primitives.len() {
            log::warn!(
                "Refitting a BVH built over {} triangles with {} triangles; call reset() after topology changes",
                self.primitives.len(),
                triangle_bounds.len()
            );
        }

        let mut nodes = match std::mem::replace(&mut self.nodes, NodeStorage::Owned(Vec::new())) {
            NodeStorage::Owned(nodes) => nodes,
            NodeStorage::Shared(nodes) => nodes.to_vec(),
        };

        for i in (0..nodes.len()).rev() {
            nodes[i].bounds = match nodes[i].kind {
                BvhNodeKind::Leaf { offset, count } => self.primitives
                    [offset as usize..(offset + count) as usize]
                    .iter()
                    .filter_map(|&p| triangle_bounds.get(p as usize))
                    .fold(Aabb::EMPTY, |acc, b| Aabb::surrounding(&acc, b)),
                BvhNodeKind::Inner { right, .. } => {
                    Aabb::surrounding(&nodes[i + 1].bounds, &nodes[right as usize].bounds)
                }
            };
        }

        self.nodes = NodeStorage::new(nodes, self.options.shared_buffer);
    }

    /// Flattened nodes in depth-first order.
    pub fn nodes(&self) -> &[BvhNode] {
        self.nodes.as_slice()
    }

    /// The node array as a cheaply clonable shared buffer, when built with
    /// `shared_buffer`.
    pub fn shared_nodes(&self) -> Option<Arc<[BvhNode]>> {
        match &self.nodes {
            NodeStorage::Shared(nodes) => Some(nodes.clone()),
            NodeStorage::Owned(_) => None,
        }
    }

    /// Triangle indices in leaf order.
    pub fn primitives(&self) -> &[u32] {
        &self.primitives
    }

    /// Number of triangles the tree was built over.
    pub fn primitive_count(&self) -> usize {
        self.primitives.len()
    }

    /// Root bounds (empty for an empty tree).
    pub fn bounds(&self) -> Aabb {
        self.nodes().first().map(|n| n.bounds).unwrap_or(Aabb::EMPTY)
    }

    pub fn options(&self) -> BvhOptions {
        self.options
    }

    /// Depth of the deepest leaf (root = 0).
    pub fn depth(&self) -> u32 {
        fn walk(nodes: &[BvhNode], index: usize) -> u32 {
            match nodes[index].kind {
                BvhNodeKind::Leaf { .. } => 0,
                BvhNodeKind::Inner { right, .. } => {
                    1 + walk(nodes, index + 1).max(walk(nodes, right as usize))
                }
            }
        }
        if self.nodes().is_empty() {
            0
        } else {
            walk(self.nodes(), 0)
        }
    }
}

impl Builder<'_, '_> {
    /// Build the subtree over `primitives` and return its node index.
    fn build_node(&mut self, primitives: &mut [u32], offset: usize, depth: u32) -> EncodeResult<u32> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(EncodeError::Cancelled);
        }

        let bounds = primitives
            .iter()
            .fold(Aabb::EMPTY, |acc, &p| Aabb::surrounding(&acc, &self.triangle_bounds[p as usize]));
        let index = self.nodes.len();
        let count = primitives.len();

        let split = if count <= self.options.max_leaf_size as usize || depth >= self.options.max_depth {
            None
        } else {
            self.choose_split(primitives, &bounds)
        };

        let Some((axis, position)) = split else {
            self.nodes.push(BvhNode {
                bounds,
                kind: BvhNodeKind::Leaf {
                    offset: offset as u32,
                    count: count as u32,
                },
            });
            self.finished += count;
            self.progress.report(self.finished as f32 / self.total as f32);
            return Ok(index as u32);
        };

        let mid = self.partition(primitives, axis, position);

        // Placeholder until the right child's index is known
        self.nodes.push(BvhNode {
            bounds,
            kind: BvhNodeKind::Inner {
                right: 0,
                axis: axis as u8,
            },
        });

        let (left, right) = primitives.split_at_mut(mid);
        self.build_node(left, offset, depth + 1)?;
        let right_index = self.build_node(right, offset + mid, depth + 1)?;
        self.nodes[index].kind = BvhNodeKind::Inner {
            right: right_index,
            axis: axis as u8,
        };
        Ok(index as u32)
    }

    /// Pick a split axis and position, or `None` to make a leaf.
    fn choose_split(&self, primitives: &[u32], bounds: &Aabb) -> Option<(usize, f32)> {
        let centroid_bounds = primitives.iter().fold(Aabb::EMPTY, |acc, &p| {
            acc.include_point(self.centroids[p as usize])
        });
        let axis = centroid_bounds.longest_axis();
        let extent = centroid_bounds.axis_interval(axis);

        match self.options.strategy {
            SplitStrategy::Center => Some((axis, extent.center())),
            SplitStrategy::Average => {
                let sum: f32 = primitives
                    .iter()
                    .map(|&p| self.centroids[p as usize][axis])
                    .sum();
                Some((axis, sum / primitives.len() as f32))
            }
            SplitStrategy::Sah => self.sah_split(primitives, bounds, &centroid_bounds),
        }
    }

    fn sah_split(&self, primitives: &[u32], bounds: &Aabb, centroid_bounds: &Aabb) -> Option<(usize, f32)> {
        let parent_area = bounds.surface_area();
        if parent_area <= 0.0 {
            return None;
        }
        let leaf_cost = TRIANGLE_INTERSECT_COST * primitives.len() as f32;
        let mut best: Option<(usize, f32, f32)> = None;

        for axis in 0..3 {
            let extent = centroid_bounds.axis_interval(axis);
            if extent.size() <= 0.0 {
                continue;
            }
            let scale = SAH_BINS as f32 / extent.size();

            let mut bins = [(Aabb::EMPTY, 0usize); SAH_BINS];
            for &p in primitives {
                let c = self.centroids[p as usize][axis];
                let bin = (((c - extent.min) * scale) as usize).min(SAH_BINS - 1);
                bins[bin].0 = Aabb::surrounding(&bins[bin].0, &self.triangle_bounds[p as usize]);
                bins[bin].1 += 1;
            }

            // Sweep from the right so each split sees its right-hand area/count
            let mut right_area = [0.0f32; SAH_BINS];
            let mut right_count = [0usize; SAH_BINS];
            let mut acc = (Aabb::EMPTY, 0usize);
            for i in (1..SAH_BINS).rev() {
                acc.0 = Aabb::surrounding(&acc.0, &bins[i].0);
                acc.1 += bins[i].1;
                right_area[i] = acc.0.surface_area();
                right_count[i] = acc.1;
            }

            let mut left = (Aabb::EMPTY, 0usize);
            for i in 1..SAH_BINS {
                left.0 = Aabb::surrounding(&left.0, &bins[i - 1].0);
                left.1 += bins[i - 1].1;
                if left.1 == 0 || right_count[i] == 0 {
                    continue;
                }
                let cost = TRAVERSAL_COST
                    + TRIANGLE_INTERSECT_COST
                        * (left.0.surface_area() * left.1 as f32 + right_area[i] * right_count[i] as f32)
                        / parent_area;
                if best.map_or(true, |(_, _, best_cost)| cost < best_cost) {
                    let position = extent.min + i as f32 / scale;
                    best = Some((axis, position, cost));
                }
            }
        }

        best.filter(|&(_, _, cost)| cost < leaf_cost)
            .map(|(axis, position, _)| (axis, position))
    }

    /// Partition by centroid; falls back to a median split when one side
    /// would be empty.
    fn partition(&self, primitives: &mut [u32], axis: usize, position: f32) -> usize {
        let mut mid = 0;
        for i in 0..primitives.len() {
            if self.centroids[primitives[i] as usize][axis] < position {
                primitives.swap(i, mid);
                mid += 1;
            }
        }

        if mid == 0 || mid == primitives.len() {
            primitives.sort_unstable_by(|&a, &b| {
                self.centroids[a as usize][axis]
                    .partial_cmp(&self.centroids[b as usize][axis])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            mid = primitives.len() / 2;
        }
        mid
    }
}

/// Bounds of every complete triangle in `indices`.
fn triangle_bounds(positions: &[Vec3], indices: &[u32]) -> Vec<Aabb> {
    indices
        .par_chunks_exact(3)
        .map(|tri| {
            let vertex = |i: u32| positions.get(i as usize).copied().unwrap_or(Vec3::ZERO);
            Aabb::from_triangle(vertex(tri[0]), vertex(tri[1]), vertex(tri[2]))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A row of `n` unit triangles spaced along X.
    fn triangle_row(n: usize) -> (Vec<Vec3>, Vec<u32>) {
        let mut positions = Vec::new();
        let mut indices = Vec::new();
        for i in 0..n {
            let x = i as f32 * 2.0;
            let base = positions.len() as u32;
            positions.push(Vec3::new(x, 0.0, 0.0));
            positions.push(Vec3::new(x + 1.0, 0.0, 0.0));
            positions.push(Vec3::new(x, 1.0, 0.0));
            indices.extend_from_slice(&[base, base + 1, base + 2]);
        }
        (positions, indices)
    }

    fn assert_valid(bvh: &Bvh, triangle_count: usize) {
        let mut seen: Vec<u32> = bvh.primitives().to_vec();
        seen.sort_unstable();
        assert_eq!(seen, (0..triangle_count as u32).collect::<Vec<_>>());

        let nodes = bvh.nodes();
        for (i, node) in nodes.iter().enumerate() {
            if let BvhNodeKind::Inner { right, .. } = node.kind {
                assert!(right as usize > i + 1);
                let left = &nodes[i + 1];
                let right = &nodes[right as usize];
                assert_eq!(Aabb::surrounding(&left.bounds, &right.bounds), node.bounds);
            }
        }
    }

    #[test]
    fn test_bvh_empty() {
        let bvh = Bvh::build(&[], &[], BvhOptions::default());
        assert!(bvh.nodes().is_empty());
        assert_eq!(bvh.primitive_count(), 0);
        assert_eq!(bvh.bounds(), Aabb::EMPTY);
    }

    #[test]
    fn test_small_input_is_single_leaf() {
        let (positions, indices) = triangle_row(3);
        let bvh = Bvh::build(&positions, &indices, BvhOptions::default());
        assert_eq!(bvh.nodes().len(), 1);
        assert!(matches!(bvh.nodes()[0].kind, BvhNodeKind::Leaf { offset: 0, count: 3 }));
        assert_eq!(bvh.bounds().max(), Vec3::new(5.0, 1.0, 0.0));
    }

    #[test]
    fn test_every_strategy_produces_valid_tree() {
        let (positions, indices) = triangle_row(100);
        for strategy in [SplitStrategy::Center, SplitStrategy::Average, SplitStrategy::Sah] {
            let options = BvhOptions {
                strategy,
                max_leaf_size: 4,
                ..Default::default()
            };
            let bvh = Bvh::build(&positions, &indices, options);
            assert_valid(&bvh, 100);
            assert!(bvh.nodes().len() > 1, "{strategy:?} did not split");
            for node in bvh.nodes() {
                if let BvhNodeKind::Leaf { count, .. } = node.kind {
                    assert!(count <= 4);
                }
            }
        }
    }

    #[test]
    fn test_max_depth_is_respected() {
        let (positions, indices) = triangle_row(64);
        let options = BvhOptions {
            strategy: SplitStrategy::Center,
            max_depth: 2,
            max_leaf_size: 1,
            ..Default::default()
        };
        let bvh = Bvh::build(&positions, &indices, options);
        assert_eq!(bvh.depth(), 2);
        assert_valid(&bvh, 64);
    }

    #[test]
    fn test_coincident_triangles_still_split() {
        // Identical centroids defeat the positional split; the median fallback must kick in
        let positions = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
        let indices: Vec<u32> = std::iter::repeat([0, 1, 2]).take(20).flatten().collect();
        let options = BvhOptions {
            strategy: SplitStrategy::Center,
            max_leaf_size: 4,
            ..Default::default()
        };
        let bvh = Bvh::build(&positions, &indices, options);
        assert_valid(&bvh, 20);
    }

    #[test]
    fn test_refit_matches_rebuild_after_translation() {
        let (mut positions, indices) = triangle_row(50);
        let options = BvhOptions {
            max_leaf_size: 2,
            ..Default::default()
        };
        let mut bvh = Bvh::build(&positions, &indices, options);
        let topology: Vec<_> = bvh.nodes().iter().map(|n| n.kind).collect();

        for p in &mut positions {
            *p += Vec3::new(0.0, 3.0, -1.0);
        }
        bvh.refit(&positions, &indices);
        let rebuilt = Bvh::build(&positions, &indices, options);

        let refit_topology: Vec<_> = bvh.nodes().iter().map(|n| n.kind).collect();
        assert_eq!(topology, refit_topology);
        assert!(bvh.bounds().abs_diff_eq(&rebuilt.bounds(), 1e-5));
        assert_eq!(bvh.bounds().min(), Vec3::new(0.0, 3.0, -1.0));
        assert_valid(&bvh, 50);
    }

    #[test]
    fn test_shared_buffer_survives_refit() {
        let (positions, indices) = triangle_row(20);
        let options = BvhOptions {
            shared_buffer: true,
            max_leaf_size: 2,
            ..Default::default()
        };
        let mut bvh = Bvh::build(&positions, &indices, options);
        let before = bvh.shared_nodes().expect("shared storage");
        assert_eq!(before.len(), bvh.nodes().len());

        bvh.refit(&positions, &indices);
        assert!(bvh.shared_nodes().is_some());

        let owned = Bvh::build(&positions, &indices, BvhOptions::default());
        assert!(owned.shared_nodes().is_none());
    }

    #[test]
    fn test_cancelled_build() {
        let (positions, indices) = triangle_row(10);
        let cancel = AtomicBool::new(true);
        let mut progress = Progress::new(None);
        let result = Bvh::build_with(&positions, &indices, BvhOptions::default(), &mut progress, &cancel);
        assert!(matches!(result, Err(EncodeError::Cancelled)));
    }

    #[test]
    fn test_options_from_json() {
        let options: BvhOptions = serde_json::from_str(r#"{ "strategy": "center", "max_depth": 8 }"#).unwrap();
        assert_eq!(options.strategy, SplitStrategy::Center);
        assert_eq!(options.max_depth, 8);
        assert_eq!(options.max_leaf_size, 10);
    }
}
