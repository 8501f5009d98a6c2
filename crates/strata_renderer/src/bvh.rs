//! Bounding Volume Hierarchy (BVH) acceleration structure.
//!
//! The tree lives in a flat arena: nodes refer to their children and to
//! their triangle range by index, never by pointer, so a finished `Bvh`
//! can be shared read-only across render threads behind an `Arc`.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use strata_core::Mesh;
use strata_math::{Aabb, Interval, Ray};
use thiserror::Error;

use crate::triangle::Triangle;

/// Maximum primitives per leaf node before splitting.
const LEAF_MAX_SIZE: usize = 4;

/// Capacity of the traversal stack.
pub const TRAVERSAL_STACK_SIZE: usize = 32;

/// Deepest level the builder creates. A depth-first traversal of a tree
/// this deep never holds more than `MAX_DEPTH + 1` pending nodes.
const MAX_DEPTH: usize = TRAVERSAL_STACK_SIZE - 2;

static STACK_WARNED: AtomicBool = AtomicBool::new(false);

/// How triangles are partitioned into nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BvhStrategy {
    /// Median split on the longest centroid axis.
    #[default]
    MedianSplit,
    /// One root leaf holding every triangle (brute force).
    Flat,
}

/// Node payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Internal { left: u32, right: u32 },
    Leaf { first: u32, count: u32 },
}

/// BVH node: bounds plus either two children or a triangle range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BvhNode {
    pub bounds: Aabb,
    pub kind: NodeKind,
}

/// Broken arena invariants found by [`Bvh::validate`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BvhError {
    #[error("Node {node} refers to child {child} outside the arena of {len} nodes")]
    ChildOutOfRange { node: usize, child: u32, len: usize },

    #[error("Node {node} refers to child {child} that does not come after it")]
    ChildBeforeParent { node: usize, child: u32 },

    #[error("Leaf {node} has an empty triangle range")]
    EmptyLeaf { node: usize },

    #[error("Leaf {node} range {first}..{end} exceeds {len} triangles")]
    LeafOutOfRange {
        node: usize,
        first: u32,
        end: u64,
        len: usize,
    },
}

/// Closest hit found in a BVH.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BvhHit {
    pub t: f32,
    pub u: f32,
    pub v: f32,
    /// Index into [`Bvh::triangles`]
    pub triangle: u32,
}

/// Immutable BVH over a triangle soup.
#[derive(Debug, Clone, Default)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
    triangles: Vec<Triangle>,
}

impl Bvh {
    /// Build a BVH over `triangles`.
    pub fn build(triangles: Vec<Triangle>, strategy: BvhStrategy) -> Self {
        let never = AtomicBool::new(false);
        // Cannot be cancelled
        Self::build_cancellable(triangles, strategy, &never).unwrap_or_default()
    }

    /// Build a BVH, giving up with `None` as soon as `cancel` is set.
    pub fn build_cancellable(
        mut triangles: Vec<Triangle>,
        strategy: BvhStrategy,
        cancel: &AtomicBool,
    ) -> Option<Self> {
        let start = std::time::Instant::now();

        if triangles.is_empty() {
            return Some(Self::default());
        }

        let nodes = match strategy {
            BvhStrategy::Flat => {
                let bounds = bounds_of(&triangles);
                vec![BvhNode {
                    bounds,
                    kind: NodeKind::Leaf {
                        first: 0,
                        count: triangles.len() as u32,
                    },
                }]
            }
            BvhStrategy::MedianSplit => {
                let mut builder = Builder {
                    nodes: Vec::with_capacity(2 * triangles.len() / LEAF_MAX_SIZE + 1),
                    cancel,
                };
                builder.build(&mut triangles, 0, 0)?;
                builder.nodes
            }
        };

        log::info!(
            "Built {:?} BVH: {} triangles, {} nodes in {:.1}ms",
            strategy,
            triangles.len(),
            nodes.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );

        Some(Self { nodes, triangles })
    }

    /// Build from a mesh asset.
    pub fn from_mesh(mesh: &Mesh, strategy: BvhStrategy) -> Self {
        Self::build(triangles_from_mesh(mesh), strategy)
    }

    /// Assemble an arena directly. Call [`Bvh::validate`] before use.
    pub fn from_parts(nodes: Vec<BvhNode>, triangles: Vec<Triangle>) -> Self {
        Self { nodes, triangles }
    }

    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Bounds of the whole tree.
    pub fn bounds(&self) -> Aabb {
        self.nodes.first().map_or(Aabb::EMPTY, |n| n.bounds)
    }

    /// Depth of the deepest node (the root is depth 0).
    pub fn depth(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }
        let mut deepest = 0;
        let mut pending = vec![(0u32, 0usize)];
        while let Some((index, depth)) = pending.pop() {
            deepest = deepest.max(depth);
            if let Some(BvhNode {
                kind: NodeKind::Internal { left, right },
                ..
            }) = self.nodes.get(index as usize)
            {
                pending.push((*left, depth + 1));
                pending.push((*right, depth + 1));
            }
        }
        deepest
    }

    /// Check the index invariants of the arena.
    ///
    /// Children must be valid offsets that come after their parent (so the
    /// structure is acyclic); leaves must cover a non-empty range inside the
    /// triangle array.
    pub fn validate(&self) -> Result<(), BvhError> {
        let len = self.nodes.len();
        for (node, n) in self.nodes.iter().enumerate() {
            match n.kind {
                NodeKind::Internal { left, right } => {
                    for child in [left, right] {
                        if child as usize >= len {
                            return Err(BvhError::ChildOutOfRange { node, child, len });
                        }
                        if child as usize <= node {
                            return Err(BvhError::ChildBeforeParent { node, child });
                        }
                    }
                }
                NodeKind::Leaf { first, count } => {
                    if count == 0 {
                        return Err(BvhError::EmptyLeaf { node });
                    }
                    let end = first as u64 + count as u64;
                    if end > self.triangles.len() as u64 {
                        return Err(BvhError::LeafOutOfRange {
                            node,
                            first,
                            end,
                            len: self.triangles.len(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Closest triangle hit along `ray` within `ray_t`.
    ///
    /// Iterative depth-first traversal with a fixed-capacity stack. Children
    /// that do not fit on the stack are dropped (and reported once); the
    /// builder keeps trees shallow enough that this never happens.
    pub fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<BvhHit> {
        if self.nodes.is_empty() || ray.is_degenerate() {
            return None;
        }

        let mut stack = [0u32; TRAVERSAL_STACK_SIZE];
        let mut len = 1;
        let mut closest: Option<BvhHit> = None;

        while len > 0 {
            len -= 1;
            let node = &self.nodes[stack[len] as usize];
            let range = ray_t.with_max(closest.map_or(ray_t.max, |h| h.t));

            if !node.bounds.hit(ray, range) {
                continue;
            }

            match node.kind {
                NodeKind::Leaf { first, count } => {
                    let mut range = range;
                    for index in first..first + count {
                        if let Some(hit) = self.triangles[index as usize].hit(ray, range) {
                            range = range.with_max(hit.t);
                            closest = Some(BvhHit {
                                t: hit.t,
                                u: hit.u,
                                v: hit.v,
                                triangle: index,
                            });
                        }
                    }
                }
                NodeKind::Internal { left, right } => {
                    // Left is pushed last so it is visited first
                    for child in [right, left] {
                        if len < TRAVERSAL_STACK_SIZE {
                            stack[len] = child;
                            len += 1;
                        } else if !STACK_WARNED.swap(true, Ordering::Relaxed) {
                            log::warn!(
                                "BVH traversal stack full ({} entries), dropping subtrees",
                                TRAVERSAL_STACK_SIZE
                            );
                        }
                    }
                }
            }
        }

        closest
    }
}

/// Flatten a mesh into triangles, skipping invalid indices.
pub fn triangles_from_mesh(mesh: &Mesh) -> Vec<Triangle> {
    mesh.extract_triangle_vertices()
        .into_iter()
        .map(Triangle::from)
        .collect()
}

fn bounds_of(triangles: &[Triangle]) -> Aabb {
    triangles
        .iter()
        .fold(Aabb::EMPTY, |acc, t| Aabb::surrounding(&acc, &t.bounds()))
}

struct Builder<'a> {
    nodes: Vec<BvhNode>,
    cancel: &'a AtomicBool,
}

impl Builder<'_> {
    /// Recursive median-split construction over `triangles`, which starts at
    /// offset `first` of the final triangle array. Returns the node index.
    fn build(&mut self, triangles: &mut [Triangle], first: usize, depth: usize) -> Option<u32> {
        if self.cancel.load(Ordering::Relaxed) {
            return None;
        }

        let bounds = bounds_of(triangles);
        let index = self.nodes.len() as u32;
        let leaf = NodeKind::Leaf {
            first: first as u32,
            count: triangles.len() as u32,
        };

        // Create leaf for small sets, or when the depth budget is spent
        if triangles.len() <= LEAF_MAX_SIZE || depth >= MAX_DEPTH {
            self.nodes.push(BvhNode { bounds, kind: leaf });
            return Some(index);
        }

        // Choose split axis based on centroid spread
        let centroid_bounds = triangles
            .iter()
            .fold(Aabb::EMPTY, |acc, t| acc.include(t.centroid()));
        let axis = centroid_bounds.longest_axis();

        let mid = triangles.len() / 2;
        triangles.select_nth_unstable_by(mid, |a, b| {
            a.centroid()[axis].total_cmp(&b.centroid()[axis])
        });

        // Reserve the slot so children land after their parent
        self.nodes.push(BvhNode { bounds, kind: leaf });

        let (left_tris, right_tris) = triangles.split_at_mut(mid);
        let left = self.build(left_tris, first, depth + 1)?;
        let right = self.build(right_tris, first + mid, depth + 1)?;

        self.nodes[index as usize].kind = NodeKind::Internal { left, right };
        Some(index)
    }
}
