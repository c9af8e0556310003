//! Chunk adjacency graph
//!
//! Chunks live in an arena and refer to each other by [`ChunkId`]. Every
//! chunk keeps, per triangle edge, the list of neighbors sharing (part of)
//! that edge sorted clockwise along the edge, plus the same neighbors split
//! into alive and deleted subsets so bare-edge tests stay O(1).
//!
//! Adjacency is symmetric: if `a` lists `b` on edge `i`, then `b` lists `a`
//! on exactly one edge `j`, and the link records `j` so neither side has to
//! search for it.

use std::collections::BTreeSet;
use std::fmt;

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::random::uniform_sum;
use super::triangle::Triangle;

/// Number of uniform draws summed when picking a split fraction
pub const SPLIT_FRACTION_SAMPLES: u32 = 8;
/// Random split fractions are kept this far from either end of the edge
pub const MIN_SPLIT_FRACTION: f32 = 1e-3;

/// Stable handle to a chunk slot in a [`ChunkGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkId(u32);

impl ChunkId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One side of an adjacency: the neighbor and the edge of the neighbor's
/// triangle that touches us
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub chunk: ChunkId,
    pub edge: usize,
}

/// A single triangular piece of ice
#[derive(Debug, Clone)]
pub struct Chunk {
    triangle: Triangle,
    deleted: bool,
    /// Set once the chunk has been split and disconnected
    replaced: bool,
    /// All neighbors per edge, clockwise along the edge
    sorted: [Vec<Link>; 3],
    alive: [Vec<ChunkId>; 3],
    dead: [Vec<ChunkId>; 3],
}

impl Chunk {
    fn new(triangle: Triangle) -> Self {
        Self {
            triangle,
            deleted: false,
            replaced: false,
            sorted: Default::default(),
            alive: Default::default(),
            dead: Default::default(),
        }
    }

    #[inline]
    pub fn triangle(&self) -> &Triangle {
        &self.triangle
    }

    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// True once the chunk has been split; it is no longer part of any sheet
    #[inline]
    pub fn is_replaced(&self) -> bool {
        self.replaced
    }

    /// An edge is bare when no alive chunk sits across it, or when any
    /// deleted chunk does.
    pub fn is_edge_bare(&self, edge: usize) -> bool {
        self.alive[edge].is_empty() || !self.dead[edge].is_empty()
    }

    pub fn has_bare_edge(&self) -> bool {
        (0..3).any(|i| self.is_edge_bare(i))
    }

    #[inline]
    pub fn has_alive_on_edge(&self, edge: usize) -> bool {
        !self.alive[edge].is_empty()
    }

    /// Alive and deleted neighbors on `edge`, in clockwise order
    #[inline]
    pub fn links_on_edge(&self, edge: usize) -> &[Link] {
        &self.sorted[edge]
    }

    #[inline]
    pub fn alive_on_edge(&self, edge: usize) -> &[ChunkId] {
        &self.alive[edge]
    }

    #[inline]
    pub fn deleted_on_edge(&self, edge: usize) -> &[ChunkId] {
        &self.dead[edge]
    }

    /// Every link on every edge
    pub fn links(&self) -> impl Iterator<Item = &Link> + '_ {
        self.sorted.iter().flatten()
    }

    /// Alive neighbors on all edges
    pub fn alive_neighbors(&self) -> impl Iterator<Item = ChunkId> + '_ {
        self.alive.iter().flatten().copied()
    }

    /// Edge of this chunk along which `other` is adjacent
    pub fn edge_toward(&self, other: ChunkId) -> Option<usize> {
        (0..3).find(|&i| self.sorted[i].iter().any(|l| l.chunk == other))
    }

    fn forget(&mut self, other: ChunkId) {
        for i in 0..3 {
            self.sorted[i].retain(|l| l.chunk != other);
            self.alive[i].retain(|&c| c != other);
            self.dead[i].retain(|&c| c != other);
        }
    }
}

/// Arena of chunks plus the operations that keep adjacency consistent
#[derive(Debug, Clone, Default)]
pub struct ChunkGraph {
    slots: Vec<Option<Chunk>>,
    free: Vec<u32>,
}

impl ChunkGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an unconnected chunk
    pub fn insert(&mut self, triangle: Triangle) -> ChunkId {
        let chunk = Some(Chunk::new(triangle));
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot as usize] = chunk;
                ChunkId(slot)
            }
            None => {
                self.slots.push(chunk);
                ChunkId((self.slots.len() - 1) as u32)
            }
        }
    }

    /// Number of occupied slots, including deleted and replaced chunks not
    /// yet collected
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: ChunkId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: ChunkId) -> Option<&Chunk> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    /// Access a chunk that must exist
    pub fn chunk(&self, id: ChunkId) -> &Chunk {
        match self.get(id) {
            Some(chunk) => chunk,
            None => panic!("chunk {id} is not in the graph"),
        }
    }

    fn chunk_mut(&mut self, id: ChunkId) -> &mut Chunk {
        match self.slots.get_mut(id.index()).and_then(Option::as_mut) {
            Some(chunk) => chunk,
            None => panic!("chunk {id} is not in the graph"),
        }
    }

    /// Occupied slots in id order
    pub fn iter(&self) -> impl Iterator<Item = (ChunkId, &Chunk)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|c| (ChunkId(i as u32), c)))
    }

    #[inline]
    pub fn triangle(&self, id: ChunkId) -> &Triangle {
        self.chunk(id).triangle()
    }

    #[inline]
    pub fn is_deleted(&self, id: ChunkId) -> bool {
        self.chunk(id).is_deleted()
    }

    /// Alive means neither deleted nor replaced by a split
    pub fn is_alive(&self, id: ChunkId) -> bool {
        self.get(id).is_some_and(|c| !c.deleted && !c.replaced)
    }

    /// Edge of `a` along which `b` is adjacent
    pub fn index_of_edge_adjacent(&self, a: ChunkId, b: ChunkId) -> Option<usize> {
        self.chunk(a).edge_toward(b)
    }

    /// Connect `a` on `edge_a` with `b` on `edge_b`, keeping both edge lists
    /// clockwise sorted.
    pub fn link(&mut self, a: ChunkId, edge_a: usize, b: ChunkId, edge_b: usize) {
        assert!(edge_a < 3 && edge_b < 3, "edge index out of range");
        assert_ne!(a, b, "chunk {a} cannot be adjacent to itself");
        assert!(
            !self.chunk(a).replaced && !self.chunk(b).replaced,
            "cannot link a replaced chunk"
        );
        assert!(
            self.index_of_edge_adjacent(a, b).is_none(),
            "chunks {a} and {b} are already adjacent"
        );
        self.insert_sorted(a, edge_a, b, edge_b);
        self.insert_sorted(b, edge_b, a, edge_a);
    }

    /// One half of [`Self::link`]. Neighbors are ordered by where the far end
    /// of their shared edge projects onto our edge.
    fn insert_sorted(&mut self, a: ChunkId, edge_a: usize, b: ChunkId, edge_b: usize) {
        let this = self.chunk(a);
        let axis = this.triangle.edge(edge_a);
        let key = axis.project(self.triangle(b).edge(edge_b).second());
        let position = this.sorted[edge_a]
            .iter()
            .position(|l| key < axis.project(self.triangle(l.chunk).edge(l.edge).second()))
            .unwrap_or(this.sorted[edge_a].len());

        let b_deleted = self.chunk(b).deleted;
        let this = self.chunk_mut(a);
        this.sorted[edge_a].insert(position, Link { chunk: b, edge: edge_b });
        if b_deleted {
            this.dead[edge_a].push(b);
        } else {
            this.alive[edge_a].push(b);
        }
    }

    /// Remove any adjacency between `a` and `b`. Does nothing if they are not
    /// adjacent.
    pub fn unlink(&mut self, a: ChunkId, b: ChunkId) {
        self.chunk_mut(a).forget(b);
        self.chunk_mut(b).forget(a);
    }

    /// Disconnect `id` from every neighbor and mark it replaced.
    pub fn detach(&mut self, id: ChunkId) {
        let neighbors: BTreeSet<ChunkId> = self.chunk(id).links().map(|l| l.chunk).collect();
        for other in neighbors {
            self.unlink(id, other);
        }
        self.chunk_mut(id).replaced = true;
    }

    /// Mark a chunk deleted and move it into the deleted partition of every
    /// neighbor. Deletion is permanent.
    pub fn set_deleted(&mut self, id: ChunkId) {
        let chunk = self.chunk(id);
        assert!(!chunk.deleted, "chunk {id} is already deleted");
        assert!(!chunk.replaced, "chunk {id} was replaced by a split");

        let links: Vec<Link> = chunk.links().copied().collect();
        for link in links {
            let neighbor = self.chunk_mut(link.chunk);
            neighbor.alive[link.edge].retain(|&c| c != id);
            neighbor.dead[link.edge].push(id);
        }
        self.chunk_mut(id).deleted = true;
    }

    /// Split chunk `id` through the point `fraction` of the way along `edge`
    /// and the opposite vertex.
    ///
    /// Returns the two halves: the first holds the edge's first endpoint and
    /// the second holds its second endpoint. The halves share edge 2 of the
    /// first and edge 0 of the second. The original chunk is detached from
    /// the graph and marked replaced.
    pub fn split(&mut self, id: ChunkId, edge: usize, fraction: f32) -> [ChunkId; 2] {
        let chunk = self.chunk(id);
        assert!(!chunk.deleted, "cannot split deleted chunk {id}");
        assert!(!chunk.replaced, "cannot split replaced chunk {id}");
        assert!((0.0..1.0).contains(&fraction), "split fraction {fraction} outside [0, 1)");

        let triangle = chunk.triangle;
        let split_edge = triangle.edge(edge);
        let split_point = split_edge.first() + fraction * split_edge.direction();
        let pivot = split_edge.opposite();
        let first = split_edge.first();
        let second = split_edge.second();

        // Rotations of the parent's clockwise order, so no reflection needed
        let c1 = self.insert(Triangle::from_clockwise(pivot, first, split_point));
        let c2 = self.insert(Triangle::from_clockwise(pivot, split_point, second));
        self.link(c1, 2, c2, 0);

        let before = self.chunk(id).sorted[(edge + 2) % 3].clone();
        for l in before {
            self.link(c1, 0, l.chunk, l.edge);
        }
        let after = self.chunk(id).sorted[(edge + 1) % 3].clone();
        for l in after {
            self.link(c2, 2, l.chunk, l.edge);
        }

        // Neighbors along the split edge go to whichever half they overlap
        let dir = second - split_point;
        let along = self.chunk(id).sorted[edge].clone();
        for l in along {
            let their_edge = self.triangle(l.chunk).edge(l.edge);
            let d1 = (their_edge.first() - split_point).dot(dir);
            let d2 = (their_edge.second() - split_point).dot(dir);
            if d1 > 0.0 && d2 > 0.0 {
                self.link(c2, 1, l.chunk, l.edge);
            } else if d1 < 0.0 && d2 < 0.0 {
                self.link(c1, 1, l.chunk, l.edge);
            } else {
                self.link(c1, 1, l.chunk, l.edge);
                self.link(c2, 1, l.chunk, l.edge);
            }
        }

        self.detach(id);
        [c1, c2]
    }

    /// Split along an edge chosen by [`Triangle::random_edge_weighted_by_angle`]
    /// at a fraction drawn from an 8-fold uniform sum.
    pub fn random_binary_division<R: Rng + ?Sized>(
        &mut self,
        id: ChunkId,
        rng: &mut R,
    ) -> [ChunkId; 2] {
        let edge = self.triangle(id).random_edge_weighted_by_angle(rng).index();
        let fraction = uniform_sum(rng, SPLIT_FRACTION_SAMPLES, 0.0, 1.0)
            .clamp(MIN_SPLIT_FRACTION, 1.0 - MIN_SPLIT_FRACTION);
        self.split(id, edge, fraction)
    }

    /// Split `id` repeatedly, always keeping the half on `point`'s side of
    /// the new internal edge, until the remaining chunk is smaller than
    /// `max_area`. Returns that chunk (`id` itself if already small enough).
    pub fn resolve_to_point<R: Rng + ?Sized>(
        &mut self,
        id: ChunkId,
        point: Vec2,
        max_area: f32,
        rng: &mut R,
    ) -> ChunkId {
        let mut current = id;
        while self.triangle(current).area() >= max_area {
            let [c1, c2] = self.random_binary_division(current, rng);
            let shared = self.triangle(c1).edge(2);
            let d = shared.direction();
            let perp = Vec2::new(d.y, -d.x);
            current = if (point - shared.first()).dot(perp) > 0.0 { c1 } else { c2 };
        }
        current
    }

    /// Reclaim slots no sheet can reach any more.
    ///
    /// A slot survives if it is alive, or deleted but still touching an alive
    /// chunk (its edges shape that chunk's perimeter). Everything else is
    /// unlinked and its slot freed for reuse. Returns the number of slots
    /// freed.
    pub fn collect_garbage(&mut self) -> usize {
        let keep: BTreeSet<ChunkId> = self
            .iter()
            .filter(|(_, c)| {
                if c.replaced {
                    false
                } else if !c.deleted {
                    true
                } else {
                    c.alive_neighbors().next().is_some()
                }
            })
            .map(|(id, _)| id)
            .collect();
        let doomed: Vec<ChunkId> = self
            .iter()
            .map(|(id, _)| id)
            .filter(|id| !keep.contains(id))
            .collect();

        for &id in &doomed {
            let neighbors: BTreeSet<ChunkId> = self.chunk(id).links().map(|l| l.chunk).collect();
            for other in neighbors {
                self.unlink(id, other);
            }
            self.slots[id.index()] = None;
            self.free.push(id.0);
        }
        // Lowest ids are reused first
        self.free.sort_unstable_by(|a, b| b.cmp(a));
        doomed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn v(x: f32, y: f32) -> Vec2 {
        Vec2::new(x, y)
    }

    /// Three right triangles meeting at the origin
    fn fan(graph: &mut ChunkGraph) -> [ChunkId; 3] {
        let a = graph.insert(Triangle::new(v(0.0, 0.0), v(1.0, 0.0), v(0.0, 1.0)));
        let b = graph.insert(Triangle::new(v(0.0, 0.0), v(1.0, 0.0), v(0.0, -1.0)));
        let c = graph.insert(Triangle::new(v(0.0, 0.0), v(-1.0, 0.0), v(0.0, 1.0)));
        graph.link(a, 2, c, 2);
        graph.link(a, 0, b, 0);
        graph.link(b, 2, c, 0);
        [a, b, c]
    }

    fn alive_area(graph: &ChunkGraph) -> f32 {
        graph
            .iter()
            .filter(|(id, _)| graph.is_alive(*id))
            .map(|(_, c)| c.triangle().area())
            .sum()
    }

    fn assert_symmetric(graph: &ChunkGraph) {
        for (id, chunk) in graph.iter() {
            for i in 0..3 {
                for l in chunk.links_on_edge(i) {
                    let back = graph.chunk(l.chunk).links_on_edge(l.edge);
                    assert_eq!(
                        back.iter().filter(|b| b.chunk == id && b.edge == i).count(),
                        1,
                        "{id} edge {i} -> {} edge {} is one-sided",
                        l.chunk,
                        l.edge
                    );
                    assert_eq!(graph.index_of_edge_adjacent(l.chunk, id), Some(l.edge));
                }
                let partitioned = chunk.alive_on_edge(i).len() + chunk.deleted_on_edge(i).len();
                assert_eq!(partitioned, chunk.links_on_edge(i).len());
            }
        }
    }

    #[test]
    fn test_link_is_symmetric() {
        let mut graph = ChunkGraph::new();
        let [a, b, c] = fan(&mut graph);

        assert_eq!(graph.chunk(a).alive_on_edge(0), &[b]);
        assert_eq!(graph.chunk(a).alive_on_edge(2), &[c]);
        assert_eq!(graph.chunk(c).alive_on_edge(2), &[a]);
        assert_eq!(graph.index_of_edge_adjacent(b, a), Some(0));
        assert_eq!(graph.index_of_edge_adjacent(b, c), Some(2));
        assert_symmetric(&graph);
    }

    #[test]
    fn test_unlink() {
        let mut graph = ChunkGraph::new();
        let [a, b, c] = fan(&mut graph);

        let neighbors: Vec<ChunkId> = graph.chunk(a).alive_neighbors().collect();
        for n in neighbors {
            graph.unlink(a, n);
        }
        assert_eq!(graph.chunk(a).alive_neighbors().count(), 0);
        assert_eq!(graph.index_of_edge_adjacent(b, a), None);
        assert_eq!(graph.chunk(c).alive_on_edge(0), &[b]);
        assert_symmetric(&graph);

        // Unlinking strangers is a no-op
        graph.unlink(a, b);
        assert_symmetric(&graph);
    }

    #[test]
    fn test_neighbors_sorted_clockwise_along_edge() {
        let mut graph = ChunkGraph::new();
        let big = graph.insert(Triangle::new(v(0.0, 0.0), v(0.0, 3.0), v(3.0, 0.0)));

        // Inserted from the far end of edge 1 towards its start
        let mut inserted = Vec::new();
        for i in (0..3).rev() {
            let i = i as f32;
            let small = graph.insert(Triangle::new(
                v(i + 1.0, 3.0 - i),
                v(i + 1.0, 2.0 - i),
                v(i, 3.0 - i),
            ));
            graph.link(big, 1, small, 1);
            inserted.push(small);
        }
        inserted.reverse();

        let order: Vec<ChunkId> =
            graph.chunk(big).links_on_edge(1).iter().map(|l| l.chunk).collect();
        assert_eq!(order, inserted);
    }

    #[test]
    fn test_set_deleted_moves_partitions() {
        let mut graph = ChunkGraph::new();
        let [a, b, c] = fan(&mut graph);
        assert!(graph.chunk(a).is_edge_bare(1));

        graph.set_deleted(b);
        assert!(graph.is_deleted(b));
        assert!(graph.chunk(a).alive_on_edge(0).is_empty());
        assert_eq!(graph.chunk(a).deleted_on_edge(0), &[b]);
        assert_eq!(graph.chunk(c).deleted_on_edge(0), &[b]);
        assert!(graph.chunk(a).is_edge_bare(0));
        assert!(!graph.chunk(a).is_edge_bare(2));
        assert_symmetric(&graph);

        // Links made after deletion land in the deleted partition directly
        let d = graph.insert(Triangle::new(v(1.0, 0.0), v(2.0, 0.0), v(1.0, -1.0)));
        graph.link(d, 0, b, 1);
        assert_eq!(graph.chunk(d).deleted_on_edge(0), &[b]);
        assert!(graph.chunk(d).is_edge_bare(0));
    }

    #[test]
    #[should_panic(expected = "already deleted")]
    fn test_double_delete_panics() {
        let mut graph = ChunkGraph::new();
        let [a, ..] = fan(&mut graph);
        graph.set_deleted(a);
        graph.set_deleted(a);
    }

    #[test]
    #[should_panic(expected = "cannot split deleted")]
    fn test_split_deleted_panics() {
        let mut graph = ChunkGraph::new();
        let [a, ..] = fan(&mut graph);
        graph.set_deleted(a);
        graph.split(a, 0, 0.5);
    }

    #[test]
    fn test_split_geometry_and_internal_link() {
        let mut graph = ChunkGraph::new();
        let t = graph.insert(Triangle::new(v(0.0, 0.0), v(0.0, 2.0), v(2.0, 0.0)));
        let [c1, c2] = graph.split(t, 0, 0.25);

        let t1 = graph.triangle(c1);
        let t2 = graph.triangle(c2);
        assert_eq!(t1.vertices(), [v(2.0, 0.0), v(0.0, 0.0), v(0.0, 0.5)]);
        assert_eq!(t2.vertices(), [v(2.0, 0.0), v(0.0, 0.5), v(0.0, 2.0)]);
        assert!(t1.is_clockwise() && t2.is_clockwise());
        assert!((t1.area() + t2.area() - 2.0).abs() < 1e-5);

        assert_eq!(graph.index_of_edge_adjacent(c1, c2), Some(2));
        assert_eq!(graph.index_of_edge_adjacent(c2, c1), Some(0));
        assert!(graph.chunk(t).is_replaced());
        assert!(!graph.is_alive(t));
        assert_eq!(graph.chunk(t).links().count(), 0);
        assert_symmetric(&graph);
    }

    #[test]
    fn test_split_redistributes_split_edge_neighbors() {
        let mut graph = ChunkGraph::new();
        // Edge 0 of `big` runs up the y axis from (0,0) to (0,4)
        let big = graph.insert(Triangle::new(v(0.0, 0.0), v(0.0, 4.0), v(4.0, 0.0)));
        let low = graph.insert(Triangle::new(v(0.0, 1.0), v(0.0, 0.0), v(-1.0, 0.5)));
        let mid = graph.insert(Triangle::new(v(0.0, 3.0), v(0.0, 1.0), v(-1.0, 2.0)));
        let high = graph.insert(Triangle::new(v(0.0, 4.0), v(0.0, 3.0), v(-1.0, 3.5)));
        let side = graph.insert(Triangle::new(v(0.0, 4.0), v(4.0, 0.0), v(4.0, 4.0)));
        for n in [low, mid, high] {
            graph.link(big, 0, n, 0);
        }
        graph.link(big, 1, side, 1);
        let floor = graph.insert(Triangle::new(v(4.0, 0.0), v(0.0, 0.0), v(2.0, -1.0)));
        graph.link(big, 2, floor, 1);
        assert_symmetric(&graph);

        // Split point (0, 2) falls inside `mid`
        let [c1, c2] = graph.split(big, 0, 0.5);
        assert_eq!(graph.chunk(c1).alive_on_edge(1), &[low, mid]);
        assert_eq!(graph.chunk(c2).alive_on_edge(1), &[mid, high]);
        assert_eq!(graph.chunk(c1).alive_on_edge(0), &[floor]);
        assert_eq!(graph.chunk(c2).alive_on_edge(2), &[side]);
        assert_eq!(graph.chunk(mid).alive_on_edge(0).len(), 2);
        assert_symmetric(&graph);
    }

    #[test]
    fn test_resolve_to_point() {
        let mut rng = Pcg32::seed_from_u64(3);
        let mut graph = ChunkGraph::new();
        let t = graph.insert(Triangle::new(v(0.0, 0.0), v(0.0, 3.0), v(3.0, 0.0)));

        assert_eq!(graph.resolve_to_point(t, v(0.0, 0.0), f32::MAX, &mut rng), t);

        let target = v(0.4, 0.7);
        let leaf = graph.resolve_to_point(t, target, 0.1, &mut rng);
        assert!(graph.triangle(leaf).area() < 0.1);
        assert!(graph.is_alive(leaf));
        assert!(graph.triangle(leaf).contains_point(target));
        assert_eq!(graph.chunk(t).links().count(), 0);

        let total = alive_area(&graph);
        assert!((total - 4.5).abs() < 1e-3);
        assert_symmetric(&graph);
    }

    #[test]
    fn test_collect_garbage() {
        let mut rng = Pcg32::seed_from_u64(11);
        let mut graph = ChunkGraph::new();
        let [a, b, c] = fan(&mut graph);
        // Orphan deleted chunk with no alive neighbor
        let lonely = graph.insert(Triangle::new(v(5.0, 5.0), v(5.0, 6.0), v(6.0, 5.0)));
        graph.set_deleted(lonely);

        graph.set_deleted(b);
        let halves = graph.random_binary_division(a, &mut rng);

        // `a` was replaced, `lonely` touches nothing alive
        assert_eq!(graph.collect_garbage(), 2);
        assert!(!graph.contains(a));
        assert!(!graph.contains(lonely));
        assert!(graph.contains(b));
        assert!(graph.contains(c));
        assert!(halves.iter().all(|&h| graph.is_alive(h)));
        assert_symmetric(&graph);

        // Freed slots are reused
        let fresh = graph.insert(Triangle::new(v(0.0, 0.0), v(0.0, 1.0), v(1.0, 0.0)));
        assert_eq!(fresh, a);
        assert_eq!(graph.collect_garbage(), 0);
    }

    fn edge_and_fraction() -> impl Strategy<Value = (usize, f32)> {
        (0usize..3, 0.01f32..0.99)
    }

    proptest! {
        #[test]
        fn prop_split_preserves_area_and_neighbors(
            (edge, fraction) in edge_and_fraction(),
            seed in any::<u64>(),
        ) {
            let mut rng = Pcg32::seed_from_u64(seed);
            let mut graph = ChunkGraph::new();
            let [a, b, c] = fan(&mut graph);
            // Subdivide a couple of times so split edges carry several neighbors
            let [a1, _] = graph.random_binary_division(a, &mut rng);
            let [_, c2] = graph.random_binary_division(c, &mut rng);

            let target = b;
            let area = graph.triangle(target).area();
            let before: BTreeSet<ChunkId> = graph.chunk(target).links().map(|l| l.chunk).collect();
            let [h1, h2] = graph.split(target, edge, fraction);

            let halves = graph.triangle(h1).area() + graph.triangle(h2).area();
            prop_assert!((halves - area).abs() <= 1e-4 * area.max(1.0));

            let mut after: BTreeSet<ChunkId> = graph.chunk(h1).links().map(|l| l.chunk).collect();
            after.extend(graph.chunk(h2).links().map(|l| l.chunk));
            after.remove(&h1);
            after.remove(&h2);
            prop_assert_eq!(before, after);
            prop_assert!(graph.is_alive(a1) && graph.is_alive(c2));
            assert_symmetric(&graph);
        }

        #[test]
        fn prop_random_division_keeps_total_area(seed in any::<u64>(), rounds in 1usize..30) {
            let mut rng = Pcg32::seed_from_u64(seed);
            let mut graph = ChunkGraph::new();
            let start = fan(&mut graph);
            let total = start.iter().map(|&c| graph.triangle(c).area()).sum::<f32>();

            for _ in 0..rounds {
                let alive: Vec<ChunkId> =
                    graph.iter().map(|(id, _)| id).filter(|&id| graph.is_alive(id)).collect();
                let pick = alive[rng.random_range(0..alive.len())];
                graph.random_binary_division(pick, &mut rng);
            }

            let now = alive_area(&graph);
            prop_assert!((now - total).abs() < 1e-3);
            assert_symmetric(&graph);
        }
    }
}
