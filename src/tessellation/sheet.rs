//! Sheets: connected components of the chunk graph
//!
//! A sheet is identified by one alive root chunk. Everything else (member
//! chunks, perimeter chunks, the outline polygon) is derived from a single
//! depth-first walk that visits neighbors in clockwise order, cached until
//! the next structural change.

use std::collections::BTreeSet;

use glam::Vec2;
use rand::Rng;

use super::chunk::{ChunkGraph, ChunkId};

/// Everything one traversal produces
#[derive(Debug, Clone, Default)]
struct Outline {
    chunks: BTreeSet<ChunkId>,
    including_deleted: BTreeSet<ChunkId>,
    bare: BTreeSet<ChunkId>,
    perimeter: Vec<Vec2>,
}

/// Explicit stack frame for the clockwise walk
#[derive(Debug, Clone, Copy)]
struct Frame {
    chunk: ChunkId,
    /// Chunk we arrived from; `None` for the root
    prev: Option<ChunkId>,
    /// Edge shared with `prev`, where the walk around this chunk starts
    first_edge: usize,
    step: usize,
    /// Whether `cursor..end` is set up for the edge at `step`
    edge_open: bool,
    cursor: usize,
    end: usize,
}

impl Frame {
    fn enter(chunk: ChunkId, prev: Option<ChunkId>, first_edge: usize) -> Self {
        Self {
            chunk,
            prev,
            first_edge,
            step: 0,
            edge_open: false,
            cursor: 0,
            end: 0,
        }
    }

    /// Edge visits for this chunk. Non-root chunks come back to the entry
    /// edge at the end to pick up neighbors that sit before `prev`.
    fn visits(&self) -> usize {
        if self.prev.is_some() { 4 } else { 3 }
    }
}

fn trace(graph: &ChunkGraph, root: ChunkId) -> Outline {
    assert!(graph.is_alive(root), "sheet root {root} is not alive");

    let mut out = Outline::default();
    out.chunks.insert(root);
    out.including_deleted.insert(root);

    let mut stack = vec![Frame::enter(root, None, 0)];
    'frames: while let Some(frame) = stack.last_mut() {
        let chunk = graph.chunk(frame.chunk);

        while frame.step < frame.visits() {
            let edge_index = (frame.first_edge + frame.step) % 3;
            let edge = chunk.triangle().edge(edge_index);
            let links = chunk.links_on_edge(edge_index);

            if !frame.edge_open {
                if !chunk.has_alive_on_edge(edge_index) {
                    // Whole edge is perimeter
                    out.perimeter.push(edge.first());
                    out.bare.insert(frame.chunk);
                    out.including_deleted.extend(chunk.deleted_on_edge(edge_index));
                    frame.step += 1;
                    continue;
                }

                let entry = frame.prev.and_then(|p| links.iter().position(|l| l.chunk == p));
                let (start, end) = match (frame.step, entry) {
                    (0, Some(i)) => (i + 1, links.len()),
                    (3, Some(i)) => (0, i),
                    (3, None) => (0, 0),
                    _ => (0, links.len()),
                };
                frame.cursor = start;
                frame.end = end;
                frame.edge_open = true;
            }

            while frame.cursor < frame.end {
                let link = links[frame.cursor];
                frame.cursor += 1;
                let neighbor = graph.chunk(link.chunk);

                if neighbor.is_deleted() {
                    out.including_deleted.insert(link.chunk);
                    out.bare.insert(frame.chunk);
                    // Whichever of our start and their end comes first along the edge
                    let their_end = neighbor.triangle().edge(link.edge).second();
                    if (their_end - edge.first()).dot(edge.direction()) < 0.0 {
                        out.perimeter.push(edge.first());
                    } else {
                        out.perimeter.push(their_end);
                    }
                } else if out.chunks.insert(link.chunk) {
                    out.including_deleted.insert(link.chunk);
                    let next = Frame::enter(link.chunk, Some(frame.chunk), link.edge);
                    stack.push(next);
                    continue 'frames;
                }
            }

            frame.edge_open = false;
            frame.step += 1;
        }
        stack.pop();
    }
    out
}

/// A rigid, connected piece of ice
#[derive(Debug, Clone)]
pub struct Sheet {
    root: ChunkId,
    max_area: f32,
    dirty: bool,
    cache: Outline,
}

impl Sheet {
    pub fn new(root: ChunkId) -> Self {
        Self {
            root,
            max_area: f32::MAX,
            dirty: true,
            cache: Outline::default(),
        }
    }

    pub fn with_max_area(mut self, max_area: f32) -> Self {
        self.max_area = max_area;
        self
    }

    /// Always an alive chunk of this sheet
    #[inline]
    pub fn root(&self) -> ChunkId {
        self.root
    }

    /// Chunks at least this large split when bumped; smaller ones break off
    #[inline]
    pub fn max_area(&self) -> f32 {
        self.max_area
    }

    pub fn set_max_area(&mut self, max_area: f32) {
        self.max_area = max_area;
    }

    fn refresh(&mut self, graph: &ChunkGraph) -> &Outline {
        if self.dirty {
            self.cache = trace(graph, self.root);
            self.dirty = false;
        }
        &self.cache
    }

    /// Alive chunks reachable from the root
    pub fn chunks(&mut self, graph: &ChunkGraph) -> &BTreeSet<ChunkId> {
        &self.refresh(graph).chunks
    }

    /// Member chunks plus the deleted chunks bordering them
    pub fn chunks_including_deleted(&mut self, graph: &ChunkGraph) -> &BTreeSet<ChunkId> {
        &self.refresh(graph).including_deleted
    }

    /// Member chunks with at least one bare edge
    pub fn bare_chunks(&mut self, graph: &ChunkGraph) -> &BTreeSet<ChunkId> {
        &self.refresh(graph).bare
    }

    /// Clockwise outline of the sheet in sheet-local coordinates. Non-simple
    /// sheets may produce a self-touching loop.
    pub fn perimeter(&mut self, graph: &ChunkGraph) -> &[Vec2] {
        &self.refresh(graph).perimeter
    }

    pub fn compute_area(&mut self, graph: &ChunkGraph) -> f32 {
        self.chunks(graph).iter().map(|&c| graph.triangle(c).area()).sum()
    }

    /// Split one member chunk at random. The root moves to the first half.
    pub fn random_binary_division<R: Rng + ?Sized>(
        &mut self,
        graph: &mut ChunkGraph,
        chunk: ChunkId,
        rng: &mut R,
    ) -> [ChunkId; 2] {
        assert!(graph.is_alive(chunk), "cannot split chunk {chunk}: not alive");
        let halves = graph.random_binary_division(chunk, rng);
        self.root = halves[0];
        self.dirty = true;
        halves
    }

    /// Subdivide `chunk` towards `point` until the piece holding it is below
    /// this sheet's `max_area`. The root moves to the result.
    pub fn resolve_chunk<R: Rng + ?Sized>(
        &mut self,
        graph: &mut ChunkGraph,
        chunk: ChunkId,
        point: Vec2,
        rng: &mut R,
    ) -> ChunkId {
        assert!(graph.is_alive(chunk), "cannot resolve chunk {chunk}: not alive");
        let leaf = graph.resolve_to_point(chunk, point, self.max_area, rng);
        self.root = leaf;
        self.dirty = true;
        leaf
    }

    /// Find the member chunk containing a sheet-local point and resolve it
    /// down below `max_area`
    pub fn chunk_at<R: Rng + ?Sized>(
        &mut self,
        graph: &mut ChunkGraph,
        point: Vec2,
        rng: &mut R,
    ) -> Option<ChunkId> {
        let hit = self
            .chunks(graph)
            .iter()
            .copied()
            .find(|&c| graph.triangle(c).contains_point(point))?;
        Some(self.resolve_chunk(graph, hit, point, rng))
    }

    /// Delete `doomed` and split what is left into connected sheets.
    ///
    /// Returns no sheets when nothing survives. Otherwise the first sheet is
    /// this one with a surviving root; any further sheets share its
    /// `max_area`. Callers must not rely on the order beyond that.
    pub fn remove_chunks(mut self, graph: &mut ChunkGraph, doomed: &[ChunkId]) -> Vec<Sheet> {
        let doomed: BTreeSet<ChunkId> = doomed.iter().copied().collect();
        let mut pool = self.chunks(graph).clone();
        for &c in &doomed {
            assert!(pool.remove(&c), "chunk {c} is not part of this sheet");
        }
        for &c in &doomed {
            graph.set_deleted(c);
        }

        let Some(&root) = pool.first() else {
            return Vec::new();
        };
        self.root = root;
        self.dirty = true;
        for c in self.chunks(graph) {
            pool.remove(c);
        }

        let max_area = self.max_area;
        let mut sheets = vec![self];
        while let Some(&root) = pool.first() {
            let mut sheet = Sheet::new(root).with_max_area(max_area);
            for c in sheet.chunks(graph) {
                pool.remove(c);
            }
            sheets.push(sheet);
        }
        sheets
    }
}
