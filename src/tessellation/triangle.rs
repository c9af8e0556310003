//! Triangle geometry for ice chunks
//!
//! A triangle always stores its vertices in clockwise order. Edge `i` runs
//! from vertex `i` to vertex `(i + 1) % 3`, and its opposite vertex is
//! `(i + 2) % 3`. Edge directions and lengths are cached at construction.

use glam::Vec2;
use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use serde::{Deserialize, Serialize};

/// An immutable, clockwise-wound triangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[Vec2; 3]", into = "[Vec2; 3]")]
pub struct Triangle {
    vertices: [Vec2; 3],
    /// `vertices[(i + 1) % 3] - vertices[i]`
    directions: [Vec2; 3],
    lengths: [f32; 3],
}

impl Triangle {
    /// Build a triangle from three points, reflecting it if it winds
    /// counter-clockwise.
    pub fn new(a: Vec2, b: Vec2, c: Vec2) -> Self {
        if winds_clockwise(a, b, c) {
            Self::from_clockwise(a, b, c)
        } else {
            Self::from_clockwise(c, b, a)
        }
    }

    /// Build a triangle whose vertex order is already known to be clockwise.
    ///
    /// Subdivision uses this so the halves keep their edge numbering even when
    /// a half is degenerate.
    pub(crate) fn from_clockwise(a: Vec2, b: Vec2, c: Vec2) -> Self {
        let vertices = [a, b, c];
        let directions = [b - a, c - b, a - c];
        let lengths = directions.map(Vec2::length);
        Self {
            vertices,
            directions,
            lengths,
        }
    }

    #[inline]
    pub fn vertex(&self, i: usize) -> Vec2 {
        self.vertices[i]
    }

    #[inline]
    pub fn vertices(&self) -> [Vec2; 3] {
        self.vertices
    }

    /// View of edge `i` (0, 1 or 2)
    #[inline]
    pub fn edge(&self, i: usize) -> Edge<'_> {
        assert!(i < 3, "edge index {i} out of range");
        Edge {
            triangle: self,
            index: i,
        }
    }

    pub fn edges(&self) -> [Edge<'_>; 3] {
        [self.edge(0), self.edge(1), self.edge(2)]
    }

    /// Area via the shoelace formula
    pub fn area(&self) -> f32 {
        let v1 = self.vertices[1] - self.vertices[0];
        let v2 = self.vertices[2] - self.vertices[0];
        0.5 * v1.perp_dot(v2).abs()
    }

    pub fn is_clockwise(&self) -> bool {
        winds_clockwise(self.vertices[0], self.vertices[1], self.vertices[2])
    }

    pub fn centroid(&self) -> Vec2 {
        (self.vertices[0] + self.vertices[1] + self.vertices[2]) / 3.0
    }

    /// Inclusive point test. Interior points lie to the right of every edge.
    pub fn contains_point(&self, p: Vec2) -> bool {
        (0..3).all(|i| self.directions[i].perp_dot(p - self.vertices[i]) <= 0.0)
    }

    /// Pick an edge at random, weighting each by `1 - cos(opposite angle)`.
    ///
    /// Splitting across wide angles keeps subdivision from producing long
    /// slivers.
    pub fn random_edge_weighted_by_angle<R: Rng + ?Sized>(&self, rng: &mut R) -> Edge<'_> {
        let weights = self.edges().map(|e| {
            let v1 = (e.first() - e.opposite()).normalize_or_zero();
            let v2 = (e.second() - e.opposite()).normalize_or_zero();
            (1.0 - v1.dot(v2)).max(0.0)
        });
        let index = match WeightedIndex::<f32>::new(weights) {
            Ok(dist) => dist.sample(rng),
            // Clamped weights are never all zero
            Err(_) => 2,
        };
        self.edge(index)
    }
}

impl From<[Vec2; 3]> for Triangle {
    fn from(v: [Vec2; 3]) -> Self {
        Triangle::new(v[0], v[1], v[2])
    }
}

impl From<Triangle> for [Vec2; 3] {
    fn from(t: Triangle) -> Self {
        t.vertices
    }
}

/// Sign test on the cross product of successive edge vectors
#[inline]
pub fn winds_clockwise(a: Vec2, b: Vec2, c: Vec2) -> bool {
    (b - a).perp_dot(c - b) < 0.0
}

/// One edge of a triangle
#[derive(Debug, Clone, Copy)]
pub struct Edge<'a> {
    triangle: &'a Triangle,
    index: usize,
}

impl<'a> Edge<'a> {
    #[inline]
    pub fn triangle(&self) -> &'a Triangle {
        self.triangle
    }

    /// Index of this edge in its triangle, which is also the index of its
    /// first endpoint
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn first(&self) -> Vec2 {
        self.triangle.vertices[self.index]
    }

    #[inline]
    pub fn second(&self) -> Vec2 {
        self.triangle.vertices[(self.index + 1) % 3]
    }

    #[inline]
    pub fn opposite(&self) -> Vec2 {
        self.triangle.vertices[(self.index + 2) % 3]
    }

    /// `second - first`, not normalized
    #[inline]
    pub fn direction(&self) -> Vec2 {
        self.triangle.directions[self.index]
    }

    #[inline]
    pub fn length(&self) -> f32 {
        self.triangle.lengths[self.index]
    }

    /// Scalar projection of `p` onto this edge's axis, measured from `first`
    /// and scaled by the edge length
    #[inline]
    pub fn project(&self, p: Vec2) -> f32 {
        (p - self.first()).dot(self.direction())
    }
}

/// Edges are equal when they belong to the same triangle and join the same
/// (unordered) pair of vertices.
impl PartialEq for Edge<'_> {
    fn eq(&self, other: &Self) -> bool {
        if !std::ptr::eq(self.triangle, other.triangle) {
            return false;
        }
        let ours = (self.index, (self.index + 1) % 3);
        let theirs = (other.index, (other.index + 1) % 3);
        ours == theirs || ours == (theirs.1, theirs.0)
    }
}

impl Eq for Edge<'_> {}
