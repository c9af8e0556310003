//! Breakable ice geometry
//!
//! Pure data and algorithms, no physics:
//! - `triangle`: clockwise triangles and their edges
//! - `chunk`: the chunk adjacency graph, splitting and deletion
//! - `sheet`: connected components, perimeter tracing and partitioning
//! - `random`: explicit-RNG sampling helpers

pub mod chunk;
pub mod random;
pub mod sheet;
pub mod triangle;

pub use chunk::{Chunk, ChunkGraph, ChunkId, Link};
pub use sheet::Sheet;
pub use triangle::{Edge, Triangle};
