//! World state types
//!
//! Events reported to the caller and the per-body bookkeeping that ties a
//! sheet to its physics body.

use std::collections::BTreeMap;

use glam::Vec2;

use crate::physics::{BodyHandle, FixtureHandle};
use crate::tessellation::{ChunkId, Sheet};

/// Something the game layer may want to react to
#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    /// A chunk broke off a sheet. Fires once per deleted chunk.
    IceBroken {
        body: BodyHandle,
        /// Id the chunk had when it broke. It stays valid while the chunk
        /// borders live ice; after garbage collection frees it, a new chunk
        /// may reuse the id.
        chunk: ChunkId,
        /// World-space centroid of the chunk
        position: Vec2,
        area: f32,
    },
    /// A body lost ice and fell apart into several bodies
    SheetSplit { from: BodyHandle, into: Vec<BodyHandle> },
    /// A body lost its last chunk (or its last collision shape)
    SheetSunk { body: BodyHandle },
    /// An agent bumped into a prop and took it
    PropTaken { agent: BodyHandle, prop: BodyHandle },
}

/// Where the contact pipeline currently is.
///
/// A batch runs Collect, Classify, Mutate, Resync and returns to Idle before
/// control goes back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchStage {
    #[default]
    Idle,
    /// Grouping bumped fixtures by body
    Collect,
    /// Deciding split versus delete per chunk
    Classify,
    /// Changing the chunk graph
    Mutate,
    /// Rebuilding bodies and fixtures to match
    Resync,
}

/// A sheet and its physics body's collision shapes
#[derive(Debug, Clone)]
pub struct SheetBody {
    pub sheet: Sheet,
    /// One fixture per bare chunk
    pub fixtures: BTreeMap<ChunkId, FixtureHandle>,
}

impl SheetBody {
    pub fn new(sheet: Sheet) -> Self {
        Self {
            sheet,
            fixtures: BTreeMap::new(),
        }
    }
}
