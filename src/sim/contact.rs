//! Contact classification
//!
//! Only contacts involving an agent matter. An agent touching a chunk
//! fixture bumps that chunk; an agent touching a prop takes it.

use std::collections::{BTreeMap, BTreeSet};

use crate::physics::{BodyHandle, ContactPair, FixtureHandle};
use crate::tessellation::ChunkId;

/// What a fixture belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureRole {
    Agent(BodyHandle),
    Chunk { body: BodyHandle, chunk: ChunkId },
    Prop(BodyHandle),
    Other,
}

/// Agent contacts from one step, grouped for processing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bumps {
    /// Bumped chunk fixtures by owning ice body
    pub chunks: BTreeMap<BodyHandle, BTreeSet<FixtureHandle>>,
    /// Bumped prop to the agent that bumped it (last one wins)
    pub props: BTreeMap<BodyHandle, BodyHandle>,
}

impl Bumps {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty() && self.props.is_empty()
    }
}

/// Sort contact pairs into bumped chunks and bumped props
pub fn sort_contacts(pairs: &[ContactPair], role: impl Fn(FixtureHandle) -> FixtureRole) -> Bumps {
    let mut bumps = Bumps::default();
    for pair in pairs {
        let (agent, other) = match (role(pair.a), role(pair.b)) {
            (FixtureRole::Agent(agent), _) => (agent, pair.b),
            (_, FixtureRole::Agent(agent)) => (agent, pair.a),
            _ => continue,
        };
        match role(other) {
            FixtureRole::Chunk { body, .. } => {
                bumps.chunks.entry(body).or_default().insert(other);
            }
            FixtureRole::Prop(prop) => {
                bumps.props.insert(prop, agent);
            }
            FixtureRole::Agent(_) | FixtureRole::Other => {}
        }
    }
    bumps
}
