//! Ice simulation on top of a physics engine
//!
//! This module must stay deterministic:
//! - Seeded RNG only, threaded through every split
//! - Stable iteration order (ordered maps keyed by handle)
//! - Graph mutation only between physics steps, never during one

pub mod contact;
pub mod state;
pub mod tick;
pub mod world;

pub use contact::{Bumps, FixtureRole, sort_contacts};
pub use state::{BatchStage, SheetBody, WorldEvent};
pub use tick::split_velocity;
pub use world::IceWorld;
