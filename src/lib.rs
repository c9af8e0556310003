//! Floe Break - breakable ice sheets on a rigid-body world
//!
//! Core modules:
//! - `tessellation`: Triangle chunks, the chunk adjacency graph, sheets
//! - `physics`: The engine interface the simulation drives, plus a sandbox engine
//! - `sim`: `IceWorld`, which keeps sheets and physics bodies in sync
//! - `level`: Sheet and level records (JSON)
//! - `settings`: World tunables

pub mod level;
pub mod physics;
pub mod settings;
pub mod sim;
pub mod tessellation;

pub use level::{Level, LevelError, SheetRecord};
pub use settings::{SettingsError, WorldSettings};
pub use sim::{IceWorld, WorldEvent};

/// Simulation constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    pub const VELOCITY_ITERATIONS: u32 = 8;
    pub const POSITION_ITERATIONS: u32 = 3;

    /// Density of ice fixtures
    pub const ICE_DENSITY: f32 = 2.0;
    /// Damping for bodies drifting in open water; higher looks more viscous
    pub const WATER_VISCOSITY: f32 = 0.1;
    /// Chunks smaller than this break off instead of splitting
    pub const DEFAULT_MAX_AREA: f32 = 1.0;

    pub const AGENT_DENSITY: f32 = 1.0;
    pub const PROP_HALF_EXTENT: f32 = 0.25;
    pub const PROP_DENSITY: f32 = 0.5;
    pub const WALL_THICKNESS: f32 = 1.0;
}
