//! World settings
//!
//! Stored as JSON next to the binary. Missing fields take their defaults so
//! older files keep loading.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::*;
use crate::level::is_valid_max_area;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("default_max_area must be positive, got {0}")]
    BadMaxArea(f32),
}

/// Tunables for an [`crate::sim::IceWorld`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldSettings {
    // === Stepping ===
    /// Fixed physics time step in seconds
    pub time_step: f32,
    pub velocity_iterations: u32,
    pub position_iterations: u32,

    // === Ice ===
    /// Density of every ice fixture
    pub ice_density: f32,
    /// Linear and angular damping of ice sheets drifting in water
    pub water_viscosity: f32,
    /// `max_area` given to sheets built without one
    pub default_max_area: f32,

    // === Other bodies ===
    pub agent_density: f32,
    /// Props are squares of this half side length
    pub prop_half_extent: f32,
    pub prop_density: f32,
    /// Thickness of the static walls around level bounds
    pub wall_thickness: f32,

    /// Seed for every random split
    pub seed: u64,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            time_step: SIM_DT,
            velocity_iterations: VELOCITY_ITERATIONS,
            position_iterations: POSITION_ITERATIONS,

            ice_density: ICE_DENSITY,
            water_viscosity: WATER_VISCOSITY,
            default_max_area: DEFAULT_MAX_AREA,

            agent_density: AGENT_DENSITY,
            prop_half_extent: PROP_HALF_EXTENT,
            prop_density: PROP_DENSITY,
            wall_thickness: WALL_THICKNESS,

            seed: 0x1CE,
        }
    }
}

impl WorldSettings {
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !is_valid_max_area(self.default_max_area) {
            return Err(SettingsError::BadMaxArea(self.default_max_area));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load settings from a JSON file, falling back to defaults if the file
    /// is missing, unreadable or invalid
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let loaded = fs::read_to_string(path)
            .map_err(SettingsError::from)
            .and_then(|s| Self::from_json(&s));
        match loaded {
            Ok(settings) => {
                log::info!("Loaded settings from {}", path.display());
                settings
            }
            Err(e) => {
                log::warn!("Using default settings ({}): {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        fs::write(path.as_ref(), self.to_json()?)?;
        log::info!("Settings saved to {}", path.as_ref().display());
        Ok(())
    }
}
