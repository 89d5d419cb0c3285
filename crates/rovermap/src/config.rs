use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::classify::ClassifyConfig;
use crate::rectify::RectifyConfig;
use crate::state::Tunables;

const DEFAULT_WORLD_SIZE: usize = 200;

/// Top-level pipeline configuration.
///
/// Every section has defaults, so a JSON file only needs the fields it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoverConfig {
    /// Camera calibration for the perspective warp.
    pub rectify: RectifyConfig,
    /// Pixel classification thresholds.
    pub classify: ClassifyConfig,
    /// Driving set-points copied into each new `RoverState`.
    pub tunables: Tunables,
    /// Side length of the square world grid (cells).
    pub world_size: usize,
}

impl Default for RoverConfig {
    fn default() -> Self {
        Self {
            rectify: RectifyConfig::default(),
            classify: ClassifyConfig::default(),
            tunables: Tunables::default(),
            world_size: DEFAULT_WORLD_SIZE,
        }
    }
}

impl RoverConfig {
    /// Load from a JSON file and validate.
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Self = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.world_size == 0 {
            return Err("world_size must be at least 1".to_string());
        }
        if !(self.rectify.dst_size.is_finite() && self.rectify.dst_size > 0.0) {
            return Err(format!(
                "rectify.dst_size must be positive, got {}",
                self.rectify.dst_size
            ));
        }
        let t = &self.tunables;
        if !(t.max_vel.is_finite() && t.throttle_set.is_finite() && t.brake_set >= 0.0) {
            return Err("tunables must be finite and brake_set non-negative".to_string());
        }
        Ok(())
    }
}
