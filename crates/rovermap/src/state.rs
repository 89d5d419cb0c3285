//! Caller-owned rover record and the small value types around it.

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::config::RoverConfig;
use crate::coords::BearingDistribution;
use crate::worldmap::WorldMap;

/// Navigation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Forward,
    Stop,
    Stuck,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Forward => "forward",
            Self::Stop => "stop",
            Self::Stuck => "stuck",
        })
    }
}

/// Actuator command for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Control {
    pub throttle: f64,
    pub brake: f64,
    /// Steering angle in degrees, positive to the left.
    pub steer: f64,
}

impl Control {
    pub const fn new(throttle: f64, brake: f64, steer: f64) -> Self {
        Self {
            throttle,
            brake,
            steer,
        }
    }
}

/// Driving set-points and navigable-pixel thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tunables {
    /// Cruise throttle.
    pub throttle_set: f64,
    /// Full braking value.
    pub brake_set: f64,
    /// Velocity ceiling for accelerating.
    pub max_vel: f64,
    /// Below this many navigable bearings, forward mode stops.
    pub stop_forward: usize,
    /// At or above this many navigable bearings, stop mode resumes forward.
    pub go_forward: usize,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            throttle_set: 0.2,
            brake_set: 10.0,
            max_vel: 2.0,
            stop_forward: 50,
            go_forward: 500,
        }
    }
}

/// Per-tick kinematic snapshot supplied by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Telemetry {
    pub pos: [f64; 2],
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
    pub vel: f64,
    pub near_sample: bool,
    pub picking_up: bool,
    pub samples_collected: u32,
}

/// Everything the pipeline reads and writes across ticks.
///
/// Created once per mission and mutated in place by
/// [`Rover::tick`](crate::Rover::tick).
#[derive(Debug, Clone)]
pub struct RoverState {
    // Pose.
    pub pos: [f64; 2],
    /// Degrees in `[0, 360)`.
    pub yaw: f64,
    /// Degrees in `[0, 360)`.
    pub pitch: f64,
    /// Degrees in `[0, 360)`.
    pub roll: f64,
    pub vel: f64,

    // Perception outputs.
    /// Bearings of the active class (sample rock if visible, else terrain).
    pub nav: BearingDistribution,
    pub vision_image: RgbImage,
    pub worldmap: WorldMap,

    // Policy.
    pub mode: Mode,
    pub stuck_count: u32,
    pub vel_count: u32,
    /// Consecutive stalled ticks during a sample approach.
    pub sample_stall_ticks: u32,
    pub samples_collected: u32,
    pub sample_detected: bool,
    pub near_sample: bool,
    pub picking_up: bool,
    pub send_pickup: bool,
    pub at_home: bool,
    pub start_position: Option<[f64; 2]>,

    pub tunables: Tunables,
    pub control: Control,
}

impl RoverState {
    pub fn new(config: &RoverConfig) -> Self {
        let [w, h] = config.rectify.image_size;
        Self {
            pos: [0.0, 0.0],
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            vel: 0.0,
            nav: BearingDistribution::default(),
            vision_image: RgbImage::new(w, h),
            worldmap: WorldMap::new(config.world_size),
            mode: Mode::Forward,
            stuck_count: 0,
            vel_count: 0,
            sample_stall_ticks: 0,
            samples_collected: 0,
            sample_detected: false,
            near_sample: false,
            picking_up: false,
            send_pickup: false,
            at_home: true,
            start_position: None,
            tunables: config.tunables.clone(),
            control: Control::default(),
        }
    }

    /// Copy a fresh kinematic snapshot in, normalizing angles to `[0, 360)`.
    pub fn apply_telemetry(&mut self, t: &Telemetry) {
        self.pos = t.pos;
        self.yaw = t.yaw.rem_euclid(360.0);
        self.pitch = t.pitch.rem_euclid(360.0);
        self.roll = t.roll.rem_euclid(360.0);
        self.vel = t.vel;
        self.near_sample = t.near_sample;
        self.picking_up = t.picking_up;
        self.samples_collected = t.samples_collected;
    }

    /// Consume a pending pickup request. The transport layer calls this
    /// after forwarding the request to the simulator.
    pub fn take_pickup_request(&mut self) -> bool {
        std::mem::take(&mut self.send_pickup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telemetry_angles_are_normalized() {
        let mut s = RoverState::new(&RoverConfig::default());
        s.apply_telemetry(&Telemetry {
            pos: [10.0, 20.0],
            yaw: -90.0,
            pitch: 360.25,
            roll: 719.0,
            vel: -0.3,
            ..Telemetry::default()
        });
        assert_eq!(s.yaw, 270.0);
        assert!((s.pitch - 0.25).abs() < 1e-9);
        assert_eq!(s.roll, 359.0);
        assert_eq!(s.vel, -0.3);
        assert_eq!(s.pos, [10.0, 20.0]);
    }

    #[test]
    fn fresh_state_defaults() {
        let s = RoverState::new(&RoverConfig::default());
        assert_eq!(s.mode, Mode::Forward);
        assert!(s.at_home);
        assert!(s.nav.is_empty());
        assert_eq!(s.worldmap.size(), 200);
        assert_eq!(s.vision_image.dimensions(), (320, 160));
    }

    #[test]
    fn mode_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Mode::Stuck).unwrap(), "\"stuck\"");
        assert_eq!(Mode::Stop.to_string(), "stop");
    }
}
