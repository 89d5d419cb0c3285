//! High-level per-tick API.
//!
//! [`Rover`] is the primary entry point. It holds the calibrated rectifier
//! and classification thresholds; the mutable mission state lives in a
//! caller-owned [`RoverState`].

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::config::RoverConfig;
use crate::decision::decision_step;
use crate::perception::{perception_step, PerceptionReport};
use crate::rectify::{FrameError, RectifyError, Rectifier};
use crate::state::{Control, Mode, RoverState, Telemetry};

/// Result of one control tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub perception: PerceptionReport,
    pub control: Control,
    pub mode: Mode,
    pub send_pickup: bool,
}

/// Perception + decision pipeline.
///
/// Create once per mission, tick on every frame.
///
/// # Examples
///
/// ```
/// use image::{Rgb, RgbImage};
/// use rovermap::{Rover, RoverConfig, Telemetry};
///
/// let rover = Rover::new(RoverConfig::default()).unwrap();
/// let mut state = rover.new_state();
/// let frame = RgbImage::from_pixel(320, 160, Rgb([200, 190, 180]));
/// let telemetry = Telemetry { pos: [100.0, 100.0], ..Telemetry::default() };
///
/// let report = rover.tick(&mut state, &frame, &telemetry).unwrap();
/// assert!(report.perception.navigable_px > 0);
/// ```
#[derive(Debug, Clone)]
pub struct Rover {
    config: RoverConfig,
    rectifier: Rectifier,
}

impl Rover {
    pub fn new(config: RoverConfig) -> Result<Self, RectifyError> {
        config.validate().map_err(RectifyError::InvalidConfig)?;
        let rectifier = Rectifier::new(config.rectify.clone())?;
        Ok(Self { config, rectifier })
    }

    pub fn config(&self) -> &RoverConfig {
        &self.config
    }

    pub fn rectifier(&self) -> &Rectifier {
        &self.rectifier
    }

    /// Fresh mission state sized for this configuration.
    pub fn new_state(&self) -> RoverState {
        RoverState::new(&self.config)
    }

    /// Perception only: update bearings, overlay and world map.
    pub fn perceive(
        &self,
        state: &mut RoverState,
        frame: &RgbImage,
    ) -> Result<PerceptionReport, FrameError> {
        perception_step(state, frame, &self.rectifier, &self.config.classify)
    }

    /// Decision only, from whatever perception left in `state`.
    pub fn decide(&self, state: &mut RoverState) -> Control {
        decision_step(state)
    }

    /// Full control tick: apply telemetry, perceive, decide.
    ///
    /// A malformed frame is rejected before `state` is modified.
    pub fn tick(
        &self,
        state: &mut RoverState,
        frame: &RgbImage,
        telemetry: &Telemetry,
    ) -> Result<TickReport, FrameError> {
        self.rectifier.check_frame(frame)?;
        state.apply_telemetry(telemetry);
        let perception = self.perceive(state, frame)?;
        let control = self.decide(state);
        Ok(TickReport {
            perception,
            control,
            mode: state.mode,
            send_pickup: state.send_pickup,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ground_frame, place_rock, terrain_frame};
    use crate::worldmap::MapChannel;
    use image::Rgb;

    fn at(pos: [f64; 2]) -> Telemetry {
        Telemetry {
            pos,
            ..Telemetry::default()
        }
    }

    #[test]
    fn open_terrain_drives_forward() {
        let rover = Rover::new(RoverConfig::default()).unwrap();
        let mut state = rover.new_state();
        let t = Telemetry {
            vel: 1.0,
            ..at([100.0, 100.0])
        };
        let r = rover.tick(&mut state, &terrain_frame(), &t).unwrap();
        assert_eq!(r.mode, Mode::Forward);
        assert!((r.control.throttle - 0.2).abs() < 1e-12);
        assert!(r.control.steer.abs() < 1.0);
        assert_eq!(state.start_position, Some([100.0, 100.0]));
        assert!(state.worldmap.explored_cells() > 0);
    }

    #[test]
    fn dark_frame_creeps_and_maps_obstacles() {
        let rover = Rover::new(RoverConfig::default()).unwrap();
        let mut state = rover.new_state();
        let wall = ground_frame(Rgb([40, 40, 40]));

        // Dark frame: no navigable bearings at all, so the rover creeps.
        let r = rover.tick(&mut state, &wall, &at([50.0, 50.0])).unwrap();
        assert_eq!(r.perception.navigable_px, 0);
        assert_eq!(r.control, Control::new(0.2, 0.0, 0.0));
        assert!(state.worldmap.channel(MapChannel::Obstacle).iter().any(|&v| v > 0));
    }

    #[test]
    fn approach_and_pickup_sequence() {
        let rover = Rover::new(RoverConfig::default()).unwrap();
        let mut state = rover.new_state();
        let frame = place_rock(terrain_frame());

        let moving = Telemetry {
            vel: 0.5,
            ..at([100.0, 100.0])
        };
        let r = rover.tick(&mut state, &frame, &moving).unwrap();
        assert!(r.perception.sample_detected);
        assert!((r.control.throttle - 0.2).abs() < 1e-12);
        assert!(!state.sample_detected);

        let beside = Telemetry {
            vel: 0.0,
            near_sample: true,
            ..at([100.0, 100.0])
        };
        let r = rover.tick(&mut state, &frame, &beside).unwrap();
        assert_eq!(r.control.brake, state.tunables.brake_set);
        assert!(r.send_pickup);
        assert!(state.take_pickup_request());
        assert!(!state.send_pickup);
    }

    #[test]
    fn malformed_frame_is_rejected_before_state_changes() {
        let rover = Rover::new(RoverConfig::default()).unwrap();
        let mut state = rover.new_state();
        let err = rover
            .tick(&mut state, &RgbImage::new(10, 10), &at([1.0, 2.0]))
            .unwrap_err();
        assert!(matches!(err, FrameError::Dimensions { .. }));
        assert_eq!(state.pos, [0.0, 0.0]);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = RoverConfig {
            world_size: 0,
            ..RoverConfig::default()
        };
        assert!(matches!(Rover::new(cfg), Err(RectifyError::InvalidConfig(_))));
    }
}
