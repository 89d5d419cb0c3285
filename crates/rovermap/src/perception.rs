//! One perception pass: rectify, classify, transform, fuse.

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::classify::{classify, ClassifyConfig};
use crate::coords::{rover_coords, BearingDistribution, WorldTransform};
use crate::rectify::{FrameError, Rectifier};
use crate::state::RoverState;
use crate::worldmap::{attitude_valid, MapChannel};

/// Summary of a perception pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PerceptionReport {
    pub navigable_px: usize,
    pub obstacle_px: usize,
    pub sample_px: usize,
    /// Whether this frame was fused into the world map.
    pub fused: bool,
    pub sample_detected: bool,
}

/// Run perception on `frame` and update `rover` in place.
///
/// The frame is validated before anything in `rover` changes. Empty
/// detections are not errors; they leave an empty bearing distribution.
pub fn perception_step(
    rover: &mut RoverState,
    frame: &RgbImage,
    rectifier: &Rectifier,
    classify_cfg: &ClassifyConfig,
) -> Result<PerceptionReport, FrameError> {
    let rectified = rectifier.rectify(frame)?;
    let masks = classify(&rectified.image, &rectified.valid, classify_cfg);
    rover.vision_image = masks.overlay();

    let terrain = rover_coords(&masks.navigable);
    let obstacle = rover_coords(&masks.obstacle);
    let rock = rover_coords(&masks.sample);

    let to_world = WorldTransform {
        pos: rover.pos,
        yaw_deg: rover.yaw,
        scale: rectifier.world_scale(),
        world_size: rover.worldmap.size(),
    };
    let rock_cells = to_world.to_cells(&rock);

    let fused = attitude_valid(rover.pitch, rover.roll);
    if fused {
        let map = &mut rover.worldmap;
        map.accumulate(MapChannel::Obstacle, &to_world.to_cells(&obstacle));
        map.accumulate(MapChannel::Sample, &rock_cells);
        map.accumulate(MapChannel::Navigable, &to_world.to_cells(&terrain));
    } else {
        tracing::debug!(
            pitch = rover.pitch,
            roll = rover.roll,
            "attitude out of tolerance, map not updated"
        );
    }

    let sample_detected = !rock.is_empty();
    rover.nav = if sample_detected {
        let polar = BearingDistribution::from_points(&rock);
        rover.sample_detected = true;
        if let (true, Some(i)) = (fused, polar.nearest()) {
            rover.worldmap.bump(MapChannel::Sample, rock_cells[i]);
        }
        polar
    } else {
        BearingDistribution::from_points(&terrain)
    };

    let report = PerceptionReport {
        navigable_px: terrain.len(),
        obstacle_px: obstacle.len(),
        sample_px: rock.len(),
        fused,
        sample_detected,
    };
    tracing::debug!(
        nav = report.navigable_px,
        obs = report.obstacle_px,
        rock = report.sample_px,
        fused,
        "perception"
    );
    Ok(report)
}
