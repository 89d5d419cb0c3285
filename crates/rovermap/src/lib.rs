//! rovermap: perception-to-action pipeline for a camera-driven exploration
//! rover.
//!
//! Every control tick runs:
//!
//! 1. **Rectify** – perspective warp of the camera frame into a top-down
//!    rover-frame view.
//! 2. **Classify** – navigable terrain, obstacle and sample-rock masks from
//!    per-pixel color predicates.
//! 3. **Coords** – mask pixels → rover frame → polar bearings and world-grid
//!    cells.
//! 4. **World map** – per-class hit counters, updated only while the rover
//!    sits level.
//! 5. **Decision** – finite-state navigation policy (forward / stop / stuck)
//!    producing throttle, brake and steer.
//!
//! # Public API
//! - [`Rover`] runs ticks; [`RoverConfig`] tunes it.
//! - [`RoverState`] is the caller-owned mission record.
//! - [`decision::step`] is the pure policy transition, usable on its own.

mod api;
pub mod classify;
mod config;
pub mod coords;
pub mod decision;
mod homography;
pub mod perception;
pub mod rectify;
mod state;
pub mod worldmap;

#[cfg(test)]
pub(crate) mod test_utils;

pub use api::{Rover, TickReport};
pub use config::RoverConfig;
pub use homography::{Homography, HomographyError};
pub use perception::PerceptionReport;
pub use rectify::{FrameError, RectifyError};
pub use state::{Control, Mode, RoverState, Telemetry, Tunables};
pub use worldmap::{MapChannel, WorldMap};
