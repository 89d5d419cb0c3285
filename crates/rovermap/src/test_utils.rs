//! Synthetic camera frames for unit tests.

use image::{Rgb, RgbImage};

use crate::rectify::CALIBRATION_SIZE;

/// Calibration-size frame filled with one color.
pub(crate) fn ground_frame(color: Rgb<u8>) -> RgbImage {
    RgbImage::from_pixel(CALIBRATION_SIZE[0], CALIBRATION_SIZE[1], color)
}

/// Open, bright sand in every direction.
pub(crate) fn terrain_frame() -> RgbImage {
    ground_frame(Rgb([200, 190, 180]))
}

/// Paint a yellow sample rock just below the horizon, slightly ahead.
pub(crate) fn place_rock(mut frame: RgbImage) -> RgbImage {
    for y in 90..100 {
        for x in 140..180 {
            frame.put_pixel(x, y, Rgb([200, 160, 40]));
        }
    }
    frame
}
