//! Perspective rectification of the rover camera frame into a top-down view.
//!
//! The camera is rigidly mounted, so the ground-plane transform is computed
//! once from a calibrated quadrilateral and reused every tick. The
//! destination square is anchored at the bottom-center of the image, which
//! places the rover's contact point at `(W/2, H)` in the rectified frame.

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::homography::{Homography, HomographyError};

/// Frame size the calibration points were measured on.
pub const CALIBRATION_SIZE: [u32; 2] = [320, 160];

/// Calibrated ground-plane reference points in the raw camera frame,
/// ordered bottom-left, bottom-right, top-right, top-left.
pub const DEFAULT_SOURCE_QUAD: [[f64; 2]; 4] =
    [[14.0, 140.0], [301.0, 140.0], [200.0, 96.0], [118.0, 96.0]];

/// Camera calibration for the rectifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectifyConfig {
    /// Expected frame dimensions [width, height].
    pub image_size: [u32; 2],
    /// Source quadrilateral (pixels), same corner order as the destination.
    pub source_quad: [[f64; 2]; 4],
    /// Half-width of the destination square (pixels). One world unit spans
    /// `2 * dst_size` rectified pixels.
    pub dst_size: f64,
    /// Gap between the destination square and the bottom image edge (pixels).
    pub bottom_offset: f64,
}

impl Default for RectifyConfig {
    fn default() -> Self {
        Self {
            image_size: CALIBRATION_SIZE,
            source_quad: DEFAULT_SOURCE_QUAD,
            dst_size: 5.0,
            bottom_offset: 6.0,
        }
    }
}

impl RectifyConfig {
    /// Destination rectangle matching `source_quad` corner for corner.
    pub fn destination_quad(&self) -> [[f64; 2]; 4] {
        let cx = self.image_size[0] as f64 / 2.0;
        let bottom = self.image_size[1] as f64 - self.bottom_offset;
        let top = bottom - 2.0 * self.dst_size;
        [
            [cx - self.dst_size, bottom],
            [cx + self.dst_size, bottom],
            [cx + self.dst_size, top],
            [cx - self.dst_size, top],
        ]
    }

    /// Rectified pixels per world-grid unit.
    pub fn world_scale(&self) -> f64 {
        2.0 * self.dst_size
    }
}

// ── Errors ───────────────────────────────────────────────────────────────

/// A frame that violates the rectifier's input contract.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameError {
    Dimensions { expected: [u32; 2], got: [u32; 2] },
    ColorType(String),
    BufferLength { expected: usize, got: usize },
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dimensions { expected, got } => write!(
                f,
                "frame is {}x{}, expected {}x{}",
                got[0], got[1], expected[0], expected[1]
            ),
            Self::ColorType(c) => write!(f, "frame must be 8-bit RGB, got {}", c),
            Self::BufferLength { expected, got } => {
                write!(f, "frame buffer holds {} bytes, expected {}", got, expected)
            }
        }
    }
}

impl std::error::Error for FrameError {}

/// Calibration that cannot produce a usable transform.
#[derive(Debug, Clone, PartialEq)]
pub enum RectifyError {
    InvalidConfig(String),
    Homography(HomographyError),
    Singular,
}

impl std::fmt::Display for RectifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid rectifier config: {}", msg),
            Self::Homography(e) => write!(f, "perspective fit failed: {}", e),
            Self::Singular => write!(f, "perspective transform is not invertible"),
        }
    }
}

impl std::error::Error for RectifyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Homography(e) => Some(e),
            _ => None,
        }
    }
}

impl From<HomographyError> for RectifyError {
    fn from(e: HomographyError) -> Self {
        Self::Homography(e)
    }
}

// ── Frame constructors ───────────────────────────────────────────────────

/// Accept a decoded image as a camera frame. Anything other than 8-bit RGB
/// is rejected rather than silently converted.
pub fn frame_from_dynamic(img: DynamicImage) -> Result<RgbImage, FrameError> {
    match img {
        DynamicImage::ImageRgb8(rgb) => Ok(rgb),
        other => Err(FrameError::ColorType(format!("{:?}", other.color()))),
    }
}

/// Wrap a packed RGB8 buffer as a frame.
pub fn frame_from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<RgbImage, FrameError> {
    let expected = width as usize * height as usize * 3;
    let got = data.len();
    RgbImage::from_raw(width, height, data).ok_or(FrameError::BufferLength { expected, got })
}

// ── Rectifier ────────────────────────────────────────────────────────────

/// Output of one rectification pass.
#[derive(Debug, Clone)]
pub struct Rectified {
    /// Top-down view, same size as the input frame.
    pub image: RgbImage,
    /// 1 where the destination pixel maps back inside the camera frame,
    /// 0 where it was extrapolated.
    pub valid: GrayImage,
}

/// Precomputed perspective warp.
#[derive(Debug, Clone)]
pub struct Rectifier {
    config: RectifyConfig,
    forward: Homography,
    inverse: Homography,
}

impl Rectifier {
    pub fn new(config: RectifyConfig) -> Result<Self, RectifyError> {
        if config.image_size[0] == 0 || config.image_size[1] == 0 {
            return Err(RectifyError::InvalidConfig("image_size must be non-zero".into()));
        }
        if !(config.dst_size.is_finite() && config.dst_size > 0.0) {
            return Err(RectifyError::InvalidConfig(format!(
                "dst_size must be positive, got {}",
                config.dst_size
            )));
        }
        let dst = config.destination_quad();
        let forward = Homography::from_correspondences(&config.source_quad, &dst)?;
        let inverse = forward.inverse().ok_or(RectifyError::Singular)?;
        Ok(Self {
            config,
            forward,
            inverse,
        })
    }

    pub fn config(&self) -> &RectifyConfig {
        &self.config
    }

    /// Camera → top-down transform.
    pub fn homography(&self) -> &Homography {
        &self.forward
    }

    /// Rectified pixels per world-grid unit.
    pub fn world_scale(&self) -> f64 {
        self.config.world_scale()
    }

    /// Reject frames that do not match the calibration resolution.
    pub fn check_frame(&self, frame: &RgbImage) -> Result<(), FrameError> {
        let got = [frame.width(), frame.height()];
        if got != self.config.image_size {
            return Err(FrameError::Dimensions {
                expected: self.config.image_size,
                got,
            });
        }
        Ok(())
    }

    /// Warp `frame` into the top-down rover view.
    pub fn rectify(&self, frame: &RgbImage) -> Result<Rectified, FrameError> {
        self.check_frame(frame)?;
        let (w, h) = frame.dimensions();
        let mut image = RgbImage::new(w, h);
        let mut valid = GrayImage::new(w, h);

        for y in 0..h {
            for x in 0..w {
                let [sx, sy] = self.inverse.project(x as f64, y as f64);
                if let Some(px) = bilinear_sample_rgb(frame, sx, sy) {
                    image.put_pixel(x, y, Rgb(px));
                    valid.put_pixel(x, y, Luma([1]));
                }
            }
        }

        tracing::trace!(
            valid_px = valid.pixels().filter(|p| p[0] != 0).count(),
            "frame rectified"
        );
        Ok(Rectified { image, valid })
    }
}

/// Sample an RGB image at a sub-pixel position with bilinear interpolation.
/// Returns `None` outside `[0, w-1] × [0, h-1]` or for non-finite input.
#[inline]
fn bilinear_sample_rgb(img: &RgbImage, x: f64, y: f64) -> Option<[u8; 3]> {
    let (w, h) = img.dimensions();
    if !(x.is_finite() && y.is_finite()) {
        return None;
    }
    if x < 0.0 || y < 0.0 || x > (w - 1) as f64 || y > (h - 1) as f64 {
        return None;
    }
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let p00 = img.get_pixel(x0, y0);
    let p10 = img.get_pixel(x1, y0);
    let p01 = img.get_pixel(x0, y1);
    let p11 = img.get_pixel(x1, y1);

    let mut out = [0u8; 3];
    for (c, o) in out.iter_mut().enumerate() {
        let v = (1.0 - fx) * (1.0 - fy) * p00[c] as f64
            + fx * (1.0 - fy) * p10[c] as f64
            + (1.0 - fx) * fy * p01[c] as f64
            + fx * fy * p11[c] as f64;
        *o = v.round().clamp(0.0, 255.0) as u8;
    }
    Some(out)
}
