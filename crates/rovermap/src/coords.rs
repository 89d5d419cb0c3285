//! Rectified-image pixels → rover frame → polar / world grid.
//!
//! Rover frame: origin at the ground contact point (bottom-center of the
//! rectified image), `x` forward, `y` to the left. World grid: square cells
//! of one world unit, addressed `[x, y]`.

use image::GrayImage;

/// Set pixels of `mask` in rover-frame coordinates, row-major order.
pub fn rover_coords(mask: &GrayImage) -> Vec<[f64; 2]> {
    let (w, h) = mask.dimensions();
    let half_w = w as f64 / 2.0;
    mask.enumerate_pixels()
        .filter(|(_, _, p)| p[0] != 0)
        .map(|(c, r, _)| [-(r as f64 - h as f64), -(c as f64 - half_w)])
        .collect()
}

/// Polar samples: parallel distance and bearing arrays.
///
/// Bearings are radians, 0 straight ahead, positive to the left.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BearingDistribution {
    pub dists: Vec<f64>,
    pub angles: Vec<f64>,
}

impl BearingDistribution {
    pub fn from_points(points: &[[f64; 2]]) -> Self {
        let (dists, angles) = points
            .iter()
            .map(|&[x, y]| ((x * x + y * y).sqrt(), y.atan2(x)))
            .unzip();
        Self { dists, angles }
    }

    pub fn len(&self) -> usize {
        self.angles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.angles.is_empty()
    }

    /// Index of the closest sample.
    pub fn nearest(&self) -> Option<usize> {
        self.dists
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
    }

    /// Mean bearing in degrees clamped to `[min_deg, max_deg]`.
    pub fn mean_deg_clamped(&self, min_deg: f64, max_deg: f64) -> f64 {
        mean_bearing_deg(&self.angles, min_deg, max_deg)
    }
}

/// Population mean of `angles` (radians) in degrees, clamped to
/// `[min_deg, max_deg]`. Empty input, or a mean that is not finite, gives 0.
pub fn mean_bearing_deg(angles: &[f64], min_deg: f64, max_deg: f64) -> f64 {
    if angles.is_empty() {
        return 0.0;
    }
    let mean = angles.iter().sum::<f64>() / angles.len() as f64;
    let deg = mean.to_degrees();
    if !deg.is_finite() {
        return 0.0;
    }
    deg.clamp(min_deg, max_deg)
}

/// Rover pose used for the rover → world transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldTransform {
    /// Rover world position.
    pub pos: [f64; 2],
    /// Heading in degrees.
    pub yaw_deg: f64,
    /// Rover-frame pixels per world unit.
    pub scale: f64,
    /// Side length of the world grid.
    pub world_size: usize,
}

impl WorldTransform {
    /// Rotate by yaw, scale down, translate, then truncate and clip to the
    /// grid. Non-finite coordinates clip to 0.
    #[inline]
    pub fn to_cell(&self, p: [f64; 2]) -> [usize; 2] {
        let (sin, cos) = self.yaw_deg.to_radians().sin_cos();
        let xr = p[0] * cos - p[1] * sin;
        let yr = p[0] * sin + p[1] * cos;
        let xw = xr / self.scale + self.pos[0];
        let yw = yr / self.scale + self.pos[1];
        [self.clip(xw), self.clip(yw)]
    }

    pub fn to_cells(&self, points: &[[f64; 2]]) -> Vec<[usize; 2]> {
        points.iter().map(|&p| self.to_cell(p)).collect()
    }

    #[inline]
    fn clip(&self, v: f64) -> usize {
        let max = self.world_size.saturating_sub(1);
        if !v.is_finite() || v <= 0.0 {
            return 0;
        }
        // `as` truncates toward zero and saturates on overflow.
        (v.trunc() as usize).min(max)
    }
}
