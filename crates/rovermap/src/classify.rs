//! Per-pixel terrain classification of the rectified frame.
//!
//! Each class is an independent predicate over one RGB pixel. Navigable and
//! obstacle share a threshold triple but are not complements: a pixel with
//! any channel exactly at its threshold, or with channels on both sides,
//! belongs to neither class.

use image::{GrayImage, Luma, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

/// Inclusive bounds on 8-bit HSV (hue in [0, 180)).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    pub low: [u8; 3],
    pub high: [u8; 3],
}

impl HsvRange {
    #[inline]
    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|c| hsv[c] >= self.low[c] && hsv[c] <= self.high[c])
    }
}

/// Thresholds for the three classification rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyConfig {
    /// Navigable if every channel is strictly above; obstacle if every
    /// channel is strictly below.
    pub rgb_thresh: [u8; 3],
    /// Yellow band identifying sample rocks.
    pub sample_hsv: HsvRange,
    /// Drop obstacle pixels that the rectifier extrapolated.
    pub restrict_obstacles_to_view: bool,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            rgb_thresh: [160, 160, 160],
            sample_hsv: HsvRange {
                low: [20, 100, 100],
                high: [25, 255, 255],
            },
            restrict_obstacles_to_view: false,
        }
    }
}

#[inline]
pub fn is_navigable(px: [u8; 3], thresh: [u8; 3]) -> bool {
    px[0] > thresh[0] && px[1] > thresh[1] && px[2] > thresh[2]
}

#[inline]
pub fn is_obstacle(px: [u8; 3], thresh: [u8; 3]) -> bool {
    px[0] < thresh[0] && px[1] < thresh[1] && px[2] < thresh[2]
}

/// Convert an 8-bit RGB pixel to 8-bit HSV.
///
/// Hue is halved to fit a byte (`[0, 180)`); saturation and value span
/// `[0, 255]`.
pub fn rgb_to_hsv(px: [u8; 3]) -> [u8; 3] {
    let r = px[0] as f32;
    let g = px[1] as f32;
    let b = px[2] as f32;
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = v - min;

    let s = if v > 0.0 { 255.0 * delta / v } else { 0.0 };
    let h = if delta == 0.0 {
        0.0
    } else if v == r {
        60.0 * (g - b) / delta
    } else if v == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    [
        // Hue that rounds up to 180 wraps to 0 rather than saturating at 179.
        ((h / 2.0).round() as u32 % 180) as u8,
        s.round().clamp(0.0, 255.0) as u8,
        v as u8,
    ]
}

/// Binary masks for one frame; set pixels hold 1.
#[derive(Debug, Clone)]
pub struct ClassMasks {
    pub navigable: GrayImage,
    pub obstacle: GrayImage,
    pub sample: GrayImage,
}

impl ClassMasks {
    /// True when at least one sample-rock pixel was found.
    pub fn sample_detected(&self) -> bool {
        self.sample.pixels().any(|p| p[0] != 0)
    }

    /// Diagnostic view: obstacle in red, sample in green (only when a sample
    /// is visible), navigable in blue.
    pub fn overlay(&self) -> RgbImage {
        let (w, h) = self.navigable.dimensions();
        let show_sample = self.sample_detected();
        RgbImage::from_fn(w, h, |x, y| {
            let on = |m: &GrayImage| if m.get_pixel(x, y)[0] != 0 { 255 } else { 0 };
            Rgb([
                on(&self.obstacle),
                if show_sample { on(&self.sample) } else { 0 },
                on(&self.navigable),
            ])
        })
    }
}

/// Apply the three rules to a rectified frame.
///
/// `valid` is the rectifier's extrapolation mask; it only matters when
/// `restrict_obstacles_to_view` is enabled.
pub fn classify(image: &RgbImage, valid: &GrayImage, config: &ClassifyConfig) -> ClassMasks {
    let (w, h) = image.dimensions();
    let mut navigable = GrayImage::new(w, h);
    let mut obstacle = GrayImage::new(w, h);
    let mut sample = GrayImage::new(w, h);

    for (x, y, px) in image.enumerate_pixels() {
        let px = px.0;
        if is_navigable(px, config.rgb_thresh) {
            navigable.put_pixel(x, y, Luma([1]));
        }
        if is_obstacle(px, config.rgb_thresh)
            && (!config.restrict_obstacles_to_view || valid.get_pixel(x, y)[0] != 0)
        {
            obstacle.put_pixel(x, y, Luma([1]));
        }
        if config.sample_hsv.contains(rgb_to_hsv(px)) {
            sample.put_pixel(x, y, Luma([1]));
        }
    }

    ClassMasks {
        navigable,
        obstacle,
        sample,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(m: &GrayImage) -> usize {
        m.pixels().filter(|p| p[0] != 0).count()
    }

    #[test]
    fn hsv_matches_reference_values() {
        assert_eq!(rgb_to_hsv([255, 0, 0]), [0, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 255, 0]), [60, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 0, 255]), [120, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 0, 0]), [0, 0, 0]);
        assert_eq!(rgb_to_hsv([128, 128, 128]), [0, 0, 128]);
        // Sample-rock yellow: hue 45°/2 ≈ 22.
        assert_eq!(rgb_to_hsv([200, 160, 40]), [23, 204, 200]);
    }

    #[test]
    fn hue_just_below_red_wraps_to_zero() {
        // 359.76° halves to 179.88, which rounds to 180 and wraps.
        assert_eq!(rgb_to_hsv([255, 0, 1])[0], 0);
        // 354° stays at the top of the range.
        assert_eq!(rgb_to_hsv([255, 0, 25])[0], 177);
    }

    #[test]
    fn boundary_band_is_neither_class() {
        let t = [160, 160, 160];
        assert!(is_navigable([161, 161, 161], t));
        assert!(!is_navigable([160, 200, 200], t));
        assert!(is_obstacle([159, 159, 159], t));
        assert!(!is_obstacle([160, 0, 0], t));
        // Mixed channels fall in the gap.
        let mixed = [200, 100, 200];
        assert!(!is_navigable(mixed, t) && !is_obstacle(mixed, t));
    }

    #[test]
    fn masks_are_independent() {
        let mut img = RgbImage::new(4, 1);
        img.put_pixel(0, 0, Rgb([220, 220, 220])); // navigable
        img.put_pixel(1, 0, Rgb([20, 20, 20])); // obstacle
        img.put_pixel(2, 0, Rgb([160, 160, 160])); // neither
        img.put_pixel(3, 0, Rgb([200, 160, 40])); // sample, neither rgb rule
        let valid = GrayImage::from_pixel(4, 1, Luma([1]));
        let m = classify(&img, &valid, &ClassifyConfig::default());

        assert_eq!(m.navigable.get_pixel(0, 0)[0], 1);
        assert_eq!(m.obstacle.get_pixel(1, 0)[0], 1);
        assert_eq!(count(&m.navigable), 1);
        assert_eq!(count(&m.obstacle), 1);
        assert_eq!(count(&m.sample), 1);
        assert_eq!(m.sample.get_pixel(3, 0)[0], 1);
        assert!(m.sample_detected());
    }

    #[test]
    fn obstacles_outside_view_are_kept_unless_restricted() {
        let img = RgbImage::new(3, 1);
        let mut valid = GrayImage::new(3, 1);
        valid.put_pixel(1, 0, Luma([1]));

        let m = classify(&img, &valid, &ClassifyConfig::default());
        assert_eq!(count(&m.obstacle), 3);

        let cfg = ClassifyConfig {
            restrict_obstacles_to_view: true,
            ..ClassifyConfig::default()
        };
        let m = classify(&img, &valid, &cfg);
        assert_eq!(count(&m.obstacle), 1);
    }

    #[test]
    fn overlay_hides_sample_channel_without_detection() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([220, 220, 220]));
        img.put_pixel(1, 0, Rgb([10, 10, 10]));
        let valid = GrayImage::from_pixel(2, 1, Luma([1]));
        let m = classify(&img, &valid, &ClassifyConfig::default());
        let ov = m.overlay();
        assert_eq!(ov.get_pixel(0, 0).0, [0, 0, 255]);
        assert_eq!(ov.get_pixel(1, 0).0, [255, 0, 0]);

        img.put_pixel(1, 0, Rgb([200, 160, 40]));
        let m = classify(&img, &valid, &ClassifyConfig::default());
        assert_eq!(m.overlay().get_pixel(1, 0).0, [0, 255, 0]);
    }
}
