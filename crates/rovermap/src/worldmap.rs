//! Persistent world-grid with per-class hit counters.

use image::{Rgb, RgbImage};

/// Pitch/roll tolerance (degrees) for trusting the flat-ground assumption.
pub const ATTITUDE_TOLERANCE_DEG: f64 = 0.5;

/// Accumulation channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapChannel {
    Obstacle = 0,
    Sample = 1,
    Navigable = 2,
}

impl MapChannel {
    pub const ALL: [MapChannel; 3] = [Self::Obstacle, Self::Sample, Self::Navigable];
}

/// True when both pitch and roll are within tolerance of zero (mod 360).
pub fn attitude_valid(pitch_deg: f64, roll_deg: f64) -> bool {
    near_level(pitch_deg) && near_level(roll_deg)
}

fn near_level(angle_deg: f64) -> bool {
    let a = angle_deg.rem_euclid(360.0);
    a < ATTITUDE_TOLERANCE_DEG || a > 360.0 - ATTITUDE_TOLERANCE_DEG
}

/// Square grid, three independent counter channels.
///
/// Counters only grow; increments saturate at `u32::MAX`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldMap {
    size: usize,
    channels: [Vec<u32>; 3],
}

impl WorldMap {
    pub fn new(size: usize) -> Self {
        let cells = size * size;
        Self {
            size,
            channels: [vec![0; cells], vec![0; cells], vec![0; cells]],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Counter at cell `(x, y)`, or `None` off-grid.
    pub fn get(&self, channel: MapChannel, x: usize, y: usize) -> Option<u32> {
        if x >= self.size || y >= self.size {
            return None;
        }
        Some(self.channels[channel as usize][y * self.size + x])
    }

    /// Row-major counters for one channel (`index = y * size + x`).
    pub fn channel(&self, channel: MapChannel) -> &[u32] {
        &self.channels[channel as usize]
    }

    /// Increment every distinct cell in `cells` by one. Returns the number of
    /// cells touched.
    pub fn accumulate(&mut self, channel: MapChannel, cells: &[[usize; 2]]) -> usize {
        let mut unique = cells.to_vec();
        unique.sort_unstable();
        unique.dedup();
        let size = self.size;
        let data = &mut self.channels[channel as usize];
        let mut touched = 0;
        for [x, y] in unique {
            if x < size && y < size {
                let v = &mut data[y * size + x];
                *v = v.saturating_add(1);
                touched += 1;
            }
        }
        touched
    }

    /// Single-cell increment.
    pub fn bump(&mut self, channel: MapChannel, cell: [usize; 2]) -> bool {
        self.accumulate(channel, &[cell]) == 1
    }

    /// Cells with any navigable or obstacle evidence.
    pub fn explored_cells(&self) -> usize {
        let nav = self.channel(MapChannel::Navigable);
        let obs = self.channel(MapChannel::Obstacle);
        nav.iter().zip(obs).filter(|(n, o)| **n > 0 || **o > 0).count()
    }

    /// Diagnostic rendering: obstacle → red, sample → green, navigable →
    /// blue, each saturated at 255. Image row 0 is the top of the grid
    /// (largest `y`).
    pub fn to_rgb_image(&self) -> RgbImage {
        let n = self.size as u32;
        let sat = |v: u32| v.min(255) as u8;
        RgbImage::from_fn(n, n, |x, row| {
            let y = (n - 1 - row) as usize;
            let i = y * self.size + x as usize;
            Rgb([
                sat(self.channels[0][i]),
                sat(self.channels[1][i]),
                sat(self.channels[2][i]),
            ])
        })
    }
}
