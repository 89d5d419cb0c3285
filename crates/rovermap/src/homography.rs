//! Ground-plane homography from four (or more) point correspondences.
//!
//! The rectifier only ever needs an exact fit through the calibrated
//! quadrilateral, so this is a plain Hartley-normalized DLT without any
//! robust wrapper.

use nalgebra::{DMatrix, Matrix3, Vector3};

// ── Error type ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum HomographyError {
    TooFewPoints { needed: usize, got: usize },
    LengthMismatch { src: usize, dst: usize },
    NumericalFailure(String),
}

impl std::fmt::Display for HomographyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewPoints { needed, got } => {
                write!(f, "too few correspondences: need {}, got {}", needed, got)
            }
            Self::LengthMismatch { src, dst } => {
                write!(f, "correspondence length mismatch: {} src vs {} dst", src, dst)
            }
            Self::NumericalFailure(msg) => write!(f, "numerical failure: {}", msg),
        }
    }
}

impl std::error::Error for HomographyError {}

/// A 3×3 projective transform between two image planes, normalized so that
/// `h[(2, 2)] == 1` whenever that entry is non-zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    h: Matrix3<f64>,
}

impl Homography {
    /// Wrap an existing matrix.
    pub fn from_matrix(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    /// Estimate the transform mapping `src[i]` onto `dst[i]`.
    pub fn from_correspondences(
        src: &[[f64; 2]],
        dst: &[[f64; 2]],
    ) -> Result<Self, HomographyError> {
        estimate_dlt(src, dst).map(Self::from_matrix)
    }

    /// Row-major copy of the matrix, for reports and logs.
    pub fn to_array(&self) -> [[f64; 3]; 3] {
        let m = &self.h;
        [
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
            [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
        ]
    }

    /// Inverse transform, or `None` when the matrix is singular.
    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::from_matrix)
    }

    /// Project a point: H * [x, y, 1]^T → [u, v].
    ///
    /// Points on the line at infinity come back as NaN.
    #[inline]
    pub fn project(&self, x: f64, y: f64) -> [f64; 2] {
        let p = self.h * Vector3::new(x, y, 1.0);
        if p[2].abs() < 1e-15 {
            return [f64::NAN, f64::NAN];
        }
        [p[0] / p[2], p[1] / p[2]]
    }
}

// ── Hartley normalization ────────────────────────────────────────────────

/// Translate the centroid to the origin and scale so the mean distance from
/// the origin is sqrt(2).
fn normalize_points(pts: &[[f64; 2]]) -> (Matrix3<f64>, Vec<[f64; 2]>) {
    let n = pts.len() as f64;
    let cx = pts.iter().map(|p| p[0]).sum::<f64>() / n;
    let cy = pts.iter().map(|p| p[1]).sum::<f64>() / n;

    let mean_dist = pts
        .iter()
        .map(|p| ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;

    let s = if mean_dist > 1e-15 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let normalized = pts
        .iter()
        .map(|p| [s * (p[0] - cx), s * (p[1] - cy)])
        .collect();

    (t, normalized)
}

// ── DLT ──────────────────────────────────────────────────────────────────

fn estimate_dlt(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<Matrix3<f64>, HomographyError> {
    if src.len() != dst.len() {
        return Err(HomographyError::LengthMismatch {
            src: src.len(),
            dst: dst.len(),
        });
    }
    let n = src.len();
    if n < 4 {
        return Err(HomographyError::TooFewPoints { needed: 4, got: n });
    }

    let (t_src, src_n) = normalize_points(src);
    let (t_dst, dst_n) = normalize_points(dst);

    // 2n × 9 design matrix, two rows per correspondence.
    let mut a = DMatrix::<f64>::zeros(2 * n, 9);
    for (i, (s, d)) in src_n.iter().zip(&dst_n).enumerate() {
        let (sx, sy) = (s[0], s[1]);
        let (dx, dy) = (d[0], d[1]);

        a[(2 * i, 3)] = -sx;
        a[(2 * i, 4)] = -sy;
        a[(2 * i, 5)] = -1.0;
        a[(2 * i, 6)] = dy * sx;
        a[(2 * i, 7)] = dy * sy;
        a[(2 * i, 8)] = dy;

        a[(2 * i + 1, 0)] = sx;
        a[(2 * i + 1, 1)] = sy;
        a[(2 * i + 1, 2)] = 1.0;
        a[(2 * i + 1, 6)] = -dx * sx;
        a[(2 * i + 1, 7)] = -dx * sy;
        a[(2 * i + 1, 8)] = -dx;
    }

    // Null vector of A = eigenvector of A^T A with the smallest eigenvalue.
    let ata = a.transpose() * &a;
    let eig = nalgebra::SymmetricEigen::new(ata);
    let min_idx = (0..9)
        .min_by(|&i, &j| {
            eig.eigenvalues[i]
                .abs()
                .total_cmp(&eig.eigenvalues[j].abs())
        })
        .unwrap_or(0);
    let v = eig.eigenvectors.column(min_idx);
    let h_norm = Matrix3::new(v[0], v[1], v[2], v[3], v[4], v[5], v[6], v[7], v[8]);

    let t_dst_inv = t_dst
        .try_inverse()
        .ok_or_else(|| HomographyError::NumericalFailure("T_dst not invertible".into()))?;
    let h = t_dst_inv * h_norm * t_src;

    if !h.iter().all(|v| v.is_finite()) {
        return Err(HomographyError::NumericalFailure(
            "non-finite homography entries".into(),
        ));
    }

    let scale = h[(2, 2)];
    if scale.abs() < 1e-15 {
        Ok(h)
    } else {
        Ok(h / scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn reprojection_error(h: &Homography, src: &[f64; 2], dst: &[f64; 2]) -> f64 {
        let p = h.project(src[0], src[1]);
        (p[0] - dst[0]).hypot(p[1] - dst[1])
    }

    fn camera_like() -> Homography {
        Homography::from_matrix(Matrix3::new(
            0.6, -1.2, 150.0, //
            0.02, -0.4, 120.0, //
            0.0002, -0.004, 1.0,
        ))
    }

    #[test]
    fn exact_fit_through_four_points() {
        let h_true = camera_like();
        let src = [[14.0, 140.0], [301.0, 140.0], [200.0, 96.0], [118.0, 96.0]];
        let dst: Vec<[f64; 2]> = src.iter().map(|s| h_true.project(s[0], s[1])).collect();

        let h = Homography::from_correspondences(&src, &dst).unwrap();
        for (s, d) in src.iter().zip(&dst) {
            assert!(reprojection_error(&h, s, d) < 1e-6);
        }
    }

    #[test]
    fn overdetermined_grid_fit() {
        let h_true = camera_like();
        let mut src = Vec::new();
        let mut dst = Vec::new();
        for i in 0..5 {
            for j in 0..4 {
                let s = [20.0 + i as f64 * 50.0, 90.0 + j as f64 * 5.0];
                dst.push(h_true.project(s[0], s[1]));
                src.push(s);
            }
        }
        let h = Homography::from_correspondences(&src, &dst).unwrap();
        for (s, d) in src.iter().zip(&dst) {
            assert!(reprojection_error(&h, s, d) < 1e-6);
        }
    }

    #[test]
    fn inverse_round_trips_a_point() {
        let h = camera_like();
        let inv = h.inverse().unwrap();
        let q = h.project(40.0, 110.0);
        let p = inv.project(q[0], q[1]);
        assert_relative_eq!(p[0], 40.0, epsilon = 1e-8);
        assert_relative_eq!(p[1], 110.0, epsilon = 1e-8);
    }

    #[test]
    fn rejects_too_few_and_mismatched() {
        let three = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]];
        assert_eq!(
            Homography::from_correspondences(&three, &three),
            Err(HomographyError::TooFewPoints { needed: 4, got: 3 })
        );
        let four = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        assert!(matches!(
            Homography::from_correspondences(&four, &three),
            Err(HomographyError::LengthMismatch { src: 4, dst: 3 })
        ));
    }
}
