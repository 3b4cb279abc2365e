//! 3x3 projective transform value type.
//!
//! A [`Homography`] maps image coordinates from one frame to another. It is
//! an immutable value type: composition and blending produce new transforms,
//! so the order of operations stays explicit at every call site.

use nalgebra::Matrix3;

/// A 3x3 projective transform over image coordinates.
///
/// The convention is column vectors: `a.compose(&b)` applies `b` first, then
/// `a`, matching the tracker's previous-frame onto current-frame mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    matrix: Matrix3<f64>,
}

impl Homography {
    /// The identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix3::identity(),
        }
    }

    /// Wrap a raw 3x3 matrix, rescaling so the bottom-right entry is 1
    /// whenever it is non-zero.
    pub fn from_matrix(matrix: Matrix3<f64>) -> Self {
        let w = matrix[(2, 2)];
        if w != 0.0 && w != 1.0 {
            Self { matrix: matrix / w }
        } else {
            Self { matrix }
        }
    }

    /// A pure translation by `(dx, dy)`.
    pub fn translation(dx: f64, dy: f64) -> Self {
        Self {
            matrix: Matrix3::new(1.0, 0.0, dx, 0.0, 1.0, dy, 0.0, 0.0, 1.0),
        }
    }

    /// The underlying 3x3 matrix.
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    /// Compose with another transform: the result applies `other` first,
    /// then `self`. Matrix product, not commutative.
    pub fn compose(&self, other: &Homography) -> Homography {
        Homography {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Entrywise linear interpolation of matrix coefficients:
    /// `(1 - weight) * self + weight * other`.
    ///
    /// This is intentionally a raw coefficient blend rather than a
    /// projective-group interpolation; for the small correction angles this
    /// pipeline produces, the difference is negligible and the blend is
    /// cheap. Exact at the endpoints: weight 0 returns `self`, weight 1
    /// returns `other`.
    pub fn blend(&self, other: &Homography, weight: f64) -> Homography {
        Homography {
            matrix: self.matrix * (1.0 - weight) + other.matrix * weight,
        }
    }

    /// Apply to a 2D point with perspective division.
    pub fn apply(&self, point: [f64; 2]) -> [f64; 2] {
        let m = &self.matrix;
        let x = m[(0, 0)] * point[0] + m[(0, 1)] * point[1] + m[(0, 2)];
        let y = m[(1, 0)] * point[0] + m[(1, 1)] * point[1] + m[(1, 2)];
        let w = m[(2, 0)] * point[0] + m[(2, 1)] * point[1] + m[(2, 2)];

        // Guard the perspective division against points on the line at infinity
        let w = if w == 0.0 { 1e-7 } else { w };
        [x / w, y / w]
    }

    /// Inverse transform, if the matrix is invertible.
    pub fn try_inverse(&self) -> Option<Homography> {
        self.matrix.try_inverse().map(Homography::from_matrix)
    }

    /// True when every coefficient is within `tolerance` of the identity.
    pub fn is_identity(&self, tolerance: f64) -> bool {
        let diff = self.matrix - Matrix3::identity();
        diff.iter().all(|c| c.abs() <= tolerance)
    }
}

impl Default for Homography {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<Matrix3<f64>> for Homography {
    fn from(matrix: Matrix3<f64>) -> Self {
        Self::from_matrix(matrix)
    }
}

impl std::ops::Mul for Homography {
    type Output = Homography;

    fn mul(self, rhs: Homography) -> Homography {
        self.compose(&rhs)
    }
}
