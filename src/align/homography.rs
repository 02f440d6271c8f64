use nalgebra::{Matrix3, Vector3};

use crate::foundation::error::{StitchError, StitchResult};

const EPS: f64 = 1e-12;

/// A 3x3 projective transform mapping incoming-frame points into reference-frame space.
///
/// Stored normalized so that `h[2][2] == 1` whenever that entry is non-zero.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography(Matrix3<f64>);

impl Homography {
    /// Wrap a matrix, rejecting non-finite or singular transforms.
    pub fn new(m: Matrix3<f64>) -> StitchResult<Self> {
        if m.iter().any(|v| !v.is_finite()) {
            return Err(StitchError::validation("homography has non-finite entries"));
        }
        if m.determinant().abs() <= EPS {
            return Err(StitchError::validation("homography is singular"));
        }
        let w = m[(2, 2)];
        let m = if w.abs() > EPS { m / w } else { m };
        Ok(Self(m))
    }

    /// Build from nine row-major values.
    pub fn from_row_major(v: [f64; 9]) -> StitchResult<Self> {
        Self::new(Matrix3::from_row_slice(&v))
    }

    /// The identity transform.
    pub fn identity() -> Self {
        Self(Matrix3::identity())
    }

    /// A pure translation by `(tx, ty)`.
    pub fn translation(tx: f64, ty: f64) -> Self {
        Self(Matrix3::new(1.0, 0.0, tx, 0.0, 1.0, ty, 0.0, 0.0, 1.0))
    }

    /// Borrow the underlying matrix.
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.0
    }

    /// Nine row-major values.
    pub fn to_row_major(&self) -> [f64; 9] {
        let m = &self.0;
        [
            m[(0, 0)],
            m[(0, 1)],
            m[(0, 2)],
            m[(1, 0)],
            m[(1, 1)],
            m[(1, 2)],
            m[(2, 0)],
            m[(2, 1)],
            m[(2, 2)],
        ]
    }

    /// Inverse transform, `None` when numerically singular.
    pub fn inverse(&self) -> Option<Self> {
        self.0.try_inverse().and_then(|m| Self::new(m).ok())
    }

    /// `other ∘ self`: apply `self` first, then `other`.
    pub fn then(&self, other: &Homography) -> Homography {
        Homography(other.0 * self.0)
    }

    /// Project a point. `None` when it maps to infinity.
    pub fn project(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let v = self.0 * Vector3::new(x, y, 1.0);
        let w = v[2];
        if !w.is_finite() || w.abs() <= EPS {
            return None;
        }
        let (px, py) = (v[0] / w, v[1] / w);
        if !px.is_finite() || !py.is_finite() {
            return None;
        }
        Some((px, py))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/align/homography.rs"]
mod tests;
