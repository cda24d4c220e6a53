use std::f64::consts::TAU;

use nalgebra::{Matrix4, Vector4};
use serde::{Deserialize, Serialize};

use crate::error::{Diagnostic, ErrorKind, PrecisionError, Severity};

use super::coordinate::Coordinate;
use super::math::PrecisionMath;

/// Matrices with a smaller absolute determinant are treated as singular.
pub const SINGULAR_DETERMINANT: f64 = 1e-10;

/// Uniform scale, then rotation about Z, then translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinateTransform {
    pub scale: f64,
    /// Radians, counter-clockwise about +Z.
    pub rotation: f64,
    pub translation: [f64; 3],
}

impl Default for CoordinateTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl CoordinateTransform {
    pub fn identity() -> Self {
        Self { scale: 1.0, rotation: 0.0, translation: [0.0; 3] }
    }

    pub fn new(scale: f64, rotation: f64, translation: [f64; 3]) -> Self {
        Self { scale, rotation, translation }
    }

    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        Self { translation: [dx, dy, dz], ..Self::identity() }
    }

    pub fn rotation_z(angle: f64) -> Self {
        Self { rotation: angle, ..Self::identity() }
    }

    pub fn scaling(scale: f64) -> Self {
        Self { scale, ..Self::identity() }
    }

    /// Homogeneous matrix, row-major:
    /// `[[s·cos, −s·sin, 0, dx], [s·sin, s·cos, 0, dy], [0, 0, s, dz], [0, 0, 0, 1]]`.
    pub fn matrix(&self) -> Matrix4<f64> {
        let s = self.scale;
        let (sin, cos) = self.rotation.sin_cos();
        let [dx, dy, dz] = self.translation;
        #[rustfmt::skip]
        let m = Matrix4::new(
            s * cos, -s * sin, 0.0, dx,
            s * sin,  s * cos, 0.0, dy,
            0.0,      0.0,     s,   dz,
            0.0,      0.0,     0.0, 1.0,
        );
        m
    }

    pub fn determinant(&self) -> f64 {
        self.matrix().determinant()
    }

    /// Validate the parameters. Returns non-blocking findings on success.
    pub fn check(&self) -> Result<Vec<Diagnostic>, PrecisionError> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(PrecisionError::transformation(
                "transform",
                format!("scale must be positive, got {}", self.scale),
            ));
        }
        if !self.rotation.is_finite() || self.translation.iter().any(|v| !v.is_finite()) {
            return Err(PrecisionError::transformation(
                "transform",
                "rotation and translation must be finite",
            ));
        }
        let det = self.determinant();
        if det.abs() < SINGULAR_DETERMINANT {
            return Err(PrecisionError::calculation(
                "transform",
                format!("matrix is singular (determinant {det:e})"),
            ));
        }

        let mut warnings = Vec::new();
        if self.rotation.abs() > TAU {
            warnings.push(
                Diagnostic::new(
                    ErrorKind::Transformation,
                    "transform",
                    format!("rotation {} exceeds one full turn", self.rotation),
                )
                .with_severity(Severity::Warning),
            );
        }
        Ok(warnings)
    }

    pub fn apply(&self, c: &Coordinate, math: &PrecisionMath) -> Result<Coordinate, PrecisionError> {
        self.check()?;
        let v = self.matrix() * Vector4::new(c.x(), c.y(), c.z(), 1.0);
        math.coordinate(v.x, v.y, v.z)
    }

    /// `self` followed by `next`.
    pub fn then(&self, next: &CoordinateTransform) -> CoordinateTransform {
        let [tx, ty, tz] = self.translation;
        let (sin, cos) = next.rotation.sin_cos();
        let s = next.scale;
        CoordinateTransform {
            scale: self.scale * next.scale,
            rotation: self.rotation + next.rotation,
            translation: [
                s * (cos * tx - sin * ty) + next.translation[0],
                s * (sin * tx + cos * ty) + next.translation[1],
                s * tz + next.translation[2],
            ],
        }
    }

    pub fn inverse(&self, math: &PrecisionMath) -> Result<CoordinateTransform, PrecisionError> {
        if self.determinant().abs() < SINGULAR_DETERMINANT {
            return Err(PrecisionError::calculation("inverse", "matrix is singular"));
        }
        let inv_scale = math.div(1.0, self.scale)?;
        let (sin, cos) = (-self.rotation).sin_cos();
        let [tx, ty, tz] = self.translation;
        Ok(CoordinateTransform {
            scale: inv_scale,
            rotation: -self.rotation,
            translation: [
                -inv_scale * (cos * tx - sin * ty),
                -inv_scale * (sin * tx + cos * ty),
                -inv_scale * tz,
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_apply_scale_rotate_translate() {
        let m = PrecisionMath::default();
        let t = CoordinateTransform::new(2.0, FRAC_PI_2, [10.0, 0.0, 1.0]);
        let p = Coordinate::new(1.0, 0.0, 1.0).unwrap();
        let q = t.apply(&p, &m).unwrap();
        assert!((q.x() - 10.0).abs() < 1e-9);
        assert!((q.y() - 2.0).abs() < 1e-9);
        assert!((q.z() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_check_rejects_bad_scale() {
        assert!(matches!(
            CoordinateTransform::scaling(0.0).check(),
            Err(PrecisionError::Transformation { .. })
        ));
        assert!(CoordinateTransform::scaling(-2.0).check().is_err());
    }

    #[test]
    fn test_check_warns_on_large_rotation() {
        let warnings = CoordinateTransform::rotation_z(7.0).check().unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].severity, Severity::Warning);
    }

    #[test]
    fn test_singular_matrix() {
        let t = CoordinateTransform::scaling(1e-4);
        assert!(matches!(t.check(), Err(PrecisionError::Calculation { .. })));
        assert!(t.inverse(&PrecisionMath::default()).is_err());
    }

    #[test]
    fn test_inverse_round_trip() {
        let m = PrecisionMath::default();
        let t = CoordinateTransform::new(2.0, 0.7, [3.0, -4.0, 5.0]);
        let round = t.then(&t.inverse(&m).unwrap());
        assert_relative_eq!(round.scale, 1.0, epsilon = 1e-12);
        assert_relative_eq!(round.rotation, 0.0, epsilon = 1e-12);
        for v in round.translation {
            assert!(v.abs() < 1e-9);
        }
    }

    #[test]
    fn test_then_matches_matrix_product() {
        let a = CoordinateTransform::new(1.5, 0.3, [1.0, 2.0, 0.5]);
        let b = CoordinateTransform::new(0.5, -1.1, [-3.0, 0.0, 2.0]);
        let composed = a.then(&b).matrix();
        let product = b.matrix() * a.matrix();
        for (x, y) in composed.iter().zip(product.iter()) {
            assert_relative_eq!(*x, *y, epsilon = 1e-12);
        }
    }
}
