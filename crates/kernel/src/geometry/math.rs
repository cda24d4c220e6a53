//! The single arithmetic facade every geometric computation goes through.
//!
//! Rounding and range policy live here and nowhere else: other modules ask
//! `PrecisionMath` to snap, divide or build coordinates instead of doing it
//! inline.

use std::f64::consts::{PI, TAU};

use approx::abs_diff_eq;

use crate::config::{PrecisionConfig, ValidationMode};
use crate::error::{Axis, PrecisionError};

use super::coordinate::Coordinate;

/// Divisors smaller than this are treated as zero.
pub const DIVISION_EPSILON: f64 = 1e-12;

/// Bounded-precision scalar operations bound to one configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PrecisionMath {
    config: PrecisionConfig,
}

impl Default for PrecisionMath {
    fn default() -> Self {
        Self::new(PrecisionConfig::default())
    }
}

impl PrecisionMath {
    pub fn new(config: PrecisionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PrecisionConfig {
        &self.config
    }

    pub fn step(&self) -> f64 {
        self.config.precision_step
    }

    pub fn max_range(&self) -> f64 {
        self.config.max_range
    }

    /// Round to the nearest multiple of the precision step. Never returns `-0.0`.
    pub fn snap(&self, value: f64) -> f64 {
        let step = self.config.precision_step;
        (value / step).round() * step + 0.0
    }

    /// Whether `value` already sits on the precision grid.
    pub fn is_on_grid(&self, value: f64) -> bool {
        (self.snap(value) - value).abs() <= self.config.precision_step * 1e-6
    }

    pub fn add(&self, a: f64, b: f64) -> f64 {
        a + b
    }

    pub fn sub(&self, a: f64, b: f64) -> f64 {
        a - b
    }

    pub fn mul(&self, a: f64, b: f64) -> f64 {
        a * b
    }

    pub fn div(&self, a: f64, b: f64) -> Result<f64, PrecisionError> {
        if !b.is_finite() || b.abs() < DIVISION_EPSILON {
            return Err(PrecisionError::calculation(
                "div",
                format!("divisor {b} is too close to zero"),
            ));
        }
        Ok(a / b)
    }

    /// Square root; tiny negative inputs from cancellation clamp to zero.
    pub fn sqrt(&self, value: f64) -> Result<f64, PrecisionError> {
        if value < -DIVISION_EPSILON || value.is_nan() {
            return Err(PrecisionError::calculation(
                "sqrt",
                format!("cannot take the square root of {value}"),
            ));
        }
        Ok(value.max(0.0).sqrt())
    }

    pub fn sin(&self, angle: f64) -> f64 {
        angle.sin()
    }

    pub fn cos(&self, angle: f64) -> f64 {
        angle.cos()
    }

    pub fn atan2(&self, y: f64, x: f64) -> f64 {
        y.atan2(x)
    }

    pub fn hypot(&self, a: f64, b: f64) -> f64 {
        a.hypot(b)
    }

    /// Euclidean distance between two raw triples.
    pub fn distance(&self, a: [f64; 3], b: [f64; 3]) -> f64 {
        let dx = a[0] - b[0];
        let dy = a[1] - b[1];
        let dz = a[2] - b[2];
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Map any angle into `[0, 2π)`.
    pub fn normalize_angle(&self, angle: f64) -> f64 {
        let a = angle.rem_euclid(TAU);
        if a >= TAU { 0.0 } else { a }
    }

    /// Smallest absolute difference between two angles, in `[0, π]`.
    pub fn angle_difference(&self, a: f64, b: f64) -> f64 {
        let d = self.normalize_angle(a - b);
        if d > PI { TAU - d } else { d }
    }

    /// Angle at `vertex` formed by `a` and `b`, in `[0, π]`.
    pub fn angle_between(
        &self,
        a: [f64; 3],
        vertex: [f64; 3],
        b: [f64; 3],
    ) -> Result<f64, PrecisionError> {
        let u = [a[0] - vertex[0], a[1] - vertex[1], a[2] - vertex[2]];
        let v = [b[0] - vertex[0], b[1] - vertex[1], b[2] - vertex[2]];
        let lu = (u[0] * u[0] + u[1] * u[1] + u[2] * u[2]).sqrt();
        let lv = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
        let dot = u[0] * v[0] + u[1] * v[1] + u[2] * v[2];
        let cos = self.div(dot, lu * lv)?;
        Ok(cos.clamp(-1.0, 1.0).acos())
    }

    pub fn is_close(&self, a: f64, b: f64) -> bool {
        abs_diff_eq!(a, b, epsilon = self.config.equality_tolerance)
    }

    /// Apply the configured range policy to one component, then snap it. A
    /// snap that would leave the range lands on the last grid point inside it.
    pub fn normalize_component(&self, axis: Axis, value: f64) -> Result<f64, PrecisionError> {
        let max = self.config.max_range;
        let value = if !value.is_finite() {
            match self.config.mode {
                ValidationMode::FailFast => return Err(PrecisionError::NonFinite { axis, value }),
                ValidationMode::AutoCorrect if value.is_nan() => 0.0,
                ValidationMode::AutoCorrect => max.copysign(value),
            }
        } else if value.abs() > max {
            match self.config.mode {
                ValidationMode::FailFast => {
                    return Err(PrecisionError::OutOfRange { axis, value, max_range: max });
                }
                ValidationMode::AutoCorrect => value.clamp(-max, max),
            }
        } else {
            value
        };
        let snapped = self.snap(value);
        if snapped.abs() <= max {
            return Ok(snapped);
        }
        let step = self.config.precision_step;
        let limit = ((max / step).floor() * step).min(max);
        Ok(limit.copysign(snapped))
    }

    /// Build a validated coordinate under this configuration.
    pub fn coordinate(&self, x: f64, y: f64, z: f64) -> Result<Coordinate, PrecisionError> {
        let x = self.normalize_component(Axis::X, x)?;
        let y = self.normalize_component(Axis::Y, y)?;
        let z = self.normalize_component(Axis::Z, z)?;
        Ok(Coordinate::from_normalized(x, y, z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_snap_to_step() {
        let m = PrecisionMath::default();
        assert!((m.snap(1.23456) - 1.235).abs() < 1e-12);
        assert!((m.snap(-0.0004)).abs() < 1e-15);
        assert!(m.snap(-0.0004).is_sign_positive());
        assert!(m.is_on_grid(2.5));
        assert!(!m.is_on_grid(2.5004));
    }

    #[test]
    fn test_div_by_near_zero() {
        let m = PrecisionMath::default();
        assert!((m.div(1.0, 4.0).unwrap() - 0.25).abs() < 1e-15);
        let err = m.div(1.0, 1e-14).unwrap_err();
        assert!(matches!(err, PrecisionError::Calculation { .. }));
    }

    #[test]
    fn test_sqrt_negative() {
        let m = PrecisionMath::default();
        assert!(m.sqrt(-1.0).is_err());
        assert_eq!(m.sqrt(-1e-14).unwrap(), 0.0);
    }

    #[test]
    fn test_angles() {
        let m = PrecisionMath::default();
        assert!((m.normalize_angle(-FRAC_PI_2) - 3.0 * FRAC_PI_2).abs() < 1e-12);
        assert!((m.angle_difference(0.1, TAU - 0.1) - 0.2).abs() < 1e-12);
        let a = m.angle_between([1.0, 0.0, 0.0], [0.0; 3], [0.0, 1.0, 0.0]).unwrap();
        assert!((a - FRAC_PI_2).abs() < 1e-12);
        assert!(m.angle_between([0.0; 3], [0.0; 3], [1.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn test_component_policy() {
        let strict = PrecisionMath::default();
        assert!(matches!(
            strict.normalize_component(Axis::X, f64::NAN),
            Err(PrecisionError::NonFinite { axis: Axis::X, .. })
        ));
        assert!(matches!(
            strict.normalize_component(Axis::Z, 2e6),
            Err(PrecisionError::OutOfRange { axis: Axis::Z, .. })
        ));

        let lenient = PrecisionMath::new(PrecisionConfig::auto_correct());
        assert_eq!(lenient.normalize_component(Axis::X, f64::NAN).unwrap(), 0.0);
        assert!((lenient.normalize_component(Axis::X, 2e6).unwrap() - 1e6).abs() < 1e-6);
        assert!((lenient.normalize_component(Axis::X, f64::NEG_INFINITY).unwrap() + 1e6).abs() < 1e-6);
    }

    #[test]
    fn test_clamp_stays_inside_off_grid_range() {
        let config = PrecisionConfig { max_range: 10.0015, ..PrecisionConfig::auto_correct() };
        let m = PrecisionMath::new(config);
        for value in [50.0, 10.0015, f64::INFINITY] {
            let v = m.normalize_component(Axis::Y, value).unwrap();
            assert!(v <= 10.0015, "{value} -> {v}");
            assert!((v - 10.001).abs() < 1e-9);
            assert!(m.is_on_grid(v));
        }
        let v = m.normalize_component(Axis::Y, -50.0).unwrap();
        assert!((v + 10.001).abs() < 1e-9);

        let strict = PrecisionMath::new(PrecisionConfig { max_range: 10.0015, ..Default::default() });
        assert!(strict.normalize_component(Axis::Y, 10.0015).unwrap() <= 10.0015);
    }
}
