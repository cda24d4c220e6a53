//! The stock hook set registered by `HookRegistry::with_defaults`.

use std::f64::consts::{FRAC_PI_2, PI};

use tracing::warn;

use crate::error::{Diagnostic, ErrorKind, Severity};
use crate::geometry::PrecisionMath;

use super::context::{GeometricCheck, HookContext};
use super::PrecisionHook;

/// Rejects NaN and infinite components.
pub struct FiniteCheck;

impl PrecisionHook for FiniteCheck {
    fn name(&self) -> &str {
        "finite_check"
    }

    fn run(&self, ctx: &mut HookContext, _math: &PrecisionMath) -> Result<(), Diagnostic> {
        let bad: Vec<[f64; 3]> = ctx
            .coordinates
            .iter()
            .filter(|c| c.iter().any(|v| !v.is_finite()))
            .copied()
            .collect();
        if bad.is_empty() {
            return Ok(());
        }
        Err(Diagnostic::new(
            ErrorKind::Geometric,
            ctx.operation.clone(),
            format!("{} coordinate(s) with non-finite components", bad.len()),
        )
        .with_coordinates(bad))
    }
}

/// Rejects components outside `±max_range`.
pub struct RangeCheck;

impl PrecisionHook for RangeCheck {
    fn name(&self) -> &str {
        "range_check"
    }

    fn run(&self, ctx: &mut HookContext, math: &PrecisionMath) -> Result<(), Diagnostic> {
        let max = math.max_range();
        let bad: Vec<[f64; 3]> = ctx
            .coordinates
            .iter()
            .filter(|c| c.iter().any(|v| v.is_finite() && v.abs() > max))
            .copied()
            .collect();
        if bad.is_empty() {
            return Ok(());
        }
        Err(Diagnostic::new(
            ErrorKind::Geometric,
            ctx.operation.clone(),
            format!("{} coordinate(s) outside ±{max}", bad.len()),
        )
        .with_coordinates(bad))
    }
}

/// Flags components that are not on the precision grid. Never blocking.
pub struct GridCheck;

impl PrecisionHook for GridCheck {
    fn name(&self) -> &str {
        "grid_check"
    }

    fn run(&self, ctx: &mut HookContext, math: &PrecisionMath) -> Result<(), Diagnostic> {
        let off: Vec<[f64; 3]> = ctx
            .coordinates
            .iter()
            .filter(|c| c.iter().any(|v| v.is_finite() && !math.is_on_grid(*v)))
            .copied()
            .collect();
        if off.is_empty() {
            return Ok(());
        }
        Err(Diagnostic::new(
            ErrorKind::Geometric,
            ctx.operation.clone(),
            format!("{} coordinate(s) off the {} grid", off.len(), math.step()),
        )
        .with_severity(Severity::Info)
        .with_coordinates(off))
    }
}

/// Validates the transform payload: positive scale, finite parameters,
/// non-singular matrix. Large rotations only warn.
pub struct TransformCheck;

impl PrecisionHook for TransformCheck {
    fn name(&self) -> &str {
        "transform_check"
    }

    fn run(&self, ctx: &mut HookContext, _math: &PrecisionMath) -> Result<(), Diagnostic> {
        let Some(transform) = ctx.transform else {
            return Ok(());
        };
        match transform.check() {
            Ok(warnings) => {
                for mut w in warnings {
                    w.operation = ctx.operation.clone();
                    ctx.record(w);
                }
                Ok(())
            }
            Err(e) => Err(e.to_diagnostic(&ctx.operation).with_coordinates(ctx.coordinates.clone())),
        }
    }
}

/// Evaluates the context's `GeometricCheck` payload.
pub struct GeometricConstraintCheck;

impl GeometricConstraintCheck {
    /// Deviation of the measured value from the check's target.
    pub fn deviation(
        check: &GeometricCheck,
        pts: &[[f64; 3]],
        math: &PrecisionMath,
    ) -> Result<f64, Diagnostic> {
        let dir = |a: [f64; 3], b: [f64; 3]| math.atan2(b[1] - a[1], b[0] - a[0]);
        match check {
            GeometricCheck::Distance { target } => Ok((math.distance(pts[0], pts[1]) - target).abs()),
            GeometricCheck::Angle { target } => {
                let angle = math
                    .angle_between(pts[0], pts[1], pts[2])
                    .map_err(|e| e.to_diagnostic("geometric_constraint"))?;
                Ok(math.angle_difference(angle, *target))
            }
            GeometricCheck::Parallel => {
                let d = math.angle_difference(dir(pts[0], pts[1]), dir(pts[2], pts[3]));
                Ok(d.min(PI - d))
            }
            GeometricCheck::Perpendicular => {
                let d = math.angle_difference(dir(pts[0], pts[1]), dir(pts[2], pts[3]));
                Ok((d - FRAC_PI_2).abs())
            }
        }
    }
}

impl PrecisionHook for GeometricConstraintCheck {
    fn name(&self) -> &str {
        "geometric_constraint_check"
    }

    fn run(&self, ctx: &mut HookContext, math: &PrecisionMath) -> Result<(), Diagnostic> {
        let Some(payload) = ctx.constraint else {
            return Ok(());
        };
        let needed = payload.check.points_required();
        if ctx.coordinates.len() < needed {
            return Err(Diagnostic::new(
                ErrorKind::Validation,
                ctx.operation.clone(),
                format!("{:?} needs {needed} points, got {}", payload.check, ctx.coordinates.len()),
            ));
        }
        let deviation = Self::deviation(&payload.check, &ctx.coordinates, math)?;
        if deviation <= payload.tolerance {
            return Ok(());
        }
        Err(Diagnostic::new(
            ErrorKind::ConstraintViolation,
            ctx.operation.clone(),
            format!("{:?} off by {deviation:.6} (tolerance {})", payload.check, payload.tolerance),
        )
        .with_coordinates(ctx.coordinates[..needed].to_vec()))
    }
}

/// Error handler that forwards unrecovered findings to the log.
pub struct LogErrors;

impl PrecisionHook for LogErrors {
    fn name(&self) -> &str {
        "log_errors"
    }

    fn run(&self, ctx: &mut HookContext, _math: &PrecisionMath) -> Result<(), Diagnostic> {
        for d in ctx.errors.iter().filter(|d| !d.recovered) {
            warn!(operation = %d.operation, kind = %d.kind, severity = %d.severity, "{}", d.message);
        }
        Ok(())
    }
}

/// Last-resort recovery: snap everything finite onto the grid.
pub struct ResnapRecovery;

impl PrecisionHook for ResnapRecovery {
    fn name(&self) -> &str {
        "resnap_recovery"
    }

    fn run(&self, ctx: &mut HookContext, math: &PrecisionMath) -> Result<(), Diagnostic> {
        use super::recovery::RecoveryStrategy;
        if RecoveryStrategy::PrecisionResnap.apply(ctx, math) {
            Ok(())
        } else {
            Err(Diagnostic::new(
                ErrorKind::Geometric,
                ctx.operation.clone(),
                "non-finite components cannot be re-snapped",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::CoordinateTransform;

    #[test]
    fn test_finite_and_range_checks() {
        let m = PrecisionMath::default();
        let mut ctx = HookContext::new("create", vec![[1.0, 2.0, 3.0], [f64::NAN, 0.0, 0.0]]);
        let d = FiniteCheck.run(&mut ctx, &m).unwrap_err();
        assert_eq!(d.coordinates.len(), 1);
        assert!(RangeCheck.run(&mut ctx, &m).is_ok());

        let mut ctx = HookContext::new("create", vec![[0.0, 5e6, 0.0]]);
        assert!(RangeCheck.run(&mut ctx, &m).is_err());
    }

    #[test]
    fn test_grid_check_is_informational() {
        let m = PrecisionMath::default();
        let mut ctx = HookContext::new("create", vec![[1.0004, 0.0, 0.0]]);
        let d = GridCheck.run(&mut ctx, &m).unwrap_err();
        assert_eq!(d.severity, Severity::Info);
    }

    #[test]
    fn test_transform_check() {
        let m = PrecisionMath::default();
        let mut ctx = HookContext::new("move", vec![[0.0; 3]])
            .with_transform(CoordinateTransform::new(1.0, 10.0, [0.0; 3]));
        assert!(TransformCheck.run(&mut ctx, &m).is_ok());
        assert_eq!(ctx.warnings.len(), 1);

        let mut ctx = HookContext::new("move", vec![[0.0; 3]])
            .with_transform(CoordinateTransform::scaling(0.0));
        let d = TransformCheck.run(&mut ctx, &m).unwrap_err();
        assert_eq!(d.kind, ErrorKind::Transformation);
    }

    #[test]
    fn test_geometric_checks() {
        let m = PrecisionMath::default();
        let mut ctx = HookContext::new("check", vec![[0.0; 3], [3.0, 4.0, 0.0]])
            .with_constraint(GeometricCheck::Distance { target: 5.0 }, 1e-6);
        assert!(GeometricConstraintCheck.run(&mut ctx, &m).is_ok());

        let mut ctx = HookContext::new(
            "check",
            vec![[0.0; 3], [1.0, 0.0, 0.0], [5.0, 5.0, 0.0], [5.0, 6.0, 0.0]],
        )
        .with_constraint(GeometricCheck::Perpendicular, 1e-6);
        assert!(GeometricConstraintCheck.run(&mut ctx, &m).is_ok());

        let mut ctx = ctx.with_constraint(GeometricCheck::Parallel, 1e-6);
        let d = GeometricConstraintCheck.run(&mut ctx, &m).unwrap_err();
        assert_eq!(d.kind, ErrorKind::ConstraintViolation);

        let mut short = HookContext::new("check", vec![[0.0; 3]])
            .with_constraint(GeometricCheck::Angle { target: 1.0 }, 1e-6);
        let d = GeometricConstraintCheck.run(&mut short, &m).unwrap_err();
        assert_eq!(d.kind, ErrorKind::Validation);
    }

    #[test]
    fn test_antiparallel_lines_are_parallel() {
        let m = PrecisionMath::default();
        let pts = [[0.0; 3], [1.0, 1.0, 0.0], [3.0, 3.0, 0.0], [2.0, 2.0, 0.0]];
        let dev = GeometricConstraintCheck::deviation(&GeometricCheck::Parallel, &pts, &m).unwrap();
        assert!(dev < 1e-12);
    }
}
