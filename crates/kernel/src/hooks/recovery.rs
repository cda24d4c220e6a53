use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geometry::PrecisionMath;

use super::context::HookContext;

/// In-place corrections a failing hook may fall back on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    /// Clamp finite components into `±max_range`, then snap.
    RangeClamp,
    /// Snap every finite component onto the precision grid.
    PrecisionResnap,
    /// Replace non-finite components with zero.
    NanToZero,
    /// Restore the coordinates and drop the transform payload.
    RevertToInput,
}

impl RecoveryStrategy {
    /// Apply to `ctx`. Returns whether the context is now free of the
    /// condition this strategy addresses.
    pub fn apply(&self, ctx: &mut HookContext, math: &PrecisionMath) -> bool {
        let max = math.max_range();
        match self {
            Self::RangeClamp => {
                let mut ok = true;
                for i in 0..ctx.coordinates.len() {
                    let c = ctx.coordinates[i];
                    if c.iter().any(|v| !v.is_finite()) {
                        ok = false;
                        continue;
                    }
                    let fixed = c.map(|v| math.snap(v.clamp(-max, max)));
                    ctx.correct(i, fixed, *self);
                }
                ok
            }
            Self::PrecisionResnap => {
                let mut ok = true;
                for i in 0..ctx.coordinates.len() {
                    let c = ctx.coordinates[i];
                    if c.iter().any(|v| !v.is_finite()) {
                        ok = false;
                        continue;
                    }
                    ctx.correct(i, c.map(|v| math.snap(v)), *self);
                }
                ok
            }
            Self::NanToZero => {
                for i in 0..ctx.coordinates.len() {
                    let c = ctx.coordinates[i];
                    let fixed = c.map(|v| if v.is_finite() { v } else { 0.0 });
                    ctx.correct(i, fixed, *self);
                }
                true
            }
            Self::RevertToInput => {
                let original = ctx.original.clone();
                for (i, c) in original.into_iter().enumerate() {
                    if i < ctx.coordinates.len() {
                        ctx.correct(i, c, *self);
                    }
                }
                ctx.transform = None;
                debug!(operation = %ctx.operation, "reverted context to input");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::CoordinateTransform;

    #[test]
    fn test_range_clamp_records_correction() {
        let m = PrecisionMath::default();
        let mut ctx = HookContext::new("create", vec![[2e6, 1.0, -3e6]]);
        assert!(RecoveryStrategy::RangeClamp.apply(&mut ctx, &m));
        assert_eq!(ctx.coordinates[0], [1e6, 1.0, -1e6]);
        assert_eq!(ctx.corrections.len(), 1);
        assert_eq!(ctx.corrections[0].original, [2e6, 1.0, -3e6]);
    }

    #[test]
    fn test_range_clamp_cannot_fix_nan() {
        let m = PrecisionMath::default();
        let mut ctx = HookContext::new("create", vec![[f64::NAN, 0.0, 0.0]]);
        assert!(!RecoveryStrategy::RangeClamp.apply(&mut ctx, &m));
        assert!(RecoveryStrategy::NanToZero.apply(&mut ctx, &m));
        assert_eq!(ctx.coordinates[0], [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_resnap() {
        let m = PrecisionMath::default();
        let mut ctx = HookContext::new("create", vec![[1.00049, 2.0, 3.0]]);
        assert!(RecoveryStrategy::PrecisionResnap.apply(&mut ctx, &m));
        assert!((ctx.coordinates[0][0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_revert() {
        let m = PrecisionMath::default();
        let mut ctx = HookContext::new("transform", vec![[1.0, 1.0, 0.0]])
            .with_transform(CoordinateTransform::scaling(-1.0));
        ctx.coordinates[0] = [5.0, 5.0, 0.0];
        assert!(RecoveryStrategy::RevertToInput.apply(&mut ctx, &m));
        assert_eq!(ctx.coordinates[0], [1.0, 1.0, 0.0]);
        assert!(ctx.transform.is_none());
    }
}
