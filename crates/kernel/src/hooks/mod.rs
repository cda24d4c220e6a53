//! Priority-ordered validation hooks around coordinate operations.
//!
//! Hooks register under a `HookType` with a priority (higher runs first,
//! ties run in registration order) and an optional recovery strategy. A
//! failing hook never aborts the pass: its diagnostic is recorded in the
//! context, recovery is attempted, and only findings that stay unrecovered
//! and blocking are escalated once every hook has run.

pub mod builtin;
pub mod context;
pub mod recovery;

use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use slotmap::{SlotMap, new_key_type};
use tracing::{debug, warn};

use crate::config::PrecisionConfig;
use crate::error::{Diagnostic, PrecisionError, Severity};
use crate::geometry::{Coordinate, CoordinateTransform, PrecisionMath};

pub use context::{ConstraintPayload, Correction, GeometricCheck, HookContext, HookType};
pub use recovery::RecoveryStrategy;

new_key_type! {
    pub struct HookId;
}

/// A validation step. Returning `Err` reports a finding; it does not stop the pipeline.
pub trait PrecisionHook: Send + Sync {
    fn name(&self) -> &str;
    fn run(&self, ctx: &mut HookContext, math: &PrecisionMath) -> Result<(), Diagnostic>;
}

/// Adapts a closure into a hook.
pub struct FnHook<F> {
    name: String,
    f: F,
}

impl<F> FnHook<F>
where
    F: Fn(&mut HookContext, &PrecisionMath) -> Result<(), Diagnostic> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f }
    }
}

impl<F> PrecisionHook for FnHook<F>
where
    F: Fn(&mut HookContext, &PrecisionMath) -> Result<(), Diagnostic> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, ctx: &mut HookContext, math: &PrecisionMath) -> Result<(), Diagnostic> {
        (self.f)(ctx, math)
    }
}

/// Registration parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct HookOptions {
    pub priority: i32,
    pub enabled: bool,
    pub recovery: Option<RecoveryStrategy>,
    pub description: String,
}

impl Default for HookOptions {
    fn default() -> Self {
        Self { priority: 0, enabled: true, recovery: None, description: String::new() }
    }
}

impl HookOptions {
    pub fn priority(priority: i32) -> Self {
        Self { priority, ..Self::default() }
    }

    pub fn with_recovery(mut self, strategy: RecoveryStrategy) -> Self {
        self.recovery = Some(strategy);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

struct Registration {
    hook_type: HookType,
    options: HookOptions,
    hook: Box<dyn PrecisionHook>,
}

/// Read-only view of one registration.
#[derive(Debug, Clone, PartialEq)]
pub struct HookInfo {
    pub id: HookId,
    pub name: String,
    pub hook_type: HookType,
    pub priority: i32,
    pub enabled: bool,
    pub recovery: Option<RecoveryStrategy>,
}

/// Owns the hooks for one session.
pub struct HookRegistry {
    math: PrecisionMath,
    hooks: SlotMap<HookId, Registration>,
    order: HashMap<HookType, Vec<HookId>>,
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("math", &self.math)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::with_defaults(PrecisionConfig::default())
    }
}

impl HookRegistry {
    /// An empty registry.
    pub fn new(config: PrecisionConfig) -> Self {
        Self {
            math: PrecisionMath::new(config),
            hooks: SlotMap::with_key(),
            order: HashMap::new(),
        }
    }

    /// A registry with the stock validation, error-handling and recovery hooks.
    pub fn with_defaults(config: PrecisionConfig) -> Self {
        use builtin::*;

        let mut reg = Self::new(config);
        reg.register(
            HookType::CoordinateCreation,
            FiniteCheck,
            HookOptions::priority(20)
                .with_recovery(RecoveryStrategy::NanToZero)
                .describe("reject NaN and infinite components"),
        );
        reg.register(
            HookType::CoordinateCreation,
            RangeCheck,
            HookOptions::priority(10)
                .with_recovery(RecoveryStrategy::RangeClamp)
                .describe("reject components beyond the coordinate range"),
        );
        reg.register(
            HookType::PrecisionValidation,
            GridCheck,
            HookOptions::priority(5)
                .with_recovery(RecoveryStrategy::PrecisionResnap)
                .describe("keep components on the precision grid"),
        );
        reg.register(
            HookType::CoordinateTransformation,
            TransformCheck,
            HookOptions::priority(10)
                .with_recovery(RecoveryStrategy::RevertToInput)
                .describe("validate scale, rotation and matrix"),
        );
        reg.register(
            HookType::GeometricConstraint,
            GeometricConstraintCheck,
            HookOptions::priority(10).describe("evaluate geometric relations"),
        );
        reg.register(
            HookType::ErrorHandling,
            LogErrors,
            HookOptions::priority(1).describe("log unrecovered findings"),
        );
        reg.register(
            HookType::RecoveryMechanism,
            ResnapRecovery,
            HookOptions::priority(1).describe("snap coordinates back onto the grid"),
        );
        reg
    }

    pub fn math(&self) -> &PrecisionMath {
        &self.math
    }

    pub fn register<H>(&mut self, hook_type: HookType, hook: H, options: HookOptions) -> HookId
    where
        H: PrecisionHook + 'static,
    {
        let priority = options.priority;
        let id = self.hooks.insert(Registration { hook_type, options, hook: Box::new(hook) });

        let hooks = &self.hooks;
        let list = self.order.entry(hook_type).or_default();
        // After every existing hook of equal or higher priority.
        let pos = list
            .iter()
            .position(|other| hooks[*other].options.priority < priority)
            .unwrap_or(list.len());
        list.insert(pos, id);

        debug!(%hook_type, priority, hook = self.hooks[id].hook.name(), "registered hook");
        id
    }

    pub fn unregister(&mut self, id: HookId) -> bool {
        let Some(reg) = self.hooks.remove(id) else {
            return false;
        };
        if let Some(list) = self.order.get_mut(&reg.hook_type) {
            list.retain(|other| *other != id);
        }
        true
    }

    pub fn set_enabled(&mut self, id: HookId, enabled: bool) -> bool {
        match self.hooks.get_mut(id) {
            Some(reg) => {
                reg.options.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Registrations for `hook_type` in execution order.
    pub fn hooks_for(&self, hook_type: HookType) -> Vec<HookInfo> {
        self.order
            .get(&hook_type)
            .map(|ids| {
                ids.iter()
                    .map(|&id| {
                        let reg = &self.hooks[id];
                        HookInfo {
                            id,
                            name: reg.hook.name().to_string(),
                            hook_type,
                            priority: reg.options.priority,
                            enabled: reg.options.enabled,
                            recovery: reg.options.recovery,
                        }
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run every enabled hook of `hook_type` against `ctx`.
    ///
    /// Fails with `PrecisionError::Escalated` carrying the first blocking
    /// finding that no recovery absorbed; the context keeps all of them.
    pub fn execute(&self, hook_type: HookType, ctx: &mut HookContext) -> Result<(), PrecisionError> {
        let start = Instant::now();
        self.run_hooks(hook_type, ctx);
        ctx.elapsed += start.elapsed();

        match ctx.errors.iter().find(|d| d.severity.is_blocking() && !d.recovered) {
            Some(d) => Err(PrecisionError::Escalated(Box::new(d.clone()))),
            None => Ok(()),
        }
    }

    fn run_hooks(&self, hook_type: HookType, ctx: &mut HookContext) {
        let Some(ids) = self.order.get(&hook_type) else {
            return;
        };
        for &id in ids {
            let Some(reg) = self.hooks.get(id) else {
                continue;
            };
            if !reg.options.enabled {
                continue;
            }
            debug!(%hook_type, hook = reg.hook.name(), operation = %ctx.operation, "running hook");

            let Err(mut diagnostic) = reg.hook.run(ctx, &self.math) else {
                continue;
            };

            // Handlers that fail are noted, never handled recursively.
            if matches!(hook_type, HookType::ErrorHandling | HookType::RecoveryMechanism) {
                warn!(hook = reg.hook.name(), "{diagnostic}");
                diagnostic.severity = Severity::Warning;
                ctx.warnings.push(diagnostic);
                continue;
            }

            let blocking = diagnostic.severity.is_blocking();
            let recovered = self.math.config().recovery_enabled && self.recover(reg, ctx);
            if recovered || !blocking {
                if recovered {
                    debug!(hook = reg.hook.name(), "recovered: {diagnostic}");
                }
                diagnostic.recovered = recovered;
                if blocking {
                    diagnostic.severity = Severity::Warning;
                }
                ctx.warnings.push(diagnostic);
            } else {
                warn!(hook = reg.hook.name(), "{diagnostic}");
                ctx.errors.push(diagnostic);
                self.run_hooks(HookType::ErrorHandling, ctx);
            }
        }
    }

    /// Apply the registration's strategy, or the recovery hooks if it has
    /// none, then re-run the failing hook to confirm the fix. Every change is
    /// in `ctx.corrections`; a failed attempt is rolled back.
    fn recover(&self, reg: &Registration, ctx: &mut HookContext) -> bool {
        let coordinates = ctx.coordinates.clone();
        let transform = ctx.transform;
        let corrections = ctx.corrections.len();
        let applied = match reg.options.recovery {
            Some(strategy) => strategy.apply(ctx, &self.math),
            None => {
                let has_handlers =
                    self.order.get(&HookType::RecoveryMechanism).is_some_and(|ids| !ids.is_empty());
                if has_handlers {
                    let before = ctx.warnings.len();
                    self.run_hooks(HookType::RecoveryMechanism, ctx);
                    ctx.warnings.len() == before
                } else {
                    false
                }
            }
        };
        if applied && reg.hook.run(ctx, &self.math).is_ok() {
            debug!(
                hook = reg.hook.name(),
                corrections = ctx.corrections.len() - corrections,
                "recovery confirmed"
            );
            return true;
        }
        ctx.coordinates = coordinates;
        ctx.transform = transform;
        ctx.corrections.truncate(corrections);
        false
    }

    /// Create a coordinate through the creation and precision hooks.
    pub fn create_coordinate(
        &self,
        x: f64,
        y: f64,
        z: f64,
    ) -> Result<(Coordinate, HookContext), PrecisionError> {
        let mut ctx = HookContext::new("create_coordinate", vec![[x, y, z]]);
        self.execute(HookType::CoordinateCreation, &mut ctx)?;
        self.execute(HookType::PrecisionValidation, &mut ctx)?;
        let [x, y, z] = ctx.coordinates[0];
        let c = self.math.coordinate(x, y, z)?;
        Ok((c, ctx))
    }

    /// Transform coordinates after the transformation hooks approve the
    /// transform. A reverted transform leaves the input unchanged.
    pub fn transform_coordinates(
        &self,
        coordinates: &[Coordinate],
        transform: CoordinateTransform,
    ) -> Result<(Vec<Coordinate>, HookContext), PrecisionError> {
        let raw = coordinates.iter().map(Coordinate::to_array).collect();
        let mut ctx = HookContext::new("transform_coordinates", raw).with_transform(transform);
        self.execute(HookType::CoordinateTransformation, &mut ctx)?;

        let out = match ctx.transform {
            Some(t) => coordinates
                .iter()
                .map(|c| t.apply(c, &self.math))
                .collect::<Result<Vec<_>, _>>()?,
            None => coordinates.to_vec(),
        };
        Ok((out, ctx))
    }

    /// Evaluate a geometric relation through the constraint hooks. Never
    /// fails; violations are left in the returned context.
    pub fn check_constraint(
        &self,
        operation: &str,
        points: Vec<[f64; 3]>,
        check: GeometricCheck,
        tolerance: f64,
    ) -> HookContext {
        let mut ctx = HookContext::new(operation, points).with_constraint(check, tolerance);
        if let Err(e) = self.execute(HookType::GeometricConstraint, &mut ctx) {
            debug!(operation, "constraint check escalated: {e}");
        }
        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::{Arc, Mutex};

    fn recorder(log: &Arc<Mutex<Vec<String>>>, name: &str) -> impl PrecisionHook + 'static {
        let log = Arc::clone(log);
        let tag = name.to_string();
        FnHook::new(name, move |_ctx: &mut HookContext, _m: &PrecisionMath| {
            log.lock().unwrap().push(tag.clone());
            Ok(())
        })
    }

    #[test]
    fn test_priority_order_with_stable_ties() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut reg = HookRegistry::new(PrecisionConfig::default());
        reg.register(HookType::CoordinateCreation, recorder(&log, "low"), HookOptions::priority(1));
        reg.register(HookType::CoordinateCreation, recorder(&log, "high-a"), HookOptions::priority(9));
        reg.register(HookType::CoordinateCreation, recorder(&log, "high-b"), HookOptions::priority(9));
        reg.register(HookType::CoordinateCreation, recorder(&log, "mid"), HookOptions::priority(5));

        let mut ctx = HookContext::new("t", vec![[0.0; 3]]);
        reg.execute(HookType::CoordinateCreation, &mut ctx).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["high-a", "high-b", "mid", "low"]);
    }

    #[test]
    fn test_disabled_and_unregistered_hooks_skip() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut reg = HookRegistry::new(PrecisionConfig::default());
        let a = reg.register(HookType::PrecisionValidation, recorder(&log, "a"), HookOptions::default());
        let b = reg.register(HookType::PrecisionValidation, recorder(&log, "b"), HookOptions::default());
        assert!(reg.set_enabled(a, false));
        let mut ctx = HookContext::new("t", vec![]);
        reg.execute(HookType::PrecisionValidation, &mut ctx).unwrap();
        assert!(reg.unregister(b));
        assert!(!reg.unregister(b));
        reg.execute(HookType::PrecisionValidation, &mut ctx).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["b"]);
    }

    #[test]
    fn test_create_coordinate_recovers_nan() {
        let reg = HookRegistry::default();
        let (c, ctx) = reg.create_coordinate(f64::NAN, 2.0004, 3.0).unwrap();
        assert_eq!(c.x(), 0.0);
        assert!((c.y() - 2.0).abs() < 1e-12);
        assert!(ctx.errors.is_empty());
        assert!(ctx.warnings.iter().any(|d| d.recovered));
        let fix = &ctx.corrections[0];
        assert!(fix.original[0].is_nan());
        assert_eq!(fix.corrected[0], 0.0);
    }

    #[test]
    fn test_create_coordinate_escalates_without_recovery() {
        let reg = HookRegistry::with_defaults(PrecisionConfig::strict());
        let err = reg.create_coordinate(0.0, 5e6, 0.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Geometric);
        match err {
            PrecisionError::Escalated(d) => {
                assert_eq!(d.operation, "create_coordinate");
                assert_eq!(d.coordinates, vec![[0.0, 5e6, 0.0]]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_range_clamped_when_recovery_enabled() {
        let reg = HookRegistry::default();
        let (c, _) = reg.create_coordinate(0.0, 5e6, 0.0).unwrap();
        assert!((c.y() - 1e6).abs() < 1e-6);
    }

    #[test]
    fn test_transform_reverted() {
        let reg = HookRegistry::default();
        let p = Coordinate::new(1.0, 2.0, 0.0).unwrap();
        let (out, ctx) = reg
            .transform_coordinates(&[p], CoordinateTransform::scaling(-2.0))
            .unwrap();
        assert_eq!(out, vec![p]);
        assert!(ctx.transform.is_none());
        assert_eq!(ctx.warnings.len(), 1);

        let (out, _) = reg
            .transform_coordinates(&[p], CoordinateTransform::translation(1.0, 0.0, 0.0))
            .unwrap();
        assert!((out[0].x() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_check_constraint_collects_violation() {
        let reg = HookRegistry::default();
        let ctx = reg.check_constraint(
            "distance",
            vec![[0.0; 3], [1.0, 0.0, 0.0]],
            GeometricCheck::Distance { target: 2.0 },
            1e-3,
        );
        assert_eq!(ctx.errors.len(), 1);
        assert_eq!(ctx.errors[0].kind, ErrorKind::ConstraintViolation);
    }

    #[test]
    fn test_check_constraint_resnap_is_recorded() {
        let reg = HookRegistry::with_defaults(PrecisionConfig::auto_correct());
        let ctx = reg.check_constraint(
            "distance",
            vec![[0.0; 3], [1.0004, 0.0, 0.0]],
            GeometricCheck::Distance { target: 1.0 },
            1e-4,
        );
        assert!(ctx.errors.is_empty());
        assert!(ctx.warnings.iter().any(|d| d.recovered));
        assert_eq!(ctx.coordinates[1], [1.0, 0.0, 0.0]);
        assert_eq!(ctx.corrections.len(), 1);
        let fix = &ctx.corrections[0];
        assert_eq!((fix.index, fix.original, fix.corrected), (1, [1.0004, 0.0, 0.0], [1.0, 0.0, 0.0]));
        assert_eq!(fix.strategy, RecoveryStrategy::PrecisionResnap);
    }

    #[test]
    fn test_check_constraint_failed_resnap_rolls_back() {
        let reg = HookRegistry::with_defaults(PrecisionConfig::auto_correct());
        let ctx = reg.check_constraint(
            "distance",
            vec![[0.0; 3], [1.0004, 0.0, 0.0]],
            GeometricCheck::Distance { target: 2.0 },
            1e-4,
        );
        assert_eq!(ctx.errors.len(), 1);
        assert!(!ctx.errors[0].recovered);
        assert_eq!(ctx.coordinates, ctx.original);
        assert!(ctx.corrections.is_empty());
    }

    #[test]
    fn test_hooks_for_lists_defaults() {
        let reg = HookRegistry::default();
        let creation = reg.hooks_for(HookType::CoordinateCreation);
        assert_eq!(creation.len(), 2);
        assert_eq!(creation[0].name, "finite_check");
        assert_eq!(creation[0].priority, 20);
        assert_eq!(reg.len(), 7);
    }
}
