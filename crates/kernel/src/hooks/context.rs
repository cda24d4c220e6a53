use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Diagnostic, Severity};
use crate::geometry::CoordinateTransform;

use super::recovery::RecoveryStrategy;

/// Pipeline points a hook can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookType {
    CoordinateCreation,
    CoordinateTransformation,
    GeometricConstraint,
    PrecisionValidation,
    ErrorHandling,
    RecoveryMechanism,
}

impl HookType {
    pub const ALL: [HookType; 6] = [
        HookType::CoordinateCreation,
        HookType::CoordinateTransformation,
        HookType::GeometricConstraint,
        HookType::PrecisionValidation,
        HookType::ErrorHandling,
        HookType::RecoveryMechanism,
    ];
}

impl fmt::Display for HookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A geometric relation to verify over the context's coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum GeometricCheck {
    /// `coordinates[0]` to `coordinates[1]` equals `target`.
    Distance { target: f64 },
    /// Angle at `coordinates[1]` between `[0]` and `[2]` equals `target` radians.
    Angle { target: f64 },
    /// Line `[0]→[1]` parallel to line `[2]→[3]`.
    Parallel,
    /// Line `[0]→[1]` perpendicular to line `[2]→[3]`.
    Perpendicular,
}

impl GeometricCheck {
    pub fn points_required(&self) -> usize {
        match self {
            Self::Distance { .. } => 2,
            Self::Angle { .. } => 3,
            Self::Parallel | Self::Perpendicular => 4,
        }
    }
}

/// The constraint payload a geometric-constraint hook evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConstraintPayload {
    pub check: GeometricCheck,
    pub tolerance: f64,
}

/// One in-place correction, kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    pub index: usize,
    pub original: [f64; 3],
    pub corrected: [f64; 3],
    pub strategy: RecoveryStrategy,
}

/// Mutable state handed to each hook in turn.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub operation: String,
    /// Working copy of the raw triples under validation.
    pub coordinates: Vec<[f64; 3]>,
    /// Triples as first supplied, for revert-to-input recovery.
    pub original: Vec<[f64; 3]>,
    pub transform: Option<CoordinateTransform>,
    pub constraint: Option<ConstraintPayload>,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    pub corrections: Vec<Correction>,
    /// Wall time spent inside hooks for this context.
    pub elapsed: Duration,
}

impl HookContext {
    pub fn new(operation: impl Into<String>, coordinates: Vec<[f64; 3]>) -> Self {
        Self {
            operation: operation.into(),
            original: coordinates.clone(),
            coordinates,
            transform: None,
            constraint: None,
            errors: Vec::new(),
            warnings: Vec::new(),
            corrections: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn with_transform(mut self, transform: CoordinateTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn with_constraint(mut self, check: GeometricCheck, tolerance: f64) -> Self {
        self.constraint = Some(ConstraintPayload { check, tolerance });
        self
    }

    /// Route a finding by severity.
    pub fn record(&mut self, diagnostic: Diagnostic) {
        if diagnostic.severity.is_blocking() {
            self.errors.push(diagnostic);
        } else {
            self.warnings.push(diagnostic);
        }
    }

    /// Record a correction of `coordinates[index]` and apply it.
    pub fn correct(&mut self, index: usize, corrected: [f64; 3], strategy: RecoveryStrategy) {
        let original = self.coordinates[index];
        if original == corrected {
            return;
        }
        self.coordinates[index] = corrected;
        self.corrections.push(Correction { index, original, corrected, strategy });
    }

    pub fn has_blocking_errors(&self) -> bool {
        self.errors.iter().any(|d| d.severity.is_blocking() && !d.recovered)
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.iter().filter(|d| d.severity == Severity::Warning).count()
    }
}
