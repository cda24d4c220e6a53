//! Error taxonomy shared by every layer that touches coordinates.
//!
//! `PrecisionError` is what callers see. `Diagnostic` is what hooks record
//! mid-pipeline; a diagnostic only becomes an error when no recovery
//! strategy could absorb it.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Severity of a recorded finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// Whether a finding of this severity must reach the caller.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Severity::Error | Severity::Critical)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARN",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// Coarse classification used for routing and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input, rejected before any mutation.
    Validation,
    /// Range, NaN or degenerate-shape violation.
    Geometric,
    /// Matrix, rotation or scale application failure.
    Transformation,
    /// A constraint could not be satisfied.
    ConstraintViolation,
    /// Arithmetic failure such as division by a near-zero value.
    Calculation,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Coordinate axis, used to point at the offending component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(&self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        };
        f.write_str(s)
    }
}

/// A single finding recorded while an operation runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub severity: Severity,
    /// Name of the operation that produced the finding.
    pub operation: String,
    pub message: String,
    /// Raw coordinate triples involved, as seen when the finding was made.
    pub coordinates: Vec<[f64; 3]>,
    /// Set once a recovery strategy corrected the offending data.
    pub recovered: bool,
}

impl Diagnostic {
    pub fn new(kind: ErrorKind, operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Error,
            operation: operation.into(),
            message: message.into(),
            coordinates: Vec::new(),
            recovered: false,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_coordinates(mut self, coordinates: Vec<[f64; 3]>) -> Self {
        self.coordinates = coordinates;
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} in {}: {}", self.severity, self.kind, self.operation, self.message)?;
        if !self.coordinates.is_empty() {
            write!(f, " at {:?}", self.coordinates)?;
        }
        if self.recovered {
            write!(f, " (recovered)")?;
        }
        Ok(())
    }
}

/// Errors surfaced by the precision layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PrecisionError {
    #[error("{axis} component is not finite ({value})")]
    NonFinite { axis: Axis, value: f64 },

    #[error("{axis} component {value} exceeds the coordinate range ±{max_range}")]
    OutOfRange { axis: Axis, value: f64, max_range: f64 },

    #[error("validation failed in {operation}: {message}")]
    Validation { operation: String, message: String },

    #[error("geometric error in {operation}: {message}")]
    Geometric { operation: String, message: String },

    #[error("transformation failed in {operation}: {message}")]
    Transformation { operation: String, message: String },

    #[error("constraint violated in {operation}: {message}")]
    ConstraintViolation { operation: String, message: String },

    #[error("calculation failed in {operation}: {message}")]
    Calculation { operation: String, message: String },

    /// A mid-pipeline finding that no recovery strategy absorbed.
    #[error("unrecovered: {0}")]
    Escalated(Box<Diagnostic>),
}

impl PrecisionError {
    pub fn validation(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation { operation: operation.into(), message: message.into() }
    }

    pub fn geometric(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Geometric { operation: operation.into(), message: message.into() }
    }

    pub fn transformation(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transformation { operation: operation.into(), message: message.into() }
    }

    pub fn calculation(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Calculation { operation: operation.into(), message: message.into() }
    }

    /// Where this error sits in the taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NonFinite { .. } | Self::OutOfRange { .. } | Self::Geometric { .. } => {
                ErrorKind::Geometric
            }
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Transformation { .. } => ErrorKind::Transformation,
            Self::ConstraintViolation { .. } => ErrorKind::ConstraintViolation,
            Self::Calculation { .. } => ErrorKind::Calculation,
            Self::Escalated(d) => d.kind,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::Escalated(d) => d.severity,
            _ => Severity::Error,
        }
    }

    /// Convert into a diagnostic attributed to `operation`.
    pub fn to_diagnostic(&self, operation: &str) -> Diagnostic {
        match self {
            Self::Escalated(d) => (**d).clone(),
            other => Diagnostic::new(other.kind(), operation, other.to_string()),
        }
    }
}

/// Errors while loading configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("{field} must be positive and finite (got {value})")]
    NotPositive { field: &'static str, value: f64 },
}
