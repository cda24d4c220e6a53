pub mod config;
pub mod error;
pub mod geometry;
pub mod hooks;
pub mod model;

// Re-export the types nearly every caller needs.
pub use config::{PrecisionConfig, ValidationMode};
pub use error::{Axis, ConfigError, Diagnostic, ErrorKind, PrecisionError, Severity};
pub use geometry::{
    BoundingBox, Coordinate, CoordinateTransform, EntityKind, GeometricEntity, PrecisionMath,
    Shape, Vec3,
};
pub use hooks::{HookContext, HookId, HookOptions, HookRegistry, HookType, RecoveryStrategy};
pub use model::{BimModel, Element, ElementKind};
