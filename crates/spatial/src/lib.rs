//! Spatial reasoning over a [`bim_kernel::BimModel`]: qualitative relations
//! between element footprints, collision detection, room metrics,
//! accessibility scoring and building layout analysis.
//!
//! All geometry is projected to the XY plane. Element shapes are cached by
//! the [`SpatialEngine`] on first use.

pub mod accessibility;
pub mod config;
pub mod engine;
pub mod error;
mod index;
pub mod layout;
pub mod relation;
pub mod report;
pub mod shape;

pub use accessibility::{AccessibilityKind, AccessibilityResult};
pub use config::SpatialConfig;
pub use engine::{Collision, CollisionSeverity, CollisionType, RoomMetrics, SpatialEngine, SpatialStats};
pub use error::SpatialError;
pub use layout::{
    BuildingLayout, CirculationAnalysis, EfficiencyMetrics, LayoutConstraints, LayoutOptimization, LayoutSuggestion,
    PairRelation, Priority, RelationshipAnalysis, SpatialHierarchy, Zone,
};
pub use relation::{classify, SpatialRelation};
pub use report::{AccessibilityReport, CollisionReport, SpatialReport};
pub use shape::{Location, PlanarShape, Point2};
