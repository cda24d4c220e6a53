//! Typed relationship graph over BIM model elements.
//!
//! Edges are validated against a caller-owned [`BimModel`](bim_kernel::BimModel)
//! at insertion and on demand; the manager never holds element values.

pub mod conflict;
pub mod error;
pub mod export;
pub mod manager;
pub mod types;

pub use conflict::{Conflict, ConflictSeverity, ResolutionAction, ResolutionReport};
pub use error::RelationError;
pub use export::{ExportDocument, ExportStats, ImportReport, RelationshipRecord};
pub use manager::{
    GraphStats, IntegrityReport, PathStep, RelationshipFilter, RelationshipManager, RepairReport,
    ValidationSummary,
};
pub use types::{Direction, Relationship, RelationshipConstraints, RelationshipType, Strength};
