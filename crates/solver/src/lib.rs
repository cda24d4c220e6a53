//! Iterative solver for geometric constraints between drawing entities.
//!
//! Entities are owned by the caller and passed in as an id → entity map;
//! constraints only ever hold entity ids.

pub mod constraint;
pub mod error;
pub mod solver;

pub use constraint::{point_entity, Arity, Constraint, ConstraintKind, ConstraintStatus, EntityMap};
pub use error::SolverError;
pub use solver::{ConstraintSolver, SolveReport, SolverConfig, StatusCounts, SystemStatus};
