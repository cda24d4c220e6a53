//! Assemblies of placed components: hierarchy by id, assembly constraints,
//! and a two-phase interference check that drives the assembly status.

pub mod assembly;
pub mod component;
pub mod error;
pub mod interference;

pub use assembly::{
    Assembly, AssemblyConstraint, AssemblyInfo, AssemblyStatus, ComponentPlacement, ValidationReport,
    ASSEMBLY_CONSTRAINT_KINDS, OVER_CONSTRAINT_FACTOR,
};
pub use component::{Component, ComponentStatus};
pub use error::AssemblyError;
pub use interference::{find_interferences, Interference, InterferenceConfig};
