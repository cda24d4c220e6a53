use bim_kernel::PrecisionError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssemblyError {
    #[error("component {0} is already in the assembly")]
    DuplicateComponent(String),

    #[error("unknown component {0}")]
    UnknownComponent(String),

    #[error("constraint {id}: {message}")]
    InvalidConstraint { id: String, message: String },

    #[error("invalid hierarchy: {0}")]
    InvalidHierarchy(String),

    #[error("component {id}: {message}")]
    InvalidTransform { id: String, message: String },

    #[error(transparent)]
    Precision(#[from] PrecisionError),
}
