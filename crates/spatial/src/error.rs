use bim_kernel::{ElementKind, PrecisionError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpatialError {
    #[error("unknown element {0}")]
    UnknownElement(String),

    #[error("element {id} is a {kind:?}, not a room")]
    NotARoom { id: String, kind: ElementKind },

    #[error(transparent)]
    Precision(#[from] PrecisionError),
}
