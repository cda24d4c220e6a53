use bim_kernel::{Diagnostic, EntityKind, ErrorKind, PrecisionError};
use thiserror::Error;

use crate::constraint::ConstraintKind;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    #[error("constraint {id}: {kind:?} expects {expected} entities, got {got}")]
    Arity {
        id: String,
        kind: ConstraintKind,
        expected: String,
        got: usize,
    },

    #[error("constraint {id}: entity {entity} is referenced more than once")]
    DuplicateEntity { id: String, entity: String },

    #[error("constraint {id}: unknown entity {entity}")]
    UnknownEntity { id: String, entity: String },

    #[error("constraint {id}: {message}")]
    InvalidParameter { id: String, message: String },

    #[error("constraint {id}: {kind:?} cannot apply to {entity} ({entity_kind:?})")]
    UnsupportedEntity {
        id: String,
        kind: ConstraintKind,
        entity: String,
        entity_kind: EntityKind,
    },

    #[error("constraint id {0} is already registered")]
    DuplicateId(String),

    #[error("did not converge after {iterations} iterations (total error {total_error})")]
    DidNotConverge { iterations: usize, total_error: f64 },

    #[error(transparent)]
    Precision(#[from] PrecisionError),
}

impl SolverError {
    pub fn to_diagnostic(&self, operation: &str) -> Diagnostic {
        let kind = match self {
            Self::Precision(e) => return e.to_diagnostic(operation),
            Self::DidNotConverge { .. } => ErrorKind::ConstraintViolation,
            _ => ErrorKind::Validation,
        };
        Diagnostic::new(kind, operation, self.to_string())
    }
}
