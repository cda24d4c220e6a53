use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RelationError {
    #[error("relationship {id}: source and target are the same element")]
    SelfLoop { id: String },

    #[error("relationship {id}: source and target ids must be non-empty")]
    EmptyEndpoint { id: String },

    #[error("relationship {id}: element {element} not found")]
    MissingEndpoint { id: String, element: String },

    #[error("relationship id {0} is already registered")]
    DuplicateId(String),

    #[error("relationship {id} is invalid: {}", errors.join("; "))]
    Invalid { id: String, errors: Vec<String> },

    #[error("unknown relationship type: {0}")]
    UnknownType(String),

    #[error("unknown relationship direction: {0}")]
    UnknownDirection(String),

    #[error("unknown relationship strength: {0}")]
    UnknownStrength(String),

    #[error("malformed relationship document: {0}")]
    MalformedImport(String),

    #[error("relationship export failed: {0}")]
    Export(String),
}
