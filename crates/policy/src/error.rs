use thiserror::Error;

/// Malformed-request errors.
///
/// These are raised before anything reaches storage. Policy denials are
/// never errors: they surface as empty reads and zero-row writes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("unknown relation '{0}'")]
    UnknownRelation(String),

    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    #[error("unknown column '{column}' on relation '{relation}'")]
    UnknownColumn { relation: String, column: String },

    #[error("unknown helper '{0}'")]
    UnknownHelper(String),

    #[error("invalid helper arguments: {0}")]
    InvalidArguments(String),
}

pub type PolicyResult<T> = Result<T, PolicyError>;
