use thiserror::Error;

use classguard_core::DomainError;
use classguard_infra::StoreError;
use classguard_policy::PolicyError;

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Gateway failure.
///
/// Policy denials are not errors: they surface as empty results. Errors are
/// malformed requests (rejected before storage is touched), invalid rows,
/// domain invariant violations and storage failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GatewayError {
    /// Unknown relation, operation, helper or column, or bad helper arguments.
    #[error("malformed request: {0}")]
    Malformed(#[from] PolicyError),

    /// A row or patch does not describe a valid record.
    #[error("invalid row: {0}")]
    InvalidRow(String),

    /// A write would break a domain invariant (e.g. a grade above max points).
    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl From<DomainError> for GatewayError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::InvariantViolation(msg) => GatewayError::Invariant(msg),
            DomainError::Validation(msg) | DomainError::InvalidId(msg) | DomainError::RowConversion(msg) => {
                GatewayError::InvalidRow(msg)
            }
        }
    }
}
