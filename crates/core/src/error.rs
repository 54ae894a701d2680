//! Errors raised before anything reaches the network.

use thiserror::Error;

use crate::id::BottleId;

pub type DomainResult<T> = Result<T, DomainError>;

/// Client-side failure of a cellar operation.
///
/// Transport failures are not represented here; they belong to the gateway.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Rejected input (blank name, rating off the scale, cell outside the rack).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The collection would end up inconsistent (duplicate ids, mismatched record).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("bottle {0} is not in the cellar")]
    NotFound(BottleId),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(id: BottleId) -> Self {
        Self::NotFound(id)
    }
}
