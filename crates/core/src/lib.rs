//! Shared building blocks of the cellar client: errors and identifiers.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::BottleId;
