//! Remote gateway boundary: the operations the inventory store needs from the API.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use cellar_core::BottleId;
use cellar_inventory::{BottleDraft, BottlePatch, BottleRecord};

/// Aggregate outcome of a bulk rating refresh. No per-bottle detail is available.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RatingSummary {
    pub updated: u32,
    pub failed: u32,
}

/// Transport-level failure of a gateway call.
///
/// `Api` displays the server-provided message verbatim so it can be shown to
/// the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("network error: {0}")]
    Network(String),
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("parse error: {0}")]
    Parse(String),
}

impl GatewayError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// HTTP status of an API failure, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Operations offered by the remote inventory service.
///
/// Every mutating call answers with the full, server-computed record (never
/// just the changed fields). Implementations do not retry.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn list(&self) -> Result<Vec<BottleRecord>, GatewayError>;

    async fn create(&self, draft: &BottleDraft) -> Result<BottleRecord, GatewayError>;

    async fn patch(&self, id: BottleId, patch: &BottlePatch) -> Result<BottleRecord, GatewayError>;

    async fn delete(&self, id: BottleId) -> Result<(), GatewayError>;

    /// Append a comment; answers with the record including the new comment.
    async fn add_comment(&self, id: BottleId, text: &str) -> Result<BottleRecord, GatewayError>;

    /// Run the external rating lookup for one bottle.
    async fn fetch_rating(&self, id: BottleId) -> Result<BottleRecord, GatewayError>;

    async fn fetch_all_ratings(&self) -> Result<RatingSummary, GatewayError>;
}

#[async_trait]
impl<G> RemoteGateway for Arc<G>
where
    G: RemoteGateway + ?Sized,
{
    async fn list(&self) -> Result<Vec<BottleRecord>, GatewayError> {
        (**self).list().await
    }

    async fn create(&self, draft: &BottleDraft) -> Result<BottleRecord, GatewayError> {
        (**self).create(draft).await
    }

    async fn patch(&self, id: BottleId, patch: &BottlePatch) -> Result<BottleRecord, GatewayError> {
        (**self).patch(id, patch).await
    }

    async fn delete(&self, id: BottleId) -> Result<(), GatewayError> {
        (**self).delete(id).await
    }

    async fn add_comment(&self, id: BottleId, text: &str) -> Result<BottleRecord, GatewayError> {
        (**self).add_comment(id, text).await
    }

    async fn fetch_rating(&self, id: BottleId) -> Result<BottleRecord, GatewayError> {
        (**self).fetch_rating(id).await
    }

    async fn fetch_all_ratings(&self) -> Result<RatingSummary, GatewayError> {
        (**self).fetch_all_ratings().await
    }
}
