//! REST implementation of the remote gateway.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use cellar_core::BottleId;
use cellar_inventory::{BottleDraft, BottlePatch, BottleRecord};

use crate::config::ClientConfig;
use crate::gateway::{GatewayError, RatingSummary, RemoteGateway};

/// Gateway speaking JSON over HTTP to the cellar API.
///
/// No timeouts and no retries: a failed request is reported once and the
/// caller decides whether to invoke the operation again.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
}

/// Error body returned by the API on non-success responses.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.api_url.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, GatewayError> {
        let resp = req
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        Err(GatewayError::Api {
            status: status.as_u16(),
            message: error_message(status, &body),
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, GatewayError> {
        self.send(req)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))
    }
}

/// Message for a failed response: the body's `error` field when the body is
/// JSON, the status text when it is not.
fn error_message(status: StatusCode, body: &str) -> String {
    let fallback = || format!("HTTP {}", status.as_u16());
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => parsed
            .error
            .filter(|msg| !msg.trim().is_empty())
            .unwrap_or_else(fallback),
        Err(_) => status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(fallback),
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn list(&self) -> Result<Vec<BottleRecord>, GatewayError> {
        tracing::debug!("GET /api/bottles");
        self.send_json(self.client.get(self.url("/api/bottles"))).await
    }

    async fn create(&self, draft: &BottleDraft) -> Result<BottleRecord, GatewayError> {
        tracing::debug!(name = %draft.name, year = draft.year, "POST /api/bottles");
        self.send_json(self.client.post(self.url("/api/bottles")).json(draft)).await
    }

    async fn patch(&self, id: BottleId, patch: &BottlePatch) -> Result<BottleRecord, GatewayError> {
        tracing::debug!(%id, ?patch, "PUT /api/bottles/{{id}}");
        let url = self.url(&format!("/api/bottles/{id}"));
        self.send_json(self.client.put(url).json(patch)).await
    }

    async fn delete(&self, id: BottleId) -> Result<(), GatewayError> {
        tracing::debug!(%id, "DELETE /api/bottles/{{id}}");
        let url = self.url(&format!("/api/bottles/{id}"));
        self.send(self.client.delete(url)).await.map(|_| ())
    }

    async fn add_comment(&self, id: BottleId, text: &str) -> Result<BottleRecord, GatewayError> {
        tracing::debug!(%id, "POST /api/bottles/{{id}}/comments");
        let url = self.url(&format!("/api/bottles/{id}/comments"));
        self.send_json(self.client.post(url).json(&json!({ "text": text }))).await
    }

    async fn fetch_rating(&self, id: BottleId) -> Result<BottleRecord, GatewayError> {
        tracing::debug!(%id, "POST /api/bottles/{{id}}/fetch-rating");
        let url = self.url(&format!("/api/bottles/{id}/fetch-rating"));
        self.send_json(self.client.post(url)).await
    }

    async fn fetch_all_ratings(&self) -> Result<RatingSummary, GatewayError> {
        tracing::debug!("POST /api/bottles/fetch-all-ratings");
        self.send_json(self.client.post(self.url("/api/bottles/fetch-all-ratings"))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_field_wins() {
        let msg = error_message(StatusCode::BAD_REQUEST, r#"{"error":"name required"}"#);
        assert_eq!(msg, "name required");
    }

    #[test]
    fn json_without_error_field_falls_back_to_status_code() {
        let msg = error_message(StatusCode::INTERNAL_SERVER_ERROR, "{}");
        assert_eq!(msg, "HTTP 500");
    }

    #[test]
    fn unparseable_body_falls_back_to_status_text() {
        let msg = error_message(StatusCode::NOT_FOUND, "<html>nope</html>");
        assert_eq!(msg, "Not Found");

        let msg = error_message(StatusCode::from_u16(599).unwrap(), "");
        assert_eq!(msg, "HTTP 599");
    }

    #[test]
    fn trailing_slash_is_dropped() {
        let gateway = HttpGateway::new("http://cellar.local:5000/");
        assert_eq!(gateway.base_url(), "http://cellar.local:5000");
        assert_eq!(gateway.url("/api/bottles"), "http://cellar.local:5000/api/bottles");
    }
}
