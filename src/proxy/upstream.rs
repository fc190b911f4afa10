//! Outbound request construction for the deployment-based vendor API.

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method};
use reqwest::Client;

use crate::config::UpstreamConfig;
use crate::error::{Error, Result};

/// Vendor header carrying the outbound API key.
pub const API_KEY_HEADER: &str = "api-key";

/// Operation segment appended after the deployment name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ChatCompletions,
    Completions,
}

impl Operation {
    pub fn as_path(self) -> &'static str {
        match self {
            Operation::ChatCompletions => "chat/completions",
            Operation::Completions => "completions",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_path())
    }
}

/// Fully described outbound request.
#[derive(Debug)]
pub struct UpstreamRequest {
    pub url: String,
    pub method: Method,
    pub headers: HeaderMap,
    /// Re-serialized inbound JSON; `None` when the inbound request had no parsed body.
    pub body: Option<Vec<u8>>,
}

impl UpstreamRequest {
    /// Build the outbound request for `deployment` and `operation`.
    ///
    /// The deployment name is inserted as-is, so an empty name yields a
    /// `deployments//...` path that the vendor rejects on its own.
    pub fn build(
        upstream: &UpstreamConfig,
        deployment: &str,
        operation: Operation,
        method: Method,
        body: Option<&serde_json::Value>,
    ) -> Result<Self> {
        let url = format!(
            "{}/openai/deployments/{}/{}?api-version={}",
            upstream.origin(),
            deployment,
            operation.as_path(),
            upstream.api_version
        );

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        let api_key = HeaderValue::from_str(upstream.api_key.expose_secret())
            .map_err(|_| Error::Internal("AZURE_API_KEY is not a valid header value".into()))?;
        headers.insert(HeaderName::from_static(API_KEY_HEADER), api_key);

        let body = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| Error::Internal(format!("Failed to serialize request body: {}", e)))?;

        Ok(Self {
            url,
            method,
            headers,
            body,
        })
    }

    /// Turn the descriptor into a ready-to-send reqwest builder.
    pub fn into_builder(self, client: &Client) -> reqwest::RequestBuilder {
        let builder = client
            .request(self.method, &self.url)
            .headers(self.headers);
        match self.body {
            Some(body) => builder.body(body),
            None => builder,
        }
    }
}
