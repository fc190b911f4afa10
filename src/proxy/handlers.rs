//! HTTP request handlers.

use axum::{
    body::Bytes,
    extract::{Extension, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
};

use super::relay::relay;
use super::server::{AppState, RequestId};
use super::types::ModelList;
use super::upstream::{Operation, UpstreamRequest};
use crate::error::{Error, Result};

/// Informational page served at `/`.
const INDEX_HTML: &str = r#"
    <html>
      <head>
        <title>Azure API</title>
        <style>
          body {
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto,
            font-size: 1.2rem;
            line-height: 1.5;
            color: #333;
          }
          .container {
            max-width: 800px;
            margin: 0 auto;
            padding: 0 1rem;
          }
        </style>
      </head>
      <body>
        <div class="container">
          <h1>Hello World!</h1>
          <p>The quieter you become, the more you are able to hear.</p>
        </div>
      </body>
    </html>
    "#;

/// Handle `/`
pub async fn index() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=UTF-8")],
        INDEX_HTML,
    )
}

/// Handle `/v1/models` - the fixed model catalog
pub async fn list_models() -> Result<Response> {
    let json = serde_json::to_string_pretty(&ModelList::catalog())
        .map_err(|e| Error::Internal(format!("Failed to render model catalog: {}", e)))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        json,
    )
        .into_response())
}

/// Handle `/v1/chat/completions`
pub async fn chat_completions(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    proxy(&state, request_id, Operation::ChatCompletions, method, &headers, &body).await
}

/// Handle `/v1/completions`
pub async fn completions(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    proxy(&state, request_id, Operation::Completions, method, &headers, &body).await
}

/// Fallback for every unrouted path.
pub async fn not_found() -> Error {
    Error::NotFound
}

/// Parse the inbound body. Only POST bodies are read.
fn parse_body(method: &Method, body: &[u8]) -> Result<Option<serde_json::Value>> {
    if *method != Method::POST {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(Error::MalformedBody)
}

/// Pick the deployment name for a parsed body.
///
/// A non-empty string, a non-zero number or `true` is taken as text and
/// resolved through the alias table. Anything else yields an empty
/// deployment name.
fn deployment_for(state: &AppState, body: Option<&serde_json::Value>) -> String {
    body.and_then(|b| b.get("model"))
        .and_then(model_name)
        .map(|model| state.aliases.resolve(&model).to_string())
        .unwrap_or_default()
}

/// Text form of a `model` value that names a deployment.
fn model_name(value: &serde_json::Value) -> Option<String> {
    use serde_json::Value;

    match value {
        Value::String(name) if !name.is_empty() => Some(name.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

/// Compare the `Authorization` header byte-for-byte with the shared secret.
fn authorize(state: &AppState, headers: &HeaderMap) -> Result<()> {
    let presented = headers
        .get(header::AUTHORIZATION)
        .map(|v| v.as_bytes())
        .filter(|v| !v.is_empty());

    match (presented, &state.config.auth.secret) {
        (Some(presented), Some(secret)) if presented == secret.expose_secret().as_bytes() => {
            Ok(())
        }
        _ => Err(Error::Forbidden),
    }
}

/// Proxied completion flow: parse, resolve, authorize, then relay.
async fn proxy(
    state: &AppState,
    request_id: RequestId,
    operation: Operation,
    method: Method,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response> {
    let payload = parse_body(&method, body)?;
    let deployment = deployment_for(state, payload.as_ref());

    tracing::info!(
        request_id = %request_id.0,
        operation = %operation,
        method = %method,
        deployment = %deployment,
        "Received completion request"
    );

    if deployment.is_empty() && state.config.models.require_model {
        return Err(Error::MissingModel);
    }

    if let Err(e) = authorize(state, headers) {
        tracing::warn!(request_id = %request_id.0, "Rejected request with bad credential");
        return Err(e);
    }

    let request = UpstreamRequest::build(
        &state.config.upstream,
        &deployment,
        operation,
        method,
        payload.as_ref(),
    )?;

    relay(&state.http_client, request, state.config.stream.pacing).await
}
