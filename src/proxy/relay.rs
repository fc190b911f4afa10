//! Response relay: forward the outbound request and stream the reply back.

use std::time::Duration;

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, StatusCode},
    response::Response,
};
use reqwest::Client;

use super::stream::reframe;
use super::upstream::UpstreamRequest;
use crate::error::{Error, Result};

/// Headers describing the upstream body framing, which re-framing invalidates.
const FRAMING_HEADERS: [header::HeaderName; 3] = [
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::CONNECTION,
];

/// Whether a response to `method` with `status` carries no body at all.
///
/// HEAD responses and the informational / no-content / not-modified
/// statuses are defined without a body.
pub fn is_null_body(method: &Method, status: StatusCode) -> bool {
    *method == Method::HEAD
        || matches!(
            status,
            StatusCode::SWITCHING_PROTOCOLS
                | StatusCode::NO_CONTENT
                | StatusCode::RESET_CONTENT
                | StatusCode::NOT_MODIFIED
        )
        || status.as_u16() == 103
}

/// Copy upstream headers, dropping the ones tied to the original body framing.
fn relay_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = upstream.clone();
    for name in &FRAMING_HEADERS {
        headers.remove(name);
    }
    headers
}

/// Send `request` and relay the response through the frame reframer.
///
/// Status and headers are copied from upstream, whatever the status; only
/// the body is replaced by the re-framed stream.
pub async fn relay(client: &Client, request: UpstreamRequest, pacing: Duration) -> Result<Response> {
    let method = request.method.clone();
    let url = request.url.clone();

    let upstream = request.into_builder(client).send().await.map_err(|e| {
        tracing::error!(error = %e, url = %url, "Failed to reach upstream");
        Error::Upstream(e)
    })?;

    let status = upstream.status();
    tracing::info!(status = %status, url = %url, "Upstream responded");

    if is_null_body(&method, status) {
        tracing::error!(status = %status, method = %method, "Upstream response has no body");
        return Err(Error::UpstreamBodyMissing);
    }

    let headers = relay_headers(upstream.headers());
    let body = Body::from_stream(reframe(upstream.bytes_stream(), pacing));

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}
