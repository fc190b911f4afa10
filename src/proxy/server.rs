//! HTTP server setup and configuration.

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Request},
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use super::handlers;
use crate::config::Config;
use crate::router::ModelAliases;

/// Response header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub aliases: Arc<ModelAliases>,
    pub http_client: Client,
    pub config: Arc<Config>,
}

impl AppState {
    /// Build state with an HTTP client configured from `config`.
    pub fn new(config: Config, aliases: ModelAliases) -> anyhow::Result<Self> {
        let http_client = build_http_client(config.upstream.timeout)?;
        Ok(Self {
            aliases: Arc::new(aliases),
            http_client,
            config: Arc::new(config),
        })
    }
}

/// Correlation id assigned to each inbound request.
#[derive(Debug, Clone, Copy)]
pub struct RequestId(pub Uuid);

/// Create the axum router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", any(handlers::index))
        // OpenAI-compatible endpoints
        .route("/v1/chat/completions", any(handlers::chat_completions))
        .route("/v1/completions", any(handlers::completions))
        .route("/v1/models", any(handlers::list_models))
        .fallback(handlers::not_found)
        // State and middleware
        .with_state(state)
        // Inbound bodies are forwarded whatever their size
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            let request_id = request
                .extensions()
                .get::<RequestId>()
                .map(|id| id.0.to_string())
                .unwrap_or_default();
            tracing::info_span!(
                "request",
                method = %request.method(),
                path = %request.uri().path(),
                request_id = %request_id,
            )
        }))
        .layer(middleware::from_fn(assign_request_id))
        .layer(middleware::from_fn(cors_preflight))
}

/// Answer every OPTIONS request with a permissive CORS preflight response.
async fn cors_preflight(request: Request, next: Next) -> Response {
    if request.method() != Method::OPTIONS {
        return next.run(request).await;
    }

    let wildcard = HeaderValue::from_static("*");
    (
        StatusCode::OK,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, wildcard.clone()),
            (header::ACCESS_CONTROL_ALLOW_METHODS, wildcard.clone()),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, wildcard),
        ],
        Body::empty(),
    )
        .into_response()
}

/// Tag the request with a fresh [`RequestId`] and echo it in the response.
async fn assign_request_id(mut request: Request, next: Next) -> Response {
    let request_id = RequestId(Uuid::new_v4());
    request.extensions_mut().insert(request_id);

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id.0.to_string()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}

/// HTTP client for upstream calls. No total timeout unless configured.
fn build_http_client(timeout: Option<Duration>) -> reqwest::Result<Client> {
    let mut builder = Client::builder().connect_timeout(Duration::from_secs(10));
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build()
}

/// Run the HTTP server.
pub async fn run_server(config: Config, aliases: ModelAliases) -> anyhow::Result<()> {
    let listen_addr = config.server.listen.clone();
    let state = AppState::new(config, aliases)?;

    tracing::info!(
        upstream = %state.config.upstream_origin(),
        api_version = %state.config.upstream.api_version,
        aliases = state.aliases.count(),
        pacing_ms = state.config.stream.pacing.as_millis() as u64,
        "Relay configured"
    );

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(address = %listen_addr, "Starting azrelay server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("azrelay shutdown complete");
    Ok(())
}

/// Resolve when Ctrl+C or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::warn!("Received Ctrl+C, initiating shutdown"),
        _ = terminate => tracing::warn!("Received SIGTERM, initiating shutdown"),
    }
}
