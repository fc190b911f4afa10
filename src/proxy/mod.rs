//! HTTP proxy server module.
//!
//! This module provides the OpenAI-compatible HTTP API that accepts
//! requests, rewrites them for deployment-based vendor endpoints and
//! relays the streamed reply back to the client.

mod handlers;
pub mod relay;
mod server;
pub mod stream;
pub mod types;
pub mod upstream;

pub use relay::relay;
pub use server::{create_router, run_server, AppState, RequestId, REQUEST_ID_HEADER};
pub use stream::{reframe, FrameBuffer, Utf8Decoder, DELIMITER};
pub use types::ModelList;
pub use upstream::{Operation, UpstreamRequest, API_KEY_HEADER};
