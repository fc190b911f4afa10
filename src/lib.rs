//! azrelay - OpenAI-compatible relay for deployment-based Azure OpenAI endpoints
//!
//! This library provides the core functionality for the azrelay proxy,
//! including configuration, model alias resolution, request rewriting and
//! paced re-framing of streamed responses.

pub mod config;
pub mod error;
pub mod proxy;
pub mod router;

pub use config::Config;
pub use error::{Error, Result};
