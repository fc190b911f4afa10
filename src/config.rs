//! Configuration loading for azrelay.
//!
//! All settings come from environment variables and are read once at
//! startup. Parsing goes through [`Config::from_lookup`] so tests can feed
//! values without touching global env state.

use secrecy::{ExposeSecret, SecretString};
use serde::{Serialize, Serializer};
use std::path::PathBuf;
use std::time::Duration;

/// Vendor resource name used when `RESOURCE_NAME` is unset.
pub const DEFAULT_RESOURCE_NAME: &str = "null";

/// Vendor API version used when `API_VERSION` is unset.
pub const DEFAULT_API_VERSION: &str = "2021-03-15-preview";

/// Listen address used when `LISTEN_ADDR` is unset.
pub const DEFAULT_LISTEN: &str = "0.0.0.0:8000";

/// Delay between re-emitted frames when `PACING_MS` is unset.
pub const DEFAULT_PACING: Duration = Duration::from_millis(30);

/// Root configuration structure.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub auth: AuthConfig,
    pub stream: StreamConfig,
    pub models: ModelsConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "0.0.0.0:8000")
    pub listen: String,
}

/// Outbound vendor API configuration.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Vendor resource name, the first label of the upstream host.
    pub resource_name: String,
    /// Value of the `api-version` query parameter.
    pub api_version: String,
    /// Value of the outbound `api-key` header. Empty when unset.
    pub api_key: ApiKey,
    /// Replaces `https://{resource}.openai.azure.com` when set.
    pub base_url: Option<String>,
    /// Total timeout for upstream calls. `None` leaves them un-timed.
    pub timeout: Option<Duration>,
}

/// Inbound authorization configuration.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// Shared secret compared byte-for-byte with the `Authorization` header.
    /// When unset or empty, every proxied request is rejected.
    pub secret: Option<ApiKey>,
}

/// Re-framing configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub pacing: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            pacing: DEFAULT_PACING,
        }
    }
}

/// Model alias configuration.
#[derive(Debug, Clone, Default)]
pub struct ModelsConfig {
    /// Optional TOML file with extra alias entries.
    pub aliases_file: Option<PathBuf>,
    /// Reject proxied requests that resolve to an empty deployment name.
    pub require_model: bool,
}

/// API key wrapper that redacts in Debug/Display/Serialize and zeroizes on drop.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Access the raw key value. Every call site is auditable via `grep expose_secret`.
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl Serialize for ApiKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("[REDACTED]")
    }
}

impl From<String> for ApiKey {
    fn from(s: String) -> Self {
        ApiKey(SecretString::from(s))
    }
}

impl From<&str> for ApiKey {
    fn from(s: &str) -> Self {
        ApiKey(SecretString::from(s))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value '{value}' for {var}: {message}")]
    Invalid {
        var: String,
        value: String,
        message: String,
    },
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from a variable lookup function.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pacing = match lookup("PACING_MS") {
            Some(raw) => Duration::from_millis(parse_number("PACING_MS", &raw)?),
            None => DEFAULT_PACING,
        };

        let timeout = lookup("UPSTREAM_TIMEOUT_SECS")
            .map(|raw| parse_number("UPSTREAM_TIMEOUT_SECS", &raw).map(Duration::from_secs))
            .transpose()?;

        let require_model = match lookup("REQUIRE_MODEL") {
            Some(raw) => parse_flag("REQUIRE_MODEL", &raw)?,
            None => false,
        };

        let base_url = lookup("UPSTREAM_BASE_URL")
            .filter(|url| !url.is_empty())
            .map(|url| url.trim_end_matches('/').to_string());

        let config = Config {
            server: ServerConfig {
                listen: lookup("LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN.to_string()),
            },
            upstream: UpstreamConfig {
                resource_name: non_empty(lookup("RESOURCE_NAME"))
                    .unwrap_or_else(|| DEFAULT_RESOURCE_NAME.to_string()),
                api_version: non_empty(lookup("API_VERSION"))
                    .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
                api_key: ApiKey::from(lookup("AZURE_API_KEY").unwrap_or_default()),
                base_url,
                timeout,
            },
            auth: AuthConfig {
                secret: non_empty(lookup("API_KEY")).map(ApiKey::from),
            },
            stream: StreamConfig { pacing },
            models: ModelsConfig {
                aliases_file: non_empty(lookup("MODEL_ALIASES_FILE")).map(PathBuf::from),
                require_model,
            },
        };

        config.validate();
        Ok(config)
    }

    /// Warn about settings that leave the proxy unusable but are not fatal.
    fn validate(&self) {
        if self.auth.secret.is_none() {
            tracing::warn!("API_KEY is not set - every proxied request will be rejected");
        }
        if self.upstream.api_key.is_empty() {
            tracing::warn!("AZURE_API_KEY is not set - upstream calls carry an empty api-key");
        }
    }

    /// Origin of the vendor API, e.g. `https://myres.openai.azure.com`.
    pub fn upstream_origin(&self) -> String {
        self.upstream.origin()
    }
}

impl UpstreamConfig {
    /// Origin of the vendor API, honoring the base URL override.
    pub fn origin(&self) -> String {
        match &self.base_url {
            Some(url) => url.clone(),
            None => format!("https://{}.openai.azure.com", self.resource_name),
        }
    }
}

/// An empty variable counts as unset.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn parse_number(var: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
        var: var.to_string(),
        value: raw.to_string(),
        message: e.to_string(),
    })
}

fn parse_flag(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var: var.to_string(),
            value: raw.to_string(),
            message: "expected true or false".to_string(),
        }),
    }
}
