//! Configuration parsing and validation for prompt-relay.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::relay::{RelayMode, DEFAULT_MAX_LINE_BYTES};

/// Root configuration structure.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub relay: RelayConfig,
    pub logging: LoggingConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "127.0.0.1:8080")
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Origins allowed by CORS; `"*"` allows any origin
    #[serde(default = "default_cors_origins")]
    pub cors_allow_origins: Vec<String>,
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            cors_allow_origins: default_cors_origins(),
        }
    }
}

/// Header value wrapper that redacts in Debug/Display/Serialize and zeroizes on drop.
///
/// Upstream identity headers (client id, hash) are credentials; the raw value
/// is only reachable through `.expose_secret()`.
#[derive(Clone)]
pub struct SecretValue(SecretString);

impl SecretValue {
    /// Access the raw value. Every call site is auditable via `grep expose_secret`.
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl Serialize for SecretValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for SecretValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(SecretValue::from)
    }
}

impl From<String> for SecretValue {
    fn from(s: String) -> Self {
        SecretValue(SecretString::from(s))
    }
}

impl From<&str> for SecretValue {
    fn from(s: &str) -> Self {
        SecretValue(SecretString::from(s))
    }
}

/// A static header sent with every outbound request.
#[derive(Debug, Clone)]
pub struct StaticHeader {
    pub name: String,
    pub value: SecretValue,
}

/// The single upstream chat-completion endpoint.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Endpoint receiving `POST {"content": ...}`
    pub url: String,
    /// Headers attached to every outbound request
    pub headers: Vec<StaticHeader>,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    /// Delay after each relayed fragment, in milliseconds
    pub pacing_ms: u64,
    /// Longest upstream line accepted before it is discarded
    pub max_line_bytes: usize,
}

fn default_connect_timeout_secs() -> u64 {
    3
}

fn default_read_timeout_secs() -> u64 {
    60
}

fn default_max_line_bytes() -> usize {
    DEFAULT_MAX_LINE_BYTES
}

impl UpstreamConfig {
    /// Config for `url` with no headers and default timeouts.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
            pacing_ms: 0,
            max_line_bytes: default_max_line_bytes(),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    /// Build the outbound header map. Values are marked sensitive so they
    /// never show up in client debug output.
    pub fn header_map(&self) -> Result<HeaderMap, ConfigError> {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for header in &self.headers {
            let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(|e| {
                ConfigError::Validation(format!("Invalid header name '{}': {}", header.name, e))
            })?;
            let mut value = HeaderValue::from_str(header.value.expose_secret()).map_err(|_| {
                ConfigError::Validation(format!("Invalid value for header '{}'", header.name))
            })?;
            value.set_sensitive(true);
            map.insert(name, value);
        }
        Ok(map)
    }
}

/// Relay behaviour configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelayConfig {
    /// Output mode used when a request does not ask for one
    #[serde(default)]
    pub mode: RelayMode,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable '{var}' not set for {field}: {message}")]
    EnvVar {
        var: String,
        field: String,
        message: String,
    },
}

/// Raw upstream config deserialized directly from TOML.
/// `url` and header values may contain `${VAR}` references not yet expanded.
#[derive(Deserialize)]
pub struct RawUpstreamConfig {
    url: String,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default = "default_connect_timeout_secs")]
    connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout_secs")]
    read_timeout_secs: u64,
    #[serde(default)]
    pacing_ms: u64,
    #[serde(default = "default_max_line_bytes")]
    max_line_bytes: usize,
}

/// Raw configuration deserialized directly from TOML.
#[derive(Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    server: ServerConfig,
    upstream: RawUpstreamConfig,
    #[serde(default)]
    relay: RelayConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

/// Expand all `${VAR}` references in a string using a custom lookup function.
///
/// Supports multiple `${VAR}` in one string (e.g., `${SCHEME}://${HOST}/api`).
/// Fails on first missing variable, unclosed `${`, or empty variable name.
fn expand_env_vars_with<F>(input: &str, field: &str, lookup: &F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if !input.contains("${") {
        return Ok(input.to_string());
    }

    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let end = after.find('}').ok_or_else(|| ConfigError::EnvVar {
            var: "<unclosed>".to_string(),
            field: field.to_string(),
            message: format!("Unclosed '${{' in value of {}", field),
        })?;

        let var_name = &after[..end];
        if var_name.is_empty() {
            return Err(ConfigError::EnvVar {
                var: "".to_string(),
                field: field.to_string(),
                message: "Empty variable name in '${}' reference".to_string(),
            });
        }

        let value = lookup(var_name).ok_or_else(|| ConfigError::EnvVar {
            var: var_name.to_string(),
            field: field.to_string(),
            message: format!("Environment variable '{}' is not set", var_name),
        })?;

        result.push_str(&value);
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    Ok(result)
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

impl Config {
    /// Load configuration from a TOML file, expanding `${VAR}` references
    /// from the process environment.
    pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::parse_str(&content)
    }

    /// Parse configuration from a TOML string using the process environment.
    pub fn parse_str(content: &str) -> Result<Self, ConfigError> {
        Self::parse_str_with(content, env_lookup)
    }

    /// Parse configuration from a TOML string with a custom variable lookup.
    pub fn parse_str_with<F>(content: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw: RawConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
        let config = Self::from_raw(raw, &lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Convert raw (deserialized) config to final config with env var expansion.
    fn from_raw<F>(raw: RawConfig, lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let upstream = raw.upstream;
        let url = expand_env_vars_with(&upstream.url, "upstream.url", lookup)?;

        let mut headers = Vec::with_capacity(upstream.headers.len());
        for (name, value) in upstream.headers {
            let field = format!("upstream.headers.{}", name);
            let value = expand_env_vars_with(&value, &field, lookup)?;
            headers.push(StaticHeader {
                name,
                value: SecretValue::from(value),
            });
        }

        Ok(Config {
            server: raw.server,
            upstream: UpstreamConfig {
                url,
                headers,
                connect_timeout_secs: upstream.connect_timeout_secs,
                read_timeout_secs: upstream.read_timeout_secs,
                pacing_ms: upstream.pacing_ms,
                max_line_bytes: upstream.max_line_bytes,
            },
            relay: raw.relay,
            logging: raw.logging,
        })
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let upstream = &self.upstream;

        if upstream.url.is_empty() {
            return Err(ConfigError::Validation("Upstream URL is empty".to_string()));
        }
        reqwest::Url::parse(&upstream.url).map_err(|e| {
            ConfigError::Validation(format!("Invalid upstream URL '{}': {}", upstream.url, e))
        })?;

        if upstream.connect_timeout_secs == 0 || upstream.read_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "Upstream timeouts must be greater than zero".to_string(),
            ));
        }

        if upstream.max_line_bytes == 0 {
            return Err(ConfigError::Validation(
                "max_line_bytes must be greater than zero".to_string(),
            ));
        }

        upstream.header_map()?;

        if upstream.headers.is_empty() {
            tracing::warn!("No upstream headers configured - requests will be sent unauthenticated");
        }

        Ok(())
    }
}
