//! Configuration parsing and validation for bedrock-relay.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::Path;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub model: ModelConfig,
    pub logging: LoggingConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "127.0.0.1:8080")
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Interval between SSE keep-alive comments on open streams
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_keep_alive_secs() -> u64 {
    15
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

impl ServerConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

/// Secret wrapper that redacts in Debug/Display/Serialize and zeroizes on drop.
///
/// Only accessible via `.expose_secret()`, so every use is grep-auditable.
#[derive(Clone)]
pub struct Secret(SecretString);

impl Secret {
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(|s| Secret(SecretString::from(s)))
    }
}

impl From<String> for Secret {
    fn from(s: String) -> Self {
        Secret(SecretString::from(s))
    }
}

impl From<&str> for Secret {
    fn from(s: &str) -> Self {
        Secret(SecretString::from(s))
    }
}

/// Static AWS credentials, used instead of the default provider chain.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: Secret,
    pub session_token: Option<Secret>,
}

/// Connection settings for the Bedrock runtime client.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// AWS region hosting the model
    pub region: String,
    /// Named profile from the shared AWS config files
    pub profile: Option<String>,
    /// Override for the Bedrock runtime endpoint
    pub endpoint_url: Option<String>,
    /// Static credentials; the default chain is used when absent
    pub credentials: Option<StaticCredentials>,
    /// Upper bound on opening the response stream, in seconds
    pub open_timeout_secs: Option<u64>,
    /// SDK attempts for the establishment call (1 disables retries)
    pub max_attempts: Option<u32>,
    /// Resolve credentials once at startup so bad setups fail fast
    pub verify_credentials: bool,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            profile: None,
            endpoint_url: None,
            credentials: None,
            open_timeout_secs: None,
            max_attempts: None,
            verify_credentials: true,
        }
    }
}

impl UpstreamConfig {
    pub fn open_timeout(&self) -> Option<Duration> {
        self.open_timeout_secs.map(Duration::from_secs)
    }
}

/// Model identity and default generation settings applied to every request.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_id")]
    pub id: String,
    #[serde(default = "default_json_mime")]
    pub content_type: String,
    #[serde(default = "default_json_mime")]
    pub accept: String,
    #[serde(default = "default_max_token_count")]
    pub max_token_count: u32,
    #[serde(default)]
    pub stop_sequences: Vec<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
}

fn default_model_id() -> String {
    "amazon.titan-text-lite-v1".to_string()
}

fn default_json_mime() -> String {
    "application/json".to_string()
}

fn default_max_token_count() -> u32 {
    512
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    1.0
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            id: default_model_id(),
            content_type: default_json_mime(),
            accept: default_json_mime(),
            max_token_count: default_max_token_count(),
            stop_sequences: Vec::new(),
            temperature: default_temperature(),
            top_p: default_top_p(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
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

    #[error("Environment variable '{var}' not set for '{field}': {message}")]
    EnvVar {
        var: String,
        field: String,
        message: String,
    },
}

/// Raw static credentials; values may contain `${VAR}` references.
#[derive(Deserialize)]
pub struct RawCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

/// Raw upstream config; string values may contain `${VAR}` references.
#[derive(Deserialize)]
pub struct RawUpstreamConfig {
    #[serde(default = "default_region")]
    region: String,
    profile: Option<String>,
    endpoint_url: Option<String>,
    credentials: Option<RawCredentials>,
    open_timeout_secs: Option<u64>,
    max_attempts: Option<u32>,
    #[serde(default = "default_true")]
    verify_credentials: bool,
}

fn default_true() -> bool {
    true
}

impl Default for RawUpstreamConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            profile: None,
            endpoint_url: None,
            credentials: None,
            open_timeout_secs: None,
            max_attempts: None,
            verify_credentials: true,
        }
    }
}

/// Raw configuration deserialized directly from TOML.
#[derive(Deserialize, Default)]
pub struct RawConfig {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    upstream: RawUpstreamConfig,
    #[serde(default)]
    model: ModelConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

/// Expand all `${VAR}` references in a string using a custom lookup function.
///
/// Supports multiple `${VAR}` in one string (e.g., `${SCHEME}://${HOST}`).
/// Fails on first missing variable, unclosed `${`, or empty variable name.
fn expand_env_vars_with<F>(input: &str, field: &str, lookup: F) -> Result<String, ConfigError>
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
            message: format!("Unclosed '${{' in config value: {}", input),
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
            message: format!(
                "Environment variable '{}' is not set (referenced in '{}')",
                var_name, field
            ),
        })?;

        result.push_str(&value);
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    Ok(result)
}

/// Expand all `${VAR}` references in a string using real environment variables.
fn expand_env_vars(input: &str, field: &str) -> Result<String, ConfigError> {
    expand_env_vars_with(input, field, |name| std::env::var(name).ok())
}

fn expand_opt(value: Option<String>, field: &str) -> Result<Option<String>, ConfigError> {
    value.map(|v| expand_env_vars(&v, field)).transpose()
}

impl Config {
    /// Load configuration from a TOML file with environment variable expansion.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::parse_str(&content)
    }

    /// Parse configuration from a TOML string, expand `${VAR}` references and validate.
    pub fn parse_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
        let config = Self::from_raw(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Convert raw (deserialized) config to final config with env var expansion.
    ///
    /// Expansion applies to every upstream string field. Secret values are
    /// wrapped only after expansion so the resolved value never sits in a
    /// plain `String` field.
    pub fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let up = raw.upstream;

        let credentials = match up.credentials {
            Some(creds) => Some(StaticCredentials {
                access_key_id: expand_env_vars(
                    &creds.access_key_id,
                    "upstream.credentials.access_key_id",
                )?,
                secret_access_key: Secret::from(expand_env_vars(
                    &creds.secret_access_key,
                    "upstream.credentials.secret_access_key",
                )?),
                session_token: expand_opt(
                    creds.session_token,
                    "upstream.credentials.session_token",
                )?
                .map(Secret::from),
            }),
            None => None,
        };

        let upstream = UpstreamConfig {
            region: expand_env_vars(&up.region, "upstream.region")?,
            profile: expand_opt(up.profile, "upstream.profile")?,
            endpoint_url: expand_opt(up.endpoint_url, "upstream.endpoint_url")?,
            credentials,
            open_timeout_secs: up.open_timeout_secs,
            max_attempts: up.max_attempts,
            verify_credentials: up.verify_credentials,
        };

        Ok(Config {
            server: raw.server,
            upstream,
            model: raw.model,
            logging: raw.logging,
        })
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.keep_alive_secs == 0 {
            return Err(ConfigError::Validation(
                "server.keep_alive_secs must be greater than zero".to_string(),
            ));
        }

        if self.upstream.region.trim().is_empty() {
            return Err(ConfigError::Validation(
                "upstream.region must not be empty".to_string(),
            ));
        }
        if self.upstream.open_timeout_secs == Some(0) {
            return Err(ConfigError::Validation(
                "upstream.open_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.upstream.max_attempts == Some(0) {
            return Err(ConfigError::Validation(
                "upstream.max_attempts must be at least 1".to_string(),
            ));
        }

        let model = &self.model;
        if model.id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "model.id must not be empty".to_string(),
            ));
        }
        if model.max_token_count == 0 {
            return Err(ConfigError::Validation(
                "model.max_token_count must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&model.temperature) {
            return Err(ConfigError::Validation(format!(
                "model.temperature must be within [0, 1], got {}",
                model.temperature
            )));
        }
        if !(0.0..=1.0).contains(&model.top_p) {
            return Err(ConfigError::Validation(format!(
                "model.top_p must be within [0, 1], got {}",
                model.top_p
            )));
        }

        Ok(())
    }
}
