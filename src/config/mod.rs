//! HTTP transport configuration (component C9).
//!
//! Construction is always from an in-memory record: no file or
//! environment-variable loader is provided. The CLI driver builds one from
//! flag overrides on top of [`Config::default`].

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("validation error: {0}")]
    Validation(String),
}

/// Recognized options for the HTTP transport, per §4.7.1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// TCP listen specifier. Ignored if `socket_path` is non-empty.
    #[serde(default = "default_address")]
    pub address: String,

    /// Unix domain socket path. Takes precedence over `address`.
    #[serde(default)]
    pub socket_path: Option<String>,

    /// Value for `Access-Control-Allow-Origin`.
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,

    /// SSE heartbeat period, outer config default.
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    /// HTTP read timeout.
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,

    /// HTTP write timeout; 0 disables it (SSE streams must outlive any
    /// finite write deadline).
    #[serde(default)]
    pub write_timeout_secs: u64,

    /// Enables TLS when both are set.
    #[serde(default)]
    pub tls_cert_file: Option<String>,
    #[serde(default)]
    pub tls_key_file: Option<String>,

    /// Enables Bearer-token authentication when set.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Requests/second; 0 disables rate limiting.
    #[serde(default)]
    pub rate_limit: f64,
}

fn default_address() -> String {
    ":8080".to_string()
}

fn default_cors_origin() -> String {
    "*".to_string()
}

fn default_heartbeat_interval_secs() -> u64 {
    30
}

fn default_read_timeout_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: default_address(),
            socket_path: None,
            cors_origin: default_cors_origin(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            read_timeout_secs: default_read_timeout_secs(),
            write_timeout_secs: 0,
            tls_cert_file: None,
            tls_key_file: None,
            api_key: None,
            rate_limit: 0.0,
        }
    }
}

impl Config {
    /// Fails if TLS is half-configured (only one of cert/key set).
    pub fn validate(&self) -> Result<(), ConfigError> {
        let tls_cert_set = self.tls_cert_file.as_deref().is_some_and(|v| !v.is_empty());
        let tls_key_set = self.tls_key_file.as_deref().is_some_and(|v| !v.is_empty());
        if tls_cert_set != tls_key_set {
            return Err(ConfigError::Validation(
                "tls_cert_file and tls_key_file must both be set or both be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn tls_enabled(&self) -> bool {
        self.tls_cert_file.as_deref().is_some_and(|v| !v.is_empty())
            && self.tls_key_file.as_deref().is_some_and(|v| !v.is_empty())
    }

    pub fn auth_enabled(&self) -> bool {
        self.api_key.as_deref().is_some_and(|v| !v.is_empty())
    }

    pub fn rate_limit_enabled(&self) -> bool {
        self.rate_limit > 0.0
    }
}
