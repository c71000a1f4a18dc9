//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::rpc::wire::DEFAULT_ENDPOINT;

/// Default control-plane bind address.
pub const DEFAULT_SERVICE_ADDRESS: &str = "127.0.0.1:8888";

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GrappleConfig {
    /// Proxy listeners and the default backend.
    pub proxy: ProxyConfig,

    /// Control-plane listener.
    pub control: ControlConfig,

    /// Certificate material for `https` targets.
    pub tls: TlsConfig,

    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Proxy listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// External addresses to listen on (`scheme://host[:port]`).
    pub targets: Vec<String>,

    /// Backend all unmatched traffic is forwarded to.
    pub backend_url: String,

    /// Grace period for in-flight requests once shutdown begins.
    pub shutdown_timeout_secs: u64,

    /// Maximum control-plane request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            targets: vec!["https://localhost".to_string()],
            backend_url: String::new(),
            shutdown_timeout_secs: 5,
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Control-plane configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Bind address (e.g., "127.0.0.1:8888").
    pub bind_address: String,

    /// Base path of the RPC endpoint.
    pub endpoint: String,

    /// Origins echoed in `Access-Control-Allow-Origin`.
    pub allow_origins: Vec<String>,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_SERVICE_ADDRESS.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            allow_origins: Vec::new(),
        }
    }
}

/// TLS configuration. Both paths or neither.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: Option<String>,

    /// Path to private key file (PEM, PKCS#8).
    pub key_path: Option<String>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub filter: String,

    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "webgrapple=info,tower_http=info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_file_uses_defaults() {
        let config: GrappleConfig = toml::from_str(
            r#"
            [proxy]
            backend_url = "https://www.example.com"
            "#,
        )
        .unwrap();

        assert_eq!(config.proxy.targets, vec!["https://localhost"]);
        assert_eq!(config.proxy.shutdown_timeout_secs, 5);
        assert_eq!(config.control.bind_address, DEFAULT_SERVICE_ADDRESS);
        assert_eq!(config.control.endpoint, DEFAULT_ENDPOINT);
        assert!(config.tls.cert_path.is_none());
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn full_file_parses() {
        let config: GrappleConfig = toml::from_str(
            r#"
            [proxy]
            targets = ["https://www.example.com", "http://www.example.com"]
            backend_url = "https://staging.example.com"
            shutdown_timeout_secs = 10

            [control]
            bind_address = "0.0.0.0:9999"
            allow_origins = ["https://www.example.com"]

            [tls]
            cert_path = "cert.pem"
            key_path = "key.pem"

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.proxy.targets.len(), 2);
        assert_eq!(config.control.allow_origins, vec!["https://www.example.com"]);
        assert_eq!(config.tls.key_path.as_deref(), Some("key.pem"));
        assert_eq!(config.logging.format, LogFormat::Json);
    }
}
