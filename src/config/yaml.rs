use serde::Deserialize;
use std::path::Path;

use super::ConfigError;

/// YAML configuration file structure
///
/// Every section is optional; values that are absent fall back to the
/// environment and then to built-in defaults.
///
/// # Example
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3001
///   tls:
///     enabled: true
///     cert_path: "/etc/relay/cert.pem"
///     key_path: "/etc/relay/key.pem"
/// upstream:
///   url: "wss://generativelanguage.googleapis.com/ws/..."
///   api_key: "your-gemini-key"
///   connect_timeout_seconds: 10
/// security:
///   allowed_origins:
///     - "localhost"
///     - "*.example.com"
///   max_message_size: 10485760
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub upstream: Option<UpstreamYaml>,
    pub security: Option<SecurityYaml>,
}

/// Listener configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Upstream Live API endpoint from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct UpstreamYaml {
    pub url: Option<String>,
    /// Overrides `GEMINI_API_KEY`
    pub api_key: Option<String>,
    pub connect_timeout_seconds: Option<u64>,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    /// Origin allow-list entries (exact origin, bare host, `*.domain` or `null`)
    pub allowed_origins: Option<Vec<String>>,
    /// Largest WebSocket message accepted from the client, in bytes
    pub max_message_size: Option<usize>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.display().to_string(),
            source,
        })?;
        let config: YamlConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }
}
