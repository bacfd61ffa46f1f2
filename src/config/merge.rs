use std::path::PathBuf;

use super::env::EnvConfig;
use super::yaml::YamlConfig;
use super::{ConfigError, ServerConfig, TlsConfig};

/// Build a `ServerConfig` from environment values overridden by YAML.
///
/// Fields absent from both keep their defaults.
pub(super) fn merge_config(yaml: Option<YamlConfig>) -> Result<ServerConfig, ConfigError> {
    let env = EnvConfig::load()?;
    let yaml = yaml.unwrap_or_default();
    let defaults = ServerConfig::default();

    let server = yaml.server.unwrap_or_default();
    let upstream = yaml.upstream.unwrap_or_default();
    let security = yaml.security.unwrap_or_default();
    let tls_yaml = server.tls.unwrap_or_default();

    let tls = resolve_tls(
        tls_yaml.enabled.or(env.tls_enabled),
        tls_yaml.cert_path.or(env.tls_cert_path),
        tls_yaml.key_path.or(env.tls_key_path),
    )?;

    Ok(ServerConfig {
        host: server.host.or(env.host).unwrap_or_else(|| defaults.host.clone()),
        port: server.port.or(env.port).unwrap_or(defaults.port),
        tls,
        upstream_url: upstream
            .url
            .or(env.upstream_url)
            .unwrap_or_else(|| defaults.upstream_url.clone()),
        upstream_api_key: upstream
            .api_key
            .filter(|key| !key.trim().is_empty())
            .or(env.upstream_api_key),
        upstream_connect_timeout_seconds: upstream
            .connect_timeout_seconds
            .or(env.upstream_connect_timeout_seconds)
            .unwrap_or(defaults.upstream_connect_timeout_seconds),
        allowed_origins: security
            .allowed_origins
            .or(env.allowed_origins)
            .unwrap_or_else(|| defaults.allowed_origins.clone()),
        max_message_size: security
            .max_message_size
            .or(env.max_message_size)
            .unwrap_or(defaults.max_message_size),
    })
}

/// TLS is on when explicitly enabled, or when both paths are given without a flag.
fn resolve_tls(
    enabled: Option<bool>,
    cert_path: Option<String>,
    key_path: Option<String>,
) -> Result<Option<TlsConfig>, ConfigError> {
    match (enabled, cert_path, key_path) {
        (Some(false), _, _) => Ok(None),
        (_, Some(cert), Some(key)) => Ok(Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        })),
        (Some(true), _, _) => Err(ConfigError::Validation(
            "TLS is enabled but TLS_CERT_PATH and TLS_KEY_PATH are not both set".to_string(),
        )),
        (None, None, None) => Ok(None),
        (None, _, _) => Err(ConfigError::Validation(
            "TLS_CERT_PATH and TLS_KEY_PATH must be set together".to_string(),
        )),
    }
}
