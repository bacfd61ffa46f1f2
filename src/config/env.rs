use std::env;
use std::str::FromStr;

use super::ConfigError;

/// Raw values read from the process environment.
///
/// Unset and blank variables are `None`; defaults are applied during merging.
#[derive(Debug, Default)]
pub(super) struct EnvConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls_enabled: Option<bool>,
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,
    pub upstream_url: Option<String>,
    pub upstream_api_key: Option<String>,
    pub allowed_origins: Option<Vec<String>>,
    pub upstream_connect_timeout_seconds: Option<u64>,
    pub max_message_size: Option<usize>,
}

impl EnvConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            host: var("HOST"),
            port: parse_var("PORT")?,
            tls_enabled: parse_bool_var("TLS_ENABLED")?,
            tls_cert_path: var("TLS_CERT_PATH"),
            tls_key_path: var("TLS_KEY_PATH"),
            upstream_url: var("UPSTREAM_URL"),
            upstream_api_key: var("GEMINI_API_KEY"),
            allowed_origins: var("ALLOWED_ORIGINS").map(|list| split_list(&list)),
            upstream_connect_timeout_seconds: parse_var("UPSTREAM_CONNECT_TIMEOUT_SECONDS")?,
            max_message_size: parse_var("MAX_MESSAGE_SIZE")?,
        })
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    var(key)
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value,
                })
        })
        .transpose()
}

fn parse_bool_var(key: &str) -> Result<Option<bool>, ConfigError> {
    var(key)
        .map(|value| match value.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        })
        .transpose()
}

/// Split a comma separated list, dropping blank entries.
pub(super) fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}
