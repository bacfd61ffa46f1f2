use url::Url;

use super::{ConfigError, ServerConfig};

/// Validate a merged configuration.
pub(super) fn validate(config: &ServerConfig) -> Result<(), ConfigError> {
    validate_upstream_url(&config.upstream_url)?;

    if config.upstream_connect_timeout_seconds == 0 {
        return Err(ConfigError::Validation(
            "UPSTREAM_CONNECT_TIMEOUT_SECONDS must be greater than 0".to_string(),
        ));
    }

    if config.max_message_size == 0 {
        return Err(ConfigError::Validation(
            "MAX_MESSAGE_SIZE must be greater than 0".to_string(),
        ));
    }

    Ok(())
}

/// The upstream endpoint must be an absolute `ws://` or `wss://` URL.
pub(super) fn validate_upstream_url(url: &str) -> Result<(), ConfigError> {
    let parsed = Url::parse(url)
        .map_err(|e| ConfigError::Validation(format!("Invalid UPSTREAM_URL '{url}': {e}")))?;

    match parsed.scheme() {
        "ws" | "wss" => Ok(()),
        other => Err(ConfigError::Validation(format!(
            "UPSTREAM_URL must use ws or wss, got '{other}'"
        ))),
    }
}
