//! Per-session configuration.
//!
//! Every field has a default, so an empty object (or `SessionConfig::default()`)
//! is a working configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::tools::dispatcher::{DEFAULT_READ_PAGE_MAX_CHARS, DispatcherConfig};
use crate::core::tools::wait::WaitPolicy;

pub const DEFAULT_GREETING: &str =
    "Start speaking now. Introduce yourself in one short sentence and ask how you can help.";
pub const DEFAULT_VOICE_NAME: &str = "Kore";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-native-audio-preview-12-2025";
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a helpful voice guide for this website. \
Keep answers short and conversational. Use the page tools to read, scroll and interact \
with the page when the visitor asks about its content.";
pub const DEFAULT_LANGUAGE_CODE: &str = "en-US";

const MODEL_RESOURCE_PREFIX: &str = "models/";

/// Session settings supplied by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Text sent as the first user turn when `auto_greet` is set
    pub greeting: String,
    /// Send `greeting` once the handshake completes
    pub auto_greet: bool,
    /// Prebuilt voice identity
    pub voice_name: String,
    /// Model id, with or without the `models/` prefix
    pub model: String,
    pub system_instruction: String,
    /// BCP-47 locale for speech output
    pub language_code: String,
    /// WebSocket sub-protocols offered when connecting
    pub protocols: Vec<String>,
    /// Verbose logging of protocol parse failures and model text
    pub debug: bool,
    /// Allow the `execute_js` tool and `javascript:` navigation
    pub allow_code_execution: bool,
    /// Default wait for tool lookups; 0 means a single immediate check
    pub wait_timeout_ms: u64,
    pub wait_interval_ms: u64,
    pub read_page_max_chars: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            greeting: DEFAULT_GREETING.to_string(),
            auto_greet: true,
            voice_name: DEFAULT_VOICE_NAME.to_string(),
            model: DEFAULT_MODEL.to_string(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            language_code: DEFAULT_LANGUAGE_CODE.to_string(),
            protocols: Vec::new(),
            debug: false,
            allow_code_execution: false,
            wait_timeout_ms: 0,
            wait_interval_ms: 100,
            read_page_max_chars: DEFAULT_READ_PAGE_MAX_CHARS,
        }
    }
}

impl SessionConfig {
    /// Model as a resource name (`models/<id>`).
    pub fn model_resource(&self) -> String {
        if self.model.starts_with(MODEL_RESOURCE_PREFIX) {
            self.model.clone()
        } else {
            format!("{MODEL_RESOURCE_PREFIX}{}", self.model)
        }
    }

    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy::new(
            Duration::from_millis(self.wait_timeout_ms),
            Duration::from_millis(self.wait_interval_ms),
        )
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            wait: self.wait_policy(),
            read_page_max_chars: self.read_page_max_chars,
            allow_code_execution: self.allow_code_execution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert!(config.auto_greet);
        assert_eq!(config.voice_name, "Kore");
        assert_eq!(config.language_code, "en-US");
        assert!(config.protocols.is_empty());
        assert!(!config.debug);
        assert!(!config.allow_code_execution);
        assert_eq!(config.read_page_max_chars, 2000);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"voice_name": "Puck", "debug": true}"#).unwrap();
        assert_eq!(config.voice_name, "Puck");
        assert!(config.debug);
        assert_eq!(config.greeting, DEFAULT_GREETING);
        assert_eq!(config.wait_interval_ms, 100);
    }

    #[test]
    fn test_model_resource_prefix() {
        let mut config = SessionConfig::default();
        assert_eq!(
            config.model_resource(),
            "models/gemini-2.5-flash-native-audio-preview-12-2025"
        );

        config.model = "models/custom".to_string();
        assert_eq!(config.model_resource(), "models/custom");
    }

    #[test]
    fn test_dispatcher_config() {
        let config = SessionConfig {
            wait_timeout_ms: 1500,
            allow_code_execution: true,
            ..Default::default()
        };
        let dispatcher = config.dispatcher_config();
        assert_eq!(dispatcher.wait.timeout, Duration::from_millis(1500));
        assert_eq!(dispatcher.wait.interval, Duration::from_millis(100));
        assert!(dispatcher.allow_code_execution);
    }
}
