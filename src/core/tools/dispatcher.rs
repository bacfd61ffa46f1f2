//! Tool-call dispatcher.
//!
//! One `toolCall` envelope carries an ordered batch of function calls. Calls
//! run strictly one after another so host-visible side effects happen in the
//! order the model asked for them. A failing call becomes an error-shaped
//! result for that call alone; the batch always produces one response per
//! call, in order, with the originating ids.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use super::declarations::{
    DRAW_CANVAS, EXECUTE_JS, NAVIGATE, PAGE_SNAPSHOT, READ_PAGE, SCROLL_TO, UI_ACTION, WAIT_FOR,
};
use super::draw::parse_draw_commands;
use super::effector::{HostEffector, ToolError, ToolResult, UiAction};
use super::snapshot::{build_snapshot, truncate_chars};
use super::wait::{WaitPolicy, wait_for_element};
use crate::core::session::messages::{FunctionCall, FunctionResponse, ToolCall, ToolResponse};

/// Default `read_page` text limit, in characters.
pub const DEFAULT_READ_PAGE_MAX_CHARS: usize = 2000;

/// Dispatcher knobs, derived from the session configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Default wait for lookups; calls may override the timeout with `timeout_ms`
    pub wait: WaitPolicy,
    pub read_page_max_chars: usize,
    /// Gate for `execute_js` and `javascript:` navigation
    pub allow_code_execution: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            wait: WaitPolicy::default(),
            read_page_max_chars: DEFAULT_READ_PAGE_MAX_CHARS,
            allow_code_execution: false,
        }
    }
}

/// Normalize call arguments into an object.
///
/// Arguments arrive either as an object or as a JSON string. Anything that
/// does not yield an object becomes empty arguments rather than an error.
pub fn parse_arguments(args: Option<&Value>) -> Map<String, Value> {
    match args {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        },
        _ => Map::new(),
    }
}

fn error_payload(message: impl Into<String>) -> Value {
    json!({ "status": "error", "error": message.into() })
}

fn missing(key: &str) -> ToolError {
    ToolError::InvalidArguments(format!("Missing required argument: {key}"))
}

fn required_str<'a>(args: &'a Map<String, Value>, key: &str) -> ToolResult<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| missing(key))
}

fn optional_str<'a>(args: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

/// Executes tool-call batches against a [`HostEffector`].
#[derive(Clone)]
pub struct ToolDispatcher {
    effector: Arc<dyn HostEffector>,
    config: DispatcherConfig,
}

impl std::fmt::Debug for ToolDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDispatcher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ToolDispatcher {
    pub fn new(effector: Arc<dyn HostEffector>, config: DispatcherConfig) -> Self {
        Self { effector, config }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Run every call in order and collect one response per call.
    pub async fn run_batch(&self, batch: &ToolCall) -> ToolResponse {
        let mut function_responses = Vec::with_capacity(batch.function_calls.len());
        for call in &batch.function_calls {
            function_responses.push(self.run_call(call).await);
        }
        ToolResponse { function_responses }
    }

    /// Run a single call, converting failures into an error payload.
    pub async fn run_call(&self, call: &FunctionCall) -> FunctionResponse {
        let args = parse_arguments(call.args.as_ref());
        debug!(tool = %call.name, id = ?call.id, "Executing tool call");

        let response = match self.execute(&call.name, &args).await {
            Ok(value) => value,
            Err(e) => {
                warn!(tool = %call.name, id = ?call.id, error = %e, "Tool call failed");
                error_payload(e.to_string())
            }
        };

        FunctionResponse {
            id: call.id.clone(),
            name: call.name.clone(),
            response,
        }
    }

    async fn execute(&self, name: &str, args: &Map<String, Value>) -> ToolResult<Value> {
        match name {
            READ_PAGE => self.read_page().await,
            SCROLL_TO => self.scroll_to(args).await,
            NAVIGATE => self.navigate(args).await,
            UI_ACTION => self.ui_action(args).await,
            DRAW_CANVAS => self.draw_canvas(args).await,
            PAGE_SNAPSHOT => self.page_snapshot().await,
            WAIT_FOR => self.wait_for(args).await,
            EXECUTE_JS => self.execute_js(args).await,
            _ => Ok(json!({ "status": "error", "error": "Unknown tool", "name": name })),
        }
    }

    fn wait_policy(&self, args: &Map<String, Value>) -> WaitPolicy {
        match args.get("timeout_ms").and_then(Value::as_u64) {
            Some(ms) => self.config.wait.with_timeout(Duration::from_millis(ms)),
            None => self.config.wait,
        }
    }

    async fn locate(&self, lookup: &str, args: &Map<String, Value>) -> ToolResult<bool> {
        wait_for_element(self.effector.as_ref(), lookup, self.wait_policy(args)).await
    }

    async fn read_page(&self) -> ToolResult<Value> {
        let text = self.effector.read_page().await?;
        Ok(json!({ "text": truncate_chars(&text, self.config.read_page_max_chars) }))
    }

    async fn scroll_to(&self, args: &Map<String, Value>) -> ToolResult<Value> {
        let selector = required_str(args, "selector")?;
        if !self.locate(selector, args).await? {
            return Ok(json!({ "status": "not_found", "selector": selector }));
        }
        self.effector.scroll_to(selector).await?;
        Ok(json!({ "status": "scrolled", "selector": selector }))
    }

    async fn navigate(&self, args: &Map<String, Value>) -> ToolResult<Value> {
        let url = required_str(args, "url")?;
        if url.to_ascii_lowercase().starts_with("javascript:") && !self.config.allow_code_execution
        {
            return Err(ToolError::Denied("Code execution is disabled".to_string()));
        }
        self.effector.navigate(url).await?;
        Ok(json!({ "status": "navigating", "url": url }))
    }

    async fn ui_action(&self, args: &Map<String, Value>) -> ToolResult<Value> {
        let action_name = required_str(args, "action")?;
        let selector = required_str(args, "selector")?;

        let Some(action) = parse_ui_action(action_name, selector, args)? else {
            return Ok(json!({ "status": "error", "error": "Unknown action", "action": action_name }));
        };

        if !self.locate(selector, args).await? {
            return Ok(json!({ "status": "not_found", "action": action.name(), "selector": selector }));
        }
        self.effector.interact(&action).await?;
        Ok(json!({ "status": "ok", "action": action.name(), "selector": selector }))
    }

    async fn draw_canvas(&self, args: &Map<String, Value>) -> ToolResult<Value> {
        let canvas = required_str(args, "canvas")?;
        let commands = parse_draw_commands(args.get("commands"))?;

        if !self.locate(canvas, args).await? {
            return Ok(json!({ "status": "not_found", "canvas": canvas }));
        }
        self.effector.draw(canvas, &commands).await?;
        Ok(json!({ "status": "drawn", "canvas": canvas, "commands": commands.len() }))
    }

    async fn page_snapshot(&self) -> ToolResult<Value> {
        let elements = build_snapshot(self.effector.interactive_elements().await?);
        Ok(json!({ "status": "ok", "count": elements.len(), "elements": elements }))
    }

    async fn wait_for(&self, args: &Map<String, Value>) -> ToolResult<Value> {
        let selector = required_str(args, "selector")?;
        let status = if self.locate(selector, args).await? {
            "found"
        } else {
            "not_found"
        };
        Ok(json!({ "status": status, "selector": selector }))
    }

    async fn execute_js(&self, args: &Map<String, Value>) -> ToolResult<Value> {
        if !self.config.allow_code_execution {
            return Err(ToolError::Denied("Code execution is disabled".to_string()));
        }
        let code = required_str(args, "code")?;
        let result = self.effector.execute_script(code).await?;
        Ok(json!({ "status": "ok", "result": result }))
    }
}

/// Build a [`UiAction`]; `Ok(None)` for an action name that is not supported.
fn parse_ui_action(
    action: &str,
    selector: &str,
    args: &Map<String, Value>,
) -> ToolResult<Option<UiAction>> {
    let lookup = selector.to_string();
    let action = match action {
        "click" => UiAction::Click { lookup },
        "type" => UiAction::Type {
            lookup,
            text: optional_str(args, "text")
                .ok_or_else(|| missing("text"))?
                .to_string(),
        },
        "fill" => UiAction::Fill {
            lookup,
            value: optional_str(args, "value").unwrap_or_default().to_string(),
        },
        "focus" => UiAction::Focus { lookup },
        "hover" => UiAction::Hover { lookup },
        "press_key" => UiAction::PressKey {
            lookup,
            key: required_str(args, "key")?.to_string(),
        },
        "select" => UiAction::Select {
            lookup,
            value: required_str(args, "value")?.to_string(),
        },
        "toggle_checkbox" => UiAction::ToggleCheckbox {
            lookup,
            checked: args.get("checked").and_then(Value::as_bool),
        },
        "check" => UiAction::ToggleCheckbox {
            lookup,
            checked: Some(true),
        },
        "uncheck" => UiAction::ToggleCheckbox {
            lookup,
            checked: Some(false),
        },
        "drag" => UiAction::Drag {
            lookup,
            target: required_str(args, "target")?.to_string(),
        },
        _ => return Ok(None),
    };
    Ok(Some(action))
}
