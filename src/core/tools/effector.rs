//! Host effector seam.
//!
//! The dispatcher decides *what* a tool call means; the host decides *how* to
//! do it on the page. Element lookups are opaque expressions (CSS selectors in
//! the browser host) resolved entirely by the host.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use super::draw::DrawCommand;

/// Errors raised while executing a single tool call.
#[derive(Debug, Error)]
pub enum ToolError {
    /// A required argument is missing or has the wrong type
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The host refused the operation
    #[error("{0}")]
    Denied(String),

    /// The host effector failed
    #[error("Host error: {0}")]
    Host(String),
}

/// Result type for tool execution.
pub type ToolResult<T> = Result<T, ToolError>;

/// Generic UI interaction against a lookup expression.
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    Click { lookup: String },
    Type { lookup: String, text: String },
    Fill { lookup: String, value: String },
    Focus { lookup: String },
    Hover { lookup: String },
    PressKey { lookup: String, key: String },
    Select { lookup: String, value: String },
    /// `checked: None` flips the current state
    ToggleCheckbox { lookup: String, checked: Option<bool> },
    Drag { lookup: String, target: String },
}

impl UiAction {
    /// Wire name of the action.
    pub fn name(&self) -> &'static str {
        match self {
            UiAction::Click { .. } => "click",
            UiAction::Type { .. } => "type",
            UiAction::Fill { .. } => "fill",
            UiAction::Focus { .. } => "focus",
            UiAction::Hover { .. } => "hover",
            UiAction::PressKey { .. } => "press_key",
            UiAction::Select { .. } => "select",
            UiAction::ToggleCheckbox { .. } => "toggle_checkbox",
            UiAction::Drag { .. } => "drag",
        }
    }

    /// The element the action is performed on.
    pub fn lookup(&self) -> &str {
        match self {
            UiAction::Click { lookup }
            | UiAction::Type { lookup, .. }
            | UiAction::Fill { lookup, .. }
            | UiAction::Focus { lookup }
            | UiAction::Hover { lookup }
            | UiAction::PressKey { lookup, .. }
            | UiAction::Select { lookup, .. }
            | UiAction::ToggleCheckbox { lookup, .. }
            | UiAction::Drag { lookup, .. } => lookup,
        }
    }
}

/// Interactive element as reported by the host, before annotation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ElementDescriptor {
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aria_label: Option<String>,
}

/// Capabilities the tool dispatcher drives on the host page.
#[async_trait]
pub trait HostEffector: Send + Sync {
    /// Visible text of the current page.
    async fn read_page(&self) -> ToolResult<String>;

    /// Whether an element matching `lookup` exists right now.
    async fn element_exists(&self, lookup: &str) -> ToolResult<bool>;

    /// Scroll the element matching `lookup` into view.
    async fn scroll_to(&self, lookup: &str) -> ToolResult<()>;

    /// Navigate the page to `url`.
    async fn navigate(&self, url: &str) -> ToolResult<()>;

    /// Perform a UI interaction.
    async fn interact(&self, action: &UiAction) -> ToolResult<()>;

    /// Draw commands onto the canvas matching `canvas`.
    async fn draw(&self, canvas: &str, commands: &[DrawCommand]) -> ToolResult<()>;

    /// Interactive elements in document order.
    async fn interactive_elements(&self) -> ToolResult<Vec<ElementDescriptor>>;

    /// Evaluate raw script on the page.
    async fn execute_script(&self, code: &str) -> ToolResult<Value>;
}
