//! Function declarations advertised in the session `setup` envelope.

use serde_json::json;

use crate::core::session::messages::{FunctionDeclaration, Tool};

pub const READ_PAGE: &str = "read_page";
pub const SCROLL_TO: &str = "scroll_to";
pub const NAVIGATE: &str = "navigate";
pub const UI_ACTION: &str = "ui_action";
pub const DRAW_CANVAS: &str = "draw_canvas";
pub const PAGE_SNAPSHOT: &str = "page_snapshot";
pub const WAIT_FOR: &str = "wait_for";
pub const EXECUTE_JS: &str = "execute_js";

/// Actions accepted by `ui_action`.
pub const UI_ACTIONS: &[&str] = &[
    "click",
    "type",
    "fill",
    "focus",
    "hover",
    "press_key",
    "select",
    "toggle_checkbox",
    "drag",
];

fn declaration(
    name: &str,
    description: &str,
    parameters: Option<serde_json::Value>,
) -> FunctionDeclaration {
    FunctionDeclaration {
        name: name.to_string(),
        description: description.to_string(),
        parameters,
    }
}

/// Tool surface for one session. `execute_js` is only declared when code
/// execution is allowed.
pub fn tool_declarations(allow_code_execution: bool) -> Vec<Tool> {
    let mut declarations = vec![
        declaration(
            READ_PAGE,
            "Reads key text from the current page so you can answer questions about it.",
            None,
        ),
        declaration(
            SCROLL_TO,
            "Scrolls the page to an element matching the provided CSS selector.",
            Some(json!({
                "type": "object",
                "properties": {
                    "selector": { "type": "string", "description": "A CSS selector for the target element." }
                },
                "required": ["selector"]
            })),
        ),
        declaration(
            NAVIGATE,
            "Navigates the browser to a URL on this site.",
            Some(json!({
                "type": "object",
                "properties": {
                    "url": { "type": "string", "description": "Absolute or site-relative URL." }
                },
                "required": ["url"]
            })),
        ),
        declaration(
            UI_ACTION,
            "Interacts with a page element: click, type, fill, focus, hover, press_key, select, toggle_checkbox or drag.",
            Some(json!({
                "type": "object",
                "properties": {
                    "action": { "type": "string", "enum": UI_ACTIONS },
                    "selector": { "type": "string", "description": "A CSS selector for the target element." },
                    "text": { "type": "string", "description": "Text to type (type)." },
                    "value": { "type": "string", "description": "Value to set (fill, select)." },
                    "key": { "type": "string", "description": "Key name, e.g. Enter (press_key)." },
                    "checked": { "type": "boolean", "description": "Desired state; omit to toggle (toggle_checkbox)." },
                    "target": { "type": "string", "description": "Drop target selector (drag)." },
                    "timeout_ms": { "type": "integer", "description": "How long to wait for the element." }
                },
                "required": ["action", "selector"]
            })),
        ),
        declaration(
            DRAW_CANVAS,
            "Draws shapes and text on a canvas element.",
            Some(json!({
                "type": "object",
                "properties": {
                    "canvas": { "type": "string", "description": "A CSS selector for the canvas." },
                    "commands": {
                        "type": "array",
                        "description": "Drawing commands: {op: clear|rect|line|circle|text, ...}.",
                        "items": { "type": "object" }
                    }
                },
                "required": ["canvas", "commands"]
            })),
        ),
        declaration(
            PAGE_SNAPSHOT,
            "Lists interactive elements on the page with a selector for each.",
            None,
        ),
        declaration(
            WAIT_FOR,
            "Waits for an element matching a CSS selector to appear.",
            Some(json!({
                "type": "object",
                "properties": {
                    "selector": { "type": "string" },
                    "timeout_ms": { "type": "integer" }
                },
                "required": ["selector"]
            })),
        ),
    ];

    if allow_code_execution {
        declarations.push(declaration(
            EXECUTE_JS,
            "Evaluates JavaScript on the page and returns the result.",
            Some(json!({
                "type": "object",
                "properties": { "code": { "type": "string" } },
                "required": ["code"]
            })),
        ));
    }

    vec![Tool {
        function_declarations: declarations,
    }]
}
