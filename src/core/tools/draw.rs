//! Declarative 2D drawing commands for the `draw_canvas` tool.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::effector::{ToolError, ToolResult};

/// Upper bound on commands accepted in one `draw_canvas` call.
pub const MAX_DRAW_COMMANDS: usize = 500;

/// One drawing primitive. Coordinates are canvas pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawCommand {
    Clear,
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fill: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stroke: Option<String>,
    },
    Line {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stroke: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        width: Option<f64>,
    },
    Circle {
        x: f64,
        y: f64,
        radius: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fill: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stroke: Option<String>,
    },
    Text {
        x: f64,
        y: f64,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        font: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fill: Option<String>,
    },
}

impl DrawCommand {
    fn is_finite(&self) -> bool {
        fn all_finite(coords: &[f64]) -> bool {
            coords.iter().all(|c| c.is_finite())
        }

        match self {
            DrawCommand::Clear => true,
            DrawCommand::Rect {
                x, y, width, height, ..
            } => all_finite(&[*x, *y, *width, *height]),
            DrawCommand::Line { x1, y1, x2, y2, .. } => all_finite(&[*x1, *y1, *x2, *y2]),
            DrawCommand::Circle { x, y, radius, .. } => all_finite(&[*x, *y, *radius]),
            DrawCommand::Text { x, y, .. } => all_finite(&[*x, *y]),
        }
    }
}

/// Parse the `commands` argument into drawing primitives.
///
/// Accepts a JSON array or a string holding one.
pub fn parse_draw_commands(value: Option<&Value>) -> ToolResult<Vec<DrawCommand>> {
    let value = match value {
        Some(Value::String(raw)) => serde_json::from_str::<Value>(raw)
            .map_err(|e| ToolError::InvalidArguments(format!("commands: {e}")))?,
        Some(other) => other.clone(),
        None => {
            return Err(ToolError::InvalidArguments(
                "Missing required argument: commands".to_string(),
            ));
        }
    };

    let commands: Vec<DrawCommand> = serde_json::from_value(value)
        .map_err(|e| ToolError::InvalidArguments(format!("commands: {e}")))?;

    if commands.len() > MAX_DRAW_COMMANDS {
        return Err(ToolError::InvalidArguments(format!(
            "commands: at most {MAX_DRAW_COMMANDS} allowed, got {}",
            commands.len()
        )));
    }
    if let Some(index) = commands.iter().position(|c| !c.is_finite()) {
        return Err(ToolError::InvalidArguments(format!(
            "commands[{index}]: coordinates must be finite"
        )));
    }

    Ok(commands)
}
