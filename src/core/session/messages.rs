//! Live API envelope types.
//!
//! Every wire frame is a JSON object carrying exactly one envelope kind. The
//! session commits to the camelCase `v1beta` protocol.
//!
//! # Client → upstream
//!
//! - `setup` - sent once when the socket opens
//! - `clientContent` - text turns (greeting)
//! - `realtimeInput` - one PCM16 audio frame
//! - `toolResponse` - results for one tool-call batch
//!
//! # Upstream → client
//!
//! - `setupComplete` - capability negotiation finished
//! - `serverContent` - model turn parts (audio/text) and the interrupted flag
//! - `toolCall` - an ordered batch of function calls

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Shared content types
// =============================================================================

/// Inline binary payload (base64) with its mime type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub data: String,
    #[serde(default, alias = "mime_type", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// A single content part.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, alias = "inline_data", skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }
}

/// Role-tagged list of parts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

// =============================================================================
// Setup
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    pub system_instruction: Content,
    pub tools: Vec<Tool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
    pub speech_config: SpeechConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
    pub language_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

/// Tool surface declared during setup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub function_declarations: Vec<FunctionDeclaration>,
}

/// One declared function with its JSON schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

// =============================================================================
// Client content / realtime input / tool response
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContent {
    pub turns: Vec<Content>,
    pub turn_complete: bool,
}

impl ClientContent {
    /// A complete single user turn carrying `text`.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            turns: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part::text(text)],
            }],
            turn_complete: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RealtimeInput {
    pub audio: Blob,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub function_responses: Vec<FunctionResponse>,
}

/// Result of one function call. `id` and `name` mirror the originating call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub response: Value,
}

/// Envelopes the client sends upstream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientEnvelope {
    Setup(Setup),
    ClientContent(ClientContent),
    RealtimeInput(RealtimeInput),
    ToolResponse(ToolResponse),
}

impl ClientEnvelope {
    /// Wire name of the envelope kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientEnvelope::Setup(_) => "setup",
            ClientEnvelope::ClientContent(_) => "clientContent",
            ClientEnvelope::RealtimeInput(_) => "realtimeInput",
            ClientEnvelope::ToolResponse(_) => "toolResponse",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// Server envelopes
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub model_turn: Option<Content>,
    #[serde(default)]
    pub interrupted: bool,
    #[serde(default)]
    pub turn_complete: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    #[serde(default)]
    pub function_calls: Vec<FunctionCall>,
}

/// One remote-triggered call. `args` may be an object or a JSON string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FunctionCall {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: Option<Value>,
}

/// Loose shape of an inbound frame; classified into [`ServerEnvelope`].
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawServerMessage {
    #[serde(default)]
    setup_complete: Option<Value>,
    #[serde(default)]
    server_content: Option<ServerContent>,
    #[serde(default)]
    tool_call: Option<ToolCall>,
}

/// Envelopes the upstream sends to the client.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEnvelope {
    SetupComplete,
    ServerContent(ServerContent),
    ToolCall(ToolCall),
    /// Valid JSON that carries no kind this session handles.
    Unrecognized,
}

impl ServerEnvelope {
    /// Parse one inbound frame.
    ///
    /// Malformed JSON is an error; well-formed frames without a known kind
    /// classify as [`ServerEnvelope::Unrecognized`].
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let raw: RawServerMessage = serde_json::from_str(text)?;

        Ok(if raw.setup_complete.is_some() {
            ServerEnvelope::SetupComplete
        } else if let Some(call) = raw.tool_call {
            ServerEnvelope::ToolCall(call)
        } else if let Some(content) = raw.server_content {
            ServerEnvelope::ServerContent(content)
        } else {
            ServerEnvelope::Unrecognized
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerEnvelope::SetupComplete => "setupComplete",
            ServerEnvelope::ServerContent(_) => "serverContent",
            ServerEnvelope::ToolCall(_) => "toolCall",
            ServerEnvelope::Unrecognized => "unrecognized",
        }
    }
}
