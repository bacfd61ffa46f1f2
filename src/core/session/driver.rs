//! Session driver.
//!
//! A [`Session`] is one connect-to-disconnect lifecycle. It owns the handshake
//! state, the pre-ready action queue, the audio device pair and the outbound
//! link; nothing is shared with other sessions. The host feeds it inbound
//! frames and microphone frames, and it decides what may go out and when.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::config::SessionConfig;
use super::error::{SessionError, SessionResult};
use super::handshake::{Admission, Handshake, HandshakeState};
use super::link::SessionLink;
use super::messages::{
    ClientContent, ClientEnvelope, Content, GenerationConfig, Part, PrebuiltVoiceConfig,
    ServerContent, ServerEnvelope, Setup, SpeechConfig, ToolCall, VoiceConfig,
};
use crate::core::audio::{AudioDevices, AudioInput, CaptureEncoder, PlaybackScheduler};
use crate::core::tools::{HostEffector, ToolDispatcher, tool_declarations};

/// Client-originated work parked until `setupComplete`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Send the configured greeting, once per session
    Greet,
    /// Send a user text turn
    SendText(String),
    /// Start the capture device
    StartCapture,
}

pub struct Session {
    id: String,
    config: SessionConfig,
    handshake: Handshake<SessionAction>,
    link: SessionLink,
    capture: CaptureEncoder,
    capturing: bool,
    input: Box<dyn AudioInput>,
    playback: PlaybackScheduler,
    dispatcher: Arc<ToolDispatcher>,
    has_greeted: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.handshake.state())
            .field("pending", &self.handshake.pending_len())
            .field("capturing", &self.capturing)
            .field("playback", &self.playback)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(
        config: SessionConfig,
        devices: AudioDevices,
        effector: Arc<dyn HostEffector>,
        link: SessionLink,
    ) -> Self {
        let dispatcher = Arc::new(ToolDispatcher::new(effector, config.dispatcher_config()));
        Self {
            id: Uuid::new_v4().to_string(),
            config,
            handshake: Handshake::new(),
            link,
            capture: CaptureEncoder::new(),
            capturing: false,
            input: devices.input,
            playback: PlaybackScheduler::new(devices.output),
            dispatcher,
            has_greeted: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> HandshakeState {
        self.handshake.state()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn pending_len(&self) -> usize {
        self.handshake.pending_len()
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    pub fn playback_cursor(&self) -> f64 {
        self.playback.cursor()
    }

    /// The one `setup` envelope sent when the socket opens.
    pub fn setup_envelope(&self) -> ClientEnvelope {
        ClientEnvelope::Setup(Setup {
            model: self.config.model_resource(),
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: self.config.voice_name.clone(),
                        },
                    },
                    language_code: self.config.language_code.clone(),
                },
            },
            system_instruction: Content {
                role: Some("system".to_string()),
                parts: vec![Part::text(self.config.system_instruction.clone())],
            },
            tools: tool_declarations(self.config.allow_code_execution),
        })
    }

    /// Socket opened: send `setup` and park the greeting and capture start.
    pub fn open(&mut self) -> SessionResult<()> {
        self.handshake.begin()?;
        self.link.send(&self.setup_envelope())?;
        info!(
            session_id = %self.id,
            model = %self.config.model_resource(),
            "Session setup sent"
        );

        if self.config.auto_greet && !self.has_greeted {
            self.admit(SessionAction::Greet);
        }
        self.admit(SessionAction::StartCapture);
        Ok(())
    }

    /// Send a user text turn, or park it until the handshake completes.
    pub fn send_text(&mut self, text: &str) -> SessionResult<()> {
        if text.is_empty() {
            return Ok(());
        }
        if self.admit(SessionAction::SendText(text.to_string())) {
            Ok(())
        } else {
            Err(SessionError::NotConnected)
        }
    }

    /// Offer one microphone frame. Returns whether it was sent.
    ///
    /// Frames are dropped unless the session is ready, the link is open and
    /// capture has started.
    pub fn push_capture_frame(&mut self, samples: &[f32]) -> bool {
        if !self.handshake.is_ready() || !self.capturing || !self.link.is_open() {
            return false;
        }
        let envelope = self.capture.encode_frame(samples);
        self.link.send(&envelope).is_ok()
    }

    /// Handle one inbound text frame.
    ///
    /// Malformed frames are dropped; the failure is only logged in debug mode.
    pub fn handle_text(&mut self, text: &str) -> Option<JoinHandle<()>> {
        match ServerEnvelope::from_json(text) {
            Ok(envelope) => self.handle_envelope(envelope),
            Err(e) => {
                if self.config.debug {
                    warn!(session_id = %self.id, error = %e, "Failed to parse upstream message");
                }
                None
            }
        }
    }

    /// Handle one inbound binary frame (UTF-8 JSON).
    pub fn handle_binary(&mut self, data: &[u8]) -> Option<JoinHandle<()>> {
        match std::str::from_utf8(data) {
            Ok(text) => self.handle_text(text),
            Err(e) => {
                if self.config.debug {
                    warn!(session_id = %self.id, error = %e, "Binary upstream message is not UTF-8");
                }
                None
            }
        }
    }

    /// Route a parsed envelope. Returns the handle of a spawned tool batch.
    pub fn handle_envelope(&mut self, envelope: ServerEnvelope) -> Option<JoinHandle<()>> {
        if self.handshake.state() == HandshakeState::Closed {
            return None;
        }

        match envelope {
            ServerEnvelope::SetupComplete => {
                match self.handshake.complete() {
                    Ok(actions) => {
                        info!(
                            session_id = %self.id,
                            queued = actions.len(),
                            "Setup complete"
                        );
                        for action in actions {
                            self.run_action(action);
                        }
                    }
                    Err(e) => warn!(session_id = %self.id, error = %e, "Unexpected setupComplete"),
                }
                None
            }
            ServerEnvelope::ServerContent(content) => {
                self.handle_server_content(content);
                None
            }
            ServerEnvelope::ToolCall(call) => {
                if !self.handshake.is_ready() {
                    warn!(session_id = %self.id, "Tool call before setup completed, ignoring");
                    return None;
                }
                Some(self.dispatch_tool_call(call))
            }
            ServerEnvelope::Unrecognized => {
                if self.config.debug {
                    debug!(session_id = %self.id, "Unrecognized upstream message");
                }
                None
            }
        }
    }

    /// Run a tool batch in the background and send its response if the link
    /// is still open when it finishes.
    ///
    /// The batch is not cancelled by [`Session::close`]; its response is
    /// discarded instead.
    pub fn dispatch_tool_call(&self, call: ToolCall) -> JoinHandle<()> {
        let dispatcher = self.dispatcher.clone();
        let link = self.link.clone();
        let session_id = self.id.clone();

        tokio::spawn(async move {
            let count = call.function_calls.len();
            let response = dispatcher.run_batch(&call).await;

            if !link.is_open() {
                debug!(%session_id, count, "Link closed, discarding tool response");
                return;
            }
            match link.send(&ClientEnvelope::ToolResponse(response)) {
                Ok(()) => debug!(%session_id, count, "Tool response sent"),
                Err(e) => warn!(%session_id, error = %e, "Failed to send tool response"),
            }
        })
    }

    /// Tear the session down: discard parked actions, stop capture, release
    /// the output device and close the link. Idempotent.
    pub fn close(&mut self) {
        if self.handshake.state() == HandshakeState::Closed {
            return;
        }
        let discarded = self.handshake.close();
        if self.capturing {
            self.input.stop();
            self.capturing = false;
        }
        self.playback.close();
        self.link.close();
        info!(session_id = %self.id, discarded, "Session closed");
    }

    /// The socket went away underneath the session.
    pub fn on_transport_closed(&mut self) {
        self.link.mark_closed();
        self.close();
    }

    /// Run now, park, or drop depending on the handshake state. Returns
    /// `false` when the action was dropped.
    fn admit(&mut self, action: SessionAction) -> bool {
        match self.handshake.enqueue(action) {
            Admission::Run(action) => {
                self.run_action(action);
                true
            }
            Admission::Queued => {
                debug!(
                    session_id = %self.id,
                    pending = self.handshake.pending_len(),
                    "Queued until setup completes"
                );
                true
            }
            Admission::Rejected(action) => {
                debug!(session_id = %self.id, ?action, "Session not open, dropping action");
                false
            }
        }
    }

    fn run_action(&mut self, action: SessionAction) {
        match action {
            SessionAction::Greet => {
                if self.has_greeted || self.config.greeting.is_empty() {
                    return;
                }
                self.has_greeted = true;
                let greeting = ClientContent::user_text(self.config.greeting.clone());
                self.transmit(ClientEnvelope::ClientContent(greeting));
            }
            SessionAction::SendText(text) => {
                self.transmit(ClientEnvelope::ClientContent(ClientContent::user_text(text)));
            }
            SessionAction::StartCapture => self.start_capture(),
        }
    }

    fn transmit(&self, envelope: ClientEnvelope) {
        if let Err(e) = self.link.send(&envelope) {
            debug!(
                session_id = %self.id,
                kind = envelope.kind(),
                error = %e,
                "Dropping outbound message"
            );
        }
    }

    fn start_capture(&mut self) {
        if self.capturing {
            return;
        }
        match self.input.start() {
            Ok(()) => {
                self.capturing = true;
                info!(session_id = %self.id, "Capture started");
            }
            Err(e) => error!(session_id = %self.id, error = %e, "Failed to start capture"),
        }
    }

    fn handle_server_content(&mut self, content: ServerContent) {
        if content.interrupted {
            self.playback.interrupt();
        }

        let parts = content.model_turn.map(|turn| turn.parts).unwrap_or_default();
        if parts.is_empty() && self.config.debug {
            debug!(
                session_id = %self.id,
                turn_complete = content.turn_complete,
                "Server content without parts"
            );
        }

        for part in parts {
            if let Some(blob) = part.inline_data.filter(|b| !b.data.is_empty()) {
                match self.playback.schedule(&blob) {
                    Ok(Some(chunk)) => {
                        if self.config.debug {
                            debug!(
                                session_id = %self.id,
                                mime_type = ?blob.mime_type,
                                start_at = chunk.start_at,
                                "Audio chunk scheduled"
                            );
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!(session_id = %self.id, error = %e, "Failed to schedule audio"),
                }
            } else if let Some(text) = part.text {
                if self.config.debug {
                    debug!(session_id = %self.id, %text, "Model text");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audio::{AudioError, AudioOutput, AudioResult};
    use crate::core::session::config::DEFAULT_GREETING;
    use crate::core::session::link::{LinkReceiver, Outbound};
    use crate::core::tools::{DrawCommand, ElementDescriptor, ToolResult, UiAction};
    use async_trait::async_trait;
    use base64::prelude::*;
    use serde_json::{Value, json};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Clone, Default)]
    struct FakeInput(Arc<AtomicBool>);

    impl AudioInput for FakeInput {
        fn start(&mut self) -> AudioResult<()> {
            self.0.store(true, Ordering::SeqCst);
            Ok(())
        }
        fn stop(&mut self) {
            self.0.store(false, Ordering::SeqCst);
        }
    }

    #[derive(Clone)]
    struct FakeOutput {
        now: Arc<Mutex<f64>>,
        closed: Arc<AtomicBool>,
    }

    impl AudioOutput for FakeOutput {
        fn sample_rate(&self) -> u32 {
            24000
        }
        fn current_time(&self) -> f64 {
            *self.now.lock().unwrap()
        }
        fn reinitialize(&mut self, _sample_rate: u32) -> AudioResult<()> {
            Err(AudioError::DeviceUnavailable("fixed rate".to_string()))
        }
        fn schedule(&mut self, _start_at: f64, _samples: Vec<f32>, _rate: u32) -> AudioResult<()> {
            Ok(())
        }
        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    struct EmptyPage;

    #[async_trait]
    impl HostEffector for EmptyPage {
        async fn read_page(&self) -> ToolResult<String> {
            Ok("Welcome".to_string())
        }
        async fn element_exists(&self, _lookup: &str) -> ToolResult<bool> {
            Ok(false)
        }
        async fn scroll_to(&self, _lookup: &str) -> ToolResult<()> {
            Ok(())
        }
        async fn navigate(&self, _url: &str) -> ToolResult<()> {
            Ok(())
        }
        async fn interact(&self, _action: &UiAction) -> ToolResult<()> {
            Ok(())
        }
        async fn draw(&self, _canvas: &str, _commands: &[DrawCommand]) -> ToolResult<()> {
            Ok(())
        }
        async fn interactive_elements(&self) -> ToolResult<Vec<ElementDescriptor>> {
            Ok(Vec::new())
        }
        async fn execute_script(&self, _code: &str) -> ToolResult<Value> {
            Ok(Value::Null)
        }
    }

    struct Harness {
        session: Session,
        rx: LinkReceiver,
        mic: FakeInput,
        now: Arc<Mutex<f64>>,
        speaker_closed: Arc<AtomicBool>,
    }

    impl Harness {
        fn new(config: SessionConfig) -> Self {
            let (link, rx) = SessionLink::channel(64);
            let mic = FakeInput::default();
            let now = Arc::new(Mutex::new(0.0));
            let speaker_closed = Arc::new(AtomicBool::new(false));
            let output = FakeOutput {
                now: now.clone(),
                closed: speaker_closed.clone(),
            };
            let session = Session::new(
                config,
                AudioDevices::new(Box::new(mic.clone()), Box::new(output)),
                Arc::new(EmptyPage),
                link,
            );
            Self {
                session,
                rx,
                mic,
                now,
                speaker_closed,
            }
        }

        fn sent(&mut self) -> Vec<Value> {
            let mut frames = Vec::new();
            while let Ok(Outbound::Text(text)) = self.rx.try_recv() {
                frames.push(serde_json::from_str(&text).unwrap());
            }
            frames
        }
    }

    fn audio_chunk(samples: usize) -> String {
        let data = BASE64_STANDARD.encode(vec![0u8; samples * 2]);
        json!({
            "serverContent": {
                "modelTurn": { "parts": [{ "inlineData": { "data": data, "mimeType": "audio/pcm;rate=24000" } }] }
            }
        })
        .to_string()
    }

    #[test]
    fn test_setup_envelope_shape() {
        let harness = Harness::new(SessionConfig::default());
        let value = serde_json::to_value(harness.session.setup_envelope()).unwrap();
        let setup = &value["setup"];

        assert_eq!(
            setup["model"],
            "models/gemini-2.5-flash-native-audio-preview-12-2025"
        );
        assert_eq!(setup["generationConfig"]["responseModalities"], json!(["AUDIO"]));
        assert_eq!(
            setup["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"],
            "Kore"
        );
        assert_eq!(setup["systemInstruction"]["role"], "system");
        let names: Vec<&str> = setup["tools"][0]["functionDeclarations"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["name"].as_str().unwrap())
            .collect();
        assert!(names.contains(&"read_page"));
        assert!(!names.contains(&"execute_js"));
    }

    #[test]
    fn test_nothing_but_setup_before_setup_complete() {
        let mut harness = Harness::new(SessionConfig::default());
        harness.session.open().unwrap();

        assert_eq!(harness.session.state(), HandshakeState::AwaitingSetup);
        assert!(!harness.session.push_capture_frame(&[0.1; 160]));
        harness.session.send_text("Where is pricing?").unwrap();

        let sent = harness.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].get("setup").is_some());
        assert_eq!(harness.session.pending_len(), 3);
        assert!(!harness.mic.0.load(Ordering::SeqCst));
    }

    #[test]
    fn test_setup_complete_drains_in_order() {
        let mut harness = Harness::new(SessionConfig::default());
        harness.session.open().unwrap();
        harness.session.send_text("Where is pricing?").unwrap();
        harness.sent();

        harness.session.handle_text(r#"{"setupComplete":{}}"#);
        assert_eq!(harness.session.state(), HandshakeState::Ready);
        assert!(harness.session.is_capturing());
        assert!(harness.mic.0.load(Ordering::SeqCst));

        let sent = harness.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(
            sent[0]["clientContent"]["turns"][0]["parts"][0]["text"],
            DEFAULT_GREETING
        );
        assert_eq!(
            sent[1]["clientContent"]["turns"][0]["parts"][0]["text"],
            "Where is pricing?"
        );

        assert!(harness.session.push_capture_frame(&[0.0; 160]));
        let frame = harness.sent();
        assert_eq!(frame[0]["realtimeInput"]["audio"]["mimeType"], "audio/pcm;rate=16000");
    }

    #[test]
    fn test_no_greeting_when_disabled() {
        let mut harness = Harness::new(SessionConfig {
            auto_greet: false,
            ..Default::default()
        });
        harness.session.open().unwrap();
        harness.sent();
        harness.session.handle_text(r#"{"setupComplete":{}}"#);

        assert!(harness.sent().is_empty());
        assert!(harness.session.is_capturing());
    }

    #[test]
    fn test_malformed_frames_are_dropped() {
        let mut harness = Harness::new(SessionConfig {
            debug: true,
            ..Default::default()
        });
        harness.session.open().unwrap();

        assert!(harness.session.handle_text("{not json").is_none());
        assert!(harness.session.handle_binary(&[0xff, 0xfe]).is_none());
        assert!(harness.session.handle_text(r#"{"usageMetadata":{}}"#).is_none());
        assert_eq!(harness.session.state(), HandshakeState::AwaitingSetup);

        harness.session.handle_binary(br#"{"setupComplete":{}}"#);
        assert_eq!(harness.session.state(), HandshakeState::Ready);
    }

    #[test]
    fn test_audio_and_interrupt() {
        let mut harness = Harness::new(SessionConfig::default());
        harness.session.open().unwrap();
        harness.session.handle_text(r#"{"setupComplete":{}}"#);

        harness.session.handle_text(&audio_chunk(24000));
        harness.session.handle_text(&audio_chunk(24000));
        assert!((harness.session.playback_cursor() - 2.0).abs() < 1e-9);

        *harness.now.lock().unwrap() = 0.25;
        harness
            .session
            .handle_text(r#"{"serverContent":{"interrupted":true}}"#);
        assert_eq!(harness.session.playback_cursor(), 0.25);
    }

    #[tokio::test]
    async fn test_tool_call_round_trip() {
        let mut harness = Harness::new(SessionConfig::default());
        harness.session.open().unwrap();
        harness.session.handle_text(r#"{"setupComplete":{}}"#);
        harness.sent();

        let handle = harness
            .session
            .handle_text(
                r##"{"toolCall":{"functionCalls":[{"id":"c1","name":"read_page","args":{}},{"id":"c2","name":"scroll_to","args":"{\"selector\":\"#nope\"}"}]}}"##,
            )
            .expect("tool batch spawned");
        handle.await.unwrap();

        let sent = harness.sent();
        let responses = &sent[0]["toolResponse"]["functionResponses"];
        assert_eq!(responses[0]["id"], "c1");
        assert_eq!(responses[0]["response"]["text"], "Welcome");
        assert_eq!(responses[1]["id"], "c2");
        assert_eq!(responses[1]["response"]["status"], "not_found");
    }

    #[tokio::test]
    async fn test_tool_response_discarded_after_close() {
        let mut harness = Harness::new(SessionConfig::default());
        harness.session.open().unwrap();
        harness.session.handle_text(r#"{"setupComplete":{}}"#);
        harness.sent();

        let call = ToolCall {
            function_calls: vec![crate::core::session::messages::FunctionCall {
                id: Some("late".to_string()),
                name: "read_page".to_string(),
                args: None,
            }],
        };
        let handle = harness.session.dispatch_tool_call(call);
        harness.session.close();
        handle.await.unwrap();

        assert!(harness.sent().is_empty());
    }

    #[test]
    fn test_tool_call_before_ready_is_ignored() {
        let mut harness = Harness::new(SessionConfig::default());
        harness.session.open().unwrap();
        let handle = harness
            .session
            .handle_text(r#"{"toolCall":{"functionCalls":[{"id":"x","name":"read_page"}]}}"#);
        assert!(handle.is_none());
    }

    #[test]
    fn test_close_tears_down() {
        let mut harness = Harness::new(SessionConfig::default());
        harness.session.open().unwrap();
        harness.session.handle_text(r#"{"setupComplete":{}}"#);
        harness.sent();

        harness.session.close();
        assert_eq!(harness.session.state(), HandshakeState::Closed);
        assert!(!harness.mic.0.load(Ordering::SeqCst));
        assert!(harness.speaker_closed.load(Ordering::SeqCst));
        assert!(!harness.session.push_capture_frame(&[0.0; 16]));
        assert!(harness.session.send_text("hello?").is_err());
        assert_eq!(harness.rx.try_recv().unwrap(), Outbound::Close);

        harness.session.close();
        assert!(harness.rx.try_recv().is_err());
    }

    #[test]
    fn test_close_before_ready_discards_queue() {
        let mut harness = Harness::new(SessionConfig::default());
        harness.session.open().unwrap();
        harness.session.send_text("queued").unwrap();
        harness.sent();

        harness.session.close();
        assert_eq!(harness.session.pending_len(), 0);
        assert!(harness.session.handle_text(r#"{"setupComplete":{}}"#).is_none());
        assert_eq!(harness.session.state(), HandshakeState::Closed);
        assert!(!harness.mic.0.load(Ordering::SeqCst));
    }

    #[test]
    fn test_open_twice_fails() {
        let mut harness = Harness::new(SessionConfig::default());
        harness.session.open().unwrap();
        assert!(matches!(
            harness.session.open(),
            Err(SessionError::InvalidTransition { .. })
        ));
    }
}
