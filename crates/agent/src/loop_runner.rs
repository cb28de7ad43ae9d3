//! The agent loop implementation.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use loopwright_config::AppConfig;
use loopwright_core::auth::TokenSource;
use loopwright_core::error::ProviderError;
use loopwright_core::message::{Conversation, Message};
use loopwright_core::provider::{ChatBackend, ChatRequest, DEFAULT_TEMPERATURE};
use loopwright_tools::ToolExecutor;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::round::run_round;
use crate::session::{ChatSession, SessionHandle, TurnOutcome};
use crate::stream_event::AgentEvent;

/// Rounds allowed per `send` unless configured otherwise.
pub const DEFAULT_MAX_ROUNDS: u32 = 25;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a coding assistant working inside a single \
workspace directory. Use the available tools to inspect and change files and to run commands. \
Paths are relative to the workspace root. Prefer small, verifiable steps and report what you changed.";

/// Drives rounds against a chat backend and runs requested tools.
///
/// The loop owns the conversation. One `send` runs at a time; use
/// [`AgentLoop::handle`] to cancel from elsewhere.
pub struct AgentLoop {
    backend: Arc<dyn ChatBackend>,
    tokens: Arc<dyn TokenSource>,
    tools: Arc<ToolExecutor>,
    model: String,
    temperature: f32,
    top_p: f32,
    max_rounds: u32,
    emit_tool_input_progress: bool,
    conversation: Conversation,
    handle: SessionHandle,
}

impl AgentLoop {
    /// Create a new agent loop with the built-in system prompt.
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        tokens: Arc<dyn TokenSource>,
        tools: Arc<ToolExecutor>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            tokens,
            tools,
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            top_p: 1.0,
            max_rounds: DEFAULT_MAX_ROUNDS,
            emit_tool_input_progress: false,
            conversation: Conversation::with_system(DEFAULT_SYSTEM_PROMPT),
            handle: SessionHandle::default(),
        }
    }

    /// Apply model, sampling, round cap and prompt settings from `config`.
    pub fn with_config(self, config: &AppConfig) -> Self {
        let prompt = config
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
        let mut agent = self
            .with_max_rounds(config.max_rounds)
            .with_sampling(config.temperature, config.top_p)
            .with_system_prompt(prompt)
            .with_tool_input_progress(config.agent.emit_tool_input_progress);
        agent.model = config.model.clone();
        agent
    }

    /// Replace the system prompt. Only meaningful before the first `send`.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.conversation = Conversation::with_system(prompt);
        self
    }

    /// Set the maximum number of rounds per `send`.
    pub fn with_max_rounds(mut self, max: u32) -> Self {
        self.max_rounds = max.max(1);
        self
    }

    pub fn with_sampling(mut self, temperature: f32, top_p: f32) -> Self {
        self.temperature = temperature;
        self.top_p = top_p;
        self
    }

    /// Forward `tool_input_progress` events to the caller.
    pub fn with_tool_input_progress(mut self, enabled: bool) -> Self {
        self.emit_tool_input_progress = enabled;
        self
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
        info!(model = %self.model, "Model changed");
    }

    pub fn history(&self) -> &Conversation {
        &self.conversation
    }

    /// Drop every message but the system prompt.
    pub fn clear_history(&mut self) {
        self.conversation.clear();
        debug!("History cleared");
    }

    pub fn cancel(&self) {
        self.handle.cancel();
    }

    /// Process one user message.
    ///
    /// Events stream into `events` as they happen. Exactly one `done` or
    /// `error` ends the turn, except after cancellation, which ends silently.
    pub async fn send(&mut self, text: impl Into<String>, events: &UnboundedSender<AgentEvent>) -> TurnOutcome {
        self.send_with_attachments(text, &[], events).await
    }

    /// Like [`send`](Self::send), noting `attachments` in the user message.
    ///
    /// Attachment contents are never forwarded to the model.
    pub async fn send_with_attachments(
        &mut self,
        text: impl Into<String>,
        attachments: &[String],
        events: &UnboundedSender<AgentEvent>,
    ) -> TurnOutcome {
        let turn = self.handle.begin();
        self.conversation.push(Message::user_with_attachments(text, attachments));
        info!(
            model = %self.model,
            messages = self.conversation.len(),
            "Processing user message"
        );

        let outcome = self.run_turn(&turn.token, events).await;
        debug!(outcome = ?outcome, "Turn finished");
        outcome
    }

    async fn run_turn(&mut self, cancel: &CancellationToken, events: &UnboundedSender<AgentEvent>) -> TurnOutcome {
        let definitions = self.tools.definitions();
        let emit_progress = self.emit_tool_input_progress;
        let forward = |event: AgentEvent| {
            if emit_progress || !matches!(event, AgentEvent::ToolInputProgress { .. }) {
                let _ = events.send(event);
            }
        };

        let mut round = 0;
        loop {
            round += 1;
            let checkpoint = self.conversation.len();
            debug!(round, "Agent loop round");

            if cancel.is_cancelled() {
                return self.cancelled(checkpoint);
            }

            // Checked every round: a long tool sequence can outlive the token.
            let credential = match self.tokens.get_token(cancel).await {
                Ok(credential) => credential,
                Err(e) => return self.provider_failure(e, checkpoint, cancel, events),
            };

            let request = ChatRequest {
                model: self.model.clone(),
                messages: self.conversation.messages().to_vec(),
                tools: definitions.clone(),
                temperature: self.temperature,
                top_p: self.top_p,
            };

            let stream = match self.backend.stream_chat(request, &credential, cancel).await {
                Ok(stream) => stream,
                Err(e) => return self.provider_failure(e, checkpoint, cancel, events),
            };

            let result = run_round(stream, cancel, forward).await;
            if result.aborted {
                return self.cancelled(checkpoint);
            }
            if let Some(message) = result.error {
                return self.fail(message, checkpoint, events);
            }

            if !result.text.is_empty() {
                forward(AgentEvent::TextDone {
                    text: result.text.clone(),
                });
            }

            if result.tool_calls.is_empty() {
                self.conversation.push(Message::assistant(result.text));
                forward(AgentEvent::Done { rounds: round });
                return TurnOutcome::Completed { rounds: round };
            }

            let calls = result.tool_calls;
            debug!(round, tool_count = calls.len(), "Executing tool calls");
            self.conversation
                .push(Message::assistant_with_tools(result.text, calls.clone()));

            for call in &calls {
                if cancel.is_cancelled() {
                    return self.cancelled(checkpoint);
                }

                let input = parse_arguments(&call.name, &call.arguments);
                forward(AgentEvent::ToolStart {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    input: input.clone(),
                });

                let start = Instant::now();
                let outcome = self.tools.execute(&call.name, input).await;

                // A tool that finished after cancel still ran; its result is dropped.
                if cancel.is_cancelled() {
                    return self.cancelled(checkpoint);
                }
                if outcome.is_error {
                    warn!(tool = %call.name, duration_ms = start.elapsed().as_millis() as u64, "Tool returned an error");
                }

                forward(AgentEvent::ToolResult {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    content: outcome.content.clone(),
                    is_error: outcome.is_error,
                });
                self.conversation
                    .push(Message::tool_result(&call.id, outcome.content));
            }

            if round >= self.max_rounds {
                warn!(rounds = round, "Max rounds reached, ending turn");
                let notice = max_rounds_notice(self.max_rounds);
                self.conversation.push(Message::assistant(notice.clone()));
                forward(AgentEvent::TextDelta {
                    content: notice.clone(),
                });
                forward(AgentEvent::TextDone { text: notice });
                forward(AgentEvent::Done { rounds: round });
                return TurnOutcome::MaxRounds { rounds: round };
            }
        }
    }

    fn provider_failure(
        &mut self,
        error: ProviderError,
        checkpoint: usize,
        cancel: &CancellationToken,
        events: &UnboundedSender<AgentEvent>,
    ) -> TurnOutcome {
        if matches!(error, ProviderError::Cancelled) || cancel.is_cancelled() {
            return self.cancelled(checkpoint);
        }
        self.fail(error.to_string(), checkpoint, events)
    }

    fn fail(&mut self, message: String, checkpoint: usize, events: &UnboundedSender<AgentEvent>) -> TurnOutcome {
        warn!(error = %message, "Turn failed");
        self.conversation.truncate(checkpoint);
        let _ = events.send(AgentEvent::Error {
            message: message.clone(),
        });
        TurnOutcome::Failed { message }
    }

    fn cancelled(&mut self, checkpoint: usize) -> TurnOutcome {
        info!("Turn cancelled");
        self.conversation.truncate(checkpoint);
        TurnOutcome::Cancelled
    }
}

/// Tool arguments as JSON. Anything that is not a JSON object becomes `{}`.
fn parse_arguments(tool: &str, raw: &str) -> serde_json::Value {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value) if value.is_object() => value,
        _ if raw.trim().is_empty() => serde_json::json!({}),
        result => {
            warn!(tool, error = ?result.err(), "Unparseable tool arguments, using empty object");
            serde_json::json!({})
        }
    }
}

fn max_rounds_notice(max_rounds: u32) -> String {
    format!(
        "I've reached the maximum of {max_rounds} tool rounds for this request. \
         Send another message to let me continue."
    )
}

#[async_trait]
impl ChatSession for AgentLoop {
    async fn query(&mut self, text: &str, events: UnboundedSender<AgentEvent>) -> TurnOutcome {
        self.send(text, &events).await
    }

    fn cancel(&self) {
        AgentLoop::cancel(self);
    }

    fn is_ready(&self) -> bool {
        !self.handle.is_busy()
    }

    fn set_model(&mut self, model: &str) {
        AgentLoop::set_model(self, model);
    }
}
