//! Chat backend trait: the abstraction over the streaming chat endpoint.
//!
//! A backend knows how to send a conversation to the model and hand back a
//! lazy, single-pass stream of decoded chunks. It does not interpret the
//! chunks; that is the round accumulator's job.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::auth::Credential;
use crate::error::ProviderError;
use crate::message::Message;

/// Sampling temperature used when none is configured.
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Everything needed to open one round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The model to use (e.g., "gpt-4o")
    pub model: String,

    /// The conversation messages, system message first
    pub messages: Vec<Message>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_top_p() -> f32 {
    1.0
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>, tools: Vec<ToolDefinition>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools,
            temperature: default_temperature(),
            top_p: default_top_p(),
        }
    }
}

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// One decoded unit of the streaming response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Partial text delta
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Partial tool call fragments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallFragment>,

    /// Set on the chunk that closes the choice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl StreamChunk {
    /// A chunk carrying only text.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// A chunk carrying only tool call fragments.
    pub fn tool_calls(fragments: Vec<ToolCallFragment>) -> Self {
        Self {
            tool_calls: fragments,
            ..Self::default()
        }
    }
}

/// A slice of one tool call, identified by its position in the round.
///
/// Any field may be absent on a given fragment; the id and name usually
/// arrive once, the arguments arrive piecewise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallFragment {
    /// Stable position of the call within the round
    pub index: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Next slice of the JSON arguments string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// Lazy, finite, single-pass sequence of decoded chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, ProviderError>> + Send>>;

/// The core chat backend trait.
///
/// The agent loop calls `stream_chat()` once per round without knowing which
/// endpoint sits behind it.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// A human-readable name for this backend.
    fn name(&self) -> &str;

    /// Open one streaming round.
    ///
    /// A non-success response fails here, before any chunk is produced.
    /// When `cancel` fires, the returned stream ends early without an error.
    async fn stream_chat(
        &self,
        request: ChatRequest,
        credential: &Credential,
        cancel: &CancellationToken,
    ) -> Result<ChunkStream, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_defaults() {
        let req = ChatRequest::new("gpt-4o", vec![], vec![]);
        assert!((req.temperature - 0.1).abs() < f32::EPSILON);
        assert!((req.top_p - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn tool_definition_serialization() {
        let tool = ToolDefinition {
            name: "bash".into(),
            description: "Execute a shell command".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string", "description": "The command to run" }
                },
                "required": ["command"]
            }),
        };
        let json = serde_json::to_string(&tool).unwrap();
        assert!(json.contains("bash"));
        assert!(json.contains("command"));
    }

    #[test]
    fn chunk_constructors() {
        let chunk = StreamChunk::text("hi");
        assert_eq!(chunk.content.as_deref(), Some("hi"));
        assert!(chunk.tool_calls.is_empty());

        let chunk = StreamChunk::tool_calls(vec![ToolCallFragment {
            index: 1,
            ..Default::default()
        }]);
        assert!(chunk.content.is_none());
        assert_eq!(chunk.tool_calls[0].index, 1);
    }
}
