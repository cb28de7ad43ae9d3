//! Chat-completions wire types and conversions.

use loopwright_core::message::{Message, Role};
use loopwright_core::provider::{ChatRequest, StreamChunk, ToolCallFragment, ToolDefinition};
use serde::{Deserialize, Serialize};

// --- Request types ---

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ApiMessage {
    pub role: String,
    /// Serialized as `null` for tool-only assistant turns.
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ApiToolCall {
    pub id: String,
    pub r#type: String,
    pub function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ApiFunction {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ApiToolDefinition {
    pub r#type: String,
    pub function: ApiToolFunction,
}

#[derive(Debug, Serialize)]
pub(crate) struct ApiToolFunction {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

pub(crate) fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
    messages
        .iter()
        .map(|m| ApiMessage {
            role: match m.role {
                Role::User => "user".into(),
                Role::Assistant => "assistant".into(),
                Role::System => "system".into(),
                Role::Tool => "tool".into(),
            },
            content: m.content.clone(),
            tool_calls: (!m.tool_calls.is_empty()).then(|| {
                m.tool_calls
                    .iter()
                    .map(|tc| ApiToolCall {
                        id: tc.id.clone(),
                        r#type: "function".into(),
                        function: ApiFunction {
                            name: tc.name.clone(),
                            arguments: tc.arguments.clone(),
                        },
                    })
                    .collect()
            }),
            tool_call_id: m.tool_call_id.clone(),
        })
        .collect()
}

pub(crate) fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
    tools
        .iter()
        .map(|t| ApiToolDefinition {
            r#type: "function".into(),
            function: ApiToolFunction {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            },
        })
        .collect()
}

/// Build the JSON request body.
pub(crate) fn request_body(request: &ChatRequest, stream: bool) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": request.model,
        "messages": to_api_messages(&request.messages),
        "stream": stream,
        "temperature": request.temperature,
        "top_p": request.top_p,
        "n": 1,
    });

    if !request.tools.is_empty() {
        body["tools"] = serde_json::json!(to_api_tools(&request.tools));
        body["tool_choice"] = serde_json::json!("auto");
    }
    body
}

// --- Non-streaming response ---

#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse {
    #[serde(default)]
    pub choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiChoice {
    pub message: ApiMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl ApiChoice {
    /// Replay a complete response as one streaming chunk.
    pub fn into_chunk(self) -> StreamChunk {
        let tool_calls = self
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, tc)| ToolCallFragment {
                index: i as u32,
                id: Some(tc.id),
                name: Some(tc.function.name),
                arguments: Some(tc.function.arguments),
            })
            .collect();

        StreamChunk {
            content: self.message.content.filter(|c| !c.is_empty()),
            tool_calls,
            finish_reason: self.finish_reason,
        }
    }
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` record from a streaming response.
#[derive(Debug, Deserialize)]
pub(crate) struct StreamResponse {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StreamChoice {
    #[serde(default)]
    pub delta: StreamDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StreamDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<StreamToolCallDelta>>,
}

/// A tool call delta: arrives incrementally across records.
#[derive(Debug, Deserialize)]
pub(crate) struct StreamToolCallDelta {
    pub index: u32,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StreamFunctionDelta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

impl StreamResponse {
    /// The first choice as a chunk. `None` for records without choices
    /// (usage trailers, keep-alives).
    pub fn into_chunk(self) -> Option<StreamChunk> {
        let choice = self.choices.into_iter().next()?;
        let tool_calls = choice
            .delta
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| {
                let (name, arguments) = match tc.function {
                    Some(f) => (f.name, f.arguments),
                    None => (None, None),
                };
                ToolCallFragment {
                    index: tc.index,
                    id: tc.id,
                    name,
                    arguments,
                }
            })
            .collect();

        Some(StreamChunk {
            content: choice.delta.content,
            tool_calls,
            finish_reason: choice.finish_reason,
        })
    }
}
