//! Agent-level streaming events.
//!
//! `AgentEvent` is what the caller of [`crate::AgentLoop::send`] observes:
//! live text, tool progress, and a single terminal `done` or `error`.

use serde::{Deserialize, Serialize};

/// Events emitted by the agent loop during one `send`.
///
/// - `text_delta`: a fragment of model text, forwarded immediately
/// - `text_done`: the full text of a round, after its last delta
/// - `tool_start`: a tool is about to run
/// - `tool_input_progress`: more argument bytes arrived for a pending call
/// - `tool_result`: a tool finished
/// - `error`: the turn failed
/// - `done`: the turn completed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    TextDelta { content: String },

    TextDone { text: String },

    ToolStart {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    /// Only emitted when `agent.emit_tool_input_progress` is on.
    ToolInputProgress {
        index: u32,
        name: String,
        arguments_len: usize,
    },

    ToolResult {
        id: String,
        name: String,
        content: String,
        is_error: bool,
    },

    Error { message: String },

    /// `rounds` is the number of chat rounds the turn used.
    Done { rounds: u32 },
}

impl AgentEvent {
    /// Wire name of this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TextDelta { .. } => "text_delta",
            Self::TextDone { .. } => "text_done",
            Self::ToolStart { .. } => "tool_start",
            Self::ToolInputProgress { .. } => "tool_input_progress",
            Self::ToolResult { .. } => "tool_result",
            Self::Error { .. } => "error",
            Self::Done { .. } => "done",
        }
    }

    /// True for the events that end a turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_delta_serialization() {
        let event = AgentEvent::TextDelta {
            content: "Hello".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"text_delta""#));
        assert!(json.contains(r#""content":"Hello""#));
    }

    #[test]
    fn tool_start_serialization() {
        let event = AgentEvent::ToolStart {
            id: "call_1".into(),
            name: "glob".into(),
            input: serde_json::json!({"pattern": "**/*.rs"}),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"tool_start""#));
        assert!(json.contains(r#""name":"glob""#));
    }

    #[test]
    fn tool_result_serialization() {
        let event = AgentEvent::ToolResult {
            id: "call_1".into(),
            name: "bash".into(),
            content: "Command blocked: recursive deletion of / or home".into(),
            is_error: true,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "tool_result");
        assert_eq!(json["is_error"], true);
    }

    #[test]
    fn done_deserialization() {
        let event: AgentEvent = serde_json::from_str(r#"{"type":"done","rounds":3}"#).unwrap();
        assert_eq!(event, AgentEvent::Done { rounds: 3 });
        assert!(event.is_terminal());
    }

    #[test]
    fn event_type_names() {
        let events = [
            (AgentEvent::TextDone { text: "x".into() }, "text_done"),
            (
                AgentEvent::ToolInputProgress {
                    index: 0,
                    name: "grep".into(),
                    arguments_len: 4,
                },
                "tool_input_progress",
            ),
            (AgentEvent::Error { message: "x".into() }, "error"),
            (AgentEvent::Done { rounds: 1 }, "done"),
        ];
        for (event, name) in events {
            assert_eq!(event.event_type(), name);
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["type"], name);
        }
        assert!(!AgentEvent::TextDelta { content: "x".into() }.is_terminal());
    }
}
