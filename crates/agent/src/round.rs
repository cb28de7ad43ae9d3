//! Round accumulation.
//!
//! One round is one streamed model response. Text fragments are forwarded
//! the moment they arrive; tool call fragments are buffered by their
//! positional index until the stream ends, then emitted in index order.

use std::collections::BTreeMap;

use futures::StreamExt;
use loopwright_core::message::MessageToolCall;
use loopwright_core::provider::{ChunkStream, StreamChunk, ToolCallFragment};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::stream_event::AgentEvent;

/// The value one round produces.
///
/// `error` and a non-empty `tool_calls` never occur together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundResult {
    pub text: String,
    /// Ordered by positional index
    pub tool_calls: Vec<MessageToolCall>,
    pub error: Option<String>,
    pub aborted: bool,
}

#[derive(Debug, Default)]
struct CallBuilder {
    id: Option<String>,
    name: String,
    arguments: String,
}

/// In-progress state of one round.
#[derive(Debug, Default)]
pub struct RoundAccumulator {
    text: String,
    calls: BTreeMap<u32, CallBuilder>,
}

impl RoundAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one chunk in, reporting what became observable.
    pub fn apply(&mut self, chunk: StreamChunk, emit: &mut impl FnMut(AgentEvent)) {
        if let Some(content) = chunk.content
            && !content.is_empty()
        {
            self.text.push_str(&content);
            emit(AgentEvent::TextDelta { content });
        }

        for fragment in chunk.tool_calls {
            self.merge(fragment, emit);
        }
    }

    fn merge(&mut self, fragment: ToolCallFragment, emit: &mut impl FnMut(AgentEvent)) {
        let call = self.calls.entry(fragment.index).or_default();

        if call.id.is_none()
            && let Some(id) = fragment.id.filter(|id| !id.is_empty())
        {
            call.id = Some(id);
        }
        if let Some(name) = fragment.name.filter(|n| !n.is_empty()) {
            call.name = name;
        }
        if let Some(slice) = fragment.arguments.filter(|a| !a.is_empty()) {
            call.arguments.push_str(&slice);
            emit(AgentEvent::ToolInputProgress {
                index: fragment.index,
                name: call.name.clone(),
                arguments_len: call.arguments.len(),
            });
        }
    }

    /// Text accumulated so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The stream ended normally.
    pub fn finish(self) -> RoundResult {
        let stamp = chrono::Utc::now().timestamp_millis();
        let tool_calls = self
            .calls
            .into_iter()
            .map(|(index, call)| MessageToolCall {
                id: call.id.unwrap_or_else(|| format!("call_{index}_{stamp}")),
                name: call.name,
                arguments: call.arguments,
            })
            .collect();

        RoundResult {
            text: self.text,
            tool_calls,
            error: None,
            aborted: false,
        }
    }

    /// The stream failed; partial tool calls are dropped.
    pub fn fail(self, error: impl Into<String>) -> RoundResult {
        RoundResult {
            text: self.text,
            tool_calls: Vec::new(),
            error: Some(error.into()),
            aborted: false,
        }
    }

    /// The round was cancelled.
    pub fn abort(self) -> RoundResult {
        RoundResult {
            text: self.text,
            tool_calls: Vec::new(),
            error: None,
            aborted: true,
        }
    }
}

/// Drain `stream` into a [`RoundResult`].
///
/// Nothing is emitted once `cancel` has fired. A stream error after
/// cancellation counts as an abort, not a failure.
pub async fn run_round(
    mut stream: ChunkStream,
    cancel: &CancellationToken,
    mut emit: impl FnMut(AgentEvent),
) -> RoundResult {
    let mut acc = RoundAccumulator::new();
    let mut chunks = 0usize;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return acc.abort(),
            next = stream.next() => next,
        };

        match next {
            Some(Ok(chunk)) => {
                if cancel.is_cancelled() {
                    return acc.abort();
                }
                chunks += 1;
                trace!(chunk = chunks, "Applying chunk");
                acc.apply(chunk, &mut emit);
            }
            Some(Err(e)) => {
                if cancel.is_cancelled() {
                    return acc.abort();
                }
                debug!(error = %e, chunks, "Round stream failed");
                return acc.fail(e.to_string());
            }
            None => {
                if cancel.is_cancelled() {
                    return acc.abort();
                }
                let result = acc.finish();
                debug!(chunks, tool_calls = result.tool_calls.len(), "Round complete");
                return result;
            }
        }
    }
}
