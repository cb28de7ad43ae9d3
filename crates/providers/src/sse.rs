//! Server-Sent-Events decoding for streaming chat responses.
//!
//! The response body is split into lines; only `data:` lines are parsed, a
//! `[DONE]` record ends the stream, and garbled records are skipped.

use futures::{Stream, StreamExt};
use loopwright_core::error::ProviderError;
use loopwright_core::provider::{ChunkStream, StreamChunk};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::wire::StreamResponse;

/// What a single line of the body means.
#[derive(Debug, PartialEq)]
pub(crate) enum SseLine {
    /// Blank, comment, non-data field, malformed, or choice-less record
    Skip,
    /// The terminal sentinel
    Done,
    Chunk(StreamChunk),
}

/// Interpret one line (without its terminator).
pub(crate) fn parse_line(line: &str) -> SseLine {
    let line = line.trim_end_matches('\r');
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();

    if data == "[DONE]" {
        return SseLine::Done;
    }
    if data.is_empty() {
        return SseLine::Skip;
    }

    match serde_json::from_str::<StreamResponse>(data) {
        Ok(record) => record.into_chunk().map_or(SseLine::Skip, SseLine::Chunk),
        Err(e) => {
            trace!(data = %data, error = %e, "Ignoring unparseable SSE record");
            SseLine::Skip
        }
    }
}

/// Decode a raw byte stream into chunks.
///
/// The returned stream ends at `[DONE]`, at the end of the body, or as soon
/// as `cancel` fires (without an error in that case). A transport error
/// while reading ends it with [`ProviderError::StreamInterrupted`].
pub fn decode_sse<S, B, E>(body: S, cancel: CancellationToken) -> ChunkStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: std::fmt::Display + Send,
{
    Box::pin(async_stream::stream! {
        let mut body = Box::pin(body);
        let mut buffer: Vec<u8> = Vec::new();

        'read: loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    trace!("SSE stream cancelled");
                    break 'read;
                }
                next = body.next() => next,
            };

            let bytes = match next {
                Some(Ok(bytes)) => bytes,
                Some(Err(e)) => {
                    yield Err(ProviderError::StreamInterrupted(e.to_string()));
                    break 'read;
                }
                None => break 'read,
            };
            buffer.extend_from_slice(bytes.as_ref());

            // Lines are split on raw bytes so multi-byte characters that
            // straddle reads are never cut in half.
            while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line[..line.len() - 1]);
                match parse_line(&line) {
                    SseLine::Skip => {}
                    SseLine::Done => break 'read,
                    SseLine::Chunk(chunk) => {
                        if cancel.is_cancelled() {
                            break 'read;
                        }
                        yield Ok(chunk);
                    }
                }
            }
        }

        // A final record without a trailing newline.
        if !buffer.is_empty() && !cancel.is_cancelled() {
            let line = String::from_utf8_lossy(&buffer).into_owned();
            if let SseLine::Chunk(chunk) = parse_line(&line) {
                yield Ok(chunk);
            }
        }
    })
}
