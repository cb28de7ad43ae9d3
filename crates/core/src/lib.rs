//! # Loopwright Core
//!
//! Domain types, traits, and error definitions for the Loopwright agent loop.
//! This crate has **no transport or filesystem code**: it defines the model
//! that the provider, tool, and agent crates implement against.
//!
//! ## Design Philosophy
//!
//! Every seam is a trait here. Implementations live in their respective
//! crates:
//! - [`ChatBackend`]: opens one streaming chat round (providers crate)
//! - [`TokenSource`]: yields a bearer credential (providers crate)
//! - [`Tool`]: one named local capability (tools crate)
//!
//! Tests swap any of them for scripted stand-ins.

pub mod auth;
pub mod error;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use auth::{Credential, TokenSource};
pub use error::{Error, ProviderError, Result, ToolError};
pub use message::{Conversation, Message, MessageToolCall, Role};
pub use provider::{ChatBackend, ChatRequest, ChunkStream, StreamChunk, ToolCallFragment, ToolDefinition};
pub use tool::{Tool, ToolRegistry, ToolResult};

/// Cancellation context threaded through every suspending call.
pub use tokio_util::sync::CancellationToken;
