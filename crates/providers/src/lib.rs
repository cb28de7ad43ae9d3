//! Chat backends and credential sources for Loopwright.
//!
//! [`OpenAiCompatClient`] implements `loopwright_core::ChatBackend` against
//! any OpenAI-compatible `/chat/completions` endpoint. Credentials come from
//! a `TokenSource`: a static API key or a cached secret exchange.

pub mod openai_compat;
pub mod sse;
pub mod token;
mod wire;

pub use openai_compat::{ClientOptions, OpenAiCompatClient};
pub use sse::decode_sse;
pub use token::{
    CredentialExchange, EXPIRY_BUFFER_SECS, ExchangeTokenProvider, HttpCredentialExchange, StaticTokenSource,
    token_source_from_config,
};
