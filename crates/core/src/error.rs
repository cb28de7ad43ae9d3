//! Error types for the Loopwright domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use thiserror::Error;

/// The top-level error type for all Loopwright operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures talking to the chat endpoint or the credential exchange.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Whether this error happened before any response was received.
    ///
    /// Only these failures are eligible for the non-streaming retry.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }

    /// Whether the failure concerns credentials rather than the network.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_) | Self::NotConfigured(_))
    }
}

/// Failures inside a single tool invocation.
///
/// These never escape the tool executor; they are rendered into an
/// error-flagged tool result.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    NotFound(String),

    #[error("{tool_name} failed: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Command timed out after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Permission denied for {tool_name}: {reason}")]
    PermissionDenied { tool_name: String, reason: String },

    #[error("Path traversal denied: {0}")]
    SandboxViolation(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn tool_error_displays_correctly() {
        let err = Error::Tool(ToolError::PermissionDenied {
            tool_name: "bash".into(),
            reason: "command matches denylist".into(),
        });
        assert!(err.to_string().contains("bash"));
        assert!(err.to_string().contains("denylist"));
    }

    #[test]
    fn transport_classification() {
        assert!(ProviderError::Network("refused".into()).is_transport());
        assert!(ProviderError::Timeout("slow".into()).is_transport());
        assert!(!ProviderError::StreamInterrupted("eof".into()).is_transport());
        assert!(
            !ProviderError::ApiError {
                status_code: 500,
                message: String::new()
            }
            .is_transport()
        );
    }

    #[test]
    fn auth_classification() {
        assert!(ProviderError::AuthenticationFailed("bad".into()).is_auth());
        assert!(!ProviderError::Network("x".into()).is_auth());
    }
}
