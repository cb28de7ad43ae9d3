//! Bearer credentials and the token source trait.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;

/// A short-lived bearer credential presented to the chat endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// The bearer value
    pub value: String,

    /// When the credential stops being valid. `None` = never.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// A credential that never expires (plain API key).
    pub fn bearer(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            expires_at: None,
        }
    }

    pub fn expiring(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at: Some(expires_at),
        }
    }

    /// True when the credential expires within `buffer` of `now`.
    pub fn expires_within(&self, buffer: Duration, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(at) => at - buffer <= now,
            None => false,
        }
    }

    /// Value of the `Authorization` header.
    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.value)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Something that can hand out a valid bearer credential.
///
/// Consulted before every round; implementations cache and refresh as they
/// see fit.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn get_token(&self, cancel: &CancellationToken) -> Result<Credential, ProviderError>;
}
