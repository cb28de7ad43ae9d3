//! Bearer credential sources.
//!
//! [`StaticTokenSource`] serves a plain API key. [`ExchangeTokenProvider`]
//! trades a long-lived secret for short-lived bearer tokens and caches each
//! one until it is within [`EXPIRY_BUFFER_SECS`] of expiring.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loopwright_config::AppConfig;
use loopwright_core::auth::{Credential, TokenSource};
use loopwright_core::error::ProviderError;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A cached token is refreshed once it is this close to expiry.
pub const EXPIRY_BUFFER_SECS: i64 = 5 * 60;

/// A credential that never expires.
pub struct StaticTokenSource {
    credential: Credential,
}

impl StaticTokenSource {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            credential: Credential::bearer(api_key),
        }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn get_token(&self, _cancel: &CancellationToken) -> Result<Credential, ProviderError> {
        Ok(self.credential.clone())
    }
}

/// Trades a long-lived secret for a short-lived bearer credential.
#[async_trait]
pub trait CredentialExchange: Send + Sync {
    async fn exchange(&self, secret: &str) -> Result<Credential, ProviderError>;
}

/// Response of the token exchange endpoint.
#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    token: String,
    /// Unix seconds
    expires_at: i64,
}

/// `GET <url>` with `Authorization: token <secret>`, answered by
/// `{"token": "...", "expires_at": <unix seconds>}`.
pub struct HttpCredentialExchange {
    url: String,
    client: reqwest::Client,
}

impl HttpCredentialExchange {
    pub fn new(url: impl Into<String>, user_agent: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { url: url.into(), client })
    }
}

#[async_trait]
impl CredentialExchange for HttpCredentialExchange {
    async fn exchange(&self, secret: &str) -> Result<Credential, ProviderError> {
        let response = self
            .client
            .get(&self.url)
            .header(AUTHORIZATION, format!("token {secret}"))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ProviderError::AuthenticationFailed(format!("Token exchange failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::AuthenticationFailed(format!(
                "Token exchange returned {}: {body}",
                status.as_u16()
            )));
        }

        let parsed: ExchangeResponse = response.json().await.map_err(|e| {
            ProviderError::AuthenticationFailed(format!("Malformed token exchange response: {e}"))
        })?;
        let expires_at = DateTime::<Utc>::from_timestamp(parsed.expires_at, 0).ok_or_else(|| {
            ProviderError::AuthenticationFailed(format!("Invalid expiry timestamp {}", parsed.expires_at))
        })?;

        Ok(Credential::expiring(parsed.token, expires_at))
    }
}

#[derive(Default)]
struct CacheState {
    secret: Option<String>,
    cached: Option<Credential>,
    /// Bumped whenever the secret changes so a refresh that raced with
    /// `set_secret` does not repopulate the cache with a stale token.
    generation: u64,
}

/// Caching token provider backed by a [`CredentialExchange`].
pub struct ExchangeTokenProvider {
    exchange: Arc<dyn CredentialExchange>,
    state: Mutex<CacheState>,
    buffer: chrono::Duration,
}

impl ExchangeTokenProvider {
    pub fn new(exchange: Arc<dyn CredentialExchange>, secret: Option<String>) -> Self {
        Self {
            exchange,
            state: Mutex::new(CacheState {
                secret,
                ..CacheState::default()
            }),
            buffer: chrono::Duration::seconds(EXPIRY_BUFFER_SECS),
        }
    }

    /// Replace the long-lived secret. The cached token is dropped at once.
    pub fn set_secret(&self, secret: Option<String>) {
        let mut state = self.lock();
        state.secret = secret;
        state.cached = None;
        state.generation += 1;
        info!("Token secret updated; cached credential invalidated");
    }

    pub fn has_secret(&self) -> bool {
        self.lock().secret.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl TokenSource for ExchangeTokenProvider {
    async fn get_token(&self, cancel: &CancellationToken) -> Result<Credential, ProviderError> {
        let (secret, generation) = {
            let state = self.lock();
            if let Some(cached) = &state.cached
                && !cached.expires_within(self.buffer, Utc::now())
            {
                return Ok(cached.clone());
            }
            let secret = state
                .secret
                .clone()
                .ok_or_else(|| ProviderError::NotConfigured("No secret available for token exchange".into()))?;
            (secret, state.generation)
        };

        debug!("Refreshing bearer credential");
        let credential = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            result = self.exchange.exchange(&secret) => result,
        }
        .inspect_err(|e| warn!(error = %e, "Credential refresh failed"))?;

        let mut state = self.lock();
        if state.generation == generation {
            state.cached = Some(credential.clone());
        }
        Ok(credential)
    }
}

/// Pick the credential source configured in `config`.
///
/// A secret with an exchange URL wins over a plain API key.
pub fn token_source_from_config(config: &AppConfig) -> Result<Arc<dyn TokenSource>, ProviderError> {
    let auth = &config.auth;
    if let (Some(secret), Some(url)) = (&auth.secret, &auth.exchange_url) {
        let exchange = HttpCredentialExchange::new(
            url.clone(),
            &config.client.user_agent,
            Duration::from_secs(config.client.request_timeout_secs),
        )?;
        info!(url = %url, "Using token exchange credentials");
        return Ok(Arc::new(ExchangeTokenProvider::new(
            Arc::new(exchange),
            Some(secret.clone()),
        )));
    }
    match &auth.api_key {
        Some(key) => Ok(Arc::new(StaticTokenSource::new(key.clone()))),
        None => Err(ProviderError::NotConfigured(
            "No API key or exchange secret configured".into(),
        )),
    }
}
