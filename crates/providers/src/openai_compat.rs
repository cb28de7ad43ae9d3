//! OpenAI-compatible chat client.
//!
//! Works with any endpoint that exposes `/chat/completions` with SSE
//! streaming: OpenAI, OpenRouter, Ollama, vLLM, and gateway proxies.
//!
//! Streaming is always attempted first. If the request cannot even be
//! sent (connection refused, open timed out) and fallback is enabled, the
//! same request is retried once without streaming and the full response is
//! replayed as a single chunk.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use loopwright_config::AppConfig;
use loopwright_core::auth::Credential;
use loopwright_core::error::ProviderError;
use loopwright_core::provider::{ChatBackend, ChatRequest, ChunkStream, StreamChunk};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::sse::decode_sse;
use crate::wire::{self, ApiResponse};

/// Settings for [`OpenAiCompatClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub name: String,
    /// Base URL, without `/chat/completions`
    pub base_url: String,
    pub user_agent: String,
    /// Extra client-identification headers
    pub headers: HashMap<String, String>,
    /// Limit on opening a stream, and on a whole non-streaming request
    pub request_timeout: Duration,
    pub fallback_to_non_streaming: bool,
}

impl ClientOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            name: "openai-compat".into(),
            base_url: base_url.into(),
            user_agent: concat!("loopwright/", env!("CARGO_PKG_VERSION")).into(),
            headers: HashMap::new(),
            request_timeout: Duration::from_secs(120),
            fallback_to_non_streaming: true,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            name: "openai-compat".into(),
            base_url: config.api_url.clone(),
            user_agent: config.client.user_agent.clone(),
            headers: config.client.headers.clone(),
            request_timeout: Duration::from_secs(config.client.request_timeout_secs),
            fallback_to_non_streaming: config.client.fallback_to_non_streaming,
        }
    }
}

/// A streaming chat client for OpenAI-compatible endpoints.
pub struct OpenAiCompatClient {
    name: String,
    base_url: String,
    client: reqwest::Client,
    request_timeout: Duration,
    fallback: bool,
}

impl OpenAiCompatClient {
    pub fn new(options: ClientOptions) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        for (key, value) in &options.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| ProviderError::NotConfigured(format!("Invalid header name '{key}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ProviderError::NotConfigured(format!("Invalid value for header '{key}': {e}")))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .user_agent(options.user_agent)
            .default_headers(headers)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            name: options.name,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            client,
            request_timeout: options.request_timeout,
            fallback: options.fallback_to_non_streaming,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        Self::new(ClientOptions::from_config(config))
    }

    fn post(&self, body: &serde_json::Value, credential: &Credential, streaming: bool) -> reqwest::RequestBuilder {
        let accept = if streaming { "text/event-stream" } else { "application/json" };
        self.client
            .post(format!("{}/chat/completions", self.base_url))
            .header(AUTHORIZATION, credential.authorization())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, accept)
            .json(body)
    }

    /// One non-streaming request, returning the first choice as a chunk.
    pub async fn complete(
        &self,
        request: &ChatRequest,
        credential: &Credential,
        cancel: &CancellationToken,
    ) -> Result<StreamChunk, ProviderError> {
        let body = wire::request_body(request, false);
        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let send = self.post(&body, credential, false).timeout(self.request_timeout).send();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            sent = send => sent.map_err(map_reqwest_error)?,
        };
        let response = check_status(response).await?;

        let api_response: ApiResponse = response.json().await.map_err(|e| ProviderError::ApiError {
            status_code: 200,
            message: format!("Failed to parse response: {e}"),
        })?;

        api_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.into_chunk())
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 200,
                message: "No choices in response".into(),
            })
    }
}

#[async_trait]
impl ChatBackend for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream_chat(
        &self,
        request: ChatRequest,
        credential: &Credential,
        cancel: &CancellationToken,
    ) -> Result<ChunkStream, ProviderError> {
        let body = wire::request_body(&request, true);
        debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending streaming request"
        );

        let send = tokio::time::timeout(self.request_timeout, self.post(&body, credential, true).send());
        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(Box::pin(stream::empty())),
            sent = send => sent,
        };

        let opened = match sent {
            Ok(result) => result.map_err(map_reqwest_error),
            Err(_) => Err(ProviderError::Timeout(format!(
                "No response within {}s",
                self.request_timeout.as_secs()
            ))),
        };

        let response = match opened {
            Ok(response) => response,
            Err(err) if self.fallback && err.is_transport() => {
                warn!(provider = %self.name, error = %err, "Stream could not be opened; retrying without streaming");
                let chunk = self.complete(&request, credential, cancel).await?;
                return Ok(Box::pin(stream::once(async move { Ok(chunk) })));
            }
            Err(err) => return Err(err),
        };

        let response = check_status(response).await?;
        Ok(decode_sse(response.bytes_stream(), cancel.clone()))
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

/// Fail with the status and body text on any non-2xx response.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), body = %body, "Provider returned error");
    Err(ProviderError::ApiError {
        status_code: status.as_u16(),
        message: body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use loopwright_core::message::Message;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SSE_BODY: &str = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"},\"finish_reason\":null}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\" there\"},\"finish_reason\":\"stop\"}]}\n\n",
        "data: [DONE]\n\n",
    );

    fn client(server: &MockServer, timeout_secs: u64, fallback: bool) -> OpenAiCompatClient {
        let mut options = ClientOptions::new(format!("{}/v1", server.uri()));
        options.request_timeout = Duration::from_secs(timeout_secs);
        options.fallback_to_non_streaming = fallback;
        options.headers.insert("Editor-Version".into(), "loopwright/test".into());
        OpenAiCompatClient::new(options).unwrap()
    }

    fn request() -> ChatRequest {
        ChatRequest::new("gpt-4o", vec![Message::user("hello")], vec![])
    }

    #[tokio::test]
    async fn streams_chunks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(header("editor-version", "loopwright/test"))
            .and(body_partial_json(serde_json::json!({"stream": true, "n": 1, "model": "gpt-4o"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(SSE_BODY),
            )
            .mount(&server)
            .await;

        let client = client(&server, 5, true);
        let stream = client
            .stream_chat(request(), &Credential::bearer("sk-test"), &CancellationToken::new())
            .await
            .unwrap();
        let chunks: Vec<_> = stream.collect().await;
        let text: String = chunks
            .iter()
            .filter_map(|c| c.as_ref().unwrap().content.clone())
            .collect();
        assert_eq!(text, "Hi there");
    }

    #[tokio::test]
    async fn non_success_fails_before_any_chunk() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let client = client(&server, 5, true);
        let err = client
            .stream_chat(request(), &Credential::bearer("sk-test"), &CancellationToken::new())
            .await
            .err()
            .unwrap();
        match err {
            ProviderError::ApiError { status_code, message } => {
                assert_eq!(status_code, 429);
                assert_eq!(message, "slow down");
            }
            other => panic!("expected ApiError, got {other}"),
        }
    }

    #[tokio::test]
    async fn falls_back_when_stream_cannot_open() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"stream": true})))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{
                    "message": {"role": "assistant", "content": "from fallback"},
                    "finish_reason": "stop"
                }]
            })))
            .mount(&server)
            .await;

        let client = client(&server, 1, true);
        let chunks: Vec<_> = client
            .stream_chat(request(), &Credential::bearer("sk-test"), &CancellationToken::new())
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_ref().unwrap().content.as_deref(), Some("from fallback"));
    }

    #[tokio::test]
    async fn no_fallback_when_disabled() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let client = client(&server, 1, false);
        let err = client
            .stream_chat(request(), &Credential::bearer("sk-test"), &CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ProviderError::Timeout(_)));
    }

    #[tokio::test]
    async fn cancelled_before_open_yields_empty_stream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let client = client(&server, 5, true);
        let chunks: Vec<_> = client
            .stream_chat(request(), &Credential::bearer("sk-test"), &cancel)
            .await
            .unwrap()
            .collect()
            .await;
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn complete_without_choices_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
            .mount(&server)
            .await;

        let client = client(&server, 5, true);
        let err = client
            .complete(&request(), &Credential::bearer("sk-test"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No choices"));
    }

    #[test]
    fn invalid_header_is_configuration_error() {
        let mut options = ClientOptions::new("http://localhost");
        options.headers.insert("bad header".into(), "x".into());
        assert!(matches!(
            OpenAiCompatClient::new(options),
            Err(ProviderError::NotConfigured(_))
        ));
    }

    #[test]
    fn options_from_config() {
        let mut config = AppConfig::default();
        config.api_url = "https://models.example.com/v1/".into();
        config.client.fallback_to_non_streaming = false;
        let options = ClientOptions::from_config(&config);
        assert!(!options.fallback_to_non_streaming);
        let client = OpenAiCompatClient::new(options).unwrap();
        assert_eq!(client.base_url, "https://models.example.com/v1");
    }
}
