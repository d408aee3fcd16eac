//! Resilient client for OpenAI-compatible chat completion endpoints.
//!
//! [`RemoteCallClient::call`] retries failed requests with exponential
//! backoff and, once the retry budget is spent, re-issues the request a
//! single time against the configured fallback model.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use openai::chat::{ChatCompletionMessage, ChatCompletionMessageRole};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::config::Settings;

pub fn msg(role: ChatCompletionMessageRole, txt: &str) -> ChatCompletionMessage {
    ChatCompletionMessage {
        role,
        content: Some(txt.to_string()),
        ..Default::default()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PromptError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("response contained no message content")]
    EmptyResponse,
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,
    #[error("http client error: {0}")]
    Client(String),
}

impl PromptError {
    /// Configuration problems fail fast; everything else is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, PromptError::MissingApiKey | PromptError::Client(_))
    }
}

/// Per-request knobs forwarded to the remote service.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallOptions {
    pub json_mode: bool,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl CallOptions {
    pub fn text(temperature: f32) -> Self {
        Self {
            json_mode: false,
            temperature,
            max_tokens: None,
        }
    }

    pub fn json(temperature: f32) -> Self {
        Self {
            json_mode: true,
            temperature,
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatCompletionMessage>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

impl ChatRequest {
    pub fn new(model: &str, messages: &[ChatCompletionMessage], options: CallOptions) -> Self {
        Self {
            model: model.to_string(),
            messages: messages.to_vec(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            response_format: options.json_mode.then(|| ResponseFormat {
                kind: "json_object".into(),
            }),
        }
    }

    pub fn is_json_mode(&self) -> bool {
        self.response_format.is_some()
    }
}

/// One round-trip to a chat completion service, without retries.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<String, PromptError>;
}

// `openai::chat::ChatCompletion` requires `id`, `created` and `usage`, which
// compatible gateways and mocked endpoints may leave out; only the content is read.
#[derive(Deserialize)]
struct ChatCompletionBody {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP transport for `{base}/v1/chat/completions`.
pub struct OpenAiTransport {
    client: reqwest::Client,
    base: String,
    api_key: String,
}

impl OpenAiTransport {
    pub fn new(base: &str, api_key: &str, timeout: Duration) -> Result<Self, PromptError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PromptError::Client(e.to_string()))?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, PromptError> {
        Self::new(
            &settings.openai_api_base,
            &settings.openai_api_key,
            settings.request_timeout(),
        )
    }

    /// Reads `OPENAI_API_KEY` and `OPENAI_API_BASE` directly from the process environment.
    pub fn from_env(timeout: Duration) -> Result<Self, PromptError> {
        let key = std::env::var("OPENAI_API_KEY").map_err(|_| PromptError::MissingApiKey)?;
        let base =
            std::env::var("OPENAI_API_BASE").unwrap_or_else(|_| "https://api.openai.com".into());
        Self::new(&base, &key, timeout)
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base)
    }
}

#[async_trait]
impl ChatTransport for OpenAiTransport {
    async fn complete(&self, request: &ChatRequest) -> Result<String, PromptError> {
        if self.api_key.trim().is_empty() {
            return Err(PromptError::MissingApiKey);
        }

        debug!(
            model = %request.model,
            json_mode = request.is_json_mode(),
            "\u{2192} OpenAI request"
        );
        let res = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!("network error to OpenAI: {e}");
                if e.is_timeout() {
                    PromptError::Network(format!("timeout: {e}"))
                } else {
                    PromptError::Network(e.to_string())
                }
            })?;

        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .map_err(|e| PromptError::Network(e.to_string()))?;
        debug!(
            status = %status,
            "\u{2190} body = {}",
            String::from_utf8_lossy(&bytes[..bytes.len().min(1024)])
        );

        if !status.is_success() {
            return Err(PromptError::Http {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        let body: ChatCompletionBody = serde_json::from_slice(&bytes)?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(PromptError::EmptyResponse)
    }
}

/// Exponential backoff bounded by an attempt count and an elapsed-time ceiling.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub max_elapsed: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            max_elapsed: Duration::from_secs(60),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(retry))
            .min(self.max_backoff)
    }
}

/// Which model a request is currently aimed at. A substituted request never
/// falls back again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelRoute {
    Primary { allow_substitution: bool },
    Substituted,
}

#[derive(Clone)]
pub struct RemoteCallClient {
    transport: Arc<dyn ChatTransport>,
    retry: RetryPolicy,
    fallback_model: String,
    request_timeout: Duration,
}

impl RemoteCallClient {
    pub fn new(transport: Arc<dyn ChatTransport>, fallback_model: impl Into<String>) -> Self {
        Self {
            transport,
            retry: RetryPolicy::default(),
            fallback_model: fallback_model.into(),
            request_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn fallback_model(&self) -> &str {
        &self.fallback_model
    }

    /// Send `messages` to `model` and return the assistant's answer.
    pub async fn call(
        &self,
        messages: &[ChatCompletionMessage],
        model: &str,
        options: CallOptions,
    ) -> Result<String, PromptError> {
        let route = ModelRoute::Primary {
            allow_substitution: model != self.fallback_model,
        };
        self.call_routed(messages, model, options, route).await
    }

    pub async fn call_routed(
        &self,
        messages: &[ChatCompletionMessage],
        model: &str,
        options: CallOptions,
        mut route: ModelRoute,
    ) -> Result<String, PromptError> {
        let mut request = ChatRequest::new(model, messages, options);
        loop {
            match self.call_with_retries(&request).await {
                Ok(answer) => return Ok(answer),
                Err(e) => match route {
                    ModelRoute::Primary {
                        allow_substitution: true,
                    } if e.is_retryable() => {
                        warn!(
                            model = %request.model,
                            fallback = %self.fallback_model,
                            "retries exhausted ({e}), substituting fallback model"
                        );
                        request.model = self.fallback_model.clone();
                        route = ModelRoute::Substituted;
                    }
                    _ => return Err(e),
                },
            }
        }
    }

    async fn call_with_retries(&self, request: &ChatRequest) -> Result<String, PromptError> {
        let started = Instant::now();
        let mut last_err: Option<PromptError> = None;

        for attempt in 0..self.retry.max_attempts {
            if attempt > 0 {
                let wait = self.retry.backoff(attempt - 1);
                if started.elapsed() + wait > self.retry.max_elapsed {
                    warn!(
                        model = %request.model,
                        attempt,
                        "retry window of {:?} exhausted",
                        self.retry.max_elapsed
                    );
                    break;
                }
                tokio::time::sleep(wait).await;
            }

            let res = tokio::time::timeout(self.request_timeout, self.transport.complete(request))
                .await;
            match res {
                Ok(Ok(answer)) => return Ok(answer),
                Ok(Err(e)) if !e.is_retryable() => return Err(e),
                Ok(Err(e)) => {
                    warn!(model = %request.model, attempt = attempt + 1, "remote call failed: {e}");
                    last_err = Some(e);
                }
                Err(_) => {
                    warn!(model = %request.model, attempt = attempt + 1, "remote call timed out");
                    last_err = Some(PromptError::Timeout(self.request_timeout));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| PromptError::Network("no attempt was made".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed list of answers and records the model of every request.
    struct ScriptedTransport {
        answers: Mutex<VecDeque<Result<String, PromptError>>>,
        models: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(answers: Vec<Result<String, PromptError>>) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers.into()),
                models: Mutex::new(Vec::new()),
            })
        }

        fn models(&self) -> Vec<String> {
            self.models.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn complete(&self, request: &ChatRequest) -> Result<String, PromptError> {
            self.models.lock().unwrap().push(request.model.clone());
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(PromptError::Http { status: 500, body: "down".into() }))
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            max_elapsed: Duration::from_secs(60),
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
        }
    }

    fn user(text: &str) -> Vec<ChatCompletionMessage> {
        vec![msg(ChatCompletionMessageRole::User, text)]
    }

    fn server_error() -> Result<String, PromptError> {
        Err(PromptError::Http {
            status: 503,
            body: "busy".into(),
        })
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(8));
        assert_eq!(policy.backoff(10), Duration::from_secs(30));
    }

    #[test]
    fn json_mode_sets_response_format() {
        let req = ChatRequest::new("m", &user("hi"), CallOptions::json(0.0));
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["response_format"]["type"], "json_object");
        assert!(body.get("max_tokens").is_none());

        let req = ChatRequest::new("m", &user("hi"), CallOptions::text(0.2).with_max_tokens(900));
        let body = serde_json::to_value(&req).unwrap();
        assert!(body.get("response_format").is_none());
        assert_eq!(body["max_tokens"], 900);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let transport = ScriptedTransport::new(vec![server_error(), server_error(), Ok("ok".into())]);
        let client = RemoteCallClient::new(transport.clone(), "heavy").with_retry_policy(fast_retry());
        let answer = client
            .call(&user("hi"), "light", CallOptions::text(0.0))
            .await
            .unwrap();
        assert_eq!(answer, "ok");
        assert_eq!(transport.models(), vec!["light", "light", "light"]);
    }

    #[tokio::test]
    async fn substitutes_fallback_once_after_exhaustion() {
        let mut answers: Vec<_> = (0..5).map(|_| server_error()).collect();
        answers.push(Ok("rescued".into()));
        let transport = ScriptedTransport::new(answers);
        let client = RemoteCallClient::new(transport.clone(), "heavy").with_retry_policy(fast_retry());
        let answer = client
            .call(&user("hi"), "light", CallOptions::json(0.1))
            .await
            .unwrap();
        assert_eq!(answer, "rescued");
        let models = transport.models();
        assert_eq!(models.len(), 6);
        assert!(models[..5].iter().all(|m| m == "light"));
        assert_eq!(models[5], "heavy");
    }

    #[tokio::test]
    async fn fallback_failure_propagates_without_second_substitution() {
        let transport = ScriptedTransport::new(vec![]);
        let client = RemoteCallClient::new(transport.clone(), "heavy").with_retry_policy(fast_retry());
        let err = client
            .call(&user("hi"), "light", CallOptions::text(0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, PromptError::Http { status: 500, .. }));
        let models = transport.models();
        assert_eq!(models.len(), 10);
        assert_eq!(models.iter().filter(|m| *m == "heavy").count(), 5);
    }

    #[tokio::test]
    async fn request_already_on_fallback_never_substitutes() {
        let transport = ScriptedTransport::new(vec![]);
        let client = RemoteCallClient::new(transport.clone(), "heavy").with_retry_policy(fast_retry());
        assert!(client
            .call(&user("hi"), "heavy", CallOptions::text(0.0))
            .await
            .is_err());
        assert_eq!(transport.models().len(), 5);
    }

    #[tokio::test]
    async fn substituted_route_is_terminal() {
        let transport = ScriptedTransport::new(vec![]);
        let client = RemoteCallClient::new(transport.clone(), "heavy").with_retry_policy(fast_retry());
        assert!(client
            .call_routed(&user("hi"), "light", CallOptions::text(0.0), ModelRoute::Substituted)
            .await
            .is_err());
        assert_eq!(transport.models(), vec!["light"; 5]);
    }

    #[tokio::test]
    async fn missing_key_fails_fast() {
        let transport = ScriptedTransport::new(vec![Err(PromptError::MissingApiKey)]);
        let client = RemoteCallClient::new(transport.clone(), "heavy").with_retry_policy(fast_retry());
        let err = client
            .call(&user("hi"), "light", CallOptions::text(0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, PromptError::MissingApiKey));
        assert_eq!(transport.models().len(), 1);
    }

    #[tokio::test]
    async fn elapsed_ceiling_stops_retries_early() {
        let transport = ScriptedTransport::new(vec![]);
        let policy = RetryPolicy {
            max_attempts: 5,
            max_elapsed: Duration::from_millis(30),
            initial_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_secs(1),
        };
        let client = RemoteCallClient::new(transport.clone(), "heavy").with_retry_policy(policy);
        let _ = client
            .call_routed(&user("hi"), "light", CallOptions::text(0.0), ModelRoute::Substituted)
            .await;
        // 0ms, then +20ms; the next 40ms wait would cross the 30ms ceiling.
        assert_eq!(transport.models().len(), 2);
    }
}
