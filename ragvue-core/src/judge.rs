//! Judge client: the LLM provider abstraction used by every metric.
//!
//! Defines the `LlmProvider` trait for model-agnostic judge calls, the
//! [`Judge`] handle metrics use to talk to it, and a scriptable
//! [`MockLlmProvider`] for tests and offline runs.

use crate::config::{JudgeConfig, RetryConfig};
use crate::error::LlmError;
use crate::providers;
use crate::types::{CompletionRequest, CompletionResponse, Message, TokenUsage};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Trait for judge model providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Perform a full completion and return the response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Return the default model name.
    fn model_name(&self) -> &str;
}

/// Running totals across every judge call made through a [`Judge`].
#[derive(Debug, Default)]
struct UsageCounters {
    calls: AtomicUsize,
    input_tokens: AtomicUsize,
    output_tokens: AtomicUsize,
}

/// Snapshot of judge usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JudgeUsage {
    pub calls: usize,
    pub tokens: TokenUsage,
}

/// Shared handle to a judge provider with retry handling.
///
/// Cloning is cheap; clones share the provider and usage counters.
#[derive(Clone)]
pub struct Judge {
    provider: Arc<dyn LlmProvider>,
    retry: RetryConfig,
    max_tokens: Option<usize>,
    usage: Arc<UsageCounters>,
}

impl std::fmt::Debug for Judge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Judge")
            .field("model", &self.provider.model_name())
            .field("retry", &self.retry)
            .finish()
    }
}

impl Judge {
    pub fn new(provider: Arc<dyn LlmProvider>, retry: RetryConfig) -> Self {
        Self {
            provider,
            retry,
            max_tokens: None,
            usage: Arc::new(UsageCounters::default()),
        }
    }

    /// Build a judge from configuration, creating the configured provider.
    pub fn from_config(config: &JudgeConfig) -> Result<Self, LlmError> {
        let provider = providers::create_provider(config)?;
        Ok(Self::new(provider, config.retry.clone()).with_max_tokens(config.max_tokens))
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<usize>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// The provider's default model.
    pub fn default_model(&self) -> &str {
        self.provider.model_name()
    }

    /// Send `messages` and return the reply text. Transient errors are retried.
    pub async fn chat(
        &self,
        messages: Vec<Message>,
        model: &str,
        temperature: f32,
        json_mode: bool,
    ) -> Result<String, LlmError> {
        let request = CompletionRequest {
            messages,
            temperature,
            max_tokens: self.max_tokens,
            model: Some(model.to_string()),
            json_mode,
        };
        debug!(model = %model, temperature, json_mode, "Sending judge request");

        let response = providers::with_retry(&self.retry, || {
            let provider = Arc::clone(&self.provider);
            let request = request.clone();
            async move { provider.complete(request).await }
        })
        .await?;

        self.usage.calls.fetch_add(1, Ordering::Relaxed);
        self.usage
            .input_tokens
            .fetch_add(response.usage.input_tokens, Ordering::Relaxed);
        self.usage
            .output_tokens
            .fetch_add(response.usage.output_tokens, Ordering::Relaxed);

        Ok(response.text)
    }

    /// System + user prompt, reply constrained to a JSON object.
    pub async fn chat_json(
        &self,
        system: &str,
        user: &str,
        model: &str,
        temperature: f32,
    ) -> Result<String, LlmError> {
        self.chat(
            vec![Message::system(system), Message::user(user)],
            model,
            temperature,
            true,
        )
        .await
    }

    /// System + user prompt, free-form reply.
    pub async fn chat_text(
        &self,
        system: &str,
        user: &str,
        model: &str,
        temperature: f32,
    ) -> Result<String, LlmError> {
        self.chat(
            vec![Message::system(system), Message::user(user)],
            model,
            temperature,
            false,
        )
        .await
    }

    pub fn usage(&self) -> JudgeUsage {
        JudgeUsage {
            calls: self.usage.calls.load(Ordering::Relaxed),
            tokens: TokenUsage {
                input_tokens: self.usage.input_tokens.load(Ordering::Relaxed),
                output_tokens: self.usage.output_tokens.load(Ordering::Relaxed),
            },
        }
    }
}

type Responder = dyn Fn(&CompletionRequest) -> Result<String, LlmError> + Send + Sync;

/// A mock judge for testing that returns queued or computed replies.
///
/// Queued replies are consumed first (FIFO). When the queue is empty the
/// responder closure is used, and without one the reply is `{}`.
pub struct MockLlmProvider {
    model: String,
    responses: std::sync::Mutex<VecDeque<Result<CompletionResponse, LlmError>>>,
    responder: Option<Box<Responder>>,
    requests: std::sync::Mutex<Vec<CompletionRequest>>,
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_string(),
            responses: std::sync::Mutex::new(VecDeque::new()),
            responder: None,
            requests: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Create a MockLlmProvider that always returns the given text.
    pub fn with_response(text: &str) -> Self {
        let text = text.to_string();
        Self::with_responder(move |_| Ok(text.clone()))
    }

    /// Create a MockLlmProvider whose reply is computed from the request.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::new()
        }
    }

    /// Queue a response to be returned by the next `complete` call.
    pub fn queue_response(&self, response: CompletionResponse) {
        self.lock_responses().push_back(Ok(response));
    }

    pub fn queue_text(&self, text: &str) {
        self.queue_response(Self::text_response(text));
    }

    /// Queue an error to be returned by the next `complete` call.
    pub fn queue_error(&self, error: LlmError) {
        self.lock_responses().push_back(Err(error));
    }

    /// Create a simple text response for testing.
    pub fn text_response(text: &str) -> CompletionResponse {
        CompletionResponse {
            text: text.to_string(),
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 50,
            },
            model: "mock-model".to_string(),
            finish_reason: Some("stop".to_string()),
        }
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    fn lock_responses(
        &self,
    ) -> std::sync::MutexGuard<'_, VecDeque<Result<CompletionResponse, LlmError>>> {
        self.responses.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        if let Some(queued) = self.lock_responses().pop_front() {
            return queued;
        }
        match &self.responder {
            Some(responder) => responder(&request).map(|text| Self::text_response(&text)),
            None => Ok(Self::text_response("{}")),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
