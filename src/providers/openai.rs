//! OpenAI-compatible HTTP client.
//!
//! One [`OpenAiClient`] serves both provider traits over a single
//! `reqwest::Client` (shared connection pool, shared timeout). The wire
//! protocol is the plain OpenAI REST shape:
//!
//! * `POST {base}/embeddings`        — `{ "input": [...], "model": "..." }`
//! * `POST {base}/chat/completions`  — `{ "model", "messages", "temperature", "max_tokens" }`
//!
//! Transient failures (HTTP 429, 5xx, timeouts, connection errors) are
//! retried with exponential backoff; a `Retry-After` header, when the server
//! sends one, overrides the computed delay. Authentication and other 4xx
//! errors are returned immediately.

use crate::config::PipelineConfig;
use crate::error::PdfChatError;
use crate::providers::{
    ChatCompletion, CompletionOptions, EmbeddingBatch, EmbeddingProvider, LlmProvider,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Client for any endpoint speaking the OpenAI HTTP protocol.
///
/// Constructed from a [`PipelineConfig`] by
/// [`crate::providers::resolve_providers`]; implements both
/// [`EmbeddingProvider`] and [`LlmProvider`].
pub struct OpenAiClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    chat_model: String,
    embedding_model: String,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout_secs: u64,
}

impl OpenAiClient {
    /// Build a client from the config, resolving the API key.
    ///
    /// The key comes from `config.api_key`, else from `OPENAI_API_KEY` read
    /// here, once. Stages never touch the environment after this point.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PdfChatError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or(PdfChatError::MissingApiKey)?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| PdfChatError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_base: config.api_base.clone(),
            api_key,
            chat_model: config.model.clone(),
            embedding_model: config.embedding_model.clone(),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout_secs: config.api_timeout_secs,
        })
    }

    async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, ApiCallError> {
        let response = self
            .http
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ApiCallError::Timeout
                } else {
                    ApiCallError::Transport {
                        detail: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return response.json::<T>().await.map_err(|e| ApiCallError::Decode {
                detail: e.to_string(),
            });
        }

        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        let body_text = response.text().await.unwrap_or_default();
        let detail = truncate_body(&body_text);

        match status.as_u16() {
            401 | 403 => Err(ApiCallError::Auth { detail }),
            429 => Err(ApiCallError::RateLimited { retry_after_secs }),
            s if s >= 500 => Err(ApiCallError::Server { status: s, detail }),
            s => Err(ApiCallError::Request { status: s, detail }),
        }
    }

    async fn with_retry<T, F, Fut>(
        &self,
        kind: CallKind,
        model: &str,
        mut call: F,
    ) -> Result<T, PdfChatError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiCallError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt <= self.max_retries => {
                    let delay_ms = backoff_delay_ms(&err, attempt, self.retry_backoff_ms);
                    warn!(
                        "{} request attempt {}/{} failed ({}), retrying in {}ms",
                        kind.label(),
                        attempt,
                        self.max_retries + 1,
                        err,
                        delay_ms
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Err(err) => return Err(err.into_error(kind, model, self.api_timeout_secs)),
            }
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiClient {
    async fn embed_batch(&self, texts: &[String]) -> Result<EmbeddingBatch, PdfChatError> {
        if texts.is_empty() {
            return Ok(EmbeddingBatch {
                vectors: Vec::new(),
                prompt_tokens: 0,
            });
        }

        let url = format!("{}/embeddings", self.api_base);
        let request = EmbeddingsRequest {
            input: texts,
            model: &self.embedding_model,
        };
        let response: EmbeddingsResponse = self
            .with_retry(CallKind::Embeddings, &self.embedding_model, || {
                self.post_json(&url, &request)
            })
            .await?;

        if response.data.len() != texts.len() {
            return Err(PdfChatError::EmbeddingFailed {
                detail: format!(
                    "endpoint returned {} embeddings for {} inputs",
                    response.data.len(),
                    texts.len()
                ),
            });
        }

        Ok(EmbeddingBatch {
            vectors: vectors_in_order(response.data),
            prompt_tokens: response.usage.unwrap_or_default().prompt_tokens,
        })
    }

    fn model_name(&self) -> &str {
        &self.embedding_model
    }
}

#[async_trait]
impl LlmProvider for OpenAiClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &CompletionOptions,
    ) -> Result<ChatCompletion, PdfChatError> {
        let url = format!("{}/chat/completions", self.api_base);
        let request = ChatRequest {
            model: &self.chat_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };
        let response: ChatResponse = self
            .with_retry(CallKind::Chat, &self.chat_model, || {
                self.post_json(&url, &request)
            })
            .await?;

        let usage = response.usage.unwrap_or_default();
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| PdfChatError::CompletionFailed {
                detail: "response contained no message content".to_string(),
            })?;

        Ok(ChatCompletion {
            content,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        })
    }

    fn model_name(&self) -> &str {
        &self.chat_model
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingObject>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct EmbeddingObject {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
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

/// Token accounting as OpenAI reports it. Compatible endpoints may omit any
/// of these fields.
#[derive(Deserialize, Default, Clone, Copy)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

// ── Error plumbing ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum CallKind {
    Embeddings,
    Chat,
}

impl CallKind {
    fn label(self) -> &'static str {
        match self {
            CallKind::Embeddings => "Embeddings",
            CallKind::Chat => "Chat",
        }
    }
}

/// Outcome of a single HTTP attempt, before retry policy is applied.
#[derive(Debug, thiserror::Error)]
enum ApiCallError {
    #[error("authentication rejected: {detail}")]
    Auth { detail: String },
    #[error("rate limited")]
    RateLimited { retry_after_secs: Option<u64> },
    #[error("request timed out")]
    Timeout,
    #[error("server error HTTP {status}: {detail}")]
    Server { status: u16, detail: String },
    #[error("request rejected HTTP {status}: {detail}")]
    Request { status: u16, detail: String },
    #[error("connection failed: {detail}")]
    Transport { detail: String },
    #[error("invalid response body: {detail}")]
    Decode { detail: String },
}

impl ApiCallError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiCallError::RateLimited { .. }
                | ApiCallError::Timeout
                | ApiCallError::Server { .. }
                | ApiCallError::Transport { .. }
        )
    }

    fn into_error(self, kind: CallKind, model: &str, timeout_secs: u64) -> PdfChatError {
        let failed = |detail: String| match kind {
            CallKind::Embeddings => PdfChatError::EmbeddingFailed { detail },
            CallKind::Chat => PdfChatError::CompletionFailed { detail },
        };
        match self {
            ApiCallError::Auth { detail } => PdfChatError::AuthError { detail },
            ApiCallError::RateLimited { retry_after_secs } => PdfChatError::RateLimited {
                model: model.to_string(),
                retry_after_secs,
            },
            ApiCallError::Timeout => PdfChatError::ApiTimeout { secs: timeout_secs },
            ApiCallError::Server { status, detail } | ApiCallError::Request { status, detail } => {
                failed(format!("HTTP {status}: {detail}"))
            }
            ApiCallError::Transport { detail } => failed(detail),
            ApiCallError::Decode { detail } => failed(format!("invalid response: {detail}")),
        }
    }
}

/// Delay before the next attempt. A server-provided `Retry-After` wins over
/// the exponential schedule.
fn backoff_delay_ms(err: &ApiCallError, attempt: u32, base_ms: u64) -> u64 {
    if let ApiCallError::RateLimited {
        retry_after_secs: Some(secs),
    } = err
    {
        return secs.saturating_mul(1000);
    }
    base_ms.saturating_mul(2u64.saturating_pow(attempt - 1))
}

/// Responses may tag embeddings with their input index; restore input order.
fn vectors_in_order(mut data: Vec<EmbeddingObject>) -> Vec<Vec<f32>> {
    data.sort_by_key(|d| d.index);
    data.into_iter().map(|d| d.embedding).collect()
}

/// Error bodies can be whole HTML pages; keep the readable head.
fn truncate_body(body: &str) -> String {
    const MAX: usize = 300;
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX {
        trimmed.to_string()
    } else {
        let head: String = trimmed.chars().take(MAX).collect();
        format!("{head}…")
    }
}
