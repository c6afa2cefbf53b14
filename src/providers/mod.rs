//! Model provider traits and the built-in OpenAI-compatible client.
//!
//! The pipeline talks to models through two narrow traits so tests can inject
//! deterministic fakes and callers can plug in any backend:
//!
//! * [`EmbeddingProvider`] — turns text into vectors (index building, question
//!   embedding).
//! * [`LlmProvider`] — turns a prompt into an answer.
//!
//! [`OpenAiClient`] implements both against any endpoint that speaks the
//! OpenAI HTTP protocol (api.openai.com, Azure gateways, LiteLLM, Ollama's
//! `/v1` shim, LM Studio) and is what [`resolve_providers`] constructs when no
//! override is injected.

pub mod openai;

pub use openai::OpenAiClient;

use crate::config::PipelineConfig;
use crate::error::PdfChatError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Options for one completion call.
#[derive(Debug, Clone)]
pub struct CompletionOptions {
    /// Sampling temperature.
    pub temperature: f32,
    /// Generation cap in tokens.
    pub max_tokens: usize,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 1024,
        }
    }
}

/// Embeddings for a batch of inputs, in input order.
#[derive(Debug, Clone)]
pub struct EmbeddingBatch {
    /// One vector per input text, same order as the request.
    pub vectors: Vec<Vec<f32>>,
    /// Prompt tokens the API reported for the batch (0 if not reported).
    pub prompt_tokens: u64,
}

/// One chat completion result.
#[derive(Debug, Clone)]
pub struct ChatCompletion {
    /// The generated answer text.
    pub content: String,
    /// Prompt tokens the API reported (0 if not reported).
    pub prompt_tokens: u64,
    /// Completion tokens the API reported (0 if not reported).
    pub completion_tokens: u64,
}

/// Turns text into embedding vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts. Vectors come back in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<EmbeddingBatch, PdfChatError>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<EmbeddingBatch, PdfChatError> {
        let input = [text.to_string()];
        self.embed_batch(&input).await
    }

    /// Identifier of the model producing the vectors. Cached indexes are
    /// tagged with it; vectors from different models never mix.
    fn model_name(&self) -> &str;
}

/// Generates an answer from a system prompt and a user prompt.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Run one chat completion.
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &CompletionOptions,
    ) -> Result<ChatCompletion, PdfChatError>;

    /// Identifier of the chat model.
    fn model_name(&self) -> &str;
}

/// Resolve the providers a session will use.
///
/// Resolution order, per provider:
/// 1. An override injected into the config (tests, custom backends).
/// 2. The built-in [`OpenAiClient`] using `api_base` / `api_key` from the
///    config, falling back to `OPENAI_API_KEY` from the environment once,
///    here, at construction time.
///
/// When both sides need the built-in client they share one HTTP client and
/// connection pool.
pub fn resolve_providers(
    config: &PipelineConfig,
) -> Result<(Arc<dyn EmbeddingProvider>, Arc<dyn LlmProvider>), PdfChatError> {
    match (&config.embedding_provider, &config.llm_provider) {
        (Some(embedding), Some(llm)) => {
            debug!(
                "Using injected providers (embeddings '{}', chat '{}')",
                embedding.model_name(),
                llm.model_name()
            );
            Ok((Arc::clone(embedding), Arc::clone(llm)))
        }
        (embedding_override, llm_override) => {
            let client = Arc::new(OpenAiClient::from_config(config)?);
            debug!(
                "Using OpenAI-compatible endpoint {} (embeddings '{}', chat '{}')",
                config.api_base, config.embedding_model, config.model
            );
            let embedding: Arc<dyn EmbeddingProvider> = match embedding_override {
                Some(p) => Arc::clone(p),
                None => client.clone(),
            };
            let llm: Arc<dyn LlmProvider> = match llm_override {
                Some(p) => Arc::clone(p),
                None => client,
            };
            Ok((embedding, llm))
        }
    }
}
