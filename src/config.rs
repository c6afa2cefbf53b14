//! Configuration types for the question-answering pipeline.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. The config is constructed once, up front, and
//! passed by reference through every stage; no stage reads the environment or
//! any other ambient state at call time. That keeps two runs with the same
//! config byte-for-byte comparable and makes tests deterministic.
//!
//! # Design choice: builder over constructor
//! A constructor with this many fields is unreadable and breaks on every new
//! field. The builder lets callers set only what they care about and rely on
//! documented defaults for the rest.

use crate::error::PdfChatError;
use crate::progress::ProgressCallback;
use crate::providers::{EmbeddingProvider, LlmProvider};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for a document question-answering pipeline.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use pdfchat::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .model("gpt-4o-mini")
///     .top_k(5)
///     .cache_dir("/tmp/pdfchat-cache")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Maximum chunk size in characters. Default: 1000.
    ///
    /// Chunks are what get embedded and later stuffed into the model context.
    /// 1000 characters keeps each chunk within a single topic on most
    /// documents while leaving room for several chunks plus the question in
    /// one completion request. Counted in characters, not bytes, so multi-byte
    /// text never splits inside a code point.
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters. Default: 200.
    ///
    /// A sentence that straddles a chunk boundary would otherwise be invisible
    /// to retrieval: half in one chunk, half in the next, neither half similar
    /// enough to the question. The overlap repeats the boundary region in both
    /// chunks so every complete sentence lives in at least one chunk.
    pub chunk_overlap: usize,

    /// Number of chunks retrieved per question. Default: 3.
    ///
    /// More chunks give the model more evidence but dilute the context with
    /// weaker matches and cost more prompt tokens. Three is enough for
    /// single-topic questions over a well-chunked document.
    pub top_k: usize,

    /// Chat model used to generate answers. Default: "gpt-4o-mini".
    pub model: String,

    /// Embedding model for chunks and questions. Default: "text-embedding-3-small".
    ///
    /// Cached indexes are tagged with this name; changing it invalidates the
    /// cache (question and chunk vectors must come from the same model).
    pub embedding_model: String,

    /// Base URL of the OpenAI-compatible API. Default: "https://api.openai.com/v1".
    ///
    /// Point this at any endpoint that speaks the same protocol (Azure
    /// gateways, LiteLLM, Ollama's /v1 shim, LM Studio).
    pub api_base: String,

    /// API key. If `None`, `OPENAI_API_KEY` is read from the environment once
    /// when the providers are constructed.
    pub api_key: Option<String>,

    /// Pre-constructed embedding provider. Takes precedence over `api_key` /
    /// `api_base`. Useful in tests.
    pub embedding_provider: Option<Arc<dyn EmbeddingProvider>>,

    /// Pre-constructed chat provider. Takes precedence over `api_key` /
    /// `api_base`. Useful in tests.
    pub llm_provider: Option<Arc<dyn LlmProvider>>,

    /// Sampling temperature for answer generation. Default: 0.1.
    ///
    /// Low temperature keeps the model close to the retrieved context, which
    /// is exactly what grounded question answering wants. Higher values invite
    /// the model to improvise beyond the document.
    pub temperature: f32,

    /// Maximum tokens the model may generate per answer. Default: 1024.
    pub max_answer_tokens: usize,

    /// Maximum retry attempts on a transient API failure. Default: 3.
    ///
    /// Rate limits, 5xx responses, and timeouts are retried; authentication
    /// and 4xx request errors are not.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    ///
    /// Doubles after each attempt: 500 ms, 1 s, 2 s.
    pub retry_backoff_ms: u64,

    /// Per-API-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Number of embedding requests in flight while indexing. Default: 4.
    ///
    /// Embedding a large document is network-bound; a few parallel batch
    /// requests cut indexing time substantially. Lower this if the endpoint
    /// rate-limits aggressively.
    pub concurrency: usize,

    /// Directory for cached index files. Default: current directory.
    pub cache_dir: PathBuf,

    /// Whether to read and write the index cache. Default: true.
    pub use_cache: bool,

    /// Progress callback for indexing. Default: `None` (silent).
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 3,
            model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            embedding_provider: None,
            llm_provider: None,
            temperature: 0.1,
            max_answer_tokens: 1024,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            download_timeout_secs: 120,
            concurrency: 4,
            cache_dir: PathBuf::from("."),
            use_cache: true,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .field("top_k", &self.top_k)
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field(
                "embedding_provider",
                &self.embedding_provider.as_ref().map(|_| "<dyn EmbeddingProvider>"),
            )
            .field(
                "llm_provider",
                &self.llm_provider.as_ref().map(|_| "<dyn LlmProvider>"),
            )
            .field("temperature", &self.temperature)
            .field("max_answer_tokens", &self.max_answer_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("concurrency", &self.concurrency)
            .field("cache_dir", &self.cache_dir)
            .field("use_cache", &self.use_cache)
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn chunk_size(mut self, chars: usize) -> Self {
        self.config.chunk_size = chars.max(1);
        self
    }

    pub fn chunk_overlap(mut self, chars: usize) -> Self {
        self.config.chunk_overlap = chars;
        self
    }

    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        // A trailing slash would produce "…//embeddings" when joined.
        self.config.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.config.embedding_provider = Some(provider);
        self
    }

    pub fn llm_provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.config.llm_provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_answer_tokens(mut self, n: usize) -> Self {
        self.config.max_answer_tokens = n.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.min(10);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.cache_dir = dir.into();
        self
    }

    pub fn use_cache(mut self, v: bool) -> Self {
        self.config.use_cache = v;
        self
    }

    pub fn progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.config.progress_callback = Some(callback);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PdfChatError> {
        let c = &self.config;
        if c.chunk_overlap >= c.chunk_size {
            return Err(PdfChatError::InvalidConfig(format!(
                "chunk overlap must be smaller than chunk size (overlap {} >= size {})",
                c.chunk_overlap, c.chunk_size
            )));
        }
        if c.api_base.is_empty() {
            return Err(PdfChatError::InvalidConfig(
                "API base URL must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
