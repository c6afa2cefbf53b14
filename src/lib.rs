//! # pdfchat
//!
//! Ask questions about PDF documents using retrieval-augmented generation.
//!
//! ## Why this crate?
//!
//! Stuffing a whole PDF into a chat prompt stops working the moment the
//! document outgrows the context window, and costs a fortune long before
//! that. This crate instead splits the document into overlapping chunks,
//! embeds them once, and answers each question from only the handful of
//! chunks most similar to it — so a 300-page manual costs the same per
//! question as a 3-page memo. The chat model is instructed to answer from
//! the retrieved excerpts alone and to say so when they don't contain the
//! answer, rather than improvising.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     resolve local file or download from URL
//!  ├─ 2. Extract   parse page text via lopdf (CPU-bound, spawn_blocking)
//!  ├─ 3. Chunk     overlapping character windows (1000 chars, 200 overlap)
//!  ├─ 4. Index     batch embeddings → in-memory cosine index
//!  │               (cached on disk, keyed by content hash)
//!  ├─ 5. Retrieve  top-k chunks nearest the question
//!  └─ 6. Answer    chat completion grounded in the retrieved chunks
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfchat::{DocumentSession, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key read from OPENAI_API_KEY when not set on the config
//!     let config = PipelineConfig::default();
//!     let session = DocumentSession::open("manual.pdf", &config).await?;
//!
//!     let answer = session.ask("What warranty period applies?").await?;
//!     println!("{}", answer.text);
//!     eprintln!(
//!         "tokens: {} in / {} out",
//!         answer.usage.prompt_tokens, answer.usage.completion_tokens
//!     );
//!     Ok(())
//! }
//! ```
//!
//! For a single question, [`ask`] opens, indexes, and answers in one call;
//! [`inspect`] reads document metadata without an API key.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfchat` binary (clap + rustyline + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! pdfchat = { version = "0.1", default-features = false }
//! ```
//!
//! ## Choosing Models
//!
//! | Model | $/1M tokens | Role |
//! |-------|------------|------|
//! | `gpt-4o-mini` | $0.15/$0.60 | Default chat model — fast, cheap |
//! | `gpt-4o`      | $2.50/$10.00 | Higher answer quality |
//! | `text-embedding-3-small` | $0.02 | Default embedding model |
//! | `text-embedding-3-large` | $0.13 | Better retrieval on subtle questions |
//!
//! Indexing a 100-page document costs well under **$0.01** with
//! `text-embedding-3-small`; each question afterwards costs a few thousand
//! prompt tokens. Any OpenAI-compatible endpoint works via
//! [`PipelineConfigBuilder::api_base`](config::PipelineConfigBuilder::api_base).

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cache;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod providers;
pub mod session;
pub mod usage;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use error::PdfChatError;
pub use output::{Answer, DocumentMetadata, IndexStats, RetrievedChunk, TokenUsage};
pub use pipeline::index::SemanticIndex;
pub use progress::{IndexProgressCallback, NoopProgressCallback, ProgressCallback};
pub use providers::{
    ChatCompletion, CompletionOptions, EmbeddingBatch, EmbeddingProvider, LlmProvider,
};
pub use session::{ask, inspect, DocumentSession};
pub use usage::{UsageSnapshot, UsageTracker};
