//! Session entry points: open a document once, ask it many questions.
//!
//! ## Why a session object?
//!
//! Opening is the expensive half of the pipeline (fetch, parse, chunk,
//! embed); answering costs one question embedding plus one completion. A
//! [`DocumentSession`] does the expensive half exactly once and keeps the
//! index in memory, so an interactive loop pays per question, not per
//! document. The free [`ask`] helper covers the one-question script case,
//! and [`inspect`] reads metadata without touching any model endpoint.

use crate::cache;
use crate::config::PipelineConfig;
use crate::error::PdfChatError;
use crate::output::{Answer, DocumentMetadata, IndexStats};
use crate::pipeline::answer::answer_question;
use crate::pipeline::index::{build_index, SemanticIndex};
use crate::pipeline::{chunk, extract, input};
use crate::providers::{self, EmbeddingProvider, LlmProvider};
use crate::usage::{UsageSnapshot, UsageTracker};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// An opened document, ready for questions.
///
/// Created by [`DocumentSession::open`]. Holds the semantic index, the
/// resolved providers, and a usage tracker that accumulates across every
/// model call made on behalf of this session.
pub struct DocumentSession {
    name: String,
    index: SemanticIndex,
    embedding: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmProvider>,
    config: PipelineConfig,
    usage: UsageTracker,
    stats: IndexStats,
}

impl std::fmt::Debug for DocumentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSession")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl DocumentSession {
    /// Open a PDF from a local path or HTTP/HTTPS URL and index it.
    ///
    /// The index cache is keyed by the SHA-256 of the document bytes, so
    /// reopening unchanged content skips extraction and embedding entirely,
    /// while a modified file under the same name gets a fresh index.
    ///
    /// # Errors
    /// Fails on unreadable input, invalid or encrypted PDFs, documents with
    /// no extractable text, and embedding endpoint failures. A broken cache
    /// entry is never an error; it is ignored and rebuilt.
    pub async fn open(
        input_str: impl AsRef<str>,
        config: &PipelineConfig,
    ) -> Result<Self, PdfChatError> {
        let total_start = Instant::now();
        let input_str = input_str.as_ref();
        info!("Opening document: {}", input_str);

        // ── Step 1: Resolve input ────────────────────────────────────────────
        let source = input::resolve_input(input_str, config).await?;
        let content_sha256 = cache::content_hash(&source.bytes);
        debug!(
            "Resolved {} ({} bytes, sha256 {}…)",
            source.name,
            source.bytes.len(),
            &content_sha256[..16]
        );

        // ── Step 2: Resolve providers ────────────────────────────────────────
        let (embedding, llm) = providers::resolve_providers(config)?;

        // ── Step 3: Probe the cache ──────────────────────────────────────────
        let cache_file = config
            .use_cache
            .then(|| cache::cache_path(&config.cache_dir, &source.stem, &content_sha256));
        let cached = match &cache_file {
            Some(path) => cache::load(path, &content_sha256, &config.embedding_model).await,
            None => None,
        };

        let usage = UsageTracker::new();
        let (index, cache_hit) = match cached {
            Some(index) => {
                info!("Cache hit: {} chunks for {}", index.len(), source.name);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_cache_hit(index.len());
                }
                (index, true)
            }
            None => {
                // ── Step 4: Extract text ─────────────────────────────────────
                let extracted = extract::extract_text(&source).await?;
                info!(
                    "Extracted {} pages from {}",
                    extracted.page_count, source.name
                );

                // ── Step 5: Chunk ────────────────────────────────────────────
                let chunks =
                    chunk::split_text(&extracted.text, config.chunk_size, config.chunk_overlap);
                debug!("Split into {} chunks", chunks.len());

                // ── Step 6: Embed and index ──────────────────────────────────
                let embed_start = Instant::now();
                let index = build_index(
                    chunks,
                    &content_sha256,
                    Arc::clone(&embedding),
                    config,
                    &usage,
                )
                .await?;
                info!(
                    "Embedded {} chunks in {}ms",
                    index.len(),
                    embed_start.elapsed().as_millis()
                );

                // ── Step 7: Store in the cache ───────────────────────────────
                if let Some(path) = &cache_file {
                    cache::store(path, &index).await?;
                }

                (index, false)
            }
        };

        let stats = IndexStats {
            chunk_count: index.len(),
            dimension: index.dimension,
            cache_hit,
            embedding_model: index.embedding_model.clone(),
            content_sha256,
            cache_path: cache_file,
        };

        let total_ms = total_start.elapsed().as_millis() as u64;
        info!(
            "Document ready: {} chunks ({}), {}ms",
            stats.chunk_count,
            if cache_hit { "cached" } else { "indexed" },
            total_ms
        );
        if let Some(ref cb) = config.progress_callback {
            cb.on_index_complete(stats.chunk_count, total_ms);
        }

        Ok(Self {
            name: source.name,
            index,
            embedding,
            llm,
            config: config.clone(),
            usage,
            stats,
        })
    }

    /// Answer one question against this document.
    ///
    /// Retrieves the most similar chunks and asks the chat model with those
    /// chunks as the only permitted evidence. Questions are independent; no
    /// conversation history is kept between calls.
    pub async fn ask(&self, question: &str) -> Result<Answer, PdfChatError> {
        answer_question(
            question,
            &self.index,
            &self.embedding,
            &self.llm,
            &self.config,
            &self.usage,
        )
        .await
    }

    /// Display name of the opened document (file name or URL tail).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// How the index for this session came to be.
    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }

    /// Token and interaction totals accumulated by this session so far.
    pub fn usage(&self) -> UsageSnapshot {
        self.usage.snapshot()
    }
}

/// Answer a single question in one call.
///
/// Opens the document (the index cache applies as usual) and asks once. For
/// several questions against the same document, keep a [`DocumentSession`]
/// instead so the index is reused across questions.
pub async fn ask(
    input_str: impl AsRef<str>,
    question: &str,
    config: &PipelineConfig,
) -> Result<Answer, PdfChatError> {
    let session = DocumentSession::open(input_str, config).await?;
    session.ask(question).await
}

/// Read document metadata without building an index.
///
/// Needs no API key and makes no model calls.
pub async fn inspect(
    input_str: impl AsRef<str>,
    config: &PipelineConfig,
) -> Result<DocumentMetadata, PdfChatError> {
    let source = input::resolve_input(input_str.as_ref(), config).await?;
    extract::read_metadata(&source).await
}
