//! Semantic index: chunk embeddings with brute-force cosine search.
//!
//! The index is deliberately simple — a flat `Vec` of (text, vector) pairs
//! scanned linearly per query. A single document chunked at 1000 characters
//! yields hundreds of vectors, not millions; a linear scan over that is
//! microseconds, and it keeps the on-disk format trivially serialisable.
//!
//! Embedding batches are issued concurrently (`buffered` preserves input
//! order, so chunk ordinals never shuffle) with one usage scope per request.

use crate::config::PipelineConfig;
use crate::error::PdfChatError;
use crate::output::RetrievedChunk;
use crate::providers::EmbeddingProvider;
use crate::usage::{InteractionKind, UsageTracker};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// On-disk format version; bump when the layout changes.
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// How many chunks go into one embeddings request.
const EMBEDDING_BATCH_SIZE: usize = 64;

/// One chunk with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedChunk {
    /// Position of the chunk in the document (0-indexed).
    pub ordinal: usize,
    /// The chunk text as embedded.
    pub text: String,
    /// The embedding vector.
    pub embedding: Vec<f32>,
}

/// A searchable index over one document's chunks.
///
/// Serialisable as-is; the header fields let the cache reject an index built
/// from different content, a different embedding model, or an older format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticIndex {
    /// See [`INDEX_FORMAT_VERSION`].
    pub format_version: u32,
    /// Embedding model the vectors came from.
    pub embedding_model: String,
    /// SHA-256 of the source document bytes.
    pub content_sha256: String,
    /// Embedding vector dimension.
    pub dimension: usize,
    /// The chunks, ordinal order.
    pub chunks: Vec<IndexedChunk>,
}

impl SemanticIndex {
    /// Number of chunks in the index.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Whether this index can serve queries for the given document + model.
    pub fn matches(&self, content_sha256: &str, embedding_model: &str) -> bool {
        self.format_version == INDEX_FORMAT_VERSION
            && self.content_sha256 == content_sha256
            && self.embedding_model == embedding_model
    }

    /// The `top_k` chunks most similar to the query embedding, best first.
    ///
    /// Returns fewer than `top_k` only when the index holds fewer chunks.
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<RetrievedChunk> {
        let mut scored: Vec<RetrievedChunk> = self
            .chunks
            .iter()
            .map(|chunk| RetrievedChunk {
                ordinal: chunk.ordinal,
                score: cosine_similarity(query, &chunk.embedding),
                text: chunk.text.clone(),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
    }
}

/// Cosine similarity of two vectors; 0.0 for mismatched or zero-norm input.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|y| y * y).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Embed every chunk and assemble the index.
///
/// Batches of [`EMBEDDING_BATCH_SIZE`] chunks are issued with
/// `config.concurrency` requests in flight; results arrive in submission
/// order. Each request runs in its own usage scope so the session totals see
/// embedding tokens even when a later batch fails.
pub async fn build_index(
    chunks: Vec<String>,
    content_sha256: &str,
    provider: Arc<dyn EmbeddingProvider>,
    config: &PipelineConfig,
    usage: &UsageTracker,
) -> Result<SemanticIndex, PdfChatError> {
    let total = chunks.len();
    if let Some(cb) = &config.progress_callback {
        cb.on_index_start(total);
    }
    debug!(
        "Embedding {} chunks with '{}' ({} per batch, {} in flight)",
        total,
        provider.model_name(),
        EMBEDDING_BATCH_SIZE,
        config.concurrency
    );

    let batches: Vec<Vec<String>> = chunks
        .chunks(EMBEDDING_BATCH_SIZE)
        .map(|batch| batch.to_vec())
        .collect();

    let mut results = stream::iter(batches.into_iter().map(|batch| {
        let provider = Arc::clone(&provider);
        let usage = usage.clone();
        async move {
            let mut scope = usage.begin(InteractionKind::Embedding);
            let embedded = provider.embed_batch(&batch).await?;
            scope.record_tokens(embedded.prompt_tokens, 0);
            Ok::<_, PdfChatError>((batch, embedded))
        }
    }))
    .buffered(config.concurrency);

    let mut indexed: Vec<IndexedChunk> = Vec::with_capacity(total);
    while let Some(result) = results.next().await {
        let (batch, embedded) = result?;
        for (text, embedding) in batch.into_iter().zip(embedded.vectors) {
            indexed.push(IndexedChunk {
                ordinal: indexed.len(),
                text,
                embedding,
            });
        }
        if let Some(cb) = &config.progress_callback {
            cb.on_chunks_embedded(indexed.len(), total);
        }
    }

    let dimension = indexed.first().map(|c| c.embedding.len()).unwrap_or(0);
    if indexed.iter().any(|c| c.embedding.len() != dimension) {
        return Err(PdfChatError::EmbeddingFailed {
            detail: "endpoint returned vectors of mixed dimensions".to_string(),
        });
    }

    Ok(SemanticIndex {
        format_version: INDEX_FORMAT_VERSION,
        embedding_model: provider.model_name().to_string(),
        content_sha256: content_sha256.to_string(),
        dimension,
        chunks: indexed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::EmbeddingBatch;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embeds each text as a one-hot-ish vector derived from its first byte.
    /// Deterministic, so searches have predictable winners.
    struct ByteEmbedder {
        calls: AtomicUsize,
    }

    impl ByteEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for ByteEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<EmbeddingBatch, PdfChatError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let vectors = texts
                .iter()
                .map(|t| {
                    let b = t.bytes().next().unwrap_or(0) as f32;
                    vec![b, 1.0]
                })
                .collect();
            Ok(EmbeddingBatch {
                vectors,
                prompt_tokens: texts.len() as u64 * 3,
            })
        }

        fn model_name(&self) -> &str {
            "byte-embedder"
        }
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.3, 0.5, 0.2];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_of_opposite_vectors_is_minus_one() {
        let s = cosine_similarity(&[1.0, 2.0], &[-1.0, -2.0]);
        assert!((s + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_guards_zero_and_mismatched_vectors() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    fn index_of(vectors: Vec<Vec<f32>>) -> SemanticIndex {
        let dimension = vectors.first().map(|v| v.len()).unwrap_or(0);
        SemanticIndex {
            format_version: INDEX_FORMAT_VERSION,
            embedding_model: "test".into(),
            content_sha256: "cafe".into(),
            dimension,
            chunks: vectors
                .into_iter()
                .enumerate()
                .map(|(ordinal, embedding)| IndexedChunk {
                    ordinal,
                    text: format!("chunk {ordinal}"),
                    embedding,
                })
                .collect(),
        }
    }

    #[test]
    fn search_returns_best_matches_in_order() {
        let index = index_of(vec![
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![0.9, 0.1],
        ]);
        let hits = index.search(&[1.0, 0.0], 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].ordinal, 0);
        assert_eq!(hits[1].ordinal, 2);
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn search_never_returns_more_than_the_index_holds() {
        let index = index_of(vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert_eq!(index.search(&[1.0, 0.0], 3).len(), 2);
        assert_eq!(index.search(&[1.0, 0.0], 1).len(), 1);
    }

    #[test]
    fn matches_rejects_other_content_models_and_versions() {
        let index = index_of(vec![vec![1.0]]);
        assert!(index.matches("cafe", "test"));
        assert!(!index.matches("beef", "test"));
        assert!(!index.matches("cafe", "other-model"));
        let mut old = index.clone();
        old.format_version = 0;
        assert!(!old.matches("cafe", "test"));
    }

    #[tokio::test]
    async fn build_index_keeps_chunk_order_across_batches() {
        let chunks: Vec<String> = (0..150).map(|i| format!("{}", (b'a' + (i % 26) as u8) as char)).collect();
        let provider = Arc::new(ByteEmbedder::new());
        let config = PipelineConfig::builder().concurrency(3).build().unwrap();
        let usage = UsageTracker::new();

        let index = build_index(
            chunks.clone(),
            "deadbeef",
            provider.clone() as Arc<dyn EmbeddingProvider>,
            &config,
            &usage,
        )
        .await
        .unwrap();

        assert_eq!(index.len(), 150);
        assert_eq!(index.dimension, 2);
        assert_eq!(index.embedding_model, "byte-embedder");
        assert_eq!(index.content_sha256, "deadbeef");
        // 150 chunks at 64 per batch → 3 requests.
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        for (i, chunk) in index.chunks.iter().enumerate() {
            assert_eq!(chunk.ordinal, i);
            assert_eq!(chunk.text, chunks[i]);
            assert_eq!(chunk.embedding[0], chunks[i].bytes().next().unwrap() as f32);
        }
        // 3 embedding interactions with 3 tokens per chunk.
        let snap = usage.snapshot();
        assert_eq!(snap.interactions, 3);
        assert_eq!(snap.embedding_prompt_tokens, 450);
    }

    #[tokio::test]
    async fn build_index_of_nothing_is_empty_but_valid() {
        let provider = Arc::new(ByteEmbedder::new());
        let config = PipelineConfig::default();
        let usage = UsageTracker::new();
        let index = build_index(
            Vec::new(),
            "00",
            provider as Arc<dyn EmbeddingProvider>,
            &config,
            &usage,
        )
        .await
        .unwrap();
        assert!(index.is_empty());
        assert_eq!(index.dimension, 0);
    }
}
