//! Answer generation: embed the question, retrieve evidence, complete.
//!
//! The only stage with two model calls. Both run inside usage scopes so a
//! failure anywhere between them still leaves the session totals accurate.

use crate::config::PipelineConfig;
use crate::error::PdfChatError;
use crate::output::{Answer, TokenUsage};
use crate::pipeline::index::SemanticIndex;
use crate::prompts;
use crate::providers::{CompletionOptions, EmbeddingProvider, LlmProvider};
use crate::usage::{InteractionKind, UsageTracker};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Answer one question against an index.
///
/// Retrieves `config.top_k` chunks by cosine similarity, stuffs them into
/// the prompt in retrieval order, and asks the chat model.
pub async fn answer_question(
    question: &str,
    index: &SemanticIndex,
    embedding: &Arc<dyn EmbeddingProvider>,
    llm: &Arc<dyn LlmProvider>,
    config: &PipelineConfig,
    usage: &UsageTracker,
) -> Result<Answer, PdfChatError> {
    let started = Instant::now();
    let question = question.trim();
    if question.is_empty() {
        return Err(PdfChatError::EmptyQuestion);
    }

    // Embed the question with the same model the chunks used.
    let query = {
        let mut scope = usage.begin(InteractionKind::Embedding);
        let batch = embedding.embed(question).await?;
        scope.record_tokens(batch.prompt_tokens, 0);
        batch
            .vectors
            .into_iter()
            .next()
            .ok_or_else(|| PdfChatError::EmbeddingFailed {
                detail: "endpoint returned no vector for the question".to_string(),
            })?
    };

    let sources = index.search(&query, config.top_k);
    debug!(
        "Retrieved {} chunks (best score {:.3})",
        sources.len(),
        sources.first().map(|c| c.score).unwrap_or(0.0)
    );

    let excerpts: Vec<&str> = sources.iter().map(|c| c.text.as_str()).collect();
    let user = prompts::user_prompt(question, &excerpts);
    let options = CompletionOptions {
        temperature: config.temperature,
        max_tokens: config.max_answer_tokens,
    };

    let completion = {
        let mut scope = usage.begin(InteractionKind::Completion);
        let completion = llm.complete(prompts::QA_SYSTEM_PROMPT, &user, &options).await?;
        scope.record_tokens(completion.prompt_tokens, completion.completion_tokens);
        completion
    };

    let duration_ms = started.elapsed().as_millis() as u64;
    info!(
        "Answered in {}ms using {} source chunks",
        duration_ms,
        sources.len()
    );

    Ok(Answer {
        text: completion.content.trim().to_string(),
        sources,
        usage: TokenUsage {
            prompt_tokens: completion.prompt_tokens,
            completion_tokens: completion.completion_tokens,
        },
        duration_ms,
        model: llm.model_name().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::index::{IndexedChunk, SemanticIndex, INDEX_FORMAT_VERSION};
    use crate::providers::{ChatCompletion, EmbeddingBatch};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct UnitEmbedder;

    #[async_trait]
    impl EmbeddingProvider for UnitEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<EmbeddingBatch, PdfChatError> {
            Ok(EmbeddingBatch {
                vectors: texts.iter().map(|_| vec![1.0, 0.0]).collect(),
                prompt_tokens: 4,
            })
        }

        fn model_name(&self) -> &str {
            "unit-embedder"
        }
    }

    /// Records the prompts it was given and answers with a fixed string.
    struct RecordingLlm {
        seen: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl LlmProvider for RecordingLlm {
        async fn complete(
            &self,
            system_prompt: &str,
            user_prompt: &str,
            _options: &CompletionOptions,
        ) -> Result<ChatCompletion, PdfChatError> {
            self.seen
                .lock()
                .unwrap()
                .push((system_prompt.to_string(), user_prompt.to_string()));
            if self.fail {
                return Err(PdfChatError::CompletionFailed {
                    detail: "synthetic failure".to_string(),
                });
            }
            Ok(ChatCompletion {
                content: "  the answer  ".to_string(),
                prompt_tokens: 50,
                completion_tokens: 9,
            })
        }

        fn model_name(&self) -> &str {
            "recording-llm"
        }
    }

    fn two_chunk_index() -> SemanticIndex {
        SemanticIndex {
            format_version: INDEX_FORMAT_VERSION,
            embedding_model: "unit-embedder".into(),
            content_sha256: "aa".into(),
            dimension: 2,
            chunks: vec![
                IndexedChunk {
                    ordinal: 0,
                    text: "the sky is blue".into(),
                    embedding: vec![1.0, 0.0],
                },
                IndexedChunk {
                    ordinal: 1,
                    text: "grass is green".into(),
                    embedding: vec![0.0, 1.0],
                },
            ],
        }
    }

    #[tokio::test]
    async fn answer_carries_text_sources_and_usage() {
        let index = two_chunk_index();
        let embedding: Arc<dyn EmbeddingProvider> = Arc::new(UnitEmbedder);
        let llm_impl = Arc::new(RecordingLlm {
            seen: Mutex::new(Vec::new()),
            fail: false,
        });
        let llm: Arc<dyn LlmProvider> = llm_impl.clone();
        let config = PipelineConfig::builder().top_k(1).build().unwrap();
        let usage = UsageTracker::new();

        let answer = answer_question("what colour is the sky?", &index, &embedding, &llm, &config, &usage)
            .await
            .unwrap();

        assert_eq!(answer.text, "the answer");
        assert_eq!(answer.model, "recording-llm");
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.sources[0].text, "the sky is blue");
        assert_eq!(answer.usage.prompt_tokens, 50);
        assert_eq!(answer.usage.completion_tokens, 9);

        // The prompt stuffed the retrieved chunk above the question.
        let seen = llm_impl.seen.lock().unwrap();
        let (system, user) = &seen[0];
        assert!(system.contains("ONLY"));
        assert!(user.contains("the sky is blue"));
        assert!(user.contains("what colour is the sky?"));
        assert!(!user.contains("grass is green"));

        let snap = usage.snapshot();
        assert_eq!(snap.interactions, 2);
        assert_eq!(snap.embedding_prompt_tokens, 4);
        assert_eq!(snap.completion_prompt_tokens, 50);
        assert_eq!(snap.completion_tokens, 9);
    }

    #[tokio::test]
    async fn failed_completion_still_counts_the_interaction() {
        let index = two_chunk_index();
        let embedding: Arc<dyn EmbeddingProvider> = Arc::new(UnitEmbedder);
        let llm: Arc<dyn LlmProvider> = Arc::new(RecordingLlm {
            seen: Mutex::new(Vec::new()),
            fail: true,
        });
        let config = PipelineConfig::default();
        let usage = UsageTracker::new();

        let err = answer_question("anything?", &index, &embedding, &llm, &config, &usage)
            .await
            .unwrap_err();
        assert!(matches!(err, PdfChatError::CompletionFailed { .. }));

        // Both scopes committed: the embedding that succeeded and the
        // completion that failed.
        let snap = usage.snapshot();
        assert_eq!(snap.interactions, 2);
        assert_eq!(snap.embedding_prompt_tokens, 4);
        assert_eq!(snap.completion_tokens, 0);
    }

    #[tokio::test]
    async fn blank_questions_are_rejected() {
        let index = two_chunk_index();
        let embedding: Arc<dyn EmbeddingProvider> = Arc::new(UnitEmbedder);
        let llm: Arc<dyn LlmProvider> = Arc::new(RecordingLlm {
            seen: Mutex::new(Vec::new()),
            fail: false,
        });
        let config = PipelineConfig::default();
        let usage = UsageTracker::new();

        let err = answer_question("   ", &index, &embedding, &llm, &config, &usage)
            .await
            .unwrap_err();
        assert!(matches!(err, PdfChatError::EmptyQuestion));
        assert_eq!(usage.snapshot().interactions, 0);
    }
}
