//! Result types returned by the pipeline.
//!
//! Everything here is plain data: serialisable (the CLI exposes `--json`),
//! cloneable, and free of handles back into the pipeline. [`Answer`] is what
//! a question produces; [`IndexStats`] describes the index a session is
//! holding; [`DocumentMetadata`] is the no-credentials inspection result.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Token usage for one model interaction (or a sum of them).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the prompt(s) sent to the API.
    pub prompt_tokens: u64,
    /// Tokens generated by the model. Zero for embedding calls.
    pub completion_tokens: u64,
}

impl TokenUsage {
    /// Prompt plus completion tokens.
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    /// Fold another usage record into this one.
    pub fn add(&mut self, other: TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
    }
}

/// A chunk returned by similarity search, with its score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Position of the chunk in the original document (0-indexed).
    pub ordinal: usize,
    /// Cosine similarity against the question embedding, in [-1, 1].
    pub score: f32,
    /// The chunk text as it was embedded.
    pub text: String,
}

impl RetrievedChunk {
    /// First `max_chars` characters of the chunk, for compact display.
    pub fn preview(&self, max_chars: usize) -> String {
        let mut s: String = self.text.chars().take(max_chars).collect();
        if self.text.chars().count() > max_chars {
            s.push('…');
        }
        s
    }
}

/// The answer to one question, with the evidence that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// The model's answer text.
    pub text: String,
    /// The retrieved chunks that were stuffed into the prompt, best first.
    pub sources: Vec<RetrievedChunk>,
    /// Token usage of the completion call (the question-embedding call is
    /// tracked separately on the session's usage totals).
    pub usage: TokenUsage,
    /// Wall-clock time for the whole ask, in milliseconds.
    pub duration_ms: u64,
    /// Chat model that generated the answer.
    pub model: String,
}

/// Facts about the index a session is holding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of chunks in the index.
    pub chunk_count: usize,
    /// Embedding vector dimension.
    pub dimension: usize,
    /// Whether the index was loaded from the cache rather than built.
    pub cache_hit: bool,
    /// Embedding model the vectors came from.
    pub embedding_model: String,
    /// SHA-256 of the source document bytes (the cache key).
    pub content_sha256: String,
    /// Cache file location, when caching is enabled.
    pub cache_path: Option<PathBuf>,
}

/// Document facts readable without any API key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Display name of the document (file name or URL tail).
    pub name: String,
    /// Number of pages.
    pub page_count: usize,
    /// PDF specification version, e.g. "1.7".
    pub pdf_version: String,
    /// Whether the document is encrypted.
    pub encrypted: bool,
    /// Info-dictionary Title, when present.
    pub title: Option<String>,
    /// Info-dictionary Author, when present.
    pub author: Option<String>,
    /// Info-dictionary Subject, when present.
    pub subject: Option<String>,
    /// Info-dictionary Creator (the authoring application), when present.
    pub creator: Option<String>,
    /// Info-dictionary Producer (the PDF writer), when present.
    pub producer: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_usage_total_and_add() {
        let mut u = TokenUsage {
            prompt_tokens: 100,
            completion_tokens: 40,
        };
        assert_eq!(u.total(), 140);
        u.add(TokenUsage {
            prompt_tokens: 10,
            completion_tokens: 5,
        });
        assert_eq!(u.prompt_tokens, 110);
        assert_eq!(u.completion_tokens, 45);
    }

    #[test]
    fn preview_truncates_on_char_boundaries() {
        let c = RetrievedChunk {
            ordinal: 0,
            score: 0.9,
            text: "héllo wörld".to_string(),
        };
        assert_eq!(c.preview(5), "héllo…");
        assert_eq!(c.preview(100), "héllo wörld");
    }

    #[test]
    fn answer_serialises_with_stable_field_names() {
        let a = Answer {
            text: "42".into(),
            sources: vec![],
            usage: TokenUsage::default(),
            duration_ms: 7,
            model: "gpt-4o-mini".into(),
        };
        let json = serde_json::to_string(&a).unwrap();
        assert!(json.contains("\"text\""));
        assert!(json.contains("\"sources\""));
        assert!(json.contains("\"duration_ms\""));
    }
}
