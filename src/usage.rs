//! Session-wide token usage accounting.
//!
//! Every model interaction runs inside an [`InteractionScope`] obtained from
//! the session's [`UsageTracker`]. The scope folds its numbers into the
//! shared totals in `Drop`, so an interaction is accounted for on every exit
//! path: normal return, `?` propagation, and panic unwind alike. Callers can
//! take a [`UsageSnapshot`] at any point; the CLI prints one when a session
//! ends.

use crate::output::TokenUsage;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// What kind of model call a scope covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    /// An embeddings request (chunks or a question).
    Embedding,
    /// A chat completion request (answer generation).
    Completion,
}

impl InteractionKind {
    fn label(self) -> &'static str {
        match self {
            InteractionKind::Embedding => "embedding",
            InteractionKind::Completion => "completion",
        }
    }
}

#[derive(Default)]
struct Totals {
    interactions: AtomicU64,
    embedding_prompt_tokens: AtomicU64,
    completion_prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
}

/// Cheaply cloneable handle over a session's usage totals.
///
/// Clones share the same counters, so the pipeline can hand one to each
/// stage while the caller keeps another for reporting.
#[derive(Clone, Default)]
pub struct UsageTracker {
    totals: Arc<Totals>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a scope for one model interaction.
    ///
    /// Hold the scope across the API call and record the token counts the
    /// response reported; dropping it (however the call ended) commits the
    /// numbers to the session totals.
    pub fn begin(&self, kind: InteractionKind) -> InteractionScope {
        InteractionScope {
            tracker: self.clone(),
            kind,
            started: Instant::now(),
            usage: TokenUsage::default(),
        }
    }

    /// Current totals. Consistent but not atomic across fields while
    /// interactions are in flight.
    pub fn snapshot(&self) -> UsageSnapshot {
        // Counters only, no cross-field ordering dependencies.
        let t = &self.totals;
        UsageSnapshot {
            interactions: t.interactions.load(Ordering::Relaxed),
            embedding_prompt_tokens: t.embedding_prompt_tokens.load(Ordering::Relaxed),
            completion_prompt_tokens: t.completion_prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: t.completion_tokens.load(Ordering::Relaxed),
        }
    }
}

/// RAII guard around one model interaction.
///
/// Created by [`UsageTracker::begin`]. The `Drop` impl commits whatever was
/// recorded, so an error return between `begin` and the response still counts
/// the interaction and its duration.
pub struct InteractionScope {
    tracker: UsageTracker,
    kind: InteractionKind,
    started: Instant,
    usage: TokenUsage,
}

impl InteractionScope {
    /// Record the token counts reported by the API response.
    ///
    /// May be called more than once (retried calls); counts accumulate.
    pub fn record_tokens(&mut self, prompt_tokens: u64, completion_tokens: u64) {
        self.usage.add(TokenUsage {
            prompt_tokens,
            completion_tokens,
        });
    }

    /// Tokens recorded on this scope so far.
    pub fn usage(&self) -> TokenUsage {
        self.usage
    }
}

impl Drop for InteractionScope {
    fn drop(&mut self) {
        let t = &self.tracker.totals;
        t.interactions.fetch_add(1, Ordering::Relaxed);
        match self.kind {
            InteractionKind::Embedding => {
                t.embedding_prompt_tokens
                    .fetch_add(self.usage.prompt_tokens, Ordering::Relaxed);
            }
            InteractionKind::Completion => {
                t.completion_prompt_tokens
                    .fetch_add(self.usage.prompt_tokens, Ordering::Relaxed);
                t.completion_tokens
                    .fetch_add(self.usage.completion_tokens, Ordering::Relaxed);
            }
        }
        debug!(
            "{} interaction finished in {}ms ({} prompt + {} completion tokens)",
            self.kind.label(),
            self.started.elapsed().as_millis(),
            self.usage.prompt_tokens,
            self.usage.completion_tokens
        );
    }
}

/// A point-in-time copy of a session's usage totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Model interactions started (embedding and completion calls).
    pub interactions: u64,
    /// Prompt tokens spent on embeddings.
    pub embedding_prompt_tokens: u64,
    /// Prompt tokens spent on completions.
    pub completion_prompt_tokens: u64,
    /// Tokens generated by completions.
    pub completion_tokens: u64,
}

impl UsageSnapshot {
    /// All tokens, both directions, both kinds of call.
    pub fn total_tokens(&self) -> u64 {
        self.embedding_prompt_tokens + self.completion_prompt_tokens + self.completion_tokens
    }
}
