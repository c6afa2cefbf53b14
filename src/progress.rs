//! Progress-callback trait for index-building events.
//!
//! Inject an [`Arc<dyn IndexProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! real-time events while a document is being embedded.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a channel, a WebSocket, or a terminal progress bar
//! without the library knowing anything about how the host application
//! communicates. The trait is `Send + Sync` so it works when embedding
//! batches run concurrently.
//!
//! # Example
//!
//! ```rust
//! use pdfchat::{IndexProgressCallback, PipelineConfig};
//! use std::sync::Arc;
//!
//! struct StderrProgress;
//!
//! impl IndexProgressCallback for StderrProgress {
//!     fn on_chunks_embedded(&self, completed: usize, total: usize) {
//!         eprintln!("embedded {completed}/{total} chunks");
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(StderrProgress) as Arc<dyn IndexProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline while it builds (or loads) a document index.
///
/// Implementations must be `Send + Sync`; embedding batches are issued
/// concurrently, so `on_chunks_embedded` may be called from different tasks.
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait IndexProgressCallback: Send + Sync {
    /// Called once before any chunk is embedded.
    ///
    /// # Arguments
    /// * `total_chunks` — number of chunks that will be embedded
    fn on_index_start(&self, total_chunks: usize) {
        let _ = total_chunks;
    }

    /// Called after each embedding batch returns, with the cumulative count.
    ///
    /// # Arguments
    /// * `completed` — chunks embedded so far
    /// * `total`     — total chunks in the document
    fn on_chunks_embedded(&self, completed: usize, total: usize) {
        let _ = (completed, total);
    }

    /// Called instead of the embedding events when a cached index was loaded.
    ///
    /// # Arguments
    /// * `chunk_count` — number of chunks in the loaded index
    fn on_cache_hit(&self, chunk_count: usize) {
        let _ = chunk_count;
    }

    /// Called once when the index is ready, whether built or loaded.
    ///
    /// # Arguments
    /// * `chunk_count` — number of chunks in the index
    /// * `elapsed_ms`  — wall-clock time spent building or loading
    fn on_index_complete(&self, chunk_count: usize, elapsed_ms: u64) {
        let _ = (chunk_count, elapsed_ms);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl IndexProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn IndexProgressCallback>;
