//! Error types for the pdfchat library.
//!
//! A single [`PdfChatError`] enum covers every failure, with one variant per
//! way a stage can fail rather than a catch-all per stage. The grouping below
//! follows the pipeline order: input resolution, PDF parsing, provider calls,
//! cache I/O, configuration.
//!
//! Operator-facing variants carry a remediation hint in their `Display` text
//! (what flag or environment variable to set) so the CLI can print them
//! verbatim without a separate help lookup.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the pdfchat library.
#[derive(Debug, Error)]
pub enum PdfChatError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The input exists and was read, but is not a PDF.
    #[error("'{name}' is not a valid PDF\nFirst bytes: {magic:?}")]
    NotAPdf { name: String, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{name}' is corrupt: {detail}\nTry repairing with: qpdf input.pdf repaired.pdf")]
    CorruptPdf { name: String, detail: String },

    /// The document is encrypted; password-protected PDFs are not supported.
    #[error("PDF '{name}' is encrypted.\nDecrypt it first: qpdf --decrypt input.pdf decrypted.pdf")]
    EncryptedPdf { name: String },

    /// No page yielded any text. Usually a scanned document with no text
    /// layer; answering over it would stuff an empty context into the model.
    #[error(
        "No extractable text in '{name}' ({pages} pages).\n\
If this is a scanned document it has no text layer; run OCR on it first."
    )]
    EmptyDocument { name: String, pages: usize },

    // ── Question errors ───────────────────────────────────────────────────
    /// The question was empty or whitespace.
    #[error("Question is empty")]
    EmptyQuestion,

    // ── Provider errors ───────────────────────────────────────────────────
    /// No API key available from config or environment.
    #[error(
        "No API key configured.\n\n\
Provide one with any of:\n\
  • export OPENAI_API_KEY=sk-...\n\
  • an OPENAI_API_KEY=... line in a .env file next to where you run pdfchat\n\
  • --api-key on the command line\n"
    )]
    MissingApiKey,

    /// The embeddings endpoint returned a non-retryable error.
    #[error("Embedding request failed: {detail}")]
    EmbeddingFailed { detail: String },

    /// The chat completions endpoint returned a non-retryable error.
    #[error("Completion request failed: {detail}")]
    CompletionFailed { detail: String },

    /// API returned HTTP 429 — caller should back off.
    ///
    /// `retry_after_secs` carries the server-specified delay when the
    /// `Retry-After` header was present.
    #[error("Rate limit exceeded for model '{model}'")]
    RateLimited {
        model: String,
        retry_after_secs: Option<u64>,
    },

    /// API call timed out — the caller may retry.
    #[error("API call timed out after {secs}s\nIncrease --timeout or check the endpoint.")]
    ApiTimeout { secs: u64 },

    /// API returned an authentication error (401/403) — retry will not help.
    #[error("Authentication failed: {detail}\nCheck OPENAI_API_KEY is valid for the endpoint.")]
    AuthError { detail: String },

    // ── Cache I/O errors ──────────────────────────────────────────────────
    /// Could not create or write an index cache file.
    #[error("Failed to write index cache '{path}': {source}")]
    CacheWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}
