//! Pipeline stages for document question answering.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. a different chunking strategy) without
//! touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ chunk ──▶ index ──▶ answer
//! (URL/path)  (lopdf)   (windows) (embed)  (retrieve + complete)
//! ```
//!
//! 1. [`input`]   — normalise the user-supplied path or URL to in-memory bytes
//! 2. [`extract`] — parse the PDF and pull page text in document order; runs
//!    in `spawn_blocking` because parsing is CPU-bound
//! 3. [`chunk`]   — split the text into overlapping character windows
//! 4. [`index`]   — embed every chunk and assemble the searchable index; the
//!    first stage with network I/O
//! 5. [`answer`]  — embed the question, retrieve the nearest chunks, and ask
//!    the chat model with those chunks as context

pub mod answer;
pub mod chunk;
pub mod extract;
pub mod index;
pub mod input;
