//! Prompts for grounded question answering.
//!
//! Centralising the prompt text here serves two purposes:
//!
//! 1. **Single source of truth** — tightening the grounding rules or the
//!    refusal wording requires editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect the assembled prompt without
//!    calling a real model, so a template regression is caught immediately.

/// System prompt for answering questions over retrieved document excerpts.
///
/// The model is told to answer from the provided excerpts only. Without the
/// explicit refusal instruction, chat models happily fill gaps from their
/// training data, which defeats the point of grounding answers in the
/// document.
pub const QA_SYSTEM_PROMPT: &str = r#"You are a careful assistant answering questions about a document.

Follow these rules precisely:

1. Answer using ONLY the document excerpts provided in the user message.
2. If the excerpts do not contain the answer, say so plainly: "The document
   does not appear to contain this information." Do not guess.
3. Do not mention the excerpts, chunks, or retrieval. Answer as if you had
   read the document.
4. Be concise. Quote short phrases from the document where they help.
5. Answer in the language of the question."#;

/// Assemble the user message: retrieved excerpts above the question.
///
/// Excerpts appear in retrieval order (best match first), separated by blank
/// lines. The trailing "Answer:" nudges completion-tuned models to answer
/// directly instead of restating the question.
pub fn user_prompt(question: &str, excerpts: &[&str]) -> String {
    let context = excerpts.join("\n\n");
    format!(
        "Document excerpts:\n\n{}\n\nQuestion: {}\n\nAnswer:",
        context, question
    )
}
