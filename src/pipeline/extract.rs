//! Text extraction: pull the text layer out of a PDF, page by page.
//!
//! ## Why spawn_blocking?
//!
//! Parsing a PDF walks the whole cross-reference table and decompresses
//! every content stream; on a large document that is hundreds of
//! milliseconds of pure CPU. `tokio::task::spawn_blocking` moves the work
//! onto the blocking thread pool so the async workers stay responsive.
//!
//! ## Why per-page extraction?
//!
//! One malformed page (a broken font dictionary, an unsupported encoding)
//! should not cost the caller the other 200 pages. Each page is extracted
//! on its own; failures are logged and skipped. Only a document where *no*
//! page yields text is an error, because answering questions over an empty
//! index would silently produce ungrounded answers.

use crate::error::PdfChatError;
use crate::output::DocumentMetadata;
use crate::pipeline::input::SourceDocument;
use lopdf::{Dictionary, Document, Object};
use tracing::{debug, warn};

/// The extracted text of a document, pages concatenated in page order.
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    /// Number of pages in the document (including pages that yielded no text).
    pub page_count: usize,
    /// Whitespace-normalised text; pages joined with a single newline.
    pub text: String,
}

/// Extract the text of every page.
///
/// Runs inside `spawn_blocking`; see the module docs.
pub async fn extract_text(source: &SourceDocument) -> Result<ExtractedDocument, PdfChatError> {
    let name = source.name.clone();
    let bytes = source.bytes.clone();
    tokio::task::spawn_blocking(move || extract_text_blocking(&name, &bytes))
        .await
        .map_err(|e| PdfChatError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Blocking implementation of text extraction.
fn extract_text_blocking(name: &str, bytes: &[u8]) -> Result<ExtractedDocument, PdfChatError> {
    let doc = Document::load_mem(bytes).map_err(|e| PdfChatError::CorruptPdf {
        name: name.to_string(),
        detail: e.to_string(),
    })?;

    if doc.is_encrypted() {
        return Err(PdfChatError::EncryptedPdf {
            name: name.to_string(),
        });
    }

    let pages = doc.get_pages();
    let page_count = pages.len();
    debug!("PDF loaded: {} pages", page_count);

    let mut page_texts: Vec<String> = Vec::with_capacity(page_count);
    for (page_no, _) in pages {
        match doc.extract_text(&[page_no]) {
            Ok(raw) => {
                let cleaned = normalise_whitespace(&raw);
                if cleaned.is_empty() {
                    debug!("Page {} has no text layer", page_no);
                } else {
                    page_texts.push(cleaned);
                }
            }
            Err(e) => {
                warn!("Skipping page {}: {}", page_no, e);
            }
        }
    }

    if page_texts.is_empty() {
        return Err(PdfChatError::EmptyDocument {
            name: name.to_string(),
            pages: page_count,
        });
    }

    Ok(ExtractedDocument {
        page_count,
        text: page_texts.join("\n"),
    })
}

/// Read document facts without extracting any text. Never needs an API key.
pub async fn read_metadata(source: &SourceDocument) -> Result<DocumentMetadata, PdfChatError> {
    let name = source.name.clone();
    let bytes = source.bytes.clone();
    tokio::task::spawn_blocking(move || read_metadata_blocking(&name, &bytes))
        .await
        .map_err(|e| PdfChatError::Internal(format!("Metadata task panicked: {}", e)))?
}

/// Blocking implementation of metadata reading.
fn read_metadata_blocking(name: &str, bytes: &[u8]) -> Result<DocumentMetadata, PdfChatError> {
    let doc = Document::load_mem(bytes).map_err(|e| PdfChatError::CorruptPdf {
        name: name.to_string(),
        detail: e.to_string(),
    })?;

    let info = info_dict(&doc);
    let field = |key: &[u8]| -> Option<String> {
        let obj = info.and_then(|d| d.get(key).ok())?;
        match obj {
            Object::String(raw, _) => decode_pdf_string(raw),
            _ => None,
        }
    };

    Ok(DocumentMetadata {
        name: name.to_string(),
        page_count: doc.get_pages().len(),
        pdf_version: doc.version.clone(),
        encrypted: doc.is_encrypted(),
        title: field(b"Title"),
        author: field(b"Author"),
        subject: field(b"Subject"),
        creator: field(b"Creator"),
        producer: field(b"Producer"),
    })
}

/// The trailer's Info entry, whether inline or behind a reference.
fn info_dict(doc: &Document) -> Option<&Dictionary> {
    match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_dict().ok(),
        Object::Dictionary(d) => Some(d),
        _ => None,
    }
}

/// Decode a PDF text string: UTF-16BE with BOM, else UTF-8, else Latin-1.
fn decode_pdf_string(raw: &[u8]) -> Option<String> {
    let decoded = if raw.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = raw[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        match std::str::from_utf8(raw) {
            Ok(s) => s.to_string(),
            Err(_) => raw.iter().map(|&b| b as char).collect(),
        }
    };
    let trimmed = decoded.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Collapse runs of whitespace to single spaces.
///
/// Layout-driven extraction is full of spurious line breaks and double
/// spaces; none of it carries meaning for embedding or retrieval.
fn normalise_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
