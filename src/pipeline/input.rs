//! Input resolution: normalise a user-supplied path or URL to PDF bytes.
//!
//! ## Why bytes in memory?
//!
//! Everything downstream wants the raw bytes: the content hash that keys the
//! index cache is computed over them, and the parser reads from a buffer, not
//! a path. Reading the whole document up front also means a URL input needs
//! no temp file at all. We validate the PDF magic bytes (`%PDF`) before
//! returning so callers get a meaningful error rather than a parser failure
//! three stages later.

use crate::config::PipelineConfig;
use crate::error::PdfChatError;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The resolved input: a display name, a cache-friendly stem, and the bytes.
pub struct SourceDocument {
    /// File name or URL tail, e.g. "manual.pdf".
    pub name: String,
    /// `name` without its extension; used in cache file names.
    pub stem: String,
    /// The raw PDF bytes.
    pub bytes: Vec<u8>,
}

impl fmt::Debug for SourceDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceDocument")
            .field("name", &self.name)
            .field("stem", &self.stem)
            .field("bytes", &format_args!("{} bytes", self.bytes.len()))
            .finish()
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to an in-memory PDF document.
///
/// If the input is a URL, download it (honoring the config's download
/// timeout). If it is a local file, validate it exists and is readable.
pub async fn resolve_input(
    input: &str,
    config: &PipelineConfig,
) -> Result<SourceDocument, PdfChatError> {
    let doc = if is_url(input) {
        download_url(input, config.download_timeout_secs).await?
    } else {
        resolve_local(input).await?
    };
    validate_magic(&doc.name, &doc.bytes)?;
    Ok(doc)
}

/// Read a local file, mapping the failure modes callers actually hit.
async fn resolve_local(path_str: &str) -> Result<SourceDocument, PdfChatError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PdfChatError::FileNotFound { path });
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(PdfChatError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(PdfChatError::InvalidInput {
                input: path_str.to_string(),
            });
        }
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_str.to_string());
    debug!("Resolved local PDF: {} ({} bytes)", path.display(), bytes.len());

    Ok(SourceDocument {
        stem: stem_of(&name),
        name,
        bytes,
    })
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<SourceDocument, PdfChatError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| PdfChatError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            PdfChatError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            PdfChatError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(PdfChatError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let name = extract_filename(url);
    let bytes = response
        .bytes()
        .await
        .map_err(|e| PdfChatError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?
        .to_vec();

    info!("Downloaded {} ({} bytes)", name, bytes.len());

    Ok(SourceDocument {
        stem: stem_of(&name),
        name,
        bytes,
    })
}

/// The first four bytes of every PDF are `%PDF`.
fn validate_magic(name: &str, bytes: &[u8]) -> Result<(), PdfChatError> {
    let mut magic = [0u8; 4];
    let head = bytes.get(..4).unwrap_or(&[]);
    magic[..head.len()].copy_from_slice(head);
    if &magic != b"%PDF" {
        return Err(PdfChatError::NotAPdf {
            name: name.to_string(),
            magic,
        });
    }
    Ok(())
}

/// Extract a reasonable file name from the URL path.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }
    "downloaded.pdf".to_string()
}

/// File stem of a display name ("report.pdf" → "report").
fn stem_of(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn extract_filename_prefers_the_url_tail() {
        assert_eq!(
            extract_filename("https://example.com/papers/attention.pdf"),
            "attention.pdf"
        );
        assert_eq!(
            extract_filename("https://example.com/papers/attention.pdf?dl=1"),
            "attention.pdf"
        );
        assert_eq!(extract_filename("https://example.com/"), "downloaded.pdf");
        assert_eq!(
            extract_filename("https://example.com/no-extension"),
            "downloaded.pdf"
        );
    }

    #[test]
    fn stems_drop_the_extension_only() {
        assert_eq!(stem_of("report.pdf"), "report");
        assert_eq!(stem_of("archive.tar.pdf"), "archive.tar");
        assert_eq!(stem_of("noext"), "noext");
    }

    #[test]
    fn magic_validation_rejects_non_pdfs() {
        assert!(validate_magic("ok.pdf", b"%PDF-1.7 ...").is_ok());
        let err = validate_magic("nope.txt", b"hello world").unwrap_err();
        assert!(matches!(err, PdfChatError::NotAPdf { .. }));
        // Shorter than the magic itself.
        let err = validate_magic("tiny.pdf", b"%P").unwrap_err();
        assert!(matches!(err, PdfChatError::NotAPdf { .. }));
    }

    #[tokio::test]
    async fn missing_file_is_reported_as_such() {
        let err = resolve_local("/no/such/file.pdf").await.unwrap_err();
        assert!(matches!(err, PdfChatError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn local_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.pdf");
        std::fs::write(&path, b"%PDF-1.4 fake body").unwrap();

        let doc = resolve_local(path.to_str().unwrap()).await.unwrap();
        assert_eq!(doc.name, "sample.pdf");
        assert_eq!(doc.stem, "sample");
        assert!(doc.bytes.starts_with(b"%PDF"));
    }
}
