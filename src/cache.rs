//! Content-addressed index cache.
//!
//! ## Why hash the bytes and not the file name?
//!
//! A cache keyed by file name serves stale entries the moment a document is
//! replaced under the same name — the classic "updated report.pdf, got
//! yesterday's answers" failure. The key here is the SHA-256 of the raw PDF
//! bytes: same bytes, same entry; new bytes, new entry, regardless of what
//! the file is called. The stem appears in the file name purely so a cache
//! directory is readable to humans.
//!
//! Loads are forgiving (anything suspect is a miss and gets recomputed);
//! writes are atomic (temp file + rename), so a concurrent reader never sees
//! a torn entry and concurrent writers race benignly to the same content.

use crate::error::PdfChatError;
use crate::pipeline::index::SemanticIndex;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Hex SHA-256 of the document bytes. The cache key.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Cache file path for a document: `{stem}.{hash prefix}.index.json`.
pub fn cache_path(cache_dir: &Path, stem: &str, content_sha256: &str) -> PathBuf {
    let short = &content_sha256[..16.min(content_sha256.len())];
    cache_dir.join(format!("{stem}.{short}.index.json"))
}

/// Try to load a cached index.
///
/// Every failure mode is a miss, never an error: a missing file, unreadable
/// bytes, corrupt JSON, or an entry built from different content, a
/// different embedding model, or an older format all mean "recompute". The
/// cache must not be able to break the pipeline.
pub async fn load(
    path: &Path,
    content_sha256: &str,
    embedding_model: &str,
) -> Option<SemanticIndex> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("Ignoring unreadable cache file {}: {}", path.display(), e);
            return None;
        }
    };

    let index: SemanticIndex = match serde_json::from_slice(&bytes) {
        Ok(index) => index,
        Err(e) => {
            warn!("Ignoring corrupt cache file {}: {}", path.display(), e);
            return None;
        }
    };

    if !index.matches(content_sha256, embedding_model) {
        debug!(
            "Cache file {} is for different content, model, or format",
            path.display()
        );
        return None;
    }

    debug!(
        "Loaded cached index ({} chunks) from {}",
        index.len(),
        path.display()
    );
    Some(index)
}

/// Persist an index atomically (temp file + rename).
pub async fn store(path: &Path, index: &SemanticIndex) -> Result<(), PdfChatError> {
    let json = serde_json::to_vec(index)
        .map_err(|e| PdfChatError::Internal(format!("serialising index: {e}")))?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PdfChatError::CacheWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    // Temp name unique per process AND per call, so concurrent writers —
    // including two tasks in the same process — never share a temp file;
    // the rename is last-writer-wins.
    static STORE_SEQ: AtomicU64 = AtomicU64::new(0);
    let tmp_path = path.with_extension(format!(
        "tmp.{}.{}",
        std::process::id(),
        STORE_SEQ.fetch_add(1, Ordering::Relaxed)
    ));
    tokio::fs::write(&tmp_path, &json)
        .await
        .map_err(|e| PdfChatError::CacheWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| PdfChatError::CacheWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    debug!(
        "Stored index ({} chunks, {} bytes) at {}",
        index.len(),
        json.len(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::index::{IndexedChunk, INDEX_FORMAT_VERSION};

    fn sample_index(content_sha256: &str) -> SemanticIndex {
        SemanticIndex {
            format_version: INDEX_FORMAT_VERSION,
            embedding_model: "test-model".into(),
            content_sha256: content_sha256.into(),
            dimension: 2,
            chunks: vec![IndexedChunk {
                ordinal: 0,
                text: "alpha".into(),
                embedding: vec![0.1, 0.9],
            }],
        }
    }

    #[test]
    fn content_hash_is_stable_and_content_sensitive() {
        let a = content_hash(b"hello");
        let b = content_hash(b"hello");
        let c = content_hash(b"hello!");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn cache_paths_differ_by_content_not_name() {
        let dir = Path::new("/tmp/cache");
        let hash_a = content_hash(b"version one");
        let hash_b = content_hash(b"version two");
        let path_a = cache_path(dir, "report", &hash_a);
        let path_b = cache_path(dir, "report", &hash_b);
        assert_ne!(path_a, path_b);
        assert!(path_a.to_string_lossy().ends_with(".index.json"));
        assert!(path_a.to_string_lossy().contains("report"));
    }

    #[tokio::test]
    async fn store_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let hash = content_hash(b"doc bytes");
        let path = cache_path(dir.path(), "doc", &hash);
        let index = sample_index(&hash);

        store(&path, &index).await.unwrap();
        let loaded = load(&path, &hash, "test-model").await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.chunks[0].text, "alpha");
        assert_eq!(loaded.content_sha256, hash);
    }

    #[tokio::test]
    async fn missing_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nothing.index.json");
        assert!(load(&path, "aa", "test-model").await.is_none());
    }

    #[tokio::test]
    async fn corrupt_json_is_a_miss_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.index.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();
        assert!(load(&path, "aa", "test-model").await.is_none());
    }

    #[tokio::test]
    async fn mismatched_content_or_model_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let hash = content_hash(b"original");
        let path = cache_path(dir.path(), "doc", &hash);
        store(&path, &sample_index(&hash)).await.unwrap();

        assert!(load(&path, "different-hash", "test-model").await.is_none());
        assert!(load(&path, &hash, "other-model").await.is_none());
        assert!(load(&path, &hash, "test-model").await.is_some());
    }

    #[tokio::test]
    async fn store_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let hash = content_hash(b"x");
        let path = cache_path(&nested, "doc", &hash);
        store(&path, &sample_index(&hash)).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn concurrent_stores_to_the_same_path_both_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let hash = content_hash(b"shared");
        let path = cache_path(dir.path(), "doc", &hash);
        let index = sample_index(&hash);

        // Two writers racing to the same entry must not trip over each
        // other's temp files; both renames land, last writer wins.
        let (a, b) = tokio::join!(store(&path, &index), store(&path, &index));
        a.unwrap();
        b.unwrap();

        assert!(load(&path, &hash, "test-model").await.is_some());
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries.len(), 1, "unexpected files: {entries:?}");
    }

    #[tokio::test]
    async fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let hash = content_hash(b"y");
        let path = cache_path(dir.path(), "doc", &hash);
        store(&path, &sample_index(&hash)).await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries.len(), 1, "unexpected files: {entries:?}");
        assert!(entries[0].ends_with(".index.json"));
    }
}
