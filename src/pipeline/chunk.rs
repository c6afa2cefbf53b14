//! Chunking: split document text into fixed-size overlapping windows.
//!
//! Windows are measured in characters, never bytes, so multi-byte text can
//! never split inside a code point. Guarantees, for `overlap < max_size`:
//!
//! * text no longer than `max_size` comes back as exactly one chunk;
//! * consecutive chunks share exactly `overlap` characters;
//! * every character of the input appears in at least one chunk;
//! * the splitter always advances, so it terminates on any input.

/// Split `text` into chunks of at most `max_size` characters, consecutive
/// chunks overlapping by `overlap` characters.
///
/// Empty input produces no chunks. The final chunk may be shorter than
/// `max_size`.
pub fn split_text(text: &str, max_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    if chars.len() <= max_size {
        return vec![text.to_string()];
    }

    // Step is clamped to keep moving even on a degenerate overlap; the
    // config builder rejects overlap >= max_size before we get here.
    let step = max_size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::with_capacity(chars.len() / step + 1);
    let mut start = 0usize;
    loop {
        let end = (start + max_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: usize = 1000;
    const OVERLAP: usize = 200;

    /// Deterministic text where every position has a distinct-ish character,
    /// so overlap assertions can't pass by accident.
    fn cyclic_text(len: usize) -> String {
        (0..len)
            .map(|i| (b'a' + (i % 26) as u8) as char)
            .collect()
    }

    fn expected_count(len: usize, max: usize, overlap: usize) -> usize {
        if len <= max {
            1
        } else {
            // ceil((len - overlap) / (max - overlap))
            let step = max - overlap;
            (len - overlap).div_ceil(step)
        }
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let text = cyclic_text(999);
        let chunks = split_text(&text, MAX, OVERLAP);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], text);
    }

    #[test]
    fn text_exactly_max_size_is_a_single_chunk() {
        let text = cyclic_text(MAX);
        let chunks = split_text(&text, MAX, OVERLAP);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], text);
    }

    #[test]
    fn empty_text_produces_no_chunks() {
        assert!(split_text("", MAX, OVERLAP).is_empty());
    }

    #[test]
    fn chunk_count_matches_the_window_formula() {
        for len in [1001, 1800, 1801, 2600, 5000, 12_345] {
            let chunks = split_text(&cyclic_text(len), MAX, OVERLAP);
            assert_eq!(
                chunks.len(),
                expected_count(len, MAX, OVERLAP),
                "wrong chunk count for len={len}"
            );
        }
    }

    #[test]
    fn consecutive_chunks_share_exactly_the_overlap() {
        let chunks = split_text(&cyclic_text(3750), MAX, OVERLAP);
        assert!(chunks.len() > 2);
        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].chars().collect();
            let next: Vec<char> = pair[1].chars().collect();
            let tail: String = prev[prev.len() - OVERLAP..].iter().collect();
            let head: String = next[..OVERLAP].iter().collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn chunks_reconstruct_the_original_text() {
        let text = cyclic_text(4321);
        let chunks = split_text(&text, MAX, OVERLAP);
        let mut rebuilt: String = chunks[0].clone();
        for chunk in &chunks[1..] {
            rebuilt.extend(chunk.chars().skip(OVERLAP));
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn no_chunk_exceeds_max_size() {
        let chunks = split_text(&cyclic_text(9999), MAX, OVERLAP);
        assert!(chunks.iter().all(|c| c.chars().count() <= MAX));
        // All but the last are full windows.
        assert!(chunks[..chunks.len() - 1]
            .iter()
            .all(|c| c.chars().count() == MAX));
    }

    #[test]
    fn windows_are_counted_in_characters_not_bytes() {
        let text: String = std::iter::repeat('é').take(1500).collect();
        let chunks = split_text(&text, MAX, OVERLAP);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), MAX);
        // 2-byte char: byte length doubles, char math must not care.
        assert_eq!(chunks[0].len(), MAX * 2);
    }

    #[test]
    fn small_windows_behave_the_same() {
        let text = cyclic_text(25);
        let chunks = split_text(&text, 10, 3);
        assert_eq!(chunks.len(), expected_count(25, 10, 3));
        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].chars().collect();
            let head: String = pair[1].chars().take(3).collect();
            let tail: String = prev[prev.len() - 3..].iter().collect();
            assert_eq!(tail, head);
        }
    }
}
