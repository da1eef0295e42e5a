//! Fixed-size overlapping window chunker.
//!
//! Splits extracted document text into windows of `size` characters, each
//! window starting `size - overlap` characters after the previous one.
//! Fragments are trimmed and whitespace-only fragments are dropped; for
//! non-empty input the result is never empty (the whole text is returned
//! as a single fragment if splitting produced nothing usable).
//!
//! This is a pure function: no I/O, same input always yields the same
//! output.

use tracing::warn;

/// Split `text` into overlapping windows of `size` characters.
///
/// `overlap >= size` is a degenerate input, not an error: it is corrected
/// to `overlap = 0` and logged. Window boundaries are counted in chars,
/// so multi-byte input never splits inside a code point.
pub fn chunk_text(text: &str, size: usize, mut overlap: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    if overlap >= size {
        warn!(
            size,
            overlap, "chunk overlap must be smaller than chunk size; using overlap = 0"
        );
        overlap = 0;
    }

    // Byte offsets of every char boundary, with the text length appended so
    // bounds[i]..bounds[j] is always a valid slice of j - i chars.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total_chars = bounds.len() - 1;

    let mut fragments = Vec::new();
    let mut start = 0usize;

    while start < total_chars {
        let end = (start + size).min(total_chars);
        fragments.push(&text[bounds[start]..bounds[end]]);

        // Advance by the stride; force progress when overlap is large
        // relative to the remaining text.
        let next = start + size.saturating_sub(overlap);
        start = if next > start { next } else { start + 1 };
    }

    let mut chunks: Vec<String> = fragments
        .into_iter()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect();

    // Never return an empty sequence for non-empty input.
    if chunks.is_empty() {
        chunks.push(text.to_string());
    }

    chunks
}
