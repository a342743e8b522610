//! Recursive separator-based text splitting.
//!
//! Documents are first cut into pieces no larger than the target size, trying
//! coarse boundaries before fine ones: paragraph breaks, then line breaks,
//! then spaces, then raw character positions. Pieces keep their trailing
//! separator, so concatenating them reproduces the source text byte for byte.
//! A greedy merge then packs pieces into chunks up to the target size and
//! carries a piece-aligned tail of the previous chunk forward as overlap.
//!
//! Sizes are measured in bytes, which matches character counts for the ASCII
//! text that dominates documentation sites; multi-byte characters are never
//! split mid-codepoint.

use crate::source::Document;

use super::types::{Chunk, ChunkingError};

/// Boundary preference for recursive splitting, coarsest first.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Split one document into an ordered sequence of overlapping chunks.
///
/// Deterministic: identical input and parameters always produce an identical
/// chunk sequence, which is what keeps `(source_url, chunk_index)` a stable
/// identity across re-ingestion runs. A document shorter than `target_size`
/// yields exactly one chunk with no overlap applied.
pub fn split_document(
    document: &Document,
    target_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>, ChunkingError> {
    if target_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if overlap >= target_size {
        return Err(ChunkingError::InvalidOverlap {
            overlap,
            chunk_size: target_size,
        });
    }
    if document.raw_content.trim().is_empty() {
        return Err(ChunkingError::EmptyDocument);
    }

    let pieces = split_recursive(&document.raw_content, target_size, &SEPARATORS);
    let merged = merge_pieces(&pieces, target_size, overlap);

    Ok(merged
        .into_iter()
        .enumerate()
        .map(|(chunk_index, text)| Chunk {
            source_url: document.source_url.clone(),
            chunk_index,
            text,
        })
        .collect())
}

/// Cut `text` into pieces of at most `target` bytes, preferring the earliest
/// separator in `separators` that actually occurs in the oversized region.
fn split_recursive<'a>(text: &'a str, target: usize, separators: &[&str]) -> Vec<&'a str> {
    if text.len() <= target {
        return vec![text];
    }

    let Some((separator, finer)) = separators.split_first() else {
        return split_at_char_boundaries(text, target);
    };

    if !text.contains(separator) {
        return split_recursive(text, target, finer);
    }

    let mut pieces = Vec::new();
    for piece in split_keeping_separator(text, separator) {
        if piece.len() <= target {
            pieces.push(piece);
        } else {
            pieces.extend(split_recursive(piece, target, finer));
        }
    }
    pieces
}

/// Split on `separator`, keeping each separator attached to the piece before
/// it so no bytes are lost.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut pieces = Vec::new();
    let mut start = 0;

    while let Some(position) = text[start..].find(separator) {
        let end = start + position + separator.len();
        pieces.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        pieces.push(&text[start..]);
    }

    pieces
}

/// Last-resort split for runs of text with no usable separator.
fn split_at_char_boundaries(text: &str, target: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + target).min(text.len());
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        if end == start {
            // target is smaller than one character; take the whole character
            end = text[start..]
                .char_indices()
                .nth(1)
                .map(|(offset, _)| start + offset)
                .unwrap_or(text.len());
        }
        pieces.push(&text[start..end]);
        start = end;
    }

    pieces
}

/// Greedily pack pieces into chunks of at most `target` bytes.
///
/// When a chunk fills up, trailing pieces totalling at most `overlap` bytes
/// are carried into the next chunk, and further pieces are dropped from the
/// front until the incoming piece fits. Every emitted chunk therefore stays
/// within the target budget and begins with at most `overlap` bytes of
/// repeated text.
fn merge_pieces(pieces: &[&str], target: usize, overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut window: Vec<&str> = Vec::new();
    let mut window_len = 0;

    for &piece in pieces {
        if !window.is_empty() && window_len + piece.len() > target {
            chunks.push(window.concat());
            while window_len > overlap
                || (window_len > 0 && window_len + piece.len() > target)
            {
                let removed = window.remove(0);
                window_len -= removed.len();
            }
        }
        window.push(piece);
        window_len += piece.len();
    }

    if !window.is_empty() {
        chunks.push(window.concat());
    }

    chunks
}
