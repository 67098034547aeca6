//! Page text chunking.
//!
//! This module provides the [`Chunker`] trait and [`RecursiveChunker`], which
//! cuts text on the most semantic boundary available (paragraph, line,
//! sentence, word) and then packs the pieces into overlapping chunks.
//!
//! Chunks are contiguous spans of the input. Consecutive chunks share exactly
//! `chunk_overlap` characters: the tail of chunk `i` is the head of chunk
//! `i + 1`. Lengths are counted in `char`s, not bytes.

use std::ops::Range;

use crate::config::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, validate_chunking};
use crate::error::Result;

/// Separators tried in priority order: paragraph, line, sentence, word.
pub const DEFAULT_SEPARATORS: [&str; 6] = ["\n\n", "\n", ".", "!", "?", " "];

/// A strategy for splitting page text into chunk texts.
///
/// Implementations must be pure: the same input always yields the same output.
pub trait Chunker: Send + Sync {
    /// Split `text` into ordered chunk texts.
    ///
    /// Returns an empty `Vec` for empty or whitespace-only text.
    fn split(&self, text: &str) -> Vec<String>;
}

impl<T: Chunker + ?Sized> Chunker for std::sync::Arc<T> {
    fn split(&self, text: &str) -> Vec<String> {
        (**self).split(text)
    }
}

/// Splits text on a separator cascade and packs the pieces into overlapping chunks.
///
/// Text is first cut into *pieces* of at most `chunk_size - chunk_overlap`
/// characters, using the highest-priority separator that occurs in an
/// oversized span and recursing into whatever is still too long. Separators
/// stay attached to the end of the piece they terminate. A span that no
/// separator can shrink (a single very long word) becomes one piece as is.
///
/// Pieces are then packed greedily into chunks of at most `chunk_size`
/// characters. Each new chunk starts `chunk_overlap` characters before the end
/// of the previous one.
///
/// # Example
///
/// ```rust,ignore
/// use pdfchat_rag::{Chunker, RecursiveChunker};
///
/// let chunker = RecursiveChunker::new(500, 50)?;
/// let chunks = chunker.split(&page.text_content);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker` with the default separators.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`](crate::RagError::InvalidConfiguration)
    /// if `chunk_size` is zero or `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate_chunking(chunk_size, chunk_overlap)?;
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Replace the separator cascade. Empty separators are ignored.
    pub fn with_separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.separators =
            separators.into_iter().map(Into::into).filter(|s: &String| !s.is_empty()).collect();
        self
    }

    /// Maximum chunk size in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Overlap between consecutive chunks in characters.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Largest piece that still fits in a chunk behind a full overlap.
    fn piece_budget(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }
}

impl Default for RecursiveChunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Chunker for RecursiveChunker {
    fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let separators: Vec<&str> = self.separators.iter().map(String::as_str).collect();
        let mut pieces = Vec::new();
        collect_pieces(text, 0, self.piece_budget(), &separators, &mut pieces);
        merge_pieces(text, &pieces, self.chunk_size, self.chunk_overlap)
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Cut `text` into byte ranges of at most `budget` characters where the
/// separators allow it. `offset` is the position of `text` in the page.
///
/// Base cases: the span already fits, or no separator is left to try.
fn collect_pieces(
    text: &str,
    offset: usize,
    budget: usize,
    separators: &[&str],
    out: &mut Vec<Range<usize>>,
) {
    if char_len(text) <= budget {
        out.push(offset..offset + text.len());
        return;
    }

    let Some((separator, remaining)) = separators.split_first() else {
        out.push(offset..offset + text.len());
        return;
    };

    if !text.contains(separator) {
        collect_pieces(text, offset, budget, remaining, out);
        return;
    }

    for segment in split_keeping_separator(text, separator) {
        collect_pieces(&text[segment.clone()], offset + segment.start, budget, remaining, out);
    }
}

/// Split text at a separator while keeping the separator attached to the preceding segment.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<Range<usize>> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(start..end);
        start = end;
    }

    if start < text.len() {
        result.push(start..text.len());
    }

    result
}

/// Pack contiguous pieces into chunks of at most `chunk_size` characters,
/// seeding every chunk after the first with the previous chunk's tail.
fn merge_pieces(
    text: &str,
    pieces: &[Range<usize>],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<String> {
    let lengths: Vec<usize> = pieces.iter().map(|p| char_len(&text[p.clone()])).collect();
    let content_end = text.trim_end().len();

    let mut chunks = Vec::new();
    let mut start = 0;
    // Characters between `start` and the first unconsumed piece.
    let mut carried = 0;
    let mut next = 0;

    while next < pieces.len() {
        // Always take one piece, even an oversized one.
        let mut len = carried + lengths[next];
        let mut end = pieces[next].end;
        next += 1;

        while next < pieces.len() && len + lengths[next] <= chunk_size {
            len += lengths[next];
            end = pieces[next].end;
            next += 1;
        }

        chunks.push(text[start..end].to_string());

        if end >= content_end {
            break;
        }

        start = overlap_start(text, start, end, chunk_overlap);
        carried = char_len(&text[start..end]);
    }

    chunks
}

/// Byte offset where the last `overlap` characters of `text[from..to]` begin,
/// clamped to `from`.
fn overlap_start(text: &str, from: usize, to: usize, overlap: usize) -> usize {
    if overlap == 0 {
        return to;
    }
    text[from..to].char_indices().rev().nth(overlap - 1).map_or(from, |(i, _)| from + i)
}
