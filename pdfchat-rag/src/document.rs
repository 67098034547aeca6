//! Data types for pages, chunks, corpora, and retrieval results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One page of a loaded document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page {
    /// 1-based page number.
    pub page_number: usize,
    /// The extracted text of the page.
    pub text_content: String,
    /// Key-value metadata reported by the loader.
    pub metadata: HashMap<String, String>,
}

impl Page {
    /// Create a page with no metadata.
    pub fn new(page_number: usize, text_content: impl Into<String>) -> Self {
        Self { page_number, text_content: text_content.into(), metadata: HashMap::new() }
    }
}

/// A bounded-length segment of a [`Page`], the unit of retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Identifier of the form `{document_id}_{sequence_index}`.
    pub id: String,
    /// The text content of the chunk.
    pub text: String,
    /// Page the chunk was cut from.
    pub source_page: usize,
    /// Position of the chunk in the document's chunk sequence.
    pub sequence_index: usize,
}

/// A [`Chunk`] paired with its vector embedding, as handed to a vector index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddedChunk {
    /// The chunk.
    pub chunk: Chunk,
    /// The vector embedding of the chunk's text.
    pub embedding: Vec<f32>,
}

/// The ordered chunks of one loaded document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Corpus {
    /// Unique identifier of this load.
    pub id: Uuid,
    /// Identifier of the source document (usually its file name).
    pub document_id: String,
    /// Number of pages the document had, including empty ones.
    pub page_count: usize,
    /// Chunks in `sequence_index` order.
    pub chunks: Vec<Chunk>,
}

impl Corpus {
    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the corpus has no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}

/// Ranked search results for one query, at most `k` long, best first.
pub type RetrievalResult = Vec<SearchResult>;
