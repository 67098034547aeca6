//! Corpus construction.
//!
//! [`CorpusBuilder`] turns the pages of one document into a flat, ordered
//! chunk sequence. [`IndexedCorpus`] pairs that sequence with the vector index
//! holding its embeddings and is the handle every query runs against.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::chunking::Chunker;
use crate::document::{Chunk, Corpus, Page};
use crate::vectorindex::VectorIndex;

/// Applies a [`Chunker`] to every page of a document, in page order.
///
/// Chunks get a global `sequence_index` starting at 0 and keep the number of
/// the page they came from. Pages with no text contribute no chunks and leave
/// no gap in the numbering.
///
/// # Example
///
/// ```rust,ignore
/// use pdfchat_rag::{CorpusBuilder, RecursiveChunker};
///
/// let builder = CorpusBuilder::new(RecursiveChunker::new(500, 50)?);
/// let corpus = builder.build("handbook.pdf", &pages);
/// ```
#[derive(Debug, Clone)]
pub struct CorpusBuilder<C> {
    chunker: C,
}

impl<C: Chunker> CorpusBuilder<C> {
    /// Create a builder around the given chunker.
    pub fn new(chunker: C) -> Self {
        Self { chunker }
    }

    /// Return a reference to the chunker.
    pub fn chunker(&self) -> &C {
        &self.chunker
    }

    /// Chunk `pages` into a new [`Corpus`].
    ///
    /// Pages are processed in the order given; callers pass them sorted by
    /// `page_number`.
    pub fn build(&self, document_id: &str, pages: &[Page]) -> Corpus {
        let mut chunks = Vec::new();

        for page in pages {
            for text in self.chunker.split(&page.text_content) {
                let sequence_index = chunks.len();
                chunks.push(Chunk {
                    id: format!("{document_id}_{sequence_index}"),
                    text,
                    source_page: page.page_number,
                    sequence_index,
                });
            }
        }

        Corpus {
            id: Uuid::new_v4(),
            document_id: document_id.to_string(),
            page_count: pages.len(),
            chunks,
        }
    }
}

/// A [`Corpus`] together with the vector index holding its embeddings.
///
/// Immutable once built. Share it as `Arc<IndexedCorpus>`: a query that holds
/// the handle keeps working against this snapshot even after a newer document
/// replaces it in a [`CorpusSlot`](crate::CorpusSlot).
pub struct IndexedCorpus {
    corpus: Corpus,
    index: Arc<dyn VectorIndex>,
}

impl IndexedCorpus {
    /// Pair a corpus with the index its chunks were inserted into.
    pub fn new(corpus: Corpus, index: Arc<dyn VectorIndex>) -> Self {
        Self { corpus, index }
    }

    /// The chunk sequence.
    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    /// The vector index.
    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.corpus.len()
    }

    /// Whether the corpus has no chunks.
    pub fn is_empty(&self) -> bool {
        self.corpus.is_empty()
    }
}

impl fmt::Debug for IndexedCorpus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexedCorpus")
            .field("id", &self.corpus.id)
            .field("document_id", &self.corpus.document_id)
            .field("chunks", &self.corpus.len())
            .finish_non_exhaustive()
    }
}
