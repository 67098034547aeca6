//! Vector index traits for storing and searching chunk embeddings.

use std::sync::Arc;

use async_trait::async_trait;

use crate::document::{EmbeddedChunk, SearchResult};
use crate::error::Result;

/// A similarity-searchable store of embedded chunks for one corpus.
///
/// The indexing algorithm (flat, IVF, HNSW, remote service) is up to the
/// implementation. Result order from [`search`](VectorIndex::search) is only
/// a hint: the [`Retriever`](crate::Retriever) re-ranks whatever comes back.
///
/// # Example
///
/// ```rust,ignore
/// use pdfchat_rag::{InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::new(384);
/// index.insert(&embedded_chunks).await?;
/// let results = index.search(&query_embedding, 5).await?;
/// ```
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert embedded chunks. Re-inserting a `sequence_index` replaces the entry.
    async fn insert(&self, entries: &[EmbeddedChunk]) -> Result<()>;

    /// Return up to `top_k` chunks nearest to `embedding`.
    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchResult>>;

    /// Number of chunks stored.
    async fn len(&self) -> Result<usize>;
}

/// Creates a fresh, empty [`VectorIndex`] for every loaded corpus.
///
/// Giving each corpus its own index lets a replaced corpus keep serving the
/// queries that already hold it.
pub trait VectorIndexFactory: Send + Sync {
    /// Create an empty index for embeddings of the given dimensionality.
    fn create(&self, dimensions: usize) -> Result<Arc<dyn VectorIndex>>;
}
