//! In-memory vector index using cosine similarity.
//!
//! This module provides [`InMemoryVectorIndex`], a flat (exhaustive) index
//! backed by a `BTreeMap` protected by a `tokio::sync::RwLock`, and
//! [`InMemoryIndexFactory`] which hands out one per loaded corpus. Suitable for
//! single documents of a few thousand chunks.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{EmbeddedChunk, SearchResult};
use crate::error::{RagError, Result};
use crate::retriever::rank;
use crate::vectorindex::{VectorIndex, VectorIndexFactory};

const BACKEND: &str = "InMemory";

/// An in-memory vector index using cosine similarity for search.
///
/// Entries are keyed by `sequence_index`, so iteration order is stable.
///
/// # Example
///
/// ```rust,ignore
/// use pdfchat_rag::{InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::new(1536);
/// index.insert(&entries).await?;
/// ```
#[derive(Debug)]
pub struct InMemoryVectorIndex {
    dimensions: usize,
    entries: RwLock<BTreeMap<usize, EmbeddedChunk>>,
}

impl InMemoryVectorIndex {
    /// Create a new empty index for vectors of `dimensions` components.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions, entries: RwLock::new(BTreeMap::new()) }
    }

    /// The dimensionality every stored and queried vector must have.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn check_dimensions(&self, len: usize, what: &str) -> Result<()> {
        if len != self.dimensions {
            return Err(RagError::IndexUnavailable {
                backend: BACKEND.to_string(),
                message: format!("{what} has {len} dimensions, expected {}", self.dimensions),
            });
        }
        Ok(())
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn insert(&self, entries: &[EmbeddedChunk]) -> Result<()> {
        for entry in entries {
            self.check_dimensions(
                entry.embedding.len(),
                &format!("embedding for chunk '{}'", entry.chunk.id),
            )?;
        }

        let mut stored = self.entries.write().await;
        for entry in entries {
            stored.insert(entry.chunk.sequence_index, entry.clone());
        }
        Ok(())
    }

    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        self.check_dimensions(embedding.len(), "query embedding")?;

        let stored = self.entries.read().await;
        let scored: Vec<SearchResult> = stored
            .values()
            .map(|entry| SearchResult {
                chunk: entry.chunk.clone(),
                score: cosine_similarity(&entry.embedding, embedding),
            })
            .collect();

        Ok(rank(scored, top_k))
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().await.len())
    }
}

/// A [`VectorIndexFactory`] producing empty [`InMemoryVectorIndex`]es.
#[derive(Debug, Clone, Copy, Default)]
pub struct InMemoryIndexFactory;

impl VectorIndexFactory for InMemoryIndexFactory {
    fn create(&self, dimensions: usize) -> Result<Arc<dyn VectorIndex>> {
        Ok(Arc::new(InMemoryVectorIndex::new(dimensions)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Chunk;

    fn entry(sequence_index: usize, embedding: Vec<f32>) -> EmbeddedChunk {
        EmbeddedChunk {
            chunk: Chunk {
                id: format!("doc_{sequence_index}"),
                text: format!("chunk {sequence_index}"),
                source_page: 1,
                sequence_index,
            },
            embedding,
        }
    }

    #[test]
    fn cosine_similarity_of_parallel_and_orthogonal_vectors() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn search_returns_nearest_first() {
        let index = InMemoryVectorIndex::new(2);
        index
            .insert(&[
                entry(0, vec![1.0, 0.0]),
                entry(1, vec![0.0, 1.0]),
                entry(2, vec![0.7, 0.7]),
            ])
            .await
            .unwrap();

        let results = index.search(&[0.0, 1.0], 2).await.unwrap();
        let order: Vec<usize> = results.iter().map(|r| r.chunk.sequence_index).collect();
        assert_eq!(order, vec![1, 2]);
        assert_eq!(index.len().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn reinserting_replaces_entry() {
        let index = InMemoryVectorIndex::new(2);
        index.insert(&[entry(0, vec![1.0, 0.0])]).await.unwrap();
        index.insert(&[entry(0, vec![0.0, 1.0])]).await.unwrap();

        assert_eq!(index.len().await.unwrap(), 1);
        let results = index.search(&[0.0, 1.0], 1).await.unwrap();
        assert!((results[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn rejects_mismatched_dimensions() {
        let index = InMemoryVectorIndex::new(3);
        let err = index.insert(&[entry(0, vec![1.0, 0.0])]).await.unwrap_err();
        assert!(matches!(err, RagError::IndexUnavailable { .. }));

        let err = index.search(&[1.0], 1).await.unwrap_err();
        assert!(err.to_string().contains("expected 3"));
    }

    #[tokio::test]
    async fn factory_hands_out_independent_indexes() {
        let factory = InMemoryIndexFactory;
        let first = factory.create(2).unwrap();
        let second = factory.create(2).unwrap();

        first.insert(&[entry(0, vec![1.0, 0.0])]).await.unwrap();
        assert_eq!(first.len().await.unwrap(), 1);
        assert_eq!(second.len().await.unwrap(), 0);
    }
}
