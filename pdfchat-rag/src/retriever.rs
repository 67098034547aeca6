//! Top-k retrieval with a deterministic ranking policy.
//!
//! The vector index finds candidates; [`rank`] decides their final order so
//! results never depend on the index's internal iteration order.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error};

use crate::corpus::IndexedCorpus;
use crate::document::{RetrievalResult, SearchResult};
use crate::embedding::Embedder;
use crate::error::{RagError, Result};

/// Scores closer than this are treated as equal.
pub const TIE_EPSILON: f32 = 1e-6;

/// Order search results best first and keep at most `k`.
///
/// Results are sorted by descending score. Scores within [`TIE_EPSILON`] of
/// their neighbour form a tie group, ordered by ascending `sequence_index` so
/// earlier chunks win. Duplicate chunks keep their best score; NaN scores are
/// dropped.
pub fn rank(mut results: Vec<SearchResult>, k: usize) -> RetrievalResult {
    results.retain(|r| !r.score.is_nan());
    results.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.chunk.sequence_index.cmp(&b.chunk.sequence_index))
    });

    let mut seen = HashSet::new();
    results.retain(|r| seen.insert(r.chunk.sequence_index));

    let mut start = 0;
    while start < results.len() {
        let mut end = start + 1;
        while end < results.len() && results[end - 1].score - results[end].score <= TIE_EPSILON {
            end += 1;
        }
        results[start..end].sort_by_key(|r| r.chunk.sequence_index);
        start = end;
    }

    results.truncate(k);
    results
}

/// Finds the chunks of a corpus most similar to a query.
///
/// # Example
///
/// ```rust,ignore
/// use pdfchat_rag::Retriever;
///
/// let retriever = Retriever::new(embedder.clone());
/// let results = retriever.retrieve(&corpus, "How often can I get dental cleaning?", 2).await?;
/// ```
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
}

impl Retriever {
    /// Create a retriever that embeds queries with `embedder`.
    ///
    /// Use the same embedder the corpus was indexed with.
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    /// Return the `k` chunks of `corpus` most similar to `query`.
    ///
    /// If `k` exceeds the corpus size, every chunk is returned once.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidConfiguration`] if `k == 0`
    /// - [`RagError::EmptyCorpus`] if the corpus has no chunks
    /// - embedding and index failures, unchanged
    pub async fn retrieve(
        &self,
        corpus: &IndexedCorpus,
        query: &str,
        k: usize,
    ) -> Result<RetrievalResult> {
        if k == 0 {
            return Err(RagError::InvalidConfiguration("k must be greater than zero".to_string()));
        }
        if corpus.is_empty() {
            return Err(RagError::EmptyCorpus(format!(
                "document '{}' produced no chunks",
                corpus.corpus().document_id
            )));
        }

        let embedding = self.embedder.embed(query).await.inspect_err(|e| {
            error!(error = %e, "query embedding failed");
        })?;

        // Every chunk is a candidate so ties at the k-th score are settled by
        // `rank`, not by the index.
        let candidates = corpus.index().search(&embedding, corpus.len()).await.inspect_err(|e| {
            error!(corpus.id = %corpus.corpus().id, error = %e, "vector search failed");
        })?;

        let results = rank(candidates, k);
        debug!(corpus.id = %corpus.corpus().id, k, result_count = results.len(), "retrieved chunks");
        Ok(results)
    }
}
