//! Property tests for ranking and top-k retrieval.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use pdfchat_rag::{
    Chunk, CorpusBuilder, Embedder, EmbeddedChunk, InMemoryVectorIndex, IndexedCorpus, Page,
    RecursiveChunker, Result, Retriever, SearchResult, TIE_EPSILON, VectorIndex, rank,
};
use proptest::prelude::*;

const DIM: usize = 16;

/// Hashes each character into one of `DIM` buckets.
struct CharHashEmbedder;

#[async_trait]
impl Embedder for CharHashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0; DIM];
        for c in text.chars() {
            vector[c as usize % DIM] += 1.0;
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

fn result(sequence_index: usize, score: f32) -> SearchResult {
    SearchResult {
        chunk: Chunk {
            id: format!("doc_{sequence_index}"),
            text: format!("chunk {sequence_index}"),
            source_page: 1,
            sequence_index,
        },
        score,
    }
}

/// Scores drawn from a handful of values so ties are common.
fn arb_results() -> impl Strategy<Value = Vec<SearchResult>> {
    proptest::collection::vec(0usize..5, 0..30).prop_map(|levels| {
        levels
            .into_iter()
            .enumerate()
            .map(|(i, level)| result((i * 7) % 31, level as f32 * 0.25))
            .collect()
    })
}

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map("non-zero embedding", |mut v| {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm < 1e-8 {
            return None;
        }
        for val in &mut v {
            *val /= norm;
        }
        Some(v)
    })
}

/// **Property: ranking order**
/// *For any* scored candidates, ranked results are sorted by descending score,
/// equal scores are ordered by ascending sequence index, no chunk appears
/// twice and at most `k` results come back.
mod prop_rank_order {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn ranked_results_are_ordered_and_bounded(results in arb_results(), k in 1usize..40) {
            let distinct: HashSet<usize> = results.iter().map(|r| r.chunk.sequence_index).collect();
            let ranked = rank(results, k);

            prop_assert_eq!(ranked.len(), k.min(distinct.len()));
            for pair in ranked.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                prop_assert!(a.score >= b.score);
                if a.score == b.score {
                    prop_assert!(a.chunk.sequence_index < b.chunk.sequence_index);
                }
            }

            let unique: HashSet<usize> = ranked.iter().map(|r| r.chunk.sequence_index).collect();
            prop_assert_eq!(unique.len(), ranked.len());
        }

        #[test]
        fn ranking_ignores_input_order(results in arb_results(), k in 1usize..40) {
            let mut reversed = results.clone();
            reversed.reverse();
            prop_assert_eq!(rank(results, k), rank(reversed, k));
        }
    }
}

/// **Property: in-memory index search ordering**
/// *For any* set of embedded chunks, searching returns results ordered by
/// descending cosine similarity (up to the tie tolerance), at most `top_k` of them.
mod prop_inmemory_search_ordering {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_descending_and_bounded_by_top_k(
            embeddings in proptest::collection::vec(arb_normalized_embedding(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            top_k in 1usize..25,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let results = rt.block_on(async {
                let index = InMemoryVectorIndex::new(DIM);
                let entries: Vec<EmbeddedChunk> = embeddings
                    .iter()
                    .enumerate()
                    .map(|(i, embedding)| EmbeddedChunk {
                        chunk: result(i, 0.0).chunk,
                        embedding: embedding.clone(),
                    })
                    .collect();
                index.insert(&entries).await.unwrap();
                index.search(&query, top_k).await.unwrap()
            });

            prop_assert_eq!(results.len(), top_k.min(embeddings.len()));
            for window in results.windows(2) {
                prop_assert!(
                    window[0].score + TIE_EPSILON >= window[1].score,
                    "results not in descending order: {} < {}",
                    window[0].score,
                    window[1].score,
                );
            }
        }
    }
}

/// **Property: k beyond corpus size**
/// *For any* corpus and `k` larger than its size, retrieval returns every
/// chunk exactly once.
mod prop_k_exceeds_corpus {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn returns_every_chunk_once(
            texts in proptest::collection::vec("[a-z]{2,8}( [a-z]{2,8}){0,12}", 1..8),
            query in "[a-z ]{1,30}",
            extra in 1usize..10,
        ) {
            let pages: Vec<Page> =
                texts.iter().enumerate().map(|(i, text)| Page::new(i + 1, text.clone())).collect();
            let builder = CorpusBuilder::new(RecursiveChunker::new(40, 8).unwrap());
            let corpus = builder.build("doc", &pages);
            let size = corpus.len();

            let rt = tokio::runtime::Runtime::new().unwrap();
            let results = rt.block_on(async {
                let embedder = Arc::new(CharHashEmbedder);
                let index = Arc::new(InMemoryVectorIndex::new(DIM));
                let mut entries = Vec::new();
                for chunk in &corpus.chunks {
                    let embedding = embedder.embed(&chunk.text).await.unwrap();
                    entries.push(EmbeddedChunk { chunk: chunk.clone(), embedding });
                }
                index.insert(&entries).await.unwrap();

                let indexed = IndexedCorpus::new(corpus, index);
                Retriever::new(embedder).retrieve(&indexed, &query, size + extra).await.unwrap()
            });

            let seen: HashSet<usize> = results.iter().map(|r| r.chunk.sequence_index).collect();
            prop_assert_eq!(results.len(), size);
            prop_assert_eq!(seen, (0..size).collect::<HashSet<_>>());
        }
    }
}
