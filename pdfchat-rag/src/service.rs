//! Service-boundary operations.
//!
//! [`ChatService`] wires the collaborators together and exposes the three
//! operations a surrounding application needs: load a document, answer a
//! question against a loaded corpus, and record feedback on an answer.
//! [`CorpusSlot`] holds the live corpus for applications that keep one
//! document loaded at a time.
//!
//! # Example
//!
//! ```rust,ignore
//! use pdfchat_rag::{ChatService, CorpusSlot, RagConfig};
//!
//! let service = ChatService::builder()
//!     .config(RagConfig::default())
//!     .loader(Arc::new(PdfLoader))
//!     .embedder(Arc::new(embedder))
//!     .generator(Arc::new(generator))
//!     .build()?;
//!
//! let slot = CorpusSlot::new();
//! service.upload(&slot, Path::new("handbook.pdf")).await?;
//! let answer = service.query_current(&slot, "How often can I get dental cleaning?", 2).await?;
//! ```

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::answer::Answerer;
use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::corpus::{CorpusBuilder, IndexedCorpus};
use crate::document::{EmbeddedChunk, Page, RetrievalResult};
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::feedback::{FeedbackEntry, FeedbackLog, Rating};
use crate::generation::TextGenerator;
use crate::inmemory::InMemoryIndexFactory;
use crate::loader::{DocumentLoader, document_id};
use crate::retriever::Retriever;
use crate::vectorindex::VectorIndexFactory;

/// The answer to one question, with the context it was generated from.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Answer {
    /// The question as asked.
    pub question: String,
    /// The trimmed model output.
    pub text: String,
    /// The retrieved chunks, in the order they appeared in the prompt.
    pub sources: RetrievalResult,
}

impl Answer {
    /// Distinct page numbers of the sources, ascending.
    pub fn source_pages(&self) -> Vec<usize> {
        let mut pages: Vec<usize> = self.sources.iter().map(|r| r.chunk.source_page).collect();
        pages.sort_unstable();
        pages.dedup();
        pages
    }
}

/// Holds the live corpus.
///
/// Replacement swaps the whole handle. Queries that already cloned the
/// previous handle finish against it; later reads only see the new corpus.
#[derive(Debug, Default)]
pub struct CorpusSlot {
    current: RwLock<Option<Arc<IndexedCorpus>>>,
}

impl CorpusSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// The live corpus, if one is loaded.
    pub async fn current(&self) -> Option<Arc<IndexedCorpus>> {
        self.current.read().await.clone()
    }

    /// Make `corpus` live and return the one it replaced.
    pub async fn replace(&self, corpus: Arc<IndexedCorpus>) -> Option<Arc<IndexedCorpus>> {
        self.current.write().await.replace(corpus)
    }

    /// Unload the live corpus.
    pub async fn clear(&self) -> Option<Arc<IndexedCorpus>> {
        self.current.write().await.take()
    }
}

/// Loads documents and answers questions about them.
///
/// Construct one via [`ChatService::builder()`].
pub struct ChatService {
    config: RagConfig,
    loader: Arc<dyn DocumentLoader>,
    embedder: Arc<dyn Embedder>,
    index_factory: Arc<dyn VectorIndexFactory>,
    corpus_builder: CorpusBuilder<Arc<dyn Chunker>>,
    retriever: Retriever,
    answerer: Answerer,
    feedback: Arc<FeedbackLog>,
}

impl ChatService {
    /// Create a new [`ChatServiceBuilder`].
    pub fn builder() -> ChatServiceBuilder {
        ChatServiceBuilder::default()
    }

    /// Return a reference to the service configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the feedback log.
    pub fn feedback_log(&self) -> &Arc<FeedbackLog> {
        &self.feedback
    }

    /// Load, chunk, embed and index the document at `path`.
    ///
    /// The returned corpus is not made live anywhere; see
    /// [`upload`](Self::upload) for that.
    ///
    /// # Errors
    ///
    /// Loader, embedding and index failures propagate unchanged.
    pub async fn load_document(&self, path: &Path) -> Result<Arc<IndexedCorpus>> {
        let loader = Arc::clone(&self.loader);
        let owned = path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || loader.load(&owned)).await.map_err(
            |e| RagError::UnreadableDocument {
                path: path.to_path_buf(),
                message: format!("loader task failed: {e}"),
            },
        )??;

        self.ingest_pages(&document_id(path), &pages).await
    }

    /// Chunk, embed and index pages that were loaded elsewhere.
    ///
    /// A document without text yields an empty corpus; querying it fails with
    /// [`RagError::EmptyCorpus`].
    ///
    /// # Errors
    ///
    /// Embedding and index failures propagate unchanged.
    pub async fn ingest_pages(
        &self,
        document_id: &str,
        pages: &[Page],
    ) -> Result<Arc<IndexedCorpus>> {
        let corpus = self.corpus_builder.build(document_id, pages);
        let index = self.index_factory.create(self.embedder.dimensions())?;

        if !corpus.is_empty() {
            let texts: Vec<&str> = corpus.chunks.iter().map(|c| c.text.as_str()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await.inspect_err(|e| {
                error!(document.id = document_id, error = %e, "embedding failed during ingestion");
            })?;

            if embeddings.len() != corpus.len() {
                return Err(RagError::EmbeddingServiceError {
                    provider: "embedder".to_string(),
                    message: format!(
                        "expected {} embeddings, got {}",
                        corpus.len(),
                        embeddings.len()
                    ),
                });
            }

            let entries: Vec<EmbeddedChunk> = corpus
                .chunks
                .iter()
                .cloned()
                .zip(embeddings)
                .map(|(chunk, embedding)| EmbeddedChunk { chunk, embedding })
                .collect();

            index.insert(&entries).await.inspect_err(|e| {
                error!(document.id = document_id, error = %e, "index insert failed during ingestion");
            })?;
        }

        info!(
            corpus.id = %corpus.id,
            document.id = document_id,
            page_count = corpus.page_count,
            chunk_count = corpus.len(),
            "indexed document"
        );
        Ok(Arc::new(IndexedCorpus::new(corpus, index)))
    }

    /// Load the document at `path` and make it live in `slot`.
    ///
    /// On failure the slot keeps whatever corpus it held before.
    ///
    /// # Errors
    ///
    /// Same as [`load_document`](Self::load_document).
    pub async fn upload(&self, slot: &CorpusSlot, path: &Path) -> Result<Arc<IndexedCorpus>> {
        let corpus = self.load_document(path).await?;
        if let Some(previous) = slot.replace(Arc::clone(&corpus)).await {
            info!(previous.id = %previous.corpus().id, corpus.id = %corpus.corpus().id, "replaced corpus");
        }
        Ok(corpus)
    }

    /// Answer `question` from the `k` most relevant chunks of `corpus`.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidRequest`] if the question is blank
    /// - [`RagError::InvalidConfiguration`] if `k == 0`
    /// - [`RagError::EmptyCorpus`] if the corpus has no chunks
    /// - embedding, index and generation failures, unchanged
    pub async fn query(&self, corpus: &IndexedCorpus, question: &str, k: usize) -> Result<Answer> {
        if question.trim().is_empty() {
            return Err(RagError::InvalidRequest("question must not be empty".to_string()));
        }

        let sources = self.retriever.retrieve(corpus, question, k).await?;
        let text = self.answerer.answer(&sources, question, &self.config.model).await?;

        info!(corpus.id = %corpus.corpus().id, k, source_count = sources.len(), "answered question");
        Ok(Answer { question: question.to_string(), text, sources })
    }

    /// Answer `question` against the live corpus of `slot`.
    ///
    /// # Errors
    ///
    /// [`RagError::EmptyCorpus`] if nothing is loaded, otherwise as
    /// [`query`](Self::query).
    pub async fn query_current(
        &self,
        slot: &CorpusSlot,
        question: &str,
        k: usize,
    ) -> Result<Answer> {
        let corpus = slot
            .current()
            .await
            .ok_or_else(|| RagError::EmptyCorpus("no document has been loaded".to_string()))?;
        self.query(&corpus, question, k).await
    }

    /// Append a rating of `answer` to the feedback log.
    ///
    /// # Errors
    ///
    /// [`RagError::FeedbackLog`] if the log file cannot be written.
    pub async fn record_feedback(
        &self,
        question: &str,
        answer: &str,
        rating: Rating,
        comment: Option<&str>,
    ) -> Result<FeedbackEntry> {
        let entry = FeedbackEntry {
            question: question.to_string(),
            answer: answer.to_string(),
            rating,
            comment: comment.map(str::trim).filter(|c| !c.is_empty()).map(str::to_string),
            recorded_at: Utc::now(),
        };
        self.feedback.record(entry.clone()).await?;
        Ok(entry)
    }
}

/// Builder for constructing a [`ChatService`].
///
/// `loader`, `embedder` and `generator` are required. The configuration
/// defaults to [`RagConfig::default()`], the chunker to a [`RecursiveChunker`]
/// sized from the configuration, the index factory to
/// [`InMemoryIndexFactory`] and the feedback log to an in-memory one.
#[derive(Default)]
pub struct ChatServiceBuilder {
    config: Option<RagConfig>,
    loader: Option<Arc<dyn DocumentLoader>>,
    embedder: Option<Arc<dyn Embedder>>,
    generator: Option<Arc<dyn TextGenerator>>,
    index_factory: Option<Arc<dyn VectorIndexFactory>>,
    chunker: Option<Arc<dyn Chunker>>,
    feedback: Option<Arc<FeedbackLog>>,
}

impl ChatServiceBuilder {
    /// Set the service configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the document loader.
    pub fn loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Set the embedder used for both chunks and queries.
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the text generator.
    pub fn generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Set the factory that creates one vector index per loaded document.
    pub fn index_factory(mut self, factory: Arc<dyn VectorIndexFactory>) -> Self {
        self.index_factory = Some(factory);
        self
    }

    /// Replace the default chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the feedback log.
    pub fn feedback_log(mut self, log: Arc<FeedbackLog>) -> Self {
        self.feedback = Some(log);
        self
    }

    /// Build the [`ChatService`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] if a required collaborator
    /// is missing or the configuration is invalid.
    pub fn build(self) -> Result<ChatService> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let loader = self
            .loader
            .ok_or_else(|| RagError::InvalidConfiguration("loader is required".to_string()))?;
        let embedder = self
            .embedder
            .ok_or_else(|| RagError::InvalidConfiguration("embedder is required".to_string()))?;
        let generator = self
            .generator
            .ok_or_else(|| RagError::InvalidConfiguration("generator is required".to_string()))?;

        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap)?),
        };
        let answerer = Answerer::new(generator)
            .with_max_output_tokens(config.max_output_tokens)
            .with_temperature(config.temperature);

        Ok(ChatService {
            loader,
            retriever: Retriever::new(Arc::clone(&embedder)),
            embedder,
            index_factory: self.index_factory.unwrap_or_else(|| Arc::new(InMemoryIndexFactory)),
            corpus_builder: CorpusBuilder::new(chunker),
            answerer,
            feedback: self.feedback.unwrap_or_default(),
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::generation::GenerationRequest;

    const VOCABULARY: [&str; 8] =
        ["dental", "cleaning", "doctor", "emergency", "pcp", "vision", "exam", "medicaid"];

    /// Counts vocabulary words, one dimension per word.
    struct KeywordEmbedder;

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let lower = text.to_lowercase();
            let words: Vec<&str> = lower.split(|c: char| !c.is_alphanumeric()).collect();
            Ok(VOCABULARY
                .iter()
                .map(|term| words.iter().filter(|w| w.starts_with(term)).count() as f32)
                .collect())
        }

        fn dimensions(&self) -> usize {
            VOCABULARY.len()
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(RagError::EmbeddingServiceError {
                provider: "test".into(),
                message: "service unavailable".into(),
            })
        }

        fn dimensions(&self) -> usize {
            VOCABULARY.len()
        }
    }

    #[derive(Default)]
    struct EchoGenerator {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextGenerator for EchoGenerator {
        async fn generate(&self, request: &GenerationRequest) -> Result<String> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            Ok("  You get one cleaning per year.\n".to_string())
        }
    }

    struct StaticLoader {
        documents: HashMap<PathBuf, Vec<Page>>,
    }

    impl DocumentLoader for StaticLoader {
        fn load(&self, path: &Path) -> Result<Vec<Page>> {
            self.documents
                .get(path)
                .cloned()
                .ok_or_else(|| RagError::FileNotFound { path: path.to_path_buf() })
        }
    }

    fn handbook() -> Vec<Page> {
        vec![
            Page::new(1, "Medicaid covers doctor visits and emergency care."),
            Page::new(2, "You get one free dental cleaning per year."),
            Page::new(3, "Members can change their PCP anytime."),
        ]
    }

    fn vision_policy() -> Vec<Page> {
        vec![Page::new(1, "Vision exam coverage includes one exam every two years.")]
    }

    fn loader() -> Arc<StaticLoader> {
        Arc::new(StaticLoader {
            documents: HashMap::from([
                (PathBuf::from("handbook.pdf"), handbook()),
                (PathBuf::from("vision.pdf"), vision_policy()),
                (PathBuf::from("blank.pdf"), vec![Page::new(1, ""), Page::new(2, "   ")]),
            ]),
        })
    }

    fn service_with(embedder: Arc<dyn Embedder>, generator: Arc<EchoGenerator>) -> ChatService {
        ChatService::builder()
            .loader(loader())
            .embedder(embedder)
            .generator(generator)
            .build()
            .unwrap()
    }

    fn service() -> ChatService {
        service_with(Arc::new(KeywordEmbedder), Arc::new(EchoGenerator::default()))
    }

    #[tokio::test]
    async fn dental_chunk_ranks_first() {
        let generator = Arc::new(EchoGenerator::default());
        let service = service_with(Arc::new(KeywordEmbedder), generator.clone());
        let corpus = service.load_document(Path::new("handbook.pdf")).await.unwrap();
        assert_eq!(corpus.len(), 3);

        let answer =
            service.query(&corpus, "How often can I get dental cleaning?", 2).await.unwrap();

        assert_eq!(answer.text, "You get one cleaning per year.");
        assert_eq!(answer.sources.len(), 2);
        assert_eq!(answer.sources[0].chunk.text, "You get one free dental cleaning per year.");
        assert_eq!(answer.sources[0].chunk.source_page, 2);
        // the other two chunks tie at zero; the earlier one wins
        assert_eq!(answer.sources[1].chunk.sequence_index, 0);
        assert_eq!(answer.source_pages(), vec![1, 2]);

        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].contains("Context:\nYou get one free dental cleaning per year.\n---\n"));
    }

    #[tokio::test]
    async fn k_larger_than_corpus_returns_every_chunk_once() {
        let service = service();
        let corpus = service.load_document(Path::new("handbook.pdf")).await.unwrap();

        let answer = service.query(&corpus, "What about emergency care?", 10).await.unwrap();
        let mut seen: Vec<usize> = answer.sources.iter().map(|r| r.chunk.sequence_index).collect();
        assert_eq!(seen[0], 0);
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn replacement_hides_the_old_document() {
        let service = service();
        let slot = CorpusSlot::new();

        let first = service.upload(&slot, Path::new("handbook.pdf")).await.unwrap();
        service.upload(&slot, Path::new("vision.pdf")).await.unwrap();

        let answer =
            service.query_current(&slot, "How often can I get dental cleaning?", 5).await.unwrap();
        assert!(!answer.sources.is_empty());
        assert!(answer.sources.iter().all(|r| r.chunk.id.starts_with("vision.pdf_")));

        // a handle taken before the swap still answers from its own snapshot
        let stale = service.query(&first, "dental cleaning", 1).await.unwrap();
        assert!(stale.sources[0].chunk.id.starts_with("handbook.pdf_"));
    }

    #[tokio::test]
    async fn failed_upload_keeps_the_live_corpus() {
        let service = service();
        let slot = CorpusSlot::new();
        let live = service.upload(&slot, Path::new("handbook.pdf")).await.unwrap();

        let err = service.upload(&slot, Path::new("missing.pdf")).await.unwrap_err();
        assert!(matches!(err, RagError::FileNotFound { .. }));

        let current = slot.current().await.unwrap();
        assert!(Arc::ptr_eq(&current, &live));
    }

    #[tokio::test]
    async fn failed_embedding_is_reported_and_nothing_goes_live() {
        let failing = service_with(Arc::new(FailingEmbedder), Arc::new(EchoGenerator::default()));
        let slot = CorpusSlot::new();

        let err = failing.upload(&slot, Path::new("handbook.pdf")).await.unwrap_err();
        assert!(matches!(err, RagError::EmbeddingServiceError { .. }));
        assert!(slot.current().await.is_none());
    }

    #[tokio::test]
    async fn querying_without_a_document_is_an_empty_corpus() {
        let generator = Arc::new(EchoGenerator::default());
        let service = service_with(Arc::new(KeywordEmbedder), generator.clone());

        let err = service.query_current(&CorpusSlot::new(), "Anything?", 3).await.unwrap_err();
        assert!(matches!(err, RagError::EmptyCorpus(_)));

        let blank = service.load_document(Path::new("blank.pdf")).await.unwrap();
        assert!(blank.is_empty());
        let err = service.query(&blank, "Anything?", 3).await.unwrap_err();
        assert!(matches!(err, RagError::EmptyCorpus(_)));
        assert!(generator.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_blank_questions_and_zero_k() {
        let service = service();
        let corpus = service.load_document(Path::new("handbook.pdf")).await.unwrap();

        let err = service.query(&corpus, "   ", 2).await.unwrap_err();
        assert!(matches!(err, RagError::InvalidRequest(_)));
        let err = service.query(&corpus, "dental?", 0).await.unwrap_err();
        assert!(matches!(err, RagError::InvalidConfiguration(_)));
    }

    #[tokio::test]
    async fn records_feedback() {
        let service = service();
        let entry = service
            .record_feedback("How often?", "Once per year.", Rating::Down, Some("  too vague "))
            .await
            .unwrap();

        assert_eq!(entry.comment.as_deref(), Some("too vague"));
        let entries = service.feedback_log().entries().await.unwrap();
        assert_eq!(entries, vec![entry]);
    }

    #[test]
    fn builder_requires_collaborators_and_valid_config() {
        let err = ChatService::builder().build().err().unwrap();
        assert!(matches!(err, RagError::InvalidConfiguration(_)));

        let bad = RagConfig { chunk_overlap: 500, ..RagConfig::default() };
        let err = ChatService::builder()
            .config(bad)
            .loader(loader())
            .embedder(Arc::new(KeywordEmbedder))
            .generator(Arc::new(EchoGenerator::default()))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, RagError::InvalidConfiguration(_)));
    }

    #[tokio::test]
    async fn slot_clear_unloads() {
        let service = service();
        let slot = CorpusSlot::new();
        service.upload(&slot, Path::new("vision.pdf")).await.unwrap();

        assert!(slot.clear().await.is_some());
        assert!(slot.current().await.is_none());
    }
}
