//! Error types for the `pdfchat-rag` crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading, indexing or querying a document.
///
/// Collaborator failures (document loading, embedding, index, generation) are
/// surfaced unchanged with the name of the backend that produced them. Only
/// [`RagError::InvalidConfiguration`] and [`RagError::InvalidRequest`] are
/// raised locally, before any external call is made.
#[derive(Debug, Error)]
pub enum RagError {
    /// Chunking or retrieval parameters are inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A query was issued with no document loaded, or the document produced no chunks.
    #[error("Empty corpus: {0}")]
    EmptyCorpus(String),

    /// The document to load does not exist.
    #[error("File not found: {}", path.display())]
    FileNotFound {
        /// The path that was requested.
        path: PathBuf,
    },

    /// The document exists but could not be parsed.
    #[error("Unreadable document {}: {message}", path.display())]
    UnreadableDocument {
        /// The path that was requested.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// The embedding service failed (network, quota, malformed response).
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingServiceError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The vector index could not be built or queried.
    #[error("Vector index error ({backend}): {message}")]
    IndexUnavailable {
        /// The index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The text generation service failed (timeout, quota, malformed response).
    #[error("Generation error ({provider}): {message}")]
    GenerationFailed {
        /// The generation provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A caller-supplied argument was rejected (empty question, unknown rating).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The feedback sink could not be written.
    #[error("Feedback log error: {0}")]
    FeedbackLog(#[from] std::io::Error),
}

impl RagError {
    /// The pipeline stage that failed, for logs and user-facing reports.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::InvalidConfiguration(_) => "configuration",
            Self::EmptyCorpus(_) => "retrieval",
            Self::FileNotFound { .. } | Self::UnreadableDocument { .. } => "document loading",
            Self::EmbeddingServiceError { .. } => "embedding",
            Self::IndexUnavailable { .. } => "indexing",
            Self::GenerationFailed { .. } => "generation",
            Self::InvalidRequest(_) => "request validation",
            Self::FeedbackLog(_) => "feedback",
        }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
