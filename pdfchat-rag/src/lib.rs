//! # pdfchat-rag
//!
//! Retrieval-augmented question answering over a single PDF document.
//!
//! ## Overview
//!
//! A document goes through a fixed pipeline:
//!
//! - a [`DocumentLoader`] extracts its pages
//! - a [`CorpusBuilder`] cuts every page into overlapping chunks with a [`Chunker`]
//! - an [`Embedder`] turns chunks into vectors stored in a [`VectorIndex`]
//! - a [`Retriever`] finds the chunks closest to a question, with deterministic ranking
//! - an [`Answerer`] prompts a [`TextGenerator`] with those chunks and the question
//!
//! [`ChatService`] wires these together and [`CorpusSlot`] holds the live
//! document, replacing it atomically on upload.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pdfchat_rag::{ChatService, CorpusSlot, PdfLoader, RagConfig};
//! use pdfchat_rag::openai::{OpenAIChatGenerator, OpenAIEmbedder};
//!
//! let service = ChatService::builder()
//!     .config(RagConfig::default())
//!     .loader(Arc::new(PdfLoader))
//!     .embedder(Arc::new(OpenAIEmbedder::from_env()?))
//!     .generator(Arc::new(OpenAIChatGenerator::from_env()?))
//!     .build()?;
//!
//! let slot = CorpusSlot::new();
//! service.upload(&slot, "handbook.pdf".as_ref()).await?;
//! let answer = service.query_current(&slot, "How often can I get dental cleaning?", 5).await?;
//! println!("{}", answer.text);
//! ```
//!
//! ## Features
//!
//! - `pdf` - [`PdfLoader`] and [`document_info`] using `pdf-extract`
//! - `openai` - [`openai::OpenAIEmbedder`] and [`openai::OpenAIChatGenerator`] using `reqwest`
//! - `full` - both

pub mod answer;
pub mod chunking;
pub mod config;
pub mod corpus;
pub mod document;
pub mod embedding;
pub mod error;
pub mod feedback;
pub mod generation;
pub mod inmemory;
pub mod loader;
pub mod retriever;
pub mod service;
pub mod vectorindex;

#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "pdf")]
pub mod pdf;

pub use answer::{Answerer, CONTEXT_DELIMITER, build_prompt};
pub use chunking::{Chunker, DEFAULT_SEPARATORS, RecursiveChunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use corpus::{CorpusBuilder, IndexedCorpus};
pub use document::{Chunk, Corpus, EmbeddedChunk, Page, RetrievalResult, SearchResult};
pub use embedding::Embedder;
pub use error::{RagError, Result};
pub use feedback::{FeedbackEntry, FeedbackLog, Rating};
pub use generation::{GenerationRequest, TextGenerator};
pub use inmemory::{InMemoryIndexFactory, InMemoryVectorIndex};
pub use loader::{DocumentLoader, check_document_path, document_id};
pub use retriever::{Retriever, TIE_EPSILON, rank};
pub use service::{Answer, ChatService, ChatServiceBuilder, CorpusSlot};
pub use vectorindex::{VectorIndex, VectorIndexFactory};

#[cfg(feature = "openai")]
pub use openai::{OpenAIChatGenerator, OpenAIEmbedder};
#[cfg(feature = "pdf")]
pub use pdf::{DocumentInfo, PdfLoader, document_info};
