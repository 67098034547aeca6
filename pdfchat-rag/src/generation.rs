//! Text generation trait for the hosted language model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single completion request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationRequest {
    /// The full prompt, sent as one user message.
    pub prompt: String,
    /// Model identifier, e.g. `gpt-4o`.
    pub model: String,
    /// Upper bound on generated tokens.
    pub max_output_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

/// A language model that turns a prompt into text.
///
/// Retries and rate limiting belong to the implementation, not to callers.
/// Failures surface as [`RagError::GenerationFailed`](crate::RagError::GenerationFailed).
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for `request`.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}
