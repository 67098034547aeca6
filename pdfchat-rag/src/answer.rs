//! Prompt composition and answer generation.

use std::sync::Arc;

use tracing::{debug, error};

use crate::config::{DEFAULT_MAX_OUTPUT_TOKENS, DEFAULT_TEMPERATURE};
use crate::document::SearchResult;
use crate::error::Result;
use crate::generation::{GenerationRequest, TextGenerator};

/// Separator placed between context chunks in the prompt.
pub const CONTEXT_DELIMITER: &str = "\n---\n";

/// Build the prompt for `question` from retrieved chunks, in retrieval order.
pub fn build_prompt(retrieval: &[SearchResult], question: &str) -> String {
    let context = retrieval
        .iter()
        .map(|r| r.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_DELIMITER);

    format!(
        "You are a helpful assistant answering questions using only the following document context.\n\
         \n\
         Context:\n\
         {context}\n\
         \n\
         Question: {question}\n\
         Answer:"
    )
}

/// Answers questions from retrieved context through a [`TextGenerator`].
///
/// # Example
///
/// ```rust,ignore
/// use pdfchat_rag::Answerer;
///
/// let answerer = Answerer::new(generator).with_temperature(0.2);
/// let text = answerer.answer(&results, "How often can I get dental cleaning?", "gpt-4o").await?;
/// ```
#[derive(Clone)]
pub struct Answerer {
    generator: Arc<dyn TextGenerator>,
    max_output_tokens: u32,
    temperature: f32,
}

impl Answerer {
    /// Create an answerer with the default token cap and temperature.
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// Set the maximum number of generated tokens.
    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = tokens;
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Generate an answer to `question` grounded in `retrieval`.
    ///
    /// Returns the model output with surrounding whitespace trimmed.
    ///
    /// # Errors
    ///
    /// Generation failures propagate unchanged; nothing is retried here.
    pub async fn answer(
        &self,
        retrieval: &[SearchResult],
        question: &str,
        model_id: &str,
    ) -> Result<String> {
        let request = GenerationRequest {
            prompt: build_prompt(retrieval, question),
            model: model_id.to_string(),
            max_output_tokens: self.max_output_tokens,
            temperature: self.temperature,
        };
        debug!(model = model_id, context_chunks = retrieval.len(), "generating answer");

        let text = self.generator.generate(&request).await.inspect_err(|e| {
            error!(model = model_id, error = %e, "answer generation failed");
        })?;

        Ok(text.trim().to_string())
    }
}
