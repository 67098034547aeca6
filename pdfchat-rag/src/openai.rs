//! OpenAI collaborators: embeddings and chat completions over HTTP.
//!
//! This module is only available when the `openai` feature is enabled.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::generation::{GenerationRequest, TextGenerator};

/// The default OpenAI API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// The default model for OpenAI embeddings.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// The default dimensionality for `text-embedding-3-small`.
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1536;

/// Inputs sent per embeddings request unless overridden.
pub const DEFAULT_EMBEDDING_BATCH_SIZE: usize = 1000;

/// The most inputs the embeddings endpoint accepts in one request.
pub const MAX_EMBEDDING_BATCH_SIZE: usize = 2048;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

const PROVIDER: &str = "OpenAI";

/// Connection settings shared by both collaborators.
#[derive(Clone)]
struct Endpoint {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl Endpoint {
    fn new(api_key: String) -> Option<Self> {
        if api_key.trim().is_empty() {
            return None;
        }
        Some(Self { client: reqwest::Client::new(), api_key, base_url: DEFAULT_BASE_URL.into() })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    fn with_timeout(mut self, timeout: Duration) -> std::result::Result<Self, reqwest::Error> {
        self.client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    /// POST `body` as JSON and decode the success body, returning a plain
    /// message on any failure.
    async fn post<B, R>(&self, path: &str, body: &B) -> std::result::Result<R, String>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(format!("API returned {status}: {detail}"));
        }

        response.json().await.map_err(|e| format!("failed to parse response: {e}"))
    }
}

fn api_key_from_env() -> Option<String> {
    std::env::var(API_KEY_ENV).ok()
}

// ── OpenAI API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Put embeddings back in input order; the API labels each with its index.
fn into_input_order(mut data: Vec<EmbeddingData>, expected: usize) -> Result<Vec<Vec<f32>>> {
    data.sort_by_key(|d| d.index);
    let in_order = data.iter().enumerate().all(|(i, d)| d.index == i);
    if data.len() != expected || !in_order {
        return Err(embedding_error(format!(
            "expected {expected} embeddings indexed from 0, got {}",
            data.len()
        )));
    }
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

/// Send `texts` in slices of at most `batch_size` and concatenate the results.
async fn embed_in_batches<'a, 'b, F, Fut>(
    texts: &'a [&'b str],
    batch_size: usize,
    mut send: F,
) -> Result<Vec<Vec<f32>>>
where
    F: FnMut(&'a [&'b str]) -> Fut,
    Fut: Future<Output = Result<Vec<Vec<f32>>>>,
{
    let mut embeddings = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        embeddings.extend(send(batch).await?);
    }
    Ok(embeddings)
}

fn embedding_error(message: String) -> RagError {
    RagError::EmbeddingServiceError { provider: PROVIDER.into(), message }
}

fn generation_error(message: String) -> RagError {
    RagError::GenerationFailed { provider: PROVIDER.into(), message }
}

/// An [`Embedder`] backed by the OpenAI embeddings API.
///
/// Uses `reqwest` to call the `/v1/embeddings` endpoint directly.
///
/// # Configuration
///
/// - `model` – defaults to `text-embedding-3-small`.
/// - `dimensions` – optional Matryoshka dimension override.
/// - `batch_size` – inputs per request, defaults to 1000 and is capped at 2048.
/// - `api_key` – from the constructor or the `OPENAI_API_KEY` environment variable.
/// - `base_url` – defaults to `https://api.openai.com`; any compatible server works.
///
/// # Example
///
/// ```rust,ignore
/// use pdfchat_rag::openai::OpenAIEmbedder;
///
/// let embedder = OpenAIEmbedder::from_env()?.with_timeout(Duration::from_secs(30))?;
/// let embedding = embedder.embed("hello world").await?;
/// ```
#[derive(Clone)]
pub struct OpenAIEmbedder {
    endpoint: Endpoint,
    model: String,
    dimensions: usize,
    /// If set, passed to the API for Matryoshka dimension truncation.
    request_dimensions: Option<usize>,
    batch_size: usize,
}

impl OpenAIEmbedder {
    /// Create an embedder with the given API key.
    ///
    /// Uses the default model (`text-embedding-3-small`) and dimensions (1536).
    ///
    /// # Errors
    ///
    /// [`RagError::EmbeddingServiceError`] if the key is empty.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let endpoint = Endpoint::new(api_key.into())
            .ok_or_else(|| embedding_error("API key must not be empty".into()))?;
        Ok(Self {
            endpoint,
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            request_dimensions: None,
            batch_size: DEFAULT_EMBEDDING_BATCH_SIZE,
        })
    }

    /// Create an embedder using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = api_key_from_env()
            .ok_or_else(|| embedding_error(format!("{API_KEY_ENV} environment variable not set")))?;
        Self::new(api_key)
    }

    /// Set the model name (e.g. `text-embedding-3-large`).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the output dimensions (Matryoshka support).
    ///
    /// When set, the API returns embeddings truncated to this size.
    /// This also updates the value returned by [`dimensions()`](Embedder::dimensions).
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.request_dimensions = Some(dims);
        self
    }

    /// Set how many texts go into one request, between 1 and
    /// [`MAX_EMBEDDING_BATCH_SIZE`].
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_EMBEDDING_BATCH_SIZE);
        self
    }

    /// Send requests to a different OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.endpoint.base_url = base_url.into();
        self
    }

    /// Fail requests that take longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.endpoint = self
            .endpoint
            .with_timeout(timeout)
            .map_err(|e| embedding_error(format!("failed to build HTTP client: {e}")))?;
        Ok(self)
    }

    /// The embedding model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Maximum number of texts per request.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    async fn request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let request_body = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.request_dimensions,
        };

        let response: EmbeddingResponse =
            self.endpoint.post("/v1/embeddings", &request_body).await.map_err(|message| {
                error!(provider = PROVIDER, error = %message, "embedding request failed");
                embedding_error(message)
            })?;

        into_input_order(response.data, texts.len())
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, text_len = text.len(), "embedding single text");

        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| embedding_error("API returned empty response".into()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            provider = PROVIDER,
            text_count = texts.len(),
            batch_size = self.batch_size,
            model = %self.model,
            "embedding batch"
        );

        embed_in_batches(texts, self.batch_size, |batch| self.request(batch)).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// A [`TextGenerator`] backed by the OpenAI chat completions API.
///
/// The prompt is sent as a single user message; the model, temperature and
/// token cap come from each [`GenerationRequest`].
///
/// # Example
///
/// ```rust,ignore
/// use pdfchat_rag::openai::OpenAIChatGenerator;
///
/// let generator = OpenAIChatGenerator::from_env()?;
/// ```
#[derive(Clone)]
pub struct OpenAIChatGenerator {
    endpoint: Endpoint,
}

impl OpenAIChatGenerator {
    /// Create a generator with the given API key.
    ///
    /// # Errors
    ///
    /// [`RagError::GenerationFailed`] if the key is empty.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let endpoint = Endpoint::new(api_key.into())
            .ok_or_else(|| generation_error("API key must not be empty".into()))?;
        Ok(Self { endpoint })
    }

    /// Create a generator using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = api_key_from_env().ok_or_else(|| {
            generation_error(format!("{API_KEY_ENV} environment variable not set"))
        })?;
        Self::new(api_key)
    }

    /// Send requests to a different OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.endpoint.base_url = base_url.into();
        self
    }

    /// Fail requests that take longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.endpoint = self
            .endpoint
            .with_timeout(timeout)
            .map_err(|e| generation_error(format!("failed to build HTTP client: {e}")))?;
        Ok(self)
    }
}

#[async_trait]
impl TextGenerator for OpenAIChatGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        debug!(
            provider = PROVIDER,
            model = %request.model,
            prompt_len = request.prompt.len(),
            max_tokens = request.max_output_tokens,
            "requesting chat completion"
        );

        let body = ChatRequest {
            model: &request.model,
            messages: [ChatMessage { role: "user", content: &request.prompt }],
            temperature: request.temperature,
            max_tokens: request.max_output_tokens,
        };

        let response: ChatResponse =
            self.endpoint.post("/v1/chat/completions", &body).await.map_err(|message| {
                error!(
                    provider = PROVIDER,
                    model = %request.model,
                    error = %message,
                    "chat completion failed"
                );
                generation_error(message)
            })?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| generation_error("missing choices[0].message.content".into()))
    }
}
