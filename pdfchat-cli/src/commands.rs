use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use pdfchat_rag::openai::{OpenAIChatGenerator, OpenAIEmbedder};
use pdfchat_rag::{
    ChatService, Corpus, CorpusBuilder, DocumentLoader, FeedbackLog, PdfLoader, RecursiveChunker,
    document_id, document_info,
};
use tracing::info;

use crate::cli::{ChatSettings, ChunkingArgs, Cli, Command};
use crate::repl;

/// Run the selected subcommand.
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Chat { pdf, settings } => {
            let service = build_service(&settings)?;
            repl::run(&service, &pdf).await
        }
        Command::Ask { pdf, question, settings } => {
            let service = build_service(&settings)?;
            ask(&service, &pdf, &question).await
        }
        Command::Info { pdf, json } => info_command(&pdf, json).await,
        Command::Chunks { pdf, chunking, show } => chunks(&pdf, &chunking, show).await,
    }
}

/// Wire the OpenAI collaborators and the PDF loader into a [`ChatService`].
pub fn build_service(settings: &ChatSettings) -> Result<ChatService> {
    let config = settings.rag_config().context("invalid configuration")?;
    let api_key = settings
        .api_key
        .clone()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| anyhow!("OPENAI_API_KEY is not set; pass --api-key or add it to .env"))?;

    let embedder = OpenAIEmbedder::new(api_key.clone())?
        .with_model(&settings.embedding_model)
        .with_base_url(&settings.base_url)
        .with_timeout(settings.timeout())?;
    let generator = OpenAIChatGenerator::new(api_key)?
        .with_base_url(&settings.base_url)
        .with_timeout(settings.timeout())?;

    let feedback = match &settings.feedback_log {
        Some(path) => FeedbackLog::with_file(path),
        None => FeedbackLog::new(),
    };

    info!(
        model = %config.model,
        embedding_model = %settings.embedding_model,
        top_k = config.top_k,
        "starting chat service"
    );

    Ok(ChatService::builder()
        .config(config)
        .loader(Arc::new(PdfLoader))
        .embedder(Arc::new(embedder))
        .generator(Arc::new(generator))
        .feedback_log(Arc::new(feedback))
        .build()?)
}

async fn ask(service: &ChatService, pdf: &Path, question: &str) -> Result<()> {
    let corpus = service
        .load_document(pdf)
        .await
        .with_context(|| format!("failed to load {}", pdf.display()))?;
    let answer = service.query(&corpus, question, service.config().top_k).await?;

    println!("{}", answer.text);
    let pages: Vec<String> = answer.source_pages().iter().map(ToString::to_string).collect();
    println!("(pages {})", pages.join(", "));
    Ok(())
}

async fn info_command(pdf: &Path, json: bool) -> Result<()> {
    let owned = pdf.to_path_buf();
    let info = tokio::task::spawn_blocking(move || document_info(&owned)).await??;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("File:      {}", info.filename);
    println!("Pages:     {}", info.page_count);
    println!("Size:      {} bytes", info.file_size_bytes);
    if let Some(modified) = info.last_modified {
        println!("Modified:  {}", modified.to_rfc3339());
    }
    Ok(())
}

async fn chunks(pdf: &Path, chunking: &ChunkingArgs, show: bool) -> Result<()> {
    let chunker = RecursiveChunker::new(chunking.chunk_size, chunking.chunk_overlap)
        .context("invalid chunking settings")?;

    let owned = pdf.to_path_buf();
    let pages = tokio::task::spawn_blocking(move || PdfLoader.load(&owned)).await??;
    let corpus = CorpusBuilder::new(chunker).build(&document_id(pdf), &pages);

    println!("{}", ChunkStats::of(&corpus));
    if show {
        for chunk in &corpus.chunks {
            println!(
                "--- chunk {} (page {}) ---\n{}",
                chunk.sequence_index, chunk.source_page, chunk.text
            );
        }
    }
    Ok(())
}

/// Size statistics of a chunked document.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkStats {
    /// Document the chunks came from.
    pub document_id: String,
    /// Pages in the document, including empty ones.
    pub pages: usize,
    /// Number of chunks.
    pub chunks: usize,
    /// Length of the shortest chunk in characters.
    pub min_chars: usize,
    /// Length of the longest chunk in characters.
    pub max_chars: usize,
    /// Mean chunk length in characters, rounded down.
    pub mean_chars: usize,
}

impl ChunkStats {
    /// Compute the statistics of `corpus`; all lengths are zero when it is empty.
    pub fn of(corpus: &Corpus) -> Self {
        let lengths: Vec<usize> = corpus.chunks.iter().map(|c| c.text.chars().count()).collect();
        let total: usize = lengths.iter().sum();
        Self {
            document_id: corpus.document_id.clone(),
            pages: corpus.page_count,
            chunks: lengths.len(),
            min_chars: lengths.iter().copied().min().unwrap_or(0),
            max_chars: lengths.iter().copied().max().unwrap_or(0),
            mean_chars: total.checked_div(lengths.len()).unwrap_or(0),
        }
    }
}

impl std::fmt::Display for ChunkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} pages, {} chunks (min {}, mean {}, max {} chars)",
            self.document_id,
            self.pages,
            self.chunks,
            self.min_chars,
            self.mean_chars,
            self.max_chars
        )
    }
}
