use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use pdfchat_rag::RagConfig;
use pdfchat_rag::config::{
    DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_OUTPUT_TOKENS, DEFAULT_MODEL,
    DEFAULT_TEMPERATURE, DEFAULT_TOP_K,
};
use pdfchat_rag::openai::{DEFAULT_BASE_URL, DEFAULT_EMBEDDING_MODEL};

/// Chat with a PDF document.
///
/// Settings can also come from the environment or a `.env` file in the
/// working directory.
#[derive(Parser, Debug)]
#[command(name = "pdfchat", version, about = "Ask questions about a PDF document")]
pub struct Cli {
    /// Log debug output from the pipeline
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load a PDF and answer questions interactively
    Chat {
        /// PDF to load
        pdf: PathBuf,

        #[command(flatten)]
        settings: ChatSettings,
    },
    /// Answer a single question about a PDF
    Ask {
        /// PDF to load
        pdf: PathBuf,

        /// The question
        question: String,

        #[command(flatten)]
        settings: ChatSettings,
    },
    /// Show page count and file information for a PDF
    Info {
        /// PDF to inspect
        pdf: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Show how a PDF would be chunked, without calling any API
    Chunks {
        /// PDF to chunk
        pdf: PathBuf,

        #[command(flatten)]
        chunking: ChunkingArgs,

        /// Print every chunk, not just the statistics
        #[arg(long)]
        show: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ChunkingArgs {
    /// Maximum chunk size in characters
    #[arg(long, env = "PDFCHAT_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[arg(long, env = "PDFCHAT_CHUNK_OVERLAP", default_value_t = DEFAULT_CHUNK_OVERLAP)]
    pub chunk_overlap: usize,
}

#[derive(Args, Debug, Clone)]
pub struct ChatSettings {
    #[command(flatten)]
    pub chunking: ChunkingArgs,

    /// Number of chunks used as context for each answer
    #[arg(short = 'k', long, env = "PDFCHAT_TOP_K", default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    /// Chat model answering the questions
    #[arg(long, env = "PDFCHAT_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Embedding model for chunks and questions
    #[arg(long, env = "PDFCHAT_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    pub embedding_model: String,

    /// Sampling temperature
    #[arg(long, env = "PDFCHAT_TEMPERATURE", default_value_t = DEFAULT_TEMPERATURE)]
    pub temperature: f32,

    /// Maximum tokens per answer
    #[arg(long, env = "PDFCHAT_MAX_TOKENS", default_value_t = DEFAULT_MAX_OUTPUT_TOKENS)]
    pub max_output_tokens: u32,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Request timeout in seconds
    #[arg(long, env = "PDFCHAT_TIMEOUT_SECS", default_value_t = 60)]
    pub timeout_secs: u64,

    /// Append ratings to this JSON Lines file
    #[arg(long, env = "PDFCHAT_FEEDBACK_LOG")]
    pub feedback_log: Option<PathBuf>,
}

impl ChatSettings {
    /// Validated pipeline configuration.
    pub fn rag_config(&self) -> pdfchat_rag::Result<RagConfig> {
        RagConfig::builder()
            .chunk_size(self.chunking.chunk_size)
            .chunk_overlap(self.chunking.chunk_overlap)
            .top_k(self.top_k)
            .model(&self.model)
            .temperature(self.temperature)
            .max_output_tokens(self.max_output_tokens)
            .build()
    }

    /// Per-request timeout for the API clients.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use pdfchat_rag::RagError;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_ask_with_settings() {
        let cli = parse(&[
            "pdfchat",
            "ask",
            "handbook.pdf",
            "How often can I get dental cleaning?",
            "-k",
            "2",
            "--model",
            "gpt-4o-mini",
            "--chunk-size",
            "300",
            "--chunk-overlap",
            "30",
        ]);

        let Command::Ask { pdf, question, settings } = cli.command else {
            panic!("expected ask");
        };
        assert_eq!(pdf, PathBuf::from("handbook.pdf"));
        assert_eq!(question, "How often can I get dental cleaning?");

        let config = settings.rag_config().unwrap();
        assert_eq!(config.top_k, 2);
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.chunk_size, 300);
        assert_eq!(config.chunk_overlap, 30);
    }

    #[test]
    fn verbose_is_global() {
        let cli = parse(&["pdfchat", "info", "handbook.pdf", "--verbose", "--json"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Info { json: true, .. }));
    }

    #[test]
    fn invalid_chunking_is_rejected_by_config() {
        let cli = parse(&[
            "pdfchat",
            "chat",
            "handbook.pdf",
            "--chunk-size",
            "100",
            "--chunk-overlap",
            "100",
        ]);
        let Command::Chat { settings, .. } = cli.command else {
            panic!("expected chat");
        };
        assert!(matches!(settings.rag_config(), Err(RagError::InvalidConfiguration(_))));
    }

    #[test]
    fn chunks_needs_a_path() {
        assert!(Cli::try_parse_from(["pdfchat", "chunks"]).is_err());
    }
}
