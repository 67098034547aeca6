//! # pdfchat-cli
//!
//! Terminal front end for [`pdfchat_rag`]: argument parsing, logging setup,
//! one-shot commands and the interactive chat loop behind the `pdfchat`
//! binary.
//!
//! ```text
//! pdfchat chat handbook.pdf
//! pdfchat ask handbook.pdf "How often can I get dental cleaning?" -k 3
//! pdfchat info handbook.pdf --json
//! pdfchat chunks handbook.pdf --chunk-size 300 --show
//! ```

pub mod cli;
pub mod commands;
pub mod logging;
pub mod repl;

pub use cli::{ChatSettings, ChunkingArgs, Cli, Command};
pub use commands::{ChunkStats, build_service, run};
