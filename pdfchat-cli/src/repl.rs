//! Interactive question loop.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pdfchat_rag::{Answer, ChatService, CorpusSlot, IndexedCorpus, Rating};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{error, warn};

const PROMPT: &str = "> ";

const HELP: &str = "\
Type a question and press enter.
  :load <path>        replace the document
  :up [comment]       rate the last answer as helpful
  :down [comment]     rate the last answer as unhelpful
  :sources            show the context of the last answer
  :help               show this message
  exit | quit         leave";

/// One line of REPL input.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Empty,
    Exit,
    Help,
    Sources,
    Load(PathBuf),
    Feedback { rating: Rating, comment: Option<String> },
    Ask(String),
    Invalid(String),
}

/// Parse a line typed at the prompt.
pub fn parse_line(line: &str) -> ReplCommand {
    let line = line.trim();
    if line.is_empty() {
        return ReplCommand::Empty;
    }
    if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
        return ReplCommand::Exit;
    }

    let Some(directive) = line.strip_prefix(':') else {
        return ReplCommand::Ask(line.to_string());
    };

    let (name, rest) = match directive.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (directive, ""),
    };

    match name {
        "help" => ReplCommand::Help,
        "sources" => ReplCommand::Sources,
        "load" if rest.is_empty() => ReplCommand::Invalid(":load needs a path".to_string()),
        "load" => ReplCommand::Load(PathBuf::from(rest)),
        "up" | "down" => match name.parse::<Rating>() {
            Ok(rating) => ReplCommand::Feedback {
                rating,
                comment: (!rest.is_empty()).then(|| rest.to_string()),
            },
            Err(e) => ReplCommand::Invalid(e.to_string()),
        },
        other => ReplCommand::Invalid(format!("unknown command ':{other}', try :help")),
    }
}

/// One-line summary of a loaded document.
pub fn describe(corpus: &IndexedCorpus) -> String {
    let corpus = corpus.corpus();
    format!(
        "Loaded {}: {} pages, {} chunks",
        corpus.document_id,
        corpus.page_count,
        corpus.len()
    )
}

/// Print the pages and text of the chunks an answer was built from.
pub fn print_sources(answer: &Answer) {
    for source in &answer.sources {
        println!(
            "[page {} | chunk {} | score {:.3}]\n{}\n",
            source.chunk.source_page,
            source.chunk.sequence_index,
            source.score,
            source.chunk.text.trim()
        );
    }
}

fn pages_line(answer: &Answer) -> String {
    let pages: Vec<String> = answer.source_pages().iter().map(ToString::to_string).collect();
    format!("(pages {})", pages.join(", "))
}

/// Load `pdf`, then answer questions until the user leaves.
pub async fn run(service: &ChatService, pdf: &Path) -> Result<()> {
    let slot = CorpusSlot::new();
    let corpus = service
        .upload(&slot, pdf)
        .await
        .with_context(|| format!("failed to load {}", pdf.display()))?;
    println!("{}", describe(&corpus));
    println!("Ask a question, or :help for commands.");

    let top_k = service.config().top_k;
    let mut editor = DefaultEditor::new().context("failed to start line editor")?;
    let mut last: Option<Answer> = None;

    loop {
        let line = match editor.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("failed to read input"),
        };
        if let Err(e) = editor.add_history_entry(line.as_str()) {
            warn!(error = %e, "failed to record history");
        }

        match parse_line(&line) {
            ReplCommand::Empty => {}
            ReplCommand::Exit => break,
            ReplCommand::Help => println!("{HELP}"),
            ReplCommand::Invalid(message) => eprintln!("{message}"),
            ReplCommand::Load(path) => match service.upload(&slot, &path).await {
                Ok(corpus) => {
                    last = None;
                    println!("{}", describe(&corpus));
                }
                Err(e) => {
                    error!(path = %path.display(), stage = e.stage(), error = %e, "load failed");
                    eprintln!("error: {e} (the previous document is still loaded)");
                }
            },
            ReplCommand::Sources => match &last {
                Some(answer) => print_sources(answer),
                None => eprintln!("no answer yet"),
            },
            ReplCommand::Feedback { rating, comment } => match &last {
                Some(answer) => {
                    match service
                        .record_feedback(&answer.question, &answer.text, rating, comment.as_deref())
                        .await
                    {
                        Ok(_) => println!("Thanks for the feedback."),
                        Err(e) => eprintln!("error: {e}"),
                    }
                }
                None => eprintln!("no answer to rate yet"),
            },
            ReplCommand::Ask(question) => {
                match service.query_current(&slot, &question, top_k).await {
                    Ok(answer) => {
                        println!("{}\n{}", answer.text, pages_line(&answer));
                        last = Some(answer);
                    }
                    Err(e) => {
                        error!(stage = e.stage(), error = %e, "query failed");
                        eprintln!("error: {e}");
                    }
                }
            }
        }
    }

    println!("Goodbye.");
    Ok(())
}
