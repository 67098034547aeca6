//! Append-only log of user ratings on answers.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{RagError, Result};

/// Thumbs up or down on an answer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    /// The answer was helpful.
    Up,
    /// The answer was wrong or unhelpful.
    Down,
}

impl FromStr for Rating {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            other => Err(RagError::InvalidRequest(format!(
                "rating must be 'up' or 'down', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => f.write_str("up"),
            Self::Down => f.write_str("down"),
        }
    }
}

/// One recorded rating.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedbackEntry {
    /// The question that was asked.
    pub question: String,
    /// The answer that was rated.
    pub answer: String,
    /// The rating.
    pub rating: Rating,
    /// Optional free-form comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// When the rating was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Keeps feedback either in memory or in a JSON Lines file.
///
/// Without a file every entry stays in memory for the life of the log. With a
/// file, entries are only appended to it and [`entries`](FeedbackLog::entries)
/// reads them back.
#[derive(Debug, Default)]
pub struct FeedbackLog {
    entries: Mutex<Vec<FeedbackEntry>>,
    sink: Option<PathBuf>,
}

impl FeedbackLog {
    /// Create an in-memory log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a log that appends every entry to `path` as one JSON line.
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self { entries: Mutex::default(), sink: Some(path.into()) }
    }

    /// The file entries are appended to, if any.
    pub fn sink(&self) -> Option<&Path> {
        self.sink.as_deref()
    }

    /// Append an entry.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::FeedbackLog`] if the file sink cannot be written.
    pub async fn record(&self, entry: FeedbackEntry) -> Result<()> {
        let mut entries = self.entries.lock().await;

        if let Some(path) = &self.sink {
            let mut line = serde_json::to_string(&entry).map_err(std::io::Error::other)?;
            line.push('\n');
            let mut file =
                tokio::fs::OpenOptions::new().create(true).append(true).open(path).await?;
            file.write_all(line.as_bytes()).await?;
            file.flush().await?;
        }

        info!(rating = %entry.rating, has_comment = entry.comment.is_some(), "feedback received");
        if self.sink.is_none() {
            entries.push(entry);
        }
        Ok(())
    }

    /// Every entry recorded so far, oldest first.
    ///
    /// With a file sink this reads the file; a missing file means no entries.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::FeedbackLog`] if the file cannot be read or holds a
    /// malformed line.
    pub async fn entries(&self) -> Result<Vec<FeedbackEntry>> {
        let entries = self.entries.lock().await;
        let Some(path) = &self.sink else {
            return Ok(entries.clone());
        };

        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|e| RagError::from(std::io::Error::other(e)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(rating: Rating, comment: Option<&str>) -> FeedbackEntry {
        FeedbackEntry {
            question: "How often can I get dental cleaning?".into(),
            answer: "Once per year.".into(),
            rating,
            comment: comment.map(str::to_string),
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn parses_ratings() {
        assert_eq!("up".parse::<Rating>().unwrap(), Rating::Up);
        assert_eq!(" DOWN ".parse::<Rating>().unwrap(), Rating::Down);
        assert!(matches!("meh".parse::<Rating>(), Err(RagError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn keeps_entries_in_order() {
        let log = FeedbackLog::new();
        log.record(entry(Rating::Up, None)).await.unwrap();
        log.record(entry(Rating::Down, Some("missed the copay"))).await.unwrap();

        let entries = log.entries().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].rating, Rating::Up);
        assert_eq!(entries[1].comment.as_deref(), Some("missed the copay"));
    }

    #[tokio::test]
    async fn appends_json_lines_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feedback.jsonl");
        let log = FeedbackLog::with_file(&path);

        log.record(entry(Rating::Up, None)).await.unwrap();
        log.record(entry(Rating::Down, Some("wrong page"))).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<FeedbackEntry> =
            contents.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].rating, Rating::Down);
        assert!(contents.contains("\"rating\":\"up\""));

        assert!(log.entries.lock().await.is_empty());
        assert_eq!(log.entries().await.unwrap(), lines);
    }

    #[tokio::test]
    async fn file_log_without_file_has_no_entries() {
        let dir = tempfile::tempdir().unwrap();
        let log = FeedbackLog::with_file(dir.path().join("feedback.jsonl"));
        assert!(log.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unwritable_sink_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let log = FeedbackLog::with_file(dir.path().join("missing").join("feedback.jsonl"));

        let err = log.record(entry(Rating::Up, None)).await.unwrap_err();
        assert!(matches!(err, RagError::FeedbackLog(_)));
        assert!(log.entries.lock().await.is_empty());
    }
}
