//! PDF loading using the `pdf-extract` crate.
//!
//! This module is only available when the `pdf` feature is enabled.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::document::Page;
use crate::error::{RagError, Result};
use crate::loader::{DocumentLoader, check_document_path, document_id};

/// `pdf-extract` separates pages with form feeds.
const PAGE_BREAK: char = '\x0C';

/// A [`DocumentLoader`] for PDF files backed by `pdf-extract`.
///
/// Each page's text is trimmed. Pages without text are kept so page numbers
/// match the document. Every page carries `source`, zero-based `page` and
/// `total_pages` metadata.
///
/// # Example
///
/// ```rust,ignore
/// use pdfchat_rag::{DocumentLoader, PdfLoader};
///
/// let pages = PdfLoader.load(Path::new("handbook.pdf"))?;
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfLoader;

impl DocumentLoader for PdfLoader {
    fn load(&self, path: &Path) -> Result<Vec<Page>> {
        check_document_path(path)?;
        info!(path = %path.display(), "loading PDF");

        let bytes = std::fs::read(path).map_err(|e| unreadable(path, e.to_string()))?;

        // pdf-extract panics on some malformed inputs.
        let extracted =
            panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(&bytes)));
        let text = extracted
            .map_err(|_| unreadable(path, "PDF parser panicked".to_string()))?
            .map_err(|e| unreadable(path, e.to_string()))?;

        let pages = split_pages(&text, &path.display().to_string());
        info!(path = %path.display(), page_count = pages.len(), "loaded PDF");
        Ok(pages)
    }
}

fn unreadable(path: &Path, message: String) -> RagError {
    error!(path = %path.display(), error = %message, "failed to load PDF");
    RagError::UnreadableDocument { path: path.to_path_buf(), message }
}

/// Split extracted text into pages on form feeds.
fn split_pages(text: &str, source: &str) -> Vec<Page> {
    let mut raw: Vec<&str> = text.split(PAGE_BREAK).collect();
    if raw.len() > 1 && raw.last().is_some_and(|last| last.trim().is_empty()) {
        raw.pop();
    }

    let total_pages = raw.len();
    raw.into_iter()
        .enumerate()
        .map(|(i, page_text)| Page {
            page_number: i + 1,
            text_content: page_text.trim().to_string(),
            metadata: HashMap::from([
                ("source".to_string(), source.to_string()),
                ("page".to_string(), i.to_string()),
                ("total_pages".to_string(), total_pages.to_string()),
            ]),
        })
        .collect()
}

/// Summary information about a PDF file.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DocumentInfo {
    /// File name without directories.
    pub filename: String,
    /// Number of pages.
    pub page_count: usize,
    /// Size on disk.
    pub file_size_bytes: u64,
    /// Last modification time, when the filesystem reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    /// Metadata of the first page.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

/// Read page count and file information for the PDF at `path`.
///
/// # Errors
///
/// Same as [`PdfLoader::load`].
pub fn document_info(path: &Path) -> Result<DocumentInfo> {
    let pages = PdfLoader.load(path)?;
    let file_meta = std::fs::metadata(path).map_err(|e| unreadable(path, e.to_string()))?;

    Ok(DocumentInfo {
        filename: document_id(path),
        page_count: pages.len(),
        file_size_bytes: file_meta.len(),
        last_modified: file_meta.modified().ok().map(DateTime::<Utc>::from),
        metadata: pages.into_iter().next().map(|p| p.metadata).unwrap_or_default(),
    })
}
