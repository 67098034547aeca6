//! Document loader trait.

use std::path::Path;

use tracing::warn;

use crate::document::Page;
use crate::error::{RagError, Result};

/// Extracts the pages of a document.
///
/// Implementations return pages ordered by `page_number`, starting at 1.
/// Loading is blocking and CPU bound; async callers should run it on a
/// blocking thread.
pub trait DocumentLoader: Send + Sync {
    /// Load the pages of the document at `path`.
    ///
    /// # Errors
    ///
    /// - [`RagError::FileNotFound`] if `path` does not exist
    /// - [`RagError::UnreadableDocument`] if the file cannot be parsed
    fn load(&self, path: &Path) -> Result<Vec<Page>>;
}

/// Check that `path` exists and warn when it does not look like a PDF.
pub fn check_document_path(path: &Path) -> Result<()> {
    if !path.exists() {
        warn!(path = %path.display(), "document not found");
        return Err(RagError::FileNotFound { path: path.to_path_buf() });
    }

    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        warn!(path = %path.display(), "file may not be a PDF");
    }
    Ok(())
}

/// Derive a document identifier from the file name.
pub fn document_id(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
