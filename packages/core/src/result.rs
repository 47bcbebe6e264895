//! Output of a completed pipeline run.

use serde::{Deserialize, Serialize};

/// Descriptive metadata attached to a formatted document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultMetadata {
    /// `owner/name`.
    pub repository_name: String,
    pub repository_url: String,
    pub branch: String,
    /// Files delivered by extraction.
    pub file_count: usize,
    /// Bytes delivered by extraction.
    pub total_size_bytes: u64,
    /// Files that made it into the document.
    pub included_files: usize,
    /// Files dropped at the truncation boundary.
    pub omitted_files: usize,
    pub truncated: bool,
    /// Length of `content` in characters.
    pub document_chars: usize,
}

/// The LLM-ready document plus its metadata.
///
/// Owned by its job once attached; never mutated afterward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub metadata: ResultMetadata,
    pub content: String,
}

impl ProcessingResult {
    pub fn new(metadata: ResultMetadata, content: impl Into<String>) -> Self {
        Self {
            metadata,
            content: content.into(),
        }
    }
}
