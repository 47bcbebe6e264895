//! Repository content as delivered by the ingestion step.

use serde::{Deserialize, Serialize};

/// A single text file pulled from the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFile {
    /// Repository-relative path using `/` separators.
    pub path: String,
    pub content: String,
}

impl ExtractedFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.content.len() as u64
    }
}

/// Filtered, size-capped repository slice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedContent {
    pub files: Vec<ExtractedFile>,
    /// Sum of the byte sizes of `files`.
    pub total_bytes: u64,
}

impl ExtractedContent {
    /// Build from a file list, computing `total_bytes`.
    pub fn from_files(files: Vec<ExtractedFile>) -> Self {
        let total_bytes = files.iter().map(ExtractedFile::size_bytes).sum();
        Self { files, total_bytes }
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
