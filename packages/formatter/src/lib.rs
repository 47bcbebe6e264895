//! LLM document formatting.
//!
//! Turns extracted repository content into one self-describing text
//! document: a fixed analysis preamble, a metadata block, then every file in
//! a fenced block. The document never exceeds a character budget; when the
//! content does not fit, whole files are dropped from the end and a
//! truncation marker becomes the last line.

use pipeline_core::{ErrorKind, ExtractedContent, ExtractedFile, JobError, RepositoryReference};
use tracing::debug;

/// Default character budget for a document.
pub const DEFAULT_MAX_CHARS: usize = 400_000;

/// Final line of a document whose content was cut short.
pub const TRUNCATION_MARKER: &str =
    "[... repository content truncated at a file boundary to fit the character budget ...]";

const PREAMBLE: &str = "\
# Repository Analysis Request

You are reviewing the source code of a software repository. Using only the
files below, describe what the project does, how it is structured, the main
technologies it relies on, and any notable strengths or risks in the code.
Cite file paths when you refer to specific code.
";

const EMPTY_CONTENT: &str = "_No analyzable text files were found._\n";

/// Formatting failed because not even a truncated document fits.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("document header needs {required} characters but the budget is {budget}")]
    HeaderExceedsBudget { required: usize, budget: usize },

    #[error("file '{path}' needs {required} characters, more than the {available} available for content")]
    FileExceedsBudget {
        path: String,
        required: usize,
        available: usize,
    },
}

impl FormatError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::FormattingBudgetExceeded
    }
}

impl From<FormatError> for JobError {
    fn from(e: FormatError) -> Self {
        JobError::new(e.kind(), e.to_string())
    }
}

/// Repository facts shown in the document header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub repository_name: String,
    pub repository_url: String,
    pub branch: String,
}

impl From<&RepositoryReference> for DocumentMetadata {
    fn from(reference: &RepositoryReference) -> Self {
        Self {
            repository_name: reference.full_name(),
            repository_url: reference.url.clone(),
            branch: reference.branch.clone(),
        }
    }
}

/// A rendered document and what went into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedDocument {
    pub text: String,
    pub included_files: usize,
    pub omitted_files: usize,
    pub truncated: bool,
}

impl FormattedDocument {
    /// Length in characters, the unit the budget is measured in.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Budgeted document renderer. Pure and deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Formatter {
    max_chars: usize,
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHARS)
    }
}

impl Formatter {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Render `content` under `metadata`.
    pub fn format(
        &self,
        content: &ExtractedContent,
        metadata: &DocumentMetadata,
    ) -> Result<FormattedDocument, FormatError> {
        let header = render_header(content, metadata);
        let header_chars = header.chars().count();

        if content.is_empty() {
            let text = format!("{}{}", header, EMPTY_CONTENT);
            let required = text.chars().count();
            if required > self.max_chars {
                return Err(FormatError::HeaderExceedsBudget {
                    required,
                    budget: self.max_chars,
                });
            }
            return Ok(FormattedDocument {
                text,
                included_files: 0,
                omitted_files: 0,
                truncated: false,
            });
        }

        let blocks: Vec<String> = content.files.iter().map(render_file).collect();
        let block_chars: Vec<usize> = blocks.iter().map(|b| b.chars().count()).collect();

        // Blocks are separated by a blank line.
        let full_chars = header_chars + block_chars.iter().sum::<usize>() + blocks.len() - 1;
        if full_chars <= self.max_chars {
            return Ok(FormattedDocument {
                text: format!("{}{}", header, blocks.join("\n")),
                included_files: blocks.len(),
                omitted_files: 0,
                truncated: false,
            });
        }

        // Room left for file blocks once the header and "\n" + marker are in.
        let reserved = header_chars + 1 + TRUNCATION_MARKER.chars().count();
        let available = self
            .max_chars
            .checked_sub(reserved)
            .ok_or(FormatError::HeaderExceedsBudget {
                required: reserved,
                budget: self.max_chars,
            })?;

        // A file that cannot fit on its own fails the job wherever it sits.
        if let Some((file, chars)) = content
            .files
            .iter()
            .zip(&block_chars)
            .find(|(_, chars)| **chars > available)
        {
            return Err(FormatError::FileExceedsBudget {
                path: file.path.clone(),
                required: *chars,
                available,
            });
        }

        let mut used = 0;
        let mut kept = 0;
        for chars in &block_chars {
            let cost = if kept == 0 { *chars } else { chars + 1 };
            if used + cost > available {
                break;
            }
            used += cost;
            kept += 1;
        }

        // The full document was over budget, so the loop stopped early.
        let stop = &content.files[kept];

        let mut text = header;
        text.push_str(&blocks[..kept].join("\n"));
        text.push('\n');
        text.push_str(TRUNCATION_MARKER);

        let omitted = blocks.len() - kept;
        debug!(
            kept,
            omitted,
            budget = self.max_chars,
            "Truncated document before '{}'",
            stop.path
        );

        Ok(FormattedDocument {
            text,
            included_files: kept,
            omitted_files: omitted,
            truncated: true,
        })
    }
}

fn render_header(content: &ExtractedContent, metadata: &DocumentMetadata) -> String {
    format!(
        "{PREAMBLE}\n\
         ## Repository\n\n\
         - Name: {}\n\
         - URL: {}\n\
         - Branch: {}\n\
         - Files: {}\n\
         - Size: {} bytes\n\n\
         ## Content\n\n",
        metadata.repository_name,
        metadata.repository_url,
        metadata.branch,
        content.file_count(),
        content.total_bytes,
    )
}

fn render_file(file: &ExtractedFile) -> String {
    let fence = fence_for(&file.content);
    let newline = if file.content.ends_with('\n') { "" } else { "\n" };
    format!(
        "### File: {}\n{fence}\n{}{newline}{fence}\n",
        file.path, file.content
    )
}

/// A backtick fence longer than any run inside `content`.
fn fence_for(content: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in content.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    "`".repeat((longest + 1).max(3))
}
