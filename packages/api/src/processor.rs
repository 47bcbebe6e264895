//! The per-job pipeline: validate, extract, format.

use actors::{HandlerFuture, JobHandler, ProgressReporter};
use formatter::{DocumentMetadata, FormattedDocument, Formatter};
use pipeline_core::{
    ExtractedContent, Job, JobError, ProcessingResult, RepositoryReference, ResultMetadata, Stage,
};
use sources::{Extractor, Validator};
use tracing::{Instrument, info, info_span};

/// Runs one submitted URL through every stage.
///
/// Stage errors keep their kind and end the job; nothing is retried.
#[derive(Clone)]
pub struct RepositoryProcessor {
    validator: Validator,
    extractor: Extractor,
    formatter: Formatter,
}

impl RepositoryProcessor {
    pub fn new(validator: Validator, extractor: Extractor, formatter: Formatter) -> Self {
        Self {
            validator,
            extractor,
            formatter,
        }
    }

    pub async fn process(
        &self,
        source_url: &str,
        progress: &ProgressReporter,
    ) -> Result<ProcessingResult, JobError> {
        let reference = self.validator.validate(source_url).await?;
        progress.attach_reference(reference.clone());
        progress.report(Stage::Validated).await;

        let content = self.extractor.extract(&reference).await?;
        progress.report(Stage::Extracted).await;

        let document = self
            .formatter
            .format(&content, &DocumentMetadata::from(&reference))?;
        progress.report(Stage::Formatted).await;

        info!(
            "Formatted {} ({} of {} files, {} chars{})",
            reference,
            document.included_files,
            content.file_count(),
            document.char_count(),
            if document.truncated { ", truncated" } else { "" }
        );
        Ok(build_result(&reference, &content, document))
    }
}

impl JobHandler for RepositoryProcessor {
    fn handle(&self, job: &Job, progress: ProgressReporter) -> HandlerFuture {
        let processor = self.clone();
        let source_url = job.source_url.clone();
        let span = info_span!("job", id = %job.id, user = %job.user_id);
        Box::pin(
            async move { processor.process(&source_url, &progress).await }.instrument(span),
        )
    }
}

fn build_result(
    reference: &RepositoryReference,
    content: &ExtractedContent,
    document: FormattedDocument,
) -> ProcessingResult {
    let metadata = ResultMetadata {
        repository_name: reference.full_name(),
        repository_url: reference.url.clone(),
        branch: reference.branch.clone(),
        file_count: content.file_count(),
        total_size_bytes: content.total_bytes,
        included_files: document.included_files,
        omitted_files: document.omitted_files,
        truncated: document.truncated,
        document_chars: document.char_count(),
    };
    ProcessingResult::new(metadata, document.text)
}

/// Plain-text export of a completed result; the document is stored as
/// rendered, so nothing is recomputed.
pub fn format_for_llm(result: &ProcessingResult) -> &str {
    &result.content
}
