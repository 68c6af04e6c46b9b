//! Document Processor implementation

use crate::classify::classify_document;
use crate::preprocess::{self, PreparedDocument};
use crate::{ProcessorConfig, ProcessorError};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tally_domain::{
    fields, DocumentClass, DocumentKind, ExtractionError, ExtractionRequest, ExtractionResult,
    ReviewRecord, SourceDocument,
};
use tally_gatekeeper::{ResponseValidator, SemanticsCheck};
use tally_llm::{ExtractionProvider, RetryExecutor};
use tracing::{debug, info, warn};

/// Turns a source document into a review record
///
/// One provider, chosen at construction. Every call to [`process`] yields
/// exactly one record; nothing escapes as an error.
///
/// [`process`]: DocumentProcessor::process
pub struct DocumentProcessor {
    provider: Arc<dyn ExtractionProvider>,
    executor: RetryExecutor,
    validator: ResponseValidator,
    semantics: SemanticsCheck,
    config: ProcessorConfig,
}

impl DocumentProcessor {
    /// Create a new processor
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(
        provider: Arc<dyn ExtractionProvider>,
        config: ProcessorConfig,
    ) -> Result<Self, ProcessorError> {
        config.validate()?;
        Ok(Self {
            provider,
            executor: RetryExecutor::new(config.retry.clone()),
            validator: ResponseValidator::new(config.validation.clone()),
            semantics: SemanticsCheck::from_config(&config.validation),
            config,
        })
    }

    /// Name of the configured provider
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Active configuration
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Process a file by path
    pub async fn process_path(&self, path: impl AsRef<Path>, categories: &[String]) -> ReviewRecord {
        self.process(&SourceDocument::new(path.as_ref()), categories)
            .await
    }

    /// Process a document against the caller's category whitelist
    ///
    /// Unsupported extensions and unreadable or corrupt content produce an
    /// `Unprocessable` record without any provider call.
    pub async fn process(&self, document: &SourceDocument, categories: &[String]) -> ReviewRecord {
        let started = Instant::now();
        let path = document.path.as_path();
        let file_name = document.file_name();

        let Some(kind) = document.kind.or_else(|| DocumentKind::from_path(path)) else {
            debug!(path = %path.display(), "Unsupported file type");
            let error = ExtractionError::unprocessable(format!(
                "Unsupported file type: {}",
                file_name
            ));
            return self.unprocessable(document, None, error, started);
        };

        let prepared = match preprocess::prepare(path, kind, &self.config).await {
            Ok(prepared) => prepared,
            Err(error) => {
                warn!(
                    path = %path.display(),
                    kind = "unprocessable",
                    "Document rejected before extraction: {}",
                    error.message
                );
                return self.unprocessable(document, Some(kind), error, started);
            }
        };

        let request = build_request(&file_name, prepared, categories);
        let result = self.executor.run(self.provider.as_ref(), &request).await;

        self.review(document, &request, result, categories)
    }

    /// Re-validate a provider result and attach review flags
    fn review(
        &self,
        document: &SourceDocument,
        request: &ExtractionRequest,
        result: ExtractionResult,
        categories: &[String],
    ) -> ReviewRecord {
        let path = document.path.as_path();
        let text = request.text.as_deref();

        if result.fields.is_none() {
            let class = classify_document(None, text, &request.file_name);
            let result = if result.error.is_some() {
                result
            } else {
                result.into_failure(ExtractionError::invalid(
                    "Provider reported success without fields",
                ))
            };
            return self.failed(path, request.kind, class, result);
        }

        let class = classify_document(result.fields.as_ref(), text, &request.file_name);
        let outcome = result
            .fields
            .as_ref()
            .map(|extracted| self.validator.validate(extracted));
        if let Some(outcome) = outcome.filter(|o| !o.is_valid()) {
            let result = result.into_failure(ExtractionError::invalid(format!(
                "Response failed validation: {}",
                outcome.summary()
            )));
            return self.failed(path, request.kind, class, result);
        }

        let mut notes = Vec::new();
        let mut penalty = 0.0;
        if let Some(extracted) = result.fields.as_ref() {
            let verdict = self.semantics.cross_check(class, extracted);
            penalty = verdict.penalty;
            notes.extend(verdict.note);

            if let Some(category) = extracted.text(fields::CATEGORY) {
                if !categories.is_empty()
                    && !categories.iter().any(|c| c.trim().eq_ignore_ascii_case(category))
                {
                    notes.push(format!("category '{}' is not in the category list", category));
                }
            }
        }

        let result = result.with_confidence_penalty(penalty);
        if result.confidence < self.config.review_confidence_threshold {
            notes.push(format!(
                "confidence {:.2} is below {:.2}",
                result.confidence, self.config.review_confidence_threshold
            ));
        }

        info!(
            path = %path.display(),
            provider = %result.provider,
            attempts = result.attempts,
            confidence = result.confidence,
            flags = notes.len(),
            "Document extracted"
        );

        notes.into_iter().fold(
            ReviewRecord::new(path, Some(request.kind), class, result),
            |record, note| record.flag(note),
        )
    }

    fn failed(
        &self,
        path: &Path,
        kind: DocumentKind,
        class: DocumentClass,
        result: ExtractionResult,
    ) -> ReviewRecord {
        let (error_kind, message) = result
            .error
            .as_ref()
            .map(|e| (e.kind.as_str(), e.message.clone()))
            .unwrap_or(("unknown", String::new()));
        warn!(
            path = %path.display(),
            provider = %result.provider,
            kind = error_kind,
            attempts = result.attempts,
            "Extraction failed: {}",
            message
        );

        let note = format!("extraction failed ({}): {}", error_kind, message);
        ReviewRecord::new(path, Some(kind), class, result).flag(note)
    }

    fn unprocessable(
        &self,
        document: &SourceDocument,
        kind: Option<DocumentKind>,
        error: ExtractionError,
        started: Instant,
    ) -> ReviewRecord {
        let note = format!("unprocessable: {}", error.message);
        let result = ExtractionResult::failed(self.provider.name(), error, started.elapsed())
            .with_attempts(0);
        let class = classify_document(None, None, &document.file_name());
        ReviewRecord::new(&document.path, kind, class, result).flag(note)
    }
}

fn build_request(file_name: &str, prepared: PreparedDocument, categories: &[String]) -> ExtractionRequest {
    ExtractionRequest {
        file_name: file_name.to_string(),
        content: prepared.content,
        kind: prepared.kind,
        mime_type: prepared.mime_type,
        text: prepared.text,
        categories: categories.to_vec(),
    }
}
