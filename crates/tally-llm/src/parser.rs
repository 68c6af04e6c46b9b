//! Parse model output into extracted fields

use crate::ExtractionProvider;
use serde_json::Value;
use std::time::Instant;
use tally_domain::{ExtractedFields, ExtractionError, ExtractionResult};
use tracing::debug;

/// Confidence assumed when the model does not report one
const DEFAULT_CONFIDENCE: f64 = 0.8;

/// Parse a model's text output into a field map
///
/// Accepts a bare JSON object, one wrapped in a markdown code block, or one
/// embedded in surrounding prose. A single-element array is unwrapped.
pub fn parse_fields(response: &str) -> Result<ExtractedFields, ExtractionError> {
    let json_str = extract_json(response)?;

    let json: Value = serde_json::from_str(json_str)
        .map_err(|e| ExtractionError::invalid(format!("JSON parse error: {}", e)))?;

    let object = match json {
        Value::Object(object) => object,
        Value::Array(mut items) if items.len() == 1 => match items.remove(0) {
            Value::Object(object) => object,
            _ => return Err(ExtractionError::invalid("Expected a JSON object")),
        },
        _ => return Err(ExtractionError::invalid("Expected a JSON object")),
    };

    Ok(ExtractedFields::from_object(object))
}

/// Extract the JSON payload from a response, handling markdown code blocks
fn extract_json(response: &str) -> Result<&str, ExtractionError> {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return Err(ExtractionError::invalid("Empty response"));
    }

    // Fenced block: take what sits between the first fence line and the closing fence
    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(after_fence.len());
        let body = &after_fence[body_start..];
        let body = match body.find("```") {
            Some(end) => &body[..end],
            None => body,
        };
        let body = body.trim();
        if body.is_empty() {
            return Err(ExtractionError::invalid("Empty code block"));
        }
        return Ok(body);
    }

    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Ok(trimmed);
    }

    // Prose around an object
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(&trimmed[start..=end]),
        _ => Err(ExtractionError::invalid("No JSON object in response")),
    }
}

/// Turn a provider's raw text outcome into an [`ExtractionResult`]
///
/// Shared by every adapter: parse, run the provider's self-check, and pick up
/// the model's confidence.
pub(crate) fn finish<P>(
    provider: &P,
    started: Instant,
    raw: Result<String, ExtractionError>,
) -> ExtractionResult
where
    P: ExtractionProvider + ?Sized,
{
    let name = provider.name();
    let outcome = raw.and_then(|text| {
        debug!(provider = name, "Model response length: {} chars", text.len());
        parse_fields(&text)
    });

    let extracted = match outcome {
        Ok(extracted) => extracted,
        Err(error) => return ExtractionResult::failed(name, error, started.elapsed()),
    };

    let validation = provider.validate_response(&extracted);
    if !validation.is_valid() {
        return ExtractionResult::failed(
            name,
            ExtractionError::invalid(format!(
                "Response failed validation: {}",
                validation.summary()
            )),
            started.elapsed(),
        );
    }

    let confidence = extracted.confidence().unwrap_or(DEFAULT_CONFIDENCE);
    ExtractionResult::succeeded(name, extracted, confidence, started.elapsed())
}
