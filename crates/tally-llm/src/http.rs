//! HTTP plumbing and failure classification shared by the API adapters

use crate::LlmError;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tally_domain::{ErrorKind, ExtractionError};

/// Longest error body kept in a message
const MAX_ERROR_BODY: usize = 512;

/// Build a client with a whole-request timeout
pub(crate) fn build_client(timeout: Duration) -> Result<Client, LlmError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LlmError::Client(e.to_string()))
}

/// Classify a non-success HTTP status
///
/// Timeouts, rate limiting and server errors may clear up on their own;
/// everything else is a problem with the request or the credentials.
pub(crate) fn classify_status(status: StatusCode) -> ErrorKind {
    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        ErrorKind::Transient
    } else {
        ErrorKind::Permanent
    }
}

/// Classify a transport-level failure
pub(crate) fn from_request_error(err: reqwest::Error) -> ExtractionError {
    if err.is_timeout() {
        ExtractionError::transient(format!("Request timed out: {}", err))
    } else if err.is_connect() || err.is_request() {
        ExtractionError::transient(format!("Request failed: {}", err))
    } else if err.is_decode() {
        ExtractionError::invalid(format!("Failed to decode response: {}", err))
    } else if let Some(status) = err.status() {
        ExtractionError::new(classify_status(status), format!("HTTP {}", status))
    } else {
        ExtractionError::permanent(format!("Request could not be built: {}", err))
    }
}

/// Turn a non-success response into a classified error
pub(crate) async fn from_response(response: Response) -> ExtractionError {
    let status = response.status();
    let mut body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push_str("...");
    }
    ExtractionError::new(classify_status(status), format!("HTTP {}: {}", status, body))
}

/// Send a request and decode a JSON success body
pub(crate) async fn send_json<T>(request: RequestBuilder) -> Result<T, ExtractionError>
where
    T: DeserializeOwned,
{
    let response = request.send().await.map_err(from_request_error)?;
    if !response.status().is_success() {
        return Err(from_response(response).await);
    }

    let bytes = response.bytes().await.map_err(from_request_error)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ExtractionError::invalid(format!("Failed to parse response: {}", e)))
}
