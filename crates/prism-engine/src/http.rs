use std::error::Error as StdError;
use std::time::Duration;

use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response as HttpResponse};
use serde_json::Value;
use thiserror::Error;

use crate::error::ConfigError;

pub const ERROR_BODY_CHARS: usize = 512;

/// Transport-level outcome shared by every adapter before it is mapped onto
/// the adapter's own error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpFailure {
    #[error("request timed out after {seconds}s")]
    Timeout { seconds: u64 },
    #[error("{0}")]
    Transport(String),
    #[error("request failed ({code}): {body}")]
    Status { code: u16, body: String },
    #[error("invalid JSON payload: {0}")]
    InvalidJson(String),
}

/// Every outbound client carries a timeout; there is no constructor without one.
pub fn build_client(timeout: Duration) -> Result<HttpClient, ConfigError> {
    HttpClient::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| ConfigError::Client(error_chain_text(&err, ERROR_BODY_CHARS)))
}

pub fn send(request: RequestBuilder, timeout: Duration) -> Result<HttpResponse, HttpFailure> {
    request
        .send()
        .map_err(|err| transport_failure(&err, timeout))
}

pub fn send_json(request: RequestBuilder, timeout: Duration) -> Result<Value, HttpFailure> {
    let response = send(request, timeout)?;
    response_json_or_error(response, timeout)
}

pub fn response_json_or_error(
    response: HttpResponse,
    timeout: Duration,
) -> Result<Value, HttpFailure> {
    let body = response_body_or_error(response, timeout)?;
    serde_json::from_slice::<Value>(&body)
        .map_err(|err| HttpFailure::InvalidJson(truncate_text(&err.to_string(), ERROR_BODY_CHARS)))
}

pub fn response_body_or_error(
    response: HttpResponse,
    timeout: Duration,
) -> Result<Vec<u8>, HttpFailure> {
    let status = response.status();
    let body = response
        .bytes()
        .map_err(|err| transport_failure(&err, timeout))?;
    if !status.is_success() {
        return Err(HttpFailure::Status {
            code: status.as_u16(),
            body: truncate_text(&String::from_utf8_lossy(&body), ERROR_BODY_CHARS),
        });
    }
    Ok(body.to_vec())
}

fn transport_failure(err: &reqwest::Error, timeout: Duration) -> HttpFailure {
    if err.is_timeout() {
        return HttpFailure::Timeout {
            seconds: timeout.as_secs(),
        };
    }
    HttpFailure::Transport(error_chain_text(err, ERROR_BODY_CHARS))
}

pub fn error_chain_text(err: &(dyn StdError + 'static), max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut current = Some(err);
    while let Some(cause) = current {
        let text = cause.to_string();
        let trimmed = text.trim();
        if !trimmed.is_empty()
            && !parts
                .last()
                .map(|existing| existing == trimmed)
                .unwrap_or(false)
        {
            parts.push(trimmed.to_string());
        }
        current = cause.source();
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
