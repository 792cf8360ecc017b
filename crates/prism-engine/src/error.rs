use prism_contracts::codec::CodecError;
use prism_contracts::payload::PayloadError;
use prism_contracts::scoring::ScoreParseError;
use thiserror::Error;

use crate::http::HttpFailure;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{key} must be a positive integer, got '{value}'")]
    InvalidNumber { key: String, value: String },
    #[error("{0} is not configured")]
    Missing(&'static str),
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReasoningError {
    #[error("reasoning service is not configured: {0}")]
    NotConfigured(String),
    #[error("reasoning request timed out after {seconds}s")]
    Timeout { seconds: u64 },
    #[error("reasoning request failed: {0}")]
    Remote(String),
    #[error("reasoning service returned no message content")]
    EmptyResponse,
    #[error("reasoning output is not a structured payload: {0}")]
    Unparsable(#[from] PayloadError),
}

impl ReasoningError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotConfigured(_) => "not_configured",
            Self::Timeout { .. } => "timeout",
            Self::Remote(_) => "remote",
            Self::EmptyResponse => "empty_response",
            Self::Unparsable(_) => "unparsable",
        }
    }
}

impl From<HttpFailure> for ReasoningError {
    fn from(failure: HttpFailure) -> Self {
        match failure {
            HttpFailure::Timeout { seconds } => Self::Timeout { seconds },
            other => Self::Remote(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    #[error("image generator is not configured: {0}")]
    NotConfigured(String),
    #[error("image generation timed out after {seconds}s")]
    Timeout { seconds: u64 },
    #[error("image generation failed: {0}")]
    Remote(String),
    #[error("image generation response is unusable: {0}")]
    InvalidResponse(String),
    #[error("generated image could not be decoded: {0}")]
    Codec(#[from] CodecError),
}

impl GenerationError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotConfigured(_) => "not_configured",
            Self::Timeout { .. } => "timeout",
            Self::Remote(_) => "remote",
            Self::InvalidResponse(_) => "invalid_response",
            Self::Codec(_) => "codec",
        }
    }
}

impl From<HttpFailure> for GenerationError {
    fn from(failure: HttpFailure) -> Self {
        match failure {
            HttpFailure::Timeout { seconds } => Self::Timeout { seconds },
            HttpFailure::InvalidJson(detail) => Self::InvalidResponse(detail),
            other => Self::Remote(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    #[error("image transformer is not configured: {0}")]
    NotConfigured(String),
    #[error("invalid transform parameters: {0}")]
    InvalidParams(String),
    #[error("no image data provided")]
    EmptyImage,
    #[error("request timed out after {seconds}s; the image generation took too long")]
    Timeout { seconds: u64 },
    #[error("network error: {0}")]
    Remote(String),
    #[error("transform response is unusable: {0}")]
    InvalidResponse(String),
    #[error("transformed image could not be decoded: {0}")]
    Codec(#[from] CodecError),
}

impl TransformError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotConfigured(_) => "not_configured",
            Self::InvalidParams(_) => "invalid_params",
            Self::EmptyImage => "empty_image",
            Self::Timeout { .. } => "timeout",
            Self::Remote(_) => "remote",
            Self::InvalidResponse(_) => "invalid_response",
            Self::Codec(_) => "codec",
        }
    }
}

impl From<HttpFailure> for TransformError {
    fn from(failure: HttpFailure) -> Self {
        match failure {
            HttpFailure::Timeout { seconds } => Self::Timeout { seconds },
            HttpFailure::InvalidJson(detail) => Self::InvalidResponse(detail),
            other => Self::Remote(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Reasoning(#[from] ReasoningError),
    #[error("vision model returned an empty answer")]
    EmptyAnswer,
}

impl AnalysisError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Reasoning(inner) => inner.kind(),
            Self::EmptyAnswer => "empty_answer",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum JudgeError {
    #[error("no known criteria requested; expected any of: {0}")]
    InvalidCriteria(String),
    #[error(transparent)]
    Reasoning(#[from] ReasoningError),
    #[error("judge response is malformed: {0}")]
    Malformed(#[from] ScoreParseError),
}

impl JudgeError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidCriteria(_) => "invalid_criteria",
            Self::Reasoning(inner) => inner.kind(),
            Self::Malformed(_) => "malformed_response",
        }
    }
}
