use std::time::Duration;

use prism_contracts::codec::ImageRef;
use prism_contracts::payload::extract_structured_payload;
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{ConfigError, ReasoningError};
use crate::http::{build_client, join_url, send_json};

/// One call to a chat-style model: an instruction, optionally with an image.
#[derive(Debug, Clone, PartialEq)]
pub struct ReasoningRequest {
    pub model: String,
    pub instruction: String,
    pub image: Option<ImageRef>,
    /// Attach an ephemeral cache hint to the image part.
    pub cache_annotation: bool,
    pub temperature: Option<f64>,
}

impl ReasoningRequest {
    pub fn text(model: &str, instruction: impl Into<String>) -> Self {
        Self {
            model: model.to_string(),
            instruction: instruction.into(),
            image: None,
            cache_annotation: false,
            temperature: None,
        }
    }

    pub fn with_image(mut self, image: ImageRef, cache_annotation: bool) -> Self {
        self.image = Some(image);
        self.cache_annotation = cache_annotation;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Capability shared by the classifier, the analyzer and the judge.
///
/// Implementors only provide `complete`; `invoke` layers structured-payload
/// extraction on top so every caller parses model output the same way.
pub trait StructuredReasoningService: Send + Sync {
    fn complete(&self, request: &ReasoningRequest) -> Result<String, ReasoningError>;

    fn invoke(&self, request: &ReasoningRequest) -> Result<Map<String, Value>, ReasoningError> {
        let text = self.complete(request)?;
        Ok(extract_structured_payload(&text)?)
    }
}

/// OpenAI-compatible `POST {base}/chat/completions` client.
pub struct ChatCompletionsService {
    endpoint: String,
    token: Option<String>,
    timeout: Duration,
    http: HttpClient,
}

impl ChatCompletionsService {
    pub fn new(
        api_base: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: join_url(api_base, "chat/completions"),
            token,
            timeout,
            http: build_client(timeout)?,
        })
    }

    pub fn from_config(config: &EngineConfig, timeout: Duration) -> Result<Self, ConfigError> {
        Self::new(config.require_api_base()?, config.api_token.clone(), timeout)
    }
}

impl StructuredReasoningService for ChatCompletionsService {
    fn complete(&self, request: &ReasoningRequest) -> Result<String, ReasoningError> {
        debug!(
            model = %request.model,
            with_image = request.image.is_some(),
            "chat completion request"
        );
        let mut builder = self.http.post(&self.endpoint).json(&chat_payload(request));
        if let Some(token) = self.token.as_deref() {
            builder = builder.bearer_auth(token);
        }
        let response = send_json(builder, self.timeout)?;
        completion_text(&response)
    }
}

pub fn chat_payload(request: &ReasoningRequest) -> Value {
    let content = match request.image.as_ref() {
        None => Value::String(request.instruction.clone()),
        Some(image) => {
            let mut image_part = json!({
                "type": "image_url",
                "image_url": { "url": image.to_encoded().as_str() },
            });
            if request.cache_annotation {
                image_part["cache_control"] = json!({ "type": "ephemeral" });
            }
            json!([
                { "type": "text", "text": request.instruction },
                image_part,
            ])
        }
    };

    let mut payload = json!({
        "model": request.model,
        "messages": [{ "role": "user", "content": content }],
    });
    if let Some(temperature) = request.temperature {
        payload["temperature"] = json!(temperature);
    }
    payload
}

/// Reads `choices[0].message.content`, accepting either a plain string or a
/// list of text parts.
pub fn completion_text(response: &Value) -> Result<String, ReasoningError> {
    let content = response
        .pointer("/choices/0/message/content")
        .ok_or(ReasoningError::EmptyResponse)?;
    let text = match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<&str>>()
            .join(""),
        _ => String::new(),
    };
    let text = text.trim();
    if text.is_empty() {
        return Err(ReasoningError::EmptyResponse);
    }
    Ok(text.to_string())
}
