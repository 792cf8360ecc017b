use std::time::Duration;

use prism_contracts::codec::{self, sniff_format, ImageRef, DEFAULT_IMAGE_FORMAT};
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{ConfigError, GenerationError};
use crate::http::{build_client, join_url, response_body_or_error, send, send_json};

/// Image produced by an adapter plus whatever it wants to report about it.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    pub image: ImageRef,
    pub metadata: Map<String, Value>,
}

pub trait ImageGenerator: Send + Sync {
    /// Model id reported as `model_used`.
    fn model(&self) -> &str;
    fn generate(&self, prompt: &str) -> Result<GeneratedImage, GenerationError>;
}

/// Text-to-image over an OpenAI-compatible `images/generations` endpoint.
pub struct ServingImageGenerator {
    endpoint: String,
    token: Option<String>,
    model: String,
    timeout: Duration,
    http: HttpClient,
}

impl ServingImageGenerator {
    pub fn new(
        api_base: &str,
        token: Option<String>,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: join_url(api_base, "images/generations"),
            token,
            model: model.to_string(),
            timeout,
            http: build_client(timeout)?,
        })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        Self::new(
            config.require_api_base()?,
            config.api_token.clone(),
            &config.image_model,
            config.timeouts.generation,
        )
    }

    fn download(&self, url: &str) -> Result<ImageRef, GenerationError> {
        let response = send(self.http.get(url), self.timeout)?;
        let bytes = response_body_or_error(response, self.timeout)?;
        if bytes.is_empty() {
            return Err(GenerationError::InvalidResponse(format!(
                "image download from {url} returned no bytes"
            )));
        }
        let format = sniff_format(&bytes).unwrap_or(DEFAULT_IMAGE_FORMAT);
        Ok(ImageRef::new(bytes, format))
    }
}

impl ImageGenerator for ServingImageGenerator {
    fn model(&self) -> &str {
        &self.model
    }

    fn generate(&self, prompt: &str) -> Result<GeneratedImage, GenerationError> {
        debug!(model = %self.model, "image generation request");
        let mut builder = self
            .http
            .post(&self.endpoint)
            .json(&generation_payload(&self.model, prompt));
        if let Some(token) = self.token.as_deref() {
            builder = builder.bearer_auth(token);
        }
        let response = send_json(builder, self.timeout)?;
        let image = match generated_item(&response)? {
            GeneratedItem::Inline(image) => image,
            GeneratedItem::Url(url) => self.download(&url)?,
        };

        let mut metadata = Map::new();
        metadata.insert("prompt".to_string(), Value::String(prompt.to_string()));
        metadata.insert("model".to_string(), Value::String(self.model.clone()));
        Ok(GeneratedImage { image, metadata })
    }
}

pub fn generation_payload(model: &str, prompt: &str) -> Value {
    json!({ "model": model, "prompt": prompt })
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeneratedItem {
    Inline(ImageRef),
    Url(String),
}

/// Reads `data[0]`, preferring inline `b64_json` over a download `url`.
pub fn generated_item(response: &Value) -> Result<GeneratedItem, GenerationError> {
    let item = response
        .pointer("/data/0")
        .ok_or_else(|| GenerationError::InvalidResponse("response has no data[0]".to_string()))?;
    if let Some(encoded) = item
        .get("b64_json")
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
    {
        return Ok(GeneratedItem::Inline(codec::decode(encoded)?));
    }
    if let Some(url) = item
        .get("url")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        return Ok(GeneratedItem::Url(url.to_string()));
    }
    Err(GenerationError::InvalidResponse(
        "data[0] has neither b64_json nor url".to_string(),
    ))
}
