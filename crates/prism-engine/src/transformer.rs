use std::time::Duration;

use prism_contracts::codec::{self, ImageRef};
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{ConfigError, TransformError};
use crate::generator::GeneratedImage;
use crate::http::{build_client, send_json};

pub const DEFAULT_STRENGTH: f64 = 0.5;
pub const DEFAULT_GUIDANCE_SCALE: f64 = 12.0;
pub const DEFAULT_INFERENCE_STEPS: u32 = 50;
pub const DEFAULT_NEGATIVE_PROMPT: &str = "lowres, changed skin tones, error, cropped, worst quality, \
low quality, jpeg artifacts, ugly, duplicate, morbid, mutilated, \
out of frame, extra fingers, mutated hands, poorly drawn hands, \
poorly drawn face, mutation, deformed, blurry, dehydrated, \
bad anatomy, bad proportions, extra limbs, cloned face";

#[derive(Debug, Clone, PartialEq)]
pub struct TransformParams {
    /// 0.0 keeps the input, 1.0 ignores it.
    pub strength: f64,
    pub guidance_scale: f64,
    pub steps: u32,
    pub negative_prompt: String,
}

impl Default for TransformParams {
    fn default() -> Self {
        Self {
            strength: DEFAULT_STRENGTH,
            guidance_scale: DEFAULT_GUIDANCE_SCALE,
            steps: DEFAULT_INFERENCE_STEPS,
            negative_prompt: DEFAULT_NEGATIVE_PROMPT.to_string(),
        }
    }
}

impl TransformParams {
    pub fn validate(&self) -> Result<(), TransformError> {
        if !(0.0..=1.0).contains(&self.strength) {
            return Err(TransformError::InvalidParams(format!(
                "strength must be within [0, 1], got {}",
                self.strength
            )));
        }
        if !self.guidance_scale.is_finite() {
            return Err(TransformError::InvalidParams(
                "guidance_scale must be finite".to_string(),
            ));
        }
        if self.steps == 0 {
            return Err(TransformError::InvalidParams(
                "num_inference_steps must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

pub trait ImageTransformer: Send + Sync {
    fn model(&self) -> &str;
    fn transform(
        &self,
        prompt: &str,
        image: &ImageRef,
        params: &TransformParams,
    ) -> Result<GeneratedImage, TransformError>;
}

/// Image-to-image over a model-serving endpoint that takes a
/// `dataframe_split` body and answers with base64 `predictions`.
pub struct DataframeTransformer {
    endpoint: String,
    token: Option<String>,
    model: String,
    timeout: Duration,
    http: HttpClient,
}

impl DataframeTransformer {
    pub fn new(
        endpoint: &str,
        token: Option<String>,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: endpoint.trim().to_string(),
            token,
            model: model.to_string(),
            timeout,
            http: build_client(timeout)?,
        })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        Self::new(
            config.require_transform_endpoint()?,
            config.transform_token.clone(),
            &config.transform_model,
            config.timeouts.transform,
        )
    }
}

impl ImageTransformer for DataframeTransformer {
    fn model(&self) -> &str {
        &self.model
    }

    fn transform(
        &self,
        prompt: &str,
        image: &ImageRef,
        params: &TransformParams,
    ) -> Result<GeneratedImage, TransformError> {
        params.validate()?;
        if image.is_empty() {
            return Err(TransformError::EmptyImage);
        }
        debug!(
            model = %self.model,
            strength = params.strength,
            guidance_scale = params.guidance_scale,
            steps = params.steps,
            input_bytes = image.len(),
            "image transform request"
        );

        let mut builder = self
            .http
            .post(&self.endpoint)
            .json(&dataframe_payload(prompt, image, params));
        if let Some(token) = self.token.as_deref() {
            builder = builder.bearer_auth(token);
        }
        let response = send_json(builder, self.timeout)?;
        let output = prediction_image(&response)?;
        let metadata = transform_metadata(&self.model, prompt, params, image, &output);
        Ok(GeneratedImage {
            image: output,
            metadata,
        })
    }
}

pub fn dataframe_payload(prompt: &str, image: &ImageRef, params: &TransformParams) -> Value {
    json!({
        "dataframe_split": {
            "columns": [
                "prompt",
                "negative_prior_prompt",
                "num_inference_steps",
                "init_image",
                "strength",
                "guidance_scale"
            ],
            "data": [[
                prompt,
                params.negative_prompt,
                params.steps,
                codec::encode_bare(&image.bytes),
                params.strength,
                params.guidance_scale
            ]]
        }
    })
}

/// `predictions` is either the base64 string itself or a one-element list.
pub fn prediction_image(response: &Value) -> Result<ImageRef, TransformError> {
    let encoded = match response.get("predictions") {
        Some(Value::String(encoded)) => Some(encoded.as_str()),
        Some(Value::Array(items)) => items.first().and_then(Value::as_str),
        _ => None,
    }
    .filter(|value| !value.trim().is_empty())
    .ok_or_else(|| {
        TransformError::InvalidResponse("response has no base64 predictions".to_string())
    })?;
    Ok(codec::decode(encoded)?)
}

fn transform_metadata(
    model: &str,
    prompt: &str,
    params: &TransformParams,
    input: &ImageRef,
    output: &ImageRef,
) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("model".to_string(), json!(model));
    metadata.insert("prompt".to_string(), json!(prompt));
    metadata.insert("strength".to_string(), json!(params.strength));
    metadata.insert("guidance_scale".to_string(), json!(params.guidance_scale));
    metadata.insert("num_inference_steps".to_string(), json!(params.steps));
    metadata.insert("input_image_size".to_string(), json!(input.len()));
    metadata.insert("output_image_size".to_string(), json!(output.len()));
    metadata
}

#[cfg(test)]
mod tests {
    use prism_contracts::codec::encode_bare;

    use super::*;

    fn unreachable_transformer() -> anyhow::Result<DataframeTransformer> {
        Ok(DataframeTransformer::new(
            "http://127.0.0.1:9/invocations",
            None,
            "kandinsky-controlnet-img2img",
            Duration::from_secs(5),
        )?)
    }

    #[test]
    fn defaults_are_documented_values() {
        let params = TransformParams::default();
        assert_eq!(params.strength, 0.5);
        assert_eq!(params.guidance_scale, 12.0);
        assert_eq!(params.steps, 50);
        assert!(params.negative_prompt.starts_with("lowres, changed skin tones"));
        assert!(params.negative_prompt.ends_with("extra limbs, cloned face"));
        assert!(params.validate().is_ok());
    }

    #[test]
    fn out_of_range_params_are_rejected() {
        let bad = [
            TransformParams {
                strength: 1.5,
                ..TransformParams::default()
            },
            TransformParams {
                strength: -0.1,
                ..TransformParams::default()
            },
            TransformParams {
                guidance_scale: f64::NAN,
                ..TransformParams::default()
            },
            TransformParams {
                steps: 0,
                ..TransformParams::default()
            },
        ];
        for params in bad {
            assert!(matches!(
                params.validate(),
                Err(TransformError::InvalidParams(_))
            ));
        }
    }

    #[test]
    fn invalid_input_fails_before_any_network_call() -> anyhow::Result<()> {
        let transformer = unreachable_transformer()?;
        let empty = ImageRef::new(Vec::new(), "png");
        assert_eq!(
            transformer.transform("cartoon", &empty, &TransformParams::default()),
            Err(TransformError::EmptyImage)
        );
        let image = ImageRef::new(b"abc".to_vec(), "png");
        let params = TransformParams {
            steps: 0,
            ..TransformParams::default()
        };
        assert!(matches!(
            transformer.transform("cartoon", &image, &params),
            Err(TransformError::InvalidParams(_))
        ));
        Ok(())
    }

    #[test]
    fn payload_uses_dataframe_split_columns() {
        let image = ImageRef::new(b"abc".to_vec(), "jpeg");
        let payload = dataframe_payload("watercolor", &image, &TransformParams::default());
        let split = &payload["dataframe_split"];
        assert_eq!(split["columns"][3], json!("init_image"));
        let row = &split["data"][0];
        assert_eq!(row[0], json!("watercolor"));
        assert_eq!(row[2], json!(50));
        assert_eq!(row[3], json!("YWJj"));
        assert_eq!(row[4], json!(0.5));
        assert_eq!(row[5], json!(12.0));
    }

    #[test]
    fn predictions_accept_string_or_list() -> anyhow::Result<()> {
        let gif = b"GIF89a\x01\x00\x01\x00".to_vec();
        let single = json!({"predictions": encode_bare(&gif)});
        let image = prediction_image(&single)?;
        assert_eq!(image.bytes, gif);
        assert_eq!(image.format, "gif");

        let listed = json!({"predictions": [encode_bare(b"plain bytes")]});
        assert_eq!(prediction_image(&listed)?.format, "png");
        Ok(())
    }

    #[test]
    fn missing_predictions_is_invalid_response() {
        assert!(matches!(
            prediction_image(&json!({"predictions": []})),
            Err(TransformError::InvalidResponse(_))
        ));
        assert!(matches!(
            prediction_image(&json!({"error_code": "BAD_REQUEST"})),
            Err(TransformError::InvalidResponse(_))
        ));
    }
}
