use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec::{EncodedImage, ImageRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTaken {
    DecodeBase64,
    DecodeBase64Failed,
    GenerateImage,
    TransformImage,
    AnalyzeImage,
    Unknown,
}

impl ActionTaken {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DecodeBase64 => "decode_base64",
            Self::DecodeBase64Failed => "decode_base64_failed",
            Self::GenerateImage => "generate_image",
            Self::TransformImage => "transform_image",
            Self::AnalyzeImage => "analyze_image",
            Self::Unknown => "unknown",
        }
    }

    pub fn produces_image(self) -> bool {
        matches!(
            self,
            Self::DecodeBase64 | Self::GenerateImage | Self::TransformImage
        )
    }
}

/// Uniform result of one routing call.
///
/// `image` is only ever set on a successful image-producing action; a set
/// `error` always comes with a user-facing explanation in `result` and no
/// image. The constructors below are the only places that build envelopes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterResult {
    pub result: String,
    pub action_taken: ActionTaken,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<EncodedImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl RouterResult {
    pub fn with_image(
        action_taken: ActionTaken,
        result: impl Into<String>,
        reasoning: impl Into<String>,
        image: &ImageRef,
        model_used: Option<String>,
        metadata: Map<String, Value>,
    ) -> Self {
        debug_assert!(
            action_taken.produces_image(),
            "{} never carries an image",
            action_taken.as_str()
        );
        Self {
            result: result.into(),
            action_taken,
            reasoning: reasoning.into(),
            error: None,
            image: Some(image.to_encoded()),
            image_type: Some(image.format.clone()),
            model_used,
            metadata: Some(metadata),
        }
    }

    pub fn answer(
        result: impl Into<String>,
        reasoning: impl Into<String>,
        model_used: impl Into<String>,
    ) -> Self {
        Self {
            result: result.into(),
            action_taken: ActionTaken::AnalyzeImage,
            reasoning: reasoning.into(),
            error: None,
            image: None,
            image_type: None,
            model_used: Some(model_used.into()),
            metadata: None,
        }
    }

    pub fn failure(
        action_taken: ActionTaken,
        result: impl Into<String>,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            result: result.into(),
            action_taken,
            reasoning: reasoning.into(),
            error: Some(true),
            image: None,
            image_type: None,
            model_used: None,
            metadata: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.unwrap_or(false)
    }

    pub fn decoded_image(&self) -> Option<ImageRef> {
        self.image.as_ref().and_then(|image| image.decode().ok())
    }
}
