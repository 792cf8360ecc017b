mod rules;
mod vocabulary;

use serde_json::{Map, Value};

pub use rules::classify_by_rules;

use vocabulary::{ACTION_LABELS, CONTENT_CUES, GENERATION_VERBS, QUESTION_WORDS};

const MISSING_REASONING: &str = "Classifier returned no reasoning.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentAction {
    GenerateImage,
    TransformImage,
    AnalyzeImage,
    /// A label the classifier produced that is none of the three actions.
    Other(String),
}

impl IntentAction {
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "generate_image" => Self::GenerateImage,
            "transform_image" => Self::TransformImage,
            "analyze_image" => Self::AnalyzeImage,
            _ => Self::Other(label.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::GenerateImage => "generate_image",
            Self::TransformImage => "transform_image",
            Self::AnalyzeImage => "analyze_image",
            Self::Other(label) => label.as_str(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentSource {
    Classifier,
    Rules,
    Fallback,
}

impl IntentSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Classifier => "classifier",
            Self::Rules => "rules",
            Self::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    pub action: IntentAction,
    pub reasoning: String,
    pub source: IntentSource,
}

impl Intent {
    pub fn new(action: IntentAction, reasoning: impl Into<String>, source: IntentSource) -> Self {
        let reasoning = reasoning.into();
        Self {
            action,
            reasoning: if reasoning.trim().is_empty() {
                MISSING_REASONING.to_string()
            } else {
                reasoning
            },
            source,
        }
    }

    /// Deterministic outcome when the classification call fails.
    pub fn fallback(has_image: bool, cause: &str) -> Self {
        if has_image {
            Self::new(
                IntentAction::AnalyzeImage,
                format!("Image provided (fallback due to: {cause})"),
                IntentSource::Fallback,
            )
        } else {
            Self::new(
                IntentAction::GenerateImage,
                format!("No image provided (fallback due to: {cause})"),
                IntentSource::Fallback,
            )
        }
    }

    /// Reads `{action, reasoning}` from a classifier payload.
    ///
    /// Returns `None` when `action` is missing or not a non-empty string.
    /// An unrecognized label is kept as [`IntentAction::Other`].
    pub fn from_payload(payload: &Map<String, Value>) -> Option<Self> {
        let action = payload
            .get("action")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())?;
        let reasoning = payload
            .get("reasoning")
            .and_then(Value::as_str)
            .unwrap_or_default();
        Some(Self::new(
            IntentAction::parse(action),
            reasoning,
            IntentSource::Classifier,
        ))
    }
}

fn quoted(items: impl Iterator<Item = &'static str>) -> String {
    items
        .map(|item| format!("\"{item}\""))
        .collect::<Vec<String>>()
        .join(", ")
}

/// Instruction sent to the reasoning service. Shares its vocabulary with
/// [`classify_by_rules`] so both paths apply the same precedence.
pub fn classification_instruction(prompt: &str, has_image: bool) -> String {
    let actions = ACTION_LABELS
        .iter()
        .enumerate()
        .map(|(idx, (label, description))| format!("{}. \"{label}\" - {description}", idx + 1))
        .collect::<Vec<String>>()
        .join("\n");
    let analysis_cues = quoted(
        CONTENT_CUES
            .iter()
            .chain(QUESTION_WORDS.iter().filter(|word| word.starts_with("what")))
            .copied(),
    );
    let generation_verbs = quoted(
        GENERATION_VERBS
            .iter()
            .copied()
            .filter(|verb| !verb.ends_with("ing") && !verb.contains(" it ") && !verb.contains(" th")),
    );

    format!(
        "You are an AI router that determines user intent. Analyze the following:\n\n\
User Prompt: \"{prompt}\"\n\
Has Image Attached: {has_image}\n\n\
ACTIONS:\n{actions}\n\n\
Rules, in priority order:\n\
1. If the prompt mainly asks about existing content ({analysis_cues}), choose \"analyze_image\" even if an image is attached and other verbs are present.\n\
2. If Has Image Attached is true AND the prompt contains a generation/transformation verb ({generation_verbs}), choose \"transform_image\".\n\
3. If Has Image Attached is false AND the prompt contains a generation verb, choose \"generate_image\".\n\
4. If Has Image Attached is true AND the prompt is ambiguous, choose \"analyze_image\".\n\
5. Otherwise choose \"generate_image\".\n\n\
EXAMPLES:\n\
- \"generate a sunset\" + has_image=false -> \"generate_image\"\n\
- \"generate a pokemon\" + has_image=true -> \"transform_image\"\n\
- \"what's in this image?\" + has_image=true -> \"analyze_image\"\n\
- \"turn this into a watercolor painting\" + has_image=true -> \"transform_image\"\n\
- \"make this image look like a cartoon\" + has_image=true -> \"transform_image\"\n\n\
Respond ONLY with a JSON object in this exact format:\n\
{{\"action\": \"generate_image\" or \"analyze_image\" or \"transform_image\", \"reasoning\": \"brief explanation\"}}"
    )
}
