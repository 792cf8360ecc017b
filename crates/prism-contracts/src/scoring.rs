use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Criterion {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub scale: &'static str,
}

pub const DEFAULT_CRITERIA: &[Criterion] = &[
    Criterion {
        key: "prompt_adherence",
        name: "Prompt Adherence",
        description: "How well does the generated image match the text prompt?",
        scale: "1-5 (1=Poor match, 5=Perfect match)",
    },
    Criterion {
        key: "visual_quality",
        name: "Visual Quality",
        description: "Overall technical quality: clarity, composition, lighting, colors",
        scale: "1-5 (1=Poor quality, 5=Professional quality)",
    },
    Criterion {
        key: "creativity",
        name: "Creativity",
        description: "How creative and aesthetically pleasing is the image?",
        scale: "1-5 (1=Generic, 5=Highly creative)",
    },
    Criterion {
        key: "coherence",
        name: "Coherence",
        description: "Are all elements in the image logical and well-integrated?",
        scale: "1-5 (1=Incoherent, 5=Perfectly coherent)",
    },
];

/// Maps requested keys onto the criteria table, in table order.
/// `None` selects every criterion; unknown keys are dropped.
pub fn resolve_criteria(requested: Option<&[String]>) -> Vec<&'static Criterion> {
    match requested {
        None => DEFAULT_CRITERIA.iter().collect(),
        Some(keys) => DEFAULT_CRITERIA
            .iter()
            .filter(|criterion| keys.iter().any(|key| key.trim() == criterion.key))
            .collect(),
    }
}

pub fn evaluation_instruction(original_prompt: &str, criteria: &[&Criterion]) -> String {
    let descriptions = criteria
        .iter()
        .map(|criterion| {
            format!(
                "- **{}**: {} (Scale: {})",
                criterion.name, criterion.description, criterion.scale
            )
        })
        .collect::<Vec<String>>()
        .join("\n");
    let schema = criteria
        .iter()
        .map(|criterion| {
            format!(
                "    \"{}\": {{\"score\": <1-5>, \"rationale\": \"explanation\"}}",
                criterion.key
            )
        })
        .collect::<Vec<String>>()
        .join(",\n");

    format!(
        "You are an expert image quality evaluator. Evaluate the generated image based on the following criteria:\n\n\
**Original Prompt**: \"{original_prompt}\"\n\n\
**Evaluation Criteria**:\n{descriptions}\n\n\
For EACH criterion, provide:\n\
1. A score (1-5)\n\
2. A brief rationale explaining your score\n\n\
Respond in the following JSON format:\n\
{{\n  \"scores\": {{\n{schema}\n  }},\n  \"overall_score\": <average of all scores>,\n  \"summary\": \"brief overall assessment\"\n}}"
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoreParseError {
    #[error("judge response has no 'scores' object")]
    MissingScores,
    #[error("judge response omitted criterion '{0}'")]
    MissingCriterion(String),
    #[error("criterion '{key}' has invalid score {value}; expected an integer in 1..=5")]
    InvalidScore { key: String, value: String },
    #[error("judge response has no numeric 'overall_score'")]
    MissingOverall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionScore {
    pub score: u8,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub judge_model: String,
    pub scores: IndexMap<String, CriterionScore>,
    /// Value reported by the judge. Never recomputed here.
    pub overall_score: f64,
    pub summary: String,
}

impl ScoreCard {
    /// Builds a card from the judge's JSON. Every requested criterion must be
    /// present with an integral score in range; extra keys are ignored.
    pub fn from_payload(
        judge_model: &str,
        payload: &Map<String, Value>,
        criteria: &[&Criterion],
    ) -> Result<Self, ScoreParseError> {
        let raw_scores = payload
            .get("scores")
            .and_then(Value::as_object)
            .ok_or(ScoreParseError::MissingScores)?;

        let mut scores = IndexMap::new();
        for criterion in criteria {
            let entry = raw_scores
                .get(criterion.key)
                .ok_or_else(|| ScoreParseError::MissingCriterion(criterion.key.to_string()))?;
            let score_value = entry.get("score").unwrap_or(entry);
            let score = parse_score(score_value).ok_or_else(|| ScoreParseError::InvalidScore {
                key: criterion.key.to_string(),
                value: score_value.to_string(),
            })?;
            let rationale = entry
                .get("rationale")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string();
            scores.insert(criterion.key.to_string(), CriterionScore { score, rationale });
        }

        let overall_score = payload
            .get("overall_score")
            .and_then(parse_number)
            .ok_or(ScoreParseError::MissingOverall)?;
        let summary = payload
            .get("summary")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();

        Ok(Self {
            judge_model: judge_model.to_string(),
            scores,
            overall_score,
            summary,
        })
    }

    pub fn computed_mean(&self) -> Option<f64> {
        if self.scores.is_empty() {
            return None;
        }
        let total: u32 = self.scores.values().map(|entry| u32::from(entry.score)).sum();
        Some(f64::from(total) / self.scores.len() as f64)
    }

    pub fn mean_mismatch(&self, tolerance: f64) -> Option<f64> {
        let mean = self.computed_mean()?;
        let delta = (self.overall_score - mean).abs();
        (delta > tolerance).then_some(mean)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreFailure {
    pub error: String,
    pub error_type: String,
    pub judge_model: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoreReport {
    Scored(ScoreCard),
    Failed(ScoreFailure),
}

impl ScoreReport {
    pub fn failed(judge_model: &str, error_type: &str, error: impl Into<String>) -> Self {
        let error = error.into();
        Self::Failed(ScoreFailure {
            message: format!("Scoring failed ({error_type}): {error}"),
            error,
            error_type: error_type.to_string(),
            judge_model: judge_model.to_string(),
        })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn judge_model(&self) -> &str {
        match self {
            Self::Scored(card) => &card.judge_model,
            Self::Failed(failure) => &failure.judge_model,
        }
    }
}

fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|number| number.is_finite())
}

fn parse_score(value: &Value) -> Option<u8> {
    let number = parse_number(value)?;
    if number.fract() != 0.0 {
        return None;
    }
    if number < f64::from(MIN_SCORE) || number > f64::from(MAX_SCORE) {
        return None;
    }
    Some(number as u8)
}
