use std::sync::Arc;
use std::time::Instant;

use prism_contracts::codec::ImageRef;
use prism_contracts::events::EventWriter;
use prism_contracts::models::ModelRegistry;
use prism_contracts::scoring::{
    evaluation_instruction, resolve_criteria, Criterion, ScoreCard, ScoreReport, DEFAULT_CRITERIA,
};
use serde_json::{json, Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::JudgeError;
use crate::reasoning::{ReasoningRequest, StructuredReasoningService};

/// Reported and computed means further apart than this are logged.
pub const OVERALL_SCORE_TOLERANCE: f64 = 0.01;

pub trait Judge: Send + Sync {
    fn evaluate(
        &self,
        image: &ImageRef,
        prompt: &str,
        model: &str,
        criteria: &[&'static Criterion],
    ) -> Result<ScoreCard, JudgeError>;
}

/// Vision model used as a judge through the structured reasoning service.
pub struct ReasoningJudge {
    service: Arc<dyn StructuredReasoningService>,
    registry: ModelRegistry,
}

impl ReasoningJudge {
    pub fn new(service: Arc<dyn StructuredReasoningService>, registry: ModelRegistry) -> Self {
        Self { service, registry }
    }
}

impl Judge for ReasoningJudge {
    fn evaluate(
        &self,
        image: &ImageRef,
        prompt: &str,
        model: &str,
        criteria: &[&'static Criterion],
    ) -> Result<ScoreCard, JudgeError> {
        let request = ReasoningRequest::text(model, evaluation_instruction(prompt, criteria))
            .with_image(image.clone(), self.registry.requires_cache_annotation(model));
        let payload = self.service.invoke(&request)?;
        Ok(ScoreCard::from_payload(model, &payload, criteria)?)
    }
}

/// Scores a previously generated image. Never raises: every failure becomes
/// a [`ScoreReport::Failed`].
pub struct QualityScorer {
    judge: Box<dyn Judge>,
    default_model: String,
    events: Option<EventWriter>,
}

impl QualityScorer {
    pub fn new(judge: Box<dyn Judge>, default_model: &str) -> Self {
        Self {
            judge,
            default_model: default_model.to_string(),
            events: None,
        }
    }

    pub fn with_events(mut self, events: Option<EventWriter>) -> Self {
        self.events = events;
        self
    }

    pub fn score(
        &self,
        image: &ImageRef,
        original_prompt: &str,
        judge_model: Option<&str>,
        criteria: Option<&[String]>,
    ) -> ScoreReport {
        let score_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        let judge_model = judge_model
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(self.default_model.as_str())
            .to_string();

        let report = match self.evaluate(image, original_prompt, &judge_model, criteria) {
            Ok(card) => {
                if let Some(mean) = card.mean_mismatch(OVERALL_SCORE_TOLERANCE) {
                    warn!(
                        score_id = %score_id,
                        reported = card.overall_score,
                        computed = mean,
                        "judge overall_score differs from the mean of its criteria"
                    );
                }
                ScoreReport::Scored(card)
            }
            Err(err) => {
                warn!(score_id = %score_id, kind = err.kind(), error = %err, "scoring failed");
                ScoreReport::failed(&judge_model, err.kind(), err.to_string())
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            score_id = %score_id,
            judge_model = %judge_model,
            failed = report.is_error(),
            elapsed_ms,
            "score completed"
        );
        self.emit(&score_id, &report, elapsed_ms);
        report
    }

    fn evaluate(
        &self,
        image: &ImageRef,
        prompt: &str,
        judge_model: &str,
        criteria: Option<&[String]>,
    ) -> Result<ScoreCard, JudgeError> {
        let criteria = resolve_criteria(criteria);
        if criteria.is_empty() {
            let known = DEFAULT_CRITERIA
                .iter()
                .map(|criterion| criterion.key)
                .collect::<Vec<&str>>()
                .join(", ");
            return Err(JudgeError::InvalidCriteria(known));
        }
        self.judge.evaluate(image, prompt, judge_model, &criteria)
    }

    fn emit(&self, score_id: &str, report: &ScoreReport, elapsed_ms: u64) {
        let Some(events) = self.events.as_ref() else {
            return;
        };
        let mut payload = Map::new();
        payload.insert("judge_model".to_string(), json!(report.judge_model()));
        payload.insert("elapsed_ms".to_string(), json!(elapsed_ms));
        let event_type = match report {
            ScoreReport::Scored(card) => {
                payload.insert("overall_score".to_string(), json!(card.overall_score));
                let scores: Map<String, Value> = card
                    .scores
                    .iter()
                    .map(|(key, entry)| (key.clone(), json!(entry.score)))
                    .collect();
                payload.insert("scores".to_string(), Value::Object(scores));
                "score_completed"
            }
            ScoreReport::Failed(failure) => {
                payload.insert("error_type".to_string(), json!(failure.error_type));
                payload.insert("error".to_string(), json!(failure.error));
                "score_failed"
            }
        };
        if let Err(err) = events.emit(event_type, score_id, payload) {
            warn!(score_id = %score_id, error = %err, "failed to write score event");
        }
    }
}
