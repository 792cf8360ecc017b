use std::sync::Arc;

use prism_contracts::intent::{classification_instruction, classify_by_rules, Intent};
use tracing::{debug, warn};

use crate::error::ReasoningError;
use crate::reasoning::{ReasoningRequest, StructuredReasoningService};

pub const CLASSIFIER_TEMPERATURE: f64 = 0.1;

/// Always yields an [`Intent`]; failures are absorbed into the fallback.
pub trait IntentClassifier: Send + Sync {
    fn classify(&self, prompt: &str, has_image: bool) -> Intent;
}

/// Delegates to a reasoning model. A single failed attempt falls back
/// immediately; there are no retries.
pub struct ReasoningIntentClassifier {
    service: Arc<dyn StructuredReasoningService>,
    model: String,
}

impl ReasoningIntentClassifier {
    pub fn new(service: Arc<dyn StructuredReasoningService>, model: &str) -> Self {
        Self {
            service,
            model: model.to_string(),
        }
    }

    fn try_classify(&self, prompt: &str, has_image: bool) -> Result<Intent, ReasoningError> {
        let request =
            ReasoningRequest::text(&self.model, classification_instruction(prompt, has_image))
                .with_temperature(CLASSIFIER_TEMPERATURE);
        let payload = self.service.invoke(&request)?;
        Intent::from_payload(&payload).ok_or_else(|| {
            ReasoningError::Remote("classification payload has no 'action' label".to_string())
        })
    }
}

impl IntentClassifier for ReasoningIntentClassifier {
    fn classify(&self, prompt: &str, has_image: bool) -> Intent {
        match self.try_classify(prompt, has_image) {
            Ok(intent) => {
                debug!(action = intent.action.as_str(), "intent classified");
                intent
            }
            Err(err) => {
                warn!(kind = err.kind(), error = %err, "intent classification failed; using fallback");
                Intent::fallback(has_image, &err.to_string())
            }
        }
    }
}

/// Local keyword rules with the same precedence as the model instruction.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedClassifier;

impl IntentClassifier for RuleBasedClassifier {
    fn classify(&self, prompt: &str, has_image: bool) -> Intent {
        classify_by_rules(prompt, has_image)
    }
}
