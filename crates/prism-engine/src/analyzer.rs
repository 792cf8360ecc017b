use std::sync::Arc;

use prism_contracts::codec::ImageRef;
use prism_contracts::models::ModelRegistry;

use crate::error::AnalysisError;
use crate::reasoning::{ReasoningRequest, StructuredReasoningService};

pub trait ImageAnalyzer: Send + Sync {
    fn analyze(&self, image: &ImageRef, question: &str, model: &str)
        -> Result<String, AnalysisError>;
}

/// Visual question answering through a chat model. The answer is returned
/// as free text; no structured payload is expected.
pub struct VisionAnalyzer {
    service: Arc<dyn StructuredReasoningService>,
    registry: ModelRegistry,
}

impl VisionAnalyzer {
    pub fn new(service: Arc<dyn StructuredReasoningService>, registry: ModelRegistry) -> Self {
        Self { service, registry }
    }
}

impl ImageAnalyzer for VisionAnalyzer {
    fn analyze(
        &self,
        image: &ImageRef,
        question: &str,
        model: &str,
    ) -> Result<String, AnalysisError> {
        let request = ReasoningRequest::text(model, question).with_image(
            image.clone(),
            self.registry.requires_cache_annotation(model),
        );
        let answer = self.service.complete(&request)?;
        if answer.trim().is_empty() {
            return Err(AnalysisError::EmptyAnswer);
        }
        Ok(answer)
    }
}
