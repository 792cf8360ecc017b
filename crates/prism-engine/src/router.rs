use std::sync::Arc;
use std::time::{Duration, Instant};

use prism_contracts::codec::{self, ImageRef, PayloadSource};
use prism_contracts::detect::{Base64Detector, EmbeddedPayload};
use prism_contracts::envelope::{ActionTaken, RouterResult};
use prism_contracts::events::EventWriter;
use prism_contracts::intent::{IntentAction, IntentSource};
use prism_contracts::models::{ModelKind, ModelRegistry, ModelSelection, ModelSelector};
use serde_json::{json, Map, Value};
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use crate::analyzer::{ImageAnalyzer, VisionAnalyzer};
use crate::classifier::{IntentClassifier, ReasoningIntentClassifier, RuleBasedClassifier};
use crate::config::EngineConfig;
use crate::error::{AnalysisError, ConfigError, GenerationError, ReasoningError, TransformError};
use crate::generator::{GeneratedImage, ImageGenerator, ServingImageGenerator};
use crate::reasoning::{ChatCompletionsService, ReasoningRequest, StructuredReasoningService};
use crate::transformer::{DataframeTransformer, ImageTransformer, TransformParams};

const DECODE_FAILED_MESSAGE: &str =
    "Error: Failed to decode base64 string. Please check if it's a valid base64 encoded image.";
const NO_IMAGE_FOR_TRANSFORM: &str =
    "Error: Image transformation requested but no image was provided.";
const NO_IMAGE_FOR_ANALYSIS: &str = "Error: Image analysis requested but no image was provided.";
const UNKNOWN_ACTION_MESSAGE: &str = "Error: Unable to determine appropriate action.";
/// Question asked in manual mode when the caller gives none.
pub const DEFAULT_MANUAL_QUESTION: &str = "What's in this image?";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteRequest {
    pub prompt: String,
    pub image: Option<ImageRef>,
    pub vision_model_hint: Option<String>,
}

impl RouteRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_image(mut self, image: Option<ImageRef>) -> Self {
        self.image = image;
        self
    }

    pub fn with_vision_model(mut self, hint: Option<String>) -> Self {
        self.vision_model_hint = hint;
        self
    }
}

/// Decides, per request, which capability serves it and wraps the outcome in
/// a [`RouterResult`]. Holds only read-only collaborators, so one instance can
/// serve concurrent calls.
///
/// Order within a call is fixed: detector, then classifier, then at most one
/// adapter. An embedded image in the prompt short-circuits everything after
/// the detector.
pub struct IntelligentRouter {
    detector: Base64Detector,
    classifier: Box<dyn IntentClassifier>,
    generator: Box<dyn ImageGenerator>,
    transformer: Box<dyn ImageTransformer>,
    analyzer: Box<dyn ImageAnalyzer>,
    selector: ModelSelector,
    default_vision_model: String,
    transform_params: TransformParams,
    events: Option<EventWriter>,
}

impl IntelligentRouter {
    pub fn new(
        classifier: Box<dyn IntentClassifier>,
        generator: Box<dyn ImageGenerator>,
        transformer: Box<dyn ImageTransformer>,
        analyzer: Box<dyn ImageAnalyzer>,
    ) -> Self {
        Self {
            detector: Base64Detector::default(),
            classifier,
            generator,
            transformer,
            analyzer,
            selector: ModelSelector::default(),
            default_vision_model: crate::config::DEFAULT_VISION_MODEL.to_string(),
            transform_params: TransformParams::default(),
            events: None,
        }
    }

    /// Wires the HTTP adapters from `config`. Adapters whose endpoint is not
    /// configured are replaced by [`Unconfigured`], which fails each call with
    /// a `not_configured` error instead of failing construction.
    pub fn from_config(
        config: &EngineConfig,
        registry: ModelRegistry,
        offline: bool,
    ) -> Result<Self, ConfigError> {
        let reasoning = |timeout: Duration| -> Result<Arc<dyn StructuredReasoningService>, ConfigError> {
            match ChatCompletionsService::from_config(config, timeout) {
                Ok(service) => Ok(Arc::new(service)),
                Err(ConfigError::Missing(key)) => Ok(Arc::new(Unconfigured::missing(key))),
                Err(err) => Err(err),
            }
        };

        let classifier: Box<dyn IntentClassifier> = if offline {
            Box::new(RuleBasedClassifier)
        } else {
            Box::new(ReasoningIntentClassifier::new(
                reasoning(config.timeouts.reasoning)?,
                &config.router_model,
            ))
        };
        let generator: Box<dyn ImageGenerator> = match ServingImageGenerator::from_config(config) {
            Ok(generator) => Box::new(generator),
            Err(ConfigError::Missing(key)) => {
                Box::new(Unconfigured::missing(key).labelled(&config.image_model))
            }
            Err(err) => return Err(err),
        };
        let transformer: Box<dyn ImageTransformer> =
            match DataframeTransformer::from_config(config) {
                Ok(transformer) => Box::new(transformer),
                Err(ConfigError::Missing(key)) => {
                    Box::new(Unconfigured::missing(key).labelled(&config.transform_model))
                }
                Err(err) => return Err(err),
            };
        let analyzer = VisionAnalyzer::new(reasoning(config.timeouts.analysis)?, registry.clone());

        Ok(Self::new(classifier, generator, transformer, Box::new(analyzer))
            .with_detector(Base64Detector::new(config.base64_min_run))
            .with_selector(ModelSelector::new(Some(registry)))
            .with_default_vision_model(&config.vision_model))
    }

    pub fn with_detector(mut self, detector: Base64Detector) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_selector(mut self, selector: ModelSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_default_vision_model(mut self, model: &str) -> Self {
        self.default_vision_model = model.to_string();
        self
    }

    pub fn with_transform_params(mut self, params: TransformParams) -> Self {
        self.transform_params = params;
        self
    }

    pub fn with_events(mut self, events: Option<EventWriter>) -> Self {
        self.events = events;
        self
    }

    pub fn route(&self, request: &RouteRequest) -> RouterResult {
        let route_id = Uuid::new_v4().to_string();
        let span = info_span!("route", route_id = %route_id);
        let _entered = span.enter();
        let started = Instant::now();

        let (result, intent_source) = self.dispatch(request);
        self.finish(&route_id, started, &result, intent_source);
        result
    }

    /// Manual model selection: sends `image` and `question` straight to the
    /// chosen vision model. Detection and classification are skipped.
    pub fn analyze_manually(
        &self,
        image: &ImageRef,
        question: Option<&str>,
        vision_model: Option<&str>,
    ) -> RouterResult {
        let route_id = Uuid::new_v4().to_string();
        let span = info_span!("analyze", route_id = %route_id);
        let _entered = span.enter();
        let started = Instant::now();

        let question = question
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_MANUAL_QUESTION);
        let result = match self.select_vision_model(vision_model) {
            Ok(selection) => {
                let reasoning = format!(
                    "Manual model selection: {}",
                    self.selector.registry.display_name(&selection.model.name)
                );
                self.answer(question, image, &selection, reasoning)
            }
            Err(reason) => RouterResult::failure(
                ActionTaken::AnalyzeImage,
                format!("Image analysis failed: {reason}"),
                "Manual model selection",
            ),
        };
        self.finish(&route_id, started, &result, None);
        result
    }

    fn finish(
        &self,
        route_id: &str,
        started: Instant,
        result: &RouterResult,
        intent_source: Option<IntentSource>,
    ) {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            action_taken = result.action_taken.as_str(),
            error = result.is_error(),
            model_used = result.model_used.as_deref().unwrap_or(""),
            elapsed_ms,
            "route completed"
        );
        self.emit(route_id, result, intent_source, elapsed_ms);
    }

    fn dispatch(&self, request: &RouteRequest) -> (RouterResult, Option<IntentSource>) {
        let detection = self.detector.detect(&request.prompt);
        if let Some(payload) = detection.payload.as_ref() {
            debug!(kind = ?payload.kind, chars = payload.text.len(), "embedded image detected");
            return (decode_embedded(payload, &detection.remainder), None);
        }

        let has_image = request.image.is_some();
        let intent = self.classifier.classify(&request.prompt, has_image);
        debug!(
            action = intent.action.as_str(),
            source = intent.source.as_str(),
            has_image,
            "intent resolved"
        );

        let reasoning = intent.reasoning;
        let result = match (&intent.action, request.image.as_ref()) {
            (IntentAction::GenerateImage, _) => self.generate(&request.prompt, reasoning),
            (IntentAction::TransformImage, None) => {
                RouterResult::failure(ActionTaken::TransformImage, NO_IMAGE_FOR_TRANSFORM, reasoning)
            }
            (IntentAction::TransformImage, Some(image)) => {
                self.transform(&request.prompt, image, reasoning)
            }
            (IntentAction::AnalyzeImage, None) => {
                RouterResult::failure(ActionTaken::AnalyzeImage, NO_IMAGE_FOR_ANALYSIS, reasoning)
            }
            (IntentAction::AnalyzeImage, Some(image)) => self.analyze(
                &request.prompt,
                image,
                request.vision_model_hint.as_deref(),
                reasoning,
            ),
            (IntentAction::Other(label), _) => {
                warn!(label = %label, "classifier produced an unrecognized action");
                RouterResult::failure(
                    ActionTaken::Unknown,
                    UNKNOWN_ACTION_MESSAGE,
                    format!("Intent analysis returned unexpected result: '{label}'"),
                )
            }
        };
        (result, Some(intent.source))
    }

    fn generate(&self, prompt: &str, reasoning: String) -> RouterResult {
        match self.generator.generate(prompt) {
            Ok(GeneratedImage { image, metadata }) => RouterResult::with_image(
                ActionTaken::GenerateImage,
                format!("Image generated successfully based on prompt: '{prompt}'"),
                reasoning,
                &image,
                Some(self.generator.model().to_string()),
                metadata,
            ),
            Err(err) => {
                warn!(kind = err.kind(), error = %err, "image generation failed");
                RouterResult::failure(
                    ActionTaken::GenerateImage,
                    format!("Image generation failed: {err}"),
                    reasoning,
                )
            }
        }
    }

    fn transform(&self, prompt: &str, image: &ImageRef, reasoning: String) -> RouterResult {
        match self
            .transformer
            .transform(prompt, image, &self.transform_params)
        {
            Ok(GeneratedImage {
                image: output,
                metadata,
            }) => RouterResult::with_image(
                ActionTaken::TransformImage,
                format!("Successfully generated image from your input! Prompt: '{prompt}'"),
                reasoning,
                &output,
                Some(self.transformer.model().to_string()),
                metadata,
            ),
            Err(err) => {
                warn!(kind = err.kind(), error = %err, "image transform failed");
                RouterResult::failure(
                    ActionTaken::TransformImage,
                    format!("Image generation failed: {err}"),
                    reasoning,
                )
            }
        }
    }

    fn analyze(
        &self,
        question: &str,
        image: &ImageRef,
        hint: Option<&str>,
        reasoning: String,
    ) -> RouterResult {
        match self.select_vision_model(hint) {
            Ok(selection) => self.answer(question, image, &selection, reasoning),
            Err(reason) => RouterResult::failure(
                ActionTaken::AnalyzeImage,
                format!("Image analysis failed: {reason}"),
                reasoning,
            ),
        }
    }

    fn select_vision_model(&self, hint: Option<&str>) -> Result<ModelSelection, String> {
        let selection = self
            .selector
            .select(hint, &self.default_vision_model, ModelKind::Vision)?;
        if let (Some(reason), Some(_)) = (selection.fallback_reason.as_deref(), hint) {
            info!(reason, model = %selection.model.name, "vision model hint not honored");
        }
        Ok(selection)
    }

    fn answer(
        &self,
        question: &str,
        image: &ImageRef,
        selection: &ModelSelection,
        reasoning: String,
    ) -> RouterResult {
        match self.analyzer.analyze(image, question, &selection.model.name) {
            Ok(answer) => RouterResult::answer(answer, reasoning, selection.model.name.clone()),
            Err(err) => {
                warn!(kind = err.kind(), error = %err, "image analysis failed");
                RouterResult::failure(
                    ActionTaken::AnalyzeImage,
                    format!("Image analysis failed: {err}"),
                    reasoning,
                )
            }
        }
    }

    fn emit(
        &self,
        route_id: &str,
        result: &RouterResult,
        intent_source: Option<IntentSource>,
        elapsed_ms: u64,
    ) {
        let Some(events) = self.events.as_ref() else {
            return;
        };
        let mut payload = Map::new();
        payload.insert(
            "action_taken".to_string(),
            json!(result.action_taken.as_str()),
        );
        payload.insert("error".to_string(), json!(result.is_error()));
        payload.insert(
            "model_used".to_string(),
            result
                .model_used
                .as_ref()
                .map(|model| json!(model))
                .unwrap_or(Value::Null),
        );
        payload.insert("reasoning".to_string(), json!(result.reasoning));
        payload.insert(
            "intent_source".to_string(),
            intent_source
                .map(|source| json!(source.as_str()))
                .unwrap_or(Value::Null),
        );
        payload.insert("elapsed_ms".to_string(), json!(elapsed_ms));
        if let Err(err) = events.emit("route_completed", route_id, payload) {
            warn!(error = %err, "failed to write route event");
        }
    }
}

fn decode_embedded(payload: &EmbeddedPayload, remainder: &str) -> RouterResult {
    match codec::decode(&payload.text) {
        Ok(image) => {
            let mut metadata = Map::new();
            metadata.insert(
                "decoded_from".to_string(),
                json!(PayloadSource::of(&payload.text).as_str()),
            );
            metadata.insert("image_size_bytes".to_string(), json!(image.len()));
            metadata.insert("sha256".to_string(), json!(image.digest()));
            let note = if remainder.is_empty() {
                "Image displayed below."
            } else {
                remainder
            };
            RouterResult::with_image(
                ActionTaken::DecodeBase64,
                format!("Base64 image decoded successfully! {note}"),
                "Detected base64 encoded image in prompt",
                &image,
                None,
                metadata,
            )
        }
        Err(err) => {
            warn!(error = %err, "embedded base64 payload did not decode");
            RouterResult::failure(
                ActionTaken::DecodeBase64Failed,
                DECODE_FAILED_MESSAGE,
                format!("Base64 decoding failed: {err}"),
            )
        }
    }
}

/// Stand-in for an adapter whose endpoint is not configured. Every call fails
/// with a `not_configured` error naming the missing setting.
#[derive(Debug, Clone)]
pub struct Unconfigured {
    reason: String,
    label: String,
}

impl Unconfigured {
    pub fn missing(key: &str) -> Self {
        Self {
            reason: format!("{key} is not set"),
            label: String::new(),
        }
    }

    pub fn labelled(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }
}

impl StructuredReasoningService for Unconfigured {
    fn complete(&self, _request: &ReasoningRequest) -> Result<String, ReasoningError> {
        Err(ReasoningError::NotConfigured(self.reason.clone()))
    }
}

impl ImageGenerator for Unconfigured {
    fn model(&self) -> &str {
        &self.label
    }

    fn generate(&self, _prompt: &str) -> Result<GeneratedImage, GenerationError> {
        Err(GenerationError::NotConfigured(self.reason.clone()))
    }
}

impl ImageTransformer for Unconfigured {
    fn model(&self) -> &str {
        &self.label
    }

    fn transform(
        &self,
        _prompt: &str,
        _image: &ImageRef,
        _params: &TransformParams,
    ) -> Result<GeneratedImage, TransformError> {
        Err(TransformError::NotConfigured(self.reason.clone()))
    }
}

impl ImageAnalyzer for Unconfigured {
    fn analyze(
        &self,
        _image: &ImageRef,
        _question: &str,
        _model: &str,
    ) -> Result<String, AnalysisError> {
        Err(ReasoningError::NotConfigured(self.reason.clone()).into())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::thread;

    use prism_contracts::codec::{encode, encode_bare};
    use prism_contracts::intent::Intent;

    use super::*;

    const TINY_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x01];

    #[derive(Clone, Default)]
    struct Calls {
        classifier: Arc<AtomicUsize>,
        generator: Arc<AtomicUsize>,
        transformer: Arc<AtomicUsize>,
        analyzer: Arc<AtomicUsize>,
        analyzed_with: Arc<Mutex<Vec<String>>>,
        questions: Arc<Mutex<Vec<String>>>,
        transform_params: Arc<Mutex<Vec<TransformParams>>>,
    }

    impl Calls {
        fn adapters(&self) -> usize {
            self.generator.load(Ordering::SeqCst)
                + self.transformer.load(Ordering::SeqCst)
                + self.analyzer.load(Ordering::SeqCst)
        }
    }

    struct StubClassifier {
        action: IntentAction,
        calls: Arc<AtomicUsize>,
    }

    impl IntentClassifier for StubClassifier {
        fn classify(&self, _prompt: &str, _has_image: bool) -> Intent {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Intent::new(self.action.clone(), "stubbed intent", IntentSource::Classifier)
        }
    }

    struct StubGenerator {
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    impl ImageGenerator for StubGenerator {
        fn model(&self) -> &str {
            "stub-diffuser"
        }

        fn generate(&self, prompt: &str) -> Result<GeneratedImage, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(GenerationError::Timeout { seconds: 120 });
            }
            let mut metadata = Map::new();
            metadata.insert("prompt".to_string(), json!(prompt));
            Ok(GeneratedImage {
                image: ImageRef::new(TINY_PNG.to_vec(), "png"),
                metadata,
            })
        }
    }

    struct StubTransformer {
        fail: bool,
        calls: Arc<AtomicUsize>,
        params: Arc<Mutex<Vec<TransformParams>>>,
    }

    impl ImageTransformer for StubTransformer {
        fn model(&self) -> &str {
            "stub-img2img"
        }

        fn transform(
            &self,
            _prompt: &str,
            image: &ImageRef,
            params: &TransformParams,
        ) -> Result<GeneratedImage, TransformError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut seen) = self.params.lock() {
                seen.push(params.clone());
            }
            if self.fail {
                return Err(TransformError::Remote(
                    "request failed (503): upstream busy".to_string(),
                ));
            }
            Ok(GeneratedImage {
                image: ImageRef::new(image.bytes.iter().rev().copied().collect::<Vec<u8>>(), "png"),
                metadata: Map::new(),
            })
        }
    }

    struct StubAnalyzer {
        calls: Arc<AtomicUsize>,
        models: Arc<Mutex<Vec<String>>>,
        questions: Arc<Mutex<Vec<String>>>,
    }

    impl ImageAnalyzer for StubAnalyzer {
        fn analyze(
            &self,
            _image: &ImageRef,
            question: &str,
            model: &str,
        ) -> Result<String, AnalysisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut models) = self.models.lock() {
                models.push(model.to_string());
            }
            if let Ok(mut questions) = self.questions.lock() {
                questions.push(question.to_string());
            }
            Ok("A dog on a beach.".to_string())
        }
    }

    fn build_router(action: IntentAction, fail_adapters: bool) -> (Calls, IntelligentRouter) {
        let calls = Calls::default();
        let router = IntelligentRouter::new(
            Box::new(StubClassifier {
                action,
                calls: calls.classifier.clone(),
            }),
            Box::new(StubGenerator {
                fail: fail_adapters,
                calls: calls.generator.clone(),
            }),
            Box::new(StubTransformer {
                fail: fail_adapters,
                calls: calls.transformer.clone(),
                params: calls.transform_params.clone(),
            }),
            Box::new(StubAnalyzer {
                calls: calls.analyzer.clone(),
                models: calls.analyzed_with.clone(),
                questions: calls.questions.clone(),
            }),
        );
        (calls, router)
    }

    fn photo() -> ImageRef {
        ImageRef::new(b"jpeg-photo-bytes".to_vec(), "jpeg")
    }

    #[test]
    fn embedded_data_url_short_circuits_classification() {
        let (calls, router) = build_router(IntentAction::AnalyzeImage, false);
        let prompt = format!(
            "What breed is this? {}",
            encode(TINY_PNG, "png").as_str()
        );
        let request = RouteRequest::new(prompt).with_image(Some(photo()));
        let result = router.route(&request);

        assert_eq!(result.action_taken, ActionTaken::DecodeBase64);
        assert!(!result.is_error());
        assert_eq!(result.image_type.as_deref(), Some("png"));
        assert_eq!(result.decoded_image(), Some(ImageRef::new(TINY_PNG.to_vec(), "png")));
        assert_eq!(
            result.result,
            "Base64 image decoded successfully! What breed is this?"
        );
        let metadata = result.metadata.unwrap_or_default();
        assert_eq!(metadata["decoded_from"], json!("data_url"));
        assert_eq!(metadata["image_size_bytes"], json!(TINY_PNG.len()));
        assert_eq!(calls.classifier.load(Ordering::SeqCst), 0);
        assert_eq!(calls.adapters(), 0);
    }

    #[test]
    fn bare_base64_run_is_decoded_with_default_note() {
        let (calls, router) = build_router(IntentAction::GenerateImage, false);
        let bytes: Vec<u8> = (0u8..90).collect();
        let result = router.route(&RouteRequest::new(format!("  {}  ", encode_bare(&bytes))));

        assert_eq!(result.action_taken, ActionTaken::DecodeBase64);
        assert_eq!(
            result.result,
            "Base64 image decoded successfully! Image displayed below."
        );
        let metadata = result.metadata.clone().unwrap_or_default();
        assert_eq!(metadata["decoded_from"], json!("base64_string"));
        assert_eq!(result.decoded_image().map(|image| image.bytes), Some(bytes));
        assert_eq!(calls.classifier.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn undecodable_payload_reports_decode_failure() {
        let (calls, router) = build_router(IntentAction::GenerateImage, false);
        let result = router.route(&RouteRequest::new("look data:image/png;base64,A here"));

        assert_eq!(result.action_taken, ActionTaken::DecodeBase64Failed);
        assert!(result.is_error());
        assert!(result.image.is_none());
        assert_eq!(result.result, DECODE_FAILED_MESSAGE);
        assert!(result.reasoning.starts_with("Base64 decoding failed"));
        assert_eq!(calls.classifier.load(Ordering::SeqCst), 0);
        assert_eq!(calls.adapters(), 0);
    }

    #[test]
    fn generate_end_to_end_returns_image_and_model() {
        let (calls, router) = build_router(IntentAction::GenerateImage, false);
        let result = router.route(&RouteRequest::new("generate a sunset over mountains"));

        assert_eq!(result.action_taken, ActionTaken::GenerateImage);
        assert!(result.image.is_some());
        assert_eq!(result.error, None);
        assert_eq!(result.model_used.as_deref(), Some("stub-diffuser"));
        assert_eq!(result.reasoning, "stubbed intent");
        assert_eq!(
            result.result,
            "Image generated successfully based on prompt: 'generate a sunset over mountains'"
        );
        assert_eq!(
            result.decoded_image().map(|image| image.bytes),
            Some(TINY_PNG.to_vec())
        );
        assert_eq!(calls.generator.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn generate_ignores_attached_image() {
        let (calls, router) = build_router(IntentAction::GenerateImage, false);
        let result = router.route(&RouteRequest::new("a castle").with_image(Some(photo())));
        assert_eq!(result.action_taken, ActionTaken::GenerateImage);
        assert_eq!(calls.transformer.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn transform_and_analyze_require_an_image() {
        for (action, expected, message) in [
            (
                IntentAction::TransformImage,
                ActionTaken::TransformImage,
                NO_IMAGE_FOR_TRANSFORM,
            ),
            (
                IntentAction::AnalyzeImage,
                ActionTaken::AnalyzeImage,
                NO_IMAGE_FOR_ANALYSIS,
            ),
        ] {
            let (calls, router) = build_router(action, false);
            let result = router.route(&RouteRequest::new("transform this into cartoon"));
            assert_eq!(result.action_taken, expected);
            assert!(result.is_error());
            assert_eq!(result.result, message);
            assert!(result.image.is_none());
            assert_eq!(calls.adapters(), 0);
        }
    }

    #[test]
    fn transform_uses_default_parameters_and_reports_model() {
        let (calls, router) = build_router(IntentAction::TransformImage, false);
        let result = router.route(&RouteRequest::new("make it a cartoon").with_image(Some(photo())));

        assert_eq!(result.action_taken, ActionTaken::TransformImage);
        assert!(!result.is_error());
        assert_eq!(result.model_used.as_deref(), Some("stub-img2img"));
        assert_eq!(
            result.result,
            "Successfully generated image from your input! Prompt: 'make it a cartoon'"
        );
        let seen = calls
            .transform_params
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default();
        assert_eq!(seen, vec![TransformParams::default()]);
    }

    #[test]
    fn adapter_failures_become_error_envelopes() {
        let (_, router) = build_router(IntentAction::GenerateImage, true);
        let result = router.route(&RouteRequest::new("generate a fox"));
        assert_eq!(result.action_taken, ActionTaken::GenerateImage);
        assert!(result.is_error());
        assert!(result.image.is_none());
        assert!(result.result.contains("timed out after 120s"));

        let (_, router) = build_router(IntentAction::TransformImage, true);
        let result = router.route(&RouteRequest::new("make it blue").with_image(Some(photo())));
        assert_eq!(result.action_taken, ActionTaken::TransformImage);
        assert!(result.is_error());
        assert!(result.result.contains("upstream busy"));
    }

    #[test]
    fn analyze_resolves_vision_model_hint() {
        let (calls, router) = build_router(IntentAction::AnalyzeImage, false);
        let base = RouteRequest::new("what's in this image?").with_image(Some(photo()));

        let honored = router.route(&base.clone().with_vision_model(Some("databricks-gpt-5".to_string())));
        assert_eq!(honored.action_taken, ActionTaken::AnalyzeImage);
        assert_eq!(honored.result, "A dog on a beach.");
        assert!(honored.image.is_none());
        assert_eq!(honored.model_used.as_deref(), Some("databricks-gpt-5"));

        let wrong_kind = router.route(
            &base
                .clone()
                .with_vision_model(Some("databricks-shutterstock-imageai".to_string())),
        );
        assert_eq!(
            wrong_kind.model_used.as_deref(),
            Some(crate::config::DEFAULT_VISION_MODEL)
        );

        let defaulted = router.route(&base);
        assert_eq!(
            defaulted.model_used.as_deref(),
            Some(crate::config::DEFAULT_VISION_MODEL)
        );
        assert_eq!(calls.analyzer.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn manual_analysis_skips_classification() {
        let (calls, router) = build_router(IntentAction::TransformImage, false);

        let result = router.analyze_manually(&photo(), Some("make it blue"), Some("databricks-gpt-5"));
        assert_eq!(result.action_taken, ActionTaken::AnalyzeImage);
        assert!(!result.is_error());
        assert!(result.image.is_none());
        assert_eq!(result.result, "A dog on a beach.");
        assert_eq!(result.model_used.as_deref(), Some("databricks-gpt-5"));
        assert_eq!(result.reasoning, "Manual model selection: Databricks GPT-5");

        let defaulted = router.analyze_manually(&photo(), Some("  "), None);
        assert_eq!(
            defaulted.model_used.as_deref(),
            Some(crate::config::DEFAULT_VISION_MODEL)
        );

        assert_eq!(calls.classifier.load(Ordering::SeqCst), 0);
        assert_eq!(calls.analyzer.load(Ordering::SeqCst), 2);
        let questions = calls.questions.lock().map(|seen| seen.clone()).unwrap_or_default();
        assert_eq!(questions, vec!["make it blue", DEFAULT_MANUAL_QUESTION]);
    }

    #[test]
    fn unrecognized_action_is_unknown_error() {
        let (calls, router) = build_router(IntentAction::Other("compose_music".to_string()), false);
        let result = router.route(&RouteRequest::new("write me a song"));
        assert_eq!(result.action_taken, ActionTaken::Unknown);
        assert!(result.is_error());
        assert_eq!(result.result, UNKNOWN_ACTION_MESSAGE);
        assert!(result.reasoning.contains("compose_music"));
        assert_eq!(calls.adapters(), 0);
    }

    #[test]
    fn route_events_are_appended_per_call() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("route.jsonl");
        let (_, router) = build_router(IntentAction::GenerateImage, false);
        let router = router.with_events(Some(EventWriter::new(&path, "test")));

        router.route(&RouteRequest::new("generate a sunset"));
        router.route(&RouteRequest::new(format!("x {}", encode(TINY_PNG, "png").as_str())));

        let events: Vec<Value> = fs::read_to_string(&path)?
            .lines()
            .map(serde_json::from_str::<Value>)
            .collect::<Result<_, _>>()?;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["type"], json!("route_completed"));
        assert_eq!(events[0]["action_taken"], json!("generate_image"));
        assert_eq!(events[0]["model_used"], json!("stub-diffuser"));
        assert_eq!(events[0]["intent_source"], json!("classifier"));
        assert_eq!(events[1]["action_taken"], json!("decode_base64"));
        assert_eq!(events[1]["intent_source"], Value::Null);
        assert_ne!(events[0]["route_id"], events[1]["route_id"]);
        Ok(())
    }

    #[test]
    fn router_serves_concurrent_requests() {
        let (calls, router) = build_router(IntentAction::GenerateImage, false);
        thread::scope(|scope| {
            for idx in 0..8 {
                let router = &router;
                scope.spawn(move || {
                    let result = router.route(&RouteRequest::new(format!("generate scene {idx}")));
                    assert_eq!(result.action_taken, ActionTaken::GenerateImage);
                });
            }
        });
        assert_eq!(calls.generator.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn unconfigured_router_still_decodes_and_reports_missing_settings() -> anyhow::Result<()> {
        let router =
            IntelligentRouter::from_config(&EngineConfig::default(), ModelRegistry::default(), true)?;

        let decoded = router.route(&RouteRequest::new(encode(TINY_PNG, "png").into_string()));
        assert_eq!(decoded.action_taken, ActionTaken::DecodeBase64);

        let generated = router.route(&RouteRequest::new("generate a sunset"));
        assert_eq!(generated.action_taken, ActionTaken::GenerateImage);
        assert!(generated.is_error());
        assert!(generated.result.contains("PRISM_API_BASE"));

        let transformed =
            router.route(&RouteRequest::new("turn this into a sketch").with_image(Some(photo())));
        assert_eq!(transformed.action_taken, ActionTaken::TransformImage);
        assert!(transformed.result.contains("PRISM_TRANSFORM_ENDPOINT"));
        Ok(())
    }
}
