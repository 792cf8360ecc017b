pub mod analyzer;
pub mod classifier;
pub mod config;
pub mod error;
pub mod generator;
pub mod http;
pub mod reasoning;
pub mod router;
pub mod scorer;
pub mod transformer;

pub use analyzer::{ImageAnalyzer, VisionAnalyzer};
pub use classifier::{IntentClassifier, ReasoningIntentClassifier, RuleBasedClassifier};
pub use config::{EngineConfig, Timeouts};
pub use error::{
    AnalysisError, ConfigError, GenerationError, JudgeError, ReasoningError, TransformError,
};
pub use generator::{GeneratedImage, ImageGenerator, ServingImageGenerator};
pub use reasoning::{ChatCompletionsService, ReasoningRequest, StructuredReasoningService};
pub use router::{IntelligentRouter, RouteRequest, Unconfigured};
pub use scorer::{Judge, QualityScorer, ReasoningJudge};
pub use transformer::{DataframeTransformer, ImageTransformer, TransformParams};
