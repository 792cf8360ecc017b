use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use image::ImageFormat;
use prism_contracts::codec::{sniff_format, ImageRef};
use prism_contracts::detect::{Base64Detector, PayloadKind};
use prism_contracts::events::EventWriter;
use prism_contracts::models::ModelRegistry;
use prism_engine::transformer::{
    DEFAULT_GUIDANCE_SCALE, DEFAULT_INFERENCE_STEPS, DEFAULT_STRENGTH,
};
use prism_engine::{
    ChatCompletionsService, ConfigError, EngineConfig, IntelligentRouter, QualityScorer,
    ReasoningJudge, RouteRequest, StructuredReasoningService, TransformParams, Unconfigured,
};
use serde_json::{json, Value};
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Uploaded images without a recognizable signature are treated as JPEG.
const FALLBACK_UPLOAD_FORMAT: &str = "jpeg";
const EVENT_SESSION: &str = "prism-cli";

#[derive(Debug, Parser)]
#[command(
    name = "prism",
    version,
    about = "Route image requests to generation, transformation, analysis or decoding"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Classify a prompt and run the matching capability.
    Route(RouteArgs),
    /// Ask a chosen vision model about an image, skipping classification.
    Analyze(AnalyzeArgs),
    /// Score a generated image against the prompt that produced it.
    Score(ScoreArgs),
    /// Report whether a prompt embeds a base64 image.
    Detect(DetectArgs),
    /// List the model registry.
    Models,
}

#[derive(Debug, Parser)]
struct RouteArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    image: Option<PathBuf>,
    #[arg(long)]
    vision_model: Option<String>,
    #[arg(long)]
    events: Option<PathBuf>,
    /// Classify with local keyword rules instead of the router model.
    #[arg(long)]
    offline: bool,
    /// Write the returned image, if any, to this path.
    #[arg(long)]
    save: Option<PathBuf>,
    #[arg(long, default_value_t = DEFAULT_STRENGTH)]
    strength: f64,
    #[arg(long, default_value_t = DEFAULT_GUIDANCE_SCALE)]
    guidance_scale: f64,
    #[arg(long, default_value_t = DEFAULT_INFERENCE_STEPS)]
    steps: u32,
}

#[derive(Debug, Parser)]
struct AnalyzeArgs {
    #[arg(long)]
    image: PathBuf,
    /// Defaults to "What's in this image?".
    #[arg(long)]
    prompt: Option<String>,
    #[arg(long)]
    vision_model: Option<String>,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct ScoreArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    judge_model: Option<String>,
    /// Comma-separated criterion keys; defaults to all.
    #[arg(long, value_delimiter = ',')]
    criteria: Option<Vec<String>>,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct DetectArgs {
    #[arg(long)]
    prompt: String,
}

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("prism error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .try_init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Route(args) => run_route(args),
        Command::Analyze(args) => run_analyze(args),
        Command::Score(args) => run_score(args),
        Command::Detect(args) => run_detect(args),
        Command::Models => run_models(),
    }
}

fn run_route(args: RouteArgs) -> Result<i32> {
    let config = EngineConfig::from_env().context("invalid PRISM_* configuration")?;
    let params = TransformParams {
        strength: args.strength,
        guidance_scale: args.guidance_scale,
        steps: args.steps,
        ..TransformParams::default()
    };
    let router = IntelligentRouter::from_config(&config, ModelRegistry::default(), args.offline)
        .context("failed to build router")?
        .with_transform_params(params)
        .with_events(event_writer(args.events.as_deref()));

    let image = args.image.as_deref().map(load_image).transpose()?;
    let request = RouteRequest::new(args.prompt)
        .with_image(image)
        .with_vision_model(args.vision_model);
    let result = router.route(&request);

    if let Some(path) = args.save.as_deref() {
        match result.decoded_image() {
            Some(image) => {
                fs::write(path, &image.bytes)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                info!(path = %path.display(), bytes = image.len(), "saved image");
            }
            None => warn!(path = %path.display(), "no image to save"),
        }
    }

    print_json(&serde_json::to_value(&result)?)?;
    Ok(if result.is_error() { 2 } else { 0 })
}

fn run_analyze(args: AnalyzeArgs) -> Result<i32> {
    let config = EngineConfig::from_env().context("invalid PRISM_* configuration")?;
    let router = IntelligentRouter::from_config(&config, ModelRegistry::default(), true)
        .context("failed to build router")?
        .with_events(event_writer(args.events.as_deref()));

    let image = load_image(&args.image)?;
    let result = router.analyze_manually(
        &image,
        args.prompt.as_deref(),
        args.vision_model.as_deref(),
    );
    print_json(&serde_json::to_value(&result)?)?;
    Ok(if result.is_error() { 2 } else { 0 })
}

fn run_score(args: ScoreArgs) -> Result<i32> {
    let config = EngineConfig::from_env().context("invalid PRISM_* configuration")?;
    let registry = ModelRegistry::default();
    let service: Arc<dyn StructuredReasoningService> =
        match ChatCompletionsService::from_config(&config, config.timeouts.judge) {
            Ok(service) => Arc::new(service),
            Err(ConfigError::Missing(key)) => Arc::new(Unconfigured::missing(key)),
            Err(err) => return Err(err).context("failed to build judge client"),
        };
    let scorer = QualityScorer::new(
        Box::new(ReasoningJudge::new(service, registry)),
        &config.judge_model,
    )
    .with_events(event_writer(args.events.as_deref()));

    let image = load_image(&args.image)?;
    let report = scorer.score(
        &image,
        &args.prompt,
        args.judge_model.as_deref(),
        args.criteria.as_deref(),
    );
    print_json(&serde_json::to_value(&report)?)?;
    Ok(if report.is_error() { 2 } else { 0 })
}

fn run_detect(args: DetectArgs) -> Result<i32> {
    let config = EngineConfig::from_env().context("invalid PRISM_* configuration")?;
    let detection = Base64Detector::new(config.base64_min_run).detect(&args.prompt);
    let payload = detection.payload.as_ref();
    print_json(&json!({
        "found": detection.found(),
        "kind": payload.map(|payload| match payload.kind {
            PayloadKind::DataUrl => "data_url",
            PayloadKind::BareRun => "bare_run",
        }),
        "payload_chars": payload.map(|payload| payload.text.len()).unwrap_or(0),
        "remainder": detection.remainder,
    }))?;
    Ok(0)
}

fn run_models() -> Result<i32> {
    let registry = ModelRegistry::default();
    let models = registry
        .list()
        .map(serde_json::to_value)
        .collect::<Result<Vec<Value>, _>>()?;
    print_json(&Value::Array(models))?;
    Ok(0)
}

fn event_writer(path: Option<&Path>) -> Option<EventWriter> {
    path.map(|path| EventWriter::new(path, EVENT_SESSION))
}

fn load_image(path: &Path) -> Result<ImageRef> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let format = sniff_format(&bytes)
        .map(str::to_string)
        .or_else(|| {
            ImageFormat::from_path(path)
                .ok()
                .map(|format| format.to_mime_type().trim_start_matches("image/").to_string())
        })
        .unwrap_or_else(|| FALLBACK_UPLOAD_FORMAT.to_string());
    Ok(ImageRef::new(bytes, format))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
