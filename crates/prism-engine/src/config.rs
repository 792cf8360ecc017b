use std::env;
use std::time::Duration;

use prism_contracts::detect::{DEFAULT_MIN_RUN, MIN_RUN_FLOOR};

use crate::error::ConfigError;

pub const DEFAULT_ROUTER_MODEL: &str = "databricks-claude-sonnet-4";
pub const DEFAULT_VISION_MODEL: &str = "databricks-claude-sonnet-4";
pub const DEFAULT_JUDGE_MODEL: &str = "databricks-claude-sonnet-4";
pub const DEFAULT_IMAGE_MODEL: &str = "databricks-shutterstock-imageai";
pub const DEFAULT_TRANSFORM_MODEL: &str = "kandinsky-controlnet-img2img";

pub const MIN_TIMEOUT_SECS: u64 = 5;
pub const MAX_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub reasoning: Duration,
    pub generation: Duration,
    pub transform: Duration,
    pub analysis: Duration,
    pub judge: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            reasoning: Duration::from_secs(60),
            generation: Duration::from_secs(120),
            transform: Duration::from_secs(120),
            analysis: Duration::from_secs(60),
            judge: Duration::from_secs(90),
        }
    }
}

/// Read-only settings handed to each adapter constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub api_base: Option<String>,
    pub api_token: Option<String>,
    pub router_model: String,
    pub vision_model: String,
    pub judge_model: String,
    pub image_model: String,
    pub transform_endpoint: Option<String>,
    pub transform_token: Option<String>,
    pub transform_model: String,
    pub base64_min_run: usize,
    pub timeouts: Timeouts,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base: None,
            api_token: None,
            router_model: DEFAULT_ROUTER_MODEL.to_string(),
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            judge_model: DEFAULT_JUDGE_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            transform_endpoint: None,
            transform_token: None,
            transform_model: DEFAULT_TRANSFORM_MODEL.to_string(),
            base64_min_run: DEFAULT_MIN_RUN,
            timeouts: Timeouts::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(non_empty_env)
    }

    /// Builds a config from any key lookup; values are trimmed and empty
    /// strings count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();
        let default_timeouts = defaults.timeouts;

        let api_token = get("PRISM_API_TOKEN");
        let base64_min_run = match get("PRISM_BASE64_MIN_RUN") {
            Some(raw) => parse_positive("PRISM_BASE64_MIN_RUN", &raw)? as usize,
            None => DEFAULT_MIN_RUN,
        }
        .max(MIN_RUN_FLOOR);

        let timeout = |key: &str, fallback: Duration| -> Result<Duration, ConfigError> {
            match get(key) {
                Some(raw) => Ok(clamp_timeout(parse_positive(key, &raw)?)),
                None => Ok(fallback),
            }
        };

        Ok(Self {
            api_base: get("PRISM_API_BASE").map(|value| value.trim_end_matches('/').to_string()),
            transform_token: get("PRISM_TRANSFORM_TOKEN").or_else(|| api_token.clone()),
            api_token,
            router_model: get("PRISM_ROUTER_MODEL").unwrap_or(defaults.router_model),
            vision_model: get("PRISM_VISION_MODEL").unwrap_or(defaults.vision_model),
            judge_model: get("PRISM_JUDGE_MODEL").unwrap_or(defaults.judge_model),
            image_model: get("PRISM_IMAGE_MODEL").unwrap_or(defaults.image_model),
            transform_endpoint: get("PRISM_TRANSFORM_ENDPOINT"),
            transform_model: get("PRISM_TRANSFORM_MODEL").unwrap_or(defaults.transform_model),
            base64_min_run,
            timeouts: Timeouts {
                reasoning: timeout("PRISM_REASONING_TIMEOUT", default_timeouts.reasoning)?,
                generation: timeout("PRISM_GENERATION_TIMEOUT", default_timeouts.generation)?,
                transform: timeout("PRISM_TRANSFORM_TIMEOUT", default_timeouts.transform)?,
                analysis: timeout("PRISM_ANALYSIS_TIMEOUT", default_timeouts.analysis)?,
                judge: timeout("PRISM_JUDGE_TIMEOUT", default_timeouts.judge)?,
            },
        })
    }

    pub fn require_api_base(&self) -> Result<&str, ConfigError> {
        self.api_base
            .as_deref()
            .ok_or(ConfigError::Missing("PRISM_API_BASE"))
    }

    pub fn require_transform_endpoint(&self) -> Result<&str, ConfigError> {
        self.transform_endpoint
            .as_deref()
            .ok_or(ConfigError::Missing("PRISM_TRANSFORM_ENDPOINT"))
    }
}

pub fn clamp_timeout(seconds: u64) -> Duration {
    Duration::from_secs(seconds.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS))
}

fn parse_positive(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse::<u64>()
        .ok()
        .filter(|value| *value > 0)
        .ok_or_else(|| ConfigError::InvalidNumber {
            key: key.to_string(),
            value: raw.to_string(),
        })
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
