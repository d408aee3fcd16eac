use std::time::Duration;

use serde::Deserialize;

use crate::openai_client::RetryPolicy;
use crate::openai_settings::{self, ModelConfig};

fn default_openai_api_base() -> String {
    "https://api.openai.com".into()
}

fn default_model_for_stage1() -> String {
    openai_settings::REASONING_MODEL.into()
}

fn default_model_for_stage2() -> String {
    openai_settings::EXTRACTION_MODEL.into()
}

fn default_model_for_direct() -> String {
    openai_settings::EXTRACTION_MODEL.into()
}

fn default_fallback_model() -> String {
    openai_settings::FALLBACK_MODEL.into()
}

fn default_openai_max_attempts() -> u32 {
    5
}

fn default_openai_max_elapsed_ms() -> u64 {
    60_000
}

fn default_openai_initial_backoff_ms() -> u64 {
    1_000
}

fn default_openai_max_backoff_ms() -> u64 {
    30_000
}

fn default_openai_timeout_ms() -> u64 {
    120_000
}

fn default_pipeline_timeout_ms() -> u64 {
    300_000
}

fn default_scorer_port() -> u16 {
    8086
}

/// Process-wide settings, read once from the environment at start-up.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub openai_api_key: String,
    #[serde(default = "default_openai_api_base")]
    pub openai_api_base: String,
    #[serde(default = "default_model_for_stage1")]
    pub model_for_stage1: String,
    #[serde(default = "default_model_for_stage2")]
    pub model_for_stage2: String,
    #[serde(default = "default_model_for_direct")]
    pub model_for_direct: String,
    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,
    #[serde(default = "default_openai_max_attempts")]
    pub openai_max_attempts: u32,
    #[serde(default = "default_openai_max_elapsed_ms")]
    pub openai_max_elapsed_ms: u64,
    #[serde(default = "default_openai_initial_backoff_ms")]
    pub openai_initial_backoff_ms: u64,
    #[serde(default = "default_openai_max_backoff_ms")]
    pub openai_max_backoff_ms: u64,
    #[serde(default = "default_openai_timeout_ms")]
    pub openai_timeout_ms: u64,
    #[serde(default = "default_pipeline_timeout_ms")]
    pub pipeline_timeout_ms: u64,
    #[serde(default)]
    pub checklist_path: Option<String>,
    #[serde(default = "default_scorer_port")]
    pub scorer_port: u16,
}

impl Settings {
    pub fn new() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::default())
            .build()?
            .try_deserialize()
    }

    pub fn model_config(&self) -> ModelConfig {
        ModelConfig {
            model_for_stage1: self.model_for_stage1.clone(),
            model_for_stage2: self.model_for_stage2.clone(),
            model_for_direct: self.model_for_direct.clone(),
            fallback_model: self.fallback_model.clone(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.openai_max_attempts.max(1),
            max_elapsed: Duration::from_millis(self.openai_max_elapsed_ms),
            initial_backoff: Duration::from_millis(self.openai_initial_backoff_ms),
            max_backoff: Duration::from_millis(self.openai_max_backoff_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.openai_timeout_ms)
    }

    pub fn pipeline_timeout(&self) -> Duration {
        Duration::from_millis(self.pipeline_timeout_ms)
    }
}
