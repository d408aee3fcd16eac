//! Central registry for the models used by the scoring stages.

use serde::{Deserialize, Serialize};

/// Free-text examiner used for the reasoning stage.
pub const REASONING_MODEL: &str = "gpt-4.1-mini";
/// JSON-mode scorer used for extraction, direct scoring and the single-stage fallback.
pub const EXTRACTION_MODEL: &str = "gpt-4o-mini";
/// Heavier model substituted once when a request keeps failing.
pub const FALLBACK_MODEL: &str = "gpt-4.1";

/// Model selection handed to the scoring pipeline at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_for_stage1: String,
    pub model_for_stage2: String,
    pub model_for_direct: String,
    pub fallback_model: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_for_stage1: REASONING_MODEL.into(),
            model_for_stage2: EXTRACTION_MODEL.into(),
            model_for_direct: EXTRACTION_MODEL.into(),
            fallback_model: FALLBACK_MODEL.into(),
        }
    }
}
