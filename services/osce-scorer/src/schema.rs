//! Structured-output contract for the JSON-mode stages.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared::dto::ScoringResult;
use thiserror::Error;
use tracing::warn;

use crate::json_relaxed::parse_json_relaxed;

/// Payload as produced by the remote service, before normalization.
/// Numbers are kept as `f64` so off-scale or fractional values survive
/// until quantization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawScoring {
    pub scores: Vec<f64>,
    pub item_comments: Vec<String>,
    pub comments: String,
    pub diagnosis_score: f64,
}

impl From<&ScoringResult> for RawScoring {
    fn from(r: &ScoringResult) -> Self {
        Self {
            scores: r.scores.iter().map(|&s| f64::from(s)).collect(),
            item_comments: r.item_comments.clone(),
            comments: r.comments.clone(),
            diagnosis_score: f64::from(r.diagnosis_score),
        }
    }
}

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("not JSON: {0}")]
    Json(String),
    #[error("expected a JSON object")]
    NotAnObject,
    #[error("schema violation: {0}")]
    Shape(#[from] serde_json::Error),
    #[error("scores array is empty")]
    EmptyScores,
}

/// Parse a structured-output payload. Missing or unknown keys are rejected;
/// wrong array lengths are left for the normalizer to repair.
pub fn parse_structured(payload: &str, expected_len: usize) -> Result<RawScoring, SchemaError> {
    let value = parse_json_relaxed(payload).map_err(SchemaError::Json)?;
    if !value.is_object() {
        return Err(SchemaError::NotAnObject);
    }
    let raw: RawScoring = serde_json::from_value(value)?;
    if raw.scores.is_empty() {
        return Err(SchemaError::EmptyScores);
    }
    if raw.scores.len() != expected_len || raw.item_comments.len() != expected_len {
        warn!(
            scores = raw.scores.len(),
            item_comments = raw.item_comments.len(),
            expected = expected_len,
            "structured output has wrong array lengths, normalizing"
        );
    }
    Ok(raw)
}

/// JSON-Schema document embedded in prompts.
pub fn schema_document(expected_len: usize) -> Value {
    json!({
        "type": "object",
        "properties": {
            "scores": {
                "type": "array",
                "items": {"type": "integer"},
                "minItems": expected_len, "maxItems": expected_len
            },
            "item_comments": {
                "type": "array",
                "items": {"type": "string"},
                "minItems": expected_len, "maxItems": expected_len
            },
            "comments": {"type": "string"},
            "diagnosis_score": {"type": "integer"}
        },
        "required": ["scores", "comments", "diagnosis_score", "item_comments"],
        "additionalProperties": false
    })
}
