use serde::{Deserialize, Serialize};

/// Scored station as returned to callers. Always holds exactly one score and
/// one comment per checklist item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    pub scores: Vec<u8>,
    pub item_comments: Vec<String>,
    pub comments: String,
    pub diagnosis_score: u8,
    pub percent: f64,
    /// Diagnosis exactly as the candidate entered it.
    pub candidate_dx: String,
    /// Set when the result is a placeholder rather than a genuine evaluation.
    pub scoring_failed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScoreRequest {
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub candidate_dx: String,
}

/// One chat turn as recorded by the exam front-end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatScoreRequest {
    #[serde(default)]
    pub messages: Vec<ChatTurn>,
    #[serde(default)]
    pub candidate_dx: String,
}
