//! Coerces whatever the remote service produced into a fixed-shape,
//! fixed-range [`ScoringResult`].

use shared::dto::ScoringResult;
use tracing::{debug, warn};

use crate::diagnosis::is_no_diagnosis;
use crate::schema::RawScoring;

pub const MAX_ITEM_SCORE: u8 = 5;
pub const MAX_DIAGNOSIS_SCORE: u8 = 5;
pub const NOT_ASSESSED: &str = "Not assessed";
pub const SCORE_NOT_AVAILABLE: &str = "Score not available";
pub const DEFAULT_COMMENTS: &str = "Evaluation of student performance completed.";
pub const PLACEHOLDER_COMMENTS: &str =
    "The scoring process encountered issues. Please review the transcript manually.";

/// Right-pad with `default` or truncate so that the result has exactly
/// `expected_len` elements.
pub fn normalize_array<T: Clone>(mut arr: Vec<T>, expected_len: usize, default: T) -> Vec<T> {
    if arr.len() < expected_len {
        debug!("normalizing array from {} to {} items", arr.len(), expected_len);
        arr.resize(expected_len, default);
    } else {
        arr.truncate(expected_len);
    }
    arr
}

/// Snap one score onto {0, 3, 5}.
pub fn quantize(score: f64) -> u8 {
    if score == 0.0 || score == 3.0 || score == 5.0 {
        score as u8
    } else if score > 3.0 {
        5
    } else if score > 0.0 {
        3
    } else {
        0
    }
}

pub fn validate_scores(scores: &[f64], expected_len: usize) -> Vec<u8> {
    normalize_array(scores.to_vec(), expected_len, 0.0)
        .into_iter()
        .map(quantize)
        .collect()
}

/// `round(sum / (expected_len * 5) * 100, 1)`.
pub fn percent(scores: &[u8], expected_len: usize) -> f64 {
    if expected_len == 0 {
        return 0.0;
    }
    let total: u32 = scores.iter().map(|&s| u32::from(s)).sum();
    let pct = f64::from(total) / (expected_len as f64 * f64::from(MAX_ITEM_SCORE)) * 100.0;
    (pct * 10.0).round() / 10.0
}

/// Zero for a missing diagnosis, zero for anything that is not an integer in
/// `0..=5`, otherwise the proposed value.
pub fn diagnosis_score(proposed: f64, candidate_dx: &str) -> u8 {
    if is_no_diagnosis(candidate_dx) {
        if proposed != 0.0 {
            debug!(proposed, "no diagnosis given, forcing diagnosis_score to 0");
        }
        return 0;
    }
    if proposed.fract() == 0.0 && (0.0..=f64::from(MAX_DIAGNOSIS_SCORE)).contains(&proposed) {
        proposed as u8
    } else {
        warn!(proposed, "invalid diagnosis score, setting to 0");
        0
    }
}

/// Build the final result from parsed structured output.
pub fn finalize(raw: RawScoring, candidate_dx: &str, expected_len: usize) -> ScoringResult {
    let scores = validate_scores(&raw.scores, expected_len);
    let item_comments = normalize_array(raw.item_comments, expected_len, NOT_ASSESSED.to_string());
    let comments = if raw.comments.trim().is_empty() {
        DEFAULT_COMMENTS.to_string()
    } else {
        raw.comments
    };
    ScoringResult {
        percent: percent(&scores, expected_len),
        diagnosis_score: diagnosis_score(raw.diagnosis_score, candidate_dx),
        scores,
        item_comments,
        comments,
        candidate_dx: candidate_dx.to_string(),
        scoring_failed: false,
    }
}

/// Safe result for when no stage produced usable data.
pub fn placeholder(candidate_dx: &str, expected_len: usize) -> ScoringResult {
    ScoringResult {
        scores: vec![0; expected_len],
        item_comments: vec![SCORE_NOT_AVAILABLE.to_string(); expected_len],
        comments: PLACEHOLDER_COMMENTS.to_string(),
        diagnosis_score: 0,
        percent: 0.0,
        candidate_dx: candidate_dx.to_string(),
        scoring_failed: true,
    }
}
