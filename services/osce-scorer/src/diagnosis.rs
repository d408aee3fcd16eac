/// Answers that mean the candidate did not commit to a diagnosis.
pub const NEGATION_TOKENS: [&str; 7] = [
    "none",
    "n/a",
    "na",
    "unknown",
    "not sure",
    "don't know",
    "i don't know",
];

/// True when `candidate_dx` is blank or one of [`NEGATION_TOKENS`], ignoring
/// case and surrounding whitespace.
pub fn is_no_diagnosis(candidate_dx: &str) -> bool {
    let normalized = candidate_dx.trim().to_lowercase();
    normalized.is_empty() || NEGATION_TOKENS.contains(&normalized.as_str())
}
