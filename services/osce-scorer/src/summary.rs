//! Aggregation of station results into an exam-level summary. Placeholder
//! results are reported but never averaged in.

use serde::Serialize;
use shared::dto::ScoringResult;

use crate::checklist::Checklist;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceBand {
    High,
    Medium,
    Low,
}

impl PerformanceBand {
    pub fn for_percent(percent: f64) -> Self {
        if percent >= 70.0 {
            PerformanceBand::High
        } else if percent >= 50.0 {
            PerformanceBand::Medium
        } else {
            PerformanceBand::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationSummary {
    pub station: usize,
    pub scoring_failed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
    pub diagnosis_score: u8,
    pub candidate_dx: String,
    /// Checklist items scored 0.
    pub missed_items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExamSummary {
    pub total_stations: usize,
    pub scored_stations: usize,
    pub overall_percent: Option<f64>,
    pub band: Option<PerformanceBand>,
    pub stations: Vec<StationSummary>,
}

impl ExamSummary {
    pub fn from_results(results: &[ScoringResult], checklist: &Checklist) -> Self {
        let scored: Vec<f64> = results
            .iter()
            .filter(|r| !r.scoring_failed)
            .map(|r| r.percent)
            .collect();
        let overall_percent = if scored.is_empty() {
            None
        } else {
            Some(scored.iter().sum::<f64>() / scored.len() as f64)
        };

        let stations = results
            .iter()
            .enumerate()
            .map(|(idx, r)| StationSummary {
                station: idx + 1,
                scoring_failed: r.scoring_failed,
                percent: (!r.scoring_failed).then_some(r.percent),
                diagnosis_score: r.diagnosis_score,
                candidate_dx: r.candidate_dx.clone(),
                missed_items: if r.scoring_failed {
                    Vec::new()
                } else {
                    missed_items(r, checklist)
                },
            })
            .collect();

        Self {
            total_stations: results.len(),
            scored_stations: scored.len(),
            overall_percent,
            band: overall_percent.map(PerformanceBand::for_percent),
            stations,
        }
    }
}

pub fn missed_items(result: &ScoringResult, checklist: &Checklist) -> Vec<String> {
    result
        .scores
        .iter()
        .enumerate()
        .filter(|(_, s)| **s == 0)
        .filter_map(|(idx, _)| checklist.get(idx).map(str::to_string))
        .collect()
}
