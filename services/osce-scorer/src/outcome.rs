//! Tagged results for the scoring state machine and the per-run stage log.

use serde::Serialize;
use shared::dto::ScoringResult;
use strum_macros::Display;
use uuid::Uuid;

use crate::schema::RawScoring;

/// One remote-call round within a scoring run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Direct,
    Reasoning,
    Extraction,
    SingleStage,
}

/// Terminal state a run ended in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScoringPath {
    DirectScore,
    TwoStage,
    SingleStageFallback,
    Minimal,
}

/// Result of a structured stage. A recoverable failure moves the run to the
/// next, simpler stage; a fatal one ends it with the placeholder result.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    Success(RawScoring),
    RecoverableFailure(String),
    FatalFailure(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageRecord {
    pub seq_no: u32,
    pub stage: Stage,
    pub model: String,
    pub status: StageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ScoringRun {
    pub run_id: Uuid,
    pub path: ScoringPath,
    pub log: Vec<StageRecord>,
    pub result: ScoringResult,
}

impl ScoringRun {
    /// Stages attempted, in order.
    pub fn stages(&self) -> Vec<Stage> {
        self.log.iter().map(|r| r.stage).collect()
    }
}

/// Accumulates [`StageRecord`]s with increasing sequence numbers.
#[derive(Debug, Default)]
pub struct RunLog {
    records: Vec<StageRecord>,
}

impl RunLog {
    pub fn record(&mut self, stage: Stage, model: &str, error: Option<String>) {
        let status = if error.is_none() {
            StageStatus::Succeeded
        } else {
            StageStatus::Failed
        };
        self.records.push(StageRecord {
            seq_no: self.records.len() as u32 + 1,
            stage,
            model: model.to_string(),
            status,
            error,
        });
    }

    pub fn into_records(self) -> Vec<StageRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_log_numbers_records_in_order() {
        let mut log = RunLog::default();
        log.record(Stage::Direct, "m1", Some("boom".into()));
        log.record(Stage::Reasoning, "m2", None);
        let records = log.into_records();
        assert_eq!(records[0].seq_no, 1);
        assert_eq!(records[0].status, StageStatus::Failed);
        assert_eq!(records[1].seq_no, 2);
        assert_eq!(records[1].status, StageStatus::Succeeded);
    }

    #[test]
    fn labels_are_snake_case() {
        assert_eq!(Stage::SingleStage.to_string(), "single_stage");
        assert_eq!(ScoringPath::SingleStageFallback.to_string(), "single_stage_fallback");
        let json = serde_json::to_value(ScoringPath::TwoStage).unwrap();
        assert_eq!(json, "two_stage");
    }
}
