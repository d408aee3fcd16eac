//! Scoring state machine.
//!
//! Entry routes very short transcripts to a one-pass direct score. Everything
//! else (including a failed direct score) goes through reasoning followed by
//! structured extraction, then a single-stage structured fallback, and finally
//! a flagged placeholder result. The caller always receives a well-formed
//! [`ScoringResult`].

use std::sync::Arc;
use std::time::Duration;

use openai::chat::ChatCompletionMessage;
use shared::dto::ScoringResult;
use shared::openai_client::{CallOptions, ChatTransport, RemoteCallClient, RetryPolicy};
use shared::openai_settings::ModelConfig;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::checklist::Checklist;
use crate::normalize;
use crate::outcome::{RunLog, ScoringPath, ScoringRun, Stage, StageOutcome};
use crate::prompts;
use crate::schema::{parse_structured, schema_document, RawScoring};
use crate::transcript::{condense, line_count, DEFAULT_CONDENSE_LIMIT};

/// Transcripts with fewer lines than this take the direct-score path.
pub const DIRECT_SCORE_MAX_LINES: usize = 5;

const DIRECT_TEMPERATURE: f32 = 0.1;
const REASONING_TEMPERATURE: f32 = 0.2;
const REASONING_MAX_TOKENS: u32 = 900;
const EXTRACTION_TEMPERATURE: f32 = 0.0;
const SINGLE_STAGE_TEMPERATURE: f32 = 0.1;

pub struct ScoringPipeline {
    client: RemoteCallClient,
    models: ModelConfig,
    checklist: Checklist,
    schema: String,
}

impl ScoringPipeline {
    /// The remote client substitutes `models.fallback_model` once a request
    /// has used up its retries.
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        models: ModelConfig,
        checklist: Checklist,
    ) -> Self {
        let schema = serde_json::to_string_pretty(&schema_document(checklist.len()))
            .unwrap_or_default();
        Self {
            client: RemoteCallClient::new(transport, models.fallback_model.clone()),
            models,
            checklist,
            schema,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.client = self.client.with_retry_policy(retry);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.client = self.client.with_request_timeout(timeout);
        self
    }

    pub fn fallback_model(&self) -> &str {
        self.client.fallback_model()
    }

    pub fn checklist(&self) -> &Checklist {
        &self.checklist
    }

    pub fn models(&self) -> &ModelConfig {
        &self.models
    }

    pub async fn score(&self, transcript: &str, candidate_dx: &str) -> ScoringResult {
        self.run(transcript, candidate_dx).await.result
    }

    /// Like [`score`](Self::score) but gives up after `limit`, returning the
    /// flagged placeholder.
    pub async fn score_within(
        &self,
        transcript: &str,
        candidate_dx: &str,
        limit: Duration,
    ) -> ScoringResult {
        match tokio::time::timeout(limit, self.score(transcript, candidate_dx)).await {
            Ok(result) => result,
            Err(_) => {
                error!("scoring did not finish within {:?}, returning placeholder", limit);
                normalize::placeholder(candidate_dx, self.checklist.len())
            }
        }
    }

    pub async fn run(&self, transcript: &str, candidate_dx: &str) -> ScoringRun {
        let run_id = Uuid::new_v4();
        let dx = candidate_dx.trim();
        let mut log = RunLog::default();

        let lines = line_count(transcript);
        info!(%run_id, lines, "scoring transcript");

        if lines < DIRECT_SCORE_MAX_LINES {
            match self.direct_stage(transcript, dx, &mut log).await {
                StageOutcome::Success(raw) => {
                    return self.finish(run_id, ScoringPath::DirectScore, log, raw, candidate_dx)
                }
                _ => warn!(%run_id, "direct scoring failed, continuing with two-stage scoring"),
            }
        }

        let summary = condense(transcript, DEFAULT_CONDENSE_LIMIT);

        match self.two_stage(&summary, dx, &mut log).await {
            StageOutcome::Success(raw) => {
                return self.finish(run_id, ScoringPath::TwoStage, log, raw, candidate_dx)
            }
            _ => warn!(%run_id, "two-stage scoring failed, falling back to one-stage"),
        }

        match self.single_stage(&summary, dx, &mut log).await {
            StageOutcome::Success(raw) => {
                self.finish(run_id, ScoringPath::SingleStageFallback, log, raw, candidate_dx)
            }
            StageOutcome::RecoverableFailure(reason) | StageOutcome::FatalFailure(reason) => {
                error!(%run_id, "all scoring methods failed: {reason}");
                ScoringRun {
                    run_id,
                    path: ScoringPath::Minimal,
                    log: log.into_records(),
                    result: normalize::placeholder(candidate_dx, self.checklist.len()),
                }
            }
        }
    }

    async fn direct_stage(&self, transcript: &str, dx: &str, log: &mut RunLog) -> StageOutcome {
        let messages = prompts::direct_scoring(transcript, &self.checklist, dx);
        self.structured_stage(
            Stage::Direct,
            &self.models.model_for_direct,
            &messages,
            CallOptions::json(DIRECT_TEMPERATURE),
            log,
            StageOutcome::RecoverableFailure,
        )
        .await
    }

    async fn two_stage(&self, summary: &str, dx: &str, log: &mut RunLog) -> StageOutcome {
        let model = &self.models.model_for_stage1;
        let messages = prompts::reasoning(summary, &self.checklist, dx);
        let options = CallOptions::text(REASONING_TEMPERATURE).with_max_tokens(REASONING_MAX_TOKENS);
        let notes = match self.client.call(&messages, model, options).await {
            Ok(notes) => {
                log.record(Stage::Reasoning, model, None);
                notes
            }
            Err(e) => {
                let reason = format!("remote call: {e}");
                log.record(Stage::Reasoning, model, Some(reason.clone()));
                return StageOutcome::RecoverableFailure(reason);
            }
        };
        info!(lines = notes.lines().count(), "received examiner notes");

        let messages = prompts::extraction(&notes, &self.checklist, dx, &self.schema);
        self.structured_stage(
            Stage::Extraction,
            &self.models.model_for_stage2,
            &messages,
            CallOptions::json(EXTRACTION_TEMPERATURE),
            log,
            StageOutcome::RecoverableFailure,
        )
        .await
    }

    async fn single_stage(&self, summary: &str, dx: &str, log: &mut RunLog) -> StageOutcome {
        let messages = prompts::single_stage(summary, &self.checklist, dx, &self.schema);
        self.structured_stage(
            Stage::SingleStage,
            &self.models.model_for_stage2,
            &messages,
            CallOptions::json(SINGLE_STAGE_TEMPERATURE),
            log,
            StageOutcome::FatalFailure,
        )
        .await
    }

    async fn structured_stage(
        &self,
        stage: Stage,
        model: &str,
        messages: &[ChatCompletionMessage],
        options: CallOptions,
        log: &mut RunLog,
        on_failure: fn(String) -> StageOutcome,
    ) -> StageOutcome {
        let parsed: Result<RawScoring, String> = match self.client.call(messages, model, options).await {
            Ok(payload) => parse_structured(&payload, self.checklist.len())
                .map_err(|e| format!("schema: {e}")),
            Err(e) => Err(format!("remote call: {e}")),
        };
        match parsed {
            Ok(raw) => {
                log.record(stage, model, None);
                StageOutcome::Success(raw)
            }
            Err(reason) => {
                warn!(%stage, %model, "stage failed: {reason}");
                log.record(stage, model, Some(reason.clone()));
                on_failure(reason)
            }
        }
    }

    fn finish(
        &self,
        run_id: Uuid,
        path: ScoringPath,
        log: RunLog,
        raw: RawScoring,
        candidate_dx: &str,
    ) -> ScoringRun {
        let result = normalize::finalize(raw, candidate_dx, self.checklist.len());
        let count = |v: u8| result.scores.iter().filter(|&&s| s == v).count();
        info!(
            %run_id,
            %path,
            zeros = count(0),
            threes = count(3),
            fives = count(5),
            percent = result.percent,
            "scoring finished"
        );
        ScoringRun {
            run_id,
            path,
            log: log.into_records(),
            result,
        }
    }
}
