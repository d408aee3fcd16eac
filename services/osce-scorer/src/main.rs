use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use osce_scorer::normalize;
use osce_scorer::summary::ExamSummary;
use osce_scorer::transcript::render_chat;
use osce_scorer::{Checklist, ScoringPipeline};
use shared::config::Settings;
use shared::dto::{ChatScoreRequest, ScoreRequest, ScoringResult};
use shared::error::{AppError, Result as AppResult};
use shared::openai_client::OpenAiTransport;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

// Long exam transcripts overflow actix's 32 KiB JSON default.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Clone)]
struct AppState {
    pipeline: Arc<ScoringPipeline>,
    run_timeout: Duration,
}

impl AppState {
    /// Scores on a task of its own so a stuck run only holds up its own request.
    async fn score_isolated(&self, transcript: String, candidate_dx: String) -> ScoringResult {
        let pipeline = self.pipeline.clone();
        let limit = self.run_timeout;
        let dx = candidate_dx.clone();
        let handle = tokio::spawn(async move {
            pipeline.score_within(&transcript, &dx, limit).await
        });
        match handle.await {
            Ok(result) => result,
            Err(e) => {
                error!(%e, "scoring task aborted");
                normalize::placeholder(&candidate_dx, self.pipeline.checklist().len())
            }
        }
    }
}

async fn health() -> impl Responder {
    "OK"
}

async fn score(state: web::Data<AppState>, body: web::Json<ScoreRequest>) -> impl Responder {
    let ScoreRequest {
        transcript,
        candidate_dx,
    } = body.into_inner();
    info!(bytes = transcript.len(), "score request");
    let result = state.score_isolated(transcript, candidate_dx).await;
    HttpResponse::Ok().json(result)
}

async fn score_chat(
    state: web::Data<AppState>,
    body: web::Json<ChatScoreRequest>,
) -> impl Responder {
    let ChatScoreRequest {
        messages,
        candidate_dx,
    } = body.into_inner();
    info!(turns = messages.len(), "chat score request");
    let transcript = render_chat(&messages);
    let result = state.score_isolated(transcript, candidate_dx).await;
    HttpResponse::Ok().json(result)
}

async fn summary(
    state: web::Data<AppState>,
    body: web::Json<Vec<ScoringResult>>,
) -> impl Responder {
    let summary = ExamSummary::from_results(&body, state.pipeline.checklist());
    HttpResponse::Ok().json(summary)
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/score", web::post().to(score))
        .route("/score/chat", web::post().to(score_chat))
        .route("/summary", web::post().to(summary));
}

fn build_pipeline(settings: &Settings) -> AppResult<ScoringPipeline> {
    let checklist = match &settings.checklist_path {
        Some(path) => {
            info!(%path, "loading checklist");
            Checklist::from_json_file(path).map_err(|e| AppError::Checklist(e.to_string()))?
        }
        None => Checklist::default(),
    };

    if settings.openai_api_key.is_empty() {
        warn!("OPENAI_API_KEY is empty, every score will be a placeholder");
    }
    let transport =
        OpenAiTransport::from_settings(settings).map_err(|e| AppError::HttpClient(e.to_string()))?;
    Ok(
        ScoringPipeline::new(Arc::new(transport), settings.model_config(), checklist)
            .with_retry_policy(settings.retry_policy())
            .with_request_timeout(settings.request_timeout()),
    )
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    info!("starting osce-scorer");

    let settings = match Settings::new() {
        Ok(s) => s,
        Err(e) => {
            error!(%e, "failed to load settings");
            std::process::exit(1);
        }
    };

    let pipeline = build_pipeline(&settings)?;
    info!(
        stage1 = %pipeline.models().model_for_stage1,
        stage2 = %pipeline.models().model_for_stage2,
        direct = %pipeline.models().model_for_direct,
        fallback = %pipeline.fallback_model(),
        items = pipeline.checklist().len(),
        "scoring pipeline ready"
    );

    let state = AppState {
        pipeline: Arc::new(pipeline),
        run_timeout: settings.pipeline_timeout(),
    };
    let port = settings.scorer_port;
    info!(port, "listening");

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(web::JsonConfig::default().limit(MAX_BODY_BYTES))
            .app_data(web::Data::new(state.clone()))
            .configure(routes)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await?;
    Ok(())
}
