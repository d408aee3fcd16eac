use std::sync::Arc;
use std::time::Duration;

use osce_scorer::outcome::{ScoringPath, Stage};
use osce_scorer::{Checklist, ScoringPipeline};
use serde_json::{json, Value};
use shared::openai_client::{OpenAiTransport, RetryPolicy};
use shared::openai_settings::ModelConfig;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"message": {"role": "assistant", "content": content}}]
    }))
}

fn scoring_payload(score: u8, diagnosis_score: u8) -> String {
    json!({
        "scores": vec![score; 35],
        "item_comments": vec!["seen in transcript"; 35],
        "comments": "Structured history",
        "diagnosis_score": diagnosis_score
    })
    .to_string()
}

fn long_transcript() -> String {
    (0..20)
        .map(|i| {
            if i % 2 == 0 {
                format!("Student: question {i}")
            } else {
                format!("Patient: answer {i}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn pipeline_for(server: &MockServer) -> ScoringPipeline {
    let transport = OpenAiTransport::new(&server.uri(), "test-key", Duration::from_secs(5))
        .expect("transport");
    let models = ModelConfig {
        model_for_stage1: "reasoner".into(),
        model_for_stage2: "extractor".into(),
        model_for_direct: "direct".into(),
        fallback_model: "heavy".into(),
    };
    ScoringPipeline::new(Arc::new(transport), models, Checklist::default()).with_retry_policy(
        RetryPolicy {
            max_attempts: 2,
            max_elapsed: Duration::from_secs(5),
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        },
    )
}

#[tokio::test]
async fn short_transcript_is_scored_directly_over_http() {
    let server = MockServer::start().await;
    let fenced = format!("```json\n{}\n```", scoring_payload(3, 5));
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "direct",
            "response_format": {"type": "json_object"}
        })))
        .respond_with(completion(&fenced))
        .expect(1)
        .mount(&server)
        .await;

    let run = pipeline_for(&server)
        .run("Student: Hello\nPatient: Hi", "Not sure")
        .await;

    assert_eq!(run.path, ScoringPath::DirectScore);
    assert_eq!(run.result.scores, vec![3; 35]);
    assert_eq!(run.result.diagnosis_score, 0);
    assert_eq!(run.result.percent, 60.0);
    assert!(!run.result.scoring_failed);
}

#[tokio::test]
async fn long_transcript_goes_through_reasoning_and_extraction() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"model": "reasoner", "max_tokens": 900})))
        .and(body_string_contains("Student: question 0"))
        .respond_with(completion("5  Introduced self\n0  Did not ask about allergies"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"model": "extractor", "temperature": 0.0})))
        .and(body_string_contains("Introduced self"))
        .respond_with(completion(&scoring_payload(5, 4)))
        .expect(1)
        .mount(&server)
        .await;

    let run = pipeline_for(&server).run(&long_transcript(), "Asthma").await;

    assert_eq!(run.path, ScoringPath::TwoStage);
    assert_eq!(run.stages(), vec![Stage::Reasoning, Stage::Extraction]);
    assert_eq!(run.result.percent, 100.0);
    assert_eq!(run.result.diagnosis_score, 4);
    assert_eq!(run.result.candidate_dx, "Asthma");
}

#[tokio::test]
async fn unusable_extraction_falls_back_to_single_stage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"model": "reasoner"})))
        .respond_with(completion("5  Introduced self"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("Convert the examiner notes"))
        .respond_with(completion("{\"scores\": []}"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"model": "extractor"})))
        .and(body_string_contains("Schema:"))
        .respond_with(completion(&scoring_payload(0, 2)))
        .expect(1)
        .mount(&server)
        .await;

    let run = pipeline_for(&server).run(&long_transcript(), "Asthma").await;

    assert_eq!(run.path, ScoringPath::SingleStageFallback);
    assert_eq!(
        run.stages(),
        vec![Stage::Reasoning, Stage::Extraction, Stage::SingleStage]
    );
    assert_eq!(run.result.percent, 0.0);
    assert!(!run.result.scoring_failed);
}

#[tokio::test]
async fn persistent_server_errors_yield_flagged_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let run = pipeline_for(&server).run(&long_transcript(), "Asthma").await;

    assert_eq!(run.path, ScoringPath::Minimal);
    assert!(run.result.scoring_failed);
    assert_eq!(run.result.scores, vec![0; 35]);
    assert_eq!(run.result.candidate_dx, "Asthma");

    // reasoning and single stage each: two primary attempts, then two on the fallback
    let requests = server.received_requests().await.unwrap_or_default();
    let models: Vec<String> = requests
        .iter()
        .filter_map(|r| serde_json::from_slice::<Value>(&r.body).ok())
        .filter_map(|v| v["model"].as_str().map(str::to_string))
        .collect();
    assert_eq!(models.len(), 8);
    assert_eq!(models.iter().filter(|m| *m == "heavy").count(), 4);
    assert_eq!(models.iter().filter(|m| *m == "reasoner").count(), 2);
    assert_eq!(models.iter().filter(|m| *m == "extractor").count(), 2);
}
