//! End-to-end coverage of the orchestrator's attempt pipeline against a
//! stubbed provider backend, exercising the full submit/poll/fetch cycle
//! the unit tests never touch.

mod support;

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use support::{accounts_yaml_empty, accounts_yaml_two_keys, harness, policies_yaml, providers_yaml, sample_job};

#[tokio::test]
async fn happy_path_writes_output_and_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"job_id": "prov-1"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/jobs/prov-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "succeeded"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/jobs/prov-1/result"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fake-mp4-bytes".to_vec()).insert_header("content-type", "video/mp4"))
        .mount(&server)
        .await;

    let h = harness(
        &providers_yaml(&server.uri(), &["runway", "spec_only"]),
        &policies_yaml(1, 0, 3, 60, ""),
        accounts_yaml_empty(),
    );

    h.orchestrator.run_job("job-1", sample_job()).await;

    let record = h.jobs.get("job-1").unwrap();
    assert_eq!(record.status, videoforge::JobStatus::Succeeded);
    assert!(record.artifacts.contains_key("output"));
    assert_eq!(std::fs::read(record.artifacts.get("output").unwrap()).unwrap(), b"fake-mp4-bytes");
}

#[tokio::test]
async fn transient_failure_retries_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/jobs"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"job_id": "prov-2"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/jobs/prov-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "succeeded"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/jobs/prov-2/result"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"bytes".to_vec()).insert_header("content-type", "video/mp4"))
        .mount(&server)
        .await;

    let h = harness(
        &providers_yaml(&server.uri(), &["runway", "spec_only"]),
        &policies_yaml(2, 1, 3, 60, ""),
        accounts_yaml_empty(),
    );

    h.orchestrator.run_job("job-2", sample_job()).await;

    let record = h.jobs.get("job-2").unwrap();
    assert_eq!(record.status, videoforge::JobStatus::Succeeded);
    assert_eq!(h.sleeper.calls(), 1);
    let attempts = h.attempts("job-2");
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].status, videoforge::AttemptStatus::Failed);
    assert_eq!(attempts[0].error_type, Some(videoforge::ErrorType::Transient));
    assert_eq!(attempts[1].status, videoforge::AttemptStatus::Succeeded);
}

#[tokio::test]
async fn quota_error_falls_back_to_next_pool_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/jobs"))
        .and(header("Authorization", "key-a"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/jobs"))
        .and(header("Authorization", "key-b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"job_id": "prov-3"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/jobs/prov-3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "succeeded"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/jobs/prov-3/result"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"bytes".to_vec()).insert_header("content-type", "video/mp4"))
        .mount(&server)
        .await;

    let h = harness(
        &providers_yaml(&server.uri(), &["runway", "spec_only"]),
        &policies_yaml(1, 0, 3, 60, ""),
        accounts_yaml_two_keys(),
    );

    h.orchestrator.run_job("job-3", sample_job()).await;

    let record = h.jobs.get("job-3").unwrap();
    assert_eq!(record.status, videoforge::JobStatus::Succeeded);
    let attempts = h.attempts("job-3");
    assert_eq!(attempts[0].error_type, Some(videoforge::ErrorType::Quota));
    assert_eq!(attempts[0].account_key_id.as_deref(), Some("key-a"));
    assert_eq!(attempts[1].account_key_id.as_deref(), Some("key-b"));
}

#[tokio::test]
async fn structural_failure_trips_circuit_and_skips_next_run() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).and(path("/jobs")).respond_with(ResponseTemplate::new(501)).mount(&server).await;

    let h = harness(
        &providers_yaml(&server.uri(), &["runway", "spec_only"]),
        &policies_yaml(1, 0, 1, 60, ""),
        accounts_yaml_empty(),
    );

    h.orchestrator.run_job("job-4a", sample_job()).await;
    let first = h.jobs.get("job-4a").unwrap();
    assert_eq!(first.status, videoforge::JobStatus::SpecOnly);
    let statuses = h.registry.health_snapshot();
    let runway = statuses.iter().find(|s| s.provider == "runway").unwrap();
    assert!(runway.circuit_open);

    h.orchestrator.run_job("job-4b", sample_job()).await;
    let second = h.jobs.get("job-4b").unwrap();
    assert_eq!(second.status, videoforge::JobStatus::SpecOnly);
    let attempts = h.attempts("job-4b");
    assert_eq!(attempts[0].status, videoforge::AttemptStatus::Skipped);
    assert_eq!(attempts[0].reason.as_deref(), Some("circuit_open"));

    let requests = server.received_requests().await.expect("mock server records requests");
    assert_eq!(requests.len(), 1, "second run must not call the tripped provider again");
}

#[tokio::test]
async fn chain_exhaustion_falls_back_to_spec_only() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).and(path("/jobs")).respond_with(ResponseTemplate::new(429)).mount(&server).await;

    let h = harness(
        &providers_yaml(&server.uri(), &["runway", "spec_only"]),
        &policies_yaml(1, 0, 3, 60, ""),
        accounts_yaml_empty(),
    );

    h.orchestrator.run_job("job-5", sample_job()).await;

    let record = h.jobs.get("job-5").unwrap();
    assert_eq!(record.status, videoforge::JobStatus::SpecOnly);
    assert!(record.artifacts.contains_key("scene_spec"));
    assert!(record.artifacts.contains_key("final_prompt"));
    assert!(!record.artifacts.contains_key("output"));
}

#[tokio::test]
async fn degrade_plan_steps_down_resolution_across_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).and(path("/jobs")).respond_with(ResponseTemplate::new(503)).mount(&server).await;

    let degrade_plan_yaml = r#"
degrade_plan:
  - resolution: "720p"
  - resolution: "480p"
    fps: 15
"#;
    let h = harness(
        &providers_yaml(&server.uri(), &["runway"]),
        &policies_yaml(1, 0, 3, 60, degrade_plan_yaml),
        accounts_yaml_empty(),
    );

    h.orchestrator.run_job("job-6", sample_job()).await;

    let record = h.jobs.get("job-6").unwrap();
    assert_eq!(record.status, videoforge::JobStatus::SpecOnly);
    let attempts = h.attempts("job-6");
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].degrade_step, 0);
    assert_eq!(attempts[1].degrade_step, 1);

    let requests = server.received_requests().await.expect("mock server records requests");
    assert_eq!(requests.len(), 2);
    let first_body = h.submitted_job(&requests[0]);
    let second_body = h.submitted_job(&requests[1]);
    assert_eq!(first_body["resolution"], "720p");
    assert_eq!(second_body["resolution"], "480p");
    assert_eq!(second_body["fps"], 15);
}
