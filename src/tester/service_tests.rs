//! Tests for `DeploymentTester` against a mock TTS server.

use super::probe::ProbeFailure;
use super::service::{DeploymentTester, PROBE_TEXT};
use crate::config::TesterConfig;
use std::time::Duration;
use tokio::time::Instant;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn tester(config: TesterConfig) -> DeploymentTester {
    DeploymentTester::new(config).unwrap_or_else(|e| panic!("client build failed: {e}"))
}

fn quick_config(base_url: impl Into<String>) -> TesterConfig {
    TesterConfig::new(base_url)
        .with_max_wait_secs(2)
        .with_poll_interval_ms(20)
        .with_request_timeout_secs(2)
        .with_benchmark_timeout_secs(2)
}

/// A base URL where nothing listens.
async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap_or_else(|e| panic!("bind failed: {e}"));
    let addr = listener
        .local_addr()
        .unwrap_or_else(|e| panic!("local_addr failed: {e}"));
    drop(listener);
    format!("http://{addr}")
}

async fn mount_get(server: &MockServer, route: &str, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(template)
        .mount(server)
        .await;
}

async fn requests_to(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == route)
        .count()
}

// ── Readiness ─────────────────────────────────────────────────────

#[tokio::test]
async fn wait_returns_true_after_failed_polls() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(3)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_get(&server, "/health", ResponseTemplate::new(200)).await;

    let t = tester(quick_config(server.uri()));
    assert!(t.wait_for_service(Duration::from_secs(2)).await);
    assert_eq!(requests_to(&server, "/health").await, 4);
}

#[tokio::test]
async fn wait_gives_up_at_deadline() {
    let server = MockServer::start().await;
    mount_get(&server, "/health", ResponseTemplate::new(503)).await;

    let t = tester(quick_config(server.uri()));
    let start = Instant::now();
    assert!(!t.wait_for_service(Duration::from_millis(200)).await);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(200), "elapsed: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "elapsed: {elapsed:?}");
}

#[tokio::test]
async fn wait_treats_refused_connection_as_not_ready() {
    let t = tester(quick_config(dead_url().await));
    assert!(!t.wait_for_service(Duration::from_millis(150)).await);
}

#[tokio::test]
async fn wait_with_zero_budget_never_polls() {
    let server = MockServer::start().await;
    mount_get(&server, "/health", ResponseTemplate::new(200)).await;

    let t = tester(quick_config(server.uri()));
    assert!(!t.wait_for_service(Duration::ZERO).await);
    assert_eq!(requests_to(&server, "/health").await, 0);
}

// ── Health and info ───────────────────────────────────────────────

#[tokio::test]
async fn health_and_info_pass_on_200() {
    let server = MockServer::start().await;
    mount_get(&server, "/health", ResponseTemplate::new(200)).await;
    mount_get(
        &server,
        "/",
        ResponseTemplate::new(200).set_body_json(serde_json::json!({"name": "GPT-SoVITS"})),
    )
    .await;

    let t = tester(quick_config(server.uri()));
    assert!(t.probe_health().await.passed);
    assert!(t.probe_info().await.passed);
}

#[tokio::test]
async fn health_fails_on_500_with_body_preview() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        "/health",
        ResponseTemplate::new(500).set_body_json(serde_json::json!({"detail": "model not loaded"})),
    )
    .await;

    let t = tester(quick_config(server.uri()));
    let result = t.probe_health().await;
    assert!(!result.passed);
    match result.failure {
        Some(ProbeFailure::HttpStatus { status_code, body }) => {
            assert_eq!(status_code, 500);
            assert!(body.contains("model not loaded"), "body: {body}");
        }
        other => panic!("expected HttpStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn info_requires_exactly_200() {
    let server = MockServer::start().await;
    mount_get(&server, "/", ResponseTemplate::new(204)).await;

    let t = tester(quick_config(server.uri()));
    let result = t.probe_info().await;
    assert!(!result.passed);
    assert!(matches!(
        result.failure,
        Some(ProbeFailure::HttpStatus {
            status_code: 204,
            ..
        })
    ));
}

#[tokio::test]
async fn probes_report_refused_connection_as_not_running() {
    let t = tester(quick_config(dead_url().await));

    for result in [
        t.probe_health().await,
        t.probe_info().await,
        t.probe_character_list().await,
        t.probe_synthesis("hutao").await,
    ] {
        assert!(!result.passed, "{result}");
        assert_eq!(result.failure, Some(ProbeFailure::NotRunning), "{result}");
    }
}

#[tokio::test]
async fn slow_probe_times_out() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        "/health",
        ResponseTemplate::new(200).set_delay(Duration::from_millis(1_500)),
    )
    .await;

    let t = tester(quick_config(server.uri()).with_request_timeout_secs(1));
    let result = t.probe_health().await;
    assert_eq!(result.failure, Some(ProbeFailure::Timeout));
}

// ── Character list ────────────────────────────────────────────────

#[tokio::test]
async fn character_list_counts_entries() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        "/characters",
        ResponseTemplate::new(200).set_body_json(serde_json::json!([
            "hutao", "venti", "yoimiya", "zhongli"
        ])),
    )
    .await;

    let t = tester(quick_config(server.uri()));
    let result = t.probe_character_list().await;
    assert!(result.passed, "{result}");
    assert_eq!(result.detail, "4 characters");
}

#[tokio::test]
async fn empty_character_list_fails() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        "/characters",
        ResponseTemplate::new(200).set_body_json(serde_json::json!([])),
    )
    .await;

    let t = tester(quick_config(server.uri()));
    let result = t.probe_character_list().await;
    assert!(!result.passed);
    assert_eq!(result.failure, Some(ProbeFailure::EmptyList));
}

#[tokio::test]
async fn non_json_character_list_fails() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        "/characters",
        ResponseTemplate::new(200).set_body_string("<html>oops</html>"),
    )
    .await;

    let t = tester(quick_config(server.uri()));
    let result = t.probe_character_list().await;
    assert!(!result.passed);
    assert!(matches!(
        result.failure,
        Some(ProbeFailure::BadPayload { .. })
    ));
}

#[tokio::test]
async fn character_object_instead_of_list_fails() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        "/characters",
        ResponseTemplate::new(200).set_body_json(serde_json::json!({"characters": ["hutao"]})),
    )
    .await;

    let t = tester(quick_config(server.uri()));
    let result = t.probe_character_list().await;
    assert!(matches!(
        result.failure,
        Some(ProbeFailure::BadPayload { .. })
    ));
}

// ── Synthesis ─────────────────────────────────────────────────────

#[tokio::test]
async fn synthesis_sends_probe_request_and_saves_audio() {
    let server = MockServer::start().await;
    let wav = vec![7_u8; 64];
    Mock::given(method("POST"))
        .and(path("/tts"))
        .and(body_partial_json(serde_json::json!({
            "text": PROBE_TEXT,
            "character": "venti",
            "language": "zh",
            "speed": 1.0,
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "audio/wav")
                .set_body_bytes(wav.clone()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let out = dir.path().join("probe.wav");
    let t = tester(quick_config(server.uri()).with_output_path(&out));

    let result = t.probe_synthesis("venti").await;
    assert!(result.passed, "{result}");
    let saved = std::fs::read(&out).unwrap_or_else(|e| panic!("read output: {e}"));
    assert_eq!(saved, wav);
}

#[tokio::test]
async fn synthesis_overwrites_previous_output() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tts"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "audio/wav")
                .set_body_bytes(b"new".to_vec()),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let out = dir.path().join("probe.wav");
    std::fs::write(&out, b"a much longer stale file").unwrap_or_else(|e| panic!("seed: {e}"));

    let t = tester(quick_config(server.uri()).with_output_path(&out));
    assert!(t.probe_synthesis("hutao").await.passed);
    assert_eq!(std::fs::read(&out).unwrap_or_default(), b"new");
}

#[tokio::test]
async fn synthesis_size_threshold_without_audio_type() {
    for (size, expect_pass) in [(1_000_usize, false), (1_001, true)] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tts"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/octet-stream")
                    .set_body_bytes(vec![0_u8; size]),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let out = dir.path().join("probe.wav");
        let t = tester(quick_config(server.uri()).with_output_path(&out));

        let result = t.probe_synthesis("hutao").await;
        assert_eq!(result.passed, expect_pass, "size {size}: {result}");
        assert_eq!(out.exists(), expect_pass, "size {size}");
        if !expect_pass {
            assert!(matches!(
                result.failure,
                Some(ProbeFailure::NotAudio { size: 1_000, .. })
            ));
        }
    }
}

#[tokio::test]
async fn synthesis_small_json_error_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tts"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"error": "unknown character"})),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let t = tester(quick_config(server.uri()).with_output_path(dir.path().join("x.wav")));
    let result = t.probe_synthesis("nobody").await;
    assert!(!result.passed);
    assert!(result.detail.contains("unknown character"), "{}", result.detail);
}

#[tokio::test]
async fn synthesis_non_200_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tts"))
        .respond_with(ResponseTemplate::new(422).set_body_string("missing text"))
        .mount(&server)
        .await;

    let t = tester(quick_config(server.uri()));
    let result = t.probe_synthesis("hutao").await;
    assert!(matches!(
        result.failure,
        Some(ProbeFailure::HttpStatus {
            status_code: 422,
            ..
        })
    ));
}

#[tokio::test]
async fn synthesis_unwritable_output_fails_with_io() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tts"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "audio/wav")
                .set_body_bytes(vec![1_u8; 16]),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let out = dir.path().join("missing-dir").join("probe.wav");
    let t = tester(quick_config(server.uri()).with_output_path(out));
    let result = t.probe_synthesis("hutao").await;
    assert!(matches!(result.failure, Some(ProbeFailure::Io { .. })));
}

// ── Benchmark ─────────────────────────────────────────────────────

#[tokio::test]
async fn benchmark_runs_three_texts_without_speed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tts"))
        .and(body_partial_json(serde_json::json!({"character": "hutao", "language": "zh"})))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0_u8; 2_048]))
        .expect(3)
        .mount(&server)
        .await;

    let t = tester(quick_config(server.uri()));
    let report = t.benchmark().await;

    assert_eq!(report.samples.len(), 3);
    assert!(report.samples.iter().all(|s| s.success));
    assert!(report.samples.iter().all(|s| s.audio_size == Some(2_048)));
    assert!((report.success_rate - 100.0).abs() < f64::EPSILON);
    assert!(report.avg_duration.is_some());

    let requests = server.received_requests().await.unwrap_or_default();
    for req in &requests {
        let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap_or_default();
        assert!(body.get("speed").is_none(), "benchmark body: {body}");
    }
}

#[tokio::test]
async fn benchmark_records_http_errors_with_duration() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tts"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let t = tester(quick_config(server.uri()));
    let report = t.benchmark().await;

    assert_eq!(report.success_rate, 0.0);
    assert_eq!(report.avg_duration, None);
    assert!(!report.passed());
    for sample in &report.samples {
        assert_eq!(sample.error.as_deref(), Some("HTTP 500"));
        assert!(sample.duration.is_some());
    }
}

#[tokio::test]
async fn benchmark_timeout_has_no_duration() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tts"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(1_500)))
        .mount(&server)
        .await;

    let t = tester(quick_config(server.uri()).with_benchmark_timeout_secs(1));
    let report = t.benchmark().await;

    for sample in &report.samples {
        assert!(!sample.success);
        assert_eq!(sample.error.as_deref(), Some("Timeout"));
        assert_eq!(sample.duration, None);
    }
}

// ── Full suite ────────────────────────────────────────────────────

#[tokio::test]
async fn suite_stops_when_service_never_ready() {
    let server = MockServer::start().await;
    mount_get(&server, "/health", ResponseTemplate::new(503)).await;

    let config = quick_config(server.uri()).with_max_wait_secs(0);
    let report = tester(config).run_suite().await;
    assert!(!report.service_ready);
    assert!(report.probes.is_empty());
    assert!(!report.succeeded());
}

#[tokio::test]
async fn suite_runs_probes_in_order() {
    let server = MockServer::start().await;
    mount_get(&server, "/health", ResponseTemplate::new(200)).await;
    mount_get(&server, "/", ResponseTemplate::new(200)).await;
    mount_get(
        &server,
        "/characters",
        ResponseTemplate::new(200).set_body_json(serde_json::json!(["hutao"])),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/tts"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "audio/wav")
                .set_body_bytes(vec![0_u8; 32]),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let t = tester(quick_config(server.uri()).with_output_path(dir.path().join("out.wav")));
    let report = t.run_suite().await;

    let names: Vec<&str> = report.probes.iter().map(|p| p.test_name.as_str()).collect();
    assert_eq!(
        names,
        ["health check", "API info", "character list", "TTS synthesis"]
    );
    assert_eq!(report.score(), 4.5);
    assert!(report.succeeded());
}
