//! HTTP smoke tests against a deployed TTS service.

use super::benchmark::{BENCHMARK_TEXTS, BenchmarkReport, PerformanceSample};
use super::probe::{ProbeFailure, ProbeResult, classify_reqwest_error, is_audio_response, preview};
use super::suite::SuiteReport;
use crate::config::TesterConfig;
use crate::error::{OpsError, Result};
use reqwest::StatusCode;
use serde_json::json;
use std::time::{Duration, Instant};

/// Sentence sent by the synthesis probe.
pub const PROBE_TEXT: &str = "你好，这是一个测试文本。";

const HEALTH: &str = "health check";
const INFO: &str = "API info";
const CHARACTERS: &str = "character list";
const SYNTHESIS: &str = "TTS synthesis";

/// Runs probes, the benchmark and the full suite against one base URL.
///
/// # Example
///
/// ```rust,no_run
/// use sovits_ops::config::TesterConfig;
/// use sovits_ops::tester::DeploymentTester;
///
/// # async fn example() -> sovits_ops::Result<()> {
/// let tester = DeploymentTester::new(TesterConfig::new("http://localhost:9880"))?;
/// let report = tester.run_suite().await;
/// println!("{}", report.render_summary());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DeploymentTester {
    config: TesterConfig,
    client: reqwest::Client,
}

impl DeploymentTester {
    /// Creates a tester whose requests default to the configured request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`OpsError::Http`] if the HTTP client cannot be built.
    pub fn new(config: TesterConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| OpsError::Http(e.to_string()))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &TesterConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.trimmed_base_url())
    }

    /// Polls `/health` until it answers 200 or `max_wait` elapses.
    ///
    /// Transport errors and non-200 answers mean "not ready yet".
    pub async fn wait_for_service(&self, max_wait: Duration) -> bool {
        tracing::info!(max_wait_secs = max_wait.as_secs(), "waiting for service to start");
        let url = self.url("/health");
        let start = Instant::now();

        while start.elapsed() < max_wait {
            match self
                .client
                .get(&url)
                .timeout(self.config.health_timeout())
                .send()
                .await
            {
                Ok(resp) if resp.status() == StatusCode::OK => {
                    tracing::info!(
                        elapsed_secs = format_args!("{:.1}", start.elapsed().as_secs_f64()),
                        "service is up"
                    );
                    return true;
                }
                Ok(resp) => {
                    tracing::debug!(status = resp.status().as_u16(), "service not ready");
                }
                Err(e) => {
                    tracing::debug!(error = %e, "service not reachable yet");
                }
            }
            tokio::time::sleep(self.config.poll_interval()).await;
        }

        tracing::warn!(max_wait_secs = max_wait.as_secs(), "timed out waiting for service");
        false
    }

    /// GET `/health`; passes on 200.
    pub async fn probe_health(&self) -> ProbeResult {
        self.probe_status(HEALTH, "/health").await
    }

    /// GET `/`; passes on 200.
    pub async fn probe_info(&self) -> ProbeResult {
        self.probe_status(INFO, "/").await
    }

    async fn probe_status(&self, name: &str, path: &str) -> ProbeResult {
        tracing::info!("testing {name} endpoint");
        let result = match self.client.get(self.url(path)).send().await {
            Ok(resp) if resp.status() == StatusCode::OK => ProbeResult::pass(name, "HTTP 200"),
            Ok(resp) => ProbeResult::fail(name, status_failure(resp).await),
            Err(e) => ProbeResult::fail(name, classify_reqwest_error(&e)),
        };
        log_result(&result);
        result
    }

    /// GET `/characters`; passes on 200 with a non-empty JSON array.
    pub async fn probe_character_list(&self) -> ProbeResult {
        tracing::info!("testing {CHARACTERS} endpoint");
        let result = match self.client.get(self.url("/characters")).send().await {
            Ok(resp) if resp.status() == StatusCode::OK => {
                match resp.json::<serde_json::Value>().await {
                    Ok(serde_json::Value::Array(items)) if !items.is_empty() => {
                        for item in items.iter().take(3) {
                            tracing::info!(character = %item, "listed character");
                        }
                        ProbeResult::pass(CHARACTERS, format!("{} characters", items.len()))
                    }
                    Ok(serde_json::Value::Array(_)) => {
                        ProbeResult::fail(CHARACTERS, ProbeFailure::EmptyList)
                    }
                    Ok(other) => ProbeResult::fail(
                        CHARACTERS,
                        ProbeFailure::BadPayload {
                            detail: format!("expected a JSON array, got {}", preview(&other.to_string())),
                        },
                    ),
                    Err(e) => ProbeResult::fail(
                        CHARACTERS,
                        ProbeFailure::BadPayload {
                            detail: e.to_string(),
                        },
                    ),
                }
            }
            Ok(resp) => ProbeResult::fail(CHARACTERS, status_failure(resp).await),
            Err(e) => ProbeResult::fail(CHARACTERS, classify_reqwest_error(&e)),
        };
        log_result(&result);
        result
    }

    /// POST `/tts` and check that audio came back.
    ///
    /// On success the body is written to the configured output path,
    /// replacing any previous file.
    pub async fn probe_synthesis(&self, character: &str) -> ProbeResult {
        tracing::info!(character, "testing TTS synthesis");
        let body = json!({
            "text": PROBE_TEXT,
            "character": character,
            "language": self.config.language,
            "speed": self.config.speed,
        });

        let resp = match self.client.post(self.url("/tts")).json(&body).send().await {
            Ok(resp) => resp,
            Err(e) => return logged(ProbeResult::fail(SYNTHESIS, classify_reqwest_error(&e))),
        };
        if resp.status() != StatusCode::OK {
            return logged(ProbeResult::fail(SYNTHESIS, status_failure(resp).await));
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        let audio = match resp.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return logged(ProbeResult::fail(SYNTHESIS, classify_reqwest_error(&e))),
        };

        if !is_audio_response(&content_type, audio.len(), self.config.min_audio_bytes) {
            return logged(ProbeResult::fail(
                SYNTHESIS,
                ProbeFailure::NotAudio {
                    content_type,
                    size: audio.len(),
                    preview: preview(&String::from_utf8_lossy(&audio)),
                },
            ));
        }

        let path = &self.config.output_path;
        if let Err(e) = tokio::fs::write(path, &audio).await {
            return logged(ProbeResult::fail(
                SYNTHESIS,
                ProbeFailure::Io {
                    detail: format!("{}: {e}", path.display()),
                },
            ));
        }
        logged(ProbeResult::pass(
            SYNTHESIS,
            format!("{} bytes of audio saved to {}", audio.len(), path.display()),
        ))
    }

    /// Times synthesis of [`BENCHMARK_TEXTS`] with the benchmark timeout.
    pub async fn benchmark(&self) -> BenchmarkReport {
        tracing::info!("measuring synthesis performance");
        let mut samples = Vec::with_capacity(BENCHMARK_TEXTS.len());

        for (i, text) in BENCHMARK_TEXTS.iter().enumerate() {
            let text_length = text.chars().count();
            tracing::info!(
                run = i + 1,
                of = BENCHMARK_TEXTS.len(),
                chars = text_length,
                "benchmark request"
            );
            let sample = self.benchmark_one(text, text_length).await;
            match (&sample.error, sample.duration, sample.audio_size) {
                (None, Some(d), Some(size)) => tracing::info!(
                    duration = format_args!("{:.2}s", d.as_secs_f64()),
                    bytes = size,
                    "benchmark request succeeded"
                ),
                (error, _, _) => tracing::warn!(error = ?error, "benchmark request failed"),
            }
            samples.push(sample);
        }

        let report = BenchmarkReport::from_samples(samples);
        match report.avg_duration {
            Some(avg) => tracing::info!(
                average = format_args!("{:.2}s", avg.as_secs_f64()),
                "average response time"
            ),
            None => tracing::warn!("all benchmark requests failed"),
        }
        report
    }

    async fn benchmark_one(&self, text: &str, text_length: usize) -> PerformanceSample {
        let body = json!({
            "text": text,
            "character": self.config.character,
            "language": self.config.language,
        });
        let start = Instant::now();
        let sent = self
            .client
            .post(self.url("/tts"))
            .timeout(self.config.benchmark_timeout())
            .json(&body)
            .send()
            .await;

        let resp = match sent {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => return PerformanceSample::failed(text_length, None, "Timeout"),
            Err(e) => return PerformanceSample::failed(text_length, None, e.to_string()),
        };
        let status = resp.status();
        if status != StatusCode::OK {
            return PerformanceSample::failed(
                text_length,
                Some(start.elapsed()),
                format!("HTTP {}", status.as_u16()),
            );
        }
        match resp.bytes().await {
            Ok(audio) => PerformanceSample::succeeded(text_length, start.elapsed(), audio.len()),
            Err(e) if e.is_timeout() => PerformanceSample::failed(text_length, None, "Timeout"),
            Err(e) => PerformanceSample::failed(text_length, Some(start.elapsed()), e.to_string()),
        }
    }

    /// Waits for readiness, runs the four probes and the benchmark.
    ///
    /// Stops early with [`SuiteReport::not_ready`] if the service never
    /// comes up.
    pub async fn run_suite(&self) -> SuiteReport {
        if !self.wait_for_service(self.config.max_wait()).await {
            return SuiteReport::not_ready();
        }

        tracing::info!("starting functional tests");
        let probes = vec![
            self.probe_health().await,
            self.probe_info().await,
            self.probe_character_list().await,
            self.probe_synthesis(&self.config.character).await,
        ];
        let benchmark = self.benchmark().await;

        SuiteReport {
            service_ready: true,
            probes,
            benchmark: Some(benchmark),
        }
    }
}

/// Builds an [`ProbeFailure::HttpStatus`], preferring a JSON error body.
async fn status_failure(resp: reqwest::Response) -> ProbeFailure {
    let status_code = resp.status().as_u16();
    let text = resp.text().await.unwrap_or_default();
    let body = match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(value) => preview(&value.to_string()),
        Err(_) => preview(&text),
    };
    ProbeFailure::HttpStatus { status_code, body }
}

fn log_result(result: &ProbeResult) {
    if result.passed {
        tracing::info!(test = %result.test_name, "{}", result.detail);
    } else {
        tracing::warn!(test = %result.test_name, "{}", result.detail);
    }
}

fn logged(result: ProbeResult) -> ProbeResult {
    log_result(&result);
    result
}
