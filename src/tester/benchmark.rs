//! Synthesis latency samples and their aggregation.

use serde::Serialize;
use std::time::Duration;

/// Benchmark inputs, shortest first.
pub const BENCHMARK_TEXTS: [&str; 3] = [
    "短文本测试",
    "这是一个中等长度的文本测试，用于评估系统的处理能力。",
    "这是一个较长的文本测试，包含更多的字符和复杂的语句结构，用于评估系统在处理长文本时的性能表现和稳定性。",
];

/// Measurement of one benchmark synthesis call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSample {
    /// Length of the input text in characters.
    pub text_length: usize,
    /// Round-trip time; absent when the call never got a response.
    pub duration: Option<Duration>,
    /// Response body size in bytes, for successful calls.
    pub audio_size: Option<usize>,
    pub success: bool,
    pub error: Option<String>,
}

impl PerformanceSample {
    pub fn succeeded(text_length: usize, duration: Duration, audio_size: usize) -> Self {
        Self {
            text_length,
            duration: Some(duration),
            audio_size: Some(audio_size),
            success: true,
            error: None,
        }
    }

    pub fn failed(text_length: usize, duration: Option<Duration>, error: impl Into<String>) -> Self {
        Self {
            text_length,
            duration,
            audio_size: None,
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Aggregated benchmark outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkReport {
    pub samples: Vec<PerformanceSample>,
    /// Percentage of successful samples, 0–100.
    pub success_rate: f64,
    /// Mean duration over successful samples; `None` when none succeeded.
    pub avg_duration: Option<Duration>,
}

impl BenchmarkReport {
    pub fn from_samples(samples: Vec<PerformanceSample>) -> Self {
        let successful: Vec<Duration> = samples
            .iter()
            .filter(|s| s.success)
            .filter_map(|s| s.duration)
            .collect();

        let success_count = samples.iter().filter(|s| s.success).count();
        let success_rate = if samples.is_empty() {
            0.0
        } else {
            success_count as f64 / samples.len() as f64 * 100.0
        };

        let avg_duration = u32::try_from(successful.len())
            .ok()
            .filter(|n| *n > 0)
            .map(|n| successful.iter().sum::<Duration>() / n);

        Self {
            samples,
            success_rate,
            avg_duration,
        }
    }

    /// The benchmark earns its half point when anything succeeded.
    pub fn passed(&self) -> bool {
        self.success_rate > 0.0
    }
}
