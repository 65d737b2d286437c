//! Post-deployment smoke testing of a GPT-SoVITS TTS service.
//!
//! [`DeploymentTester`] waits for `/health`, probes the info, character list
//! and synthesis endpoints, times a short benchmark, and scores the run in a
//! [`SuiteReport`].

pub mod benchmark;
pub mod probe;
pub mod service;
pub mod suite;

#[cfg(test)]
mod service_tests;

pub use benchmark::{BENCHMARK_TEXTS, BenchmarkReport, PerformanceSample};
pub use probe::{ProbeFailure, ProbeResult, is_audio_response};
pub use service::{DeploymentTester, PROBE_TEXT};
pub use suite::{PASS_THRESHOLD_PERCENT, SuiteReport};
