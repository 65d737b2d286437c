//! Suite scoring and the final summary.

use super::benchmark::BenchmarkReport;
use super::probe::ProbeResult;
use std::fmt::Write as _;

/// Number of functional probes; the suite total.
pub const FUNCTIONAL_PROBES: usize = 4;
/// Score contributed by a benchmark with at least one success.
pub const BENCHMARK_WEIGHT: f64 = 0.5;
/// Minimum pass rate, in percent, for the deployment to count as healthy.
pub const PASS_THRESHOLD_PERCENT: f64 = 80.0;

/// Everything a suite run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SuiteReport {
    /// Whether `/health` came up before the deadline.
    pub service_ready: bool,
    pub probes: Vec<ProbeResult>,
    pub benchmark: Option<BenchmarkReport>,
}

impl SuiteReport {
    /// Report for a service that never became ready.
    pub fn not_ready() -> Self {
        Self {
            service_ready: false,
            probes: Vec::new(),
            benchmark: None,
        }
    }

    /// Passed probes plus the benchmark's half point.
    pub fn score(&self) -> f64 {
        let probes = self.probes.iter().filter(|p| p.passed).count() as f64;
        let bench = match &self.benchmark {
            Some(b) if b.passed() => BENCHMARK_WEIGHT,
            _ => 0.0,
        };
        probes + bench
    }

    pub fn total(&self) -> usize {
        FUNCTIONAL_PROBES
    }

    /// Score as a percentage of [`FUNCTIONAL_PROBES`].
    pub fn pass_rate(&self) -> f64 {
        self.score() / self.total() as f64 * 100.0
    }

    /// `true` when the service came up and the pass rate reaches the threshold.
    pub fn succeeded(&self) -> bool {
        self.service_ready && self.pass_rate() >= PASS_THRESHOLD_PERCENT
    }

    /// Multi-line summary for the terminal.
    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        let rule = "=".repeat(50);
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "Test summary");
        let _ = writeln!(out, "{rule}");

        if !self.service_ready {
            let _ = writeln!(out, "FAILED: service did not become ready");
            return out;
        }

        for probe in &self.probes {
            let _ = writeln!(out, "{probe}");
        }
        if let Some(bench) = &self.benchmark {
            let avg = bench
                .avg_duration
                .map_or_else(|| "n/a".to_owned(), |d| format!("{:.2}s", d.as_secs_f64()));
            let _ = writeln!(
                out,
                "[{}] performance: {:.0}% succeeded, average {avg}",
                if bench.passed() { "PASS" } else { "FAIL" },
                bench.success_rate
            );
        }

        let verdict = if self.succeeded() { "PASSED" } else { "FAILED" };
        let _ = writeln!(
            out,
            "{verdict}: {}/{} ({:.1}%)",
            self.score(),
            self.total(),
            self.pass_rate()
        );
        if self.succeeded() {
            let _ = writeln!(out, "Deployment OK, service is working");
        } else {
            let _ = writeln!(out, "Deployment may have problems, check the server logs");
        }
        out
    }
}
