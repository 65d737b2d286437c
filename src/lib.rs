//! Operator tooling for GPT-SoVITS voice services.
//!
//! Two tools share this crate:
//!
//! - [`tester`]: a post-deployment smoke test that waits for a TTS service,
//!   probes its endpoints, benchmarks synthesis and scores the result.
//! - [`supervisor`]: a manager that runs one TTS server process per voice
//!   character, watches them and shuts them down cleanly.
//!
//! Both binaries (`sovits-deploy-test` and `sovits-characters`) are thin
//! wrappers around these modules.

pub mod config;
pub mod error;
pub mod signal;
pub mod supervisor;
pub mod tester;

pub use config::{LaunchSettings, SupervisorConfig, SupervisorTimings, TesterConfig};
pub use error::{OpsError, Result};
pub use supervisor::{CharacterProfile, ShutdownReport, VoiceServiceManager};
pub use tester::{DeploymentTester, ProbeResult, SuiteReport};
