//! Configuration types for the deployment tester and the character supervisor.

use crate::error::{OpsError, Result};
use crate::supervisor::CharacterProfile;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings for a smoke-test run against one deployed endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TesterConfig {
    /// Base URL of the TTS service (trailing slashes are ignored).
    pub base_url: String,
    /// Maximum time to wait for `/health` before giving up.
    pub max_wait_secs: u64,
    /// Delay between readiness polls.
    pub poll_interval_ms: u64,
    /// Per-request timeout for readiness polls.
    pub health_timeout_secs: u64,
    /// Per-request timeout for functional probes.
    pub request_timeout_secs: u64,
    /// Per-request timeout for benchmark synthesis calls.
    pub benchmark_timeout_secs: u64,
    /// Character used by the synthesis probe and the benchmark.
    pub character: String,
    /// Language code sent with synthesis requests.
    pub language: String,
    /// Speech speed sent with the synthesis probe.
    pub speed: f32,
    /// Where the synthesis probe stores returned audio.
    pub output_path: PathBuf,
    /// Bodies strictly larger than this count as audio regardless of content type.
    pub min_audio_bytes: usize,
}

impl Default for TesterConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9880".to_owned(),
            max_wait_secs: 300,
            poll_interval_ms: 5_000,
            health_timeout_secs: 5,
            request_timeout_secs: 30,
            benchmark_timeout_secs: 60,
            character: "hutao".to_owned(),
            language: "zh".to_owned(),
            speed: 1.0,
            output_path: PathBuf::from("test_output.wav"),
            min_audio_bytes: 1_000,
        }
    }
}

impl TesterConfig {
    /// Create a config for a specific base URL with default timings.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the maximum readiness wait in seconds.
    pub fn with_max_wait_secs(mut self, secs: u64) -> Self {
        self.max_wait_secs = secs;
        self
    }

    /// Set the delay between readiness polls in milliseconds.
    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set the per-request timeout for functional probes.
    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Set the per-request timeout for benchmark calls.
    pub fn with_benchmark_timeout_secs(mut self, secs: u64) -> Self {
        self.benchmark_timeout_secs = secs;
        self
    }

    /// Set the character used for synthesis.
    pub fn with_character(mut self, character: impl Into<String>) -> Self {
        self.character = character.into();
        self
    }

    /// Set the audio output path.
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    /// Base URL without trailing slashes.
    pub fn trimmed_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn benchmark_timeout(&self) -> Duration {
        Duration::from_secs(self.benchmark_timeout_secs)
    }
}

/// How each character's server process is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchSettings {
    /// Interpreter or executable to run.
    pub program: String,
    /// Server entry script; must exist in the working directory.
    pub entry_script: PathBuf,
    /// Reference text language code (`-dl`).
    pub language: String,
    /// Compute device (`-d`).
    pub device: String,
    /// Bind address (`-a`).
    pub bind_address: String,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            program: "python".to_owned(),
            entry_script: PathBuf::from("api.py"),
            language: "zh".to_owned(),
            device: "cuda".to_owned(),
            bind_address: "127.0.0.1".to_owned(),
        }
    }
}

/// Timings used by the supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorTimings {
    /// Delay after spawn before the first liveness check.
    pub grace_period_ms: u64,
    /// Delay after each launch before starting the next character.
    pub launch_delay_ms: u64,
    /// Interval between liveness polls in the monitor loop.
    pub poll_interval_ms: u64,
    /// How long a child may take to exit after a termination request.
    pub shutdown_timeout_ms: u64,
}

impl Default for SupervisorTimings {
    fn default() -> Self {
        Self {
            grace_period_ms: 2_000,
            launch_delay_ms: 3_000,
            poll_interval_ms: 5_000,
            shutdown_timeout_ms: 5_000,
        }
    }
}

impl SupervisorTimings {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn launch_delay(&self) -> Duration {
        Duration::from_millis(self.launch_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

/// Top-level supervisor configuration: launch settings, timings and the roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub launch: LaunchSettings,
    pub timings: SupervisorTimings,
    /// Characters in launch order.
    pub characters: Vec<CharacterProfile>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            launch: LaunchSettings::default(),
            timings: SupervisorTimings::default(),
            characters: default_roster(),
        }
    }
}

impl SupervisorConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| OpsError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| OpsError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check that the roster is non-empty and that names and ports are unique.
    ///
    /// # Errors
    ///
    /// Returns [`OpsError::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.characters.is_empty() {
            return Err(OpsError::Config("character roster is empty".to_owned()));
        }
        let mut names = HashSet::new();
        let mut ports = HashSet::new();
        for profile in &self.characters {
            if !names.insert(profile.name.as_str()) {
                return Err(OpsError::Config(format!(
                    "duplicate character name `{}`",
                    profile.name
                )));
            }
            if !ports.insert(profile.port) {
                return Err(OpsError::Config(format!(
                    "duplicate port {} (character `{}`)",
                    profile.port, profile.name
                )));
            }
        }
        Ok(())
    }
}

/// The three characters shipped with the voice service.
pub fn default_roster() -> Vec<CharacterProfile> {
    vec![
        CharacterProfile {
            name: "Yoimiya".to_owned(),
            display_name: "宵宫".to_owned(),
            port: 5000,
            sovits_path: PathBuf::from("SoVITS_weights_v2/Yoimiya_e8_s96.pth"),
            gpt_path: PathBuf::from("GPT_weights_v2/Yoimiya-e15.ckpt"),
            ref_audio_path: PathBuf::from(
                "yoimiya/reference_audios/中文/emotions/【默认】哇，你做点心的手艺很不一般啊！去祭典上摆摊的话，肯定会成为最热门的那一个吧！.wav",
            ),
            ref_text: "哇，你做点心的手艺很不一般啊！去祭典上摆摊的话，肯定会成为最热门的那一个吧！"
                .to_owned(),
        },
        CharacterProfile {
            name: "Venti".to_owned(),
            display_name: "温迪".to_owned(),
            port: 5001,
            sovits_path: PathBuf::from("SoVITS_weights_v2/Venti_e8_s96.pth"),
            gpt_path: PathBuf::from("GPT_weights_v2/Venti-e15.ckpt"),
            ref_audio_path: PathBuf::from(
                "venti/reference_audios/中文/emotions/【默认】至少她没有否认——大教堂里收藏着天空之琴。.wav",
            ),
            ref_text: "至少她没有否认——大教堂里收藏着天空之琴。".to_owned(),
        },
        CharacterProfile {
            name: "HuTao".to_owned(),
            display_name: "胡桃".to_owned(),
            port: 5002,
            sovits_path: PathBuf::from("SoVITS_weights_v2/Hutao_e8_s120.pth"),
            gpt_path: PathBuf::from("GPT_weights_v2/HuTao-e15.ckpt"),
            ref_audio_path: PathBuf::from(
                "hutao/reference_audios/中文/emotions/【默认】嘿嘿，毕竟找活人不是我擅长的事嘛，如果让我找的是「边界」另一边的人….wav",
            ),
            ref_text: "嘿嘿，毕竟找活人不是我擅长的事嘛，如果让我找的是「边界」另一边的人…."
                .to_owned(),
        },
    ]
}
