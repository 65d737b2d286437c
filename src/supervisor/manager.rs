//! Supervisor that runs one server process per character.
//!
//! The manager owns the roster (via [`SupervisorConfig`]) and the process
//! table. Characters are launched and polled in roster order; cancellation
//! arrives through a [`CancellationToken`] and shutdown is an explicit call.

use super::error::SupervisorError;
use super::launcher::{CommandLauncher, Launcher};
use super::process::{ManagedProcess, ShutdownOutcome};
use super::profile::{CharacterProfile, LaunchCommand, build_launch_command};
use crate::config::SupervisorConfig;
use crate::error::{OpsError, Result};
use std::fmt::Write as _;
use tokio_util::sync::CancellationToken;

/// Why [`VoiceServiceManager::monitor`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    /// Every supervised process exited on its own.
    AllStopped,
    /// The cancellation token fired.
    Cancelled,
}

/// Per-character results of [`VoiceServiceManager::shutdown_all`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    pub terminated: Vec<String>,
    pub killed: Vec<String>,
    pub already_exited: Vec<String>,
    /// Characters whose shutdown failed, with the error message.
    pub failed: Vec<(String, String)>,
}

impl ShutdownReport {
    /// Number of processes the shutdown pass looked at.
    pub fn total(&self) -> usize {
        self.terminated.len() + self.killed.len() + self.already_exited.len() + self.failed.len()
    }

    /// `true` when no shutdown reported an error.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Launches, monitors and stops the character servers.
pub struct VoiceServiceManager {
    config: SupervisorConfig,
    launcher: Box<dyn Launcher>,
    processes: Vec<ManagedProcess>,
}

impl VoiceServiceManager {
    /// Creates a manager that spawns real processes.
    pub fn new(config: SupervisorConfig) -> Self {
        Self::with_launcher(config, Box::new(CommandLauncher::new()))
    }

    /// Creates a manager with a custom launcher.
    pub fn with_launcher(config: SupervisorConfig, launcher: Box<dyn Launcher>) -> Self {
        Self {
            config,
            launcher,
            processes: Vec::new(),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Processes currently in the table, in launch order.
    pub fn processes(&self) -> &[ManagedProcess] {
        &self.processes
    }

    /// Looks up a supervised process by character name.
    pub fn get(&self, name: &str) -> Option<&ManagedProcess> {
        self.processes.iter().find(|p| p.name() == name)
    }

    /// Checks that the server entry script exists.
    ///
    /// # Errors
    ///
    /// Returns [`OpsError::Precondition`] if the file is missing.
    pub fn check_entry_script(&self) -> Result<()> {
        let script = &self.config.launch.entry_script;
        if script.is_file() {
            Ok(())
        } else {
            Err(OpsError::Precondition(format!(
                "cannot find {}; run from the GPT-SoVITS project root",
                script.display()
            )))
        }
    }

    /// Command line for `profile` under the configured launch settings.
    pub fn launch_command(&self, profile: &CharacterProfile) -> LaunchCommand {
        build_launch_command(&self.config.launch, profile)
    }

    /// Spawns one character and runs the grace-period liveness check.
    ///
    /// If `cancel` fires during the grace period the check runs at once, so
    /// a live child is still returned and can be shut down normally. The
    /// returned process is not added to the table.
    ///
    /// # Errors
    ///
    /// - [`SupervisorError::AlreadyRunning`] if the character is in the table.
    /// - [`SupervisorError::SpawnFailed`] if the OS refused the launch.
    /// - [`SupervisorError::ExitedDuringGrace`] if the child died during the grace period.
    pub async fn spawn(
        &self,
        profile: &CharacterProfile,
        cancel: &CancellationToken,
    ) -> std::result::Result<ManagedProcess, SupervisorError> {
        if self.get(&profile.name).is_some() {
            return Err(SupervisorError::AlreadyRunning {
                character: profile.name.clone(),
            });
        }

        tracing::info!(
            character = %profile.name,
            port = profile.port,
            "starting {profile} API service"
        );
        let command = self.launch_command(profile);
        let handle =
            self.launcher
                .launch(profile, &command)
                .map_err(|source| SupervisorError::SpawnFailed {
                    character: profile.name.clone(),
                    source,
                })?;

        let mut process = ManagedProcess::new(profile.clone(), handle);
        tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!(character = %profile.name, "grace period cut short by cancellation");
            }
            () = tokio::time::sleep(self.config.timings.grace_period()) => {}
        }
        process.confirm_started()?;
        Ok(process)
    }

    /// Launches every character in roster order.
    ///
    /// Failures are logged and skipped. Stops launching early if `cancel`
    /// fires. Returns the number of live processes.
    pub async fn start_all(&mut self, cancel: &CancellationToken) -> usize {
        let roster = self.config.characters.clone();
        let delay = self.config.timings.launch_delay();

        for (index, profile) in roster.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::warn!("start-up interrupted, not launching remaining characters");
                break;
            }

            match self.spawn(profile, cancel).await {
                Ok(process) => {
                    tracing::info!(character = %profile.name, pid = ?process.pid(), "{profile} service started");
                    self.processes.push(process);
                }
                Err(e) => {
                    tracing::error!(character = %profile.name, error = %e, "{profile} service failed to start");
                }
            }

            if index + 1 < roster.len() {
                tokio::select! {
                    () = cancel.cancelled() => {
                        tracing::warn!("start-up interrupted, not launching remaining characters");
                        break;
                    }
                    () = tokio::time::sleep(delay) => {}
                }
            }
        }

        self.processes.len()
    }

    /// Re-checks every process once, dropping the ones that exited.
    ///
    /// Returns the names of the characters that stopped.
    pub fn poll_once(&mut self) -> Vec<String> {
        let mut stopped = Vec::new();
        self.processes.retain_mut(|process| {
            if process.check_alive() {
                return true;
            }
            tracing::warn!(
                character = %process.name(),
                exit_code = ?process.exit_code(),
                "{} service stopped",
                process.profile()
            );
            stopped.push(process.name().to_owned());
            false
        });
        stopped
    }

    /// Polls liveness until every process exits or `cancel` fires.
    pub async fn monitor(&mut self, cancel: &CancellationToken) -> MonitorExit {
        tracing::info!(
            processes = self.processes.len(),
            "monitoring service status (Ctrl+C to stop)"
        );
        let interval = self.config.timings.poll_interval();
        loop {
            self.poll_once();
            if self.processes.is_empty() {
                tracing::warn!("all services have stopped");
                return MonitorExit::AllStopped;
            }
            tokio::select! {
                biased;
                () = cancel.cancelled() => return MonitorExit::Cancelled,
                () = tokio::time::sleep(interval) => {}
            }
        }
    }

    /// Stops every process still in the table.
    ///
    /// Each process gets a termination request, then a kill after the
    /// shutdown timeout. Errors are logged per process and never stop the
    /// pass. The table is empty afterwards, so a second call does nothing.
    pub async fn shutdown_all(&mut self) -> ShutdownReport {
        let timeout = self.config.timings.shutdown_timeout();
        let mut report = ShutdownReport::default();

        for mut process in self.processes.drain(..) {
            let name = process.name().to_owned();
            tracing::info!(character = %name, "stopping {} service", process.profile());
            match process.shutdown(timeout).await {
                Ok(ShutdownOutcome::Terminated) => report.terminated.push(name),
                Ok(ShutdownOutcome::Killed) => {
                    tracing::warn!(character = %name, "force-killed {} service", process.profile());
                    report.killed.push(name);
                }
                Ok(ShutdownOutcome::AlreadyExited) => report.already_exited.push(name),
                Err(e) => {
                    tracing::error!(character = %name, error = %e, "failed to stop service");
                    report.failed.push((name, e.to_string()));
                }
            }
        }

        tracing::info!(
            terminated = report.terminated.len(),
            killed = report.killed.len(),
            failed = report.failed.len(),
            "all services stopped"
        );
        report
    }

    /// Human-readable list of service and streaming endpoints for the
    /// characters that are running.
    pub fn endpoint_directory(&self) -> String {
        let bind = &self.config.launch.bind_address;
        let mut out = String::new();
        let _ = writeln!(out, "Service endpoints:");
        for process in &self.processes {
            let profile = process.profile();
            let _ = writeln!(out, "  - {profile}: {}", profile.base_url(bind));
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "Streaming audio endpoints:");
        for process in &self.processes {
            let profile = process.profile();
            let _ = writeln!(
                out,
                "  - {}: {}",
                profile.display_name,
                profile.stream_url(bind)
            );
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "Usage:");
        let _ = writeln!(out, "  - Press Ctrl+C to stop all services");
        let _ = writeln!(out, "  - Service logs are shown below");
        out
    }
}

impl std::fmt::Debug for VoiceServiceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceServiceManager")
            .field("characters", &self.config.characters.len())
            .field("processes", &self.processes)
            .finish()
    }
}
