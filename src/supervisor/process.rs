//! Lifecycle of a single character server process.
//!
//! ```text
//! Spawned ──grace check──▶ Live ──poll sees exit──▶ Dead
//!    │                      │
//!    ▼                      ▼ shutdown requested
//! DeadOnArrival         Terminating ──exited in time──▶ Terminated
//!                           │
//!                           └──timeout──▶ Killed
//! ```

use super::error::SupervisorError;
use super::profile::CharacterProfile;
use async_trait::async_trait;
use std::fmt;
use std::io;
use std::process::ExitStatus;
use std::time::Duration;

/// Lifecycle states of a [`ManagedProcess`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Spawned; the grace-period check has not run yet.
    Spawned,
    /// Survived the grace period and is being monitored.
    Live,
    /// Exited before the grace period elapsed.
    DeadOnArrival,
    /// Exited on its own while being monitored.
    Dead,
    /// Termination was requested and the supervisor is waiting for exit.
    Terminating,
    /// Exited after a termination request.
    Terminated,
    /// Forcefully killed after the termination timeout.
    Killed,
}

impl ProcessState {
    /// Returns `true` if no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::DeadOnArrival | Self::Dead | Self::Terminated | Self::Killed
        )
    }

    /// Returns `true` if a transition from `self` to `target` is valid.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Spawned, Self::Live)
                | (Self::Spawned, Self::DeadOnArrival)
                | (Self::Live, Self::Dead)
                | (Self::Live, Self::Terminating)
                | (Self::Terminating, Self::Terminated)
                | (Self::Terminating, Self::Killed)
        )
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Spawned => "spawned",
            Self::Live => "live",
            Self::DeadOnArrival => "dead-on-arrival",
            Self::Dead => "dead",
            Self::Terminating => "terminating",
            Self::Terminated => "terminated",
            Self::Killed => "killed",
        };
        f.write_str(label)
    }
}

/// OS-level control over a spawned child.
///
/// Implemented for [`tokio::process::Child`]; tests substitute fakes.
#[async_trait]
pub trait ProcessHandle: Send {
    /// OS process id, or `None` once the child has been reaped.
    fn id(&self) -> Option<u32>;

    /// Non-blocking exit check.
    fn try_wait(&mut self) -> io::Result<Option<ExitStatus>>;

    /// Ask the child to exit (SIGTERM on Unix).
    fn request_termination(&mut self) -> io::Result<()>;

    /// Forcefully kill the child without waiting.
    fn start_kill(&mut self) -> io::Result<()>;

    /// Wait for the child to exit and reap it.
    async fn wait(&mut self) -> io::Result<ExitStatus>;
}

#[async_trait]
impl ProcessHandle for tokio::process::Child {
    fn id(&self) -> Option<u32> {
        tokio::process::Child::id(self)
    }

    fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        tokio::process::Child::try_wait(self)
    }

    #[cfg(unix)]
    fn request_termination(&mut self) -> io::Result<()> {
        let pid = tokio::process::Child::id(self)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "process already reaped"))?;
        let pid = libc::pid_t::try_from(pid)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        // SAFETY: plain signal delivery to a pid we own and have not reaped.
        let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(not(unix))]
    fn request_termination(&mut self) -> io::Result<()> {
        tokio::process::Child::start_kill(self)
    }

    fn start_kill(&mut self) -> io::Result<()> {
        tokio::process::Child::start_kill(self)
    }

    async fn wait(&mut self) -> io::Result<ExitStatus> {
        tokio::process::Child::wait(self).await
    }
}

/// How a shutdown request ended for one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The process had already exited; nothing was sent.
    AlreadyExited,
    /// The process exited after the termination request.
    Terminated,
    /// The process ignored the request and was killed.
    Killed,
}

/// A character server under supervision.
///
/// Any child still running when this value is dropped is killed.
pub struct ManagedProcess {
    profile: CharacterProfile,
    handle: Box<dyn ProcessHandle>,
    state: ProcessState,
    exit_code: Option<i32>,
}

impl ManagedProcess {
    /// Wraps a freshly spawned child in the `Spawned` state.
    pub fn new(profile: CharacterProfile, handle: Box<dyn ProcessHandle>) -> Self {
        Self {
            profile,
            handle,
            state: ProcessState::Spawned,
            exit_code: None,
        }
    }

    pub fn profile(&self) -> &CharacterProfile {
        &self.profile
    }

    pub fn name(&self) -> &str {
        &self.profile.name
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Exit code recorded when the process was seen to exit.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn pid(&self) -> Option<u32> {
        self.handle.id()
    }

    fn transition(&mut self, target: ProcessState) -> Result<(), SupervisorError> {
        if !self.state.can_transition_to(target) {
            return Err(SupervisorError::InvalidTransition {
                character: self.profile.name.clone(),
                from: self.state.to_string(),
                to: target.to_string(),
            });
        }
        tracing::debug!(
            character = %self.profile.name,
            from = %self.state,
            to = %target,
            "process state transition"
        );
        self.state = target;
        Ok(())
    }

    /// Returns `Some(exit_code)` if the child has exited.
    ///
    /// A failed exit check is treated as an exit: the child can no longer
    /// be observed, so it cannot be supervised either.
    fn poll_exit(&mut self) -> Option<Option<i32>> {
        match self.handle.try_wait() {
            Ok(Some(status)) => Some(status.code()),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(
                    character = %self.profile.name,
                    error = %e,
                    "liveness check failed, treating process as exited"
                );
                Some(None)
            }
        }
    }

    /// Runs the post-grace liveness check: `Spawned → Live | DeadOnArrival`.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::ExitedDuringGrace`] if the child already exited.
    pub fn confirm_started(&mut self) -> Result<(), SupervisorError> {
        match self.poll_exit() {
            None => self.transition(ProcessState::Live),
            Some(code) => {
                self.exit_code = code;
                self.transition(ProcessState::DeadOnArrival)?;
                Err(SupervisorError::ExitedDuringGrace {
                    character: self.profile.name.clone(),
                    exit_code: code,
                })
            }
        }
    }

    /// Re-checks a live process, moving it to `Dead` if it has exited.
    ///
    /// Returns `true` while the process is still live.
    pub fn check_alive(&mut self) -> bool {
        if self.state != ProcessState::Live {
            return false;
        }
        match self.poll_exit() {
            None => true,
            Some(code) => {
                self.exit_code = code;
                self.state = ProcessState::Dead;
                false
            }
        }
    }

    /// Requests termination, waits up to `timeout`, then kills exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Control`] if the child could neither be
    /// terminated nor killed.
    pub async fn shutdown(&mut self, timeout: Duration) -> Result<ShutdownOutcome, SupervisorError> {
        if !self.check_alive() {
            return Ok(ShutdownOutcome::AlreadyExited);
        }
        self.transition(ProcessState::Terminating)?;

        if let Err(e) = self.handle.request_termination() {
            tracing::warn!(
                character = %self.profile.name,
                error = %e,
                "termination request failed, killing"
            );
            return self.escalate(timeout).await;
        }

        match tokio::time::timeout(timeout, self.handle.wait()).await {
            Ok(Ok(status)) => {
                self.exit_code = status.code();
                self.transition(ProcessState::Terminated)?;
                Ok(ShutdownOutcome::Terminated)
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    character = %self.profile.name,
                    error = %e,
                    "waiting for exit failed, killing"
                );
                self.escalate(timeout).await
            }
            Err(_) => {
                tracing::warn!(
                    character = %self.profile.name,
                    ?timeout,
                    "termination timed out, killing"
                );
                self.escalate(timeout).await
            }
        }
    }

    /// Sends the one and only kill. The state becomes `Killed` even if the
    /// kill fails, so `Drop` never signals again.
    async fn escalate(&mut self, timeout: Duration) -> Result<ShutdownOutcome, SupervisorError> {
        self.transition(ProcessState::Killed)?;
        self.handle
            .start_kill()
            .map_err(|source| self.control_error(source))?;
        match tokio::time::timeout(timeout, self.handle.wait()).await {
            Ok(Ok(status)) => self.exit_code = status.code(),
            Ok(Err(e)) => {
                tracing::warn!(character = %self.profile.name, error = %e, "failed to reap killed process");
            }
            Err(_) => {
                tracing::warn!(character = %self.profile.name, "killed process not reaped in time");
            }
        }
        Ok(ShutdownOutcome::Killed)
    }

    fn control_error(&self, source: io::Error) -> SupervisorError {
        SupervisorError::Control {
            character: self.profile.name.clone(),
            source,
        }
    }
}

impl Drop for ManagedProcess {
    fn drop(&mut self) {
        if !self.state.is_terminal() {
            let _ = self.handle.start_kill();
            tracing::debug!(character = %self.profile.name, "killed server process on drop");
        }
    }
}

impl fmt::Debug for ManagedProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedProcess")
            .field("character", &self.profile.name)
            .field("port", &self.profile.port)
            .field("state", &self.state)
            .field("exit_code", &self.exit_code)
            .finish()
    }
}
