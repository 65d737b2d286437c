//! Spawning character servers and forwarding their output.

use super::process::ProcessHandle;
use super::profile::{CharacterProfile, LaunchCommand};
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

/// Starts a child process for a character.
pub trait Launcher: Send + Sync {
    /// Spawns `command` on behalf of `profile`.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the process could not be created.
    fn launch(
        &self,
        profile: &CharacterProfile,
        command: &LaunchCommand,
    ) -> io::Result<Box<dyn ProcessHandle>>;
}

/// Launches real OS processes with captured stdout/stderr.
///
/// Captured lines are re-emitted as `tracing` events tagged with the
/// character name, which also keeps the pipes drained.
#[derive(Debug, Clone, Default)]
pub struct CommandLauncher {
    working_dir: Option<PathBuf>,
}

impl CommandLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run children in `dir` instead of the current directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

impl Launcher for CommandLauncher {
    fn launch(
        &self,
        profile: &CharacterProfile,
        command: &LaunchCommand,
    ) -> io::Result<Box<dyn ProcessHandle>> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn()?;
        tracing::debug!(
            character = %profile.name,
            pid = ?child.id(),
            command = %command,
            "spawned server process"
        );

        if let Some(stdout) = child.stdout.take() {
            forward_lines(profile.name.clone(), "stdout", stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(profile.name.clone(), "stderr", stderr);
        }
        Ok(Box::new(child))
    }
}

/// Drains `reader` line by line into the log until EOF.
fn forward_lines<R>(character: String, stream: &'static str, reader: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    tracing::info!(target: "sovits_ops::child", character = %character, stream, "{line}");
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(character = %character, stream, error = %e, "stopped reading child output");
                    break;
                }
            }
        }
    });
}
