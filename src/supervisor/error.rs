//! Error types for character process supervision.

/// Errors that can occur while launching or stopping a character server.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// The OS refused to start the process.
    #[error("failed to spawn server for {character}: {source}")]
    SpawnFailed {
        /// Character whose server failed to start.
        character: String,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// The process exited before the grace period elapsed.
    #[error("server for {character} exited during start-up (exit code: {exit_code:?})")]
    ExitedDuringGrace {
        /// Character whose server died.
        character: String,
        /// Exit code, if the process exited normally.
        exit_code: Option<i32>,
    },

    /// The character already has a live process in the table.
    #[error("server for {character} is already running")]
    AlreadyRunning {
        /// Character that was launched twice.
        character: String,
    },

    /// Sending a signal, polling or waiting on the process failed.
    #[error("process control failed for {character}: {source}")]
    Control {
        /// Character whose process could not be controlled.
        character: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// A lifecycle transition that the state machine does not allow.
    #[error("invalid state transition for {character}: {from} → {to}")]
    InvalidTransition {
        /// Character whose process was being transitioned.
        character: String,
        /// State before the attempted transition.
        from: String,
        /// Requested target state.
        to: String,
    },
}
