//! Error types for the deployment tools.

use crate::supervisor::SupervisorError;

/// Top-level error type for the tester and the character supervisor.
#[derive(Debug, thiserror::Error)]
pub enum OpsError {
    /// Configuration could not be loaded or is inconsistent.
    #[error("config error: {0}")]
    Config(String),

    /// A required file or environment condition is missing.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// The HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    Http(String),

    /// Process supervision error.
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, OpsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_config() {
        let err = OpsError::Config("duplicate port 5000".to_owned());
        assert_eq!(err.to_string(), "config error: duplicate port 5000");
    }

    #[test]
    fn display_precondition() {
        let err = OpsError::Precondition("api.py not found".to_owned());
        assert!(err.to_string().contains("api.py not found"));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: OpsError = io.into();
        assert!(matches!(err, OpsError::Io(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn supervisor_error_is_transparent() {
        let err: OpsError = SupervisorError::AlreadyRunning {
            character: "Venti".to_owned(),
        }
        .into();
        assert!(err.to_string().contains("Venti"));
    }
}
