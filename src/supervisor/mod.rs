//! Per-character voice service supervision.
//!
//! Each character profile gets its own TTS server process on its own port.
//! [`VoiceServiceManager`] starts them in roster order, watches them, and
//! stops them (terminate, then kill) when asked.

pub mod error;
pub mod launcher;
pub mod manager;
pub mod process;
pub mod profile;

pub use error::SupervisorError;
pub use launcher::{CommandLauncher, Launcher};
pub use manager::{MonitorExit, ShutdownReport, VoiceServiceManager};
pub use process::{ManagedProcess, ProcessHandle, ProcessState, ShutdownOutcome};
pub use profile::{CharacterProfile, LaunchCommand, build_launch_command};
