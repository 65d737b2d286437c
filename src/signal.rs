//! OS signal futures for the binaries.
//!
//! A listener that cannot be installed is logged and never resolves, so a
//! registration failure is not mistaken for an interrupt.

use std::future::Future;
use std::io;

/// Resolves on Ctrl+C.
pub async fn ctrl_c() {
    listen("Ctrl+C", tokio::signal::ctrl_c()).await;
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        listen("SIGTERM", async {
            let mut stream = signal(SignalKind::terminate())?;
            stream.recv().await;
            Ok::<(), io::Error>(())
        })
        .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c() => {}
        () = terminate => {}
    }
}

/// Awaits `listener`; on error logs it and waits forever.
async fn listen<F>(name: &'static str, listener: F)
where
    F: Future<Output = io::Result<()>>,
{
    if let Err(e) = listener.await {
        tracing::error!(signal = name, error = %e, "failed to listen for signal");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn delivered_signal_resolves() {
        let done = tokio::time::timeout(Duration::from_secs(1), listen("test", async { Ok(()) })).await;
        assert!(done.is_ok());
    }

    #[tokio::test]
    async fn failed_registration_never_resolves() {
        let listener = async { Err(io::Error::other("no signal handler")) };
        let done = tokio::time::timeout(Duration::from_millis(100), listen("test", listener)).await;
        assert!(done.is_err(), "a failed listener must not look like an interrupt");
    }
}
