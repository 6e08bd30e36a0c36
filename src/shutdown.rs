//! OS shutdown signals
//!
//! The listener thread spends its life blocked on stdin, so signals are
//! watched on a separate thread with a small current-thread runtime. On
//! SIGTERM or SIGINT the diagnostics are flushed and the process exits.

use std::thread;

use eyre::{Context, Result};
use tokio::signal::unix::{SignalKind, signal};

/// Start the watcher thread. Exits the process with status 0 on signal.
pub fn spawn_signal_watcher() -> Result<thread::JoinHandle<()>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .build()
        .context("Failed to create signal runtime")?;

    thread::Builder::new()
        .name("signal-watcher".to_string())
        .spawn(move || {
            let received = runtime.block_on(wait_for_signal());
            match received {
                Ok(name) => log::info!("Received {}, shutting down", name),
                Err(e) => {
                    log::warn!("Signal watcher failed: {}", e);
                    return;
                }
            }
            log::logger().flush();
            std::process::exit(0);
        })
        .context("Failed to spawn signal watcher")
}

async fn wait_for_signal() -> std::io::Result<&'static str> {
    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = terminate.recv() => Ok("SIGTERM"),
        _ = interrupt.recv() => Ok("SIGINT"),
    }
}
