//! OS termination signals.
//!
//! On Unix, SIGINT, SIGTERM and SIGHUP are handled with `ctrl_c` as a
//! fallback. Elsewhere only `ctrl_c` is awaited.

/// Wait for a termination signal and return its name.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    let name = tokio::select! {
        _ = tokio::signal::ctrl_c() => "SIGINT",
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
        _ = sighup.recv() => "SIGHUP",
    };
    Ok(name)
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}

/// Resolves on the first termination signal.
///
/// If handlers cannot be installed the error is logged and the future never
/// resolves, so the process keeps running until killed.
pub async fn shutdown_signal() {
    match wait_for_shutdown_signal().await {
        Ok(name) => tracing::info!(signal = name, "termination signal received"),
        Err(e) => {
            tracing::error!(error = %e, "failed to install signal handlers");
            std::future::pending::<()>().await;
        }
    }
}
