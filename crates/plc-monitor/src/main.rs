mod bootstrap;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use plc_core::settings::Settings;
use plc_runtime::signals::shutdown_signal;
use plc_runtime::simulator::{default_devices, SimulatedManager};
use plc_runtime::{LifecycleController, ShutdownTrigger};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("plc-monitor: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let settings = Settings::load()?;

    let monitor_dir = bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;
    bootstrap::install_panic_hook();

    tracing::info!("PLC Monitor v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::debug!(dir = %monitor_dir.display(), "state directory ready");

    let devices = if settings.devices.is_empty() {
        default_devices()
    } else {
        settings.devices.clone()
    };
    tracing::info!(
        devices = devices.len(),
        poll_interval_ms = settings.poll_interval,
        "using simulated manager"
    );
    let manager = Arc::new(SimulatedManager::new(
        devices,
        Duration::from_millis(settings.poll_interval),
    ));

    let controller = LifecycleController::new(manager.clone(), settings.orchestrator_config());
    manager.set_fault_reporter(controller.fault_reporter());
    let outcome = controller.run(shutdown_signal()).await?;

    match outcome.trigger {
        ShutdownTrigger::Signal => tracing::info!("PLC Monitor stopped"),
        ShutdownTrigger::Fault(fault) => {
            tracing::warn!(fault = %fault, "PLC Monitor stopped after an unhandled fault")
        }
    }
    Ok(())
}
