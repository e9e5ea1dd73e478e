//! Periodic status reporting.
//!
//! [`PeriodicReporter::start`] spawns a task that fires once per period,
//! first firing one full period after start. A firing reads the Manager's
//! aggregate status and current data, folds them into a [`StatusReport`] and
//! logs it. Firings run inline on the reporter task so they can never
//! overlap; boundaries missed while a firing runs long are skipped.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use plc_core::error::ManagerError;
use plc_core::formatting::{format_count, format_percent, format_uptime};
use plc_core::manager::ManagerFacade;
use plc_core::models::{DeviceSnapshot, SystemStatus};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::supervise::{spawn_supervised, FaultReporter};

// ── StatusReport ──────────────────────────────────────────────────────────────

/// Summary produced by one firing.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    /// Devices whose current snapshot reports `connected`.
    pub connected_devices: usize,
    /// Devices present in the current data snapshot.
    pub total_devices: usize,
    /// Tag readings across connected devices.
    pub live_points: usize,
    pub points_logged: u64,
    pub alarms_generated: u64,
    pub uptime_seconds: u64,
    pub success_rate_percent: f64,
}

impl StatusReport {
    /// Fold the status snapshot and the current data into a report.
    pub fn summarize(status: &SystemStatus, data: &BTreeMap<String, DeviceSnapshot>) -> Self {
        let (connected_devices, live_points) = data
            .values()
            .filter(|snapshot| snapshot.connected)
            .fold((0, 0), |(devices, points), snapshot| {
                (devices + 1, points + snapshot.point_count())
            });

        Self {
            connected_devices,
            total_devices: data.len(),
            live_points,
            points_logged: status.data.points_logged,
            alarms_generated: status.data.alarms_generated,
            uptime_seconds: status.system.uptime_seconds,
            success_rate_percent: status.connections.success_rate_percent,
        }
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} devices connected | {} live points | {} points logged | {} alarms | uptime {} | success rate {}",
            self.connected_devices,
            self.total_devices,
            format_count(self.live_points as u64),
            format_count(self.points_logged),
            format_count(self.alarms_generated),
            format_uptime(self.uptime_seconds),
            format_percent(self.success_rate_percent),
        )
    }
}

// ── PeriodicReporter ──────────────────────────────────────────────────────────

/// Shortest accepted period; `tokio::time::interval` rejects zero.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Builder for the reporting task.
pub struct PeriodicReporter {
    manager: Arc<dyn ManagerFacade>,
    interval: Duration,
    faults: Option<FaultReporter>,
}

impl PeriodicReporter {
    pub fn new(manager: Arc<dyn ManagerFacade>, interval: Duration) -> Self {
        if interval < MIN_INTERVAL {
            tracing::warn!(
                interval_ms = interval.as_millis() as u64,
                "report interval below 1 ms; using 1 ms"
            );
        }
        Self {
            manager,
            interval: interval.max(MIN_INTERVAL),
            faults: None,
        }
    }

    /// Report a panic inside the reporting task as an unhandled fault.
    pub fn with_faults(mut self, faults: FaultReporter) -> Self {
        self.faults = Some(faults);
        self
    }

    /// Spawn the reporting task. The first firing happens one `interval`
    /// from now.
    pub fn start(self) -> ReporterHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let stats = Arc::new(ReporterStats::default());
        let fut = reporting_loop(self.manager, self.interval, stats.clone(), stop_rx);

        let task = match self.faults {
            Some(faults) => spawn_supervised("periodic-reporter", fut, faults),
            None => tokio::spawn(fut),
        };
        tracing::debug!(interval_ms = self.interval.as_millis() as u64, "periodic reporter started");

        ReporterHandle {
            stop_tx,
            task,
            stats,
        }
    }
}

#[derive(Default)]
struct ReporterStats {
    firings: AtomicU64,
    failures: AtomicU64,
    in_flight: AtomicBool,
    last_report: Mutex<Option<StatusReport>>,
}

async fn reporting_loop(
    manager: Arc<dyn ManagerFacade>,
    interval: Duration,
    stats: Arc<ReporterStats>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            // A dropped handle also ends the loop.
            _ = stop_rx.changed() => break,
            _ = ticker.tick() => {}
        }
        if *stop_rx.borrow() {
            break;
        }

        stats.in_flight.store(true, Ordering::SeqCst);
        let result = fire(manager.as_ref());
        stats.in_flight.store(false, Ordering::SeqCst);
        stats.firings.fetch_add(1, Ordering::SeqCst);

        match result {
            Ok(report) => {
                tracing::info!("status report: {report}");
                if let Ok(mut last) = stats.last_report.lock() {
                    *last = Some(report);
                }
            }
            Err(e) => {
                stats.failures.fetch_add(1, Ordering::SeqCst);
                tracing::warn!(error = %e, "status report failed");
            }
        }
    }
    tracing::debug!("periodic reporter stopped");
}

fn fire(manager: &dyn ManagerFacade) -> Result<StatusReport, ManagerError> {
    let status = manager.system_status()?;
    let data = manager.all_data()?;
    Ok(StatusReport::summarize(&status, &data))
}

// ── ReporterHandle ────────────────────────────────────────────────────────────

/// How [`ReporterHandle::stop`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The task exited, after finishing any in-flight firing.
    Completed,
    /// The in-flight firing outlived the timeout; the task was aborted.
    TimedOut,
}

/// Ownership token for the running reporter task.
pub struct ReporterHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
    stats: Arc<ReporterStats>,
}

impl ReporterHandle {
    /// Firings so far, successful or not.
    pub fn firings(&self) -> u64 {
        self.stats.firings.load(Ordering::SeqCst)
    }

    /// Firings that failed.
    pub fn failures(&self) -> u64 {
        self.stats.failures.load(Ordering::SeqCst)
    }

    /// `true` while a firing is executing.
    pub fn is_firing(&self) -> bool {
        self.stats.in_flight.load(Ordering::SeqCst)
    }

    pub fn last_report(&self) -> Option<StatusReport> {
        self.stats.last_report.lock().ok().and_then(|r| r.clone())
    }

    /// Cancel future firings and wait up to `timeout` for an in-flight one.
    pub async fn stop(self, timeout: Duration) -> StopOutcome {
        if self.is_firing() {
            tracing::info!("waiting for in-flight status report");
        }
        let _ = self.stop_tx.send(true);

        let mut task = self.task;
        match time::timeout(timeout, &mut task).await {
            Ok(Ok(())) => StopOutcome::Completed,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "periodic reporter task ended abnormally");
                StopOutcome::Completed
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "periodic reporter did not stop in time; aborting"
                );
                task.abort();
                StopOutcome::TimedOut
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
