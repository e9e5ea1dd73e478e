//! One-shot, best-effort walk through the Manager's read-only API.
//!
//! [`DemonstrationRunner::run`] executes the steps of [`DemoStep::SEQUENCE`]
//! in order. Every step is independent: a failure is captured in that step's
//! [`StepReport`] and the next step still runs. Empty history and alarm
//! results are ordinary outcomes, not failures.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use plc_core::formatting::{format_count, format_percent, format_tag_value, format_uptime, with_units};
use plc_core::manager::ManagerFacade;
use plc_core::models::{AlarmFilter, DeviceConfig, HistoryFilter, TagConfig, TagDataType};
use plc_core::settings::DemonstrationConfig;

// ── Public types ──────────────────────────────────────────────────────────────

/// One step of the demonstration sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoStep {
    SystemStatus,
    DeviceStatuses,
    CurrentData,
    ConfigurationExample,
    HistoricalData,
    AlarmHistory,
}

impl DemoStep {
    /// Fixed execution order.
    pub const SEQUENCE: [DemoStep; 6] = [
        DemoStep::SystemStatus,
        DemoStep::DeviceStatuses,
        DemoStep::CurrentData,
        DemoStep::ConfigurationExample,
        DemoStep::HistoricalData,
        DemoStep::AlarmHistory,
    ];

    pub fn title(self) -> &'static str {
        match self {
            DemoStep::SystemStatus => "system status",
            DemoStep::DeviceStatuses => "device statuses",
            DemoStep::CurrentData => "current data",
            DemoStep::ConfigurationExample => "configuration example",
            DemoStep::HistoricalData => "historical data",
            DemoStep::AlarmHistory => "alarm history",
        }
    }

    /// Prefix of the diagnostic when the step fails.
    fn unavailable(self) -> &'static str {
        match self {
            DemoStep::SystemStatus => "system status unavailable",
            DemoStep::DeviceStatuses => "device statuses unavailable",
            DemoStep::CurrentData => "current data unavailable",
            DemoStep::ConfigurationExample => "configuration example unavailable",
            DemoStep::HistoricalData => "historical data unavailable",
            DemoStep::AlarmHistory => "alarm history unavailable",
        }
    }
}

impl fmt::Display for DemoStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Result of a single step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Completed {
        summary: String,
        details: Vec<String>,
    },
    Failed {
        diagnostic: String,
    },
}

impl StepOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, StepOutcome::Completed { .. })
    }

    /// The summary of a completed step or the diagnostic of a failed one.
    pub fn headline(&self) -> &str {
        match self {
            StepOutcome::Completed { summary, .. } => summary,
            StepOutcome::Failed { diagnostic } => diagnostic,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub step: DemoStep,
    pub outcome: StepOutcome,
}

/// Everything the demonstration observed, in execution order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DemonstrationReport {
    pub steps: Vec<StepReport>,
}

impl DemonstrationReport {
    pub fn completed(&self) -> usize {
        self.steps.iter().filter(|s| s.outcome.is_completed()).count()
    }

    pub fn failed(&self) -> usize {
        self.steps.len() - self.completed()
    }

    pub fn outcome(&self, step: DemoStep) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.step == step).map(|s| &s.outcome)
    }
}

// ── DemonstrationRunner ───────────────────────────────────────────────────────

/// Runs the demonstration sequence against a shared Manager.
pub struct DemonstrationRunner {
    manager: Arc<dyn ManagerFacade>,
    config: DemonstrationConfig,
}

/// Successful step body: summary line plus detail lines.
type StepBody = (String, Vec<String>);

impl DemonstrationRunner {
    pub fn new(manager: Arc<dyn ManagerFacade>, config: DemonstrationConfig) -> Self {
        Self { manager, config }
    }

    /// Execute every step in order and collect the outcomes.
    pub async fn run(&self) -> DemonstrationReport {
        let mut report = DemonstrationReport::default();

        for (idx, step) in DemoStep::SEQUENCE.into_iter().enumerate() {
            let outcome = match self.run_step(step).await {
                Ok((summary, details)) => {
                    tracing::info!(step = idx + 1, "{}: {}", step, summary);
                    for line in &details {
                        tracing::info!("  {line}");
                    }
                    StepOutcome::Completed { summary, details }
                }
                Err(e) => {
                    let diagnostic = format!("{}: {:#}", step.unavailable(), e);
                    tracing::warn!(step = idx + 1, "{diagnostic}");
                    StepOutcome::Failed { diagnostic }
                }
            };
            report.steps.push(StepReport { step, outcome });
        }

        report
    }

    async fn run_step(&self, step: DemoStep) -> anyhow::Result<StepBody> {
        match step {
            DemoStep::SystemStatus => self.system_status(),
            DemoStep::DeviceStatuses => self.device_statuses().await,
            DemoStep::CurrentData => self.current_data(),
            DemoStep::ConfigurationExample => configuration_example(),
            DemoStep::HistoricalData => self.historical_data().await,
            DemoStep::AlarmHistory => self.alarm_history().await,
        }
    }

    // ── Steps ─────────────────────────────────────────────────────────────

    fn system_status(&self) -> anyhow::Result<StepBody> {
        let status = self.manager.system_status()?;
        let summary = format!(
            "{}/{} devices connected",
            status.devices.connected, status.devices.total
        );
        let details = vec![
            format!("points logged: {}", format_count(status.data.points_logged)),
            format!(
                "alarms generated: {}",
                format_count(status.data.alarms_generated)
            ),
            format!("uptime: {}", format_uptime(status.system.uptime_seconds)),
            format!(
                "connection success rate: {}",
                format_percent(status.connections.success_rate_percent)
            ),
        ];
        Ok((summary, details))
    }

    async fn device_statuses(&self) -> anyhow::Result<StepBody> {
        let devices = self.manager.device_statuses().await?;
        let details = devices
            .iter()
            .map(|d| {
                format!(
                    "{} ({}:{}): {}, {} active tags, data quality {}",
                    d.name,
                    d.address,
                    d.port,
                    if d.status.connected {
                        "connected"
                    } else {
                        "disconnected"
                    },
                    d.status.active_tags,
                    format_percent(d.statistics.data_quality_percent)
                )
            })
            .collect();
        Ok((format!("{} device(s)", devices.len()), details))
    }

    fn current_data(&self) -> anyhow::Result<StepBody> {
        let data = self.manager.all_data()?;
        let mut details = Vec::new();
        let mut points = 0;
        for (device, snapshot) in &data {
            if !snapshot.connected {
                details.push(format!("{}: disconnected", device));
                continue;
            }
            for (tag, reading) in &snapshot.data {
                points += 1;
                details.push(format!(
                    "{}.{} = {}",
                    device,
                    tag,
                    with_units(&reading.formatted_value, &reading.units)
                ));
            }
        }
        Ok((
            format!("{} device(s), {} live point(s)", data.len(), points),
            details,
        ))
    }

    async fn historical_data(&self) -> anyhow::Result<StepBody> {
        let end = Utc::now();
        let start = end - chrono::Duration::from_std(self.config.history_window)?;
        let records = self
            .manager
            .historical_data(&HistoryFilter::default(), start, end, self.config.history_limit)
            .await?;
        let details = records
            .iter()
            .map(|r| {
                format!(
                    "{} {}.{} = {}",
                    r.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    r.device_name,
                    r.tag_name,
                    with_units(&format_tag_value(&r.value), &r.units)
                )
            })
            .collect();
        Ok((format!("{} records found", records.len()), details))
    }

    async fn alarm_history(&self) -> anyhow::Result<StepBody> {
        let alarms = self
            .manager
            .alarm_history(&AlarmFilter::default(), self.config.alarm_limit)
            .await?;
        let details = alarms
            .iter()
            .map(|a| {
                format!(
                    "{}.{}: {} ({})",
                    a.device_name, a.tag_name, a.alarm_type, a.severity
                )
            })
            .collect();
        Ok((format!("{} alarms found", alarms.len()), details))
    }
}

/// Render a sample device configuration. Nothing is sent to the Manager.
fn configuration_example() -> anyhow::Result<StepBody> {
    let example = example_device_config();
    let json = serde_json::to_string_pretty(&example)?;
    Ok((
        format!("example configuration for {} (not applied)", example.name),
        json.lines().map(str::to_string).collect(),
    ))
}

/// The configuration shown by the demonstration.
pub fn example_device_config() -> DeviceConfig {
    DeviceConfig {
        name: "mixer-3".to_string(),
        address: "192.168.10.30".to_string(),
        port: 102,
        poll_interval_ms: 1000,
        tags: vec![
            TagConfig {
                name: "Speed".to_string(),
                address: "DB10.DBD0".to_string(),
                data_type: TagDataType::Real,
                units: "rpm".to_string(),
                alarm_high: Some(1450.0),
                alarm_low: None,
            },
            TagConfig {
                name: "Running".to_string(),
                address: "DB10.DBX4.0".to_string(),
                data_type: TagDataType::Bool,
                units: String::new(),
                alarm_high: None,
                alarm_low: None,
            },
        ],
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::{Op, StubManager};
    use plc_core::models::{AlarmRecord, HistoricalRecord};
    use serde_json::json;

    fn runner(stub: &Arc<StubManager>) -> DemonstrationRunner {
        DemonstrationRunner::new(stub.clone(), DemonstrationConfig::default())
    }

    #[tokio::test]
    async fn test_all_steps_complete_in_order() {
        let stub = Arc::new(StubManager::new());
        let report = runner(&stub).run().await;

        let order: Vec<DemoStep> = report.steps.iter().map(|s| s.step).collect();
        assert_eq!(order, DemoStep::SEQUENCE.to_vec());
        assert_eq!(report.completed(), 6);
        assert_eq!(report.failed(), 0);
    }

    #[tokio::test]
    async fn test_failed_data_step_does_not_stop_the_others() {
        let stub = Arc::new(StubManager::new().failing(Op::AllData));
        let report = runner(&stub).run().await;

        assert_eq!(report.steps.len(), 6);
        assert_eq!(report.failed(), 1);
        let failed = report.outcome(DemoStep::CurrentData).unwrap();
        assert_eq!(
            failed.headline(),
            "current data unavailable: Query failed: all_data unavailable"
        );
        for step in [
            DemoStep::SystemStatus,
            DemoStep::DeviceStatuses,
            DemoStep::ConfigurationExample,
            DemoStep::HistoricalData,
            DemoStep::AlarmHistory,
        ] {
            assert!(report.outcome(step).unwrap().is_completed(), "{step}");
        }
        assert_eq!(stub.calls(Op::HistoricalData), 1);
        assert_eq!(stub.calls(Op::AlarmHistory), 1);
    }

    #[tokio::test]
    async fn test_empty_history_is_not_an_error() {
        let stub = Arc::new(StubManager::new());
        let report = runner(&stub).run().await;

        let history = report.outcome(DemoStep::HistoricalData).unwrap();
        assert!(history.is_completed());
        assert_eq!(history.headline(), "0 records found");
        let alarms = report.outcome(DemoStep::AlarmHistory).unwrap();
        assert_eq!(alarms.headline(), "0 alarms found");
    }

    #[tokio::test]
    async fn test_history_failure_diagnostic() {
        let stub = Arc::new(StubManager::new().failing(Op::HistoricalData));
        let report = runner(&stub).run().await;

        let history = report.outcome(DemoStep::HistoricalData).unwrap();
        assert!(!history.is_completed());
        assert_eq!(
            history.headline(),
            "historical data unavailable: Query failed: historical_data unavailable"
        );
        assert!(report.outcome(DemoStep::AlarmHistory).unwrap().is_completed());
    }

    #[tokio::test]
    async fn test_history_records_are_rendered() {
        let record = HistoricalRecord {
            device_name: "press-1".to_string(),
            tag_name: "Temperature".to_string(),
            value: json!(70.125),
            units: "°C".to_string(),
            timestamp: "2024-05-01T12:00:00Z".parse().unwrap(),
        };
        let alarm = AlarmRecord {
            device_name: "press-1".to_string(),
            tag_name: "Temperature".to_string(),
            alarm_type: "HIGH".to_string(),
            severity: "critical".to_string(),
        };
        let stub = Arc::new(
            StubManager::new()
                .with_history(vec![record])
                .with_alarms(vec![alarm]),
        );
        let report = runner(&stub).run().await;

        match report.outcome(DemoStep::HistoricalData).unwrap() {
            StepOutcome::Completed { summary, details } => {
                assert_eq!(summary, "1 records found");
                assert_eq!(details, &vec![
                    "2024-05-01 12:00:00 press-1.Temperature = 70.13 °C".to_string()
                ]);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        match report.outcome(DemoStep::AlarmHistory).unwrap() {
            StepOutcome::Completed { summary, details } => {
                assert_eq!(summary, "1 alarms found");
                assert_eq!(details[0], "press-1.Temperature: HIGH (critical)");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_history_query_uses_configured_bounds() {
        let stub = Arc::new(StubManager::new());
        let config = DemonstrationConfig {
            history_window: std::time::Duration::from_secs(15 * 60),
            history_limit: 3,
            alarm_limit: 7,
        };
        DemonstrationRunner::new(stub.clone(), config).run().await;

        let (window, limit) = stub.last_history_query().expect("history queried");
        assert_eq!(window, chrono::Duration::minutes(15));
        assert_eq!(limit, 3);
        assert_eq!(stub.last_alarm_limit(), Some(7));
    }

    #[tokio::test]
    async fn test_current_data_counts_only_connected_devices() {
        let stub = Arc::new(StubManager::new());
        let report = runner(&stub).run().await;
        match report.outcome(DemoStep::CurrentData).unwrap() {
            StepOutcome::Completed { summary, details } => {
                assert_eq!(summary, "2 device(s), 2 live point(s)");
                assert!(details.contains(&"press-2: disconnected".to_string()));
                assert!(details.contains(&"press-1.Temperature = 71.50 °C".to_string()));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_configuration_example_never_touches_manager() {
        let stub = Arc::new(StubManager::new());
        let report = runner(&stub).run().await;
        let outcome = report.outcome(DemoStep::ConfigurationExample).unwrap();
        assert_eq!(
            outcome.headline(),
            "example configuration for mixer-3 (not applied)"
        );
        assert_eq!(stub.calls(Op::Initialize), 0);
        assert_eq!(stub.calls(Op::Shutdown), 0);
    }

    #[tokio::test]
    async fn test_every_step_failing_still_produces_full_report() {
        let stub = Arc::new(
            StubManager::new()
                .failing(Op::SystemStatus)
                .failing(Op::DeviceStatuses)
                .failing(Op::AllData)
                .failing(Op::HistoricalData)
                .failing(Op::AlarmHistory),
        );
        let report = runner(&stub).run().await;
        assert_eq!(report.steps.len(), 6);
        assert_eq!(report.failed(), 5);
        assert!(report
            .outcome(DemoStep::ConfigurationExample)
            .unwrap()
            .is_completed());
    }
}
