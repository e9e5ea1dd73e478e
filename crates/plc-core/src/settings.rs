use clap::{CommandFactory, FromArgMatches, Parser};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{OrchestratorError, Result};
use crate::models::DeviceConfig;

/// Upper bound of `--report-interval`, in seconds.
pub const MAX_REPORT_INTERVAL_SECS: u64 = 3_600;
/// Upper bound of `--history-window`: one year, in minutes.
pub const MAX_HISTORY_WINDOW_MINUTES: u64 = 525_600;
/// Lower bound of `--poll-interval`, in milliseconds.
pub const MIN_POLL_INTERVAL_MS: u64 = 10;
const LOG_LEVELS: [&str; 5] = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"];

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Orchestrator for a multi-device PLC data-acquisition manager
#[derive(Parser, Debug, Clone)]
#[command(
    name = "plc-monitor",
    about = "Orchestrator for a multi-device PLC data-acquisition manager",
    version
)]
pub struct Settings {
    /// Seconds between periodic status reports
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u64).range(1..=MAX_REPORT_INTERVAL_SECS))]
    pub report_interval: u64,

    /// Seconds to wait after startup before running the demonstration
    #[arg(long, default_value = "2")]
    pub demo_delay: u64,

    /// Seconds to wait for the manager to shut down before exiting anyway
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u64).range(1..))]
    pub shutdown_timeout: u64,

    /// Seconds to wait for an in-flight report when stopping the reporter
    #[arg(long, default_value = "5", value_parser = clap::value_parser!(u64).range(1..))]
    pub report_stop_timeout: u64,

    /// Minutes of history queried by the demonstration
    #[arg(long, default_value = "60", value_parser = clap::value_parser!(u64).range(1..=MAX_HISTORY_WINDOW_MINUTES))]
    pub history_window: u64,

    /// Maximum historical records queried by the demonstration
    #[arg(long, default_value = "10")]
    pub history_limit: usize,

    /// Maximum alarms queried by the demonstration
    #[arg(long, default_value = "5")]
    pub alarm_limit: usize,

    /// Poll interval of the simulated manager in milliseconds
    #[arg(long, default_value = "1000", value_parser = clap::value_parser!(u64).range(MIN_POLL_INTERVAL_MS..))]
    pub poll_interval: u64,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = LOG_LEVELS)]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// JSON configuration file; explicit command-line flags take precedence
    #[arg(long, env = "PLC_MONITOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Devices handed to the manager (from the configuration file only)
    #[arg(skip)]
    pub devices: Vec<DeviceConfig>,
}

// ── FileConfig ─────────────────────────────────────────────────────────────────

/// Contents of the optional `--config` JSON file. Every field is optional.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct FileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_interval: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub demo_delay: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shutdown_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_stop_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_window: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alarm_limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<DeviceConfig>,
}

impl FileConfig {
    /// Read and parse a configuration file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| OrchestratorError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| OrchestratorError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse the process arguments and merge the configuration file, if any.
    pub fn load() -> Result<Self> {
        Self::load_from_args(std::env::args_os().collect())
    }

    /// Same as [`Settings::load`] but accepts an explicit argument list,
    /// enabling unit-testing without spawning subprocesses.
    pub fn load_from_args(args: Vec<std::ffi::OsString>) -> Result<Self> {
        // Raw ArgMatches so we can query ValueSource.
        let matches = Settings::command().get_matches_from(args);
        let mut settings = Settings::from_arg_matches(&matches)
            .map_err(|e| OrchestratorError::Other(anyhow::anyhow!(e.to_string())))?;

        if let Some(path) = settings.config.clone() {
            let file = FileConfig::load_from(&path)?;
            settings.merge_file(file, &matches);
            // File values bypass clap's parsers.
            settings.validate(&path)?;
        }

        // --debug overrides log level.
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }

        Ok(settings)
    }

    /// Fill in values from `file` for every argument that was NOT explicitly
    /// set on the command line (CLI always wins).
    fn merge_file(&mut self, file: FileConfig, matches: &clap::ArgMatches) {
        // NOTE: clap stores the arg id using the *field name* (underscores),
        // not the long-flag spelling (hyphens).
        macro_rules! merge {
            ($field:ident) => {
                if !is_arg_explicitly_set(matches, stringify!($field)) {
                    if let Some(v) = file.$field {
                        self.$field = v;
                    }
                }
            };
        }
        merge!(report_interval);
        merge!(demo_delay);
        merge!(shutdown_timeout);
        merge!(report_stop_timeout);
        merge!(history_window);
        merge!(history_limit);
        merge!(alarm_limit);
        merge!(poll_interval);
        merge!(log_level);

        if !is_arg_explicitly_set(matches, "log_file") && file.log_file.is_some() {
            self.log_file = file.log_file;
        }
        self.devices = file.devices;
    }

    /// Apply the command-line bounds to the merged values.
    fn validate(&self, path: &Path) -> Result<()> {
        let invalid = |message: String| OrchestratorError::Config {
            path: path.to_path_buf(),
            message,
        };
        let ranges = [
            ("report_interval", self.report_interval, 1, MAX_REPORT_INTERVAL_SECS),
            ("shutdown_timeout", self.shutdown_timeout, 1, u64::MAX),
            ("report_stop_timeout", self.report_stop_timeout, 1, u64::MAX),
            ("history_window", self.history_window, 1, MAX_HISTORY_WINDOW_MINUTES),
            ("poll_interval", self.poll_interval, MIN_POLL_INTERVAL_MS, u64::MAX),
        ];
        for (name, value, min, max) in ranges {
            if value < min {
                return Err(invalid(format!("{name} must be at least {min}, got {value}")));
            }
            if value > max {
                return Err(invalid(format!("{name} must be at most {max}, got {value}")));
            }
        }
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(invalid(format!(
                "log_level must be one of {}, got {:?}",
                LOG_LEVELS.join(", "),
                self.log_level
            )));
        }
        Ok(())
    }

    /// Runtime timings and query bounds derived from these settings.
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            report_interval: Duration::from_secs(self.report_interval),
            demo_delay: Duration::from_secs(self.demo_delay),
            shutdown_timeout: Duration::from_secs(self.shutdown_timeout),
            report_stop_timeout: Duration::from_secs(self.report_stop_timeout),
            demonstration: DemonstrationConfig {
                history_window: Duration::from_secs(self.history_window.saturating_mul(60)),
                history_limit: self.history_limit,
                alarm_limit: self.alarm_limit,
            },
        }
    }
}

// ── Runtime configuration ──────────────────────────────────────────────────────

/// Query bounds used by the demonstration sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct DemonstrationConfig {
    /// How far back the historical query reaches from "now".
    pub history_window: Duration,
    /// Maximum historical records requested.
    pub history_limit: usize,
    /// Maximum alarms requested.
    pub alarm_limit: usize,
}

impl Default for DemonstrationConfig {
    fn default() -> Self {
        Self {
            history_window: Duration::from_secs(60 * 60),
            history_limit: 10,
            alarm_limit: 5,
        }
    }
}

/// Timings consumed by the lifecycle controller.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    pub report_interval: Duration,
    pub demo_delay: Duration,
    /// Upper bound on the Manager's shutdown call.
    pub shutdown_timeout: Duration,
    /// Upper bound on waiting for an in-flight report during shutdown.
    pub report_stop_timeout: Duration,
    pub demonstration: DemonstrationConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            report_interval: Duration::from_secs(30),
            demo_delay: Duration::from_secs(2),
            shutdown_timeout: Duration::from_secs(10),
            report_stop_timeout: Duration::from_secs(5),
            demonstration: DemonstrationConfig::default(),
        }
    }
}

// ── Helper: check if an arg was explicitly set on the command line ─────────────

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
