//! In-process Manager that simulates PLC polling.
//!
//! [`SimulatedManager`] produces deterministic waveform readings for every
//! configured tag, keeps a bounded history, raises edge-triggered alarms
//! against each tag's limits and emits the same events a real Manager would.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::f64::consts::TAU;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use plc_core::error::ManagerError;
use plc_core::events::ManagerEvent;
use plc_core::formatting::format_tag_value;
use plc_core::manager::ManagerFacade;
use plc_core::models::{
    AlarmFilter, AlarmRecord, ConnectionStats, ConnectionStatus, DataCounters, DeviceConfig,
    DeviceCounts, DeviceSnapshot, DeviceStatistics, DeviceStatus, HistoricalRecord,
    HistoryFilter, SystemInfo, SystemStatus, TagConfig, TagDataType, TagReading,
};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::supervise::{spawn_supervised, FaultReporter};

const EVENT_CAPACITY: usize = 256;
const DEFAULT_HISTORY_CAPACITY: usize = 10_000;
const DEFAULT_HEALTH_CHECK_EVERY: u64 = 10;
/// Ticks per full waveform cycle.
const WAVE_PERIOD_TICKS: f64 = 20.0;
/// Swing beyond the alarm band so limited tags cross it once per cycle.
const OVERSHOOT: f64 = 1.1;

// ── Device set ────────────────────────────────────────────────────────────────

/// Two presses and a packer; every numeric tag has alarm limits.
pub fn default_devices() -> Vec<DeviceConfig> {
    vec![
        DeviceConfig {
            name: "press-1".to_string(),
            address: "192.168.10.21".to_string(),
            port: 102,
            poll_interval_ms: 1_000,
            tags: vec![
                real_tag("Temperature", "DB1.DBD0", "°C", Some(20.0), Some(80.0)),
                real_tag("Pressure", "DB1.DBD4", "bar", Some(1.0), Some(6.0)),
                TagConfig {
                    name: "Running".to_string(),
                    address: "DB1.DBX8.0".to_string(),
                    data_type: TagDataType::Bool,
                    units: String::new(),
                    alarm_high: None,
                    alarm_low: None,
                },
            ],
        },
        DeviceConfig {
            name: "packer-2".to_string(),
            address: "192.168.10.22".to_string(),
            port: 102,
            poll_interval_ms: 1_000,
            tags: vec![
                TagConfig {
                    name: "SpeedRpm".to_string(),
                    address: "DB2.DBW0".to_string(),
                    data_type: TagDataType::Int,
                    units: "rpm".to_string(),
                    alarm_high: Some(1_400.0),
                    alarm_low: Some(600.0),
                },
                TagConfig {
                    name: "Count".to_string(),
                    address: "DB2.DBD2".to_string(),
                    data_type: TagDataType::Int,
                    units: "pcs".to_string(),
                    alarm_high: None,
                    alarm_low: None,
                },
            ],
        },
    ]
}

fn real_tag(name: &str, address: &str, units: &str, low: Option<f64>, high: Option<f64>) -> TagConfig {
    TagConfig {
        name: name.to_string(),
        address: address.to_string(),
        data_type: TagDataType::Real,
        units: units.to_string(),
        alarm_high: high,
        alarm_low: low,
    }
}

// ── Waveforms ─────────────────────────────────────────────────────────────────

/// Deterministic value of `tag` at `tick`, shifted by `phase` ticks.
fn waveform(tag: &TagConfig, phase: f64, tick: u64) -> Value {
    let s = ((tick as f64 + phase) * TAU / WAVE_PERIOD_TICKS).sin();
    match tag.data_type {
        TagDataType::Bool => Value::Bool(s >= 0.0),
        TagDataType::Int => json!(scaled(tag, s).round() as i64),
        TagDataType::Real => json!((scaled(tag, s) * 100.0).round() / 100.0),
    }
}

fn scaled(tag: &TagConfig, s: f64) -> f64 {
    match (tag.alarm_low, tag.alarm_high) {
        (Some(low), Some(high)) => {
            let mid = (low + high) / 2.0;
            let half = (high - low) / 2.0;
            mid + half * OVERSHOOT * s
        }
        (None, Some(high)) => high * (0.75 + 0.3 * s),
        (Some(low), None) => low * (1.25 + 0.3 * s),
        (None, None) => 50.0 + 25.0 * s,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AlarmSide {
    High,
    Low,
}

impl AlarmSide {
    fn alarm_type(self) -> &'static str {
        match self {
            AlarmSide::High => "HIGH",
            AlarmSide::Low => "LOW",
        }
    }

    fn severity(self) -> &'static str {
        match self {
            AlarmSide::High => "critical",
            AlarmSide::Low => "warning",
        }
    }
}

fn alarm_side(tag: &TagConfig, value: &Value) -> Option<AlarmSide> {
    let v = value.as_f64()?;
    if tag.alarm_high.is_some_and(|high| v > high) {
        Some(AlarmSide::High)
    } else if tag.alarm_low.is_some_and(|low| v < low) {
        Some(AlarmSide::Low)
    } else {
        None
    }
}

// ── Shared state ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
    Stopped,
}

struct SimState {
    phase: Phase,
    devices: Vec<DeviceConfig>,
    connected: BTreeMap<String, bool>,
    latest: BTreeMap<String, BTreeMap<String, Value>>,
    active_alarms: HashMap<(String, String), AlarmSide>,
    history: VecDeque<HistoricalRecord>,
    alarms: VecDeque<AlarmRecord>,
    tick: u64,
    started_at: Option<Instant>,
    points_logged: u64,
    alarms_generated: u64,
    connection_attempts: u64,
    connection_successes: u64,
    unreachable: Vec<String>,
    history_capacity: usize,
    health_check_every: u64,
    #[cfg(test)]
    panic_on_tick: Option<u64>,
}

impl SimState {
    fn connected_count(&self) -> u32 {
        self.connected.values().filter(|c| **c).count() as u32
    }

    fn is_connected(&self, device: &str) -> bool {
        self.connected.get(device).copied().unwrap_or(false)
    }
}

struct Inner {
    state: Mutex<SimState>,
    events: broadcast::Sender<ManagerEvent>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit_all(&self, events: Vec<ManagerEvent>) {
        for event in events {
            // No receivers is fine.
            let _ = self.events.send(event);
        }
    }

    /// Try to connect `device`, returning the event describing the result.
    fn connect(&self, state: &mut SimState, device: &DeviceConfig) -> ManagerEvent {
        state.connection_attempts += 1;
        if state.unreachable.contains(&device.name) {
            state.connected.insert(device.name.clone(), false);
            tracing::debug!(device = %device.name, "simulated connection refused");
            ManagerEvent::DeviceConnectionFailed {
                name: device.name.clone(),
                error: format!(
                    "connection to {}:{} refused",
                    device.address, device.port
                ),
            }
        } else {
            state.connection_successes += 1;
            state.connected.insert(device.name.clone(), true);
            ManagerEvent::DeviceConnected {
                name: device.name.clone(),
            }
        }
    }

    /// One polling cycle over every connected device.
    fn poll(&self) -> Vec<ManagerEvent> {
        let mut state = self.state();
        if state.phase != Phase::Running {
            return Vec::new();
        }
        state.tick += 1;
        let tick = state.tick;
        #[cfg(test)]
        if state.panic_on_tick == Some(tick) {
            panic!("waveform table corrupted at tick {tick}");
        }
        let now = Utc::now();
        let devices = state.devices.clone();
        let mut events = Vec::new();

        for (d, device) in devices.iter().enumerate() {
            if !state.is_connected(&device.name) {
                continue;
            }
            let mut data = BTreeMap::new();
            for (t, tag) in device.tags.iter().enumerate() {
                let value = waveform(tag, (d * 3 + t) as f64, tick);
                self.record(&mut state, device, tag, &value, now);
                if let Some(alarm) = self.check_alarm(&mut state, device, tag, &value) {
                    events.push(alarm);
                }
                data.insert(tag.name.clone(), value);
            }
            state.latest.insert(device.name.clone(), data.clone());
            events.push(ManagerEvent::DeviceData {
                name: device.name.clone(),
                data,
            });
        }

        if state.health_check_every > 0 && tick % state.health_check_every == 0 {
            events.push(ManagerEvent::HealthCheckComplete {
                connected_count: state.connected_count(),
                total_count: state.devices.len() as u32,
            });
        }
        events
    }

    fn record(
        &self,
        state: &mut SimState,
        device: &DeviceConfig,
        tag: &TagConfig,
        value: &Value,
        now: DateTime<Utc>,
    ) {
        if state.history.len() == state.history_capacity {
            state.history.pop_front();
        }
        state.history.push_back(HistoricalRecord {
            device_name: device.name.clone(),
            tag_name: tag.name.clone(),
            value: value.clone(),
            units: tag.units.clone(),
            timestamp: now,
        });
        state.points_logged += 1;
    }

    /// Raise an alarm only when a tag enters a new out-of-range side.
    fn check_alarm(
        &self,
        state: &mut SimState,
        device: &DeviceConfig,
        tag: &TagConfig,
        value: &Value,
    ) -> Option<ManagerEvent> {
        let key = (device.name.clone(), tag.name.clone());
        let Some(side) = alarm_side(tag, value) else {
            state.active_alarms.remove(&key);
            return None;
        };
        if state.active_alarms.insert(key, side) == Some(side) {
            return None;
        }

        if state.alarms.len() == state.history_capacity {
            state.alarms.pop_front();
        }
        state.alarms.push_back(AlarmRecord {
            device_name: device.name.clone(),
            tag_name: tag.name.clone(),
            alarm_type: side.alarm_type().to_string(),
            severity: side.severity().to_string(),
        });
        state.alarms_generated += 1;
        Some(ManagerEvent::DeviceAlarm {
            name: device.name.clone(),
            alarm_type: side.alarm_type().to_string(),
            tag_name: tag.name.clone(),
            value: value.clone(),
        })
    }
}

async fn polling_loop(inner: Arc<Inner>, period: Duration) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let events = inner.poll();
        inner.emit_all(events);
    }
}

// ── SimulatedManager ──────────────────────────────────────────────────────────

pub struct SimulatedManager {
    inner: Arc<Inner>,
    poll_interval: Duration,
    init_failure: Option<String>,
    poller: Mutex<Option<JoinHandle<()>>>,
    faults: Mutex<Option<FaultReporter>>,
}

impl SimulatedManager {
    pub fn new(devices: Vec<DeviceConfig>, poll_interval: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let state = SimState {
            phase: Phase::Idle,
            devices,
            connected: BTreeMap::new(),
            latest: BTreeMap::new(),
            active_alarms: HashMap::new(),
            history: VecDeque::new(),
            alarms: VecDeque::new(),
            tick: 0,
            started_at: None,
            points_logged: 0,
            alarms_generated: 0,
            connection_attempts: 0,
            connection_successes: 0,
            unreachable: Vec::new(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            health_check_every: DEFAULT_HEALTH_CHECK_EVERY,
            #[cfg(test)]
            panic_on_tick: None,
        };
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                events,
            }),
            poll_interval,
            init_failure: None,
            poller: Mutex::new(None),
            faults: Mutex::new(None),
        }
    }

    /// Make `initialize` fail with a connection error.
    pub fn with_init_failure(mut self, message: impl Into<String>) -> Self {
        self.init_failure = Some(message.into());
        self
    }

    /// Refuse connections to the named device.
    pub fn with_unreachable(self, device: impl Into<String>) -> Self {
        self.inner.state().unreachable.push(device.into());
        self
    }

    pub fn with_history_capacity(self, capacity: usize) -> Self {
        self.inner.state().history_capacity = capacity.max(1);
        self
    }

    /// Emit `health_check_complete` every `ticks` polls (0 disables).
    pub fn with_health_check_every(self, ticks: u64) -> Self {
        self.inner.state().health_check_every = ticks;
        self
    }

    /// Run one polling cycle immediately and emit its events.
    pub fn poll_now(&self) {
        let events = self.inner.poll();
        self.inner.emit_all(events);
    }

    /// Swap the device set, connecting added devices and dropping removed ones.
    pub fn replace_configurations(&self, devices: Vec<DeviceConfig>) {
        let mut events = Vec::new();
        {
            let mut state = self.inner.state();
            let old_count = state.devices.len();
            let removed: Vec<String> = state
                .devices
                .iter()
                .filter(|old| !devices.iter().any(|d| d.name == old.name))
                .map(|d| d.name.clone())
                .collect();
            let added: Vec<DeviceConfig> = devices
                .iter()
                .filter(|new| !state.devices.iter().any(|d| d.name == new.name))
                .cloned()
                .collect();

            state.devices = devices;
            events.push(ManagerEvent::ConfigurationsChanged {
                old_count,
                new_count: state.devices.len(),
            });

            if state.phase == Phase::Running {
                for name in removed {
                    state.connected.remove(&name);
                    state.latest.remove(&name);
                    events.push(ManagerEvent::DeviceDisconnected { name });
                }
                for device in &added {
                    let event = self.inner.connect(&mut state, device);
                    events.push(event);
                }
            }
        }
        self.inner.emit_all(events);
    }

    fn ensure_started(&self) -> Result<(), ManagerError> {
        if self.inner.state().phase == Phase::Idle {
            Err(ManagerError::NotInitialized)
        } else {
            Ok(())
        }
    }

    /// Report a panic in the polling task as an unhandled fault.
    ///
    /// Takes effect for the poller started by the next `initialize`.
    pub fn set_fault_reporter(&self, faults: FaultReporter) {
        *self.faults.lock().unwrap_or_else(PoisonError::into_inner) = Some(faults);
    }

    #[cfg(test)]
    pub(crate) fn panic_on_tick(&self, tick: u64) {
        self.inner.state().panic_on_tick = Some(tick);
    }

    fn poller(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.poller.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ManagerFacade for SimulatedManager {
    async fn initialize(&self) -> Result<(), ManagerError> {
        if let Some(message) = &self.init_failure {
            return Err(ManagerError::Connection(message.clone()));
        }

        let mut events = vec![ManagerEvent::DatabaseConnected];
        {
            let mut state = self.inner.state();
            if state.phase != Phase::Idle {
                return Ok(());
            }
            events.push(ManagerEvent::ConfigurationsLoaded {
                count: state.devices.len(),
            });
            for device in state.devices.clone() {
                let event = self.inner.connect(&mut state, &device);
                events.push(event);
            }
            state.phase = Phase::Running;
            state.started_at = Some(Instant::now());
            tracing::info!(
                devices = state.devices.len(),
                connected = state.connected_count(),
                "simulated manager initialized"
            );
        }
        events.push(ManagerEvent::Initialized);
        self.inner.emit_all(events);

        if !self.poll_interval.is_zero() {
            let fut = polling_loop(self.inner.clone(), self.poll_interval);
            let faults = self
                .faults
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            let handle = match faults {
                Some(faults) => spawn_supervised("simulator-poller", fut, faults),
                None => tokio::spawn(fut),
            };
            *self.poller() = Some(handle);
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ManagerError> {
        if let Some(poller) = self.poller().take() {
            poller.abort();
        }

        let mut events = Vec::new();
        {
            let mut state = self.inner.state();
            if state.phase != Phase::Running {
                return Ok(());
            }
            state.phase = Phase::Stopped;
            let connected: Vec<String> = state
                .connected
                .iter()
                .filter(|(_, c)| **c)
                .map(|(name, _)| name.clone())
                .collect();
            for name in connected {
                state.connected.insert(name.clone(), false);
                events.push(ManagerEvent::DeviceDisconnected { name });
            }
        }
        self.inner.emit_all(events);
        tracing::info!("simulated manager shut down");
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ManagerEvent> {
        self.inner.events.subscribe()
    }

    fn system_status(&self) -> Result<SystemStatus, ManagerError> {
        self.ensure_started()?;
        let state = self.inner.state();
        let success_rate_percent = if state.connection_attempts == 0 {
            0.0
        } else {
            state.connection_successes as f64 / state.connection_attempts as f64 * 100.0
        };
        Ok(SystemStatus {
            devices: DeviceCounts {
                connected: state.connected_count(),
                total: state.devices.len() as u32,
            },
            data: DataCounters {
                points_logged: state.points_logged,
                alarms_generated: state.alarms_generated,
            },
            system: SystemInfo {
                uptime_seconds: state
                    .started_at
                    .map(|t| t.elapsed().as_secs())
                    .unwrap_or(0),
            },
            connections: ConnectionStats {
                success_rate_percent,
            },
        })
    }

    async fn device_statuses(&self) -> Result<Vec<DeviceStatus>, ManagerError> {
        self.ensure_started()?;
        let state = self.inner.state();
        Ok(state
            .devices
            .iter()
            .map(|device| {
                let connected = state.is_connected(&device.name);
                DeviceStatus {
                    name: device.name.clone(),
                    address: device.address.clone(),
                    port: device.port,
                    status: ConnectionStatus {
                        connected,
                        active_tags: if connected { device.tags.len() as u32 } else { 0 },
                    },
                    statistics: DeviceStatistics {
                        data_quality_percent: if connected { 100.0 } else { 0.0 },
                    },
                }
            })
            .collect())
    }

    fn all_data(&self) -> Result<BTreeMap<String, DeviceSnapshot>, ManagerError> {
        self.ensure_started()?;
        let state = self.inner.state();
        Ok(state
            .devices
            .iter()
            .map(|device| {
                let latest = state.latest.get(&device.name);
                let data = device
                    .tags
                    .iter()
                    .filter_map(|tag| {
                        let value = latest?.get(&tag.name)?;
                        Some((
                            tag.name.clone(),
                            TagReading {
                                formatted_value: format_tag_value(value),
                                units: tag.units.clone(),
                            },
                        ))
                    })
                    .collect();
                let snapshot = DeviceSnapshot {
                    connected: state.is_connected(&device.name),
                    data,
                };
                (device.name.clone(), snapshot)
            })
            .collect())
    }

    async fn historical_data(
        &self,
        filter: &HistoryFilter,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<HistoricalRecord>, ManagerError> {
        self.ensure_started()?;
        if start > end {
            return Err(ManagerError::Query(format!(
                "window start {} is after end {}",
                start, end
            )));
        }
        let state = self.inner.state();
        Ok(state
            .history
            .iter()
            .rev()
            .filter(|r| r.timestamp >= start && r.timestamp <= end)
            .filter(|r| filter.device_name.as_ref().map_or(true, |d| *d == r.device_name))
            .filter(|r| filter.tag_name.as_ref().map_or(true, |t| *t == r.tag_name))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn alarm_history(
        &self,
        filter: &AlarmFilter,
        limit: usize,
    ) -> Result<Vec<AlarmRecord>, ManagerError> {
        self.ensure_started()?;
        let state = self.inner.state();
        Ok(state
            .alarms
            .iter()
            .rev()
            .filter(|a| filter.device_name.as_ref().map_or(true, |d| *d == a.device_name))
            .filter(|a| filter.severity.as_ref().map_or(true, |s| *s == a.severity))
            .take(limit)
            .cloned()
            .collect())
    }
}

impl Drop for SimulatedManager {
    fn drop(&mut self) {
        if let Some(poller) = self.poller().take() {
            poller.abort();
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
