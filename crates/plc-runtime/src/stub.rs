//! Scriptable in-memory Manager for unit tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use plc_core::error::ManagerError;
use plc_core::events::ManagerEvent;
use plc_core::manager::ManagerFacade;
use plc_core::models::*;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Op {
    Initialize,
    Shutdown,
    SystemStatus,
    DeviceStatuses,
    AllData,
    HistoricalData,
    AlarmHistory,
}

impl Op {
    fn name(self) -> &'static str {
        match self {
            Op::Initialize => "initialize",
            Op::Shutdown => "shutdown",
            Op::SystemStatus => "system_status",
            Op::DeviceStatuses => "device_statuses",
            Op::AllData => "all_data",
            Op::HistoricalData => "historical_data",
            Op::AlarmHistory => "alarm_history",
        }
    }
}

pub(crate) struct StubManager {
    events: broadcast::Sender<ManagerEvent>,
    failing: HashSet<Op>,
    history: Vec<HistoricalRecord>,
    alarms: Vec<AlarmRecord>,
    init_events: Vec<ManagerEvent>,
    shutdown_delay: Duration,
    status_delay: Duration,
    panic_in_status: bool,
    calls: Mutex<HashMap<Op, usize>>,
    active_status: AtomicUsize,
    max_active_status: AtomicUsize,
    history_query: Mutex<Option<(chrono::Duration, usize)>>,
    alarm_limit: Mutex<Option<usize>>,
}

impl StubManager {
    pub(crate) fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            events,
            failing: HashSet::new(),
            history: Vec::new(),
            alarms: Vec::new(),
            init_events: Vec::new(),
            shutdown_delay: Duration::ZERO,
            status_delay: Duration::ZERO,
            panic_in_status: false,
            calls: Mutex::new(HashMap::new()),
            active_status: AtomicUsize::new(0),
            max_active_status: AtomicUsize::new(0),
            history_query: Mutex::new(None),
            alarm_limit: Mutex::new(None),
        }
    }

    pub(crate) fn failing(mut self, op: Op) -> Self {
        self.failing.insert(op);
        self
    }

    pub(crate) fn with_history(mut self, history: Vec<HistoricalRecord>) -> Self {
        self.history = history;
        self
    }

    pub(crate) fn with_alarms(mut self, alarms: Vec<AlarmRecord>) -> Self {
        self.alarms = alarms;
        self
    }

    /// Events emitted from inside `initialize`.
    pub(crate) fn emitting_on_init(mut self, events: Vec<ManagerEvent>) -> Self {
        self.init_events = events;
        self
    }

    pub(crate) fn with_shutdown_delay(mut self, delay: Duration) -> Self {
        self.shutdown_delay = delay;
        self
    }

    /// Simulated latency of `system_status`, spent on a blocking sleep.
    pub(crate) fn with_status_delay(mut self, delay: Duration) -> Self {
        self.status_delay = delay;
        self
    }

    pub(crate) fn panicking_in_status(mut self) -> Self {
        self.panic_in_status = true;
        self
    }

    pub(crate) fn emit(&self, event: ManagerEvent) {
        let _ = self.events.send(event);
    }

    pub(crate) fn calls(&self, op: Op) -> usize {
        self.calls.lock().unwrap().get(&op).copied().unwrap_or(0)
    }

    /// Highest number of concurrent `system_status` calls observed.
    pub(crate) fn max_concurrent_status(&self) -> usize {
        self.max_active_status.load(Ordering::SeqCst)
    }

    pub(crate) fn last_history_query(&self) -> Option<(chrono::Duration, usize)> {
        *self.history_query.lock().unwrap()
    }

    pub(crate) fn last_alarm_limit(&self) -> Option<usize> {
        *self.alarm_limit.lock().unwrap()
    }

    fn enter(&self, op: Op) -> Result<(), ManagerError> {
        *self.calls.lock().unwrap().entry(op).or_insert(0) += 1;
        if self.failing.contains(&op) {
            Err(ManagerError::Query(format!("{} unavailable", op.name())))
        } else {
            Ok(())
        }
    }
}

fn reading(value: &str, units: &str) -> TagReading {
    TagReading {
        formatted_value: value.to_string(),
        units: units.to_string(),
    }
}

#[async_trait]
impl ManagerFacade for StubManager {
    async fn initialize(&self) -> Result<(), ManagerError> {
        self.enter(Op::Initialize)?;
        for event in &self.init_events {
            self.emit(event.clone());
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ManagerError> {
        if !self.shutdown_delay.is_zero() {
            tokio::time::sleep(self.shutdown_delay).await;
        }
        self.enter(Op::Shutdown)
    }

    fn subscribe(&self) -> broadcast::Receiver<ManagerEvent> {
        self.events.subscribe()
    }

    fn system_status(&self) -> Result<SystemStatus, ManagerError> {
        self.enter(Op::SystemStatus)?;
        if self.panic_in_status {
            panic!("status table corrupted");
        }
        let active = self.active_status.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_status.fetch_max(active, Ordering::SeqCst);
        if !self.status_delay.is_zero() {
            std::thread::sleep(self.status_delay);
        }
        self.active_status.fetch_sub(1, Ordering::SeqCst);
        Ok(SystemStatus {
            devices: DeviceCounts {
                connected: 1,
                total: 2,
            },
            data: DataCounters {
                points_logged: 1_200,
                alarms_generated: 3,
            },
            system: SystemInfo {
                uptime_seconds: 3_600,
            },
            connections: ConnectionStats {
                success_rate_percent: 50.0,
            },
        })
    }

    async fn device_statuses(&self) -> Result<Vec<DeviceStatus>, ManagerError> {
        self.enter(Op::DeviceStatuses)?;
        Ok(vec![DeviceStatus {
            name: "press-1".to_string(),
            address: "10.0.0.5".to_string(),
            port: 102,
            status: ConnectionStatus {
                connected: true,
                active_tags: 2,
            },
            statistics: DeviceStatistics {
                data_quality_percent: 99.0,
            },
        }])
    }

    fn all_data(&self) -> Result<BTreeMap<String, DeviceSnapshot>, ManagerError> {
        self.enter(Op::AllData)?;
        let mut press = BTreeMap::new();
        press.insert("Temperature".to_string(), reading("71.50", "°C"));
        press.insert("Running".to_string(), reading("ON", ""));
        let mut packer = BTreeMap::new();
        packer.insert("Count".to_string(), reading("12", "pcs"));

        let mut all = BTreeMap::new();
        all.insert(
            "press-1".to_string(),
            DeviceSnapshot {
                connected: true,
                data: press,
            },
        );
        all.insert(
            "press-2".to_string(),
            DeviceSnapshot {
                connected: false,
                data: packer,
            },
        );
        Ok(all)
    }

    async fn historical_data(
        &self,
        _filter: &HistoryFilter,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<HistoricalRecord>, ManagerError> {
        *self.history_query.lock().unwrap() = Some((end - start, limit));
        self.enter(Op::HistoricalData)?;
        Ok(self.history.iter().take(limit).cloned().collect())
    }

    async fn alarm_history(
        &self,
        _filter: &AlarmFilter,
        limit: usize,
    ) -> Result<Vec<AlarmRecord>, ManagerError> {
        *self.alarm_limit.lock().unwrap() = Some(limit);
        self.enter(Op::AlarmHistory)?;
        Ok(self.alarms.iter().take(limit).cloned().collect())
    }
}
