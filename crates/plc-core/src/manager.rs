//! The contract the orchestrator consumes from the data-acquisition Manager.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::error::ManagerError;
use crate::events::ManagerEvent;
use crate::models::{
    AlarmFilter, AlarmRecord, DeviceSnapshot, DeviceStatus, HistoricalRecord, HistoryFilter,
    SystemStatus,
};

/// Lifecycle operations, data accessors and the event stream of the Manager.
///
/// The orchestrator shares one implementation behind an `Arc` between the
/// event router, the demonstration runner and the periodic reporter. Only the
/// lifecycle controller calls [`ManagerFacade::initialize`] and
/// [`ManagerFacade::shutdown`].
#[async_trait]
pub trait ManagerFacade: Send + Sync {
    /// Connect to storage and devices. Events may be emitted while this runs.
    async fn initialize(&self) -> Result<(), ManagerError>;

    /// Disconnect from devices and release resources.
    async fn shutdown(&self) -> Result<(), ManagerError>;

    /// Open a new receiver on the event stream.
    ///
    /// A receiver only observes events emitted after it was created.
    fn subscribe(&self) -> broadcast::Receiver<ManagerEvent>;

    /// Aggregate status snapshot.
    fn system_status(&self) -> Result<SystemStatus, ManagerError>;

    /// Detailed status for every configured device.
    async fn device_statuses(&self) -> Result<Vec<DeviceStatus>, ManagerError>;

    /// Current data for every configured device, keyed by device name.
    fn all_data(&self) -> Result<BTreeMap<String, DeviceSnapshot>, ManagerError>;

    /// Stored samples between `start` and `end`, at most `limit` of them.
    ///
    /// An empty vector means no data, not a failure.
    async fn historical_data(
        &self,
        filter: &HistoryFilter,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<HistoricalRecord>, ManagerError>;

    /// Most recent alarms, at most `limit` of them. May be empty.
    async fn alarm_history(
        &self,
        filter: &AlarmFilter,
        limit: usize,
    ) -> Result<Vec<AlarmRecord>, ManagerError>;
}
