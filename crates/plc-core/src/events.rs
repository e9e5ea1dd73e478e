//! Notifications pushed by the Manager over its event stream.
//!
//! [`EventKind`] is the closed set of kinds the orchestrator knows how to
//! route. [`ManagerEvent`] carries the payload; anything a newer Manager emits
//! that is not in the set arrives as [`ManagerEvent::Unrecognized`] and has no
//! kind.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

// ── EventKind ─────────────────────────────────────────────────────────────────

/// The fixed set of event kinds the router dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Initialized,
    DatabaseConnected,
    ConfigurationsLoaded,
    DeviceConnected,
    DeviceDisconnected,
    DeviceConnectionFailed,
    DeviceAlarm,
    DeviceData,
    HealthCheckComplete,
    ConfigurationsChanged,
}

impl EventKind {
    /// Every known kind, in declaration order.
    pub const ALL: [EventKind; 10] = [
        EventKind::Initialized,
        EventKind::DatabaseConnected,
        EventKind::ConfigurationsLoaded,
        EventKind::DeviceConnected,
        EventKind::DeviceDisconnected,
        EventKind::DeviceConnectionFailed,
        EventKind::DeviceAlarm,
        EventKind::DeviceData,
        EventKind::HealthCheckComplete,
        EventKind::ConfigurationsChanged,
    ];

    /// Stable snake_case name, as used on the Manager's wire.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Initialized => "initialized",
            EventKind::DatabaseConnected => "database_connected",
            EventKind::ConfigurationsLoaded => "configurations_loaded",
            EventKind::DeviceConnected => "device_connected",
            EventKind::DeviceDisconnected => "device_disconnected",
            EventKind::DeviceConnectionFailed => "device_connection_failed",
            EventKind::DeviceAlarm => "device_alarm",
            EventKind::DeviceData => "device_data",
            EventKind::HealthCheckComplete => "health_check_complete",
            EventKind::ConfigurationsChanged => "configurations_changed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── ManagerEvent ──────────────────────────────────────────────────────────────

/// One event emitted by the Manager.
#[derive(Debug, Clone, PartialEq)]
pub enum ManagerEvent {
    Initialized,
    DatabaseConnected,
    ConfigurationsLoaded {
        count: usize,
    },
    DeviceConnected {
        name: String,
    },
    DeviceDisconnected {
        name: String,
    },
    DeviceConnectionFailed {
        name: String,
        error: String,
    },
    DeviceAlarm {
        name: String,
        alarm_type: String,
        tag_name: String,
        value: Value,
    },
    DeviceData {
        name: String,
        /// Tag name → raw value.
        data: BTreeMap<String, Value>,
    },
    HealthCheckComplete {
        connected_count: u32,
        total_count: u32,
    },
    ConfigurationsChanged {
        old_count: usize,
        new_count: usize,
    },
    /// A kind this build does not know about.
    Unrecognized {
        kind: String,
        payload: Value,
    },
}

impl ManagerEvent {
    /// The routing kind, or `None` for [`ManagerEvent::Unrecognized`].
    pub fn kind(&self) -> Option<EventKind> {
        let kind = match self {
            ManagerEvent::Initialized => EventKind::Initialized,
            ManagerEvent::DatabaseConnected => EventKind::DatabaseConnected,
            ManagerEvent::ConfigurationsLoaded { .. } => EventKind::ConfigurationsLoaded,
            ManagerEvent::DeviceConnected { .. } => EventKind::DeviceConnected,
            ManagerEvent::DeviceDisconnected { .. } => EventKind::DeviceDisconnected,
            ManagerEvent::DeviceConnectionFailed { .. } => EventKind::DeviceConnectionFailed,
            ManagerEvent::DeviceAlarm { .. } => EventKind::DeviceAlarm,
            ManagerEvent::DeviceData { .. } => EventKind::DeviceData,
            ManagerEvent::HealthCheckComplete { .. } => EventKind::HealthCheckComplete,
            ManagerEvent::ConfigurationsChanged { .. } => EventKind::ConfigurationsChanged,
            ManagerEvent::Unrecognized { .. } => return None,
        };
        Some(kind)
    }

    /// Name of the event on the wire, including unrecognized kinds.
    pub fn name(&self) -> &str {
        match self {
            ManagerEvent::Unrecognized { kind, .. } => kind,
            other => other.kind().map(EventKind::as_str).unwrap_or("unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_names_are_unique_snake_case() {
        let mut names: Vec<&str> = EventKind::ALL.iter().map(|k| k.as_str()).collect();
        assert!(names
            .iter()
            .all(|n| n.chars().all(|c| c.is_ascii_lowercase() || c == '_')));
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), EventKind::ALL.len());
    }

    #[test]
    fn test_event_kind_mapping() {
        let event = ManagerEvent::DeviceAlarm {
            name: "press-1".to_string(),
            alarm_type: "HIGH".to_string(),
            tag_name: "Temperature".to_string(),
            value: json!(91.2),
        };
        assert_eq!(event.kind(), Some(EventKind::DeviceAlarm));
        assert_eq!(event.name(), "device_alarm");
    }

    #[test]
    fn test_unrecognized_event_keeps_its_name() {
        let event = ManagerEvent::Unrecognized {
            kind: "firmware_updated".to_string(),
            payload: json!({ "version": "2.1" }),
        };
        assert_eq!(event.kind(), None);
        assert_eq!(event.name(), "firmware_updated");
    }

    #[test]
    fn test_display_matches_wire_name() {
        assert_eq!(
            EventKind::HealthCheckComplete.to_string(),
            "health_check_complete"
        );
    }
}
