//! Default event handlers: one human-readable log line per Manager event.

use plc_core::events::{EventKind, ManagerEvent};
use plc_core::formatting::format_tag_value;

use crate::event_router::EventRouter;

/// Register a logging handler for every known [`EventKind`].
pub fn register_default_handlers(router: &mut EventRouter) {
    for kind in EventKind::ALL {
        router.subscribe(kind, log_event);
    }
}

/// One-line description of an event.
pub fn describe(event: &ManagerEvent) -> String {
    match event {
        ManagerEvent::Initialized => "manager initialized".to_string(),
        ManagerEvent::DatabaseConnected => "historical database connected".to_string(),
        ManagerEvent::ConfigurationsLoaded { count } => {
            format!("loaded {} device configuration(s)", count)
        }
        ManagerEvent::DeviceConnected { name } => format!("device {} connected", name),
        ManagerEvent::DeviceDisconnected { name } => format!("device {} disconnected", name),
        ManagerEvent::DeviceConnectionFailed { name, error } => {
            format!("device {} connection failed: {}", name, error)
        }
        ManagerEvent::DeviceAlarm {
            name,
            alarm_type,
            tag_name,
            value,
        } => format!(
            "ALARM {} on {}.{} (value {})",
            alarm_type,
            name,
            tag_name,
            format_tag_value(value)
        ),
        ManagerEvent::DeviceData { name, data } => {
            format!("device {} reported {} data point(s)", name, data.len())
        }
        ManagerEvent::HealthCheckComplete {
            connected_count,
            total_count,
        } => format!(
            "health check complete: {}/{} devices connected",
            connected_count, total_count
        ),
        ManagerEvent::ConfigurationsChanged {
            old_count,
            new_count,
        } => format!(
            "device configurations changed: {} -> {}",
            old_count, new_count
        ),
        ManagerEvent::Unrecognized { kind, .. } => format!("unrecognized event {}", kind),
    }
}

fn log_event(event: &ManagerEvent) -> anyhow::Result<()> {
    let line = describe(event);
    match event {
        ManagerEvent::DeviceAlarm { .. } => tracing::warn!("{line}"),
        ManagerEvent::DeviceConnectionFailed { .. } => tracing::error!("{line}"),
        ManagerEvent::DeviceDisconnected { .. } => tracing::warn!("{line}"),
        ManagerEvent::DeviceData { .. } => tracing::debug!("{line}"),
        _ => tracing::info!("{line}"),
    }
    Ok(())
}
