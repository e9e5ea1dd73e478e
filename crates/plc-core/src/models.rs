use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Connected/total device counts reported by the Manager.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceCounts {
    pub connected: u32,
    pub total: u32,
}

/// Lifetime data counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataCounters {
    /// Data points written to historical storage since startup.
    pub points_logged: u64,
    /// Alarms raised since startup.
    pub alarms_generated: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStats {
    /// Share of connection attempts that succeeded, in percent.
    pub success_rate_percent: f64,
}

/// Aggregate status snapshot returned by `ManagerFacade::system_status`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub devices: DeviceCounts,
    pub data: DataCounters,
    pub system: SystemInfo,
    pub connections: ConnectionStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub connected: bool,
    /// Number of tags currently being polled on the device.
    pub active_tags: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatistics {
    /// Share of good-quality reads, in percent.
    pub data_quality_percent: f64,
}

/// Detailed per-device status returned by `ManagerFacade::device_statuses`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub status: ConnectionStatus,
    pub statistics: DeviceStatistics,
}

/// Latest value of one tag, already formatted by the Manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagReading {
    pub formatted_value: String,
    #[serde(default)]
    pub units: String,
}

/// Current data for one device, as returned by `ManagerFacade::all_data`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub connected: bool,
    /// Tag name → latest reading.
    #[serde(default)]
    pub data: BTreeMap<String, TagReading>,
}

/// One stored sample from the Manager's historical data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalRecord {
    pub device_name: String,
    pub tag_name: String,
    pub value: Value,
    #[serde(default)]
    pub units: String,
    pub timestamp: DateTime<Utc>,
}

/// One entry of the Manager's alarm history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmRecord {
    pub device_name: String,
    pub tag_name: String,
    pub alarm_type: String,
    pub severity: String,
}

/// Narrows a historical-data query. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_name: Option<String>,
}

/// Narrows an alarm-history query. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
}

/// Declared type of a tag's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagDataType {
    Bool,
    Int,
    Real,
}

/// One tag polled from a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagConfig {
    pub name: String,
    /// Device-side address, e.g. `"DB1.DBD0"`.
    pub address: String,
    pub data_type: TagDataType,
    #[serde(default)]
    pub units: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alarm_high: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alarm_low: Option<f64>,
}

/// Connection and polling configuration for one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub tags: Vec<TagConfig>,
}

impl DeviceSnapshot {
    /// Number of tags with a current reading.
    pub fn point_count(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_system_status_wire_names() {
        let status: SystemStatus = serde_json::from_value(json!({
            "devices": { "connected": 2, "total": 3 },
            "data": { "pointsLogged": 1200, "alarmsGenerated": 4 },
            "system": { "uptimeSeconds": 3600 },
            "connections": { "successRatePercent": 97.5 }
        }))
        .expect("status parses");

        assert_eq!(status.devices.connected, 2);
        assert_eq!(status.devices.total, 3);
        assert_eq!(status.data.points_logged, 1200);
        assert_eq!(status.data.alarms_generated, 4);
        assert_eq!(status.system.uptime_seconds, 3600);
        assert!((status.connections.success_rate_percent - 97.5).abs() < 1e-9);
    }

    #[test]
    fn test_device_status_wire_names() {
        let status: DeviceStatus = serde_json::from_value(json!({
            "name": "press-1",
            "address": "10.0.0.5",
            "port": 102,
            "status": { "connected": true, "activeTags": 8 },
            "statistics": { "dataQualityPercent": 99.0 }
        }))
        .expect("device status parses");

        assert_eq!(status.name, "press-1");
        assert_eq!(status.port, 102);
        assert!(status.status.connected);
        assert_eq!(status.status.active_tags, 8);
    }

    #[test]
    fn test_device_snapshot_defaults_to_empty_data() {
        let snapshot: DeviceSnapshot =
            serde_json::from_value(json!({ "connected": false })).unwrap();
        assert!(!snapshot.connected);
        assert_eq!(snapshot.point_count(), 0);
    }

    #[test]
    fn test_historical_record_keeps_raw_value() {
        let record: HistoricalRecord = serde_json::from_value(json!({
            "deviceName": "press-1",
            "tagName": "Temperature",
            "value": 71.25,
            "units": "°C",
            "timestamp": "2024-05-01T12:00:00Z"
        }))
        .unwrap();
        assert_eq!(record.value, json!(71.25));
        assert_eq!(record.timestamp.to_rfc3339(), "2024-05-01T12:00:00+00:00");
    }

    #[test]
    fn test_empty_filter_serializes_to_empty_object() {
        let value = serde_json::to_value(HistoryFilter::default()).unwrap();
        assert_eq!(value, json!({}));
    }

    #[test]
    fn test_device_config_optional_limits_omitted() {
        let config = DeviceConfig {
            name: "line-2".to_string(),
            address: "192.168.1.20".to_string(),
            port: 502,
            poll_interval_ms: 1000,
            tags: vec![TagConfig {
                name: "Running".to_string(),
                address: "M0.0".to_string(),
                data_type: TagDataType::Bool,
                units: String::new(),
                alarm_high: None,
                alarm_low: None,
            }],
        };
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["pollIntervalMs"], json!(1000));
        assert_eq!(value["tags"][0]["dataType"], json!("bool"));
        assert!(value["tags"][0].get("alarmHigh").is_none());
    }
}
