//! Text helpers shared by the report and event-log output.

use serde_json::Value;

/// Format a counter with thousands separators.
///
/// # Examples
///
/// ```
/// use plc_core::formatting::format_count;
///
/// assert_eq!(format_count(0), "0");
/// assert_eq!(format_count(999), "999");
/// assert_eq!(format_count(1_234_567), "1,234,567");
/// ```
pub fn format_count(value: u64) -> String {
    group_thousands(&value.to_string())
}

/// Format a percentage with one decimal place, e.g. `"97.5%"`.
///
/// Non-finite input renders as `"n/a"`.
///
/// # Examples
///
/// ```
/// use plc_core::formatting::format_percent;
///
/// assert_eq!(format_percent(97.54), "97.5%");
/// assert_eq!(format_percent(100.0), "100.0%");
/// assert_eq!(format_percent(f64::NAN), "n/a");
/// ```
pub fn format_percent(value: f64) -> String {
    if !value.is_finite() {
        return "n/a".to_string();
    }
    format!("{:.1}%", value)
}

/// Format an uptime in seconds as a compact human-readable string.
///
/// * `< 60` seconds → `"42s"`
/// * `< 1` hour → `"5m 3s"`
/// * `< 1` day → `"2h 5m"`
/// * otherwise → `"3d 4h"`
///
/// # Examples
///
/// ```
/// use plc_core::formatting::format_uptime;
///
/// assert_eq!(format_uptime(42), "42s");
/// assert_eq!(format_uptime(303), "5m 3s");
/// assert_eq!(format_uptime(7_500), "2h 5m");
/// assert_eq!(format_uptime(273_600), "3d 4h");
/// ```
pub fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let mins = (seconds % 3_600) / 60;
    let secs = seconds % 60;

    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, mins)
    } else if mins > 0 {
        format!("{}m {}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Render a raw tag value for a log line: numbers with up to two decimals,
/// booleans as `ON`/`OFF`, strings unquoted.
///
/// # Examples
///
/// ```
/// use plc_core::formatting::format_tag_value;
/// use serde_json::json;
///
/// assert_eq!(format_tag_value(&json!(71.256)), "71.26");
/// assert_eq!(format_tag_value(&json!(12)), "12");
/// assert_eq!(format_tag_value(&json!(true)), "ON");
/// assert_eq!(format_tag_value(&json!("AUTO")), "AUTO");
/// ```
pub fn format_tag_value(value: &Value) -> String {
    match value {
        Value::Bool(true) => "ON".to_string(),
        Value::Bool(false) => "OFF".to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) if n.is_f64() => n
            .as_f64()
            .map(|f| format!("{:.2}", f))
            .unwrap_or_else(|| n.to_string()),
        Value::Number(n) => n.to_string(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

/// Render `value` with its `units` suffix when units are present.
pub fn with_units(value: &str, units: &str) -> String {
    if units.is_empty() {
        value.to_string()
    } else {
        format!("{} {}", value, units)
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(s: &str) -> String {
    if s.len() <= 3 {
        return s.to_string();
    }
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    let remainder = s.len() % 3;
    for (i, c) in s.chars().enumerate() {
        if i != 0 && i % 3 == remainder {
            result.push(',');
        }
        result.push(c);
    }
    result
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_count_exact_thousands() {
        assert_eq!(format_count(1_000), "1,000");
        assert_eq!(format_count(100_000), "100,000");
    }

    #[test]
    fn test_format_percent_rounds() {
        assert_eq!(format_percent(0.04), "0.0%");
        assert_eq!(format_percent(66.666), "66.7%");
        assert_eq!(format_percent(f64::INFINITY), "n/a");
    }

    #[test]
    fn test_format_uptime_boundaries() {
        assert_eq!(format_uptime(0), "0s");
        assert_eq!(format_uptime(60), "1m 0s");
        assert_eq!(format_uptime(3_600), "1h 0m");
        assert_eq!(format_uptime(86_400), "1d 0h");
    }

    #[test]
    fn test_format_tag_value_null_and_nested() {
        assert_eq!(format_tag_value(&Value::Null), "-");
        assert_eq!(format_tag_value(&json!([1, 2])), "[1,2]");
    }

    #[test]
    fn test_format_tag_value_negative_real() {
        assert_eq!(format_tag_value(&json!(-3.5)), "-3.50");
    }

    #[test]
    fn test_with_units() {
        assert_eq!(with_units("71.26", "°C"), "71.26 °C");
        assert_eq!(with_units("ON", ""), "ON");
    }
}
