//! Raw event handling: batch-shape extraction, severity decoding, and
//! classification of zone-entry warnings.
//!
//! The event feed has no contractual schema. Field names drift between
//! account configurations and API revisions, and the batch itself may be a
//! bare array or an object wrapping one. Everything here is tolerant:
//! unrecognized shapes yield zero events and unclassifiable records yield
//! `None`, never an error.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

/// Event severity as reported by the feed.
///
/// Decoded from the one-character codes used by `eventlevel_cur` (`M`, `N`,
/// `W`, `1`-`3`) or from an integer 0-5 in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Message,
    Notice,
    Warning,
    Alarm1,
    Alarm2,
    Alarm3,
}

impl Severity {
    /// The single-character wire code for this severity.
    pub fn code(self) -> char {
        match self {
            Severity::Message => 'M',
            Severity::Notice => 'N',
            Severity::Warning => 'W',
            Severity::Alarm1 => '1',
            Severity::Alarm2 => '2',
            Severity::Alarm3 => '3',
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => {
                let c = s.trim().chars().next()?;
                match c.to_ascii_uppercase() {
                    'M' => Some(Severity::Message),
                    'N' => Some(Severity::Notice),
                    'W' => Some(Severity::Warning),
                    '1' => Some(Severity::Alarm1),
                    '2' => Some(Severity::Alarm2),
                    '3' => Some(Severity::Alarm3),
                    _ => None,
                }
            }
            Value::Number(n) => match n.as_i64()? {
                0 => Some(Severity::Message),
                1 => Some(Severity::Notice),
                2 => Some(Severity::Warning),
                3 => Some(Severity::Alarm1),
                4 => Some(Severity::Alarm2),
                5 => Some(Severity::Alarm3),
                _ => None,
            },
            _ => None,
        }
    }
}

/// An actionable zone-entry warning extracted from a raw feed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedEvent {
    /// External event identity; may be empty when the feed omits it.
    pub event_id: String,
    /// Vehicle object number; never empty.
    pub vehicle_id: String,
    /// Human-readable location, falling back to the message text.
    pub location_label: String,
    pub severity: Severity,
    /// Best-effort event time; `None` when absent or unparseable.
    pub occurred_at: Option<DateTime<Utc>>,
}

const EVENT_ID_KEYS: &[&str] = &["event_id", "eventid", "msgid"];
const VEHICLE_KEYS: &[&str] = &["objectno", "objectuid", "objectname"];
const SEVERITY_KEYS: &[&str] = &["eventlevel_cur", "eventlevel", "severity"];
const MESSAGE_KEYS: &[&str] = &["msgtext", "msg_text", "text"];
const POSITION_KEYS: &[&str] = &["postext", "pos_text"];
const TIME_KEYS: &[&str] = &["eventtime", "msgtime", "time"];

/// Container keys tried, in order, when the batch is wrapped in an object.
const CONTAINER_KEYS: &[&str] = &["events", "items", "records", "data"];

const DEFAULT_LOCATION: &str = "Unknown Location";

/// Pulls individual event records out of a fetch response.
///
/// Accepts a bare array or an object with one of the known container keys;
/// anything else counts as an empty batch.
pub fn extract_events(payload: &Value) -> Vec<Value> {
    if let Some(items) = payload.as_array() {
        return items.clone();
    }

    if let Some(obj) = payload.as_object() {
        for key in CONTAINER_KEYS {
            if let Some(items) = obj.get(*key).and_then(Value::as_array) {
                return items.clone();
            }
        }
    }

    Vec::new()
}

/// Decides whether a raw record is an actionable zone-entry warning.
///
/// Actionable means: Warning severity, message contains "entering area", and
/// the message is not an output status echo. Returns `None` for everything
/// else, including records without a usable vehicle identity -- those are
/// expected noise from a shared event feed, not errors.
pub fn classify(raw: &Value) -> Option<ClassifiedEvent> {
    let severity = first_value(raw, SEVERITY_KEYS).and_then(Severity::from_value)?;
    if severity != Severity::Warning {
        return None;
    }

    let message = first_string(raw, MESSAGE_KEYS)?;
    let lowered = message.to_lowercase();
    // Output switch confirmations come back on the same feed at Warning
    // level; without this check every buzzer activation would classify as a
    // fresh zone entry.
    if lowered.contains("output") {
        return None;
    }
    if !lowered.contains("entering area") {
        return None;
    }

    let vehicle_id = first_string(raw, VEHICLE_KEYS).filter(|v| !v.is_empty())?;

    let location_label = first_string(raw, POSITION_KEYS)
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| {
            if message.is_empty() {
                DEFAULT_LOCATION.to_string()
            } else {
                message.clone()
            }
        });

    Some(ClassifiedEvent {
        event_id: first_string(raw, EVENT_ID_KEYS).unwrap_or_default(),
        vehicle_id,
        location_label,
        severity,
        occurred_at: first_string(raw, TIME_KEYS).and_then(|t| parse_timestamp(&t)),
    })
}

fn first_value<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let obj = raw.as_object()?;
    keys.iter().find_map(|k| obj.get(*k)).filter(|v| !v.is_null())
}

/// Returns the first present key as a string, stringifying numeric ids.
fn first_string(raw: &Value, keys: &[&str]) -> Option<String> {
    match first_value(raw, keys)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%d.%m.%Y %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn warning(msg: &str) -> Value {
        json!({
            "event_id": "E1",
            "objectno": "V1",
            "eventlevel_cur": "W",
            "msgtext": msg,
        })
    }

    #[test]
    fn test_classify_zone_entry_warning() {
        let raw = warning("Entering area Bridge X");
        let event = classify(&raw).unwrap();
        assert_eq!(event.event_id, "E1");
        assert_eq!(event.vehicle_id, "V1");
        assert_eq!(event.severity, Severity::Warning);
        assert_eq!(event.location_label, "Entering area Bridge X");
    }

    #[test]
    fn test_classify_rejects_non_warning_severity() {
        for code in ["M", "N", "1", "2", "3"] {
            let mut raw = warning("Entering area Bridge X");
            raw["eventlevel_cur"] = json!(code);
            assert!(classify(&raw).is_none(), "severity {code} should not classify");
        }
    }

    #[test]
    fn test_classify_rejects_message_without_entering_area() {
        let raw = warning("Leaving area Bridge X");
        assert!(classify(&raw).is_none());
    }

    #[test]
    fn test_classify_rejects_output_echo() {
        // Warning level and "entering area" both present, still an echo.
        let raw = warning("Output Low Bridge switched ON while entering area");
        assert!(classify(&raw).is_none());

        let raw = warning("Output Low Bridge switched ON");
        assert!(classify(&raw).is_none());
    }

    #[test]
    fn test_classify_output_check_is_case_insensitive() {
        let raw = warning("entering area with OUTPUT echo");
        assert!(classify(&raw).is_none());
    }

    #[test]
    fn test_classify_requires_vehicle_id() {
        let mut raw = warning("Entering area Bridge X");
        raw.as_object_mut().unwrap().remove("objectno");
        assert!(classify(&raw).is_none());

        let raw = json!({
            "objectno": "",
            "eventlevel_cur": "W",
            "msgtext": "Entering area Bridge X",
        });
        assert!(classify(&raw).is_none());
    }

    #[test]
    fn test_classify_prefers_position_text_for_location() {
        let mut raw = warning("Entering area Bridge X");
        raw["postext"] = json!("A38 Bridge, Plymouth");
        let event = classify(&raw).unwrap();
        assert_eq!(event.location_label, "A38 Bridge, Plymouth");
    }

    #[test]
    fn test_classify_missing_event_id_is_empty() {
        let raw = json!({
            "objectno": "V2",
            "eventlevel_cur": "W",
            "msgtext": "Entering area Bridge Y",
        });
        let event = classify(&raw).unwrap();
        assert_eq!(event.event_id, "");
    }

    #[test]
    fn test_classify_key_variants() {
        let raw = json!({
            "msgid": 4471,
            "objectuid": 12,
            "eventlevel": "w",
            "msg_text": "entering area Low Bridge",
            "msgtime": "2026-08-29 10:15:00",
        });
        let event = classify(&raw).unwrap();
        assert_eq!(event.event_id, "4471");
        assert_eq!(event.vehicle_id, "12");
        assert!(event.occurred_at.is_some());
    }

    #[test]
    fn test_severity_numeric_codes() {
        assert_eq!(Severity::from_value(&json!(2)), Some(Severity::Warning));
        assert_eq!(Severity::from_value(&json!(5)), Some(Severity::Alarm3));
        assert_eq!(Severity::from_value(&json!(9)), None);
        assert_eq!(Severity::from_value(&json!("X")), None);
    }

    #[test]
    fn test_extract_events_bare_array() {
        let payload = json!([{"a": 1}, {"b": 2}]);
        assert_eq!(extract_events(&payload).len(), 2);
    }

    #[test]
    fn test_extract_events_container_keys() {
        for key in ["events", "items", "records", "data"] {
            let payload = json!({ key: [{"a": 1}] });
            assert_eq!(extract_events(&payload).len(), 1, "container {key}");
        }
    }

    #[test]
    fn test_extract_events_unrecognized_shape_is_empty() {
        assert!(extract_events(&json!({"count": 3})).is_empty());
        assert!(extract_events(&json!("nope")).is_empty());
        assert!(extract_events(&json!(null)).is_empty());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2026-08-29T10:15:00Z").is_some());
        assert!(parse_timestamp("2026-08-29 10:15:00").is_some());
        assert!(parse_timestamp("29.08.2026 10:15:00").is_some());
        assert!(parse_timestamp("last tuesday").is_none());
    }
}
