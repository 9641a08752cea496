use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An event record as delivered by the external data source. The engine
/// only interprets `id` and `start`; everything else is carried through
/// unchanged, including fields it has never heard of (`extra`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: String,

    #[serde(default)]
    pub subject: Option<String>,

    /// When the event occurs. `None` when the source omitted the field
    /// or sent something unparseable; such records never land in a day
    /// bucket but are otherwise kept intact.
    #[serde(default, with = "lenient_date_serde")]
    pub start: Option<DateTime<Utc>>,

    #[serde(default, with = "lenient_date_serde")]
    pub created: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Event {
    pub fn new(id: impl Into<String>, start: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            subject: None,
            start: Some(start),
            created: None,
            extra: BTreeMap::new(),
        }
    }
}

/// Timestamp serde that refuses to fail: a malformed or absent value
/// deserializes to `None` so one bad record cannot abort a whole feed.
pub mod lenient_date_serde {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(dt: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match dt {
            Some(value) => serializer.serialize_str(&value.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(parse_timestamp))
    }

    pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
        let token = raw.trim();
        if token.is_empty() {
            return None;
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(token) {
            return Some(dt.with_timezone(&Utc));
        }

        for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
            if let Ok(ndt) = NaiveDateTime::parse_from_str(token, fmt) {
                return Some(DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc));
            }
        }

        if let Ok(date) = NaiveDate::parse_from_str(token, "%Y-%m-%d") {
            let midnight = date.and_hms_opt(0, 0, 0)?;
            return Some(DateTime::<Utc>::from_naive_utc_and_offset(midnight, Utc));
        }

        tracing::debug!(raw = %token, "unparseable event timestamp, treating as absent");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::Event;

    #[test]
    fn malformed_start_becomes_none_instead_of_error() {
        let event: Event = serde_json::from_str(
            r#"{"id": "event-1", "subject": "Kickoff", "start": "not a date"}"#,
        )
        .expect("record with bad timestamp still deserializes");
        assert_eq!(event.id, "event-1");
        assert!(event.start.is_none());
    }

    #[test]
    fn missing_start_becomes_none() {
        let event: Event =
            serde_json::from_str(r#"{"id": "event-2"}"#).expect("record without start");
        assert!(event.start.is_none());
        assert!(event.created.is_none());
    }

    #[test]
    fn unknown_fields_survive_a_round_trip() {
        let raw = r#"{"id":"event-3","start":"2025-09-01T09:30:00Z","WhoId":"003xx0000001"}"#;
        let event: Event = serde_json::from_str(raw).expect("deserialize");
        assert_eq!(
            event.extra.get("WhoId").and_then(|v| v.as_str()),
            Some("003xx0000001")
        );

        let back = serde_json::to_string(&event).expect("serialize");
        let reparsed: Event = serde_json::from_str(&back).expect("reparse");
        assert_eq!(reparsed, event);
    }

    #[test]
    fn accepts_dates_without_time_component() {
        let event: Event = serde_json::from_str(r#"{"id":"event-4","start":"2025-09-15"}"#)
            .expect("date-only start");
        let start = event.start.expect("parsed");
        assert_eq!(start.to_rfc3339(), "2025-09-15T00:00:00+00:00");
    }
}
