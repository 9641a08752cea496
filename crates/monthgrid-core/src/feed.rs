use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use chrono_tz::Tz;
use tracing::info;

use crate::datetime::civil_date;
use crate::event::Event;

/// Reads an event feed: a JSON array of event records, the shape the
/// external data source delivers. This is the whole async-fetch
/// boundary collapsed to a synchronous read; the engine never awaits.
#[tracing::instrument]
pub fn load_events(path: &Path) -> anyhow::Result<Vec<Event>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read event feed {}", path.display()))?;
    parse_events(&raw)
        .with_context(|| format!("failed to parse event feed {}", path.display()))
}

/// Same feed shape, delivered on stdin (`--events -`).
pub fn read_events_from_stdin() -> anyhow::Result<Vec<Event>> {
    let mut raw = String::new();
    std::io::stdin()
        .lock()
        .read_to_string(&mut raw)
        .context("failed to read event feed from stdin")?;
    parse_events(&raw).context("failed to parse event feed from stdin")
}

fn parse_events(raw: &str) -> anyhow::Result<Vec<Event>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let events: Vec<Event> =
        serde_json::from_str(trimmed).context("event feed must be a JSON array of records")?;
    info!(events = events.len(), "loaded event feed");
    Ok(events)
}

/// Flat-source twin of `Calendar::find_date_for_event`: answers from
/// the raw feed instead of the grid. For events inside the grid's
/// covered range the two agree; this one also sees events the current
/// grid does not cover.
#[must_use]
pub fn event_date(events: &[Event], id: &str, tz: Tz) -> Option<NaiveDate> {
    events
        .iter()
        .find(|event| event.id == id)
        .and_then(|event| event.start)
        .map(|ts| civil_date(ts, tz))
}

/// Flat-source twin of `Calendar::find_events_for_date`.
#[must_use]
pub fn events_on(events: &[Event], date: NaiveDate, tz: Tz) -> Vec<Event> {
    events
        .iter()
        .filter(|event| {
            event
                .start
                .map(|ts| civil_date(ts, tz) == date)
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{event_date, events_on, parse_events};
    use crate::calendar::Calendar;
    use crate::event::Event;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    fn event_on(id: &str, year: i32, month: u32, day: u32) -> Event {
        let start = Utc
            .with_ymd_and_hms(year, month, day, 14, 0, 0)
            .single()
            .expect("valid timestamp");
        Event::new(id, start)
    }

    #[test]
    fn empty_feed_is_no_events() {
        assert!(parse_events("").expect("empty feed").is_empty());
        assert!(parse_events("[]").expect("empty array").is_empty());
    }

    #[test]
    fn rejects_non_array_payloads() {
        assert!(parse_events(r#"{"id":"event-1"}"#).is_err());
    }

    #[test]
    fn flat_queries_agree_with_the_grid_for_covered_dates() {
        let events = vec![
            event_on("event-1", 2025, 9, 1),
            event_on("event-2", 2025, 9, 15),
        ];
        let mut calendar = Calendar::new(date(2025, 9, 15), 0)
            .and_then(|c| c.with_timezone(chrono_tz::UTC))
            .and_then(|c| c.with_today(date(2025, 9, 15)))
            .expect("calendar");
        calendar.set_events(events.clone()).expect("set events");

        for event in &events {
            assert_eq!(
                event_date(&events, &event.id, chrono_tz::UTC),
                calendar.find_date_for_event(&event.id)
            );
        }
        assert_eq!(event_date(&events, "event-9", chrono_tz::UTC), None);

        let flat = events_on(&events, date(2025, 9, 15), chrono_tz::UTC);
        let gridded = calendar.find_events_for_date(date(2025, 9, 15));
        assert_eq!(flat.len(), gridded.len());
        assert_eq!(flat[0].id, gridded[0].id);
    }

    #[test]
    fn flat_queries_skip_events_without_timestamps() {
        let mut orphan = event_on("orphan", 2025, 9, 10);
        orphan.start = None;
        let events = vec![orphan];

        assert_eq!(event_date(&events, "orphan", chrono_tz::UTC), None);
        assert!(events_on(&events, date(2025, 9, 10), chrono_tz::UTC).is_empty());
    }
}
