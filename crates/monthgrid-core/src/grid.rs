use anyhow::anyhow;
use chrono::{Datelike, Duration, NaiveDate};
use chrono_tz::Tz;
use tracing::debug;

use crate::datetime::{civil_date, days_in_month, weekday_index};
use crate::event::Event;

/// Presentation tags derived from a day's flags. `HasEvents` and `Today`
/// can both apply to the same day; the other two are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleTag {
    AdjacentMonth,
    HasEvents,
    Today,
    Plain,
}

impl StyleTag {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StyleTag::AdjacentMonth => "adjacent-month",
            StyleTag::HasEvents => "selected",
            StyleTag::Today => "today",
            StyleTag::Plain => "plain-day",
        }
    }
}

/// One cell of the grid: a civil day, its flags, and the events whose
/// start timestamp falls on it.
#[derive(Debug, Clone)]
pub struct Day {
    pub date: NaiveDate,
    /// 1-31, duplicated from `date` as the display label.
    pub day_of_month: u32,
    pub is_current_month: bool,
    pub is_today: bool,
    pub events: Vec<Event>,
    pub style: Vec<StyleTag>,
}

impl Day {
    #[must_use]
    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Space-joined class names, ready for a class attribute.
    #[must_use]
    pub fn class_attr(&self) -> String {
        self.style
            .iter()
            .map(|tag| tag.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Recomputes `style` after the event list changed.
    pub(crate) fn restyle(&mut self) {
        self.style = derive_style(self.is_current_month, self.is_today, self.has_events());
    }
}

/// A run of exactly seven consecutive days. `week_number` is the 1-based
/// position within the generated grid, not an ISO week number.
#[derive(Debug, Clone)]
pub struct Week {
    pub week_number: u32,
    pub days: Vec<Day>,
}

impl Week {
    /// Whether `date` falls inside this week's day range.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        match (self.days.first(), self.days.last()) {
            (Some(first), Some(last)) => first.date <= date && date <= last.date,
            _ => false,
        }
    }
}

/// Style precedence: adjacent-month wins outright; inside the reference
/// month, has-events and today stack, and plain-day is the fallback.
#[must_use]
pub fn derive_style(is_current_month: bool, is_today: bool, has_events: bool) -> Vec<StyleTag> {
    if !is_current_month {
        return vec![StyleTag::AdjacentMonth];
    }

    let mut tags = Vec::with_capacity(2);
    if has_events {
        tags.push(StyleTag::HasEvents);
    }
    if is_today {
        tags.push(StyleTag::Today);
    }
    if tags.is_empty() {
        tags.push(StyleTag::Plain);
    }
    tags
}

/// Rejects week-start values outside 0 (Sunday) through 6 (Saturday).
pub fn validate_week_start(week_start: u8) -> anyhow::Result<()> {
    if week_start > 6 {
        return Err(anyhow!(
            "invalid week start day {week_start}: expected 0 (Sunday) through 6 (Saturday)"
        ));
    }
    Ok(())
}

/// Builds the month-aligned grid for the month containing `reference`.
///
/// The grid runs from the last `week_start` day on or before the 1st of
/// the month through the day that completes the final week after the
/// month's last day, so it always covers the month in whole weeks (4-6
/// of them). Events are bucketed by civil-date equality of their start
/// timestamp in `tz`; records without a usable timestamp go nowhere.
#[tracing::instrument(skip(events), fields(events = events.len()))]
pub fn build_grid(
    reference: NaiveDate,
    week_start: u8,
    events: &[Event],
    today: NaiveDate,
    tz: Tz,
) -> anyhow::Result<Vec<Week>> {
    validate_week_start(week_start)?;

    let first_of_month = NaiveDate::from_ymd_opt(reference.year(), reference.month(), 1)
        .ok_or_else(|| anyhow!("invalid reference date: {reference}"))?;
    let last_of_month = NaiveDate::from_ymd_opt(
        reference.year(),
        reference.month(),
        days_in_month(reference.year(), reference.month()),
    )
    .ok_or_else(|| anyhow!("invalid reference date: {reference}"))?;

    let lead = (weekday_index(first_of_month) + 7 - week_start) % 7;
    let tail = 6 - (weekday_index(last_of_month) + 7 - week_start) % 7;
    let start = first_of_month - Duration::days(lead as i64);
    let end = last_of_month + Duration::days(tail as i64);

    let mut weeks = Vec::new();
    let mut current = Week {
        week_number: 1,
        days: Vec::with_capacity(7),
    };

    let mut cursor = start;
    while cursor <= end {
        let day_events: Vec<Event> = events
            .iter()
            .filter(|event| {
                event
                    .start
                    .map(|ts| civil_date(ts, tz) == cursor)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();

        let is_current_month =
            cursor.year() == reference.year() && cursor.month() == reference.month();
        let is_today = cursor == today;
        let style = derive_style(is_current_month, is_today, !day_events.is_empty());

        current.days.push(Day {
            date: cursor,
            day_of_month: cursor.day(),
            is_current_month,
            is_today,
            events: day_events,
            style,
        });

        if current.days.len() == 7 {
            let next_number = current.week_number + 1;
            weeks.push(current);
            current = Week {
                week_number: next_number,
                days: Vec::with_capacity(7),
            };
        }

        cursor += Duration::days(1);
    }

    debug!(
        weeks = weeks.len(),
        start = %start,
        end = %end,
        "built month grid"
    );
    Ok(weeks)
}

/// The week whose day range contains `date`, if the grid covers it.
#[must_use]
pub fn week_for_date(weeks: &[Week], date: NaiveDate) -> Option<&Week> {
    weeks.iter().find(|week| week.contains(date))
}

pub fn week_for_date_mut(weeks: &mut [Week], date: NaiveDate) -> Option<&mut Week> {
    weeks.iter_mut().find(|week| week.contains(date))
}
