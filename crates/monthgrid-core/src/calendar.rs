use anyhow::anyhow;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::debug;

use crate::datetime::{add_months, civil_date, display_timezone};
use crate::event::Event;
use crate::grid::{self, Week, week_for_date, week_for_date_mut};

/// One month view over the last-known event set.
///
/// The calendar owns its grid outright: every mutation rebuilds or
/// patches `weeks` synchronously, and callers only ever borrow the
/// result. Navigation produces a new reference date value; nothing else
/// is carried between rebuilds except the event set and, for
/// preservation, the previous grid's day buckets.
#[derive(Debug, Clone)]
pub struct Calendar {
    reference: NaiveDate,
    week_start: u8,
    tz: Tz,
    today_override: Option<NaiveDate>,
    events: Vec<Event>,
    weeks: Vec<Week>,
}

impl Calendar {
    /// A calendar for the month containing `reference`, with no events
    /// yet. Fails fast when `week_start` is outside 0-6.
    pub fn new(reference: NaiveDate, week_start: u8) -> anyhow::Result<Self> {
        grid::validate_week_start(week_start)?;

        let mut calendar = Self {
            reference,
            week_start,
            tz: display_timezone(),
            today_override: None,
            events: Vec::new(),
            weeks: Vec::new(),
        };
        calendar.weeks = calendar.fresh_grid()?;
        Ok(calendar)
    }

    /// Overrides the display timezone resolved from the environment.
    pub fn with_timezone(mut self, tz: Tz) -> anyhow::Result<Self> {
        self.tz = tz;
        self.weeks = self.fresh_grid()?;
        Ok(self)
    }

    /// Pins "today" to a fixed date instead of the current date. Meant
    /// for tests and reproducible rendering.
    pub fn with_today(mut self, today: NaiveDate) -> anyhow::Result<Self> {
        self.today_override = Some(today);
        self.weeks = self.fresh_grid()?;
        Ok(self)
    }

    #[must_use]
    pub fn reference(&self) -> NaiveDate {
        self.reference
    }

    #[must_use]
    pub fn week_start(&self) -> u8 {
        self.week_start
    }

    #[must_use]
    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// The date `is_today` is judged against: the true current date in
    /// the display timezone, never the navigated reference date.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.today_override
            .unwrap_or_else(|| civil_date(Utc::now(), self.tz))
    }

    #[must_use]
    pub fn weeks(&self) -> &[Week] {
        &self.weeks
    }

    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Replace-set association: swaps in the full event list and
    /// recomputes every day bucket from scratch. Idempotent.
    #[tracing::instrument(skip(self, events), fields(events = events.len()))]
    pub fn set_events(&mut self, events: Vec<Event>) -> anyhow::Result<()> {
        self.events = events;
        self.weeks = self.fresh_grid()?;
        Ok(())
    }

    /// Incremental association: drops each record of `batch` into the
    /// day bucket matching its civil date within the already-built grid
    /// and recomputes that day's style. Repeated deliveries are kept
    /// as-is; deduplication is the caller's business, not ours.
    ///
    /// Records dated outside the grid (or without a usable timestamp)
    /// are skipped here but still join the last-known set, so a later
    /// navigation to their month picks them up.
    #[tracing::instrument(skip(self, batch), fields(batch = batch.len()))]
    pub fn append_events(&mut self, batch: &[Event]) {
        for event in batch {
            let Some(start) = event.start else {
                debug!(id = %event.id, "append: record has no usable timestamp");
                continue;
            };
            let date = civil_date(start, self.tz);

            let Some(week) = week_for_date_mut(&mut self.weeks, date) else {
                debug!(id = %event.id, %date, "append: date outside current grid");
                continue;
            };
            if let Some(day) = week.days.iter_mut().find(|day| day.date == date) {
                day.events.push(event.clone());
                day.restyle();
            }
        }

        self.events.extend(batch.iter().cloned());
    }

    /// Regeneration with preservation: rebuilds the grid for the current
    /// reference date, then any day whose date also existed in the
    /// previous grid inherits that day's bucket verbatim (appended
    /// duplicates included). Days new to the grid keep their freshly
    /// computed bucket.
    #[tracing::instrument(skip(self))]
    pub fn rebuild(&mut self) -> anyhow::Result<()> {
        let previous = std::mem::take(&mut self.weeks);
        let mut weeks = self.fresh_grid()?;

        for day in weeks.iter_mut().flat_map(|week| week.days.iter_mut()) {
            if let Some(old_week) = week_for_date(&previous, day.date)
                && let Some(old_day) = old_week.days.iter().find(|old| old.date == day.date)
            {
                day.events = old_day.events.clone();
                day.restyle();
            }
        }

        self.weeks = weeks;
        Ok(())
    }

    /// Moves the reference date one calendar month forward or backward
    /// (end-of-month dates clamp, so Jan 31 steps to Feb 28/29) and
    /// regenerates the grid with preservation. Returns the new grid.
    #[tracing::instrument(skip(self))]
    pub fn advance_month(&mut self, direction: i32) -> anyhow::Result<&[Week]> {
        if direction != 1 && direction != -1 {
            return Err(anyhow!(
                "invalid month navigation direction {direction}: expected +1 or -1"
            ));
        }

        self.reference = add_months(self.reference, direction);
        self.rebuild()?;
        debug!(reference = %self.reference, "navigated month");
        Ok(&self.weeks)
    }

    /// The civil date the event with `id` sits on, scanning the grid in
    /// week-then-day order. `None` when no day holds it.
    #[must_use]
    pub fn find_date_for_event(&self, id: &str) -> Option<NaiveDate> {
        for week in &self.weeks {
            for day in &week.days {
                if day.events.iter().any(|event| event.id == id) {
                    return Some(day.date);
                }
            }
        }
        None
    }

    /// The events on `date`, or an empty slice when the date falls
    /// outside the grid. The grid is never extended to cover it.
    #[must_use]
    pub fn find_events_for_date(&self, date: NaiveDate) -> &[Event] {
        week_for_date(&self.weeks, date)
            .and_then(|week| week.days.iter().find(|day| day.date == date))
            .map(|day| day.events.as_slice())
            .unwrap_or(&[])
    }

    fn fresh_grid(&self) -> anyhow::Result<Vec<Week>> {
        grid::build_grid(
            self.reference,
            self.week_start,
            &self.events,
            self.today(),
            self.tz,
        )
    }
}
