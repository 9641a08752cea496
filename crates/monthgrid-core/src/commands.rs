use std::io::{self, Write};

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{debug, instrument};

use crate::calendar::Calendar;
use crate::cli::Command;
use crate::config::Config;
use crate::datetime::{display_timezone, parse_date_expr};
use crate::event::Event;
use crate::feed;
use crate::render::Renderer;

#[instrument(skip(cfg, renderer, events))]
pub fn dispatch(
    cfg: &Config,
    renderer: &mut Renderer,
    events: Vec<Event>,
    command: Command,
) -> anyhow::Result<()> {
    let week_start = cfg.week_start()?;
    let tz = resolve_timezone(cfg)?;
    let now = Utc::now();

    match command {
        Command::Show { date } => {
            let reference = resolve_reference(date.as_deref(), now, tz)?;
            let calendar = month_view(reference, week_start, tz, events)?;
            renderer.print_grid(&calendar)
        }
        Command::Next { date } => {
            let reference = resolve_reference(date.as_deref(), now, tz)?;
            let mut calendar = month_view(reference, week_start, tz, events)?;
            calendar.advance_month(1)?;
            renderer.print_grid(&calendar)
        }
        Command::Prev { date } => {
            let reference = resolve_reference(date.as_deref(), now, tz)?;
            let mut calendar = month_view(reference, week_start, tz, events)?;
            calendar.advance_month(-1)?;
            renderer.print_grid(&calendar)
        }
        Command::Find { event_id } => {
            let mut out = io::stdout().lock();
            // Answer from the flat feed so events outside any one month
            // resolve too; the grid scan agrees wherever it covers.
            match feed::event_date(&events, &event_id, tz) {
                Some(date) => {
                    let calendar = month_view(date, week_start, tz, events)?;
                    let resolved = calendar.find_date_for_event(&event_id).unwrap_or(date);
                    writeln!(out, "{resolved}")?;
                }
                None => {
                    writeln!(out, "no date found for event {event_id}")?;
                }
            }
            Ok(())
        }
        Command::On { date } => {
            let date = parse_date_expr(&date, now, tz)?;
            let calendar = month_view(date, week_start, tz, events)?;
            renderer.print_events(calendar.find_events_for_date(date))
        }
        Command::Config => {
            let mut out = io::stdout().lock();
            let mut pairs: Vec<_> = cfg.iter().collect();
            pairs.sort();
            for (key, value) in pairs {
                writeln!(out, "{key} = {value}")?;
            }
            Ok(())
        }
    }
}

fn resolve_reference(
    date_expr: Option<&str>,
    now: chrono::DateTime<Utc>,
    tz: Tz,
) -> anyhow::Result<NaiveDate> {
    match date_expr {
        Some(expr) => parse_date_expr(expr, now, tz),
        None => Ok(crate::datetime::civil_date(now, tz)),
    }
}

fn resolve_timezone(cfg: &Config) -> anyhow::Result<Tz> {
    match cfg.get("grid.timezone") {
        Some(raw) => raw
            .trim()
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("invalid grid.timezone {raw}: {e}")),
        None => Ok(display_timezone()),
    }
}

fn month_view(
    reference: NaiveDate,
    week_start: u8,
    tz: Tz,
    events: Vec<Event>,
) -> anyhow::Result<Calendar> {
    let mut calendar = Calendar::new(reference, week_start)
        .and_then(|c| c.with_timezone(tz))
        .context("failed to build calendar")?;
    calendar.set_events(events)?;
    debug!(
        reference = %reference,
        weeks = calendar.weeks().len(),
        "built month view"
    );
    Ok(calendar)
}
