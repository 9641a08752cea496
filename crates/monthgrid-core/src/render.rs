use std::io::{self, Write};

use anyhow::anyhow;
use unicode_width::UnicodeWidthStr;

use crate::calendar::Calendar;
use crate::config::Config;
use crate::event::Event;
use crate::grid::StyleTag;

const WEEKDAY_ABBREVS: [&str; 7] = ["Su", "Mo", "Tu", "We", "Th", "Fr", "Sa"];

// 7 cells of width 3 plus 6 separating spaces.
const GRID_WIDTH: usize = 7 * 3 + 6;

/// Text renderer for grids and event lists. Color is a config switch,
/// exactly one knob.
#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    /// Prints the month grid: centered title, weekday header aligned to
    /// the configured week start, then one row per week. Today renders
    /// inverted, days with events yellow, adjacent-month days dimmed.
    #[tracing::instrument(skip(self, calendar))]
    pub fn print_grid(&mut self, calendar: &Calendar) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let title = calendar.reference().format("%B %Y").to_string();
        writeln!(out, "{}", center(&title, GRID_WIDTH))?;

        let header = (0..7)
            .map(|offset| {
                let index = (calendar.week_start() as usize + offset) % 7;
                format!("{:>3}", WEEKDAY_ABBREVS[index])
            })
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(out, "{header}")?;

        for week in calendar.weeks() {
            let row = week
                .days
                .iter()
                .map(|day| {
                    let label = format!("{:>3}", day.day_of_month);
                    match self.cell_color(&day.style) {
                        Some(code) => self.paint(&label, code),
                        None => label,
                    }
                })
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(out, "{row}")?;
        }

        let mut busy_days = calendar
            .weeks()
            .iter()
            .flat_map(|week| week.days.iter())
            .filter(|day| day.is_current_month && day.has_events())
            .peekable();
        if busy_days.peek().is_some() {
            writeln!(out)?;
            for day in busy_days {
                for event in &day.events {
                    writeln!(out, "{}  {}", day.date.format("%b %d"), describe(event))?;
                }
            }
        }

        Ok(())
    }

    /// Prints the events on one date, one per line.
    #[tracing::instrument(skip(self, events))]
    pub fn print_events(&mut self, events: &[Event]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        for event in events {
            writeln!(out, "{}", describe(event))?;
        }
        Ok(())
    }

    fn cell_color(&self, style: &[StyleTag]) -> Option<&'static str> {
        if style.contains(&StyleTag::AdjacentMonth) {
            return Some("90");
        }
        match (
            style.contains(&StyleTag::Today),
            style.contains(&StyleTag::HasEvents),
        ) {
            (true, true) => Some("7;33"),
            (true, false) => Some("7"),
            (false, true) => Some("33"),
            (false, false) => None,
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if self.color {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }
}

fn describe(event: &Event) -> String {
    match &event.subject {
        Some(subject) => format!("{} ({})", subject, event.id),
        None => event.id.clone(),
    }
}

fn center(text: &str, width: usize) -> String {
    let text_width = text.width();
    if text_width >= width {
        return text.to_string();
    }
    let pad = (width - text_width) / 2;
    format!("{}{}", " ".repeat(pad), text)
}
