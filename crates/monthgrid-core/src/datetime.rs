use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str = "monthgrid-time.toml";
const TIMEZONE_ENV_VAR: &str = "MONTHGRID_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str = "MONTHGRID_TIME_CONFIG";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
    timezone: Option<String>,
    time: Option<TimezoneSection>,
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
    timezone: Option<String>,
}

/// The timezone used to turn event timestamps into civil dates. Resolved
/// once per process: `MONTHGRID_TIMEZONE`, then `monthgrid-time.toml`,
/// then UTC.
pub fn display_timezone() -> Tz {
    static DISPLAY_TZ: OnceLock<Tz> = OnceLock::new();
    *DISPLAY_TZ.get_or_init(resolve_display_timezone)
}

/// The civil date a UTC instant falls on in the given display timezone.
#[must_use]
pub fn civil_date(dt: DateTime<Utc>, tz: Tz) -> NaiveDate {
    dt.with_timezone(&tz).date_naive()
}

/// Day-of-week as the 0=Sunday..6=Saturday index used for week-start
/// configuration.
#[must_use]
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

fn resolve_display_timezone() -> Tz {
    if let Ok(raw) = std::env::var(TIMEZONE_ENV_VAR)
        && let Some(tz) = parse_timezone(&raw, TIMEZONE_ENV_VAR)
    {
        return tz;
    }

    if let Some(path) = timezone_config_path()
        && let Some(tz) = load_timezone_from_file(&path)
    {
        return tz;
    }

    chrono_tz::UTC
}

fn timezone_config_path() -> Option<PathBuf> {
    if let Ok(raw) = std::env::var(TIMEZONE_CONFIG_ENV_VAR) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    std::env::current_dir()
        .ok()
        .map(|dir| dir.join(TIMEZONE_CONFIG_FILE))
}

fn load_timezone_from_file(path: &PathBuf) -> Option<Tz> {
    if !path.exists() {
        tracing::debug!(file = %path.display(), "timezone config file not found");
        return None;
    }

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::error!(file = %path.display(), error = %err, "failed reading timezone config file");
            return None;
        }
    };

    let parsed = match toml::from_str::<TimezoneConfig>(&raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::error!(file = %path.display(), error = %err, "failed parsing timezone config file");
            return None;
        }
    };

    let timezone = parsed
        .timezone
        .or_else(|| parsed.time.and_then(|section| section.timezone));
    let Some(timezone) = timezone else {
        tracing::warn!(file = %path.display(), "timezone config had no timezone field");
        return None;
    };

    parse_timezone(timezone.as_str(), &format!("file:{}", path.display()))
}

fn parse_timezone(raw: &str, source: &str) -> Option<Tz> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        tracing::warn!(source, "timezone source was empty");
        return None;
    }

    match trimmed.parse::<Tz>() {
        Ok(tz) => {
            tracing::info!(source, timezone = %trimmed, "configured display timezone");
            Some(tz)
        }
        Err(err) => {
            tracing::error!(source, timezone = %trimmed, error = %err, "failed to parse timezone id");
            None
        }
    }
}

/// Number of days in a calendar month.
#[must_use]
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(30)
}

/// Calendar month arithmetic with end-of-month clamping: Jan 31 plus one
/// month is Feb 28 (or 29), never an invalid date or a March spillover.
#[must_use]
pub fn add_months(date: NaiveDate, delta: i32) -> NaiveDate {
    let zero_based = date.year() * 12 + date.month0() as i32;
    let target = zero_based + delta;
    let year = target.div_euclid(12);
    let month = target.rem_euclid(12) as u32 + 1;
    let day = date.day().min(days_in_month(year, month));

    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(date)
}

/// Parses the date expressions the CLI accepts into a civil date in the
/// display timezone.
#[tracing::instrument(skip(now), fields(input = input))]
pub fn parse_date_expr(input: &str, now: DateTime<Utc>, tz: Tz) -> anyhow::Result<NaiveDate> {
    let token = input.trim();
    let lower = token.to_ascii_lowercase();

    match lower.as_str() {
        "now" | "today" => return Ok(civil_date(now, tz)),
        "tomorrow" => return Ok(civil_date(now, tz) + Duration::days(1)),
        "yesterday" => return Ok(civil_date(now, tz) - Duration::days(1)),
        _ => {}
    }

    let rel_re = Regex::new(r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dwm])$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;

    if let Some(caps) = rel_re.captures(&lower) {
        let sign: i32 = if &caps["sign"] == "-" { -1 } else { 1 };
        let num: i32 = caps["num"].parse().context("invalid relative amount")?;
        let today = civil_date(now, tz);

        return Ok(match &caps["unit"] {
            "d" => today + Duration::days((sign * num) as i64),
            "w" => today + Duration::days((sign * num) as i64 * 7),
            "m" => add_months(today, sign * num),
            unit => return Err(anyhow!("unknown relative unit: {unit}")),
        });
    }

    if let Ok(date) = NaiveDate::parse_from_str(token, "%Y-%m-%d") {
        return Ok(date);
    }

    if let Some((year, month)) = token.split_once('-')
        && let (Ok(year), Ok(month)) = (year.parse::<i32>(), month.parse::<u32>())
        && (1..=12).contains(&month)
        && let Some(first) = NaiveDate::from_ymd_opt(year, month, 1)
    {
        return Ok(first);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(token) {
        return Ok(civil_date(dt.with_timezone(&Utc), tz));
    }

    Err(anyhow!("unrecognized date expression: {input}")).with_context(|| {
        "supported formats: now/today/tomorrow/yesterday, +Nd/+Nw/+Nm, \
         YYYY-MM-DD, YYYY-MM, RFC3339"
    })
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{add_months, civil_date, days_in_month, parse_date_expr, weekday_index};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn add_months_clamps_to_month_end() {
        assert_eq!(add_months(date(2025, 1, 31), 1), date(2025, 2, 28));
        assert_eq!(add_months(date(2024, 1, 31), 1), date(2024, 2, 29));
        assert_eq!(add_months(date(2025, 3, 31), -1), date(2025, 2, 28));
    }

    #[test]
    fn add_months_crosses_year_boundaries() {
        assert_eq!(add_months(date(2025, 12, 15), 1), date(2026, 1, 15));
        assert_eq!(add_months(date(2025, 1, 15), -1), date(2024, 12, 15));
        assert_eq!(add_months(date(2025, 6, 15), -18), date(2023, 12, 15));
    }

    #[test]
    fn month_lengths() {
        assert_eq!(days_in_month(2025, 9), 30);
        assert_eq!(days_in_month(2025, 12), 31);
        assert_eq!(days_in_month(2024, 2), 29);
    }

    #[test]
    fn weekday_index_is_sunday_based() {
        // Sep 14 2025 is a Sunday, Sep 15 a Monday.
        assert_eq!(weekday_index(date(2025, 9, 14)), 0);
        assert_eq!(weekday_index(date(2025, 9, 15)), 1);
        assert_eq!(weekday_index(date(2025, 9, 20)), 6);
    }

    #[test]
    fn parses_plain_and_month_expressions() {
        let now = Utc
            .with_ymd_and_hms(2025, 9, 15, 12, 0, 0)
            .single()
            .expect("valid now");
        let tz = chrono_tz::UTC;

        assert_eq!(
            parse_date_expr("2025-09-15", now, tz).expect("plain date"),
            date(2025, 9, 15)
        );
        assert_eq!(
            parse_date_expr("2025-11", now, tz).expect("year-month"),
            date(2025, 11, 1)
        );
        assert_eq!(
            parse_date_expr("today", now, tz).expect("today"),
            date(2025, 9, 15)
        );
    }

    #[test]
    fn parses_relative_expressions() {
        let now = Utc
            .with_ymd_and_hms(2025, 1, 31, 8, 0, 0)
            .single()
            .expect("valid now");
        let tz = chrono_tz::UTC;

        assert_eq!(
            parse_date_expr("+2d", now, tz).expect("days"),
            date(2025, 2, 2)
        );
        assert_eq!(
            parse_date_expr("-1w", now, tz).expect("weeks"),
            date(2025, 1, 24)
        );
        assert_eq!(
            parse_date_expr("+1m", now, tz).expect("months clamp"),
            date(2025, 2, 28)
        );
        assert!(parse_date_expr("fortnight", now, tz).is_err());
    }

    #[test]
    fn civil_date_respects_timezone() {
        // 03:00 UTC on Sep 15 is still Sep 14 in Los Angeles.
        let instant = Utc
            .with_ymd_and_hms(2025, 9, 15, 3, 0, 0)
            .single()
            .expect("valid instant");
        assert_eq!(civil_date(instant, chrono_tz::UTC), date(2025, 9, 15));
        assert_eq!(
            civil_date(instant, chrono_tz::America::Los_Angeles),
            date(2025, 9, 14)
        );
    }
}
