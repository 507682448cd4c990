//! Parsing for the `--since` flag.
//!
//! Accepts past-oriented expressions like "36h", "2d ago", "yesterday",
//! a plain date, or a full RFC 3339 timestamp.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use regex::Regex;
use std::sync::LazyLock;

/// Matches: "2h", "36h ago", "7d", "2w ago", "1mo"
static RELATIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)(mo|w|d|h|m)(\s*ago)?$").expect("valid relative regex"));

/// Parse a window-start expression into a UTC timestamp.
///
/// Supported forms:
/// - Relative: "2h", "36h ago", "7d", "2w", "1mo" (always in the past)
/// - Named: "yesterday", "today"
/// - Date: "2026-01-15" (midnight UTC)
/// - RFC3339: "2026-01-15T10:00:00Z"
pub fn parse_since(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, String> {
    let raw = input.trim();
    if raw.is_empty() {
        return Err("empty time expression".to_string());
    }

    let lower = raw.to_lowercase();

    match lower.as_str() {
        "yesterday" => return Ok(start_of_day(now - Duration::days(1))),
        "today" => return Ok(start_of_day(now)),
        _ => {}
    }

    if let Some(caps) = RELATIVE_RE.captures(&lower) {
        let value: i64 = caps[1]
            .parse()
            .map_err(|_| format!("invalid number in {raw:?}"))?;
        if value < 1 {
            return Err(format!("invalid relative time {raw:?}"));
        }
        let duration = match &caps[2] {
            "mo" => Duration::days(30 * value),
            "w" => Duration::weeks(value),
            "d" => Duration::days(value),
            "h" => Duration::hours(value),
            "m" => Duration::minutes(value),
            unit => return Err(format!("invalid time unit {unit:?}")),
        };
        return Ok(now - duration);
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let dt = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| format!("invalid date {raw:?}"))?;
        return Ok(Utc.from_utc_datetime(&dt));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    Err(format!("invalid time expression {raw:?}"))
}

fn start_of_day(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .unwrap_or(dt)
}
