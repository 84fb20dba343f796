use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

/// Any `Mon DD YYYY` run embedded in longer text.
static EMBEDDED_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w{3} \d{1,2} \d{4})").expect("valid date regex"));

const DATE_ONLY_FORMATS: [&str; 3] = ["%b %d %Y", "%m/%d/%Y", "%Y-%m-%d"];

/// Parse a closing-date cell into a timestamp.
///
/// Formats are tried in order: `Mon DD YYYY - HH:MM TZ`, `Mon DD YYYY`,
/// `MM/DD/YYYY`, `YYYY-MM-DD`. Failing those, the first `Mon DD YYYY`
/// substring is parsed. Date-only matches resolve to midnight.
pub fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(dt) = parse_with_time(text) {
        return Some(dt);
    }

    for format in DATE_ONLY_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date.and_time(NaiveTime::MIN));
        }
    }

    let parsed = EMBEDDED_DATE
        .captures(text)
        .and_then(|caps| NaiveDate::parse_from_str(&caps[1], "%b %d %Y").ok())
        .map(|date| date.and_time(NaiveTime::MIN));

    if parsed.is_none() {
        tracing::debug!("Unparseable date '{}'", text);
    }
    parsed
}

/// `Mon DD YYYY - HH:MM TZ`. The zone abbreviation must be present but is
/// not applied; the site publishes local times.
fn parse_with_time(text: &str) -> Option<NaiveDateTime> {
    let (date_part, time_part) = text.split_once(" - ")?;
    let date = NaiveDate::parse_from_str(date_part.trim(), "%b %d %Y").ok()?;

    let mut tokens = time_part.split_whitespace();
    let time = NaiveTime::parse_from_str(tokens.next()?, "%H:%M").ok()?;
    let zone = tokens.next()?;
    if tokens.next().is_some() || !zone.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    Some(date.and_time(time))
}
