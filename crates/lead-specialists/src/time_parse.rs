use chrono::{DateTime, Datelike, Duration as ChronoDuration, FixedOffset, NaiveTime, Timelike, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;

/// Result of parsing a Spanish time phrase against a reference instant.
/// Per spec.md §9's open-question decision, the vocabulary stays partial
/// (tomorrow, weekday names, clock times) — anything else comes back as
/// `Unrecognized` so role C asks for clarification instead of guessing.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedTime {
    At(DateTime<FixedOffset>),
    Unrecognized,
}

static CLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:a las\s+)?(\d{1,2})(?::(\d{2}))?\s*(am|pm)?").unwrap());

const WEEKDAYS: &[(&str, Weekday)] = &[
    ("lunes", Weekday::Mon),
    ("martes", Weekday::Tue),
    ("miercoles", Weekday::Wed),
    ("miércoles", Weekday::Wed),
    ("jueves", Weekday::Thu),
    ("viernes", Weekday::Fri),
    ("sabado", Weekday::Sat),
    ("sábado", Weekday::Sat),
    ("domingo", Weekday::Sun),
];

/// Default meeting time when a day is named but no clock time is given.
const DEFAULT_HOUR: u32 = 10;

/// Parses phrases like "mañana a las 3pm", "el viernes a las 15:00", or a
/// bare "3pm" (meaning today), against `now` in `tz`.
pub fn parse(message: &str, now: DateTime<FixedOffset>) -> ParsedTime {
    let lower = message.to_lowercase();

    let day = if lower.contains("pasado mañana") || lower.contains("pasado manana") {
        // "Day after tomorrow" — explicitly out of vocabulary per spec.md
        // §9's open question; fall through to Unrecognized rather than
        // silently treating it as plain "tomorrow".
        None
    } else if lower.contains("mañana") || lower.contains("manana") {
        Some(now.date_naive() + ChronoDuration::days(1))
    } else if let Some((_, weekday)) = WEEKDAYS.iter().find(|(name, _)| lower.contains(name)) {
        Some(next_occurrence_of(now, *weekday))
    } else if lower.contains("hoy") {
        Some(now.date_naive())
    } else {
        None
    };

    let time = parse_clock(&lower);

    match (day, time) {
        (Some(date), Some(clock)) => combine(date, clock, now.offset().to_owned()),
        (Some(date), None) => combine(date, NaiveTime::from_hms_opt(DEFAULT_HOUR, 0, 0).unwrap(), now.offset().to_owned()),
        (None, Some(clock)) => combine(now.date_naive(), clock, now.offset().to_owned()),
        (None, None) => ParsedTime::Unrecognized,
    }
}

fn combine(date: chrono::NaiveDate, time: NaiveTime, offset: FixedOffset) -> ParsedTime {
    match date.and_time(time).and_local_timezone(offset) {
        chrono::LocalResult::Single(dt) => ParsedTime::At(dt),
        _ => ParsedTime::Unrecognized,
    }
}

fn next_occurrence_of(now: DateTime<FixedOffset>, target: Weekday) -> chrono::NaiveDate {
    let today = now.date_naive();
    let mut days_ahead = (target.num_days_from_monday() as i64) - (today.weekday().num_days_from_monday() as i64);
    if days_ahead <= 0 {
        days_ahead += 7;
    }
    today + ChronoDuration::days(days_ahead)
}

fn parse_clock(lower: &str) -> Option<NaiveTime> {
    let caps = CLOCK_RE.captures(lower)?;
    let hour_raw: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = caps
        .get(2)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);
    let meridiem = caps.get(3).map(|m| m.as_str().to_lowercase());

    if hour_raw > 23 || minute > 59 {
        return None;
    }

    let hour = match meridiem.as_deref() {
        Some("pm") if hour_raw < 12 => hour_raw + 12,
        Some("am") if hour_raw == 12 => 0,
        _ => hour_raw,
    };

    NaiveTime::from_hms_opt(hour.min(23), minute, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reference() -> DateTime<FixedOffset> {
        // A Tuesday, per chrono's weekday numbering, at 09:00 local.
        FixedOffset::west_opt(5 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 8, 4, 9, 0, 0)
            .unwrap()
    }

    #[test]
    fn parses_tomorrow_with_pm_clock_time() {
        let result = parse("mañana a las 3pm", reference());
        match result {
            ParsedTime::At(dt) => {
                assert_eq!(dt.hour(), 15);
                assert_eq!(dt.date_naive(), reference().date_naive() + ChronoDuration::days(1));
            }
            ParsedTime::Unrecognized => panic!("expected a parsed time"),
        }
    }

    #[test]
    fn parses_weekday_name_rolling_forward() {
        let result = parse("el viernes a las 15:00", reference());
        assert!(matches!(result, ParsedTime::At(_)));
    }

    #[test]
    fn unrecognized_phrase_does_not_guess() {
        assert_eq!(parse("pasado mañana temprano", reference()), ParsedTime::Unrecognized);
    }

    #[test]
    fn bare_clock_time_assumes_today() {
        let result = parse("a las 10am", reference());
        match result {
            ParsedTime::At(dt) => assert_eq!(dt.date_naive(), reference().date_naive()),
            ParsedTime::Unrecognized => panic!("expected a parsed time"),
        }
    }
}
