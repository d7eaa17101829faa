use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use notelens_insight::NoteQuery;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum RangeError {
    #[error("invalid date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("invalid preset '{0}' (expected a positive number of days)")]
    InvalidPreset(String),

    #[error("range start {from} is after range end {to}")]
    Inverted { from: NaiveDate, to: NaiveDate },
}

/// Range selectors as they arrive from a request.
#[derive(Debug, Clone, Default)]
pub(crate) struct RangeRequest<'a> {
    pub preset: Option<&'a str>,
    pub from: Option<&'a str>,
    pub to: Option<&'a str>,
}

/// Resolve a request into an inclusive UTC instant range.
///
/// `to` defaults to the end of `today`. An explicit `from` wins over
/// `preset`; a preset of N days covers today and the N-1 days before it;
/// with neither, `default_days` applies the same way.
pub(crate) fn resolve(
    request: &RangeRequest<'_>,
    today: NaiveDate,
    default_days: u32,
) -> Result<NoteQuery, RangeError> {
    let to_day = match non_empty(request.to) {
        Some(raw) => parse_day(raw)?,
        None => today,
    };

    let from_day = match (non_empty(request.from), non_empty(request.preset)) {
        (Some(raw), _) => parse_day(raw)?,
        (None, Some(preset)) => lookback_start(today, parse_preset(preset)?),
        (None, None) => lookback_start(today, default_days.max(1)),
    };

    if from_day > to_day {
        return Err(RangeError::Inverted {
            from: from_day,
            to: to_day,
        });
    }

    Ok(NoteQuery {
        from: start_of_day(from_day),
        to: end_of_day(to_day),
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_day(raw: &str) -> Result<NaiveDate, RangeError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| RangeError::InvalidDate(raw.to_string()))
}

fn parse_preset(raw: &str) -> Result<u32, RangeError> {
    match raw.parse::<u32>() {
        Ok(days) if days > 0 => Ok(days),
        _ => Err(RangeError::InvalidPreset(raw.to_string())),
    }
}

fn lookback_start(today: NaiveDate, days: u32) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(days - 1)))
        .unwrap_or(NaiveDate::MIN)
}

fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN))
}

fn end_of_day(day: NaiveDate) -> DateTime<Utc> {
    let last = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
    Utc.from_utc_datetime(&day.and_time(last))
}
