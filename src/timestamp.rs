//! Timestamp normalization for host display labels
//!
//! Labels look like `[10:15, 05/06/2024]` or a bare `10:15`. Everything is
//! naive local time; no timezone conversion happens here.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TimestampError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampQuality {
    /// Time and date both came from the label.
    Exact,
    /// Time came from the label, date from the clock.
    TimeOnly,
    /// Label was unusable, the clock value was taken.
    Fallback,
}

impl TimestampQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimestampQuality::Exact => "exact",
            TimestampQuality::TimeOnly => "time_only",
            TimestampQuality::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedTimestamp {
    pub value: NaiveDateTime,
    pub quality: TimestampQuality,
}

/// Normalize a raw label against `now`. Never fails; unusable labels
/// resolve to `now` with [`TimestampQuality::Fallback`].
pub fn normalize(raw: &str, now: NaiveDateTime) -> NormalizedTimestamp {
    match parse_label(raw, now.date()) {
        Ok(normalized) => normalized,
        Err(err) => {
            debug!(label = raw, %err, "timestamp label unparseable, using clock");
            NormalizedTimestamp {
                value: now,
                quality: TimestampQuality::Fallback,
            }
        }
    }
}

/// Strict parse used by [`normalize`]. `today` supplies the date for
/// time-only labels.
pub fn parse_label(raw: &str, today: NaiveDate) -> Result<NormalizedTimestamp, TimestampError> {
    let cleaned = strip_brackets(raw);
    let parts: Vec<&str> = cleaned.split(',').collect();

    match parts.as_slice() {
        [time, date] => {
            let time = parse_time(time)?;
            let date = parse_date(date)?;
            Ok(NormalizedTimestamp {
                value: date.and_time(time),
                quality: TimestampQuality::Exact,
            })
        }
        [time] => {
            let time = parse_time(time)?;
            Ok(NormalizedTimestamp {
                value: today.and_time(time),
                quality: TimestampQuality::TimeOnly,
            })
        }
        other => Err(TimestampError::Arity(other.len())),
    }
}

fn strip_brackets(raw: &str) -> &str {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('[').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix(']').unwrap_or(trimmed);
    trimmed.trim()
}

fn parse_time(raw: &str) -> Result<NaiveTime, TimestampError> {
    let fields = split_numbers(raw, ':', "time", 2)?;
    NaiveTime::from_hms_opt(fields[0], fields[1], 0)
        .ok_or_else(|| TimestampError::OutOfRange(raw.trim().to_string()))
}

fn parse_date(raw: &str) -> Result<NaiveDate, TimestampError> {
    let fields = split_numbers(raw, '/', "date", 3)?;
    let (day, month, year) = (fields[0], fields[1], fields[2]);
    let year = i32::try_from(year).map_err(|_| TimestampError::OutOfRange(raw.trim().to_string()))?;
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| TimestampError::OutOfRange(raw.trim().to_string()))
}

fn split_numbers(
    raw: &str,
    separator: char,
    field: &'static str,
    expected: usize,
) -> Result<Vec<u32>, TimestampError> {
    let invalid = || TimestampError::Component {
        field,
        value: raw.trim().to_string(),
    };

    let fields = raw
        .trim()
        .split(separator)
        .map(|part| part.trim().parse::<u32>().map_err(|_| invalid()))
        .collect::<Result<Vec<_>, _>>()?;

    if fields.len() != expected {
        return Err(invalid());
    }
    Ok(fields)
}
