//! Timezone reconciliation for leave requests.
//!
//! A submission carries three time references: the wall-clock instant the
//! requester picked, the UTC offset Slack reports for that user, and the UTC
//! offset of the employee's HR location. The backend expects timestamps in
//! the location's local time, so every submission is rebased here before it
//! leaves the process.
//!
//! The location offset arrives as a free-text label configured in the HR
//! backend (`"(UTC-05:00) Eastern Time (US & Canada)"`). Parsing is strict:
//! anything that does not match the `(UTC[±HH:MM])` prefix is an error
//! rather than a guess.

use chrono::{DateTime, FixedOffset};
use thiserror::Error;

/// Timestamp representation the leave endpoints accept.
pub const LEAVE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TimezoneError {
    #[error("unrecognized timezone label `{0}`")]
    UnrecognizedLabel(String),
    #[error("utc offset out of range: {0} seconds")]
    OffsetOutOfRange(i32),
    #[error("timestamp out of range: {0}")]
    TimestampOutOfRange(i64),
}

/// Parses the HR backend's location timezone label into a fixed offset.
///
/// Accepted shapes are `"(UTC±HH:MM) <name>"` and `"(UTC) <name>"` (offset
/// zero). Everything else yields [`TimezoneError::UnrecognizedLabel`].
pub fn parse_location_offset(label: &str) -> Result<FixedOffset, TimezoneError> {
    let unrecognized = || TimezoneError::UnrecognizedLabel(label.to_string());

    let trimmed = label.trim();
    let inner = trimmed
        .strip_prefix('(')
        .and_then(|rest| rest.split_once(')'))
        .map(|(inner, _)| inner)
        .ok_or_else(unrecognized)?;
    let offset_part = inner.strip_prefix("UTC").ok_or_else(unrecognized)?;

    if offset_part.is_empty() {
        return FixedOffset::east_opt(0).ok_or(TimezoneError::OffsetOutOfRange(0));
    }

    let mut chars = offset_part.chars();
    let sign = match chars.next() {
        Some('+') => 1,
        Some('-') => -1,
        _ => return Err(unrecognized()),
    };

    let digits: String = chars.collect();
    let (hours_raw, minutes_raw) = digits.split_once(':').ok_or_else(unrecognized)?;
    if hours_raw.len() != 2 || minutes_raw.len() != 2 {
        return Err(unrecognized());
    }

    let hours: i32 = hours_raw.parse().map_err(|_| unrecognized())?;
    let minutes: i32 = minutes_raw.parse().map_err(|_| unrecognized())?;
    if hours > 14 || minutes > 59 {
        return Err(unrecognized());
    }

    let seconds = sign * (hours * 3600 + minutes * 60);
    FixedOffset::east_opt(seconds).ok_or(TimezoneError::OffsetOutOfRange(seconds))
}

/// Rebases a submitted wall-clock timestamp into the destination offset.
///
/// `local_epoch_secs` is the naive timestamp the requester picked (Slack's
/// `datetimepicker` value), `reporter_offset_secs` is the offset Slack
/// reports for the submitting user. The wall-clock reading is interpreted in
/// the reporter's offset, carried through UTC, and expressed in
/// `destination` local time.
pub fn normalize(
    local_epoch_secs: i64,
    reporter_offset_secs: i32,
    destination: FixedOffset,
) -> Result<DateTime<FixedOffset>, TimezoneError> {
    let naive = DateTime::from_timestamp(local_epoch_secs, 0)
        .ok_or(TimezoneError::TimestampOutOfRange(local_epoch_secs))?
        .naive_utc();
    let reporter = FixedOffset::east_opt(reporter_offset_secs)
        .ok_or(TimezoneError::OffsetOutOfRange(reporter_offset_secs))?;

    let aware = naive
        .and_local_timezone(reporter)
        .single()
        .ok_or(TimezoneError::TimestampOutOfRange(local_epoch_secs))?;

    Ok(aware.with_timezone(&destination))
}

/// Formats an instant the way the leave endpoints expect it.
pub fn format_leave_timestamp(instant: &DateTime<FixedOffset>) -> String {
    instant.format(LEAVE_TIMESTAMP_FORMAT).to_string()
}
