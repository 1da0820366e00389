//! US-style date and time rendering used by the built-in formatters.

use std::fmt::Display;

use chrono::{DateTime, TimeZone};

/// Render `ts` as `MM/DD/YYYY, HH:MM AM`, or `MM/DD/YYYY, HH:MM:SS AM`
/// when `include_seconds` is set.
pub fn us_date<Tz>(ts: &DateTime<Tz>, include_seconds: bool) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    if include_seconds {
        ts.format("%m/%d/%Y, %I:%M:%S %p").to_string()
    } else {
        ts.format("%m/%d/%Y, %I:%M %p").to_string()
    }
}

/// Render `ts` as `H:MM AM`, or `H:MM:SS AM` when `include_seconds` is set.
pub fn us_time<Tz>(ts: &DateTime<Tz>, include_seconds: bool) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    if include_seconds {
        ts.format("%-I:%M:%S %p").to_string()
    } else {
        ts.format("%-I:%M %p").to_string()
    }
}
