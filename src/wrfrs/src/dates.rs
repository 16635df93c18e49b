// wrfrs/src/dates.rs

//! Parsing, formatting and arithmetic over the timestamp notations used in
//! configuration files and dataset names.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use regex::Regex;
use strum_macros::{Display, EnumString};
use thiserror::Error;

lazy_static! {
    static ref RE_DATE_TIME_SEP: Regex = Regex::new(r"[ _T]").unwrap();
    static ref RE_DATE_SEP: Regex = Regex::new(r"[-/ ]").unwrap();
}

#[derive(Debug, Error)]
pub enum DateError {
    #[error("Unknown date format: {0}")]
    UnknownDateFormat(String),

    #[error("Unknown hour format: {0}")]
    UnknownHourFormat(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),
}

/// Named output formats for [`format_date`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum DateFormat {
    /// `YYYYMMDDHH`
    Short,
    /// `YYYY-MM-DD_HH:MM:SS`
    Long,
    /// Same as long, the notation WRF uses in its namelists
    Wrf,
    /// ISO-8601 with a trailing `Z`
    Iso,
    Cfsr,
    Fnl,
    FnlDir,
    Gfs,
}

impl DateFormat {
    fn fmt_str(&self) -> &'static str {
        match self {
            DateFormat::Short => "%Y%m%d%H",
            DateFormat::Long | DateFormat::Wrf => "%Y-%m-%d_%H:%M:%S",
            DateFormat::Iso => "%Y-%m-%dT%H:%M:%SZ",
            DateFormat::Cfsr => "%Y-%m-%d %H:00",
            DateFormat::Fnl => "fnl_%Y%m%d_%H_00",
            DateFormat::FnlDir => "grib2/%Y/%Y.%m/fnl_%Y%m%d_%H_00",
            DateFormat::Gfs => "GFS:%Y-%m-%d_%H",
        }
    }
}

/// Parse a date with an optional separate hour component.
///
/// Accepted date notations:
/// 1. `YYYY-MM-DD_HH:MM:SS` where `_` can also be ` ` or `T`
/// 2. `YYYY-MM-DD` where `-` can also be `/`
/// 3. `YYYYMM`, `YYYYMMDD` or `YYYYMMDDHH`
///
/// Accepted hour notations: `HH`, `HH:MM`, `HH:MM:SS`.
pub fn read_date_hour(date_str: &str, hour_str: Option<&str>) -> Result<NaiveDateTime, DateError> {
    let mut date_str = date_str.trim();
    let mut hour_str = hour_str;

    if date_str.len() > 10 {
        let mut parts = RE_DATE_TIME_SEP.splitn(date_str, 2);
        let date_part = parts.next().unwrap_or(date_str);
        let hour_part = parts
            .next()
            .ok_or_else(|| DateError::UnknownDateFormat(date_str.to_string()))?;
        if hour_str.is_none() {
            hour_str = Some(hour_part);
        }
        date_str = date_part;
    }

    let (mut hour, minute, second) = match hour_str {
        None => (0u32, 0u32, 0u32),
        Some(h) => parse_hour(h)?,
    };

    let (year, month, day) = match date_str.len() {
        6 => (
            to_int(&date_str[0..4])?,
            to_int(&date_str[4..6])?,
            1,
        ),
        8 => (
            to_int(&date_str[0..4])?,
            to_int(&date_str[4..6])?,
            to_int(&date_str[6..8])?,
        ),
        10 => {
            let parts: Vec<&str> = RE_DATE_SEP.split(date_str).collect();
            if parts.len() == 3 {
                (to_int(parts[0])?, to_int(parts[1])?, to_int(parts[2])?)
            } else {
                // compact YYYYMMDDHH carries its own hour
                hour = to_int(&date_str[8..10])? as u32;
                (
                    to_int(&date_str[0..4])?,
                    to_int(&date_str[4..6])?,
                    to_int(&date_str[6..8])?,
                )
            }
        }
        _ => return Err(DateError::UnknownDateFormat(date_str.to_string())),
    };

    NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .ok_or_else(|| DateError::InvalidDate(format!("{}-{}-{} {}:{}:{}", year, month, day, hour, minute, second)))
}

/// Parse a date without a separate hour component.
pub fn read_date(date_str: &str) -> Result<NaiveDateTime, DateError> {
    read_date_hour(date_str, None)
}

fn parse_hour(hour_str: &str) -> Result<(u32, u32, u32), DateError> {
    let fields: Vec<&str> = hour_str.split(':').collect();
    let bad = || DateError::UnknownHourFormat(hour_str.to_string());
    match (hour_str.len(), fields.len()) {
        (8, 3) => Ok((
            parse_u32(fields[0], bad)?,
            parse_u32(fields[1], bad)?,
            parse_u32(fields[2], bad)?,
        )),
        (5, 2) => Ok((parse_u32(fields[0], bad)?, parse_u32(fields[1], bad)?, 0)),
        (2, 1) => Ok((parse_u32(fields[0], bad)?, 0, 0)),
        _ => Err(bad()),
    }
}

fn parse_u32(field: &str, err: impl Fn() -> DateError) -> Result<u32, DateError> {
    field.parse().map_err(|_| err())
}

fn to_int(field: &str) -> Result<i64, DateError> {
    field
        .trim()
        .parse()
        .map_err(|_| DateError::UnknownDateFormat(field.to_string()))
}

/// Format a date in one of the named notations.
pub fn format_date(date: &NaiveDateTime, format: DateFormat) -> String {
    date.format(format.fmt_str()).to_string()
}

/// Shift a date by a signed duration.
pub fn advance_date(date: NaiveDateTime, delta: Duration) -> NaiveDateTime {
    date + delta
}

/// Dates from `start` to `end` inclusive, stepped by `increment`.
pub fn date_range(start: NaiveDateTime, end: NaiveDateTime, increment: Duration) -> DateRange {
    DateRange {
        current: start,
        end,
        increment,
    }
}

pub struct DateRange {
    current: NaiveDateTime,
    end: NaiveDateTime,
    increment: Duration,
}

impl Iterator for DateRange {
    type Item = NaiveDateTime;

    fn next(&mut self) -> Option<NaiveDateTime> {
        if self.current > self.end {
            return None;
        }
        let date = self.current;
        self.current += self.increment;
        Some(date)
    }
}
