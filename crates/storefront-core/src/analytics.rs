//! Reporting inputs: the optional `[from, to]` window and bucket sizes.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::CoreError;

/// Number of products returned by the top-seller ranking.
pub const TOP_SELLER_LIMIT: i64 = 5;

/// Calendar bucket size for the sales time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Day,
    Month,
}

impl Granularity {
    /// Postgres `to_char` pattern producing the bucket label.
    #[must_use]
    pub fn pg_format(self) -> &'static str {
        match self {
            Granularity::Day => "YYYY-MM-DD",
            Granularity::Month => "YYYY-MM",
        }
    }
}

/// Inclusive timestamp window; either side may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// Parses raw `from`/`to` query values.
    ///
    /// A bare date as `from` means the start of that day; as `to` it means the
    /// last instant of that day, so `to=2024-01-31` includes all of January 31.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTimestamp`] naming the first bound that is
    /// not ISO-8601.
    pub fn parse(from: Option<&str>, to: Option<&str>) -> Result<Self, CoreError> {
        let from = from
            .map(|raw| parse_bound("from", raw, NaiveTime::MIN))
            .transpose()?;
        let to = to
            .map(|raw| parse_bound("to", raw, end_of_day()))
            .transpose()?;
        Ok(Self { from, to })
    }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap_or(NaiveTime::MIN)
}

fn parse_bound(
    field: &'static str,
    raw: &str,
    date_only_time: NaiveTime,
) -> Result<DateTime<Utc>, CoreError> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|date| date.and_time(date_only_time).and_utc())
        .map_err(|_| CoreError::InvalidTimestamp {
            field,
            value: raw.to_string(),
        })
}
