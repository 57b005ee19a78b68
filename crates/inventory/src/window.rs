use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use depot_core::{DomainError, DomainResult};

/// Half-open time range `[start, end)` over movement dates.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl DateWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> DomainResult<Self> {
        if start > end {
            return Err(DomainError::validation("start date must not be after end date"));
        }
        Ok(Self { start, end })
    }

    /// Window from UTC midnight of `start` to UTC midnight of `end`.
    ///
    /// The end day itself is excluded; see [`DateWindow::inclusive_days`].
    pub fn from_calendar_dates(start: &str, end: &str) -> DomainResult<Self> {
        let start = parse_calendar_date(start)?;
        let end = parse_calendar_date(end)?;
        Self::new(midnight(start), midnight(end))
    }

    /// Window covering every moment of the days `start..=end`.
    pub fn inclusive_days(start: NaiveDate, end: NaiveDate) -> DomainResult<Self> {
        if start > end {
            return Err(DomainError::validation("start date must not be after end date"));
        }
        let end = midnight(end)
            .checked_add_signed(Duration::days(1))
            .ok_or_else(|| DomainError::validation("end date is out of range"))?;
        Self::new(midnight(start), end)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

/// Parse a `YYYY-MM-DD` boundary date. The year must be exactly four digits.
pub fn parse_calendar_date(raw: &str) -> DomainResult<NaiveDate> {
    let invalid = || DomainError::validation(format!("invalid date '{raw}', expected YYYY-MM-DD"));
    let trimmed = raw.trim();
    let well_formed = trimmed.len() == 10
        && trimmed.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !well_formed {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| invalid())
}

fn midnight(day: NaiveDate) -> DateTime<Utc> {
    day.and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
