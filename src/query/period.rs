use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use regex::Regex;

use crate::date_util::{end_of_day, last_day_of_month, quarter_of, start_of_day};
use crate::error::{Error, Result};
use crate::query::scope::DateRange;

static RE_QUARTER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-Q([1-4])$").unwrap());
static RE_WEEK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-W(\d{1,2})$").unwrap());
static RE_MONTH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})$").unwrap());
static RE_ROLLING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{1,4})[dD]$").unwrap());

/// A named reporting period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Period {
    Year(i32),
    Quarter(i32, u8),
    Month(i32, u8),
    Week(i32, u8),
    /// Last N days ending on (and including) the given date.
    Rolling(u32, NaiveDate),
    YearToDate(i32, NaiveDate),
    QuarterToDate(i32, u8, NaiveDate),
    MonthToDate(i32, u8, NaiveDate),
}

impl Period {
    /// Parse a period string relative to the local date.
    ///
    /// Supported formats:
    /// - `2025`: year
    /// - `2025-Q1`: quarter
    /// - `2025-01`: month
    /// - `2025-W05`: ISO week
    /// - `30d`: rolling last N days
    /// - `ytd`, `qtd`, `mtd`: current year/quarter/month to date
    pub fn parse(s: &str) -> Result<Self> {
        Self::parse_as_of(s, chrono::Local::now().date_naive())
    }

    /// Parse a period string with relative periods anchored on `today`.
    pub fn parse_as_of(s: &str, today: NaiveDate) -> Result<Self> {
        let s = s.trim();

        match s.to_lowercase().as_str() {
            "ytd" => return Ok(Period::YearToDate(today.year(), today)),
            "qtd" => return Ok(Period::QuarterToDate(today.year(), quarter_of(today), today)),
            "mtd" => return Ok(Period::MonthToDate(today.year(), today.month() as u8, today)),
            _ => {}
        }

        if let Some(caps) = RE_ROLLING.captures(s) {
            let n: u32 = caps[1]
                .parse()
                .map_err(|_| Error::PeriodParse(format!("invalid day count: {s}")))?;
            if n == 0 {
                return Err(Error::PeriodParse(format!("rolling period must be positive: {s}")));
            }
            return Ok(Period::Rolling(n, today));
        }

        if s.len() == 4 {
            if let Ok(year) = s.parse::<i32>() {
                return Ok(Period::Year(year));
            }
        }

        if let Some(caps) = RE_QUARTER.captures(s) {
            let year: i32 = caps[1].parse().unwrap();
            let q: u8 = caps[2].parse().unwrap();
            return Ok(Period::Quarter(year, q));
        }

        if let Some(caps) = RE_WEEK.captures(s) {
            let year: i32 = caps[1].parse().unwrap();
            let week: u8 = caps[2].parse().unwrap();
            if NaiveDate::from_isoywd_opt(year, week as u32, Weekday::Mon).is_some() {
                return Ok(Period::Week(year, week));
            }
        }

        if let Some(caps) = RE_MONTH.captures(s) {
            let year: i32 = caps[1].parse().unwrap();
            let month: u8 = caps[2].parse().unwrap();
            if (1..=12).contains(&month) {
                return Ok(Period::Month(year, month));
            }
        }

        Err(Error::PeriodParse(format!("unrecognized period: {s}")))
    }

    /// Canonical key, e.g. `2025-Q1`.
    pub fn to_key(&self) -> String {
        match self {
            Period::Year(y) => format!("{y}"),
            Period::Quarter(y, q) => format!("{y}-Q{q}"),
            Period::Month(y, m) => format!("{y}-{m:02}"),
            Period::Week(y, w) => format!("{y}-W{w:02}"),
            Period::Rolling(n, _) => format!("{n}d"),
            Period::YearToDate(y, _) => format!("{y}-ytd"),
            Period::QuarterToDate(y, q, _) => format!("{y}-Q{q}-td"),
            Period::MonthToDate(y, m, _) => format!("{y}-{m:02}-td"),
        }
    }

    /// First and last calendar day of the period, both inclusive.
    pub fn date_bounds(&self) -> (NaiveDate, NaiveDate) {
        match self {
            Period::Year(y) => (
                NaiveDate::from_ymd_opt(*y, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(*y, 12, 31).unwrap(),
            ),
            Period::Quarter(y, q) => {
                let start_month = (*q as u32 - 1) * 3 + 1;
                (
                    NaiveDate::from_ymd_opt(*y, start_month, 1).unwrap(),
                    last_day_of_month(*y, *q as u32 * 3),
                )
            }
            Period::Month(y, m) => (
                NaiveDate::from_ymd_opt(*y, *m as u32, 1).unwrap(),
                last_day_of_month(*y, *m as u32),
            ),
            Period::Week(y, w) => {
                let start = NaiveDate::from_isoywd_opt(*y, *w as u32, Weekday::Mon).unwrap();
                (start, start + Duration::days(6))
            }
            Period::Rolling(n, as_of) => (*as_of - Duration::days(*n as i64 - 1), *as_of),
            Period::YearToDate(y, as_of) => (NaiveDate::from_ymd_opt(*y, 1, 1).unwrap(), *as_of),
            Period::QuarterToDate(y, q, as_of) => {
                let start_month = (*q as u32 - 1) * 3 + 1;
                (NaiveDate::from_ymd_opt(*y, start_month, 1).unwrap(), *as_of)
            }
            Period::MonthToDate(y, m, as_of) => {
                (NaiveDate::from_ymd_opt(*y, *m as u32, 1).unwrap(), *as_of)
            }
        }
    }

    /// Timestamp window covering every instant of the period in UTC.
    pub fn to_date_range(&self) -> DateRange {
        let (start, end) = self.date_bounds();
        DateRange::new(Some(start_of_day(start)), Some(end_of_day(end)))
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_key())
    }
}
