//! Free-form date normalisation for staging `fecha` values.
//!
//! A value must match one of three fixed-width shapes exactly. Shapes are
//! tried in priority order and the first match decides how the value is
//! parsed; a match whose fields do not form a real calendar date yields
//! `None` rather than falling through to a later shape.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

// `None` only if a literal below fails to compile; `every_shape_pattern_compiles` guards that.
static ISO: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").ok());
static DAY_FIRST: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[0-9]{2}/[0-9]{2}/[0-9]{4}$").ok());
static MONTH_FIRST: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[0-9]{2}-[0-9]{2}-[0-9]{4}$").ok());

/// Accepted `fecha` layouts, in matching priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateShape {
    /// `YYYY-MM-DD`
    Iso,
    /// `DD/MM/YYYY`
    DayMonthYear,
    /// `MM-DD-YYYY`
    MonthDayYear,
}

impl DateShape {
    pub const PRIORITY: [DateShape; 3] = [DateShape::Iso, DateShape::DayMonthYear, DateShape::MonthDayYear];

    fn pattern(self) -> Option<&'static Regex> {
        let pattern: &'static Option<Regex> = match self {
            DateShape::Iso => &ISO,
            DateShape::DayMonthYear => &DAY_FIRST,
            DateShape::MonthDayYear => &MONTH_FIRST,
        };
        pattern.as_ref()
    }

    fn format(self) -> &'static str {
        match self {
            DateShape::Iso => "%Y-%m-%d",
            DateShape::DayMonthYear => "%d/%m/%Y",
            DateShape::MonthDayYear => "%m-%d-%Y",
        }
    }

    /// First shape in priority order whose pattern matches `raw`.
    pub fn classify(raw: &str) -> Option<DateShape> {
        Self::PRIORITY.into_iter().find(|shape| shape.pattern().is_some_and(|re| re.is_match(raw)))
    }
}

/// Parse a raw `fecha` into a calendar date, or `None` if it is not one.
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let shape = DateShape::classify(raw)?;
    NaiveDate::parse_from_str(raw, shape.format()).ok()
}

fn unix_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

/// Days since 1970-01-01, the Arrow `Date32` representation.
pub fn to_epoch_days(date: NaiveDate) -> i32 {
    date.signed_duration_since(unix_epoch()).num_days() as i32
}

pub fn from_epoch_days(days: i32) -> Option<NaiveDate> {
    unix_epoch().checked_add_signed(chrono::Duration::days(days as i64))
}
