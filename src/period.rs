//! Business calendar for the daily adherence report.
//!
//! The field team works Monday through Saturday. A run on day `D` reports on the
//! last working day before `D` (the *reference date*), the month-to-date window of
//! the reference month and, on Mondays only, the previous Monday–Saturday week.

use crate::errors::AppError;
use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Returns true when reports are sent on `today` (every day except Sunday).
pub fn is_reporting_day(today: NaiveDate) -> bool {
    today.weekday() != Weekday::Sun
}

/// The working day the "yesterday" figures describe.
///
/// Monday reports on Saturday, since nobody visits stores on Sunday.
pub fn reference_date(today: NaiveDate) -> NaiveDate {
    if today.weekday() == Weekday::Mon {
        today - Duration::days(2)
    } else {
        today - Duration::days(1)
    }
}

/// First calendar day of `d`'s month.
pub fn month_start(d: NaiveDate) -> NaiveDate {
    d - Duration::days(i64::from(d.day0()))
}

/// Monday on or before `d`.
pub fn week_start(d: NaiveDate) -> NaiveDate {
    d - Duration::days(i64::from(d.weekday().num_days_from_monday()))
}

/// Half-open date interval `[start, end)` with a human label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportWindow {
    start: NaiveDate,
    end: NaiveDate,
    label: String,
}

impl ReportWindow {
    /// Builds a window, rejecting empty or inverted intervals.
    pub fn new(
        start: NaiveDate,
        end: NaiveDate,
        label: impl Into<String>,
    ) -> Result<Self, AppError> {
        if start >= end {
            return Err(AppError::InvalidInput(format!(
                "report window must satisfy start < end (got {} .. {})",
                start, end
            )));
        }
        Ok(Self {
            start,
            end,
            label: label.into(),
        })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Exclusive upper bound.
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Every date and window a single run needs, derived from "today".
#[derive(Debug, Clone)]
pub struct RunCalendar {
    pub today: NaiveDate,
    pub reference: NaiveDate,
    pub yesterday: ReportWindow,
    pub month_to_date: ReportWindow,
    pub previous_week: ReportWindow,
}

impl RunCalendar {
    /// Computes the run calendar, or `None` when `today` is not a reporting day.
    pub fn for_today(today: NaiveDate) -> Option<Self> {
        if !is_reporting_day(today) {
            return None;
        }

        let reference = reference_date(today);

        // reference < today always holds, so none of these windows can be empty.
        let yesterday = ReportWindow::new(
            reference,
            reference + Duration::days(1),
            reference.format("%d/%m").to_string(),
        )
        .ok()?;

        let ms = month_start(reference);
        let month_to_date = ReportWindow::new(ms, today, ms.format("%m/%Y").to_string()).ok()?;

        let prev_monday = week_start(reference) - Duration::days(7);
        let prev_saturday = prev_monday + Duration::days(5);
        let previous_week = ReportWindow::new(
            prev_monday,
            prev_saturday + Duration::days(1),
            format!(
                "{} a {}",
                prev_monday.format("%d/%m"),
                prev_saturday.format("%d/%m")
            ),
        )
        .ok()?;

        Some(Self {
            today,
            reference,
            yesterday,
            month_to_date,
            previous_week,
        })
    }

    /// Executive reports only go out on Mondays.
    pub fn is_executive_day(&self) -> bool {
        self.today.weekday() == Weekday::Mon
    }

    /// Reference date as shown in message headers.
    pub fn reference_label(&self) -> String {
        self.reference.format("%d/%m/%Y").to_string()
    }
}
