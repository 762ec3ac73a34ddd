//! Selection of the periods a view analyses and the periods it compares against.

use crate::error::AnalyticsError;
use chrono::{Datelike, Duration, NaiveDate};
use core_types::{AnalysisWindow, FinancialPeriod};

/// Length of a "month" when a window is expressed in days.
pub const DAYS_PER_MONTH: i64 = 30;

/// A window of calendar days ending at `end`, preceded by a window of equal length.
///
/// The current window is `[start, end]`; the previous one is `[previous_start, start)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub previous_start: NaiveDate,
}

impl DayWindow {
    /// The `months` x 30 days ending at `as_of`. Fails when the window would
    /// start before the earliest representable date.
    pub fn trailing_months(as_of: NaiveDate, months: u32) -> Result<Self, AnalyticsError> {
        let span = Duration::days(DAYS_PER_MONTH * i64::from(months));
        let out_of_range = || AnalyticsError::InvalidInput(format!("no {months} month window ends at {as_of}"));
        let start = as_of.checked_sub_signed(span).ok_or_else(out_of_range)?;
        let previous_start = start.checked_sub_signed(span).ok_or_else(out_of_range)?;
        Ok(Self {
            start,
            end: as_of,
            previous_start,
        })
    }
}

/// Splits `periods` into the window being analysed and the comparison window.
///
/// Periods after `as_of` are ignored. Trailing windows take the last N periods
/// and the N before them; year to date compares against the same months of
/// the previous year. Both halves come back oldest first.
pub fn select(
    periods: &[FinancialPeriod],
    window: AnalysisWindow,
    as_of: NaiveDate,
) -> (Vec<FinancialPeriod>, Vec<FinancialPeriod>) {
    let mut available: Vec<FinancialPeriod> = periods
        .iter()
        .filter(|p| p.period_date <= as_of)
        .cloned()
        .collect();
    available.sort_by_key(|p| p.period_date);

    match window {
        AnalysisWindow::Last12Months => split_trailing(available, 12),
        AnalysisWindow::Last24Months => split_trailing(available, 24),
        AnalysisWindow::YearToDate => {
            let year = as_of.year();
            let month = as_of.month();
            let current = available
                .iter()
                .filter(|p| p.period_date.year() == year)
                .cloned()
                .collect();
            let previous = available
                .into_iter()
                .filter(|p| p.period_date.year() == year - 1 && p.period_date.month() <= month)
                .collect();
            (current, previous)
        }
    }
}

fn split_trailing(
    mut available: Vec<FinancialPeriod>,
    len: usize,
) -> (Vec<FinancialPeriod>, Vec<FinancialPeriod>) {
    let current = available.split_off(available.len().saturating_sub(len));
    let previous = available.split_off(available.len().saturating_sub(len));
    (current, previous)
}
