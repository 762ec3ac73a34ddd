//! Query parameters and their validation.
//!
//! Everything arrives as optional strings and is checked here, so a bad value
//! becomes a 422 with a JSON body instead of an extractor rejection.

use crate::error::AppError;
use analytics::DayWindow;
use chrono::{NaiveDate, Utc};
use core_types::{CompanyUnit, DatasetKind};
use serde::Deserialize;
use std::ops::RangeInclusive;
use std::str::FromStr;

pub const PERIOD_MONTHS: RangeInclusive<u32> = 1..=24;
pub const DEFAULT_PERIOD_MONTHS: u32 = 12;
pub const LIST_LIMIT: RangeInclusive<u32> = 1..=100;
pub const DEFAULT_LIST_LIMIT: u32 = 24;
pub const TREND_MONTHS: RangeInclusive<u32> = 2..=60;
pub const DEFAULT_TREND_MONTHS: u32 = 24;
pub const FORECAST_HORIZON: RangeInclusive<u32> = 1..=12;
pub const DEFAULT_FORECAST_HORIZON: u32 = 6;
/// How many trailing months a forecast is fitted on.
pub const FORECAST_HISTORY: u32 = 24;

/// `?period_months&company_unit&as_of`
#[derive(Debug, Default, Deserialize)]
pub struct WindowParams {
    pub period_months: Option<u32>,
    pub company_unit: Option<String>,
    pub as_of: Option<String>,
}

/// `?start_date&end_date&company_unit&limit`
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub company_unit: Option<String>,
    pub limit: Option<u32>,
}

/// `?months&company_unit`
#[derive(Debug, Default, Deserialize)]
pub struct TrendParams {
    pub months: Option<u32>,
    pub company_unit: Option<String>,
}

/// `?horizon&company_unit`
#[derive(Debug, Default, Deserialize)]
pub struct ForecastParams {
    pub horizon: Option<u32>,
    pub company_unit: Option<String>,
}

/// `?kind&company_unit`
#[derive(Debug, Default, Deserialize)]
pub struct DatasetParams {
    pub kind: Option<String>,
    pub company_unit: Option<String>,
}

pub fn unit(raw: Option<&str>) -> Result<CompanyUnit, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(CompanyUnit::default()),
        Some(value) => CompanyUnit::from_str(value).map_err(|e| AppError::Validation(e.to_string())),
    }
}

pub fn date(field: &str, raw: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| AppError::Validation(format!("{field} must be a date like 2024-01-31, got '{value}'"))),
    }
}

pub fn bounded(
    field: &str,
    value: Option<u32>,
    default: u32,
    range: RangeInclusive<u32>,
) -> Result<u32, AppError> {
    let value = value.unwrap_or(default);
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(AppError::Validation(format!(
            "{field} must be between {} and {}, got {value}",
            range.start(),
            range.end()
        )))
    }
}

pub fn dataset(raw: Option<&str>) -> Result<DatasetKind, AppError> {
    let value = raw
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation("kind is required (periods, budgets or cash_flows)".to_string()))?;
    DatasetKind::from_str(value).map_err(|e| AppError::Validation(e.to_string()))
}

/// A validated analysis window for one unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedWindow {
    pub unit: CompanyUnit,
    pub months: u32,
    pub window: DayWindow,
}

impl WindowParams {
    pub fn resolve(&self) -> Result<ResolvedWindow, AppError> {
        let months = bounded("period_months", self.period_months, DEFAULT_PERIOD_MONTHS, PERIOD_MONTHS)?;
        let as_of = date("as_of", self.as_of.as_deref())?.unwrap_or_else(|| Utc::now().date_naive());
        let window = DayWindow::trailing_months(as_of, months)
            .map_err(|_| AppError::Validation(format!("as_of {as_of} is too early for a {months} month window")))?;
        Ok(ResolvedWindow {
            unit: unit(self.company_unit.as_deref())?,
            months,
            window,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_defaults_to_twelve_months_of_consolidated_data() {
        let params = WindowParams {
            as_of: Some("2024-06-30".to_string()),
            ..WindowParams::default()
        };
        let resolved = params.resolve().unwrap();
        assert_eq!(resolved.unit, CompanyUnit::Consolidated);
        assert_eq!(resolved.months, 12);
        assert_eq!(resolved.window.end, NaiveDate::from_ymd_opt(2024, 6, 30).unwrap());
        assert_eq!(resolved.window.start, NaiveDate::from_ymd_opt(2023, 7, 6).unwrap());
    }

    #[test]
    fn window_reaching_before_the_calendar_is_rejected() {
        let params = WindowParams {
            period_months: Some(24),
            as_of: Some("-262143-01-05".to_string()),
            ..WindowParams::default()
        };
        assert!(matches!(params.resolve(), Err(AppError::Validation(_))));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(bounded("limit", Some(0), DEFAULT_LIST_LIMIT, LIST_LIMIT).is_err());
        assert!(bounded("limit", Some(101), DEFAULT_LIST_LIMIT, LIST_LIMIT).is_err());
        assert_eq!(bounded("limit", None, DEFAULT_LIST_LIMIT, LIST_LIMIT).unwrap(), 24);
        assert!(date("as_of", Some("31/01/2024")).is_err());
        assert!(unit(Some("mars")).is_err());
        assert!(dataset(None).is_err());
        assert_eq!(dataset(Some("cash-flows")).unwrap(), DatasetKind::CashFlows);
    }
}
