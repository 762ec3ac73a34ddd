use crate::engine::AnalyticsEngine;
use crate::error::AnalyticsError;
use crate::report::{Forecast, ForecastPoint, RevenueTrend, TrendPoint};
use core_types::{FinancialPeriod, REPORTING_DP, add_months};
use rust_decimal::Decimal;

/// The longest projection the forecast will produce, in months.
pub const MAX_FORECAST_HORIZON: u32 = 12;

/// A least-squares line `y = intercept + slope * x` over `x = 0, 1, 2, ...`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LinearFit {
    slope: Decimal,
    intercept: Decimal,
}

fn out_of_range() -> AnalyticsError {
    AnalyticsError::InvalidInput("revenue is too large to fit a trend".to_string())
}

impl LinearFit {
    fn over(values: &[Decimal]) -> Result<Self, AnalyticsError> {
        if values.len() < 2 {
            return Err(AnalyticsError::NotEnoughData(format!(
                "a trend needs at least 2 periods, got {}",
                values.len()
            )));
        }

        let n = Decimal::from(values.len());
        let mean_x = (n - Decimal::ONE) / Decimal::TWO;
        let total = values
            .iter()
            .try_fold(Decimal::ZERO, |acc, y| acc.checked_add(*y))
            .ok_or_else(out_of_range)?;
        let mean_y = total / n;

        let (mut sxy, mut sxx) = (Decimal::ZERO, Decimal::ZERO);
        for (i, y) in values.iter().enumerate() {
            let dx = Decimal::from(i) - mean_x;
            sxy = y
                .checked_sub(mean_y)
                .and_then(|dy| dy.checked_mul(dx))
                .and_then(|term| sxy.checked_add(term))
                .ok_or_else(out_of_range)?;
            sxx += dx * dx;
        }

        let slope = sxy.checked_div(sxx).ok_or_else(out_of_range)?;
        let intercept = slope
            .checked_mul(mean_x)
            .and_then(|offset| mean_y.checked_sub(offset))
            .ok_or_else(out_of_range)?;
        Ok(Self { slope, intercept })
    }

    fn at(&self, x: usize) -> Result<Decimal, AnalyticsError> {
        self.slope
            .checked_mul(Decimal::from(x))
            .and_then(|rise| rise.checked_add(self.intercept))
            .ok_or_else(out_of_range)
    }
}

fn sorted(periods: &[FinancialPeriod]) -> Vec<&FinancialPeriod> {
    let mut ordered: Vec<&FinancialPeriod> = periods.iter().collect();
    ordered.sort_by_key(|p| p.period_date);
    ordered
}

impl AnalyticsEngine {
    /// Fits a straight line through monthly revenue, oldest period first.
    pub fn revenue_trend(&self, periods: &[FinancialPeriod]) -> Result<RevenueTrend, AnalyticsError> {
        let ordered = sorted(periods);
        let revenue: Vec<Decimal> = ordered.iter().map(|p| p.revenue).collect();
        let fit = LinearFit::over(&revenue)?;

        let points = ordered
            .iter()
            .enumerate()
            .map(|(i, p)| -> Result<TrendPoint, AnalyticsError> {
                Ok(TrendPoint {
                    period_date: p.period_date,
                    revenue: p.revenue,
                    net_margin_pct: p.net_margin_pct,
                    trend_revenue: fit.at(i)?.round_dp(REPORTING_DP),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RevenueTrend {
            points,
            slope: fit.slope.round_dp(REPORTING_DP),
            intercept: fit.intercept.round_dp(REPORTING_DP),
        })
    }

    /// Projects revenue and net profit for the `horizon` months after the last period.
    ///
    /// Revenue follows the fitted trend line, floored at zero. Net profit applies
    /// the average of the periods' net margins to the projected revenue, so every
    /// month weighs the same regardless of its size.
    pub fn forecast(&self, periods: &[FinancialPeriod], horizon: u32) -> Result<Forecast, AnalyticsError> {
        if horizon == 0 || horizon > MAX_FORECAST_HORIZON {
            return Err(AnalyticsError::InvalidInput(format!(
                "horizon must be between 1 and {MAX_FORECAST_HORIZON} months, got {horizon}"
            )));
        }

        let ordered = sorted(periods);
        let revenue: Vec<Decimal> = ordered.iter().map(|p| p.revenue).collect();
        let fit = LinearFit::over(&revenue)?;

        let margin_total = ordered
            .iter()
            .map(|p| p.net_margin_pct)
            .fold(Decimal::ZERO, Decimal::saturating_add);
        let net_margin_pct = (margin_total / Decimal::from(ordered.len())).round_dp(REPORTING_DP);

        let last = ordered.len() - 1;
        let last_date = ordered[last].period_date;
        let points = (1..=horizon)
            .map(|step| -> Result<ForecastPoint, AnalyticsError> {
                let projected = fit.at(last + step as usize)?.max(Decimal::ZERO);
                let net_profit = projected
                    .checked_mul(net_margin_pct)
                    .map(|profit| profit / Decimal::ONE_HUNDRED)
                    .ok_or_else(out_of_range)?;
                Ok(ForecastPoint {
                    period_date: add_months(last_date, step),
                    revenue: projected.round_dp(REPORTING_DP),
                    net_profit: net_profit.round_dp(REPORTING_DP),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Forecast {
            based_on_periods: ordered.len(),
            slope: fit.slope.round_dp(REPORTING_DP),
            net_margin_pct,
            points,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::period;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[test]
    fn trend_of_a_straight_line_is_exact() {
        let periods = vec![
            period(2024, 3, dec!(1200), dec!(0.9)),
            period(2024, 1, dec!(1000), dec!(0.9)),
            period(2024, 2, dec!(1100), dec!(0.9)),
        ];
        let trend = AnalyticsEngine::new().revenue_trend(&periods).unwrap();

        assert_eq!(trend.slope, dec!(100));
        assert_eq!(trend.intercept, dec!(1000));
        assert_eq!(trend.points[0].period_date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(trend.points[2].trend_revenue, dec!(1200));
        assert_eq!(trend.points[1].net_margin_pct, dec!(10));
    }

    #[test]
    fn trend_smooths_noisy_revenue() {
        let periods = vec![
            period(2024, 1, dec!(1000), dec!(0.9)),
            period(2024, 2, dec!(1300), dec!(0.9)),
            period(2024, 3, dec!(1100), dec!(0.9)),
            period(2024, 4, dec!(1400), dec!(0.9)),
        ];
        let trend = AnalyticsEngine::new().revenue_trend(&periods).unwrap();
        // sxy = 500, sxx = 5
        assert_eq!(trend.slope, dec!(100));
        assert_eq!(trend.intercept, dec!(1050));
    }

    #[test]
    fn trend_needs_two_points() {
        let err = AnalyticsEngine::new()
            .revenue_trend(&[period(2024, 1, dec!(1000), dec!(0.9))])
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::NotEnoughData(_)));
    }

    #[test]
    fn forecast_extends_the_trend_into_following_months() {
        let periods = vec![
            period(2024, 11, dec!(1000), dec!(0.9)),
            period(2024, 12, dec!(1100), dec!(0.9)),
        ];
        let forecast = AnalyticsEngine::new().forecast(&periods, 3).unwrap();

        assert_eq!(forecast.based_on_periods, 2);
        assert_eq!(forecast.net_margin_pct, dec!(10));
        assert_eq!(forecast.points.len(), 3);
        assert_eq!(forecast.points[0].period_date, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(forecast.points[0].revenue, dec!(1200));
        assert_eq!(forecast.points[0].net_profit, dec!(120));
        assert_eq!(forecast.points[2].revenue, dec!(1400));
    }

    #[test]
    fn forecast_weighs_every_month_equally_in_the_margin() {
        let periods = vec![
            period(2024, 1, dec!(1000), dec!(0.9)),
            period(2024, 2, dec!(3000), dec!(0.7)),
        ];
        let forecast = AnalyticsEngine::new().forecast(&periods, 1).unwrap();

        // 10% and 30% average to 20%; revenue-weighted it would be 25%.
        assert_eq!(forecast.net_margin_pct, dec!(20));
        assert_eq!(forecast.points[0].revenue, dec!(5000));
        assert_eq!(forecast.points[0].net_profit, dec!(1000));
    }

    #[test]
    fn trend_of_revenue_beyond_decimal_range_is_rejected() {
        let huge = dec!(70000000000000000000000000000);
        let periods = vec![period(2024, 1, huge, Decimal::ZERO), period(2024, 2, huge, Decimal::ZERO)];
        let engine = AnalyticsEngine::new();
        assert!(matches!(engine.revenue_trend(&periods), Err(AnalyticsError::InvalidInput(_))));
        assert!(matches!(engine.forecast(&periods, 1), Err(AnalyticsError::InvalidInput(_))));
    }

    #[test]
    fn forecast_never_projects_negative_revenue() {
        let periods = vec![
            period(2024, 1, dec!(1000), dec!(0.9)),
            period(2024, 2, dec!(100), dec!(0.9)),
        ];
        let forecast = AnalyticsEngine::new().forecast(&periods, 2).unwrap();
        assert_eq!(forecast.points[0].revenue, Decimal::ZERO);
        assert_eq!(forecast.points[1].net_profit, Decimal::ZERO);
    }

    #[test]
    fn forecast_rejects_out_of_range_horizons() {
        let periods = vec![period(2024, 1, dec!(1000), dec!(0.9)), period(2024, 2, dec!(1000), dec!(0.9))];
        let engine = AnalyticsEngine::new();
        assert!(matches!(engine.forecast(&periods, 0), Err(AnalyticsError::InvalidInput(_))));
        assert!(matches!(engine.forecast(&periods, 13), Err(AnalyticsError::InvalidInput(_))));
    }
}
