use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Headline performance indicators for one window, compared to the window before it.
///
/// This struct is the output of [`AnalyticsEngine::kpis`](crate::AnalyticsEngine::kpis)
/// and the body of `GET /financial/kpis`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiReport {
    pub total_revenue: Decimal,
    pub revenue_growth_pct: Decimal,
    pub total_profit: Decimal,
    pub profit_growth_pct: Decimal,
    pub net_margin_pct: Decimal,
    /// Change of the net margin in percentage points.
    pub margin_change_pp: Decimal,
    pub cash_position: Decimal,
    /// Growth of the cash balance since the end of the previous window, if both are known.
    pub cash_growth_pct: Option<Decimal>,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub periods_analyzed: usize,
}

/// How a waterfall bar relates to the running total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepMeasure {
    Absolute,
    Relative,
    Total,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterfallStep {
    pub label: String,
    pub measure: StepMeasure,
    /// Signed contribution; expenses are negative.
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseShare {
    pub category: String,
    pub amount: Decimal,
    pub pct_of_revenue: Decimal,
}

/// Aggregated profit and loss over a set of periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PnlBreakdown {
    pub total_revenue: Decimal,
    pub gross_profit: Decimal,
    pub total_expenses: Decimal,
    pub net_profit: Decimal,
    pub gross_margin_pct: Decimal,
    pub net_margin_pct: Decimal,
    pub steps: Vec<WaterfallStep>,
    pub expense_shares: Vec<ExpenseShare>,
}

/// Actual against budget for one figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceLine {
    pub actual: Decimal,
    pub budget: Decimal,
    /// `actual - budget`.
    pub difference: Decimal,
    /// `difference / budget * 100`; absent when the budget is zero.
    pub variance_pct: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodVariance {
    pub period_date: NaiveDate,
    pub revenue: VarianceLine,
    pub net_profit: VarianceLine,
    pub expenses: VarianceLine,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceReport {
    pub periods: Vec<PeriodVariance>,
    pub revenue: VarianceLine,
    pub net_profit: VarianceLine,
    pub expenses: VarianceLine,
    /// Months that have actuals or a budget but not both.
    pub unmatched_periods: Vec<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowSummary {
    pub months: usize,
    pub operating_total: Decimal,
    pub investing_total: Decimal,
    pub financing_total: Decimal,
    pub net_total: Decimal,
    pub operating_monthly_avg: Decimal,
    pub investing_monthly_avg: Decimal,
    pub ending_cash_balance: Option<Decimal>,
    /// Operating cash flow as a share of net profit.
    pub cash_conversion_pct: Option<Decimal>,
    /// Absolute investing cash flow as a share of revenue.
    pub investing_pct_of_revenue: Option<Decimal>,
    /// How many days of expenses the ending balance covers.
    pub days_of_expenses: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub period_date: NaiveDate,
    pub revenue: Decimal,
    pub net_margin_pct: Decimal,
    /// Revenue on the least-squares line at this point.
    pub trend_revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueTrend {
    pub points: Vec<TrendPoint>,
    /// Revenue change per month along the fitted line.
    pub slope: Decimal,
    pub intercept: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueInsights {
    pub growth_pct: Option<Decimal>,
    pub average_monthly_revenue: Decimal,
    pub peak_month: Option<NaiveDate>,
    pub annual_run_rate: Decimal,
    pub average_gross_margin_pct: Decimal,
    pub average_net_margin_pct: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub period_date: NaiveDate,
    pub revenue: Decimal,
    pub net_profit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub based_on_periods: usize,
    pub slope: Decimal,
    pub net_margin_pct: Decimal,
    pub points: Vec<ForecastPoint>,
}
