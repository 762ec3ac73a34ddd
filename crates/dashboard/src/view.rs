//! Turns fetched data and the sidebar selection into the figures one page shows.

use crate::data::DashboardData;
use analytics::{
    AnalyticsEngine, CashFlowSummary, CashSnapshot, KpiReport, PnlBreakdown, RevenueInsights,
    RevenueTrend, VarianceReport, window,
};
use chrono::NaiveDate;
use core_types::{AnalysisWindow, CashFlowEntry, CompanyUnit, Currency, FinancialPeriod};
use rust_decimal::Decimal;

/// How many trailing months the revenue trend chart covers.
pub const TREND_MONTHS: usize = 24;

/// The sidebar selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub window: AnalysisWindow,
    pub unit: CompanyUnit,
    pub currency: Currency,
}

/// The computed content of one dashboard page. Sections without data are `None`.
#[derive(Debug, Clone)]
pub struct DashboardView {
    pub selection: Selection,
    /// Date of the newest period; the windows are anchored here.
    pub as_of: Option<NaiveDate>,
    pub kpis: Option<KpiReport>,
    pub insights: Option<RevenueInsights>,
    pub trend: Option<RevenueTrend>,
    pub pnl: Option<PnlBreakdown>,
    pub variance: Option<VarianceReport>,
    pub cash_summary: Option<CashFlowSummary>,
    pub cash_entries: Vec<CashFlowEntry>,
}

fn balance_on_or_before(entries: &[CashFlowEntry], date: NaiveDate) -> Option<Decimal> {
    entries
        .iter()
        .filter(|e| e.period_date <= date)
        .max_by_key(|e| e.period_date)
        .map(|e| e.cash_balance)
}

fn date_span(periods: &[FinancialPeriod]) -> Option<(NaiveDate, NaiveDate)> {
    let first = periods.iter().map(|p| p.period_date).min()?;
    let last = periods.iter().map(|p| p.period_date).max()?;
    Some((first, last))
}

impl DashboardView {
    pub fn build(engine: &AnalyticsEngine, data: &DashboardData, selection: Selection) -> Self {
        let mut view = DashboardView {
            selection,
            as_of: data.periods.iter().map(|p| p.period_date).max(),
            kpis: None,
            insights: None,
            trend: None,
            pnl: None,
            variance: None,
            cash_summary: None,
            cash_entries: Vec::new(),
        };
        let Some(as_of) = view.as_of else {
            return view;
        };

        let (current, previous) = window::select(&data.periods, selection.window, as_of);
        let Some((start, end)) = date_span(&current) else {
            return view;
        };

        let cash = CashSnapshot {
            current: balance_on_or_before(&data.cash_flows, end),
            previous: date_span(&previous).and_then(|(_, prev_end)| balance_on_or_before(&data.cash_flows, prev_end)),
        };
        view.kpis = engine.kpis(&current, &previous, cash, start, end).ok();
        view.insights = engine.revenue_insights(&current, &previous).ok();
        view.pnl = engine.pnl_breakdown(&current).ok();

        let recent = &data.periods[data.periods.len().saturating_sub(TREND_MONTHS)..];
        view.trend = engine.revenue_trend(recent).ok();

        let in_window = |date: NaiveDate| date >= start && date <= end;
        let budgets: Vec<_> = data.budgets.iter().filter(|b| in_window(b.period_date)).cloned().collect();
        view.variance = engine.budget_variance(&current, &budgets).ok();

        view.cash_entries = data.cash_flows.iter().filter(|e| in_window(e.period_date)).cloned().collect();
        view.cash_summary = engine.cash_flow_summary(&view.cash_entries, &current).ok();

        view
    }

    pub fn is_empty(&self) -> bool {
        self.kpis.is_none()
    }
}
