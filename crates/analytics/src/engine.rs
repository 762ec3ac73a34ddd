use crate::error::AnalyticsError;
use crate::report::{
    CashFlowSummary, ExpenseShare, KpiReport, PeriodVariance, PnlBreakdown, RevenueInsights,
    StepMeasure, VarianceLine, VarianceReport, WaterfallStep,
};
use chrono::NaiveDate;
use core_types::{
    BudgetLine, CashFlowEntry, FinancialPeriod, REPORTING_DP, checked_percentage, percentage,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{BTreeMap, BTreeSet};

/// Share of revenue assumed to be held as cash when no balance has been recorded.
const CASH_ESTIMATE_RATIO: Decimal = dec!(0.15);

/// Cash balances at the end of the analysed window and the one before it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CashSnapshot {
    pub current: Option<Decimal>,
    pub previous: Option<Decimal>,
}

/// A stateless calculator for deriving reporting metrics from stored periods.
#[derive(Debug, Default)]
pub struct AnalyticsEngine {}

fn round(value: Decimal) -> Decimal {
    value.round_dp(REPORTING_DP)
}

/// `(current - previous) / previous * 100`, or zero unless `previous` is
/// positive. Saturates when the change does not fit a `Decimal`.
fn growth_pct(current: Decimal, previous: Decimal) -> Decimal {
    if previous > Decimal::ZERO {
        current
            .checked_sub(previous)
            .map(|change| percentage(change, previous))
            .unwrap_or(Decimal::MIN)
    } else {
        Decimal::ZERO
    }
}

/// `None` when `whole` is zero or the ratio does not fit a `Decimal`.
fn ratio_pct(part: Decimal, whole: Decimal) -> Option<Decimal> {
    if whole.is_zero() {
        None
    } else {
        checked_percentage(part, whole)
    }
}

fn sum_by<T>(items: &[T], field: impl Fn(&T) -> Decimal) -> Decimal {
    items.iter().map(field).fold(Decimal::ZERO, Decimal::saturating_add)
}

impl VarianceLine {
    fn new(actual: Decimal, budget: Decimal) -> Self {
        let difference = actual.saturating_sub(budget);
        Self {
            actual: round(actual),
            budget: round(budget),
            difference: round(difference),
            variance_pct: ratio_pct(difference, budget),
        }
    }
}

impl AnalyticsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculates the headline KPIs of `current` and compares them with `previous`.
    ///
    /// Growth rates stay at zero when there is no previous data or when the
    /// previous figure is not positive. When no cash balance is known the cash
    /// position is estimated as 15% of current revenue.
    pub fn kpis(
        &self,
        current: &[FinancialPeriod],
        previous: &[FinancialPeriod],
        cash: CashSnapshot,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<KpiReport, AnalyticsError> {
        if current.is_empty() {
            return Err(AnalyticsError::NotEnoughData(
                "no financial data found for the specified period".to_string(),
            ));
        }

        let revenue = sum_by(current, |p| p.revenue);
        let profit = sum_by(current, |p| p.net_profit);
        let margin = if revenue > Decimal::ZERO {
            percentage(profit, revenue)
        } else {
            Decimal::ZERO
        };

        let mut revenue_growth = Decimal::ZERO;
        let mut profit_growth = Decimal::ZERO;
        let mut margin_change = Decimal::ZERO;

        if !previous.is_empty() {
            let prev_revenue = sum_by(previous, |p| p.revenue);
            let prev_profit = sum_by(previous, |p| p.net_profit);
            let prev_margin = if prev_revenue > Decimal::ZERO {
                percentage(prev_profit, prev_revenue)
            } else {
                Decimal::ZERO
            };

            revenue_growth = growth_pct(revenue, prev_revenue);
            profit_growth = growth_pct(profit, prev_profit);
            margin_change = margin.saturating_sub(prev_margin);
        }

        let cash_position = cash
            .current
            .unwrap_or_else(|| revenue * CASH_ESTIMATE_RATIO);
        let cash_growth_pct = match (cash.current, cash.previous) {
            (Some(now), Some(before)) if !before.is_zero() => {
                ratio_pct(now.saturating_sub(before), before.abs())
            }
            _ => None,
        };

        Ok(KpiReport {
            total_revenue: round(revenue),
            revenue_growth_pct: revenue_growth,
            total_profit: round(profit),
            profit_growth_pct: profit_growth,
            net_margin_pct: margin,
            margin_change_pp: round(margin_change),
            cash_position: round(cash_position),
            cash_growth_pct,
            period_start,
            period_end,
            periods_analyzed: current.len(),
        })
    }

    /// Totals every P&L line and lays them out as a waterfall from revenue to net profit.
    pub fn pnl_breakdown(&self, periods: &[FinancialPeriod]) -> Result<PnlBreakdown, AnalyticsError> {
        if periods.is_empty() {
            return Err(AnalyticsError::NotEnoughData(
                "no financial periods to break down".to_string(),
            ));
        }

        let revenue = sum_by(periods, |p| p.revenue);
        let expenses = [
            ("COGS", sum_by(periods, |p| p.cogs)),
            ("Salaries", sum_by(periods, |p| p.salaries)),
            ("Marketing", sum_by(periods, |p| p.marketing)),
            ("R&D", sum_by(periods, |p| p.rd_expense)),
            ("Operations", sum_by(periods, |p| p.operations)),
            ("Other", sum_by(periods, |p| p.other_expenses)),
        ];
        let total_expenses: Decimal = expenses.iter().map(|(_, amount)| *amount).sum();
        let gross_profit = revenue - expenses[0].1;
        let net_profit = revenue - total_expenses;

        let mut steps = Vec::with_capacity(expenses.len() + 2);
        steps.push(WaterfallStep {
            label: "Revenue".to_string(),
            measure: StepMeasure::Absolute,
            amount: round(revenue),
        });
        steps.extend(expenses.iter().map(|(label, amount)| WaterfallStep {
            label: label.to_string(),
            measure: StepMeasure::Relative,
            amount: round(-*amount),
        }));
        steps.push(WaterfallStep {
            label: "Net Profit".to_string(),
            measure: StepMeasure::Total,
            amount: round(net_profit),
        });

        let expense_shares = expenses
            .iter()
            .map(|(label, amount)| ExpenseShare {
                category: label.to_string(),
                amount: round(*amount),
                pct_of_revenue: percentage(*amount, revenue),
            })
            .collect();

        Ok(PnlBreakdown {
            total_revenue: round(revenue),
            gross_profit: round(gross_profit),
            total_expenses: round(total_expenses),
            net_profit: round(net_profit),
            gross_margin_pct: percentage(gross_profit, revenue),
            net_margin_pct: percentage(net_profit, revenue),
            steps,
            expense_shares,
        })
    }

    /// Compares actuals with budgets month by month and in total.
    ///
    /// Only months present on both sides contribute to the totals; the rest are
    /// listed in `unmatched_periods`.
    pub fn budget_variance(
        &self,
        actuals: &[FinancialPeriod],
        budgets: &[BudgetLine],
    ) -> Result<VarianceReport, AnalyticsError> {
        let actual_by_month: BTreeMap<NaiveDate, &FinancialPeriod> =
            actuals.iter().map(|p| (p.period_date, p)).collect();
        let budget_by_month: BTreeMap<NaiveDate, &BudgetLine> =
            budgets.iter().map(|b| (b.period_date, b)).collect();

        let months: BTreeSet<NaiveDate> = actual_by_month
            .keys()
            .chain(budget_by_month.keys())
            .copied()
            .collect();

        let mut periods = Vec::new();
        let mut unmatched_periods = Vec::new();
        let (mut rev_actual, mut rev_budget) = (Decimal::ZERO, Decimal::ZERO);
        let (mut np_actual, mut np_budget) = (Decimal::ZERO, Decimal::ZERO);
        let (mut exp_actual, mut exp_budget) = (Decimal::ZERO, Decimal::ZERO);

        for month in months {
            match (actual_by_month.get(&month), budget_by_month.get(&month)) {
                (Some(actual), Some(budget)) => {
                    rev_actual += actual.revenue;
                    rev_budget += budget.budget_revenue;
                    np_actual += actual.net_profit;
                    np_budget += budget.budget_net_profit;
                    exp_actual += actual.total_expenses;
                    exp_budget += budget.budget_expenses;
                    periods.push(PeriodVariance {
                        period_date: month,
                        revenue: VarianceLine::new(actual.revenue, budget.budget_revenue),
                        net_profit: VarianceLine::new(actual.net_profit, budget.budget_net_profit),
                        expenses: VarianceLine::new(actual.total_expenses, budget.budget_expenses),
                    });
                }
                _ => unmatched_periods.push(month),
            }
        }

        if periods.is_empty() {
            return Err(AnalyticsError::NotEnoughData(
                "no month has both actuals and a budget".to_string(),
            ));
        }

        Ok(VarianceReport {
            periods,
            revenue: VarianceLine::new(rev_actual, rev_budget),
            net_profit: VarianceLine::new(np_actual, np_budget),
            expenses: VarianceLine::new(exp_actual, exp_budget),
            unmatched_periods,
        })
    }

    /// Summarises cash movements and relates them to the P&L of the same months.
    pub fn cash_flow_summary(
        &self,
        entries: &[CashFlowEntry],
        periods: &[FinancialPeriod],
    ) -> Result<CashFlowSummary, AnalyticsError> {
        if entries.is_empty() {
            return Err(AnalyticsError::NotEnoughData(
                "no cash flow data found for the specified period".to_string(),
            ));
        }

        let months = Decimal::from(entries.len());
        let operating = sum_by(entries, |e| e.operating_cash_flow);
        let investing = sum_by(entries, |e| e.investing_cash_flow);
        let financing = sum_by(entries, |e| e.financing_cash_flow);
        let net = sum_by(entries, |e| e.net_cash_flow);
        let ending_cash_balance = entries
            .iter()
            .max_by_key(|e| e.period_date)
            .map(|e| e.cash_balance);

        let net_profit = sum_by(periods, |p| p.net_profit);
        let revenue = sum_by(periods, |p| p.revenue);
        let total_expenses = sum_by(periods, |p| p.total_expenses);

        let days_of_expenses = match ending_cash_balance {
            Some(balance) if !total_expenses.is_zero() => {
                balance
                    .checked_mul(dec!(365))
                    .and_then(|scaled| scaled.checked_div(total_expenses))
                    .map(|days| days.round_dp(0))
            }
            _ => None,
        };

        Ok(CashFlowSummary {
            months: entries.len(),
            operating_total: round(operating),
            investing_total: round(investing),
            financing_total: round(financing),
            net_total: round(net),
            operating_monthly_avg: round(operating / months),
            investing_monthly_avg: round(investing / months),
            ending_cash_balance: ending_cash_balance.map(round),
            cash_conversion_pct: ratio_pct(operating, net_profit),
            investing_pct_of_revenue: ratio_pct(investing.abs(), revenue),
            days_of_expenses,
        })
    }

    /// Describes revenue and profitability of `current`, with growth against `previous`.
    pub fn revenue_insights(
        &self,
        current: &[FinancialPeriod],
        previous: &[FinancialPeriod],
    ) -> Result<RevenueInsights, AnalyticsError> {
        if current.is_empty() {
            return Err(AnalyticsError::NotEnoughData(
                "no financial periods to describe".to_string(),
            ));
        }

        let count = Decimal::from(current.len());
        let revenue = sum_by(current, |p| p.revenue);
        let prev_revenue = sum_by(previous, |p| p.revenue);
        let average = revenue / count;
        let peak_month = current
            .iter()
            .max_by(|a, b| a.revenue.cmp(&b.revenue))
            .map(|p| p.period_date);

        Ok(RevenueInsights {
            growth_pct: if previous.is_empty() {
                None
            } else {
                ratio_pct(revenue.saturating_sub(prev_revenue), prev_revenue)
            },
            average_monthly_revenue: round(average),
            peak_month,
            annual_run_rate: round(average.saturating_mul(dec!(12))),
            average_gross_margin_pct: round(sum_by(current, |p| p.gross_margin_pct) / count),
            average_net_margin_pct: round(sum_by(current, |p| p.net_margin_pct) / count),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use core_types::{CompanyUnit, PeriodInput};

    pub(crate) fn period(year: i32, month: u32, revenue: Decimal, cost_ratio: Decimal) -> FinancialPeriod {
        // Six equal expense lines that together cost `cost_ratio` of revenue.
        let line = (revenue * cost_ratio / dec!(6)).round_dp(2);
        let input = PeriodInput {
            period_date: NaiveDate::from_ymd_opt(year, month, 1).unwrap(),
            company_unit: CompanyUnit::Consolidated,
            revenue,
            cogs: line,
            salaries: line,
            marketing: line,
            rd_expense: line,
            operations: line,
            other_expenses: line,
        };
        FinancialPeriod::from_input(0, &input, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()).unwrap()
    }

    fn date(year: i32, month: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, 1).unwrap()
    }

    fn budget(year: i32, month: u32, revenue: Decimal, profit: Decimal, expenses: Decimal) -> BudgetLine {
        BudgetLine {
            id: 0,
            period_date: date(year, month),
            company_unit: CompanyUnit::Consolidated,
            budget_revenue: revenue,
            budget_net_profit: profit,
            budget_expenses: expenses,
            created_at: Utc::now(),
        }
    }

    fn cash(year: i32, month: u32, op: Decimal, inv: Decimal, fin: Decimal, balance: Decimal) -> CashFlowEntry {
        CashFlowEntry {
            id: 0,
            period_date: date(year, month),
            company_unit: CompanyUnit::Consolidated,
            operating_cash_flow: op,
            investing_cash_flow: inv,
            financing_cash_flow: fin,
            net_cash_flow: op + inv + fin,
            cash_balance: balance,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn kpis_compare_against_previous_window() {
        let engine = AnalyticsEngine::new();
        let current = vec![period(2024, 1, dec!(1200), dec!(0.9)), period(2024, 2, dec!(1200), dec!(0.9))];
        let previous = vec![period(2023, 11, dec!(1000), dec!(0.9)), period(2023, 12, dec!(1000), dec!(0.9))];

        let report = engine
            .kpis(&current, &previous, CashSnapshot::default(), date(2024, 1), date(2024, 2))
            .unwrap();

        assert_eq!(report.total_revenue, dec!(2400));
        assert_eq!(report.total_profit, dec!(240));
        assert_eq!(report.revenue_growth_pct, dec!(20));
        assert_eq!(report.profit_growth_pct, dec!(20));
        assert_eq!(report.net_margin_pct, dec!(10));
        assert_eq!(report.margin_change_pp, Decimal::ZERO);
        assert_eq!(report.periods_analyzed, 2);
    }

    #[test]
    fn kpis_estimate_cash_when_no_balance_is_known() {
        let engine = AnalyticsEngine::new();
        let current = vec![period(2024, 1, dec!(1000), dec!(0.8))];
        let report = engine
            .kpis(&current, &[], CashSnapshot::default(), date(2024, 1), date(2024, 1))
            .unwrap();
        assert_eq!(report.cash_position, dec!(150));
        assert_eq!(report.revenue_growth_pct, Decimal::ZERO);
        assert_eq!(report.cash_growth_pct, None);

        let known = CashSnapshot { current: Some(dec!(1100)), previous: Some(dec!(1000)) };
        let report = engine.kpis(&current, &[], known, date(2024, 1), date(2024, 1)).unwrap();
        assert_eq!(report.cash_position, dec!(1100));
        assert_eq!(report.cash_growth_pct, Some(dec!(10)));
    }

    #[test]
    fn kpis_saturate_growth_from_a_negligible_base() {
        let engine = AnalyticsEngine::new();
        let current = vec![period(2024, 1, dec!(10000000000000000000000000000), Decimal::ZERO)];
        let previous = vec![period(2023, 12, dec!(0.0000000001), Decimal::ZERO)];
        let cash = CashSnapshot {
            current: Some(dec!(-10000000000000000000000000000)),
            previous: Some(dec!(0.0000000001)),
        };

        let report = engine.kpis(&current, &previous, cash, date(2024, 1), date(2024, 1)).unwrap();

        assert_eq!(report.revenue_growth_pct, Decimal::MAX);
        assert_eq!(report.profit_growth_pct, Decimal::MAX);
        assert_eq!(report.cash_growth_pct, None);
        assert_eq!(report.net_margin_pct, dec!(100));
    }

    #[test]
    fn kpis_do_not_report_growth_from_a_loss() {
        let engine = AnalyticsEngine::new();
        let current = vec![period(2024, 1, dec!(1000), dec!(0.9))];
        let previous = vec![period(2023, 12, dec!(1000), dec!(1.2))];
        let report = engine
            .kpis(&current, &previous, CashSnapshot::default(), date(2024, 1), date(2024, 1))
            .unwrap();
        assert_eq!(report.profit_growth_pct, Decimal::ZERO);
        assert_eq!(report.margin_change_pp, dec!(30));
    }

    #[test]
    fn kpis_require_current_data() {
        let err = AnalyticsEngine::new()
            .kpis(&[], &[], CashSnapshot::default(), date(2024, 1), date(2024, 1))
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::NotEnoughData(_)));
    }

    #[test]
    fn pnl_waterfall_runs_from_revenue_to_net_profit() {
        let breakdown = AnalyticsEngine::new()
            .pnl_breakdown(&[period(2024, 1, dec!(600), dec!(0.5)), period(2024, 2, dec!(600), dec!(0.5))])
            .unwrap();

        assert_eq!(breakdown.steps.len(), 8);
        assert_eq!(breakdown.steps[0].measure, StepMeasure::Absolute);
        assert_eq!(breakdown.steps[0].amount, dec!(1200));
        assert_eq!(breakdown.steps[1].label, "COGS");
        assert_eq!(breakdown.steps[1].amount, dec!(-100));
        let last = breakdown.steps.last().unwrap();
        assert_eq!(last.measure, StepMeasure::Total);
        assert_eq!(last.amount, dec!(600));

        let running: Decimal = breakdown.steps[..7].iter().map(|s| s.amount).sum();
        assert_eq!(running, last.amount);
        assert_eq!(breakdown.expense_shares[3].category, "R&D");
        assert_eq!(breakdown.expense_shares[3].pct_of_revenue, dec!(8.33));
        assert_eq!(breakdown.gross_margin_pct, dec!(91.67));
    }

    #[test]
    fn budget_variance_matches_months_and_lists_gaps() {
        let actuals = vec![period(2024, 1, dec!(1100), dec!(0.9)), period(2024, 2, dec!(900), dec!(0.9))];
        let budgets = vec![
            budget(2024, 1, dec!(1000), dec!(100), dec!(900)),
            budget(2024, 2, dec!(1000), dec!(100), dec!(900)),
            budget(2024, 3, dec!(1000), dec!(100), dec!(900)),
        ];

        let report = AnalyticsEngine::new().budget_variance(&actuals, &budgets).unwrap();

        assert_eq!(report.periods.len(), 2);
        assert_eq!(report.periods[0].revenue.difference, dec!(100));
        assert_eq!(report.periods[0].revenue.variance_pct, Some(dec!(10)));
        assert_eq!(report.periods[1].revenue.variance_pct, Some(dec!(-10)));
        assert_eq!(report.revenue.actual, dec!(2000));
        assert_eq!(report.revenue.budget, dec!(2000));
        assert_eq!(report.revenue.variance_pct, Some(Decimal::ZERO));
        assert_eq!(report.expenses.actual, dec!(1800));
        assert_eq!(report.unmatched_periods, vec![date(2024, 3)]);
    }

    #[test]
    fn budget_variance_has_no_percentage_for_zero_budget() {
        let actuals = vec![period(2024, 1, dec!(1000), dec!(0.9))];
        let budgets = vec![budget(2024, 1, dec!(1000), Decimal::ZERO, dec!(900))];
        let report = AnalyticsEngine::new().budget_variance(&actuals, &budgets).unwrap();
        assert_eq!(report.net_profit.variance_pct, None);
        assert_eq!(report.net_profit.difference, dec!(100));
    }

    #[test]
    fn cash_flow_summary_relates_cash_to_profit() {
        let entries = vec![
            cash(2024, 1, dec!(200), dec!(-50), dec!(-10), dec!(1140)),
            cash(2024, 2, dec!(120), dec!(-50), dec!(10), dec!(1200)),
        ];
        let periods = vec![period(2024, 1, dec!(1000), dec!(0.84)), period(2024, 2, dec!(1000), dec!(0.84))];

        let summary = AnalyticsEngine::new().cash_flow_summary(&entries, &periods).unwrap();

        assert_eq!(summary.months, 2);
        assert_eq!(summary.operating_total, dec!(320));
        assert_eq!(summary.investing_total, dec!(-100));
        assert_eq!(summary.net_total, dec!(220));
        assert_eq!(summary.operating_monthly_avg, dec!(160));
        assert_eq!(summary.ending_cash_balance, Some(dec!(1200)));
        // 320 operating against 320 net profit.
        assert_eq!(summary.cash_conversion_pct, Some(dec!(100)));
        assert_eq!(summary.investing_pct_of_revenue, Some(dec!(5)));
        // 1200 / (1680 / 365) = 260.7...
        assert_eq!(summary.days_of_expenses, Some(dec!(261)));
    }

    #[test]
    fn revenue_insights_find_peak_and_run_rate() {
        let current = vec![
            period(2024, 1, dec!(900), dec!(0.9)),
            period(2024, 2, dec!(1500), dec!(0.9)),
            period(2024, 3, dec!(1200), dec!(0.9)),
        ];
        let previous = vec![period(2023, 12, dec!(3000), dec!(0.9))];
        let insights = AnalyticsEngine::new().revenue_insights(&current, &previous).unwrap();

        assert_eq!(insights.peak_month, Some(date(2024, 2)));
        assert_eq!(insights.average_monthly_revenue, dec!(1200));
        assert_eq!(insights.annual_run_rate, dec!(14400));
        assert_eq!(insights.growth_pct, Some(dec!(20)));
        assert_eq!(insights.average_net_margin_pct, dec!(10));
    }
}
