//! Deterministic sample data for an empty store.

use crate::DbError;
use crate::repository::{FinanceRepository, OPENING_CASH_BALANCE, write_budget, write_cash_flow, write_period};
use chrono::{Datelike, Months, NaiveDate};
use core_types::{BudgetInput, CashFlowInput, CompanyUnit, PeriodInput, REPORTING_DP, month_start};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::f64::consts::PI;

/// Annual consolidated revenue the generator is centred on.
const ANNUAL_REVENUE_BASE: f64 = 50_000_000.0;
const MONTHLY_GROWTH: f64 = 0.005;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    /// The store already held periods; nothing was written.
    Skipped { existing: i64 },
    /// Number of financial periods written, consolidated rows included.
    Generated { periods: usize },
}

/// Share of the consolidated figures each region contributes.
fn region_share(unit: CompanyUnit) -> f64 {
    match unit {
        CompanyUnit::NorthAmerica => 0.45,
        CompanyUnit::Europe => 0.35,
        CompanyUnit::AsiaPacific => 0.20,
        CompanyUnit::Consolidated => 1.0,
    }
}

struct Sampler {
    rng: StdRng,
}

impl Sampler {
    fn normal(&mut self, mean: f64, std_dev: f64) -> Result<f64, DbError> {
        let dist = Normal::new(mean, std_dev)
            .map_err(|e| DbError::Invalid(format!("normal({mean}, {std_dev}): {e}")))?;
        Ok(dist.sample(&mut self.rng))
    }

    /// A non-negative ratio drawn around `mean`.
    fn ratio(&mut self, mean: f64, std_dev: f64) -> Result<f64, DbError> {
        Ok(self.normal(mean, std_dev)?.max(0.0))
    }
}

fn money(value: f64) -> Result<Decimal, DbError> {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(REPORTING_DP))
        .ok_or_else(|| DbError::Invalid(format!("{value} is not a representable amount")))
}

/// One generated month for one region.
struct RegionMonth {
    period: PeriodInput,
    budget: BudgetInput,
    cash: CashFlowInput,
    cash_balance: Decimal,
}

fn sum_periods(date: NaiveDate, rows: &[RegionMonth]) -> PeriodInput {
    let mut total = PeriodInput {
        period_date: date,
        company_unit: CompanyUnit::Consolidated,
        revenue: Decimal::ZERO,
        cogs: Decimal::ZERO,
        salaries: Decimal::ZERO,
        marketing: Decimal::ZERO,
        rd_expense: Decimal::ZERO,
        operations: Decimal::ZERO,
        other_expenses: Decimal::ZERO,
    };
    for row in rows {
        let p = &row.period;
        total.revenue += p.revenue;
        total.cogs += p.cogs;
        total.salaries += p.salaries;
        total.marketing += p.marketing;
        total.rd_expense += p.rd_expense;
        total.operations += p.operations;
        total.other_expenses += p.other_expenses;
    }
    total
}

fn sum_budgets(date: NaiveDate, rows: &[RegionMonth]) -> BudgetInput {
    BudgetInput {
        period_date: date,
        company_unit: CompanyUnit::Consolidated,
        budget_revenue: rows.iter().map(|r| r.budget.budget_revenue).sum(),
        budget_net_profit: rows.iter().map(|r| r.budget.budget_net_profit).sum(),
        budget_expenses: rows.iter().map(|r| r.budget.budget_expenses).sum(),
    }
}

fn sum_cash(date: NaiveDate, rows: &[RegionMonth]) -> (CashFlowInput, Decimal) {
    let balance: Decimal = rows.iter().map(|r| r.cash_balance).sum();
    let input = CashFlowInput {
        period_date: date,
        company_unit: CompanyUnit::Consolidated,
        operating_cash_flow: rows.iter().map(|r| r.cash.operating_cash_flow).sum(),
        investing_cash_flow: rows.iter().map(|r| r.cash.investing_cash_flow).sum(),
        financing_cash_flow: rows.iter().map(|r| r.cash.financing_cash_flow).sum(),
        cash_balance: Some(balance),
    };
    (input, balance)
}

fn generate_region_month(
    sampler: &mut Sampler,
    unit: CompanyUnit,
    date: NaiveDate,
    months_since_start: u32,
    previous_balance: Decimal,
) -> Result<RegionMonth, DbError> {
    let share = region_share(unit);
    let seasonality = 1.0 + 0.1 * (2.0 * PI * f64::from(date.month()) / 12.0).sin();
    let growth = 1.0 + f64::from(months_since_start) * MONTHLY_GROWTH;
    let noise = sampler.normal(1.0, 0.08)?;
    let revenue = (ANNUAL_REVENUE_BASE * share / 12.0 * seasonality * growth * noise).max(0.0);

    let period = PeriodInput {
        period_date: date,
        company_unit: unit,
        revenue: money(revenue)?,
        cogs: money(revenue * sampler.ratio(0.35, 0.02)?)?,
        salaries: money(revenue * sampler.ratio(0.25, 0.01)?)?,
        marketing: money(revenue * sampler.ratio(0.08, 0.02)?)?,
        rd_expense: money(revenue * sampler.ratio(0.12, 0.01)?)?,
        operations: money(revenue * sampler.ratio(0.06, 0.01)?)?,
        other_expenses: money(revenue * sampler.ratio(0.04, 0.01)?)?,
    };
    let derived = period.derive()?;

    let budget_factor = money(sampler.ratio(1.1, 0.05)?)?;
    let expense_factor = money(sampler.ratio(0.95, 0.03)?)?;
    let budget = BudgetInput {
        period_date: date,
        company_unit: unit,
        budget_revenue: (period.revenue * budget_factor).round_dp(REPORTING_DP),
        budget_net_profit: (derived.net_profit * budget_factor).round_dp(REPORTING_DP),
        budget_expenses: (derived.total_expenses * expense_factor).round_dp(REPORTING_DP),
    };

    let cash = CashFlowInput {
        period_date: date,
        company_unit: unit,
        operating_cash_flow: derived.net_profit + money(sampler.normal(500_000.0, 100_000.0)? * share)?,
        investing_cash_flow: money(sampler.normal(-200_000.0, 50_000.0)? * share)?,
        financing_cash_flow: money(sampler.normal(-100_000.0, 200_000.0)? * share)?,
        cash_balance: None,
    };
    let cash_balance = previous_balance + cash.net_cash_flow()?;

    Ok(RegionMonth {
        period,
        budget,
        cash,
        cash_balance,
    })
}

/// Fills an empty store with `months + 1` months of sample data ending at `as_of`'s month.
///
/// Each region gets its own periods, budgets and cash flows; the consolidated
/// unit is written as their sum. The same `rng_seed` always produces the same
/// figures. Nothing is written when any financial period already exists.
pub async fn generate_sample_data(
    repo: &FinanceRepository,
    months: u32,
    rng_seed: u64,
    as_of: NaiveDate,
) -> Result<SeedOutcome, DbError> {
    let existing = repo.count_periods().await?;
    if existing > 0 {
        tracing::info!(existing, "Financial data already present, skipping sample generation.");
        return Ok(SeedOutcome::Skipped { existing });
    }

    let end = month_start(as_of);
    let start = end
        .checked_sub_months(Months::new(months))
        .ok_or_else(|| DbError::Invalid(format!("cannot go back {months} months from {end}")))?;
    tracing::info!(%start, %end, rng_seed, "Generating sample financial data...");

    let mut sampler = Sampler {
        rng: StdRng::seed_from_u64(rng_seed),
    };
    let mut balances: Vec<Decimal> = CompanyUnit::REGIONS
        .iter()
        .map(|unit| {
            money(region_share(*unit)).map(|share| (OPENING_CASH_BALANCE * share).round_dp(REPORTING_DP))
        })
        .collect::<Result<_, _>>()?;

    let mut tx = repo.pool().begin().await?;
    let mut written = 0;
    for offset in 0..=months {
        let date = start
            .checked_add_months(Months::new(offset))
            .ok_or_else(|| DbError::Invalid(format!("date overflow after {start}")))?;

        let mut rows = Vec::with_capacity(CompanyUnit::REGIONS.len());
        for (i, unit) in CompanyUnit::REGIONS.iter().enumerate() {
            let row = generate_region_month(&mut sampler, *unit, date, offset, balances[i])?;
            balances[i] = row.cash_balance;
            rows.push(row);
        }

        for row in &rows {
            write_period(&mut *tx, &row.period).await?;
            write_budget(&mut *tx, &row.budget).await?;
            write_cash_flow(&mut *tx, &row.cash, row.cash_balance).await?;
        }

        let (cash, balance) = sum_cash(date, &rows);
        write_period(&mut *tx, &sum_periods(date, &rows)).await?;
        write_budget(&mut *tx, &sum_budgets(date, &rows)).await?;
        write_cash_flow(&mut *tx, &cash, balance).await?;
        written += rows.len() + 1;
    }
    tx.commit().await?;

    tracing::info!(periods = written, "Sample financial data generated.");
    Ok(SeedOutcome::Generated { periods: written })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::connect_in_memory;
    use crate::repository::PeriodFilter;

    async fn repo() -> FinanceRepository {
        FinanceRepository::new(connect_in_memory().await.unwrap())
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 18).unwrap()
    }

    #[tokio::test]
    async fn generates_every_unit_for_every_month() {
        let repo = repo().await;
        let outcome = generate_sample_data(&repo, 3, 42, as_of()).await.unwrap();
        assert_eq!(outcome, SeedOutcome::Generated { periods: 16 });
        assert_eq!(repo.count_periods().await.unwrap(), 16);

        let consolidated = repo
            .list_periods(&PeriodFilter::unit(CompanyUnit::Consolidated))
            .await
            .unwrap();
        assert_eq!(consolidated.len(), 4);
        assert_eq!(consolidated[0].period_date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(consolidated[3].period_date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        for period in &consolidated {
            assert_eq!(period.net_profit, period.revenue - period.total_expenses);
            assert!(period.revenue > Decimal::ZERO);
        }
    }

    #[tokio::test]
    async fn consolidated_rows_are_the_sum_of_regions() {
        let repo = repo().await;
        generate_sample_data(&repo, 2, 7, as_of()).await.unwrap();

        let mut regional_revenue = Decimal::ZERO;
        let mut regional_balance = Decimal::ZERO;
        for unit in CompanyUnit::REGIONS {
            let periods = repo.list_periods(&PeriodFilter::unit(unit)).await.unwrap();
            regional_revenue += periods.iter().map(|p| p.revenue).sum::<Decimal>();
            let flows = repo.list_cash_flows(&PeriodFilter::unit(unit)).await.unwrap();
            regional_balance += flows.last().unwrap().cash_balance;
        }

        let consolidated = repo
            .list_periods(&PeriodFilter::unit(CompanyUnit::Consolidated))
            .await
            .unwrap();
        let consolidated_revenue: Decimal = consolidated.iter().map(|p| p.revenue).sum();
        assert_eq!(consolidated_revenue, regional_revenue);

        let balance = repo
            .latest_cash_balance(CompanyUnit::Consolidated, as_of())
            .await
            .unwrap();
        assert_eq!(balance, Some(regional_balance));

        let budgets = repo
            .list_budgets(&PeriodFilter::unit(CompanyUnit::Consolidated))
            .await
            .unwrap();
        assert_eq!(budgets.len(), 3);
    }

    #[tokio::test]
    async fn same_seed_produces_same_figures() {
        let (first, second) = (repo().await, repo().await);
        generate_sample_data(&first, 2, 42, as_of()).await.unwrap();
        generate_sample_data(&second, 2, 42, as_of()).await.unwrap();

        let filter = PeriodFilter::unit(CompanyUnit::Europe);
        let a: Vec<Decimal> = first.list_periods(&filter).await.unwrap().iter().map(|p| p.revenue).collect();
        let b: Vec<Decimal> = second.list_periods(&filter).await.unwrap().iter().map(|p| p.revenue).collect();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn existing_data_is_left_alone() {
        let repo = repo().await;
        generate_sample_data(&repo, 1, 42, as_of()).await.unwrap();
        let outcome = generate_sample_data(&repo, 1, 42, as_of()).await.unwrap();
        assert_eq!(outcome, SeedOutcome::Skipped { existing: 8 });
    }
}
