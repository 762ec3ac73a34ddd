use api_client::{FinanceApi, ListQuery, error::ApiError};
use chrono::{DateTime, Utc};
use core_types::{BudgetLine, CashFlowEntry, CompanyUnit, FinancialPeriod};

/// Months of history fetched per unit: enough for a 24 month view and the 24 months before it.
pub const HISTORY_MONTHS: u32 = 48;

/// Everything the dashboard draws for one business unit, oldest rows first.
#[derive(Debug, Clone)]
pub struct DashboardData {
    pub unit: CompanyUnit,
    pub periods: Vec<FinancialPeriod>,
    pub budgets: Vec<BudgetLine>,
    pub cash_flows: Vec<CashFlowEntry>,
    pub fetched_at: DateTime<Utc>,
}

/// Fetches periods, budgets and cash flows of `unit` concurrently.
pub async fn fetch(api: &dyn FinanceApi, unit: CompanyUnit) -> Result<DashboardData, ApiError> {
    let query = ListQuery::latest(unit, HISTORY_MONTHS);
    let (periods, budgets, cash_flows) = futures::try_join!(
        api.periods(&query),
        api.budgets(&query),
        api.cash_flows(&query)
    )?;

    tracing::debug!(
        unit = %unit,
        periods = periods.len(),
        budgets = budgets.len(),
        cash_flows = cash_flows.len(),
        "Dashboard data fetched."
    );
    Ok(DashboardData {
        unit,
        periods,
        budgets,
        cash_flows,
        fetched_at: Utc::now(),
    })
}
