use crate::DbError;
use chrono::{DateTime, NaiveDate, Utc};
use core_types::{
    BudgetInput, BudgetLine, CashFlowEntry, CashFlowInput, CompanyUnit, FinancialPeriod,
    PeriodInput,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqlitePool};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteExecutor};
use std::str::FromStr;

/// The cash balance a unit starts from before its first recorded cash flow.
pub const OPENING_CASH_BALANCE: Decimal = dec!(10000000);

/// The `FinanceRepository` provides a high-level, application-specific interface
/// to the database. It encapsulates all SQL queries and data access logic.
#[derive(Debug, Clone)]
pub struct FinanceRepository {
    pool: SqlitePool,
}

/// Narrows a listing of periods, budgets or cash flows.
///
/// `from` and `until` are inclusive, `before` is exclusive. With a `limit`
/// only the newest rows are kept. Results are always returned oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeriodFilter {
    pub company_unit: Option<CompanyUnit>,
    pub from: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
    pub before: Option<NaiveDate>,
    pub limit: Option<u32>,
}

impl PeriodFilter {
    pub fn unit(company_unit: CompanyUnit) -> Self {
        Self {
            company_unit: Some(company_unit),
            ..Self::default()
        }
    }

    pub fn since(mut self, date: NaiveDate) -> Self {
        self.from = Some(date);
        self
    }

    pub fn until(mut self, date: NaiveDate) -> Self {
        self.until = Some(date);
        self
    }

    pub fn before(mut self, date: NaiveDate) -> Self {
        self.before = Some(date);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    fn push_where(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        builder.push(" WHERE 1 = 1");
        if let Some(unit) = self.company_unit {
            builder.push(" AND company_unit = ").push_bind(unit.as_str());
        }
        if let Some(from) = self.from {
            builder.push(" AND period_date >= ").push_bind(from);
        }
        if let Some(until) = self.until {
            builder.push(" AND period_date <= ").push_bind(until);
        }
        if let Some(before) = self.before {
            builder.push(" AND period_date < ").push_bind(before);
        }
        builder.push(" ORDER BY period_date DESC, company_unit DESC");
        if let Some(limit) = self.limit {
            builder.push(" LIMIT ").push_bind(i64::from(limit));
        }
    }
}

const PERIOD_COLUMNS: &str = "id, period_date, company_unit, revenue, cogs, gross_profit, salaries, \
     marketing, rd_expense, operations, other_expenses, total_expenses, net_profit, \
     gross_margin_pct, net_margin_pct, created_at";

const BUDGET_COLUMNS: &str = "id, period_date, company_unit, budget_revenue, budget_net_profit, \
     budget_expenses, created_at";

const CASH_FLOW_COLUMNS: &str = "id, period_date, company_unit, operating_cash_flow, \
     investing_cash_flow, financing_cash_flow, net_cash_flow, cash_balance, created_at";

// Rows as stored. Amounts are decimal strings and are parsed on the way out.
#[derive(Debug, FromRow)]
struct PeriodRow {
    id: i64,
    period_date: NaiveDate,
    company_unit: String,
    revenue: String,
    cogs: String,
    gross_profit: String,
    salaries: String,
    marketing: String,
    rd_expense: String,
    operations: String,
    other_expenses: String,
    total_expenses: String,
    net_profit: String,
    gross_margin_pct: String,
    net_margin_pct: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct BudgetRow {
    id: i64,
    period_date: NaiveDate,
    company_unit: String,
    budget_revenue: String,
    budget_net_profit: String,
    budget_expenses: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct CashFlowRow {
    id: i64,
    period_date: NaiveDate,
    company_unit: String,
    operating_cash_flow: String,
    investing_cash_flow: String,
    financing_cash_flow: String,
    net_cash_flow: String,
    cash_balance: String,
    created_at: DateTime<Utc>,
}

fn decimal(column: &str, raw: &str) -> Result<Decimal, DbError> {
    Decimal::from_str(raw).map_err(|e| DbError::Decode(format!("{column} '{raw}': {e}")))
}

fn unit(raw: &str) -> Result<CompanyUnit, DbError> {
    CompanyUnit::from_str(raw).map_err(|e| DbError::Decode(e.to_string()))
}

impl TryFrom<PeriodRow> for FinancialPeriod {
    type Error = DbError;

    fn try_from(row: PeriodRow) -> Result<Self, Self::Error> {
        Ok(FinancialPeriod {
            id: row.id,
            period_date: row.period_date,
            company_unit: unit(&row.company_unit)?,
            revenue: decimal("revenue", &row.revenue)?,
            cogs: decimal("cogs", &row.cogs)?,
            gross_profit: decimal("gross_profit", &row.gross_profit)?,
            salaries: decimal("salaries", &row.salaries)?,
            marketing: decimal("marketing", &row.marketing)?,
            rd_expense: decimal("rd_expense", &row.rd_expense)?,
            operations: decimal("operations", &row.operations)?,
            other_expenses: decimal("other_expenses", &row.other_expenses)?,
            total_expenses: decimal("total_expenses", &row.total_expenses)?,
            net_profit: decimal("net_profit", &row.net_profit)?,
            gross_margin_pct: decimal("gross_margin_pct", &row.gross_margin_pct)?,
            net_margin_pct: decimal("net_margin_pct", &row.net_margin_pct)?,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<BudgetRow> for BudgetLine {
    type Error = DbError;

    fn try_from(row: BudgetRow) -> Result<Self, Self::Error> {
        Ok(BudgetLine {
            id: row.id,
            period_date: row.period_date,
            company_unit: unit(&row.company_unit)?,
            budget_revenue: decimal("budget_revenue", &row.budget_revenue)?,
            budget_net_profit: decimal("budget_net_profit", &row.budget_net_profit)?,
            budget_expenses: decimal("budget_expenses", &row.budget_expenses)?,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<CashFlowRow> for CashFlowEntry {
    type Error = DbError;

    fn try_from(row: CashFlowRow) -> Result<Self, Self::Error> {
        Ok(CashFlowEntry {
            id: row.id,
            period_date: row.period_date,
            company_unit: unit(&row.company_unit)?,
            operating_cash_flow: decimal("operating_cash_flow", &row.operating_cash_flow)?,
            investing_cash_flow: decimal("investing_cash_flow", &row.investing_cash_flow)?,
            financing_cash_flow: decimal("financing_cash_flow", &row.financing_cash_flow)?,
            net_cash_flow: decimal("net_cash_flow", &row.net_cash_flow)?,
            cash_balance: decimal("cash_balance", &row.cash_balance)?,
            created_at: row.created_at,
        })
    }
}

/// Turns a unique-constraint violation into `DbError::Conflict`.
fn map_write_error(err: sqlx::Error, date: NaiveDate, unit: CompanyUnit) -> DbError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            DbError::Conflict(format!("{date} / {unit}"))
        }
        _ => DbError::from(err),
    }
}

/// Binds the columns shared by inserts and updates of `financial_periods`.
fn bind_period<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    input: &PeriodInput,
) -> Result<Query<'q, Sqlite, SqliteArguments<'q>>, DbError> {
    let derived = input.derive()?;
    Ok(query
        .bind(input.period_date)
        .bind(input.company_unit.as_str())
        .bind(input.revenue.to_string())
        .bind(input.cogs.to_string())
        .bind(derived.gross_profit.to_string())
        .bind(input.salaries.to_string())
        .bind(input.marketing.to_string())
        .bind(input.rd_expense.to_string())
        .bind(input.operations.to_string())
        .bind(input.other_expenses.to_string())
        .bind(derived.total_expenses.to_string())
        .bind(derived.net_profit.to_string())
        .bind(derived.gross_margin_pct.to_string())
        .bind(derived.net_margin_pct.to_string()))
}

/// Inserts or replaces the period for `(period_date, company_unit)`.
pub(crate) async fn write_period<'e, E>(executor: E, input: &PeriodInput) -> Result<(), DbError>
where
    E: SqliteExecutor<'e>,
{
    let query = sqlx::query(
        r#"
        INSERT INTO financial_periods (
            period_date, company_unit, revenue, cogs, gross_profit, salaries, marketing,
            rd_expense, operations, other_expenses, total_expenses, net_profit,
            gross_margin_pct, net_margin_pct, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (period_date, company_unit) DO UPDATE SET
            revenue = excluded.revenue,
            cogs = excluded.cogs,
            gross_profit = excluded.gross_profit,
            salaries = excluded.salaries,
            marketing = excluded.marketing,
            rd_expense = excluded.rd_expense,
            operations = excluded.operations,
            other_expenses = excluded.other_expenses,
            total_expenses = excluded.total_expenses,
            net_profit = excluded.net_profit,
            gross_margin_pct = excluded.gross_margin_pct,
            net_margin_pct = excluded.net_margin_pct
        "#,
    );
    bind_period(query, input)?
        .bind(Utc::now())
        .execute(executor)
        .await?;
    Ok(())
}

/// Inserts or replaces the budget for `(period_date, company_unit)`.
pub(crate) async fn write_budget<'e, E>(executor: E, input: &BudgetInput) -> Result<(), DbError>
where
    E: SqliteExecutor<'e>,
{
    input.validate()?;
    sqlx::query(
        r#"
        INSERT INTO budget_data (
            period_date, company_unit, budget_revenue, budget_net_profit, budget_expenses, created_at
        ) VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT (period_date, company_unit) DO UPDATE SET
            budget_revenue = excluded.budget_revenue,
            budget_net_profit = excluded.budget_net_profit,
            budget_expenses = excluded.budget_expenses
        "#,
    )
    .bind(input.period_date)
    .bind(input.company_unit.as_str())
    .bind(input.budget_revenue.to_string())
    .bind(input.budget_net_profit.to_string())
    .bind(input.budget_expenses.to_string())
    .bind(Utc::now())
    .execute(executor)
    .await?;
    Ok(())
}

/// Inserts or replaces the cash flow for `(period_date, company_unit)` with a known balance.
pub(crate) async fn write_cash_flow<'e, E>(
    executor: E,
    input: &CashFlowInput,
    cash_balance: Decimal,
) -> Result<(), DbError>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO cash_flow_data (
            period_date, company_unit, operating_cash_flow, investing_cash_flow,
            financing_cash_flow, net_cash_flow, cash_balance, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (period_date, company_unit) DO UPDATE SET
            operating_cash_flow = excluded.operating_cash_flow,
            investing_cash_flow = excluded.investing_cash_flow,
            financing_cash_flow = excluded.financing_cash_flow,
            net_cash_flow = excluded.net_cash_flow,
            cash_balance = excluded.cash_balance
        "#,
    )
    .bind(input.period_date)
    .bind(input.company_unit.as_str())
    .bind(input.operating_cash_flow.to_string())
    .bind(input.investing_cash_flow.to_string())
    .bind(input.financing_cash_flow.to_string())
    .bind(input.net_cash_flow()?.to_string())
    .bind(cash_balance.to_string())
    .bind(Utc::now())
    .execute(executor)
    .await?;
    Ok(())
}

impl FinanceRepository {
    /// Creates a new `FinanceRepository` with a shared database connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // --- Financial periods ---

    pub async fn count_periods(&self) -> Result<i64, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM financial_periods")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Creates a new period. Fails with `Conflict` if the month already exists for the unit.
    pub async fn insert_period(&self, input: &PeriodInput) -> Result<FinancialPeriod, DbError> {
        let input = input.clone().normalized();
        let query = sqlx::query(
            r#"
            INSERT INTO financial_periods (
                period_date, company_unit, revenue, cogs, gross_profit, salaries, marketing,
                rd_expense, operations, other_expenses, total_expenses, net_profit,
                gross_margin_pct, net_margin_pct, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        );
        let result = bind_period(query, &input)?
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, input.period_date, input.company_unit))?;

        tracing::debug!(id = result.last_insert_rowid(), date = %input.period_date, unit = %input.company_unit, "Financial period created.");
        self.get_period(result.last_insert_rowid()).await
    }

    /// Creates or replaces the period for the input's month and unit.
    pub async fn upsert_period(&self, input: &PeriodInput) -> Result<FinancialPeriod, DbError> {
        let input = input.clone().normalized();
        write_period(&self.pool, &input).await?;
        self.find_period(input.period_date, input.company_unit)
            .await?
            .ok_or(DbError::NotFound)
    }

    pub async fn get_period(&self, id: i64) -> Result<FinancialPeriod, DbError> {
        let row = sqlx::query_as::<_, PeriodRow>(&format!(
            "SELECT {PERIOD_COLUMNS} FROM financial_periods WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DbError::NotFound)?;
        row.try_into()
    }

    pub async fn find_period(
        &self,
        period_date: NaiveDate,
        company_unit: CompanyUnit,
    ) -> Result<Option<FinancialPeriod>, DbError> {
        let row = sqlx::query_as::<_, PeriodRow>(&format!(
            "SELECT {PERIOD_COLUMNS} FROM financial_periods WHERE period_date = ? AND company_unit = ?"
        ))
        .bind(period_date)
        .bind(company_unit.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(FinancialPeriod::try_from).transpose()
    }

    /// Replaces every line of an existing period and re-derives its figures.
    pub async fn update_period(&self, id: i64, input: &PeriodInput) -> Result<FinancialPeriod, DbError> {
        let input = input.clone().normalized();
        let query = sqlx::query(
            r#"
            UPDATE financial_periods SET
                period_date = ?, company_unit = ?, revenue = ?, cogs = ?, gross_profit = ?,
                salaries = ?, marketing = ?, rd_expense = ?, operations = ?, other_expenses = ?,
                total_expenses = ?, net_profit = ?, gross_margin_pct = ?, net_margin_pct = ?
            WHERE id = ?
            "#,
        );
        let result = bind_period(query, &input)?
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, input.period_date, input.company_unit))?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        self.get_period(id).await
    }

    pub async fn delete_period(&self, id: i64) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM financial_periods WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    pub async fn list_periods(&self, filter: &PeriodFilter) -> Result<Vec<FinancialPeriod>, DbError> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {PERIOD_COLUMNS} FROM financial_periods"));
        filter.push_where(&mut builder);
        let rows = builder.build_query_as::<PeriodRow>().fetch_all(&self.pool).await?;
        rows.into_iter().rev().map(FinancialPeriod::try_from).collect()
    }

    /// Periods of `company_unit` with `start <= period_date <= end`.
    pub async fn periods_between(
        &self,
        company_unit: CompanyUnit,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<FinancialPeriod>, DbError> {
        self.list_periods(&PeriodFilter::unit(company_unit).since(start).until(end))
            .await
    }

    /// Periods of `company_unit` with `start <= period_date < end`.
    pub async fn periods_in_range(
        &self,
        company_unit: CompanyUnit,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<FinancialPeriod>, DbError> {
        self.list_periods(&PeriodFilter::unit(company_unit).since(start).before(end))
            .await
    }

    // --- Budgets ---

    pub async fn upsert_budget(&self, input: &BudgetInput) -> Result<BudgetLine, DbError> {
        let input = input.clone().normalized();
        write_budget(&self.pool, &input).await?;
        let row = sqlx::query_as::<_, BudgetRow>(&format!(
            "SELECT {BUDGET_COLUMNS} FROM budget_data WHERE period_date = ? AND company_unit = ?"
        ))
        .bind(input.period_date)
        .bind(input.company_unit.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DbError::NotFound)?;
        row.try_into()
    }

    pub async fn list_budgets(&self, filter: &PeriodFilter) -> Result<Vec<BudgetLine>, DbError> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {BUDGET_COLUMNS} FROM budget_data"));
        filter.push_where(&mut builder);
        let rows = builder.build_query_as::<BudgetRow>().fetch_all(&self.pool).await?;
        rows.into_iter().rev().map(BudgetLine::try_from).collect()
    }

    // --- Cash flows ---

    /// Stores a month of cash flows.
    ///
    /// Without an explicit balance, the balance is carried forward from the
    /// latest earlier month (or [`OPENING_CASH_BALANCE`]) plus this month's net
    /// flow. Balances of later months are left as they are.
    pub async fn upsert_cash_flow(&self, input: &CashFlowInput) -> Result<CashFlowEntry, DbError> {
        let input = input.clone().normalized();
        let balance = match input.cash_balance {
            Some(balance) => balance,
            None => {
                let previous = self
                    .cash_balance_before(input.company_unit, input.period_date)
                    .await?
                    .unwrap_or(OPENING_CASH_BALANCE);
                previous
                    .checked_add(input.net_cash_flow()?)
                    .ok_or_else(|| DbError::Invalid("cash_balance is out of range".to_string()))?
            }
        };
        write_cash_flow(&self.pool, &input, balance).await?;

        let row = sqlx::query_as::<_, CashFlowRow>(&format!(
            "SELECT {CASH_FLOW_COLUMNS} FROM cash_flow_data WHERE period_date = ? AND company_unit = ?"
        ))
        .bind(input.period_date)
        .bind(input.company_unit.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DbError::NotFound)?;
        row.try_into()
    }

    pub async fn list_cash_flows(&self, filter: &PeriodFilter) -> Result<Vec<CashFlowEntry>, DbError> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {CASH_FLOW_COLUMNS} FROM cash_flow_data"));
        filter.push_where(&mut builder);
        let rows = builder.build_query_as::<CashFlowRow>().fetch_all(&self.pool).await?;
        rows.into_iter().rev().map(CashFlowEntry::try_from).collect()
    }

    /// The balance of the latest cash flow on or before `date`.
    pub async fn latest_cash_balance(
        &self,
        company_unit: CompanyUnit,
        date: NaiveDate,
    ) -> Result<Option<Decimal>, DbError> {
        self.balance_where(company_unit, date, "<=").await
    }

    async fn cash_balance_before(
        &self,
        company_unit: CompanyUnit,
        date: NaiveDate,
    ) -> Result<Option<Decimal>, DbError> {
        self.balance_where(company_unit, date, "<").await
    }

    async fn balance_where(
        &self,
        company_unit: CompanyUnit,
        date: NaiveDate,
        comparison: &str,
    ) -> Result<Option<Decimal>, DbError> {
        let raw: Option<String> = sqlx::query_scalar(&format!(
            "SELECT cash_balance FROM cash_flow_data \
             WHERE company_unit = ? AND period_date {comparison} ? \
             ORDER BY period_date DESC LIMIT 1"
        ))
        .bind(company_unit.as_str())
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;
        raw.map(|value| decimal("cash_balance", &value)).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::connect_in_memory;

    async fn repo() -> FinanceRepository {
        FinanceRepository::new(connect_in_memory().await.unwrap())
    }

    fn date(year: i32, month: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, 1).unwrap()
    }

    fn input(year: i32, month: u32, unit: CompanyUnit, revenue: Decimal) -> PeriodInput {
        PeriodInput {
            period_date: date(year, month),
            company_unit: unit,
            revenue,
            cogs: dec!(300),
            salaries: dec!(200),
            marketing: dec!(100),
            rd_expense: dec!(100),
            operations: dec!(50),
            other_expenses: dec!(50),
        }
    }

    #[tokio::test]
    async fn insert_derives_and_round_trips_decimals() {
        let repo = repo().await;
        let mut raw = input(2024, 1, CompanyUnit::Europe, dec!(1000.55));
        raw.period_date = NaiveDate::from_ymd_opt(2024, 1, 20).unwrap();

        let stored = repo.insert_period(&raw).await.unwrap();

        assert_eq!(stored.period_date, date(2024, 1));
        assert_eq!(stored.revenue, dec!(1000.55));
        assert_eq!(stored.total_expenses, dec!(800));
        assert_eq!(stored.net_profit, dec!(200.55));
        assert_eq!(stored.gross_profit, dec!(700.55));
        assert_eq!(repo.count_periods().await.unwrap(), 1);
        assert_eq!(repo.get_period(stored.id).await.unwrap(), stored);
    }

    #[tokio::test]
    async fn duplicate_month_is_a_conflict() {
        let repo = repo().await;
        repo.insert_period(&input(2024, 1, CompanyUnit::Europe, dec!(1000))).await.unwrap();
        let err = repo
            .insert_period(&input(2024, 1, CompanyUnit::Europe, dec!(2000)))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));

        // Same month, other unit is fine.
        repo.insert_period(&input(2024, 1, CompanyUnit::AsiaPacific, dec!(2000))).await.unwrap();
    }

    #[tokio::test]
    async fn upsert_replaces_existing_month() {
        let repo = repo().await;
        let first = repo.upsert_period(&input(2024, 2, CompanyUnit::Consolidated, dec!(1000))).await.unwrap();
        let second = repo.upsert_period(&input(2024, 2, CompanyUnit::Consolidated, dec!(1500))).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.net_profit, dec!(700));
        assert_eq!(repo.count_periods().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn update_and_delete_report_missing_rows() {
        let repo = repo().await;
        let stored = repo.insert_period(&input(2024, 3, CompanyUnit::Consolidated, dec!(1000))).await.unwrap();

        let updated = repo
            .update_period(stored.id, &input(2024, 3, CompanyUnit::Consolidated, dec!(900)))
            .await
            .unwrap();
        assert_eq!(updated.net_profit, dec!(100));
        assert_eq!(updated.net_margin_pct, dec!(11.11));

        assert!(matches!(
            repo.update_period(999, &input(2024, 3, CompanyUnit::Consolidated, dec!(1))).await,
            Err(DbError::NotFound)
        ));
        repo.delete_period(stored.id).await.unwrap();
        assert!(matches!(repo.delete_period(stored.id).await, Err(DbError::NotFound)));
        assert!(matches!(repo.get_period(stored.id).await, Err(DbError::NotFound)));
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_writing() {
        let repo = repo().await;
        let mut bad = input(2024, 1, CompanyUnit::Consolidated, dec!(1000));
        bad.cogs = dec!(-5);
        assert!(matches!(repo.insert_period(&bad).await, Err(DbError::Invalid(_))));
        assert_eq!(repo.count_periods().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn list_keeps_newest_rows_in_chronological_order() {
        let repo = repo().await;
        for month in 1..=6 {
            repo.insert_period(&input(2024, month, CompanyUnit::Consolidated, dec!(1000))).await.unwrap();
        }
        repo.insert_period(&input(2024, 6, CompanyUnit::Europe, dec!(1000))).await.unwrap();

        let filter = PeriodFilter::unit(CompanyUnit::Consolidated).limit(3);
        let periods = repo.list_periods(&filter).await.unwrap();
        let dates: Vec<NaiveDate> = periods.iter().map(|p| p.period_date).collect();
        assert_eq!(dates, vec![date(2024, 4), date(2024, 5), date(2024, 6)]);

        let ranged = PeriodFilter::unit(CompanyUnit::Consolidated)
            .since(date(2024, 2))
            .before(date(2024, 5));
        assert_eq!(repo.list_periods(&ranged).await.unwrap().len(), 3);

        let inclusive = PeriodFilter::unit(CompanyUnit::Consolidated).until(date(2024, 2));
        assert_eq!(repo.list_periods(&inclusive).await.unwrap().len(), 2);

        assert_eq!(repo.list_periods(&PeriodFilter::default()).await.unwrap().len(), 7);
    }

    #[tokio::test]
    async fn cash_flow_balance_carries_forward() {
        let repo = repo().await;
        let flow = |month, balance| CashFlowInput {
            period_date: date(2024, month),
            company_unit: CompanyUnit::NorthAmerica,
            operating_cash_flow: dec!(500),
            investing_cash_flow: dec!(-200),
            financing_cash_flow: dec!(-100),
            cash_balance: balance,
        };

        let first = repo.upsert_cash_flow(&flow(1, None)).await.unwrap();
        assert_eq!(first.net_cash_flow, dec!(200));
        assert_eq!(first.cash_balance, OPENING_CASH_BALANCE + dec!(200));

        let second = repo.upsert_cash_flow(&flow(2, None)).await.unwrap();
        assert_eq!(second.cash_balance, OPENING_CASH_BALANCE + dec!(400));

        let explicit = repo.upsert_cash_flow(&flow(3, Some(dec!(42)))).await.unwrap();
        assert_eq!(explicit.cash_balance, dec!(42));

        let latest = repo.latest_cash_balance(CompanyUnit::NorthAmerica, date(2024, 2)).await.unwrap();
        assert_eq!(latest, Some(OPENING_CASH_BALANCE + dec!(400)));
        assert_eq!(repo.latest_cash_balance(CompanyUnit::Europe, date(2024, 2)).await.unwrap(), None);
        assert_eq!(repo.list_cash_flows(&PeriodFilter::unit(CompanyUnit::NorthAmerica)).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn budgets_upsert_per_month() {
        let repo = repo().await;
        let budget = BudgetInput {
            period_date: date(2024, 1),
            company_unit: CompanyUnit::Consolidated,
            budget_revenue: dec!(1100),
            budget_net_profit: dec!(-10),
            budget_expenses: dec!(1110),
        };
        repo.upsert_budget(&budget).await.unwrap();
        let replaced = repo
            .upsert_budget(&BudgetInput { budget_revenue: dec!(1200), ..budget.clone() })
            .await
            .unwrap();
        assert_eq!(replaced.budget_revenue, dec!(1200));
        assert_eq!(replaced.budget_net_profit, dec!(-10));

        let budgets = repo.list_budgets(&PeriodFilter::unit(CompanyUnit::Consolidated)).await.unwrap();
        assert_eq!(budgets.len(), 1);
    }
}
