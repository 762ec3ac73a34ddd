use crate::enums::CompanyUnit;
use crate::error::CoreError;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Number of decimal places every stored or reported figure is rounded to.
pub const REPORTING_DP: u32 = 2;

/// `part / whole * 100`, zero when `whole` is zero, `None` when the result
/// does not fit a `Decimal`.
pub fn checked_percentage(part: Decimal, whole: Decimal) -> Option<Decimal> {
    if whole.is_zero() {
        return Some(Decimal::ZERO);
    }
    part.checked_div(whole)
        .and_then(|ratio| ratio.checked_mul(dec!(100)))
        .map(|pct| pct.round_dp(REPORTING_DP))
}

/// Like [`checked_percentage`], saturating at `Decimal::MAX` or `Decimal::MIN`
/// instead of failing.
pub fn percentage(part: Decimal, whole: Decimal) -> Decimal {
    checked_percentage(part, whole).unwrap_or_else(|| {
        if part.is_sign_negative() == whole.is_sign_negative() {
            Decimal::MAX
        } else {
            Decimal::MIN
        }
    })
}

fn checked_sum(field: &str, values: &[Decimal]) -> Result<Decimal, CoreError> {
    values
        .iter()
        .try_fold(Decimal::ZERO, |acc, value| acc.checked_add(*value))
        .ok_or_else(|| overflow(field))
}

fn overflow(field: &str) -> CoreError {
    CoreError::Calculation(format!("{field} is out of range"))
}

/// Reporting periods are monthly and keyed by the first day of their month.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Returns the first day of the month `months` after the month of `date`.
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    let start = month_start(date);
    start
        .checked_add_months(chrono::Months::new(months))
        .unwrap_or(start)
}

fn require_non_negative(field: &str, value: Decimal) -> Result<(), CoreError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(CoreError::InvalidInput(
            field.to_string(),
            format!("must not be negative (got {value})"),
        ));
    }
    Ok(())
}

/// The raw P&L lines for one month of one company unit.
///
/// Everything else on a [`FinancialPeriod`] is derived from these lines by
/// [`PeriodInput::derive`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodInput {
    pub period_date: NaiveDate,
    #[serde(default)]
    pub company_unit: CompanyUnit,
    pub revenue: Decimal,
    pub cogs: Decimal,
    pub salaries: Decimal,
    pub marketing: Decimal,
    pub rd_expense: Decimal,
    pub operations: Decimal,
    pub other_expenses: Decimal,
}

/// The figures computed from a [`PeriodInput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedFigures {
    pub gross_profit: Decimal,
    pub total_expenses: Decimal,
    pub net_profit: Decimal,
    pub gross_margin_pct: Decimal,
    pub net_margin_pct: Decimal,
}

impl PeriodInput {
    pub fn validate(&self) -> Result<(), CoreError> {
        require_non_negative("revenue", self.revenue)?;
        require_non_negative("cogs", self.cogs)?;
        require_non_negative("salaries", self.salaries)?;
        require_non_negative("marketing", self.marketing)?;
        require_non_negative("rd_expense", self.rd_expense)?;
        require_non_negative("operations", self.operations)?;
        require_non_negative("other_expenses", self.other_expenses)?;
        Ok(())
    }

    /// Validates the input and computes profits, totals and margins.
    pub fn derive(&self) -> Result<DerivedFigures, CoreError> {
        self.validate()?;
        let total_expenses = checked_sum(
            "total_expenses",
            &[
                self.cogs,
                self.salaries,
                self.marketing,
                self.rd_expense,
                self.operations,
                self.other_expenses,
            ],
        )?;
        let gross_profit = self.revenue.checked_sub(self.cogs).ok_or_else(|| overflow("gross_profit"))?;
        let net_profit = self
            .revenue
            .checked_sub(total_expenses)
            .ok_or_else(|| overflow("net_profit"))?;
        Ok(DerivedFigures {
            gross_profit,
            total_expenses,
            net_profit,
            gross_margin_pct: checked_percentage(gross_profit, self.revenue)
                .ok_or_else(|| overflow("gross_margin_pct"))?,
            net_margin_pct: checked_percentage(net_profit, self.revenue)
                .ok_or_else(|| overflow("net_margin_pct"))?,
        })
    }

    /// The same input keyed by the first day of its month.
    pub fn normalized(mut self) -> Self {
        self.period_date = month_start(self.period_date);
        self
    }
}

/// One stored month of P&L data for one company unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialPeriod {
    pub id: i64,
    pub period_date: NaiveDate,
    pub company_unit: CompanyUnit,
    pub revenue: Decimal,
    pub cogs: Decimal,
    pub gross_profit: Decimal,
    pub salaries: Decimal,
    pub marketing: Decimal,
    pub rd_expense: Decimal,
    pub operations: Decimal,
    pub other_expenses: Decimal,
    pub total_expenses: Decimal,
    pub net_profit: Decimal,
    pub gross_margin_pct: Decimal,
    pub net_margin_pct: Decimal,
    pub created_at: DateTime<Utc>,
}

impl FinancialPeriod {
    /// Builds a period from its raw lines, deriving the computed figures.
    pub fn from_input(
        id: i64,
        input: &PeriodInput,
        created_at: DateTime<Utc>,
    ) -> Result<Self, CoreError> {
        let derived = input.derive()?;
        Ok(Self {
            id,
            period_date: month_start(input.period_date),
            company_unit: input.company_unit,
            revenue: input.revenue,
            cogs: input.cogs,
            gross_profit: derived.gross_profit,
            salaries: input.salaries,
            marketing: input.marketing,
            rd_expense: input.rd_expense,
            operations: input.operations,
            other_expenses: input.other_expenses,
            total_expenses: derived.total_expenses,
            net_profit: derived.net_profit,
            gross_margin_pct: derived.gross_margin_pct,
            net_margin_pct: derived.net_margin_pct,
            created_at,
        })
    }

    /// The raw lines this period was built from.
    pub fn to_input(&self) -> PeriodInput {
        PeriodInput {
            period_date: self.period_date,
            company_unit: self.company_unit,
            revenue: self.revenue,
            cogs: self.cogs,
            salaries: self.salaries,
            marketing: self.marketing,
            rd_expense: self.rd_expense,
            operations: self.operations,
            other_expenses: self.other_expenses,
        }
    }

    pub fn year(&self) -> i32 {
        self.period_date.year()
    }

    pub fn month_name(&self) -> &'static str {
        month_name(self.period_date.month())
    }

    /// Calendar quarter label, `Q1` to `Q4`.
    pub fn quarter(&self) -> String {
        format!("Q{}", (self.period_date.month() - 1) / 3 + 1)
    }
}

pub fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        12 => "December",
        _ => "",
    }
}

/// Planned figures for one month of one company unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetInput {
    pub period_date: NaiveDate,
    #[serde(default)]
    pub company_unit: CompanyUnit,
    pub budget_revenue: Decimal,
    pub budget_net_profit: Decimal,
    pub budget_expenses: Decimal,
}

impl BudgetInput {
    /// Budgeted profit may be negative; revenue and expenses may not.
    pub fn validate(&self) -> Result<(), CoreError> {
        require_non_negative("budget_revenue", self.budget_revenue)?;
        require_non_negative("budget_expenses", self.budget_expenses)?;
        Ok(())
    }

    pub fn normalized(mut self) -> Self {
        self.period_date = month_start(self.period_date);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetLine {
    pub id: i64,
    pub period_date: NaiveDate,
    pub company_unit: CompanyUnit,
    pub budget_revenue: Decimal,
    pub budget_net_profit: Decimal,
    pub budget_expenses: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Cash movements for one month of one company unit.
///
/// When `cash_balance` is absent the store carries the previous balance forward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowInput {
    pub period_date: NaiveDate,
    #[serde(default)]
    pub company_unit: CompanyUnit,
    pub operating_cash_flow: Decimal,
    pub investing_cash_flow: Decimal,
    pub financing_cash_flow: Decimal,
    #[serde(default)]
    pub cash_balance: Option<Decimal>,
}

impl CashFlowInput {
    pub fn net_cash_flow(&self) -> Result<Decimal, CoreError> {
        checked_sum(
            "net_cash_flow",
            &[self.operating_cash_flow, self.investing_cash_flow, self.financing_cash_flow],
        )
    }

    pub fn normalized(mut self) -> Self {
        self.period_date = month_start(self.period_date);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowEntry {
    pub id: i64,
    pub period_date: NaiveDate,
    pub company_unit: CompanyUnit,
    pub operating_cash_flow: Decimal,
    pub investing_cash_flow: Decimal,
    pub financing_cash_flow: Decimal,
    pub net_cash_flow: Decimal,
    pub cash_balance: Decimal,
    pub created_at: DateTime<Utc>,
}
