//! CSV import and export of the three stored datasets.
//!
//! Import is row tolerant: a row that cannot be parsed or fails validation is
//! reported with its line number and the rest of the file still loads. Rows are
//! upserted in file order, so cash flows without a balance should come oldest first.

use crate::DbError;
use crate::repository::{FinanceRepository, PeriodFilter};
use chrono::NaiveDate;
use core_types::{BudgetInput, CashFlowInput, CompanyUnit, DatasetKind, PeriodInput};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::str::FromStr;

const PERIOD_HEADER: [&str; 16] = [
    "id", "period_date", "company_unit", "revenue", "cogs", "gross_profit", "salaries",
    "marketing", "rd_expense", "operations", "other_expenses", "total_expenses", "net_profit",
    "gross_margin_pct", "net_margin_pct", "created_at",
];
const BUDGET_HEADER: [&str; 7] = [
    "id", "period_date", "company_unit", "budget_revenue", "budget_net_profit",
    "budget_expenses", "created_at",
];
const CASH_FLOW_HEADER: [&str; 9] = [
    "id", "period_date", "company_unit", "operating_cash_flow", "investing_cash_flow",
    "financing_cash_flow", "net_cash_flow", "cash_balance", "created_at",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    /// 1-based line in the file, the header being line 1.
    pub line: usize,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub rejected: Vec<RejectedRow>,
}

#[derive(Debug, Deserialize)]
struct PeriodRecord {
    period_date: String,
    #[serde(default)]
    company_unit: Option<String>,
    revenue: String,
    cogs: String,
    salaries: String,
    marketing: String,
    rd_expense: String,
    operations: String,
    other_expenses: String,
}

#[derive(Debug, Deserialize)]
struct BudgetRecord {
    period_date: String,
    #[serde(default)]
    company_unit: Option<String>,
    budget_revenue: String,
    budget_net_profit: String,
    budget_expenses: String,
}

#[derive(Debug, Deserialize)]
struct CashFlowRecord {
    period_date: String,
    #[serde(default)]
    company_unit: Option<String>,
    operating_cash_flow: String,
    investing_cash_flow: String,
    financing_cash_flow: String,
    #[serde(default)]
    cash_balance: Option<String>,
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| format!("period_date '{raw}': {e}"))
}

fn parse_amount(column: &str, raw: &str) -> Result<Decimal, String> {
    let cleaned = raw.trim().replace(',', "");
    Decimal::from_str(&cleaned).map_err(|e| format!("{column} '{raw}': {e}"))
}

fn parse_unit(raw: Option<&str>) -> Result<CompanyUnit, String> {
    match raw.map(str::trim) {
        None | Some("") => Ok(CompanyUnit::default()),
        Some(value) => CompanyUnit::from_str(value).map_err(|e| e.to_string()),
    }
}

impl PeriodRecord {
    fn into_input(self) -> Result<PeriodInput, String> {
        Ok(PeriodInput {
            period_date: parse_date(&self.period_date)?,
            company_unit: parse_unit(self.company_unit.as_deref())?,
            revenue: parse_amount("revenue", &self.revenue)?,
            cogs: parse_amount("cogs", &self.cogs)?,
            salaries: parse_amount("salaries", &self.salaries)?,
            marketing: parse_amount("marketing", &self.marketing)?,
            rd_expense: parse_amount("rd_expense", &self.rd_expense)?,
            operations: parse_amount("operations", &self.operations)?,
            other_expenses: parse_amount("other_expenses", &self.other_expenses)?,
        })
    }
}

impl BudgetRecord {
    fn into_input(self) -> Result<BudgetInput, String> {
        Ok(BudgetInput {
            period_date: parse_date(&self.period_date)?,
            company_unit: parse_unit(self.company_unit.as_deref())?,
            budget_revenue: parse_amount("budget_revenue", &self.budget_revenue)?,
            budget_net_profit: parse_amount("budget_net_profit", &self.budget_net_profit)?,
            budget_expenses: parse_amount("budget_expenses", &self.budget_expenses)?,
        })
    }
}

impl CashFlowRecord {
    fn into_input(self) -> Result<CashFlowInput, String> {
        let cash_balance = match self.cash_balance.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_amount("cash_balance", raw)?),
        };
        Ok(CashFlowInput {
            period_date: parse_date(&self.period_date)?,
            company_unit: parse_unit(self.company_unit.as_deref())?,
            operating_cash_flow: parse_amount("operating_cash_flow", &self.operating_cash_flow)?,
            investing_cash_flow: parse_amount("investing_cash_flow", &self.investing_cash_flow)?,
            financing_cash_flow: parse_amount("financing_cash_flow", &self.financing_cash_flow)?,
            cash_balance,
        })
    }
}

/// Parses one record and stores it. `Ok(Err(_))` is a rejected row.
async fn import_record(
    repo: &FinanceRepository,
    kind: DatasetKind,
    record: &csv::StringRecord,
    headers: &csv::StringRecord,
) -> Result<Result<(), String>, DbError> {
    let stored = match kind {
        DatasetKind::Periods => match record
            .deserialize::<PeriodRecord>(Some(headers))
            .map_err(|e| e.to_string())
            .and_then(PeriodRecord::into_input)
        {
            Ok(input) => repo.upsert_period(&input).await.map(|_| ()),
            Err(reason) => return Ok(Err(reason)),
        },
        DatasetKind::Budgets => match record
            .deserialize::<BudgetRecord>(Some(headers))
            .map_err(|e| e.to_string())
            .and_then(BudgetRecord::into_input)
        {
            Ok(input) => repo.upsert_budget(&input).await.map(|_| ()),
            Err(reason) => return Ok(Err(reason)),
        },
        DatasetKind::CashFlows => match record
            .deserialize::<CashFlowRecord>(Some(headers))
            .map_err(|e| e.to_string())
            .and_then(CashFlowRecord::into_input)
        {
            Ok(input) => repo.upsert_cash_flow(&input).await.map(|_| ()),
            Err(reason) => return Ok(Err(reason)),
        },
    };

    match stored {
        Ok(()) => Ok(Ok(())),
        Err(DbError::Invalid(reason)) => Ok(Err(reason)),
        Err(other) => Err(other),
    }
}

pub async fn import_csv<R: Read>(
    repo: &FinanceRepository,
    kind: DatasetKind,
    reader: R,
) -> Result<ImportSummary, DbError> {
    import_csv_with_progress(repo, kind, reader, |_, _| {}).await
}

/// Imports CSV rows of `kind`, calling `on_row(done, total)` after each row.
pub async fn import_csv_with_progress<R, F>(
    repo: &FinanceRepository,
    kind: DatasetKind,
    reader: R,
    mut on_row: F,
) -> Result<ImportSummary, DbError>
where
    R: Read,
    F: FnMut(usize, usize),
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let records: Vec<Result<csv::StringRecord, csv::Error>> = csv_reader.records().collect();
    let total = records.len();

    let mut summary = ImportSummary::default();
    for (index, record) in records.into_iter().enumerate() {
        // Quoted fields may span lines, so the reader's position is authoritative.
        let position = match &record {
            Ok(record) => record.position().map(|p| p.line()),
            Err(e) => e.position().map(|p| p.line()),
        };
        let line = position
            .and_then(|line| usize::try_from(line).ok())
            .unwrap_or(index + 2);
        let outcome = match record {
            Ok(record) => import_record(repo, kind, &record, &headers).await?,
            Err(e) => Err(e.to_string()),
        };
        match outcome {
            Ok(()) => summary.imported += 1,
            Err(error) => {
                tracing::warn!(line, %error, kind = kind.as_str(), "Rejected CSV row.");
                summary.rejected.push(RejectedRow { line, error });
            }
        }
        on_row(index + 1, total);
    }

    tracing::info!(
        kind = kind.as_str(),
        imported = summary.imported,
        rejected = summary.rejected.len(),
        "CSV import finished."
    );
    Ok(summary)
}

fn write_rows<W: Write, T: Serialize>(
    writer: W,
    header: &[&str],
    rows: &[T],
) -> Result<usize, DbError> {
    let mut csv_writer = csv::WriterBuilder::new().has_headers(!rows.is_empty()).from_writer(writer);
    if rows.is_empty() {
        csv_writer.write_record(header)?;
    }
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(rows.len())
}

/// Writes the stored rows of `kind` as CSV with a header, oldest first.
///
/// Without a unit every unit is exported. Returns the number of data rows.
pub async fn export_csv<W: Write>(
    repo: &FinanceRepository,
    kind: DatasetKind,
    company_unit: Option<CompanyUnit>,
    writer: W,
) -> Result<usize, DbError> {
    let filter = PeriodFilter {
        company_unit,
        ..PeriodFilter::default()
    };
    let written = match kind {
        DatasetKind::Periods => write_rows(writer, &PERIOD_HEADER, &repo.list_periods(&filter).await?)?,
        DatasetKind::Budgets => write_rows(writer, &BUDGET_HEADER, &repo.list_budgets(&filter).await?)?,
        DatasetKind::CashFlows => {
            write_rows(writer, &CASH_FLOW_HEADER, &repo.list_cash_flows(&filter).await?)?
        }
    };
    tracing::debug!(kind = kind.as_str(), rows = written, "CSV export finished.");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::connect_in_memory;
    use rust_decimal_macros::dec;

    async fn repo() -> FinanceRepository {
        FinanceRepository::new(connect_in_memory().await.unwrap())
    }

    const PERIODS: &str = "\
period_date,company_unit,revenue,cogs,salaries,marketing,rd_expense,operations,other_expenses
2024-01-01,europe,1000,300,200,100,100,50,50
2024-02-15,Europe,\"1,200.50\",300,200,100,100,50,50
2024-03-01,europe,abc,300,200,100,100,50,50
2024-04-01,mars,1000,300,200,100,100,50,50
2024-05-01,europe,1000,-1,200,100,100,50,50
2024-06-01,,900,300,200,100,100,50,50
";

    #[tokio::test]
    async fn import_keeps_good_rows_and_reports_bad_lines() {
        let repo = repo().await;
        let mut progress = Vec::new();
        let summary = import_csv_with_progress(&repo, DatasetKind::Periods, PERIODS.as_bytes(), |done, total| {
            progress.push((done, total))
        })
        .await
        .unwrap();

        assert_eq!(summary.imported, 3);
        let lines: Vec<usize> = summary.rejected.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![4, 5, 6]);
        assert_eq!(progress.last(), Some(&(6, 6)));

        let europe = repo.list_periods(&PeriodFilter::unit(CompanyUnit::Europe)).await.unwrap();
        assert_eq!(europe.len(), 2);
        assert_eq!(europe[1].period_date, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(europe[1].revenue, dec!(1200.50));

        let consolidated = repo.list_periods(&PeriodFilter::unit(CompanyUnit::Consolidated)).await.unwrap();
        assert_eq!(consolidated.len(), 1);
    }

    #[tokio::test]
    async fn rejected_lines_account_for_multiline_fields() {
        let repo = repo().await;
        let csv = "\
period_date,company_unit,revenue,cogs,salaries,marketing,rd_expense,operations,other_expenses
2024-01-01,\"north
america\",1000,300,200,100,100,50,50
2024-02-01,europe,1000,-1,200,100,100,50,50
2024-03-01,europe,1000,300,200,100,100,50,50
";
        let summary = import_csv(&repo, DatasetKind::Periods, csv.as_bytes()).await.unwrap();
        assert_eq!(summary.imported, 1);
        let lines: Vec<usize> = summary.rejected.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![2, 4]);
    }

    #[tokio::test]
    async fn reimport_replaces_instead_of_duplicating() {
        let repo = repo().await;
        import_csv(&repo, DatasetKind::Periods, PERIODS.as_bytes()).await.unwrap();
        import_csv(&repo, DatasetKind::Periods, PERIODS.as_bytes()).await.unwrap();
        assert_eq!(repo.count_periods().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn cash_flow_import_carries_balances() {
        let repo = repo().await;
        let csv = "\
period_date,operating_cash_flow,investing_cash_flow,financing_cash_flow,cash_balance
2024-01-01,100,-50,0,1000
2024-02-01,100,-50,0,
";
        let summary = import_csv(&repo, DatasetKind::CashFlows, csv.as_bytes()).await.unwrap();
        assert_eq!(summary.imported, 2);
        let flows = repo.list_cash_flows(&PeriodFilter::default()).await.unwrap();
        assert_eq!(flows[1].cash_balance, dec!(1050));
    }

    #[tokio::test]
    async fn export_writes_header_and_rows_oldest_first() {
        let repo = repo().await;
        import_csv(&repo, DatasetKind::Periods, PERIODS.as_bytes()).await.unwrap();

        let mut out = Vec::new();
        let rows = export_csv(&repo, DatasetKind::Periods, Some(CompanyUnit::Europe), &mut out)
            .await
            .unwrap();
        assert_eq!(rows, 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id,period_date,company_unit,revenue"));
        assert!(lines[1].contains("2024-01-01,europe,1000"));
        assert!(lines[2].contains("2024-02-01"));

        // An export can be imported again as-is.
        let again = self::repo().await;
        let summary = import_csv(&again, DatasetKind::Periods, text.as_bytes()).await.unwrap();
        assert_eq!(summary.imported, 2);
        assert!(summary.rejected.is_empty());
    }

    #[tokio::test]
    async fn empty_export_still_has_a_header() {
        let repo = repo().await;
        let mut out = Vec::new();
        let rows = export_csv(&repo, DatasetKind::Budgets, None, &mut out).await.unwrap();
        assert_eq!(rows, 0);
        assert_eq!(String::from_utf8(out).unwrap().trim_end(), BUDGET_HEADER.join(","));
    }
}
