use crate::error::CoreError;
use crate::structs::month_name;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The business units financial data is reported for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompanyUnit {
    #[default]
    Consolidated,
    NorthAmerica,
    Europe,
    AsiaPacific,
}

impl CompanyUnit {
    pub const ALL: [CompanyUnit; 4] = [
        CompanyUnit::Consolidated,
        CompanyUnit::NorthAmerica,
        CompanyUnit::Europe,
        CompanyUnit::AsiaPacific,
    ];

    /// The regional units whose figures add up to the consolidated view.
    pub const REGIONS: [CompanyUnit; 3] = [
        CompanyUnit::NorthAmerica,
        CompanyUnit::Europe,
        CompanyUnit::AsiaPacific,
    ];

    /// The identifier used in URLs, CSV files and the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompanyUnit::Consolidated => "consolidated",
            CompanyUnit::NorthAmerica => "north_america",
            CompanyUnit::Europe => "europe",
            CompanyUnit::AsiaPacific => "asia_pacific",
        }
    }

    /// The human-readable name shown in the dashboard.
    pub fn label(&self) -> &'static str {
        match self {
            CompanyUnit::Consolidated => "Consolidated",
            CompanyUnit::NorthAmerica => "North America",
            CompanyUnit::Europe => "Europe",
            CompanyUnit::AsiaPacific => "Asia Pacific",
        }
    }
}

impl fmt::Display for CompanyUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompanyUnit {
    type Err = CoreError;

    /// Accepts both the identifier (`north_america`) and the label (`North America`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        CompanyUnit::ALL
            .into_iter()
            .find(|unit| unit.as_str() == normalized)
            .ok_or_else(|| CoreError::InvalidInput("company_unit".to_string(), s.to_string()))
    }
}

/// The granularity of a reporting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    #[default]
    Monthly,
    Quarterly,
    Yearly,
}

impl PeriodType {
    /// Label of the period containing `date`: `Jan 2024`, `Q1 2024` or `2024`.
    pub fn label(&self, date: NaiveDate) -> String {
        match self {
            PeriodType::Monthly => {
                let name = month_name(date.month());
                format!("{} {}", name.get(..3).unwrap_or(name), date.year())
            }
            PeriodType::Quarterly => format!("Q{} {}", (date.month() - 1) / 3 + 1, date.year()),
            PeriodType::Yearly => date.year().to_string(),
        }
    }
}

/// Currencies the dashboard can label amounts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Usd,
    Eur,
    Gbp,
    Jpy,
}

impl Currency {
    pub const ALL: [Currency; 4] = [Currency::Usd, Currency::Eur, Currency::Gbp, Currency::Jpy];

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Jpy => "JPY",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Usd => "$",
            Currency::Eur => "€",
            Currency::Gbp => "£",
            Currency::Jpy => "¥",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Currency::ALL
            .into_iter()
            .find(|c| c.code() == upper)
            .ok_or_else(|| CoreError::InvalidInput("currency".to_string(), s.to_string()))
    }
}

/// The time window a dashboard view compares against its predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisWindow {
    #[default]
    Last12Months,
    YearToDate,
    Last24Months,
}

impl AnalysisWindow {
    pub const ALL: [AnalysisWindow; 3] = [
        AnalysisWindow::Last12Months,
        AnalysisWindow::YearToDate,
        AnalysisWindow::Last24Months,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisWindow::Last12Months => "last_12_months",
            AnalysisWindow::YearToDate => "year_to_date",
            AnalysisWindow::Last24Months => "last_24_months",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AnalysisWindow::Last12Months => "Last 12 Months",
            AnalysisWindow::YearToDate => "Year-to-Date",
            AnalysisWindow::Last24Months => "Last 24 Months",
        }
    }
}

/// The datasets that can be imported from or exported to CSV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    #[default]
    Periods,
    Budgets,
    CashFlows,
}

impl DatasetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Periods => "periods",
            DatasetKind::Budgets => "budgets",
            DatasetKind::CashFlows => "cash_flows",
        }
    }
}

impl FromStr for DatasetKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "periods" => Ok(DatasetKind::Periods),
            "budgets" => Ok(DatasetKind::Budgets),
            "cash_flows" => Ok(DatasetKind::CashFlows),
            _ => Err(CoreError::InvalidInput("dataset kind".to_string(), s.to_string())),
        }
    }
}
