pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{AnalysisWindow, CompanyUnit, Currency, DatasetKind, PeriodType};
pub use error::CoreError;
pub use structs::{
    BudgetInput, BudgetLine, CashFlowEntry, CashFlowInput, DerivedFigures, FinancialPeriod,
    PeriodInput, REPORTING_DP, add_months, checked_percentage, month_name, month_start, percentage,
};
