//! # Finsight Analytics Engine
//!
//! This crate turns stored financial periods, budgets and cash flows into the
//! figures the API serves and the dashboard draws.
//!
//! ## Architectural Principles
//!
//! - **Layer 1 Logic:** This is a pure logic crate. It has no knowledge of the
//!   database or HTTP. It depends only on `core-types` (Layer 0).
//! - **Stateless Calculation:** The `AnalyticsEngine` is a stateless calculator.
//!   It takes slices of periods as input and returns report structs, which makes
//!   it easy to share between the API server and the dashboard.
//!
//! ## Public API
//!
//! - `AnalyticsEngine`: KPIs, P&L waterfall, budget variance, cash flow summary,
//!   revenue insights, revenue trend and forecast.
//! - `window`: selection of the current and comparison periods of a view.
//! - `report`: the report structs returned by the engine.
//! - `AnalyticsError`: the error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod engine;
pub mod error;
pub mod report;
pub mod trend;
pub mod window;

// Re-export the key components to create a clean, public-facing API.
pub use engine::{AnalyticsEngine, CashSnapshot};
pub use error::AnalyticsError;
pub use report::{
    CashFlowSummary, ExpenseShare, Forecast, ForecastPoint, KpiReport, PeriodVariance,
    PnlBreakdown, RevenueInsights, RevenueTrend, StepMeasure, TrendPoint, VarianceLine,
    VarianceReport, WaterfallStep,
};
pub use trend::MAX_FORECAST_HORIZON;
pub use window::DayWindow;
