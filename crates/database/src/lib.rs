//! # Finsight Database Crate
//!
//! This crate is the application-specific interface to the SQLite store that
//! holds financial periods, budgets and cash flows. It is the system's
//! "permanent archive."
//!
//! ## Architectural Principles
//!
//! - **Adapter:** All SQL lives here. The rest of the workspace talks to
//!   [`FinanceRepository`] in terms of `core-types` structs.
//! - **Derived, not trusted:** Profits, totals, margins and cash balances are
//!   computed on write from the raw lines, so stored rows always agree.
//! - **Asynchronous & Pooled:** All operations are asynchronous over a
//!   `SqlitePool`. Migrations are embedded and applied at startup.
//!
//! ## Public API
//!
//! - `connect` / `connect_in_memory` / `run_migrations`: pool setup.
//! - `FinanceRepository`: data access for periods, budgets and cash flows.
//! - `generate_sample_data`: deterministic demo data for an empty store.
//! - `import_csv` / `export_csv`: CSV exchange per [`core_types::DatasetKind`].
//! - `DbError`: the errors returned from this crate.

pub mod connection;
pub mod error;
pub mod repository;
pub mod seed;
pub mod transfer;

pub use connection::{connect, connect_in_memory, run_migrations};
pub use error::DbError;
pub use repository::{FinanceRepository, OPENING_CASH_BALANCE, PeriodFilter};
pub use seed::{SeedOutcome, generate_sample_data};
pub use transfer::{ImportSummary, RejectedRow, export_csv, import_csv, import_csv_with_progress};
