//! # Finsight API Server
//!
//! The HTTP face of the financial store. It serves periods, budgets and cash
//! flows, and derives KPIs, variances, trends and forecasts per request.
//!
//! ## Architectural Principles
//!
//! - **Thin Layer:** Handlers validate parameters, read through the
//!   `FinanceRepository` and hand the rows to the stateless `AnalyticsEngine`.
//! - **Uniform Errors:** Every failure is an `AppError`, rendered as
//!   `{"error": "..."}` with a status that tells the client what went wrong.

use analytics::AnalyticsEngine;
use axum::{
    Router,
    routing::get,
};
use chrono::Utc;
use configuration::Settings;
use database::{FinanceRepository, SeedOutcome};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod error;
pub mod handlers;
pub mod params;

/// The shared application state that all handlers can access.
#[derive(Debug)]
pub struct AppState {
    pub repo: FinanceRepository,
    pub engine: AnalyticsEngine,
}

impl AppState {
    pub fn new(repo: FinanceRepository) -> Self {
        Self {
            repo,
            engine: AnalyticsEngine::new(),
        }
    }
}

/// Builds the API router with CORS and request tracing.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::health))
        .route("/financial/kpis", get(handlers::get_kpis))
        .route(
            "/financial/periods",
            get(handlers::list_periods).post(handlers::create_period),
        )
        .route(
            "/financial/periods/:id",
            get(handlers::get_period)
                .put(handlers::update_period)
                .delete(handlers::delete_period),
        )
        .route(
            "/financial/budgets",
            get(handlers::list_budgets).post(handlers::upsert_budget),
        )
        .route(
            "/financial/cash-flows",
            get(handlers::list_cash_flows).post(handlers::upsert_cash_flow),
        )
        .route("/analysis/budget-variance", get(handlers::budget_variance))
        .route("/analysis/cash-flow", get(handlers::cash_flow))
        .route("/analysis/trends", get(handlers::trends))
        .route("/analysis/pnl", get(handlers::pnl))
        .route("/analysis/forecast", get(handlers::forecast))
        .route("/data/import", axum::routing::post(handlers::import_data))
        .route("/data/export", get(handlers::export_data))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Connects to the store, applies migrations, seeds sample data if enabled and serves the API.
pub async fn run_server(settings: &Settings) -> anyhow::Result<()> {
    let addr = settings.api.socket_addr()?;

    let pool = database::connect(&settings.database.url, settings.database.max_connections).await?;
    database::run_migrations(&pool).await?;
    let repo = FinanceRepository::new(pool);

    if settings.seed.enabled {
        let today = Utc::now().date_naive();
        match database::generate_sample_data(&repo, settings.seed.months, settings.seed.rng_seed, today).await? {
            SeedOutcome::Generated { periods } => tracing::info!(periods, "Sample data ready."),
            SeedOutcome::Skipped { existing } => tracing::debug!(existing, "Store already populated."),
        }
    }

    let app = router(Arc::new(AppState::new(repo)));

    tracing::info!("API server listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
