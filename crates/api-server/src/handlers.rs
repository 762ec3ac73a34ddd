use crate::params::{
    self, DEFAULT_FORECAST_HORIZON, DEFAULT_LIST_LIMIT, DEFAULT_TREND_MONTHS, DatasetParams,
    FORECAST_HISTORY, FORECAST_HORIZON, ForecastParams, LIST_LIMIT, ListParams, ResolvedWindow,
    TREND_MONTHS, TrendParams, WindowParams,
};
use crate::{AppState, error::AppError};
use analytics::{
    CashFlowSummary, CashSnapshot, Forecast, KpiReport, PnlBreakdown, RevenueTrend, VarianceReport,
};
use axum::{
    Json,
    body::Bytes,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use core_types::{
    BudgetInput, BudgetLine, CashFlowEntry, CashFlowInput, FinancialPeriod, PeriodInput,
};
use database::{ImportSummary, PeriodFilter};
use serde::Serialize;
use std::sync::Arc;

type Params<T> = Result<Query<T>, QueryRejection>;
type Body<T> = Result<Json<T>, JsonRejection>;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// # GET /
pub async fn health() -> Json<Health> {
    Json(Health {
        status: "healthy",
        service: "finsight-api",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
    })
}

fn list_filter(params: &ListParams) -> Result<PeriodFilter, AppError> {
    let limit = params::bounded("limit", params.limit, DEFAULT_LIST_LIMIT, LIST_LIMIT)?;
    let mut filter = PeriodFilter::unit(params::unit(params.company_unit.as_deref())?).limit(limit);
    if let Some(start) = params::date("start_date", params.start_date.as_deref())? {
        filter = filter.since(start);
    }
    if let Some(end) = params::date("end_date", params.end_date.as_deref())? {
        filter = filter.until(end);
    }
    Ok(filter)
}

/// The periods of the current and the previous window.
async fn window_periods(
    state: &AppState,
    resolved: &ResolvedWindow,
) -> Result<(Vec<FinancialPeriod>, Vec<FinancialPeriod>), AppError> {
    let window = resolved.window;
    let current = state
        .repo
        .periods_between(resolved.unit, window.start, window.end)
        .await?;
    let previous = state
        .repo
        .periods_in_range(resolved.unit, window.previous_start, window.start)
        .await?;
    Ok((current, previous))
}

fn window_filter(resolved: &ResolvedWindow) -> PeriodFilter {
    PeriodFilter::unit(resolved.unit)
        .since(resolved.window.start)
        .until(resolved.window.end)
}

// --- Financial data ---

/// # GET /financial/kpis
pub async fn get_kpis(
    State(state): State<Arc<AppState>>,
    params: Params<WindowParams>,
) -> Result<Json<KpiReport>, AppError> {
    let Query(params) = params?;
    let resolved = params.resolve()?;
    let (current, previous) = window_periods(&state, &resolved).await?;

    let window = resolved.window;
    let before_start = window.start.pred_opt().unwrap_or(window.start);
    let cash = CashSnapshot {
        current: state.repo.latest_cash_balance(resolved.unit, window.end).await?,
        previous: state.repo.latest_cash_balance(resolved.unit, before_start).await?,
    };

    let report = state
        .engine
        .kpis(&current, &previous, cash, window.start, window.end)?;
    Ok(Json(report))
}

/// # GET /financial/periods
pub async fn list_periods(
    State(state): State<Arc<AppState>>,
    params: Params<ListParams>,
) -> Result<Json<Vec<FinancialPeriod>>, AppError> {
    let Query(params) = params?;
    let periods = state.repo.list_periods(&list_filter(&params)?).await?;
    Ok(Json(periods))
}

/// # POST /financial/periods
pub async fn create_period(
    State(state): State<Arc<AppState>>,
    body: Body<PeriodInput>,
) -> Result<impl IntoResponse, AppError> {
    let Json(input) = body?;
    let period = state.repo.insert_period(&input).await?;
    tracing::info!(id = period.id, date = %period.period_date, unit = %period.company_unit, "Financial period created.");
    Ok((StatusCode::CREATED, Json(period)))
}

/// # GET /financial/periods/:id
pub async fn get_period(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<FinancialPeriod>, AppError> {
    let Path(id) = id?;
    Ok(Json(state.repo.get_period(id).await?))
}

/// # PUT /financial/periods/:id
pub async fn update_period(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
    body: Body<PeriodInput>,
) -> Result<Json<FinancialPeriod>, AppError> {
    let Path(id) = id?;
    let Json(input) = body?;
    let period = state.repo.update_period(id, &input).await?;
    tracing::info!(id, "Financial period updated.");
    Ok(Json(period))
}

/// # DELETE /financial/periods/:id
pub async fn delete_period(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = id?;
    state.repo.delete_period(id).await?;
    tracing::info!(id, "Financial period deleted.");
    Ok(StatusCode::NO_CONTENT)
}

/// # GET /financial/budgets
pub async fn list_budgets(
    State(state): State<Arc<AppState>>,
    params: Params<ListParams>,
) -> Result<Json<Vec<BudgetLine>>, AppError> {
    let Query(params) = params?;
    Ok(Json(state.repo.list_budgets(&list_filter(&params)?).await?))
}

/// # POST /financial/budgets
/// Creates or replaces the budget of one month.
pub async fn upsert_budget(
    State(state): State<Arc<AppState>>,
    body: Body<BudgetInput>,
) -> Result<impl IntoResponse, AppError> {
    let Json(input) = body?;
    let budget = state.repo.upsert_budget(&input).await?;
    Ok((StatusCode::CREATED, Json(budget)))
}

/// # GET /financial/cash-flows
pub async fn list_cash_flows(
    State(state): State<Arc<AppState>>,
    params: Params<ListParams>,
) -> Result<Json<Vec<CashFlowEntry>>, AppError> {
    let Query(params) = params?;
    Ok(Json(state.repo.list_cash_flows(&list_filter(&params)?).await?))
}

/// # POST /financial/cash-flows
/// Creates or replaces the cash flows of one month. A missing balance is carried forward.
pub async fn upsert_cash_flow(
    State(state): State<Arc<AppState>>,
    body: Body<CashFlowInput>,
) -> Result<impl IntoResponse, AppError> {
    let Json(input) = body?;
    let entry = state.repo.upsert_cash_flow(&input).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

// --- Analysis ---

/// # GET /analysis/budget-variance
pub async fn budget_variance(
    State(state): State<Arc<AppState>>,
    params: Params<WindowParams>,
) -> Result<Json<VarianceReport>, AppError> {
    let Query(params) = params?;
    let resolved = params.resolve()?;
    let filter = window_filter(&resolved);
    let actuals = state.repo.list_periods(&filter).await?;
    let budgets = state.repo.list_budgets(&filter).await?;
    Ok(Json(state.engine.budget_variance(&actuals, &budgets)?))
}

/// # GET /analysis/cash-flow
pub async fn cash_flow(
    State(state): State<Arc<AppState>>,
    params: Params<WindowParams>,
) -> Result<Json<CashFlowSummary>, AppError> {
    let Query(params) = params?;
    let resolved = params.resolve()?;
    let filter = window_filter(&resolved);
    let entries = state.repo.list_cash_flows(&filter).await?;
    let periods = state.repo.list_periods(&filter).await?;
    Ok(Json(state.engine.cash_flow_summary(&entries, &periods)?))
}

/// # GET /analysis/pnl
pub async fn pnl(
    State(state): State<Arc<AppState>>,
    params: Params<WindowParams>,
) -> Result<Json<PnlBreakdown>, AppError> {
    let Query(params) = params?;
    let resolved = params.resolve()?;
    let periods = state.repo.list_periods(&window_filter(&resolved)).await?;
    Ok(Json(state.engine.pnl_breakdown(&periods)?))
}

/// # GET /analysis/trends
/// Fits a revenue trend over the most recent `months` periods.
pub async fn trends(
    State(state): State<Arc<AppState>>,
    params: Params<TrendParams>,
) -> Result<Json<RevenueTrend>, AppError> {
    let Query(params) = params?;
    let months = params::bounded("months", params.months, DEFAULT_TREND_MONTHS, TREND_MONTHS)?;
    let filter = PeriodFilter::unit(params::unit(params.company_unit.as_deref())?).limit(months);
    let periods = state.repo.list_periods(&filter).await?;
    Ok(Json(state.engine.revenue_trend(&periods)?))
}

/// # GET /analysis/forecast
pub async fn forecast(
    State(state): State<Arc<AppState>>,
    params: Params<ForecastParams>,
) -> Result<Json<Forecast>, AppError> {
    let Query(params) = params?;
    let horizon = params::bounded("horizon", params.horizon, DEFAULT_FORECAST_HORIZON, FORECAST_HORIZON)?;
    let filter = PeriodFilter::unit(params::unit(params.company_unit.as_deref())?).limit(FORECAST_HISTORY);
    let periods = state.repo.list_periods(&filter).await?;
    Ok(Json(state.engine.forecast(&periods, horizon)?))
}

// --- Data exchange ---

/// # POST /data/import?kind=
/// The request body is the CSV file itself.
pub async fn import_data(
    State(state): State<Arc<AppState>>,
    params: Params<DatasetParams>,
    body: Bytes,
) -> Result<Json<ImportSummary>, AppError> {
    let Query(params) = params?;
    let kind = params::dataset(params.kind.as_deref())?;
    let csv = std::str::from_utf8(&body)
        .map_err(|e| AppError::Validation(format!("CSV body is not valid UTF-8: {e}")))?;
    let summary = database::import_csv(&state.repo, kind, csv.as_bytes()).await?;
    Ok(Json(summary))
}

/// # GET /data/export?kind=&company_unit=
/// Without a unit every unit is exported.
pub async fn export_data(
    State(state): State<Arc<AppState>>,
    params: Params<DatasetParams>,
) -> Result<impl IntoResponse, AppError> {
    let Query(params) = params?;
    let kind = params::dataset(params.kind.as_deref())?;
    let unit = match params.company_unit.as_deref() {
        Some(raw) if !raw.trim().is_empty() => Some(params::unit(Some(raw))?),
        _ => None,
    };

    let mut csv = Vec::new();
    database::export_csv(&state.repo, kind, unit, &mut csv).await?;
    let disposition = format!("attachment; filename=\"{}.csv\"", kind.as_str());
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    ))
}
