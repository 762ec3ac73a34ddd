use crate::DashboardState;
use crate::data::{self, DashboardData};
use crate::error::DashboardError;
use crate::render;
use crate::view::{DashboardView, Selection};
use axum::{
    Form, Json,
    extract::{Query, State, rejection::QueryRejection},
    response::{Html, Redirect},
};
use core_types::{AnalysisWindow, CompanyUnit, Currency};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

/// The sidebar selection as sent by the browser. Missing or empty fields fall
/// back to the configured defaults.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub window: Option<String>,
    pub company_unit: Option<String>,
    pub currency: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl PageParams {
    pub fn resolve(&self, state: &DashboardState) -> Result<Selection, DashboardError> {
        let window = match present(&self.window) {
            None => AnalysisWindow::default(),
            Some(raw) => AnalysisWindow::ALL
                .into_iter()
                .find(|w| w.as_str() == raw)
                .ok_or_else(|| DashboardError::Validation(format!("unknown analysis window '{raw}'")))?,
        };
        let unit = match present(&self.company_unit) {
            None => state.default_unit,
            Some(raw) => raw
                .parse::<CompanyUnit>()
                .map_err(|e| DashboardError::Validation(e.to_string()))?,
        };
        let currency = match present(&self.currency) {
            None => state.default_currency,
            Some(raw) => raw
                .parse::<Currency>()
                .map_err(|e| DashboardError::Validation(e.to_string()))?,
        };
        Ok(Selection { window, unit, currency })
    }
}

async fn load(state: &DashboardState, unit: CompanyUnit) -> Result<Arc<DashboardData>, DashboardError> {
    if let Some(cached) = state.cache.get(unit).await {
        return Ok(cached);
    }
    let fresh = data::fetch(state.api.as_ref(), unit).await?;
    Ok(state.cache.insert(unit, fresh).await)
}

// GET /
pub async fn index(
    State(state): State<Arc<DashboardState>>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> Result<Html<String>, DashboardError> {
    let Query(params) = params.map_err(|e| DashboardError::Validation(e.body_text()))?;
    let selection = params.resolve(&state)?;

    let data = load(&state, selection.unit).await?;
    let view = DashboardView::build(&state.engine, &data, selection);
    if view.is_empty() {
        tracing::warn!(unit = %selection.unit, "No periods to show.");
    }
    Ok(Html(render::dashboard_page(&view, data.fetched_at)))
}

// POST /refresh
pub async fn refresh(
    State(state): State<Arc<DashboardState>>,
    Form(params): Form<PageParams>,
) -> Result<Redirect, DashboardError> {
    let selection = params.resolve(&state)?;
    let dropped = state.cache.clear().await;
    tracing::info!(dropped, "Dashboard cache cleared.");

    Ok(Redirect::to(&format!(
        "/?window={}&company_unit={}&currency={}",
        selection.window.as_str(),
        selection.unit.as_str(),
        selection.currency.code()
    )))
}

// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "finsight-dashboard",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
