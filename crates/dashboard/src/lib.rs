//! # Finsight Dashboard
//!
//! A server-rendered reporting page over the Finsight API: KPI cards, a revenue
//! trend, the P&L waterfall, budget variance and cash flow, per business unit.
//!
//! ## Architectural Principles
//!
//! - **API Only:** The dashboard never touches the store. It reads through the
//!   `FinanceApi` trait and derives its figures with the shared `AnalyticsEngine`.
//! - **Cached Fetches:** Data is fetched once per unit and reused until the TTL
//!   runs out or the user presses refresh.
//! - **No Frontend Build:** HTML is rendered on the server. Charts are Plotly
//!   figure JSON drawn by the Plotly script in the browser.

use analytics::AnalyticsEngine;
use api_client::{FinanceApi, HttpFinanceClient};
use axum::{
    Router,
    routing::{get, post},
};
use configuration::Settings;
use core_types::{CompanyUnit, Currency};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

pub mod cache;
pub mod charts;
pub mod data;
pub mod error;
pub mod handlers;
pub mod render;
pub mod view;

// --- Public API ---
pub use cache::DataCache;
pub use error::DashboardError;
pub use view::{DashboardView, Selection};

/// State shared by the dashboard handlers.
pub struct DashboardState {
    pub api: Arc<dyn FinanceApi>,
    pub cache: DataCache,
    pub engine: AnalyticsEngine,
    pub default_unit: CompanyUnit,
    pub default_currency: Currency,
}

impl DashboardState {
    pub fn new(api: Arc<dyn FinanceApi>, settings: &configuration::DashboardSettings) -> Self {
        Self {
            api,
            cache: DataCache::new(Duration::from_secs(settings.cache_ttl_secs)),
            engine: AnalyticsEngine::new(),
            default_unit: settings.default_company_unit,
            default_currency: settings.default_currency,
        }
    }
}

pub fn router(state: Arc<DashboardState>) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/refresh", post(handlers::refresh))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serves the dashboard against the API at `dashboard.api_base_url`.
pub async fn run_dashboard(settings: &Settings) -> anyhow::Result<()> {
    let addr = settings.dashboard.socket_addr()?;
    let api = HttpFinanceClient::new(&settings.dashboard.api_base_url)?;
    tracing::info!(api = %api.base_url(), "Dashboard reads from the API.");

    let state = DashboardState::new(Arc::new(api), &settings.dashboard);
    let app = router(Arc::new(state));

    tracing::info!("Dashboard listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DashboardData;
    use crate::view::tests::sample_data;
    use analytics::KpiReport;
    use api_client::error::ApiError;
    use api_client::{HealthResponse, KpiQuery, ListQuery};
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use chrono::Utc;
    use core_types::{BudgetLine, CashFlowEntry, FinancialPeriod};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    struct StubApi {
        data: Option<DashboardData>,
        period_calls: AtomicUsize,
    }

    impl StubApi {
        fn serving(months: u32) -> Self {
            Self {
                data: Some(sample_data(CompanyUnit::Consolidated, months)),
                period_calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                data: None,
                period_calls: AtomicUsize::new(0),
            }
        }

        fn rows<T: Clone>(&self, pick: impl Fn(&DashboardData) -> &Vec<T>) -> Result<Vec<T>, ApiError> {
            self.data
                .as_ref()
                .map(|d| pick(d).clone())
                .ok_or_else(|| ApiError::Status(503, "database unavailable".to_string()))
        }
    }

    #[async_trait]
    impl FinanceApi for StubApi {
        async fn health(&self) -> Result<HealthResponse, ApiError> {
            Ok(HealthResponse {
                status: "healthy".to_string(),
                service: "stub".to_string(),
                version: "0".to_string(),
                timestamp: Utc::now(),
            })
        }

        async fn periods(&self, _query: &ListQuery) -> Result<Vec<FinancialPeriod>, ApiError> {
            self.period_calls.fetch_add(1, Ordering::SeqCst);
            self.rows(|d| &d.periods)
        }

        async fn budgets(&self, _query: &ListQuery) -> Result<Vec<BudgetLine>, ApiError> {
            self.rows(|d| &d.budgets)
        }

        async fn cash_flows(&self, _query: &ListQuery) -> Result<Vec<CashFlowEntry>, ApiError> {
            self.rows(|d| &d.cash_flows)
        }

        async fn kpis(&self, _query: &KpiQuery) -> Result<KpiReport, ApiError> {
            Err(ApiError::Status(404, "not used".to_string()))
        }
    }

    fn app(api: Arc<StubApi>) -> Router {
        let state = DashboardState {
            api,
            cache: DataCache::new(Duration::from_secs(300)),
            engine: AnalyticsEngine::new(),
            default_unit: CompanyUnit::Consolidated,
            default_currency: Currency::Usd,
        };
        router(Arc::new(state))
    }

    async fn get_page(app: &Router, uri: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn page_renders_kpis_and_charts() {
        let app = app(Arc::new(StubApi::serving(24)));
        let (status, html) = get_page(&app, "/?window=last_12_months&currency=EUR").await;

        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("Total Revenue"));
        assert!(html.contains("Plotly.newPlot"));
        assert!(html.contains("<option value=\"EUR\" selected>"));
        assert!(html.contains('€'));
    }

    #[tokio::test]
    async fn data_is_cached_until_refresh() {
        let api = Arc::new(StubApi::serving(12));
        let app = app(Arc::clone(&api));

        get_page(&app, "/").await;
        get_page(&app, "/?window=year_to_date").await;
        assert_eq!(api.period_calls.load(Ordering::SeqCst), 1);

        let request = Request::builder()
            .method("POST")
            .uri("/refresh")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("window=last_24_months&company_unit=consolidated&currency=GBP"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/?window=last_24_months&company_unit=consolidated&currency=GBP"
        );

        get_page(&app, "/").await;
        assert_eq!(api.period_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn api_failure_renders_an_error_page() {
        let app = app(Arc::new(StubApi::failing()));
        let (status, html) = get_page(&app, "/").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(html.contains("Financial data unavailable"));
        assert!(html.contains("database unavailable"));
    }

    #[tokio::test]
    async fn unknown_selection_is_rejected() {
        let app = app(Arc::new(StubApi::serving(12)));
        let (status, _) = get_page(&app, "/?window=last_week").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let (status, _) = get_page(&app, "/?company_unit=mars").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn empty_store_shows_a_message() {
        let app = app(Arc::new(StubApi::serving(0)));
        let (status, html) = get_page(&app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("No financial data available"));
    }

    #[tokio::test]
    async fn health_answers() {
        let app = app(Arc::new(StubApi::serving(0)));
        let (status, body) = get_page(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("finsight-dashboard"));
    }
}
