//! # Finsight API Client
//!
//! A typed HTTP client for the Finsight API, used by the dashboard.
//!
//! ## Public API
//!
//! - `FinanceApi`: the async interface the dashboard depends on, so the real
//!   client can be swapped for a stub in tests.
//! - `HttpFinanceClient`: the `reqwest` implementation of `FinanceApi`.
//! - `ApiError`: the errors that can be returned from this crate.

use crate::error::ApiError;
use analytics::KpiReport;
use async_trait::async_trait;
use core_types::{BudgetLine, CashFlowEntry, FinancialPeriod};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

pub mod error;
pub mod responses;

// --- Public API ---
pub use responses::{ApiErrorResponse, HealthResponse, KpiQuery, ListQuery};

/// How long a single API call may take before it is abandoned.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const NO_QUERY: &[(&str, &str)] = &[];

/// The read side of the Finsight API.
#[async_trait]
pub trait FinanceApi: Send + Sync {
    async fn health(&self) -> Result<HealthResponse, ApiError>;

    /// Financial periods, oldest first.
    async fn periods(&self, query: &ListQuery) -> Result<Vec<FinancialPeriod>, ApiError>;

    async fn budgets(&self, query: &ListQuery) -> Result<Vec<BudgetLine>, ApiError>;

    async fn cash_flows(&self, query: &ListQuery) -> Result<Vec<CashFlowEntry>, ApiError>;

    async fn kpis(&self, query: &KpiQuery) -> Result<KpiReport, ApiError>;
}

/// A concrete implementation of `FinanceApi` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFinanceClient {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpFinanceClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let mut base_url = Url::parse(base_url)?;
        // `Url::join` replaces the last segment unless the path ends with a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client: reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn get<T, Q>(&self, path: &str, query: &Q) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let url = self.base_url.join(path)?;
        tracing::debug!(%url, "Calling API.");

        let response = self.client.get(url).query(query).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            serde_json::from_str::<T>(&text).map_err(|e| ApiError::Deserialization(e.to_string()))
        } else {
            let message = serde_json::from_str::<ApiErrorResponse>(&text)
                .map(|body| body.error)
                .unwrap_or(text);
            Err(ApiError::Status(status.as_u16(), message))
        }
    }
}

#[async_trait]
impl FinanceApi for HttpFinanceClient {
    async fn health(&self) -> Result<HealthResponse, ApiError> {
        self.get("", NO_QUERY).await
    }

    async fn periods(&self, query: &ListQuery) -> Result<Vec<FinancialPeriod>, ApiError> {
        self.get("financial/periods", query).await
    }

    async fn budgets(&self, query: &ListQuery) -> Result<Vec<BudgetLine>, ApiError> {
        self.get("financial/budgets", query).await
    }

    async fn cash_flows(&self, query: &ListQuery) -> Result<Vec<CashFlowEntry>, ApiError> {
        self.get("financial/cash-flows", query).await
    }

    async fn kpis(&self, query: &KpiQuery) -> Result<KpiReport, ApiError> {
        self.get("financial/kpis", query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::CompanyUnit;
    use httpmock::prelude::*;
    use serde_json::json;

    fn period_json(date: &str) -> serde_json::Value {
        json!({
            "id": 1,
            "period_date": date,
            "company_unit": "europe",
            "revenue": "1000",
            "cogs": "300",
            "gross_profit": "700",
            "salaries": "200",
            "marketing": "100",
            "rd_expense": "100",
            "operations": "50",
            "other_expenses": "50",
            "total_expenses": "800",
            "net_profit": "200",
            "gross_margin_pct": "70",
            "net_margin_pct": "20",
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    #[tokio::test]
    async fn periods_are_requested_with_query_parameters() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/financial/periods")
                .query_param("company_unit", "europe")
                .query_param("limit", "24");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!([period_json("2024-01-01"), period_json("2024-02-01")]));
        });

        let client = HttpFinanceClient::new(&server.base_url()).unwrap();
        let periods = client
            .periods(&ListQuery::latest(CompanyUnit::Europe, 24))
            .await
            .unwrap();

        api_mock.assert();
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[1].company_unit, CompanyUnit::Europe);
        assert_eq!(periods[0].net_profit, rust_decimal::Decimal::from(200));
    }

    #[tokio::test]
    async fn error_bodies_become_status_errors() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/financial/kpis");
            then.status(404)
                .header("Content-Type", "application/json")
                .json_body(json!({"error": "no financial data found for the specified period"}));
        });

        let client = HttpFinanceClient::new(&server.base_url()).unwrap();
        let err = client.kpis(&KpiQuery::default()).await.unwrap_err();
        match err {
            ApiError::Status(code, message) => {
                assert_eq!(code, 404);
                assert!(message.contains("no financial data"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn base_url_path_is_kept() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET).path("/api/");
            then.status(200).json_body(json!({
                "status": "healthy",
                "service": "finsight-api",
                "version": "0.1.0",
                "timestamp": "2024-01-01T00:00:00Z"
            }));
        });

        let client = HttpFinanceClient::new(&server.url("/api")).unwrap();
        let health = client.health().await.unwrap();
        api_mock.assert();
        assert_eq!(health.status, "healthy");
    }

    #[tokio::test]
    async fn unreachable_api_is_detected() {
        let client = HttpFinanceClient::new("http://127.0.0.1:9").unwrap();
        let err = client.health().await.unwrap_err();
        assert!(err.is_unreachable());
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(HttpFinanceClient::new("not a url"), Err(ApiError::InvalidUrl(_))));
    }
}
