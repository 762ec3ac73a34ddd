use chrono::{DateTime, NaiveDate, Utc};
use core_types::CompanyUnit;
use serde::{Deserialize, Serialize};

/// Body of `GET /`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

/// Body of every non-success answer.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub error: String,
}

/// Query of the period, budget and cash flow listings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_unit: Option<CompanyUnit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl ListQuery {
    /// The newest `limit` rows of one unit.
    pub fn latest(company_unit: CompanyUnit, limit: u32) -> Self {
        Self {
            company_unit: Some(company_unit),
            limit: Some(limit),
            ..Self::default()
        }
    }
}

/// Query of `GET /financial/kpis`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KpiQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_months: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_unit: Option<CompanyUnit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_of: Option<NaiveDate>,
}
