//! Company listing, creation and bulk deletion.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use tracing::{debug, error, info};

use minixy_core::{CompanyFilter, EmployeeSize, NewCompany};

use crate::error::ApiError;
use crate::state::AppState;

/// Query parameters for `GET /api/companies`.
#[derive(Debug, Default, Deserialize)]
pub struct ListCompaniesQuery {
    pub domain: Option<String>,
    pub country: Option<String>,
    #[serde(rename = "employeeSize")]
    pub employee_size: Option<String>,
}

impl ListCompaniesQuery {
    /// Empty values, and `_` for the exact-match filters, mean no constraint.
    pub fn to_filter(&self) -> CompanyFilter {
        fn exact(v: &Option<String>) -> Option<String> {
            v.as_deref()
                .filter(|s| !s.is_empty() && *s != "_")
                .map(str::to_string)
        }
        CompanyFilter {
            domain_contains: self.domain.clone().filter(|s| !s.is_empty()),
            country: exact(&self.country),
            employee_size: exact(&self.employee_size),
        }
    }
}

pub async fn list_companies(
    State(state): State<AppState>,
    Query(query): Query<ListCompaniesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = query.to_filter();
    let companies = state.store.list(filter.clone()).await.map_err(|e| {
        error!(subsystem = "api", op = "list", error = %e, "Error retrieving companies");
        ApiError::Internal("Failed to retrieve companies".to_string())
    })?;

    debug!(?filter, result_count = companies.len(), "Listed companies");
    Ok(Json(serde_json::json!({ "companies": companies })))
}

/// Body for `POST /api/companies`.
#[derive(Debug, Default, Deserialize)]
pub struct CreateCompanyBody {
    pub company_name: Option<String>,
    pub country: Option<String>,
    pub employee_size: Option<String>,
    pub city: Option<String>,
    pub domain: Option<String>,
}

pub async fn create_company(
    State(state): State<AppState>,
    Json(body): Json<CreateCompanyBody>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(size) = &body.employee_size {
        size.parse::<EmployeeSize>()?;
    }

    let company = NewCompany {
        company_name: body.company_name,
        employee_size: body.employee_size,
        country: body.country,
        city: body.city,
        domain: body.domain,
    };
    company.validate()?;

    let company = state
        .store
        .insert(company)
        .await
        .map_err(|e| {
            error!(subsystem = "api", op = "insert", error = %e, "Error creating company");
            ApiError::Internal("Failed to create company".to_string())
        })?;

    info!(id = company.id, "Company created");
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "company": company })),
    ))
}

pub async fn delete_companies(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.store.delete_all().await.map_err(|e| {
        error!(subsystem = "api", op = "delete_all", error = %e, "Error deleting companies");
        ApiError::Internal("Failed to delete companies".to_string())
    })?;

    info!(deleted, "Companies deleted");
    Ok(Json(serde_json::json!({
        "message": "Companies deleted",
        "deleted": deleted,
    })))
}
