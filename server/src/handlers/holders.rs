//! /holders endpoints. Authorization has already run in middleware.

use crate::error::{blocking, ApiError};
use axum::{
    extract::{rejection::JsonRejection, Path, Query},
    http::StatusCode,
    Extension, Json,
};
use holders_core::{
    error::HolderError,
    holder::{InsuranceHolder, NewHolder},
    query::ListParams,
    service::{HolderList, HolderService},
    stats::{HolderStats, HoldersOverview},
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdParam {
    pub id: Option<String>,
}

impl IdParam {
    fn require(self) -> Result<String, ApiError> {
        self.id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError(HolderError::invalid("id", "Holder id is required")))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewParams {
    pub include_patients: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupParams {
    pub ci: Option<String>,
    pub policy_number: Option<String>,
}

fn bad_body(rejection: JsonRejection) -> ApiError {
    ApiError(HolderError::invalid("body", rejection.body_text()))
}

pub async fn list(
    Extension(service): Extension<HolderService>,
    Query(params): Query<ListParams>,
) -> Result<Json<HolderList>, ApiError> {
    let query = params.into_query(&service.config().pagination);
    let page = blocking(move || service.list(&query)).await?;
    Ok(Json(page))
}

/// Aggregates scoped to the same filters as the list.
pub async fn summary(
    Extension(service): Extension<HolderService>,
    Query(params): Query<ListParams>,
) -> Result<Json<HolderStats>, ApiError> {
    let filter = params.filter();
    let stats = blocking(move || Ok(service.summary(&filter))).await?;
    Ok(Json(stats))
}

pub async fn overview(
    Extension(service): Extension<HolderService>,
) -> Result<Json<HoldersOverview>, ApiError> {
    let overview = blocking(move || Ok(service.overview())).await?;
    Ok(Json(overview))
}

pub async fn companies(
    Extension(service): Extension<HolderService>,
) -> Result<Json<Vec<String>>, ApiError> {
    let companies = blocking(move || service.companies()).await?;
    Ok(Json(companies))
}

pub async fn lookup(
    Extension(service): Extension<HolderService>,
    Query(params): Query<LookupParams>,
) -> Result<Json<Vec<InsuranceHolder>>, ApiError> {
    let found = blocking(move || {
        service.lookup(params.ci.as_deref(), params.policy_number.as_deref())
    })
    .await?;
    Ok(Json(found))
}

pub async fn get_one(
    Extension(service): Extension<HolderService>,
    Path(id): Path<String>,
    Query(params): Query<ViewParams>,
) -> Result<Json<InsuranceHolder>, ApiError> {
    let include = matches!(params.include_patients.as_deref(), Some("true" | "1"));
    let holder = blocking(move || service.get(&id, include)).await?;
    Ok(Json(holder))
}

pub async fn create(
    Extension(service): Extension<HolderService>,
    body: Result<Json<NewHolder>, JsonRejection>,
) -> Result<(StatusCode, Json<InsuranceHolder>), ApiError> {
    let Json(input) = body.map_err(bad_body)?;
    let created = blocking(move || service.create(input)).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update(
    Extension(service): Extension<HolderService>,
    Query(params): Query<IdParam>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<InsuranceHolder>, ApiError> {
    let id = params.require()?;
    let Json(body) = body.map_err(bad_body)?;
    let Value::Object(fields) = body else {
        return Err(ApiError(HolderError::invalid("body", "Expected a JSON object")));
    };
    let updated = blocking(move || service.update(&id, &fields)).await?;
    Ok(Json(updated))
}

pub async fn delete(
    Extension(service): Extension<HolderService>,
    Query(params): Query<IdParam>,
) -> Result<Json<Value>, ApiError> {
    let id = params.require()?;
    let deleted = id.clone();
    blocking(move || service.delete(&id)).await?;
    Ok(Json(json!({ "success": true, "id": deleted })))
}
