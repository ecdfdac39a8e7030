//! GET /health: liveness plus a database round-trip.

use crate::error::{blocking, ApiError};
use axum::{Extension, Json};
use holders_core::service::HolderService;
use serde_json::{json, Value};

pub async fn health(Extension(service): Extension<HolderService>) -> Result<Json<Value>, ApiError> {
    blocking(move || service.pool().acquire()?.ping()).await?;
    Ok(Json(json!({ "status": "ok" })))
}
