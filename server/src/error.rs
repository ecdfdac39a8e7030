use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use holders_core::error::{HolderError, HolderResult};
use serde_json::json;

/// Error returned by every handler. Internal failures are logged here and
/// reach the client only as a generic message.
#[derive(Debug)]
pub struct ApiError(pub HolderError);

impl From<HolderError> for ApiError {
    fn from(err: HolderError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = if self.0.is_internal() {
            log::error!("request failed: {}", self.0);
            json!({ "error": "Internal server error" })
        } else {
            match self.0.field_messages() {
                Some(fields) => json!({ "error": self.0.to_string(), "fields": fields }),
                None => json!({ "error": self.0.to_string() }),
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Run a synchronous service call on the blocking pool.
pub async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> HolderResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| HolderError::Other(anyhow::anyhow!("blocking task failed: {e}")))?
        .map_err(ApiError)
}
