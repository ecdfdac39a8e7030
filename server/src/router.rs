//! Router construction.

use crate::{handlers, middleware};
use axum::{middleware as axum_mw, routing::get, Extension, Router};
use holders_core::service::HolderService;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;

/// Build the full router with all routes and middleware.
pub fn build_router(service: HolderService) -> Router {
    let timeout = Duration::from_secs(service.config().server.request_timeout_secs);

    // Guarded routes; the policy check runs after routing so it sees the matched path.
    let protected = Router::new()
        .route(
            "/holders",
            get(handlers::holders::list)
                .post(handlers::holders::create)
                .put(handlers::holders::update)
                .delete(handlers::holders::delete),
        )
        .route("/holders/summary", get(handlers::holders::summary))
        .route("/holders/overview", get(handlers::holders::overview))
        .route("/holders/companies", get(handlers::holders::companies))
        .route("/holders/lookup", get(handlers::holders::lookup))
        .route("/holders/:id", get(handlers::holders::get_one))
        .route_layer(axum_mw::from_fn(middleware::authorize));

    let public = Router::new().route("/health", get(handlers::health::health));

    public
        .merge(protected)
        .layer(Extension(service))
        .layer(TimeoutLayer::new(timeout))
        .layer(axum_mw::from_fn(middleware::log_requests))
}
