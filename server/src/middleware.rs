//! Request middleware: session + policy check, and request logging.

use crate::error::{blocking, ApiError};
use axum::{
    extract::{MatchedPath, Request},
    http::{header::COOKIE, Method},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension,
};
use holders_core::{
    auth::{self, Action, SESSION_COOKIE},
    service::HolderService,
};
use std::time::Instant;

/// Map a routed request to the action it performs. `None` means the route
/// is not guarded.
pub fn action_for(method: &Method, route: &str) -> Option<Action> {
    let action = match (method.as_str(), route) {
        ("GET", "/holders") => Action::List,
        ("POST", "/holders") => Action::Create,
        ("PUT", "/holders") => Action::Update,
        ("DELETE", "/holders") => Action::Delete,
        ("GET", "/holders/summary") => Action::Summary,
        ("GET", "/holders/overview") => Action::Overview,
        ("GET", "/holders/companies") => Action::Companies,
        ("GET", "/holders/lookup") => Action::Lookup,
        ("GET", "/holders/:id") => Action::View,
        _ => return None,
    };
    Some(action)
}

/// Resolve the session cookie and apply `auth::authorize` once per request.
/// The resolved `Session` is handed to the handler as an extension.
pub async fn authorize(
    Extension(service): Extension<HolderService>,
    mut request: Request,
    next: Next,
) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let Some(action) = action_for(request.method(), &route) else {
        return next.run(request).await;
    };

    let cookie = request
        .headers()
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|h| auth::cookie_value(h, SESSION_COOKIE))
        .map(str::to_string);

    let session = match blocking(move || service.resolve_session(cookie.as_deref())).await {
        Ok(s) => s,
        Err(e) => {
            log::warn!("{} {route}: no session", action.as_str());
            return e.into_response();
        }
    };
    if let Err(e) = auth::authorize(action, &session.role) {
        log::warn!("{} denied for {} ({})", action.as_str(), session.email, session.role);
        return ApiError(e).into_response();
    }

    request.extensions_mut().insert(session);
    next.run(request).await
}

pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(request).await;
    log::info!(
        "{method} {path} -> {} in {}ms",
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_holder_route_has_an_action() {
        assert_eq!(action_for(&Method::GET, "/holders"), Some(Action::List));
        assert_eq!(action_for(&Method::DELETE, "/holders"), Some(Action::Delete));
        assert_eq!(action_for(&Method::GET, "/holders/:id"), Some(Action::View));
        assert_eq!(action_for(&Method::GET, "/health"), None);
    }
}
