use axum::Router;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use warden_core::AppError;

use crate::state::AppState;
use crate::{handlers, middleware};


pub fn build_router(app_state: AppState, cors_origin: Option<&str>) -> Result<Router, AppError> {
    let admin_routes = Router::new()
        .route("/api/admin/bans", get(handlers::bans::list_bans_handler))
        .route(
            "/api/admin/bans/remove",
            post(handlers::bans::remove_bans_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_admin_token,
        ));

    let router = Router::new()
        .route("/health", get(handlers::health::health_handler))
        .route(
            "/api/access/check",
            post(handlers::access::check_access_handler),
        )
        .route(
            "/api/access/failures",
            post(handlers::access::record_failure_handler),
        )
        .merge(admin_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http());

    match cors_origin {
        Some(origin) => Ok(router.layer(build_cors_layer(origin)?)),
        None => Ok(router),
    }
}

fn build_cors_layer(origin: &str) -> Result<CorsLayer, AppError> {
    Ok(CorsLayer::new()
        .allow_origin(
            HeaderValue::from_str(origin).map_err(|error| {
                AppError::Internal(format!("invalid CORS_ALLOWED_ORIGIN: {error}"))
            })?,
        )
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]))
}
