//! API Routes
//!
//! Configures the Axum router with the cache, counter and info endpoints.

use std::path::Path;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeFile,
    trace::TraceLayer,
};

use super::handlers::{
    decr_counter_handler, get_cache_handler, get_counter_handler, incr_counter_handler,
    info_handler, set_cache_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin, method and header
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    with_middleware(api_routes(), state)
}

/// Same as [`create_router`], plus `/favicon.ico` and `/counter.js` served
/// verbatim from `static_dir`.
pub fn create_router_with_assets(state: AppState, static_dir: &Path) -> Router {
    let routes = api_routes()
        .route_service("/favicon.ico", ServeFile::new(static_dir.join("favicon.ico")))
        .route_service("/counter.js", ServeFile::new(static_dir.join("counter.js")));
    with_middleware(routes, state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(info_handler))
        .route("/cache/:name", get(get_cache_handler).post(set_cache_handler))
        .route(
            "/counter/:name",
            get(get_counter_handler)
                .post(incr_counter_handler)
                .delete(decr_counter_handler),
        )
}

// Layers apply only to routes added before them, so every route goes in first
fn with_middleware(routes: Router<AppState>, state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    routes
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
