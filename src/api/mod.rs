use axum::{
    Router,
    http::{
        HeaderValue,
        header::{ACCESS_CONTROL_MAX_AGE, CONTENT_TYPE},
    },
    routing::get,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::aggregator::SearchAggregator;
use crate::config::Config;

pub mod handlers;
pub mod models;

pub const CORS_MAX_AGE_SECONDS: u64 = 86400;
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<SearchAggregator>,
    pub config: Arc<Config>,
}

pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(CORS_MAX_AGE_SECONDS));

    // HEAD is registered explicitly, otherwise axum serves it through GET
    let search = get(handlers::search_handler)
        .head(handlers::method_not_allowed_handler)
        .options(handlers::preflight_handler)
        .fallback(handlers::method_not_allowed_handler);

    Router::new()
        .route("/", search.clone())
        .route("/search", search)
        .route("/health", get(handlers::health_handler))
        .with_state(state)
        .layer(cors)
        // Set on every response, preflights included.
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static("86400"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            CONTENT_TYPE,
            HeaderValue::from_static(JSON_CONTENT_TYPE),
        ))
        .layer(TraceLayer::new_for_http())
}
