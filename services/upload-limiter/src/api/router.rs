use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use super::handlers;
use super::ApiState;

pub fn create_router(state: Arc<ApiState>) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(
            state.config.request_timeout_secs,
        )));

    Router::new()
        .route(
            "/record-upload-limit",
            get(handlers::record_upload_limit).post(handlers::record_upload_limit),
        )
        .route(
            "/record-upload-size",
            get(handlers::record_upload_size).post(handlers::record_upload_size),
        )
        .route("/check-upload-limit", get(handlers::check_upload_limit))
        .route("/api/providers", get(handlers::list_providers))
        .route("/api/providers/:provider_id", get(handlers::get_provider))
        .route("/health", get(handlers::health_check))
        .with_state(state)
        .layer(middleware)
}
