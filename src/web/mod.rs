use axum::{
    middleware::from_fn_with_state,
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{AppConfig, sync::SyncCoordinator};

pub mod handlers;
pub mod middleware;
pub mod responses;

pub use handlers::{trigger_class_sync, trigger_sync};
pub use responses::*;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<SyncCoordinator>,
    pub config: AppConfig,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes(state.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/sync", post(trigger_sync))
        .route("/sync/:class", post(trigger_class_sync))
        // Checked before any handler runs, so a rejected trigger does no work.
        .route_layer(from_fn_with_state(state, middleware::require_sync_token))
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
