pub mod config;
pub mod constants;
pub mod domain;
pub mod logging;
pub mod media;
pub mod routes;
pub mod services;
pub mod storage;

use axum::Router;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use media::MediaTools;
use storage::Storage;

pub struct AppState {
    pub db: PgPool,
    pub storage: Storage,
    pub media_tools: MediaTools,
    pub jwt_secret: Vec<u8>,
}

/// The full HTTP application
pub fn build_app(state: Arc<AppState>) -> Router {
    routes::build_routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
