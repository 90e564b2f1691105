use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{Router, routing::get};

use super::admin::admin_router;
use super::response::ApiError;
use super::user::user_router;
use crate::engine::Engine;
use crate::error::Error;

/// Shared by every handler. All booking state lives behind the engine.
pub struct AppState {
    pub engine: Arc<Engine>,
}

impl AppState {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn route_not_found() -> ApiError {
    Error::not_found("Route not found").into()
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let start = Instant::now();

    let response = next.run(request).await;
    let status = response.status().as_u16();
    let elapsed_ms = start.elapsed().as_millis();

    if response.status().is_server_error() {
        tracing::warn!(%method, %path, status, elapsed_ms, "request failed");
    } else {
        tracing::info!(%method, %path, status, elapsed_ms, "request");
    }

    response
}

/// `/api/v1/admin` holds the back-office views; everything else a lifter or
/// admin does goes through `/api/v1`. Role checks happen in the engine.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1/admin", admin_router())
        .nest("/api/v1", user_router())
        .fallback(route_not_found)
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
