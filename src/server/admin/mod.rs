mod audit;
mod lifters;
mod users;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::server::AppState;

pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        // Lifter routes
        .route("/lifters", get(lifters::list_lifters))
        .route("/lifters/unbooked", get(lifters::list_unbooked_lifters))
        // User routes
        .route("/users", post(users::create_user))
        .route("/users/{id}/status", patch(users::update_user_status))
        // Audit routes
        .route("/audit", get(audit::list_audit))
}
