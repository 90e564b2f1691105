use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};

use crate::auth::RequireAuth;
use crate::server::AppState;
use crate::server::response::{ApiError, ApiResponse};

pub async fn list_lifters(
    RequireAuth(actor): RequireAuth,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let lifters = state.engine.list_lifters(&actor)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(lifters)))
}

pub async fn list_unbooked_lifters(
    RequireAuth(actor): RequireAuth,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let lifters = state.engine.unbooked_lifters(&actor)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(lifters)))
}
