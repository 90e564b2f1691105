use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};

use crate::auth::RequireAuth;
use crate::server::AppState;
use crate::server::dto::CreatedResponse;
use crate::server::response::{ApiError, ApiResponse};

pub async fn get_current_quota(
    RequireAuth(actor): RequireAuth,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let quota = state.engine.get_current_quota(&actor)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(quota)))
}

pub async fn create_quota_window(
    RequireAuth(actor): RequireAuth,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let id = state.engine.create_quota_window(&actor)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(CreatedResponse { id })))
}
