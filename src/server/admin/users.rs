use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::RequireAuth;
use crate::server::AppState;
use crate::server::dto::{CreateUserRequest, UpdateUserStatusRequest};
use crate::server::response::{ApiError, ApiResponse};

/// Creates an identity and returns its token. The raw token is not stored
/// and cannot be shown again.
pub async fn create_user(
    RequireAuth(actor): RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> impl IntoResponse {
    let issued = state
        .engine
        .create_user(&actor, &req.name, &req.email, req.role)?;
    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(issued))))
}

pub async fn update_user_status(
    RequireAuth(actor): RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserStatusRequest>,
) -> impl IntoResponse {
    state.engine.update_user_status(&actor, &id, req.status)?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
