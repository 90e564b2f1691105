use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};

use crate::auth::RequireAuth;
use crate::server::AppState;
use crate::server::dto::SetupProfileRequest;
use crate::server::response::{ApiError, ApiResponse};

pub async fn get_me(
    RequireAuth(actor): RequireAuth,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let me = state.engine.current_user(&actor)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(me)))
}

pub async fn setup_profile(
    RequireAuth(actor): RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<SetupProfileRequest>,
) -> impl IntoResponse {
    let profile = state
        .engine
        .setup_profile(&actor, &req.name, &req.email, req.experience_level)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(profile)))
}
