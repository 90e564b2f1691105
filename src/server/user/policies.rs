use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::auth::RequireAuth;
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::UpsertPolicyRequest;
use crate::server::response::{ApiError, ApiResponse};

pub async fn list_policies(
    RequireAuth(actor): RequireAuth,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let policies = state.engine.get_all_policies(&actor)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(policies)))
}

/// Returns the stored row only; unset keys are 404 even though the engine
/// would resolve them to their defaults.
pub async fn get_policy(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    let policy = state
        .engine
        .get_policy(&key)?
        .ok_or_else(|| Error::not_found("Policy not found"))?;
    Ok::<_, ApiError>(Json(ApiResponse::success(policy)))
}

pub async fn upsert_policy(
    RequireAuth(actor): RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Json(req): Json<UpsertPolicyRequest>,
) -> impl IntoResponse {
    let policy = state.engine.upsert_policy(&actor, &key, &req.value)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(policy)))
}
