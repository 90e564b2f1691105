use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::RequireAuth;
use crate::engine::NewSlot;
use crate::server::AppState;
use crate::server::dto::{AutofillRequest, DeleteSlotResponse, SlotRangeQuery, UpdateSlotRequest};
use crate::server::response::{ApiError, ApiResponse};
use crate::types::SlotChanges;

pub async fn list_slots(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(range): Query<SlotRangeQuery>,
) -> impl IntoResponse {
    let slots = state.engine.list_slots(range.from, range.to)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(slots)))
}

pub async fn create_slot(
    RequireAuth(actor): RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewSlot>,
) -> impl IntoResponse {
    let slot = state.engine.create_slot(&actor, &req)?;
    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(slot))))
}

pub async fn update_slot(
    RequireAuth(actor): RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateSlotRequest>,
) -> impl IntoResponse {
    let changes = SlotChanges::from(req);
    let slot = state.engine.update_slot(&actor, &id, &changes)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(slot)))
}

pub async fn delete_slot(
    RequireAuth(actor): RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let canceled_bookings = state.engine.delete_slot(&actor, &id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(DeleteSlotResponse { canceled_bookings })))
}

pub async fn autofill_day(
    RequireAuth(actor): RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<AutofillRequest>,
) -> impl IntoResponse {
    let outcome = state
        .engine
        .fill_day_with_default_working_hours(&actor, req.day_start_utc)?;
    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(outcome))))
}
