use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::RequireAuth;
use crate::server::AppState;
use crate::server::dto::{BookSlotRequest, CreatedResponse};
use crate::server::response::{ApiError, ApiResponse};

pub async fn list_my_bookings(
    RequireAuth(actor): RequireAuth,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let bookings = state.engine.list_my_bookings(&actor)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(bookings)))
}

pub async fn book_slot(
    RequireAuth(actor): RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<BookSlotRequest>,
) -> impl IntoResponse {
    let id = state.engine.book_slot(&actor, &req.slot_id)?;
    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(CreatedResponse { id }))))
}

pub async fn cancel_booking(
    RequireAuth(actor): RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let booking = state.engine.cancel_booking(&actor, &id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(booking)))
}

pub async fn mark_no_show(
    RequireAuth(actor): RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let booking = state.engine.mark_no_show(&actor, &id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(booking)))
}

pub async fn mark_attended(
    RequireAuth(actor): RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let booking = state.engine.mark_attended(&actor, &id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(booking)))
}
