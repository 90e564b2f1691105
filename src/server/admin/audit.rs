use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};

use crate::auth::RequireAuth;
use crate::server::AppState;
use crate::server::dto::PaginationParams;
use crate::server::response::{ApiError, PaginatedResponse};

pub async fn list_audit(
    RequireAuth(actor): RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    let page = state.engine.list_audit(&actor, params.cursor, params.limit)?;

    Ok::<_, ApiError>(Json(PaginatedResponse::new(
        page.entries,
        page.next_cursor.map(|seq| seq.to_string()),
        page.has_more,
    )))
}
