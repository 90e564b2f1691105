use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};

use crate::auth::RequireAuth;
use crate::server::AppState;
use crate::server::dto::MonthlyReportQuery;
use crate::server::response::{ApiError, ApiResponse};

pub async fn dashboard(
    RequireAuth(actor): RequireAuth,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let stats = state.engine.dashboard_stats(&actor)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(stats)))
}

pub async fn monthly(
    RequireAuth(actor): RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(query): Query<MonthlyReportQuery>,
) -> impl IntoResponse {
    let report = state
        .engine
        .monthly_report(&actor, query.year, query.month)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(report)))
}
