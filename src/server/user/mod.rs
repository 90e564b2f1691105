mod bookings;
mod me;
mod policies;
mod quota;
mod reports;
mod slots;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::server::AppState;

pub fn user_router() -> Router<Arc<AppState>> {
    Router::new()
        // Current user
        .route("/me", get(me::get_me))
        .route("/me/profile", post(me::setup_profile))
        // Policies
        .route("/policies", get(policies::list_policies))
        .route(
            "/policies/{key}",
            get(policies::get_policy).put(policies::upsert_policy),
        )
        // Slots
        .route("/slots", get(slots::list_slots).post(slots::create_slot))
        .route("/slots/autofill", post(slots::autofill_day))
        .route(
            "/slots/{id}",
            patch(slots::update_slot).delete(slots::delete_slot),
        )
        // Bookings
        .route(
            "/bookings",
            get(bookings::list_my_bookings).post(bookings::book_slot),
        )
        .route("/bookings/{id}/cancel", post(bookings::cancel_booking))
        .route("/bookings/{id}/no-show", post(bookings::mark_no_show))
        .route("/bookings/{id}/attended", post(bookings::mark_attended))
        // Quota
        .route("/quota", get(quota::get_current_quota))
        .route("/quota/window", post(quota::create_quota_window))
        // Reports
        .route("/reports/dashboard", get(reports::dashboard))
        .route("/reports/monthly", get(reports::monthly))
}
