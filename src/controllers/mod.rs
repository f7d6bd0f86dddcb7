pub mod bookings;
pub mod events;

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json, Router};
use chrono::NaiveDate;
use serde_json::json;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(events::routes())
        .merge(bookings::routes())
}

/// Current calendar date, resolved once at the boundary; the core only
/// ever sees it as an explicit argument.
pub fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

pub(crate) fn admin_required() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({"error": "admin credentials required"})),
    )
        .into_response()
}
