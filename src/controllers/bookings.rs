use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::error::CoreError;
use crate::middleware::Requester;
use crate::services::{lifecycle, reservation};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events/{id}/bookings", post(create_booking))
        .route("/events/{id}/close", post(close_registration))
}

#[derive(Debug, Deserialize)]
struct BookingBatchRequest {
    bookings: Vec<reservation::SeatRequest>,
}

// POST /api/events/{id}/bookings
async fn create_booking(
    State(state): State<Arc<AppState>>,
    requester: Requester,
    Path(event_id): Path<i64>,
    Json(req): Json<BookingBatchRequest>,
) -> Result<Response, CoreError> {
    let committed =
        reservation::book(&state, event_id, req.bookings, &requester, super::today()).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({"bookings": committed})),
    )
        .into_response())
}

// POST /api/events/{id}/close
async fn close_registration(
    State(state): State<Arc<AppState>>,
    requester: Requester,
    Path(event_id): Path<i64>,
) -> Result<Response, CoreError> {
    if !requester.is_admin {
        return Ok(super::admin_required());
    }
    let event = lifecycle::close_registration(&state, event_id).await?;
    Ok(Json(json!({
        "message": "registration closed",
        "event": event,
    }))
    .into_response())
}
