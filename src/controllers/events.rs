use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::error::CoreError;
use crate::middleware::Requester;
use crate::services::registry;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events", post(create_event).get(list_events))
        .route("/events/{id}", get(get_event).delete(delete_event))
        .route("/events/{id}/seats", get(get_seat_map))
        .route("/events/{id}/seats/init", post(reinitialize_seats))
}

// POST /api/events
async fn create_event(
    State(state): State<Arc<AppState>>,
    requester: Requester,
    Json(req): Json<registry::CreateEventRequest>,
) -> Result<Response, CoreError> {
    if !requester.is_admin {
        return Ok(super::admin_required());
    }
    let event = registry::create_event(&state, req, super::today()).await?;
    Ok((StatusCode::CREATED, Json(event)).into_response())
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    scope: Option<String>,
}

// GET /api/events?scope=upcoming|past
async fn list_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListQuery>,
) -> Result<Response, CoreError> {
    let today = super::today();
    match params.scope.as_deref().unwrap_or("upcoming") {
        "upcoming" => {
            if let Some(events) = state.cache.get_upcoming_events(today).await {
                return Ok(Json(events).into_response());
            }
            let events = registry::list_upcoming(&state, today).await?;
            state.cache.save_upcoming_events(today, &events).await;
            Ok(Json(events).into_response())
        }
        "past" => {
            let events = registry::list_past(&state, today).await?;
            Ok(Json(events).into_response())
        }
        other => Err(CoreError::invalid(format!(
            "scope must be 'upcoming' or 'past', got '{other}'"
        ))),
    }
}

// GET /api/events/{id}
async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
) -> Result<Json<crate::models::Event>, CoreError> {
    let event = registry::get_event(&state, event_id).await?;
    Ok(Json(event))
}

// DELETE /api/events/{id}
async fn delete_event(
    State(state): State<Arc<AppState>>,
    requester: Requester,
    Path(event_id): Path<i64>,
) -> Result<Response, CoreError> {
    if !requester.is_admin {
        return Ok(super::admin_required());
    }
    registry::delete_event(&state, event_id).await?;
    Ok(Json(json!({"message": "event deleted"})).into_response())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SeatMapEntry {
    seat_id: String,
    price: f64,
    booked: bool,
}

// GET /api/events/{id}/seats
async fn get_seat_map(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
) -> Result<Json<Vec<SeatMapEntry>>, CoreError> {
    let event = registry::get_event(&state, event_id).await?;

    let seats = match state.cache.get_seats(event_id).await {
        Some(seats) => seats,
        None => {
            let seats = registry::list_seats(&state, event_id).await?;
            state.cache.save_seats(event_id, &seats).await;
            seats
        }
    };

    let map = seats
        .into_iter()
        .map(|seat| SeatMapEntry {
            booked: seat.is_booked_for(event.event_date),
            seat_id: seat.seat_id,
            price: seat.price,
        })
        .collect();

    Ok(Json(map))
}

// POST /api/events/{id}/seats/init
async fn reinitialize_seats(
    State(state): State<Arc<AppState>>,
    requester: Requester,
    Path(event_id): Path<i64>,
) -> Result<Response, CoreError> {
    if !requester.is_admin {
        return Ok(super::admin_required());
    }
    let regenerated = registry::reinitialize_seats(&state, event_id).await?;
    Ok(Json(json!({
        "message": "seat inventory verified",
        "regenerated": regenerated,
    }))
    .into_response())
}
