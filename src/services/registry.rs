use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

use crate::error::CoreError;
use crate::models::{Event, Seat};
use crate::services::seating;
use crate::AppState;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    pub title: String,
    pub event_date: NaiveDate,
    pub capacity: i32,
}

const EVENT_COLUMNS: &str =
    "id, title, event_date, capacity, registration_closed, created_at";

pub fn validate_new_event(req: &CreateEventRequest, today: NaiveDate) -> Result<(), CoreError> {
    if req.title.trim().is_empty() {
        return Err(CoreError::invalid("event title is required"));
    }
    if req.capacity < 1 || req.capacity > seating::MAX_CAPACITY {
        return Err(CoreError::invalid(format!(
            "capacity must be between 1 and {}",
            seating::MAX_CAPACITY
        )));
    }
    if req.event_date == today {
        return Err(CoreError::invalid(
            "an event cannot be created for the current date",
        ));
    }
    Ok(())
}

/// Create the event and its full seat inventory in one transaction; both
/// appear together or not at all.
pub async fn create_event(
    state: &AppState,
    req: CreateEventRequest,
    today: NaiveDate,
) -> Result<Event, CoreError> {
    validate_new_event(&req, today)?;

    let mut tx = state.db.pool.begin().await?;

    let event: Event = sqlx::query_as(&format!(
        "INSERT INTO events (title, event_date, capacity)
         VALUES ($1, $2, $3)
         RETURNING {EVENT_COLUMNS}"
    ))
    .bind(&req.title)
    .bind(req.event_date)
    .bind(req.capacity)
    .fetch_one(&mut *tx)
    .await
    .map_err(|err| date_conflict(err, req.event_date))?;

    seating::ensure_seats(
        &mut tx,
        event.id,
        event.capacity,
        state.config.booking.default_seat_price,
    )
    .await?;

    tx.commit().await?;

    state.cache.invalidate_events().await;
    info!("Created event {} on {}", event.id, event.event_date);
    Ok(event)
}

/// Booked events are immutable by this path: any ledger entry on any seat
/// blocks deletion.
pub async fn delete_event(state: &AppState, event_id: i64) -> Result<(), CoreError> {
    let event = get_event(state, event_id).await?;

    let has_bookings: bool = sqlx::query_scalar(
        "SELECT EXISTS(
           SELECT 1 FROM seats
           WHERE event_id = $1 AND jsonb_array_length(bookings) > 0
         )",
    )
    .bind(event_id)
    .fetch_one(&state.db.pool)
    .await?;

    if has_bookings {
        return Err(CoreError::conflict(format!(
            "event {event_id} has bookings and cannot be deleted"
        )));
    }

    let mut tx = state.db.pool.begin().await?;
    sqlx::query("DELETE FROM seats WHERE event_id = $1")
        .bind(event_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM events WHERE id = $1")
        .bind(event_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    state.cache.invalidate_seats(event_id).await;
    state.cache.invalidate_events().await;
    info!("Deleted event {} ({})", event_id, event.title);
    Ok(())
}

pub async fn get_event(state: &AppState, event_id: i64) -> Result<Event, CoreError> {
    sqlx::query_as(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"))
        .bind(event_id)
        .fetch_optional(&state.db.pool)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("event {event_id} not found")))
}

pub async fn list_upcoming(state: &AppState, today: NaiveDate) -> Result<Vec<Event>, CoreError> {
    let events = sqlx::query_as(&format!(
        "SELECT {EVENT_COLUMNS} FROM events
         WHERE event_date > $1 AND registration_closed = FALSE
         ORDER BY event_date ASC"
    ))
    .bind(today)
    .fetch_all(&state.db.pool)
    .await?;
    Ok(events)
}

pub async fn list_past(state: &AppState, today: NaiveDate) -> Result<Vec<Event>, CoreError> {
    let events = sqlx::query_as(&format!(
        "SELECT {EVENT_COLUMNS} FROM events
         WHERE event_date < $1 OR registration_closed = TRUE
         ORDER BY event_date DESC"
    ))
    .bind(today)
    .fetch_all(&state.db.pool)
    .await?;
    Ok(events)
}

pub async fn list_seats(state: &AppState, event_id: i64) -> Result<Vec<Seat>, CoreError> {
    let seats = sqlx::query_as(
        "SELECT event_id, seat_id, price, bookings
         FROM seats WHERE event_id = $1
         ORDER BY seat_id",
    )
    .bind(event_id)
    .fetch_all(&state.db.pool)
    .await?;
    Ok(seats)
}

/// Explicit recovery entry point: regenerate missing inventory for an
/// event, refusing to touch anything once a booking exists. Never invoked
/// from a read path.
pub async fn reinitialize_seats(state: &AppState, event_id: i64) -> Result<u64, CoreError> {
    let event = get_event(state, event_id).await?;

    let has_bookings: bool = sqlx::query_scalar(
        "SELECT EXISTS(
           SELECT 1 FROM seats
           WHERE event_id = $1 AND jsonb_array_length(bookings) > 0
         )",
    )
    .bind(event_id)
    .fetch_one(&state.db.pool)
    .await?;

    if has_bookings {
        return Err(CoreError::conflict(format!(
            "event {event_id} already has bookings; refusing to reinitialize seats"
        )));
    }

    let mut tx = state.db.pool.begin().await?;
    let regenerated = seating::ensure_seats(
        &mut tx,
        event_id,
        event.capacity,
        state.config.booking.default_seat_price,
    )
    .await?;
    tx.commit().await?;

    state.cache.invalidate_seats(event_id).await;
    Ok(regenerated)
}

fn date_conflict(err: sqlx::Error, event_date: NaiveDate) -> CoreError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            CoreError::conflict(format!("an event already exists on {event_date}"))
        }
        _ => CoreError::Internal(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn req(event_date: NaiveDate, capacity: i32) -> CreateEventRequest {
        CreateEventRequest {
            title: "Autumn Concert".to_string(),
            event_date,
            capacity,
        }
    }

    #[test]
    fn accepts_a_future_event_within_grid_limits() {
        assert!(validate_new_event(&req(date("2025-06-01"), 260), date("2025-05-01")).is_ok());
        assert!(validate_new_event(&req(date("2025-06-01"), 1), date("2025-05-01")).is_ok());
    }

    #[test]
    fn rejects_event_on_the_current_date() {
        let today = date("2025-06-01");
        let err = validate_new_event(&req(today, 30), today).unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[test]
    fn rejects_capacity_outside_the_grid() {
        let today = date("2025-05-01");
        assert!(matches!(
            validate_new_event(&req(date("2025-06-01"), 0), today),
            Err(CoreError::InvalidInput(_))
        ));
        assert!(matches!(
            validate_new_event(&req(date("2025-06-01"), 261), today),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn rejects_blank_title() {
        let today = date("2025-05-01");
        let mut r = req(date("2025-06-01"), 30);
        r.title = "   ".to_string();
        assert!(matches!(
            validate_new_event(&r, today),
            Err(CoreError::InvalidInput(_))
        ));
    }
}
