use chrono::NaiveDate;
use tracing::{info, warn};

use crate::error::CoreError;
use crate::models::{Event, Seat};
use crate::services::notifier::{Notifier, RosterRow};
use crate::services::registry;
use crate::AppState;

/// Close registration for an event: a one-way, terminal transition.
///
/// The flag flip is a single-row update and commits on its own; the roster
/// fan-out afterwards is best-effort and can never undo the close.
pub async fn close_registration(state: &AppState, event_id: i64) -> Result<Event, CoreError> {
    let mut event = registry::get_event(state, event_id).await?;

    if event.registration_closed {
        return Err(CoreError::conflict(format!(
            "registration for event {event_id} is already closed"
        )));
    }

    let updated = sqlx::query(
        "UPDATE events SET registration_closed = TRUE
         WHERE id = $1 AND registration_closed = FALSE",
    )
    .bind(event_id)
    .execute(&state.db.pool)
    .await?
    .rows_affected();

    // a concurrent close won the race
    if updated == 0 {
        return Err(CoreError::conflict(format!(
            "registration for event {event_id} is already closed"
        )));
    }

    event.registration_closed = true;
    state.cache.invalidate_events().await;
    state.cache.invalidate_seats(event_id).await;
    info!("Registration closed for event {}", event_id);

    let seats = registry::list_seats(state, event_id).await?;
    let rows = roster_rows(&seats, event.event_date);
    dispatch_roster(state.notifier.as_ref(), &event, &rows).await;

    Ok(event)
}

/// Flatten the per-seat ledgers into roster rows for the event's date.
pub fn roster_rows(seats: &[Seat], date: NaiveDate) -> Vec<RosterRow> {
    seats
        .iter()
        .filter_map(|seat| {
            seat.booking_for(date).map(|entry| RosterRow {
                seat_id: seat.seat_id.clone(),
                name: entry.name.clone(),
                email: entry.email.clone(),
                phone: entry.phone.clone(),
                date,
            })
        })
        .collect()
}

// One intent per booking plus one aggregate roster; every failure is
// logged on its own and never stops the remaining sends.
async fn dispatch_roster(notifier: &dyn Notifier, event: &Event, rows: &[RosterRow]) {
    for row in rows {
        if let Err(e) = notifier
            .notify_booking_confirmed(
                &row.email,
                std::slice::from_ref(&row.seat_id),
                &row.name,
                row.date,
            )
            .await
        {
            warn!(
                "Closing notification for {} (seat {}) failed: {}",
                row.email, row.seat_id, e
            );
        }
    }

    if let Err(e) = notifier.notify_roster_ready(event, rows).await {
        warn!("Roster notification for event {} failed: {}", event.id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookingEntry;
    use sqlx::types::Json;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn seat(seat_id: &str, bookings: Vec<BookingEntry>) -> Seat {
        Seat {
            event_id: 1,
            seat_id: seat_id.to_string(),
            price: 1500.0,
            bookings: Json(bookings),
        }
    }

    #[test]
    fn roster_contains_only_entries_for_the_given_date() {
        let d = date("2025-06-01");
        let other = date("2025-07-01");
        let seats = vec![
            seat(
                "A1",
                vec![BookingEntry::booked(d, "Asha".into(), "a@x.com".into(), None)],
            ),
            seat("A2", vec![]),
            seat(
                "A3",
                vec![BookingEntry::booked(other, "Ravi".into(), "r@x.com".into(), None)],
            ),
            seat(
                "B1",
                vec![BookingEntry::booked(
                    d,
                    "Mira".into(),
                    "m@x.com".into(),
                    Some("+77010000000".into()),
                )],
            ),
        ];

        let rows = roster_rows(&seats, d);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].seat_id, "A1");
        assert_eq!(rows[0].email, "a@x.com");
        assert_eq!(rows[1].seat_id, "B1");
        assert_eq!(rows[1].phone.as_deref(), Some("+77010000000"));
    }

    #[test]
    fn empty_inventory_yields_an_empty_roster() {
        assert!(roster_rows(&[], date("2025-06-01")).is_empty());
    }
}
