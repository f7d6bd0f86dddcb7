//! The transactional booking core.
//!
//! A batch either commits as a whole or leaves no trace. Shape checks run
//! before any I/O; everything that depends on current state (event window,
//! seat existence, ledger conflicts) is re-checked inside one transaction
//! that locks the referenced seat rows, so two overlapping batches for the
//! same date serialize on their common seats.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use tracing::warn;
use validator::ValidateEmail;

use crate::error::CoreError;
use crate::middleware::Requester;
use crate::models::{seat::BookingEntry, Event, Seat};
use crate::services::notifier::Notifier;
use crate::AppState;

/// One entry of a caller-submitted booking batch.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatRequest {
    pub seat_id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub date: NaiveDate,
}

/// A durably recorded booking, reported back to the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommittedBooking {
    pub seat_id: String,
    pub name: String,
    pub email: String,
    pub date: NaiveDate,
}

/// Book a batch of seats for one event, all-or-nothing.
///
/// Transient store conflicts (serialization failure, deadlock) retry the
/// whole transaction up to `booking.max_txn_retries` times; business-rule
/// conflicts are reported immediately. Confirmations go out only after the
/// commit and never affect the result.
pub async fn book(
    state: &AppState,
    event_id: i64,
    batch: Vec<SeatRequest>,
    requester: &Requester,
    today: NaiveDate,
) -> Result<Vec<CommittedBooking>, CoreError> {
    validate_batch_shape(&batch)?;
    check_batch_duplicates(&batch)?;

    let mut attempts = 0;
    let committed = loop {
        match try_book_once(&state.db.pool, event_id, &batch, requester, today).await {
            Ok(committed) => break committed,
            Err(CoreError::Internal(err))
                if is_transient_conflict(&err) && attempts < state.config.booking.max_txn_retries =>
            {
                attempts += 1;
                warn!(
                    "Booking transaction for event {} hit a transient conflict, retry {}/{}",
                    event_id, attempts, state.config.booking.max_txn_retries
                );
            }
            Err(e) => return Err(e),
        }
    };

    state.cache.invalidate_seats(event_id).await;

    dispatch_confirmations(state.notifier.as_ref(), &committed).await;

    Ok(committed)
}

/// One attempt: validate against current state and commit inside a single
/// transaction. Seat rows are locked in seat-id order so overlapping
/// batches acquire their common locks in the same sequence.
async fn try_book_once(
    pool: &PgPool,
    event_id: i64,
    batch: &[SeatRequest],
    requester: &Requester,
    today: NaiveDate,
) -> Result<Vec<CommittedBooking>, CoreError> {
    let mut tx = pool.begin().await?;

    let event: Option<Event> = sqlx::query_as(
        "SELECT id, title, event_date, capacity, registration_closed, created_at
         FROM events WHERE id = $1",
    )
    .bind(event_id)
    .fetch_optional(&mut *tx)
    .await?;

    let event = event.ok_or_else(|| CoreError::not_found(format!("event {event_id} not found")))?;

    validate_booking_window(&event, batch, requester, today)?;

    let mut requested_ids: Vec<String> = batch.iter().map(|r| r.seat_id.clone()).collect();
    requested_ids.sort();

    let mut seats: Vec<Seat> = sqlx::query_as(
        "SELECT event_id, seat_id, price, bookings
         FROM seats
         WHERE event_id = $1 AND seat_id = ANY($2)
         ORDER BY seat_id
         FOR UPDATE",
    )
    .bind(event_id)
    .bind(&requested_ids)
    .fetch_all(&mut *tx)
    .await?;

    validate_against_ledger(&event, &seats, &requested_ids)?;

    let mut committed = Vec::with_capacity(batch.len());
    for request in batch {
        let seat = seats
            .iter_mut()
            .find(|s| s.seat_id == request.seat_id)
            .expect("locked seat set covers every batch entry");

        seat.bookings.push(BookingEntry::booked(
            event.event_date,
            request.name.clone(),
            request.email.clone(),
            request.phone.clone(),
        ));

        sqlx::query("UPDATE seats SET bookings = $1 WHERE event_id = $2 AND seat_id = $3")
            .bind(&seat.bookings)
            .bind(event_id)
            .bind(&seat.seat_id)
            .execute(&mut *tx)
            .await?;

        committed.push(CommittedBooking {
            seat_id: request.seat_id.clone(),
            name: request.name.clone(),
            email: request.email.clone(),
            date: event.event_date,
        });
    }

    tx.commit().await?;
    Ok(committed)
}

/* ---------- validation ---------- */

/// Seat ids are a row letter plus a 1..=26 column suffix.
pub fn valid_seat_id(id: &str) -> bool {
    let mut chars = id.chars();
    match chars.next() {
        Some(c) if c.is_ascii_uppercase() => {}
        _ => return false,
    }
    let digits = chars.as_str();
    if digits.is_empty() || digits.len() > 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    matches!(digits.parse::<u32>(), Ok(n) if (1..=26).contains(&n))
}

fn validate_batch_shape(batch: &[SeatRequest]) -> Result<(), CoreError> {
    if batch.is_empty() {
        return Err(CoreError::invalid("booking batch must not be empty"));
    }
    for request in batch {
        if !valid_seat_id(&request.seat_id) {
            return Err(CoreError::invalid(format!(
                "invalid seat id '{}'",
                request.seat_id
            )));
        }
        if request.name.trim().is_empty() {
            return Err(CoreError::invalid(format!(
                "occupant name is required for seat {}",
                request.seat_id
            )));
        }
        if !request.email.validate_email() {
            return Err(CoreError::invalid(format!(
                "invalid occupant email for seat {}",
                request.seat_id
            )));
        }
    }
    Ok(())
}

fn check_batch_duplicates(batch: &[SeatRequest]) -> Result<(), CoreError> {
    let mut seen = HashSet::new();
    for request in batch {
        if !seen.insert(request.seat_id.as_str()) {
            return Err(CoreError::conflict(format!(
                "seat {} appears more than once in the batch",
                request.seat_id
            )));
        }
    }
    Ok(())
}

fn validate_booking_window(
    event: &Event,
    batch: &[SeatRequest],
    requester: &Requester,
    today: NaiveDate,
) -> Result<(), CoreError> {
    if event.registration_closed && !requester.is_admin {
        return Err(CoreError::conflict(format!(
            "registration for event {} is closed",
            event.id
        )));
    }
    for request in batch {
        if request.date != event.event_date {
            return Err(CoreError::invalid(format!(
                "booking date {} for seat {} does not match event date {}",
                request.date, request.seat_id, event.event_date
            )));
        }
    }
    if event.event_date == today {
        return Err(CoreError::invalid(
            "same-day booking is not allowed".to_string(),
        ));
    }
    Ok(())
}

/// `seats` is the locked row set, `requested_ids` the sorted batch ids.
fn validate_against_ledger(
    event: &Event,
    seats: &[Seat],
    requested_ids: &[String],
) -> Result<(), CoreError> {
    if seats.len() != requested_ids.len() {
        let found: HashSet<&str> = seats.iter().map(|s| s.seat_id.as_str()).collect();
        let missing: Vec<&str> = requested_ids
            .iter()
            .map(String::as_str)
            .filter(|id| !found.contains(id))
            .collect();
        return Err(CoreError::not_found(format!(
            "seats not found for event {}: {}",
            event.id,
            missing.join(", ")
        )));
    }
    for seat in seats {
        if seat.is_booked_for(event.event_date) {
            return Err(CoreError::conflict(format!(
                "seat {} is already booked for {}",
                seat.seat_id, event.event_date
            )));
        }
    }
    Ok(())
}

fn is_transient_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            matches!(db.code().as_deref(), Some("40001") | Some("40P01"))
        }
        _ => false,
    }
}

/* ---------- post-commit fan-out ---------- */

struct ConfirmationGroup {
    email: String,
    name: String,
    date: NaiveDate,
    seat_ids: Vec<String>,
}

fn group_by_email(committed: &[CommittedBooking]) -> Vec<ConfirmationGroup> {
    let mut groups: Vec<ConfirmationGroup> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for booking in committed {
        match index.get(booking.email.as_str()) {
            Some(&i) => groups[i].seat_ids.push(booking.seat_id.clone()),
            None => {
                index.insert(booking.email.as_str(), groups.len());
                groups.push(ConfirmationGroup {
                    email: booking.email.clone(),
                    name: booking.name.clone(),
                    date: booking.date,
                    seat_ids: vec![booking.seat_id.clone()],
                });
            }
        }
    }
    groups
}

async fn dispatch_confirmations(notifier: &dyn Notifier, committed: &[CommittedBooking]) {
    let sends = group_by_email(committed).into_iter().map(|group| async move {
        if let Err(e) = notifier
            .notify_booking_confirmed(&group.email, &group.seat_ids, &group.name, group.date)
            .await
        {
            warn!("Booking confirmation for {} failed: {}", group.email, e);
        }
    });
    futures::future::join_all(sends).await;
}
