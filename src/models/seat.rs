use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

pub const BOOKING_STATUS_BOOKED: &str = "booked";

/// Inventory unit addressed by (event_id, seat_id). The booking ledger is
/// embedded as an append-only JSONB array keyed by date; at most one entry
/// may exist per date value.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Seat {
    pub event_id: i64,
    pub seat_id: String,
    pub price: f64,
    pub bookings: Json<Vec<BookingEntry>>,
}

/// One seat occupied by one person for one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingEntry {
    pub date: NaiveDate,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub status: String,
}

impl BookingEntry {
    pub fn booked(date: NaiveDate, name: String, email: String, phone: Option<String>) -> Self {
        Self {
            date,
            name,
            email,
            phone,
            status: BOOKING_STATUS_BOOKED.to_string(),
        }
    }
}

impl Seat {
    pub fn booking_for(&self, date: NaiveDate) -> Option<&BookingEntry> {
        self.bookings.iter().find(|b| b.date == date)
    }

    pub fn is_booked_for(&self, date: NaiveDate) -> bool {
        self.booking_for(date).is_some()
    }
}
