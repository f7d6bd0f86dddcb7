use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One scheduled occurrence. `event_date` is unique across all events,
/// `registration_closed` only ever transitions false -> true.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub event_date: NaiveDate,
    pub capacity: i32,
    pub registration_closed: bool,
    pub created_at: NaiveDateTime,
}

impl Event {
    pub fn is_upcoming(&self, today: NaiveDate) -> bool {
        self.event_date > today && !self.registration_closed
    }
}
