use sqlx::{Postgres, Transaction};
use tracing::info;

use crate::error::CoreError;

pub const ROW_LETTERS: u32 = 26;
pub const ROW_WIDTH: u32 = 10;
pub const MAX_CAPACITY: i32 = (ROW_LETTERS * ROW_WIDTH) as i32;

/// Deterministic seat-id sequence for a capacity: rows A..Z, columns 1..10,
/// row-major, stopping at capacity. Capacity above 260 is not representable
/// and is clamped; `registry::create_event` rejects it before we get here.
pub fn seat_grid(capacity: i32) -> Vec<String> {
    let take = capacity.clamp(0, MAX_CAPACITY) as usize;
    ('A'..='Z')
        .flat_map(|row| (1..=ROW_WIDTH).map(move |col| format!("{row}{col}")))
        .take(take)
        .collect()
}

/// Populate inventory for an event inside the caller's transaction.
///
/// Idempotent: when the event already holds at least `capacity` seats this
/// is a no-op. Below capacity the existing seats are cleared and the full
/// deterministic set is regenerated, which destroys any ledger entries on
/// them; callers must not invoke this once a booking exists.
pub async fn ensure_seats(
    tx: &mut Transaction<'_, Postgres>,
    event_id: i64,
    capacity: i32,
    seat_price: f64,
) -> Result<u64, CoreError> {
    let existing: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM seats WHERE event_id = $1")
            .bind(event_id)
            .fetch_one(&mut **tx)
            .await?;

    if existing >= capacity as i64 {
        return Ok(0);
    }

    sqlx::query("DELETE FROM seats WHERE event_id = $1")
        .bind(event_id)
        .execute(&mut **tx)
        .await?;

    let seat_ids = seat_grid(capacity);
    let inserted = sqlx::query(
        r#"
        INSERT INTO seats (event_id, seat_id, price, bookings)
        SELECT $1, sid, $3, '[]'::jsonb
        FROM UNNEST($2::text[]) AS sid
        "#,
    )
    .bind(event_id)
    .bind(&seat_ids)
    .bind(seat_price)
    .execute(&mut **tx)
    .await?
    .rows_affected();

    info!("Initialized {} seats for event {}", inserted, event_id);
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn capacity_15_fills_row_a_and_half_of_b() {
        let ids = seat_grid(15);
        assert_eq!(ids.len(), 15);
        assert_eq!(ids[0], "A1");
        assert_eq!(ids[9], "A10");
        assert_eq!(ids[10], "B1");
        assert_eq!(ids[14], "B5");
    }

    #[test]
    fn capacity_30_fills_three_rows() {
        let ids = seat_grid(30);
        assert_eq!(ids.first().map(String::as_str), Some("A1"));
        assert_eq!(ids[19], "B10");
        assert_eq!(ids[20], "C1");
        assert_eq!(ids.last().map(String::as_str), Some("C10"));
    }

    #[test]
    fn capacity_is_capped_at_the_grid_size() {
        assert_eq!(seat_grid(260).len(), 260);
        assert_eq!(seat_grid(500).len(), 260);
        assert_eq!(seat_grid(260).last().map(String::as_str), Some("Z10"));
    }

    #[test]
    fn zero_and_negative_capacity_yield_no_seats() {
        assert!(seat_grid(0).is_empty());
        assert!(seat_grid(-5).is_empty());
    }

    proptest! {
        #[test]
        fn grid_is_exact_unique_and_row_major(capacity in 1i32..=260) {
            let ids = seat_grid(capacity);
            prop_assert_eq!(ids.len(), capacity as usize);

            let unique: HashSet<&String> = ids.iter().collect();
            prop_assert_eq!(unique.len(), ids.len());

            for (i, id) in ids.iter().enumerate() {
                let row = (b'A' + (i / 10) as u8) as char;
                let col = (i % 10) + 1;
                prop_assert_eq!(id.clone(), format!("{row}{col}"));
            }
        }
    }
}
