use chrono::NaiveDate;
use redis::AsyncCommands;
use tracing::info;

use crate::models::{Event, Seat};
use crate::redis_client::RedisClient;

const UPCOMING_TTL_SECS: u64 = 300;
const SEATS_TTL_SECS: u64 = 3600;

/// Read-path cache over Redis. Strictly best-effort: every failure
/// degrades to a database read, and writers invalidate after commit.
#[derive(Clone)]
pub struct CacheService {
    redis: RedisClient,
}

impl CacheService {
    pub fn new(redis: RedisClient) -> Self {
        Self { redis }
    }

    pub async fn healthy(&self) -> bool {
        self.redis.ping().await
    }

    // the upcoming listing shifts at midnight, so the key carries the day
    fn upcoming_key(today: NaiveDate) -> String {
        format!("events:upcoming:{today}")
    }

    fn seats_key(event_id: i64) -> String {
        format!("seats:{event_id}")
    }

    pub async fn get_upcoming_events(&self, today: NaiveDate) -> Option<Vec<Event>> {
        let mut conn = self.redis.conn.clone();
        let data: String = conn.get(Self::upcoming_key(today)).await.ok()?;
        serde_json::from_str(&data).ok()
    }

    pub async fn save_upcoming_events(&self, today: NaiveDate, events: &[Event]) {
        if let Ok(data) = serde_json::to_string(events) {
            let mut conn = self.redis.conn.clone();
            let _: Result<(), _> = conn
                .set_ex(Self::upcoming_key(today), data, UPCOMING_TTL_SECS)
                .await;
        }
    }

    pub async fn invalidate_events(&self) {
        let mut conn = self.redis.conn.clone();
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg("events:upcoming:*")
            .query_async(&mut conn)
            .await
            .unwrap_or_default();
        if !keys.is_empty() {
            let mut pipe = redis::pipe();
            for key in &keys {
                pipe.del(key);
            }
            let _: Result<(), _> = pipe.query_async(&mut conn).await;
        }
        info!("Invalidated upcoming events cache");
    }

    pub async fn get_seats(&self, event_id: i64) -> Option<Vec<Seat>> {
        let mut conn = self.redis.conn.clone();
        let data: String = conn.get(Self::seats_key(event_id)).await.ok()?;
        serde_json::from_str(&data).ok()
    }

    pub async fn save_seats(&self, event_id: i64, seats: &[Seat]) {
        if let Ok(data) = serde_json::to_string(seats) {
            let mut conn = self.redis.conn.clone();
            let _: Result<(), _> = conn
                .set_ex(Self::seats_key(event_id), data, SEATS_TTL_SECS)
                .await;
        }
    }

    pub async fn invalidate_seats(&self, event_id: i64) {
        let mut conn = self.redis.conn.clone();
        let _: Result<(), _> = conn.del(Self::seats_key(event_id)).await;
        info!("Invalidated seats cache for event {}", event_id);
    }
}
