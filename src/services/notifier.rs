//! Service layer for the downstream notification gateway.
//!
//! The reservation core hands confirmed bookings and closing rosters to an
//! external gateway and never waits on delivery. All network calls go
//! through a circuit breaker so a dead gateway cannot stall booking
//! traffic: failures are counted, the circuit opens past a threshold and
//! lets a single probe through after a timeout.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{CircuitBreakerConfig, NotifierConfig};
use crate::models::Event;

/// Circuit breaker states.
#[derive(Debug, Clone, PartialEq)]
pub enum CircuitState {
    /// Normal operation, requests allowed.
    Closed,
    /// Blocking requests after repeated failures.
    Open,
    /// One probe request allowed after the open timeout elapsed.
    HalfOpen,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    state: std::sync::RwLock<CircuitState>,
    failure_count: AtomicU32,
    last_failure_time: AtomicU64,
    failure_threshold: u32,
    timeout_duration: Duration,
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, timeout_seconds: u64) -> Self {
        Self {
            state: std::sync::RwLock::new(CircuitState::Closed),
            failure_count: AtomicU32::new(0),
            last_failure_time: AtomicU64::new(0),
            failure_threshold,
            timeout_duration: Duration::from_secs(timeout_seconds),
        }
    }

    pub fn can_execute(&self) -> bool {
        let state = self.state.read().unwrap();

        match *state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let now = epoch_secs();
                let last_failure = self.last_failure_time.load(Ordering::Relaxed);

                if now.saturating_sub(last_failure) >= self.timeout_duration.as_secs() {
                    drop(state);
                    *self.state.write().unwrap() = CircuitState::HalfOpen;
                    info!("Circuit breaker transitioning to HalfOpen state");
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => true,
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.write().unwrap();

        match *state {
            CircuitState::HalfOpen => {
                *state = CircuitState::Closed;
                self.failure_count.store(0, Ordering::Relaxed);
                info!("Circuit breaker recovered - transitioning to Closed state");
            }
            CircuitState::Closed => {
                self.failure_count.store(0, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    pub fn record_failure(&self) {
        let failure_count = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
        self.last_failure_time.store(epoch_secs(), Ordering::Relaxed);

        let mut state = self.state.write().unwrap();

        match *state {
            CircuitState::Closed => {
                if failure_count >= self.failure_threshold {
                    *state = CircuitState::Open;
                    error!(
                        "Circuit breaker OPENED - {} failures reached threshold {}",
                        failure_count, self.failure_threshold
                    );
                }
            }
            CircuitState::HalfOpen => {
                *state = CircuitState::Open;
                warn!("Circuit breaker test failed - returning to Open state");
            }
            _ => {}
        }
    }

    pub fn get_state(&self) -> CircuitState {
        self.state.read().unwrap().clone()
    }
}

/// Errors surfaced by the notifier gateway client.
#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error("circuit breaker is open - notification gateway temporarily unavailable")]
    Open,
    #[error("notification gateway error: {0}")]
    Gateway(#[from] reqwest::Error),
    #[error("notification gateway rejected the intent: {0}")]
    Rejected(String),
}

/// One flattened ledger row, as handed to the gateway in a closing roster.
#[derive(Debug, Clone, Serialize)]
pub struct RosterRow {
    #[serde(rename = "seatId")]
    pub seat_id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub date: NaiveDate,
}

#[derive(Debug, Serialize)]
struct BookingConfirmedRequest {
    #[serde(rename = "serviceId")]
    service_id: String,
    token: String,
    #[serde(rename = "intentId")]
    intent_id: String,
    email: String,
    #[serde(rename = "occupantName")]
    occupant_name: String,
    #[serde(rename = "seatIds")]
    seat_ids: Vec<String>,
    date: NaiveDate,
}

#[derive(Debug, Serialize)]
struct RosterReadyRequest {
    #[serde(rename = "serviceId")]
    service_id: String,
    token: String,
    #[serde(rename = "intentId")]
    intent_id: String,
    #[serde(rename = "eventId")]
    event_id: i64,
    #[serde(rename = "eventTitle")]
    event_title: String,
    date: NaiveDate,
    rows: Vec<RosterRow>,
}

#[derive(Debug, Deserialize)]
struct GatewayResponse {
    success: bool,
    message: Option<String>,
}

/// Gateway abstraction consumed by the reservation engine and the
/// lifecycle controller. Both treat every call as fire-and-forget.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_booking_confirmed(
        &self,
        email: &str,
        seat_ids: &[String],
        occupant_name: &str,
        date: NaiveDate,
    ) -> Result<(), NotifierError>;

    async fn notify_roster_ready(
        &self,
        event: &Event,
        rows: &[RosterRow],
    ) -> Result<(), NotifierError>;
}

/// HTTP client for the notification gateway API.
#[derive(Clone)]
pub struct NotifierClient {
    service_id: String,
    secret: String,
    base_url: String,
    http_client: reqwest::Client,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl NotifierClient {
    pub fn from_config(config: &NotifierConfig, breaker: &CircuitBreakerConfig) -> Self {
        let circuit_breaker = Arc::new(CircuitBreaker::new(
            breaker.failure_threshold,
            breaker.timeout_seconds,
        ));

        Self {
            service_id: config.service_id.clone(),
            secret: config.service_secret.clone(),
            base_url: config.gateway_url.clone(),
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_seconds))
                .build()
                .expect("Failed to create HTTP client"),
            circuit_breaker,
        }
    }

    async fn execute_with_circuit_breaker<F>(&self, operation: F) -> Result<GatewayResponse, NotifierError>
    where
        F: std::future::Future<Output = Result<GatewayResponse, reqwest::Error>>,
    {
        if !self.circuit_breaker.can_execute() {
            warn!("Circuit breaker is OPEN - blocking notification gateway request");
            return Err(NotifierError::Open);
        }

        match operation.await {
            Ok(result) => {
                self.circuit_breaker.record_success();
                Ok(result)
            }
            Err(e) => {
                error!("Notification gateway request failed: {:?}", e);
                self.circuit_breaker.record_failure();
                Err(NotifierError::Gateway(e))
            }
        }
    }

    /// Request token per the gateway contract: hex sha256 over the intent
    /// id, the service id and the shared secret.
    fn generate_token(&self, intent_id: &str) -> String {
        let token_string = format!("{}{}{}", intent_id, self.service_id, self.secret);
        let mut hasher = Sha256::new();
        hasher.update(token_string.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn check_accepted(response: GatewayResponse) -> Result<(), NotifierError> {
        if response.success {
            Ok(())
        } else {
            Err(NotifierError::Rejected(
                response.message.unwrap_or_else(|| "no reason given".to_string()),
            ))
        }
    }
}

#[async_trait]
impl Notifier for NotifierClient {
    async fn notify_booking_confirmed(
        &self,
        email: &str,
        seat_ids: &[String],
        occupant_name: &str,
        date: NaiveDate,
    ) -> Result<(), NotifierError> {
        let intent_id = Uuid::new_v4().to_string();
        let request = BookingConfirmedRequest {
            service_id: self.service_id.clone(),
            token: self.generate_token(&intent_id),
            intent_id,
            email: email.to_string(),
            occupant_name: occupant_name.to_string(),
            seat_ids: seat_ids.to_vec(),
            date,
        };

        info!(
            "Dispatching booking confirmation: email={}, seats={}",
            email,
            seat_ids.len()
        );

        let operation = async {
            self.http_client
                .post(format!("{}/notifications/booking-confirmed", self.base_url))
                .json(&request)
                .send()
                .await?
                .json::<GatewayResponse>()
                .await
        };

        let response = self.execute_with_circuit_breaker(operation).await?;
        Self::check_accepted(response)
    }

    async fn notify_roster_ready(
        &self,
        event: &Event,
        rows: &[RosterRow],
    ) -> Result<(), NotifierError> {
        let intent_id = Uuid::new_v4().to_string();
        let request = RosterReadyRequest {
            service_id: self.service_id.clone(),
            token: self.generate_token(&intent_id),
            intent_id,
            event_id: event.id,
            event_title: event.title.clone(),
            date: event.event_date,
            rows: rows.to_vec(),
        };

        info!(
            "Dispatching roster for event {} ({} bookings)",
            event.id,
            rows.len()
        );

        let operation = async {
            self.http_client
                .post(format!("{}/notifications/roster-ready", self.base_url))
                .json(&request)
                .send()
                .await?
                .json::<GatewayResponse>()
                .await
        };

        let response = self.execute_with_circuit_breaker(operation).await?;
        Self::check_accepted(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breaker_opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new(3, 60);
        assert_eq!(breaker.get_state(), CircuitState::Closed);

        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.get_state(), CircuitState::Closed);

        breaker.record_failure();
        assert_eq!(breaker.get_state(), CircuitState::Open);
        assert!(!breaker.can_execute());
    }

    #[test]
    fn breaker_reopens_when_half_open_probe_fails() {
        let breaker = CircuitBreaker::new(1, 0);
        breaker.record_failure();
        assert_eq!(breaker.get_state(), CircuitState::Open);

        // zero timeout: next check flips to HalfOpen and admits a probe
        assert!(breaker.can_execute());
        assert_eq!(breaker.get_state(), CircuitState::HalfOpen);

        breaker.record_failure();
        assert_eq!(breaker.get_state(), CircuitState::Open);
    }

    #[test]
    fn breaker_closes_after_successful_probe() {
        let breaker = CircuitBreaker::new(1, 0);
        breaker.record_failure();
        assert!(breaker.can_execute());
        breaker.record_success();
        assert_eq!(breaker.get_state(), CircuitState::Closed);
    }

    #[test]
    fn success_resets_failure_streak() {
        let breaker = CircuitBreaker::new(2, 60);
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        assert_eq!(breaker.get_state(), CircuitState::Closed);
    }
}
