use chrono::NaiveDate;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use reservation_system::config::{CircuitBreakerConfig, NotifierConfig};
use reservation_system::models::Event;
use reservation_system::services::notifier::{Notifier, NotifierClient, NotifierError, RosterRow};

fn client_for(server_uri: &str, failure_threshold: u32) -> NotifierClient {
    NotifierClient::from_config(
        &NotifierConfig {
            gateway_url: format!("{server_uri}/api/v1"),
            service_id: "reservation-core".to_string(),
            service_secret: "test-secret".to_string(),
            timeout_seconds: 5,
        },
        &CircuitBreakerConfig {
            failure_threshold,
            timeout_seconds: 60,
        },
    )
}

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn sample_event() -> Event {
    let d = date("2025-06-01");
    Event {
        id: 1,
        title: "Spring Gala".to_string(),
        event_date: d,
        capacity: 30,
        registration_closed: true,
        created_at: d.and_hms_opt(10, 0, 0).unwrap(),
    }
}

#[tokio::test]
async fn booking_confirmation_reaches_the_gateway() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/notifications/booking-confirmed"))
        .and(body_partial_json(json!({
            "serviceId": "reservation-core",
            "email": "a@x.com",
            "occupantName": "Asha",
            "seatIds": ["A1", "A2"],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), 5);
    let result = client
        .notify_booking_confirmed(
            "a@x.com",
            &["A1".to_string(), "A2".to_string()],
            "Asha",
            date("2025-06-01"),
        )
        .await;

    assert!(result.is_ok(), "unexpected error: {result:?}");
}

#[tokio::test]
async fn gateway_rejection_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/notifications/booking-confirmed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "unknown service",
        })))
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), 5);
    let err = client
        .notify_booking_confirmed("a@x.com", &["A1".to_string()], "Asha", date("2025-06-01"))
        .await
        .unwrap_err();

    match err {
        NotifierError::Rejected(msg) => assert!(msg.contains("unknown service")),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn roster_intent_carries_the_event() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/notifications/roster-ready"))
        .and(body_partial_json(json!({
            "eventId": 1,
            "eventTitle": "Spring Gala",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), 5);
    let event = sample_event();
    let rows = vec![RosterRow {
        seat_id: "A1".to_string(),
        name: "Asha".to_string(),
        email: "a@x.com".to_string(),
        phone: None,
        date: event.event_date,
    }];

    let result = client.notify_roster_ready(&event, &rows).await;
    assert!(result.is_ok(), "unexpected error: {result:?}");
}

#[tokio::test]
async fn circuit_opens_after_repeated_gateway_failures() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/notifications/booking-confirmed"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), 2);
    let seats = vec!["A1".to_string()];

    for _ in 0..2 {
        let err = client
            .notify_booking_confirmed("a@x.com", &seats, "Asha", date("2025-06-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, NotifierError::Gateway(_)));
    }

    // breaker is open now: the third call never reaches the server
    let err = client
        .notify_booking_confirmed("a@x.com", &seats, "Asha", date("2025-06-01"))
        .await
        .unwrap_err();
    assert!(matches!(err, NotifierError::Open));
}
