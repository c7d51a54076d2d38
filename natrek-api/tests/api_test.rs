use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};
use uuid::Uuid;

use natrek_api::middleware::rate_limit::RateLimiter;
use natrek_api::{app, AppState, AuthConfig};
use natrek_booking::BookingService;
use natrek_core::pricing::BusinessRules;
use natrek_core::tour::{PricingTier, Tour};
use natrek_store::MemoryStore;

fn admin_header() -> HeaderName {
    HeaderName::from_static("x-admin-secret-key")
}

fn admin_secret() -> HeaderValue {
    HeaderValue::from_static("test-secret")
}

async fn server_with_tour(max_requests: u32) -> (TestServer, Tour) {
    let store = MemoryStore::new();
    let bookings = BookingService::new(Arc::new(store), BusinessRules::default());

    let tour = Tour::new(
        "Rio Claro".to_string(),
        "Day trip".to_string(),
        vec![PricingTier { min_pax: 1, max_pax: 10, price_cop: 100_000, price_usd: 25 }],
    );
    bookings.create_tour(&tour).await.unwrap();

    let state = AppState {
        bookings,
        auth: AuthConfig { admin_secret_key: "test-secret".to_string() },
        rate_limiter: RateLimiter::new(max_requests, 60),
    };
    (TestServer::new(app(state)).unwrap(), tour)
}

fn booking_payload(tour_id: Uuid, date: &str, pax: i32) -> Value {
    json!({
        "tour_id": tour_id,
        "date": date,
        "pax": pax,
        "customer": {
            "name": "Luisa Gomez",
            "email": "luisa@example.com",
            "phone": "+57 301 555 0000",
            "document": "CC 1234"
        }
    })
}

#[tokio::test]
async fn test_create_booking_and_public_view_hides_customer() {
    let (server, tour) = server_with_tour(0).await;

    let created = server
        .post("/public/bookings/join")
        .json(&booking_payload(tour.id, "2025-12-31", 2))
        .await;
    created.assert_status(StatusCode::CREATED);
    let body: Value = created.json();
    assert_eq!(body["status"], "PENDING");
    let booking_id = body["booking_id"].as_str().unwrap().to_string();

    let view = server.get(&format!("/public/bookings/{booking_id}")).await;
    view.assert_status_ok();
    let body: Value = view.json();
    assert_eq!(body["status"], "PENDING");
    // no customer identity on the public surface
    assert!(body.get("customer").is_none());
    let rendered = body.to_string();
    assert!(!rendered.contains("luisa@example.com"));
    assert!(!rendered.contains("Luisa"));
}

#[tokio::test]
async fn test_payment_init_returns_deposit_and_tax() {
    let (server, tour) = server_with_tour(0).await;

    let created = server
        .post("/public/bookings/private")
        .json(&booking_payload(tour.id, "2025-12-31", 1))
        .await;
    created.assert_status(StatusCode::CREATED);
    let booking_id = created.json::<Value>()["booking_id"].clone();

    let init = server
        .post("/public/payments/init")
        .json(&json!({ "booking_id": booking_id }))
        .await;
    init.assert_status_ok();
    let body: Value = init.json();
    // 100 000 per person, 30% deposit, 5% tax on the deposit
    assert_eq!(body["amount"], 30_000);
    assert_eq!(body["tax"], 1_500);
    assert_eq!(body["total_due"], 31_500);
    assert!(body["reference"].as_str().unwrap().starts_with("NTK-"));
}

#[tokio::test]
async fn test_duplicate_webhook_applies_once() {
    let (server, tour) = server_with_tour(0).await;

    let created = server
        .post("/public/bookings/private")
        .json(&booking_payload(tour.id, "2025-12-31", 1))
        .await;
    let booking_id = created.json::<Value>()["booking_id"].clone();

    let init = server
        .post("/public/payments/init")
        .json(&json!({ "booking_id": booking_id }))
        .await;
    let init_body: Value = init.json();

    let webhook = json!({
        "payment_status": "APPROVED",
        "reference": init_body["reference"],
        "tx_id": "tx-001",
        "amount": init_body["total_due"],
        "currency": "COP"
    });

    let first = server.post("/public/payments/webhook").json(&webhook).await;
    first.assert_status_ok();
    assert_eq!(first.json::<Value>()["result"], "applied");

    let second = server.post("/public/payments/webhook").json(&webhook).await;
    second.assert_status_ok();
    assert_eq!(second.json::<Value>()["result"], "duplicate");

    let view = server
        .get(&format!("/public/bookings/{}", booking_id.as_str().unwrap()))
        .await;
    assert_eq!(view.json::<Value>()["status"], "PAID");
}

#[tokio::test]
async fn test_admin_move_relocates_booking_and_occupancy() {
    let (server, tour) = server_with_tour(0).await;

    let created = server
        .post("/public/bookings/private")
        .json(&booking_payload(tour.id, "2025-12-31", 3))
        .await;
    let body: Value = created.json();
    let booking_id = body["booking_id"].as_str().unwrap().to_string();
    let source_event = body["event_id"].as_str().unwrap().to_string();

    let moved = server
        .post(&format!("/admin/bookings/{booking_id}/move"))
        .add_header(admin_header(), admin_secret())
        .json(&json!({ "new_date": "2026-01-15", "reason": "river too high" }))
        .await;
    moved.assert_status_ok();
    let moved_body: Value = moved.json();
    let dest_event = moved_body["event_id"].as_str().unwrap().to_string();
    assert_ne!(dest_event, source_event);
    assert_eq!(moved_body["previous_states"][0]["change_type"], "MOVE");

    let departures = server
        .get("/admin/departures")
        .add_header(admin_header(), admin_secret())
        .await;
    departures.assert_status_ok();
    let events: Value = departures.json();
    for event in events.as_array().unwrap() {
        let id = event["id"].as_str().unwrap();
        if id == source_event {
            assert_eq!(event["occupied"], 0);
        } else if id == dest_event {
            assert_eq!(event["occupied"], 3);
        }
    }
}

#[tokio::test]
async fn test_admin_routes_require_secret_key() {
    let (server, _tour) = server_with_tour(0).await;

    let denied = server.get("/admin/bookings").await;
    denied.assert_status(StatusCode::UNAUTHORIZED);

    let wrong = server
        .get("/admin/bookings")
        .add_header(admin_header(), HeaderValue::from_static("nope"))
        .await;
    wrong.assert_status(StatusCode::UNAUTHORIZED);

    let allowed = server
        .get("/admin/bookings")
        .add_header(admin_header(), admin_secret())
        .await;
    allowed.assert_status_ok();
}

#[tokio::test]
async fn test_booking_creation_is_rate_limited() {
    let (server, tour) = server_with_tour(2).await;

    for day in 1..=2 {
        let ok = server
            .post("/public/bookings/private")
            .json(&booking_payload(tour.id, &format!("2025-12-0{day}"), 1))
            .await;
        ok.assert_status(StatusCode::CREATED);
    }

    let limited = server
        .post("/public/bookings/private")
        .json(&booking_payload(tour.id, "2025-12-03", 1))
        .await;
    limited.assert_status(StatusCode::TOO_MANY_REQUESTS);

    // reads are not throttled
    let health = server.get("/health").await;
    health.assert_status_ok();
}

#[tokio::test]
async fn test_invalid_date_and_unknown_booking() {
    let (server, tour) = server_with_tour(0).await;

    let bad_date = server
        .post("/public/bookings/join")
        .json(&booking_payload(tour.id, "2025-02-30", 2))
        .await;
    bad_date.assert_status(StatusCode::BAD_REQUEST);

    let missing = server
        .get(&format!("/public/bookings/{}", Uuid::new_v4()))
        .await;
    missing.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_overbooked_departure_returns_conflict() {
    let (server, tour) = server_with_tour(0).await;

    let create = server
        .post("/admin/departures")
        .add_header(admin_header(), admin_secret())
        .json(&json!({ "tour_id": tour.id, "date": "2026-03-01", "capacity": 2 }))
        .await;
    create.assert_status(StatusCode::CREATED);

    let fits = server
        .post("/public/bookings/join")
        .json(&booking_payload(tour.id, "2026-03-01", 2))
        .await;
    fits.assert_status(StatusCode::CREATED);

    let overflow = server
        .post("/public/bookings/join")
        .json(&booking_payload(tour.id, "2026-03-01", 1))
        .await;
    overflow.assert_status(StatusCode::CONFLICT);
}
