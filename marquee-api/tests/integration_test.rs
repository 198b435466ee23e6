use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use marquee_api::auth::issue_token;
use marquee_api::metrics::ApiMetrics;
use marquee_api::state::{AppState, AuthConfig};
use marquee_api::app;
use marquee_catalog::{InMemoryResourceCatalog, PricingEngine};
use marquee_core::reminder::InMemoryReminderStore;
use marquee_core::rewards::RewardPolicy;
use marquee_core::{ManualClock, PricingPolicy, Resource, ResourceCategory, SeatTier, TimeWindow};
use marquee_hold::{HoldManager, HoldPolicy, InMemoryHoldRepository};

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 1, hour, minute, 0).unwrap()
}

fn lot(id: &str) -> Resource {
    Resource {
        id: id.to_string(),
        name: format!("Lot {}", id),
        location: "North entrance".to_string(),
        category: ResourceCategory::Parking,
        showtime_id: None,
        tier: SeatTier::Standard,
        horizon: TimeWindow::new(at(0, 0), at(23, 0)).unwrap(),
        pricing: PricingPolicy::Hourly { base_cents: 200, hourly_cents: 200 },
    }
}

fn seat(id: &str, tier: SeatTier) -> Resource {
    Resource {
        id: id.to_string(),
        name: format!("Seat {}", id),
        location: "Screen 3".to_string(),
        category: ResourceCategory::Seat,
        showtime_id: None,
        tier,
        horizon: TimeWindow::new(at(19, 0), at(21, 30)).unwrap(),
        pricing: PricingPolicy::Flat { cents: 1450 },
    }
}

struct TestApp {
    router: Router,
    clock: ManualClock,
    auth: AuthConfig,
}

impl TestApp {
    fn new() -> Self {
        let clock = ManualClock::new(at(9, 0));
        let catalog = InMemoryResourceCatalog::with_resources(vec![
            lot("lot-1"),
            lot("lot-2"),
            seat("show-42:A1", SeatTier::Premium),
            seat("show-42:A2", SeatTier::Premium),
            seat("show-42:A3", SeatTier::Premium),
        ]);
        let manager = Arc::new(HoldManager::new(
            Arc::new(InMemoryHoldRepository::new()),
            Arc::new(catalog),
            PricingEngine::default(),
            Arc::new(clock.clone()),
            HoldPolicy::default(),
        ));
        let auth = AuthConfig {
            secret: "integration-secret".to_string(),
            expiration: 3600,
        };

        let state = AppState {
            manager,
            reminders: Arc::new(InMemoryReminderStore::new()),
            rate_limit: None,
            metrics: Arc::new(ApiMetrics::new().unwrap()),
            auth: auth.clone(),
            rewards: RewardPolicy::default(),
        };

        Self {
            router: app(state),
            clock,
            auth,
        }
    }

    fn customer(&self, sub: &str) -> String {
        issue_token(&self.auth, sub, "CUSTOMER").unwrap()
    }

    fn admin(&self) -> String {
        issue_token(&self.auth, "ops-1", "ADMIN").unwrap()
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, json)
    }

    async fn hold(&self, token: &str, resource_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> (StatusCode, Value) {
        self.send(
            "POST",
            "/v1/holds",
            Some(token),
            Some(json!({
                "resource_id": resource_id,
                "start_time": start,
                "end_time": end,
            })),
        )
        .await
    }
}

#[tokio::test]
async fn test_parking_lot_hold_conflict_and_release() {
    let app = TestApp::new();
    let alice = app.customer("guest-alice");
    let bob = app.customer("guest-bob");

    let (status, first) = app.hold(&alice, "lot-1", at(10, 0), at(13, 0)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["state"], "HELD");
    assert_eq!(first["price"], "8.00");
    assert_eq!(first["resourceName"], "Lot lot-1");

    let (status, body) = app.hold(&bob, "lot-1", at(12, 0), at(14, 0)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "RESOURCE_UNAVAILABLE");

    // Back-to-back windows do not overlap.
    let (status, _) = app.hold(&bob, "lot-1", at(13, 0), at(14, 0)).await;
    assert_eq!(status, StatusCode::CREATED);

    let id = first["reservationId"].as_str().unwrap();
    let (status, _) = app.send("POST", &format!("/v1/holds/{}/release", id), Some(&alice), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.hold(&bob, "lot-1", at(11, 0), at(12, 0)).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_confirm_keeps_terms_and_is_final() {
    let app = TestApp::new();
    let alice = app.customer("guest-alice");

    let (_, held) = app.hold(&alice, "lot-2", at(10, 0), at(13, 0)).await;
    let id = held["reservationId"].as_str().unwrap();

    let (status, confirmed) = app.send("POST", &format!("/v1/holds/{}/confirm", id), Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["state"], "CONFIRMED");
    assert_eq!(confirmed["priceCents"], held["priceCents"]);
    assert_eq!(confirmed["startTime"], held["startTime"]);
    assert_eq!(confirmed["endTime"], held["endTime"]);

    let (status, body) = app.send("POST", &format!("/v1/holds/{}/release", id), Some(&alice), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "HOLD_ALREADY_TERMINAL");

    // Confirmed holds never lapse.
    app.clock.advance(Duration::hours(2));
    let (status, body) = app.hold(&alice, "lot-2", at(12, 0), at(13, 0)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "RESOURCE_UNAVAILABLE");
}

#[tokio::test]
async fn test_confirm_after_expiry_is_gone() {
    let app = TestApp::new();
    let alice = app.customer("guest-alice");

    let (_, held) = app.hold(&alice, "lot-1", at(10, 0), at(13, 0)).await;
    let id = held["reservationId"].as_str().unwrap();

    app.clock.advance(Duration::minutes(16));

    let (status, body) = app.send("POST", &format!("/v1/holds/{}/confirm", id), Some(&alice), None).await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["code"], "HOLD_EXPIRED");

    // The lapsed hold no longer blocks anyone.
    let bob = app.customer("guest-bob");
    let (status, _) = app.hold(&bob, "lot-1", at(10, 0), at(13, 0)).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_foreign_hold_is_refused() {
    let app = TestApp::new();
    let alice = app.customer("guest-alice");
    let mallory = app.customer("guest-mallory");

    let (_, held) = app.hold(&alice, "lot-1", at(10, 0), at(13, 0)).await;
    let id = held["reservationId"].as_str().unwrap();

    for action in ["confirm", "release"] {
        let (status, body) = app
            .send("POST", &format!("/v1/holds/{}/{}", id, action), Some(&mallory), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "HOLD_NOT_OWNED");
    }

    let (status, body) = app.send("GET", &format!("/v1/holds/{}", id), Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "HELD");
}

#[tokio::test]
async fn test_get_hold_reports_countdown() {
    let app = TestApp::new();
    let alice = app.customer("guest-alice");

    let (_, held) = app.hold(&alice, "lot-1", at(10, 0), at(13, 0)).await;
    let id = held["reservationId"].as_str().unwrap();

    let (_, body) = app.send("GET", &format!("/v1/holds/{}", id), Some(&alice), None).await;
    assert_eq!(body["expiresIn"]["minutes"], 15);
    assert_eq!(body["expiresIn"]["display"], "15m 00s");

    app.clock.advance(Duration::seconds(14 * 60 + 48));
    let (_, body) = app.send("GET", &format!("/v1/holds/{}", id), Some(&alice), None).await;
    assert_eq!(body["expiresIn"]["display"], "12s");
    assert_eq!(body["expiresIn"]["expired"], false);

    app.clock.advance(Duration::seconds(12));
    let (_, body) = app.send("GET", &format!("/v1/holds/{}", id), Some(&alice), None).await;
    assert_eq!(body["state"], "EXPIRED");
    assert_eq!(body["expiresIn"]["expired"], true);

    let (status, body) = app
        .send("GET", &format!("/v1/holds/{}", uuid::Uuid::new_v4()), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "HOLD_NOT_FOUND");
}

#[tokio::test]
async fn test_window_validation() {
    let app = TestApp::new();
    let alice = app.customer("guest-alice");

    let (status, body) = app.hold(&alice, "lot-1", at(13, 0), at(13, 0)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INVALID_WINDOW");

    // Outside the showtime.
    let (status, body) = app.hold(&alice, "show-42:A1", at(18, 0), at(21, 30)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INVALID_WINDOW");

    let (status, body) = app.hold(&alice, "lot-404", at(10, 0), at(11, 0)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "RESOURCE_NOT_FOUND");
}

#[tokio::test]
async fn test_resource_listing_reflects_holds() {
    let app = TestApp::new();
    let alice = app.customer("guest-alice");
    app.hold(&alice, "lot-1", at(10, 0), at(13, 0)).await;

    let uri = format!(
        "/v1/resources?category=parking&start_time={}&end_time={}",
        "2026-05-01T11:00:00Z", "2026-05-01T12:00:00Z"
    );
    let (status, body) = app.send("GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);

    let listing = body.as_array().unwrap();
    assert_eq!(listing.len(), 2);
    assert_eq!(listing[0]["id"], "lot-1");
    assert_eq!(listing[0]["available"], false);
    assert_eq!(listing[1]["id"], "lot-2");
    assert_eq!(listing[1]["available"], true);
    assert_eq!(listing[1]["price"], "4.00");

    let (status, body) = app
        .send("GET", "/v1/resources?category=boat&start_time=2026-05-01T11:00:00Z&end_time=2026-05-01T12:00:00Z", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_authentication_and_roles() {
    let app = TestApp::new();

    let (status, body) = app.send("POST", "/auth/guest", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let guest_token = body["token"].as_str().unwrap().to_string();
    assert!(body["owner_ref"].as_str().unwrap().starts_with("guest-"));

    let (status, _) = app.send("GET", "/v1/reminders", Some(&guest_token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.send("GET", "/v1/reminders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _) = app.send("GET", "/v1/reminders", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.send("POST", "/v1/admin/holds/sweep", Some(&guest_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = app.admin();
    let (status, _) = app.hold(&admin, "lot-1", at(10, 0), at(11, 0)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_sweep_and_moderation_view() {
    let app = TestApp::new();
    let alice = app.customer("guest-alice");
    let admin = app.admin();

    app.hold(&alice, "lot-1", at(10, 0), at(11, 0)).await;
    let (_, kept) = app.hold(&alice, "lot-1", at(11, 0), at(12, 0)).await;
    let kept_id = kept["reservationId"].as_str().unwrap();
    app.send("POST", &format!("/v1/holds/{}/confirm", kept_id), Some(&alice), None).await;

    app.clock.advance(Duration::minutes(15));

    let (status, body) = app.send("POST", "/v1/admin/holds/sweep", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["expired"], 1);

    let (status, body) = app.send("POST", "/v1/admin/holds/sweep", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["expired"], 0);

    let (status, body) = app.send("GET", "/v1/admin/resources/lot-1/holds", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let holds = body.as_array().unwrap();
    assert_eq!(holds.len(), 2);
    assert_eq!(holds[0]["state"], "EXPIRED");
    assert_eq!(holds[1]["state"], "CONFIRMED");
    assert_eq!(holds[1]["ownerRef"], "guest-alice");
}

#[tokio::test]
async fn test_reminders_are_scoped_to_caller() {
    let app = TestApp::new();
    let alice = app.customer("guest-alice");
    let bob = app.customer("guest-bob");

    let (status, created) = app
        .send(
            "POST",
            "/v1/reminders",
            Some(&alice),
            Some(json!({ "title": "Dune: Part Three", "showtime_id": null, "remind_at": at(18, 30) })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap();

    let (_, listed) = app.send("GET", "/v1/reminders", Some(&bob), None).await;
    assert_eq!(listed.as_array().unwrap().len(), 0);

    let (status, _) = app.send("DELETE", &format!("/v1/reminders/{}", id), Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.send("DELETE", &format!("/v1/reminders/{}", id), Some(&alice), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, listed) = app.send("GET", "/v1/reminders", Some(&alice), None).await;
    assert_eq!(listed.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_spin_needs_three_confirmed_premium_seats() {
    let app = TestApp::new();
    let alice = app.customer("guest-alice");

    let mut ids = Vec::new();
    for seat_id in ["show-42:A1", "show-42:A2", "show-42:A3"] {
        let (_, held) = app.hold(&alice, seat_id, at(19, 0), at(21, 30)).await;
        ids.push(held["reservationId"].as_str().unwrap().to_string());
    }

    for id in &ids[..2] {
        app.send("POST", &format!("/v1/holds/{}/confirm", id), Some(&alice), None).await;
    }
    let (status, body) = app
        .send("POST", "/v1/rewards/spin-eligibility", Some(&alice), Some(json!({ "reservation_ids": ids })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["eligible"], false);
    assert_eq!(body["premiumSeats"], 2);

    app.send("POST", &format!("/v1/holds/{}/confirm", ids[2]), Some(&alice), None).await;
    let (_, body) = app
        .send("POST", "/v1/rewards/spin-eligibility", Some(&alice), Some(json!({ "reservation_ids": ids })))
        .await;
    assert_eq!(body["eligible"], true);
    assert_eq!(body["requiredPremiumSeats"], 3);
}

#[tokio::test]
async fn test_spin_counts_repeated_reservation_once() {
    let app = TestApp::new();
    let alice = app.customer("guest-alice");

    let (_, held) = app.hold(&alice, "show-42:A1", at(19, 0), at(21, 30)).await;
    let id = held["reservationId"].as_str().unwrap().to_string();
    let (status, _) = app.send("POST", &format!("/v1/holds/{}/confirm", id), Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(
            "POST",
            "/v1/rewards/spin-eligibility",
            Some(&alice),
            Some(json!({ "reservation_ids": [id, id, id] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["eligible"], false);
    assert_eq!(body["premiumSeats"], 1);
}

#[tokio::test]
async fn test_health_and_metrics() {
    let app = TestApp::new();
    let alice = app.customer("guest-alice");

    let (status, body) = app.send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    app.hold(&alice, "lot-1", at(10, 0), at(13, 0)).await;
    app.hold(&alice, "lot-1", at(10, 0), at(13, 0)).await;

    let (status, body) = app.send("GET", "/metrics", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let text = body.as_str().unwrap();
    assert!(text.contains("marquee_hold_rejections_total{code=\"RESOURCE_UNAVAILABLE\"} 1"));
}

#[tokio::test]
async fn test_stream_requires_known_resource() {
    let app = TestApp::new();

    let (status, body) = app.send("GET", "/v1/resources/lot-404/stream", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "RESOURCE_NOT_FOUND");
}
