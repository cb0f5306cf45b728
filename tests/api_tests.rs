//--------------------------------------------------------------------------------------------------
// TEST MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Integration tests for the order-event reconciliation HTTP surface
// (spec.md §6/§8): webhook ingest outcomes, the read-only order listing, and
// the SSE replay-then-live delivery round trip, driven end to end against
// the in-memory storage backend via `tower::ServiceExt::oneshot`.
//--------------------------------------------------------------------------------------------------

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use order_event_service::domain::services::broadcaster::{Broadcaster, ReplayProducer};
use order_event_service::domain::services::ingest::IngestService;
use order_event_service::domain::services::storage::{InMemoryStorage, Storage};
use order_event_service::{Api, AppState};

fn test_router(finalization_timer: Duration) -> Router {
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    let broadcaster = Broadcaster::new();
    let replay_producer = ReplayProducer::new(storage.clone(), broadcaster.clone());
    broadcaster.set_listener(replay_producer);

    let ingest = Arc::new(IngestService::new(
        storage.clone(),
        broadcaster.clone(),
        finalization_timer,
    ));

    let state = Arc::new(AppState {
        ingest,
        broadcaster,
        storage,
        subscriber_idle_timeout: Duration::from_secs(60),
    });

    let api = Api::new(SocketAddr::from(([127, 0, 0, 1], 0)), state);
    api.routes()
}

fn webhook_body(order_id: &str, event_id: &str, status: &str, ts: DateTime<Utc>) -> Value {
    json!({
        "event_id": event_id,
        "order_id": order_id,
        "user_id": "user-1",
        "order_status": status,
        "updated_at": ts.to_rfc3339(),
        "created_at": ts.to_rfc3339(),
    })
}

async fn post_webhook(app: &Router, body: Value) -> StatusCode {
    let response = app
        .clone()
        .oneshot(
            Request::post("/webhooks/payments/orders")
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    response.status()
}

/// Parses an SSE response body (`data: <json>\n\n` per event) into the list
/// of decoded JSON payloads, in delivery order.
fn parse_sse_events(body: &str) -> Vec<Value> {
    body.split("\n\n")
        .filter_map(|chunk| chunk.strip_prefix("data: "))
        .filter(|payload| !payload.is_empty())
        .map(|payload| serde_json::from_str(payload).unwrap())
        .collect()
}

#[tokio::test]
async fn webhook_ingest_accepts_a_well_formed_event() {
    let app = test_router(Duration::from_secs(30));
    let now = Utc::now();
    let status = post_webhook(
        &app,
        webhook_body("order-1", "e0", "cool_order_created", now),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn webhook_ingest_rejects_blank_required_fields() {
    let app = test_router(Duration::from_secs(30));
    let body = json!({
        "event_id": "",
        "order_id": "order-1",
        "user_id": "user-1",
        "order_status": "cool_order_created",
        "updated_at": Utc::now().to_rfc3339(),
        "created_at": Utc::now().to_rfc3339(),
    });
    let status = post_webhook(&app, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// S5 — duplicate webhook: the second call with the same event_id returns 409.
#[tokio::test]
async fn duplicate_event_id_returns_conflict() {
    let app = test_router(Duration::from_secs(30));
    let now = Utc::now();
    let body = webhook_body("order-1", "e0", "cool_order_created", now);

    assert_eq!(post_webhook(&app, body.clone()).await, StatusCode::OK);
    assert_eq!(post_webhook(&app, body).await, StatusCode::CONFLICT);
}

// S6 — terminal lockout: a fresh event for an already-finalized order is rejected.
#[tokio::test]
async fn ingest_after_terminal_event_returns_gone() {
    let app = test_router(Duration::from_secs(30));
    let base = Utc::now();

    assert_eq!(
        post_webhook(
            &app,
            webhook_body("order-1", "e0", "cool_order_created", base)
        )
        .await,
        StatusCode::OK
    );
    assert_eq!(
        post_webhook(
            &app,
            webhook_body(
                "order-1",
                "e1",
                "changed_my_mind",
                base + ChronoDuration::seconds(1)
            )
        )
        .await,
        StatusCode::OK
    );
    assert_eq!(
        post_webhook(
            &app,
            webhook_body(
                "order-1",
                "e2",
                "failed",
                base + ChronoDuration::seconds(2)
            )
        )
        .await,
        StatusCode::GONE
    );
}

#[tokio::test]
async fn list_orders_reflects_the_latest_in_order_snapshot() {
    let app = test_router(Duration::from_secs(30));
    let base = Utc::now();

    post_webhook(
        &app,
        webhook_body("order-1", "e0", "cool_order_created", base),
    )
    .await;
    post_webhook(
        &app,
        webhook_body(
            "order-1",
            "e1",
            "sbu_verification_pending",
            base + ChronoDuration::seconds(1),
        ),
    )
    .await;

    let response = app
        .clone()
        .oneshot(Request::get("/orders").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let orders: Vec<Value> = serde_json::from_slice(&body).unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["order_id"], "order-1");
    assert_eq!(orders[0]["order_status"], "sbu_verification_pending");
    assert_eq!(orders[0]["is_final"], false);
}

// S4 — refund path: a subscriber connected before any ingest observes the
// full five-event sequence in order over SSE, and the stream closes on the
// final `give_my_money_back` event without needing the 30s timer to fire.
#[tokio::test]
async fn sse_stream_delivers_refund_sequence_in_order_then_closes() {
    let app = test_router(Duration::from_secs(30));
    let base = Utc::now();

    let stream_response = app
        .clone()
        .oneshot(
            Request::get("/orders/order-1/events")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(stream_response.status(), StatusCode::OK);

    let sequence = [
        ("e0", "cool_order_created"),
        ("e1", "sbu_verification_pending"),
        ("e2", "confirmed_by_mayor"),
        ("e3", "chinazes"),
        ("e4", "give_my_money_back"),
    ];
    for (i, (event_id, status)) in sequence.iter().enumerate() {
        let ts = base + ChronoDuration::seconds(i as i64);
        let result = post_webhook(&app, webhook_body("order-1", event_id, status, ts)).await;
        assert_eq!(result, StatusCode::OK);
    }

    let body_bytes = to_bytes(stream_response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let body = String::from_utf8(body_bytes.to_vec()).unwrap();
    let events = parse_sse_events(&body);

    let observed_ids: Vec<&str> = events
        .iter()
        .map(|e| e["event_id"].as_str().unwrap())
        .collect();
    assert_eq!(observed_ids, vec!["e0", "e1", "e2", "e3", "e4"]);
    assert_eq!(events.last().unwrap()["is_final"], true);
}

// S1 — delayed finalization: a `chinazes` admission with no competing
// refund becomes final once the (shortened) timer fires, and a subscriber
// connected before ingest observes the closing, now-final event.
#[tokio::test]
async fn sse_stream_observes_delayed_finalization_after_the_timer_fires() {
    let app = test_router(Duration::from_millis(50));
    let base = Utc::now();

    let stream_response = app
        .clone()
        .oneshot(
            Request::get("/orders/order-1/events")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let sequence = [
        ("e0", "cool_order_created"),
        ("e1", "sbu_verification_pending"),
        ("e2", "confirmed_by_mayor"),
        ("e3", "chinazes"),
    ];
    for (i, (event_id, status)) in sequence.iter().enumerate() {
        let ts = base + ChronoDuration::seconds(i as i64);
        assert_eq!(
            post_webhook(&app, webhook_body("order-1", event_id, status, ts)).await,
            StatusCode::OK
        );
    }

    let body_bytes = tokio::time::timeout(
        Duration::from_secs(2),
        to_bytes(stream_response.into_body(), 1024 * 1024),
    )
    .await
    .expect("finalization timer should close the stream")
    .unwrap();
    let body = String::from_utf8(body_bytes.to_vec()).unwrap();
    let events = parse_sse_events(&body);

    let observed_ids: Vec<&str> = events
        .iter()
        .map(|e| e["event_id"].as_str().unwrap())
        .collect();
    // e3 arrives twice: once admitted (not yet final), once again when the
    // timer fires and marks it final.
    assert_eq!(observed_ids, vec!["e0", "e1", "e2", "e3", "e3"]);
    assert_eq!(events.last().unwrap()["is_final"], true);
}

// S3 — subscriber joins mid-stream: a subscriber connecting after ingest has
// already admitted every event observes the full in-order history via
// replay, then the timer-driven re-emission of the `chinazes` event with
// `is_final=true`, then the stream closes.
#[tokio::test]
async fn sse_stream_replays_history_then_observes_delayed_finalization() {
    let app = test_router(Duration::from_millis(100));
    let base = Utc::now();

    let sequence = [
        ("e0", "cool_order_created"),
        ("e1", "sbu_verification_pending"),
        ("e2", "confirmed_by_mayor"),
        ("e3", "chinazes"),
    ];
    for (i, (event_id, status)) in sequence.iter().enumerate() {
        let ts = base + ChronoDuration::seconds(i as i64);
        assert_eq!(
            post_webhook(&app, webhook_body("order-1", event_id, status, ts)).await,
            StatusCode::OK
        );
    }

    // Subscriber connects only after every event above has already been
    // admitted; its view of e0..e3 comes entirely from replay, not live emit.
    let stream_response = app
        .clone()
        .oneshot(
            Request::get("/orders/order-1/events")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let body_bytes = tokio::time::timeout(
        Duration::from_secs(2),
        to_bytes(stream_response.into_body(), 1024 * 1024),
    )
    .await
    .expect("finalization timer should close the stream")
    .unwrap();
    let body = String::from_utf8(body_bytes.to_vec()).unwrap();
    let events = parse_sse_events(&body);

    let observed_ids: Vec<&str> = events
        .iter()
        .map(|e| e["event_id"].as_str().unwrap())
        .collect();
    assert_eq!(observed_ids, vec!["e0", "e1", "e2", "e3", "e3"]);
    assert_eq!(events.last().unwrap()["is_final"], true);
}

// S2 — out-of-order ingest: events admitted only as the prefix becomes
// assemblable, delivered to the subscriber in canonical order regardless of
// arrival order.
#[tokio::test]
async fn sse_stream_reorders_out_of_order_ingest() {
    let app = test_router(Duration::from_secs(30));
    let base = Utc::now();

    let stream_response = app
        .clone()
        .oneshot(
            Request::get("/orders/order-1/events")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let e0 = webhook_body("order-1", "e0", "cool_order_created", base);
    let e1 = webhook_body(
        "order-1",
        "e1",
        "sbu_verification_pending",
        base + ChronoDuration::seconds(1),
    );
    let e2 = webhook_body(
        "order-1",
        "e2",
        "confirmed_by_mayor",
        base + ChronoDuration::seconds(2),
    );
    // changed_my_mind (rather than chinazes) so the stream closes on e3
    // without needing the finalization timer to fire.
    let e3 = webhook_body(
        "order-1",
        "e3",
        "changed_my_mind",
        base + ChronoDuration::seconds(3),
    );

    // Arrival order: e2, e0, e1, e3.
    assert_eq!(post_webhook(&app, e2).await, StatusCode::OK);
    assert_eq!(post_webhook(&app, e0).await, StatusCode::OK);
    assert_eq!(post_webhook(&app, e1).await, StatusCode::OK);
    assert_eq!(post_webhook(&app, e3).await, StatusCode::OK);

    let body_bytes = to_bytes(stream_response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let body = String::from_utf8(body_bytes.to_vec()).unwrap();
    let events = parse_sse_events(&body);

    let observed_ids: Vec<&str> = events
        .iter()
        .map(|e| e["event_id"].as_str().unwrap())
        .collect();
    assert_eq!(observed_ids, vec!["e0", "e1", "e2", "e3"]);
}
