//! Integration tests for the live-update WebSocket.
//!
//! Each test spins up the real router on a random port, connects via
//! tokio-tungstenite, and triggers events through the REST routes.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;

use wa_panel::api::{self, AppState};
use wa_panel::config::AppConfig;
use wa_panel::live::LiveHub;
use wa_panel::store::{Database, LibSqlBackend, migrations};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Start the server on a random port. The returned router shares state with
/// the served one, so REST calls through it reach the same hub.
async fn start_server() -> (u16, Router, LiveHub) {
    let config = AppConfig::from_lookup(|_| None).unwrap();
    let backend = LibSqlBackend::new_memory().await.unwrap();
    migrations::init_schema(&backend).await.unwrap();
    let db: Arc<dyn Database> = Arc::new(backend);
    let hub = LiveHub::new();
    let app = api::router(AppState::new(config, db, hub.clone()));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let served = app.clone();
    tokio::spawn(async move {
        axum::serve(listener, served).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (port, app, hub)
}

/// Wait until the socket task has subscribed to the hub.
async fn wait_for_subscribers(hub: &LiveHub, n: usize) {
    while hub.subscriber_count() < n {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn call(app: &Router, method: Method, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

/// Parse a WS text frame into a serde_json::Value.
fn parse_ws_json(msg: &Message) -> Value {
    match msg {
        Message::Text(txt) => serde_json::from_str(txt).expect("invalid JSON from server"),
        other => panic!("expected Text frame, got {:?}", other),
    }
}

#[tokio::test]
async fn webhook_message_is_pushed_to_client() {
    timeout(TEST_TIMEOUT, async {
        let (port, app, hub) = start_server().await;

        let (mut ws, _) = connect_async(format!("ws://127.0.0.1:{port}/ws"))
            .await
            .expect("WS connect failed");
        wait_for_subscribers(&hub, 1).await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/webhook/message",
            json!({"phone_number": "+1555", "contact_name": "Ana", "message": "hi"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let msg = ws.next().await.unwrap().unwrap();
        let json = parse_ws_json(&msg);
        assert_eq!(json["type"], "new_message");
        assert_eq!(json["data"]["id"], body["message_id"]);
        assert_eq!(json["data"]["phone_number"], "+1555");
        assert_eq!(json["data"]["message"], "hi");
        assert_eq!(json["data"]["status"], "pending");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn status_update_reaches_every_client() {
    timeout(TEST_TIMEOUT, async {
        let (port, app, hub) = start_server().await;

        let (_, created) = call(
            &app,
            Method::POST,
            "/api/conversations",
            json!({"phone_number": "+1", "message": "a"}),
        )
        .await;
        let id = created["id"].as_i64().unwrap();

        // Connected after the insert, so neither client sees the new_message
        let (mut first, _) = connect_async(format!("ws://127.0.0.1:{port}/ws"))
            .await
            .unwrap();
        let (mut second, _) = connect_async(format!("ws://127.0.0.1:{port}/ws"))
            .await
            .unwrap();
        wait_for_subscribers(&hub, 2).await;

        let (status, _) = call(
            &app,
            Method::PUT,
            &format!("/api/conversations/{id}/status"),
            json!({"status": "read"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        for ws in [&mut first, &mut second] {
            let json = parse_ws_json(&ws.next().await.unwrap().unwrap());
            assert_eq!(json, json!({"type": "status_update", "data": {"id": id, "status": "read"}}));
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn closed_client_is_unsubscribed() {
    timeout(TEST_TIMEOUT, async {
        let (port, app, hub) = start_server().await;

        let (mut ws, _) = connect_async(format!("ws://127.0.0.1:{port}/ws"))
            .await
            .unwrap();
        wait_for_subscribers(&hub, 1).await;

        ws.send(Message::Close(None)).await.unwrap();
        while hub.subscriber_count() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        // Publishing with nobody listening still succeeds
        let (status, _) = call(
            &app,
            Method::POST,
            "/api/webhook/message",
            json!({"phone_number": "+2", "message": "anyone?"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn ping_is_answered_with_pong() {
    timeout(TEST_TIMEOUT, async {
        let (port, _app, hub) = start_server().await;

        let (mut ws, _) = connect_async(format!("ws://127.0.0.1:{port}/ws"))
            .await
            .unwrap();
        wait_for_subscribers(&hub, 1).await;

        ws.send(Message::Ping(vec![1, 2, 3].into())).await.unwrap();
        let msg = ws.next().await.unwrap().unwrap();
        assert!(matches!(msg, Message::Pong(ref data) if data.as_ref() == [1, 2, 3]));
    })
    .await
    .expect("test timed out");
}
