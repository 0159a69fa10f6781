use std::time::Duration;

use crate::fixtures::test_app::TestApp;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect(app: &TestApp, token: &str) -> Ws {
    let (mut ws, _) = tokio_tungstenite::connect_async(app.ws_url(token))
        .await
        .expect("WS connect failed");
    let hello = next_json(&mut ws).await;
    assert_eq!(hello["type"], "connected");
    ws
}

/// Next text frame as JSON, failing the test if nothing arrives in time.
async fn next_json(ws: &mut Ws) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for WS frame")
            .expect("WS stream closed")
            .expect("WS error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn ws_rejects_bad_token() {
    let app = TestApp::spawn().await;
    let result = tokio_tungstenite::connect_async(app.ws_url("not-a-jwt")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn ping_gets_pong() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;
    let mut ws = connect(&app, &m.alice.access_token).await;

    ws.send(Message::text(
        serde_json::json!({ "type": "ping" }).to_string(),
    ))
    .await
    .unwrap();

    let frame = next_json(&mut ws).await;
    assert_eq!(frame["type"], "pong");
}

#[tokio::test]
async fn counterpart_receives_new_message() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;
    let mut ws_bob = connect(&app, &m.bob.access_token).await;

    let id = app
        .send_text(&m.match_id, &m.alice.access_token, "Walk at 5?")
        .await;

    let frame = next_json(&mut ws_bob).await;
    assert_eq!(frame["type"], "new_message");
    assert_eq!(frame["data"]["match_id"], m.match_id);
    assert_eq!(frame["data"]["message"]["id"], id);
    assert_eq!(frame["data"]["message"]["content"], "Walk at 5?");
}

#[tokio::test]
async fn edit_and_delete_reach_counterpart() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;
    let id = app.send_text(&m.match_id, &m.alice.access_token, "draft").await;
    let mut ws_bob = connect(&app, &m.bob.access_token).await;

    app.auth_put(&format!("/api/messages/{id}"), &m.alice.access_token)
        .json(&serde_json::json!({ "content": "final" }))
        .send()
        .await
        .unwrap();
    let frame = next_json(&mut ws_bob).await;
    assert_eq!(frame["type"], "message_edited");
    assert_eq!(frame["data"]["message"]["content"], "final");

    app.auth_delete(&format!("/api/messages/{id}"), &m.alice.access_token)
        .send()
        .await
        .unwrap();
    let frame = next_json(&mut ws_bob).await;
    assert_eq!(frame["type"], "message_deleted");
    assert_eq!(frame["data"]["message_id"], id);
}

#[tokio::test]
async fn typing_is_relayed_to_counterpart() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;
    let mut ws_alice = connect(&app, &m.alice.access_token).await;
    let mut ws_bob = connect(&app, &m.bob.access_token).await;

    ws_alice
        .send(Message::text(
            serde_json::json!({
                "type": "typing:start",
                "data": { "match_id": m.match_id },
            })
            .to_string(),
        ))
        .await
        .unwrap();

    let frame = next_json(&mut ws_bob).await;
    assert_eq!(frame["type"], "typing:start");
    assert_eq!(frame["data"]["user_id"], m.alice.id.to_hex());
    assert_eq!(frame["data"]["match_id"], m.match_id);
}

#[tokio::test]
async fn closing_socket_stops_typing_indicator() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;
    let mut ws_alice = connect(&app, &m.alice.access_token).await;
    let mut ws_bob = connect(&app, &m.bob.access_token).await;

    ws_alice
        .send(Message::text(
            serde_json::json!({
                "type": "typing:start",
                "data": { "match_id": m.match_id },
            })
            .to_string(),
        ))
        .await
        .unwrap();
    let frame = next_json(&mut ws_bob).await;
    assert_eq!(frame["type"], "typing:start");

    ws_alice.close(None).await.unwrap();

    let frame = next_json(&mut ws_bob).await;
    assert_eq!(frame["type"], "typing:stop");
    assert_eq!(frame["data"]["user_id"], m.alice.id.to_hex());
    assert_eq!(frame["data"]["match_id"], m.match_id);
}

#[tokio::test]
async fn health_counts_open_sockets() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;
    let _ws_alice = connect(&app, &m.alice.access_token).await;
    let _ws_alice_phone = connect(&app, &m.alice.access_token).await;
    let _ws_bob = connect(&app, &m.bob.access_token).await;

    let resp = app.get("/health").send().await.unwrap();
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["connections"], 3);
    assert_eq!(json["online_users"], 2);
}

#[tokio::test]
async fn call_flow_events() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;
    let mut ws_alice = connect(&app, &m.alice.access_token).await;
    let mut ws_bob = connect(&app, &m.bob.access_token).await;

    let resp = app
        .auth_post("/api/calls/initiate", &m.alice.access_token)
        .json(&serde_json::json!({
            "matchId": m.match_id,
            "receiverId": m.bob.id.to_hex(),
        }))
        .send()
        .await
        .unwrap();
    let call: Value = resp.json().await.unwrap();
    let sid = call["session"]["session_id"].as_str().unwrap().to_string();

    let frame = next_json(&mut ws_bob).await;
    assert_eq!(frame["type"], "call_incoming");
    assert_eq!(frame["data"]["session_id"], sid);
    assert_eq!(frame["data"]["caller_id"], m.alice.id.to_hex());
    assert_eq!(frame["data"]["token_placeholder"], true);

    app.auth_post(&format!("/api/calls/{sid}/accept"), &m.bob.access_token)
        .send()
        .await
        .unwrap();
    let frame = next_json(&mut ws_alice).await;
    assert_eq!(frame["type"], "call_accepted");

    app.auth_post(&format!("/api/calls/{sid}/camera"), &m.alice.access_token)
        .send()
        .await
        .unwrap();
    let frame = next_json(&mut ws_bob).await;
    assert_eq!(frame["type"], "call_camera_switched");

    app.clock.advance(Duration::from_secs(42));
    app.auth_post(&format!("/api/calls/{sid}/end"), &m.bob.access_token)
        .send()
        .await
        .unwrap();
    let frame = next_json(&mut ws_alice).await;
    assert_eq!(frame["type"], "call_ended");
    assert_eq!(frame["data"]["duration_secs"], 42);
}
