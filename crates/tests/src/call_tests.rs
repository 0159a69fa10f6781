use std::time::Duration;

use crate::fixtures::test_app::{SeededMatch, TestApp};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::Value;

async fn initiate(app: &TestApp, m: &SeededMatch) -> Value {
    let resp = app
        .auth_post("/api/calls/initiate", &m.alice.access_token)
        .json(&serde_json::json!({
            "matchId": m.match_id,
            "receiverId": m.bob.id.to_hex(),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    resp.json().await.unwrap()
}

fn session_id(call: &Value) -> String {
    call["session"]["session_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn initiate_rings_with_placeholder_token() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;

    let call = initiate(&app, &m).await;
    let sid = session_id(&call);
    assert!(sid.starts_with("call_"));
    assert_eq!(call["session"]["status"], "ringing");
    assert_eq!(
        call["session"]["room_name"],
        format!("room_{}_{}", m.match_id, sid)
    );
    assert_eq!(call["token_placeholder"], true);
    assert!(!call["token"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn second_call_on_same_match_conflicts() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;
    initiate(&app, &m).await;

    let resp = app
        .auth_post("/api/calls/initiate", &m.bob.access_token)
        .json(&serde_json::json!({
            "match_id": m.match_id,
            "receiver_id": m.alice.id.to_hex(),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);
}

#[tokio::test]
async fn outsider_cannot_initiate() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;
    let outsider = app.user(pawchat_services::auth::Role::User);

    let resp = app
        .auth_post("/api/calls/initiate", &outsider.access_token)
        .json(&serde_json::json!({
            "matchId": m.match_id,
            "receiverId": m.bob.id.to_hex(),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn accept_then_end_records_history() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;
    let sid = session_id(&initiate(&app, &m).await);

    // Caller cannot accept their own call
    let resp = app
        .auth_post(&format!("/api/calls/{sid}/accept"), &m.alice.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    let resp = app
        .auth_post(&format!("/api/calls/{sid}/accept"), &m.bob.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["can_publish"], true);
    assert_eq!(json["session_id"], sid);

    let resp = app
        .auth_get(
            &format!("/api/calls/active/{}", m.match_id),
            &m.bob.access_token,
        )
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["active"], true);
    assert_eq!(json["session"]["status"], "active");

    let resp = app
        .auth_post(&format!("/api/calls/{sid}/quality"), &m.bob.access_token)
        .json(&serde_json::json!({
            "packetLoss": 1.5,
            "latency": 80.0,
            "jitter": 4.0,
            "bitrate": 1200.0,
            "resolution": { "width": 1280, "height": 720 },
            "frameRate": 30.0,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    app.clock.advance(Duration::from_secs(125));
    let resp = app
        .auth_post(&format!("/api/calls/{sid}/end"), &m.alice.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "ended");
    assert_eq!(json["duration_secs"], 125);

    let resp = app
        .auth_get(
            &format!("/api/calls/history/{}", m.match_id),
            &m.bob.access_token,
        )
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    let items = json["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["duration_secs"], 125);
    assert_eq!(items[0]["quality"]["avg_latency"], 80.0);
    assert_eq!(items[0]["quality"]["samples"], 1);

    let resp = app
        .auth_get(
            &format!("/api/calls/active/{}", m.match_id),
            &m.bob.access_token,
        )
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["active"], false);
}

#[tokio::test]
async fn reject_frees_the_match() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;
    let sid = session_id(&initiate(&app, &m).await);

    let resp = app
        .auth_post(&format!("/api/calls/{sid}/reject"), &m.bob.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "rejected");

    let resp = app
        .auth_post(&format!("/api/calls/{sid}/accept"), &m.bob.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);

    initiate(&app, &m).await;

    let resp = app
        .auth_get(
            &format!("/api/calls/history/{}", m.match_id),
            &m.alice.access_token,
        )
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    assert!(json["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn hanging_up_while_ringing_is_missed() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;
    let sid = session_id(&initiate(&app, &m).await);

    let resp = app
        .auth_post(&format!("/api/calls/{sid}/end"), &m.alice.access_token)
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "missed");
    assert_eq!(json["duration_secs"], 0);
}

#[tokio::test]
async fn toggles_require_active_call() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;
    let sid = session_id(&initiate(&app, &m).await);

    let resp = app
        .auth_post(&format!("/api/calls/{sid}/mute"), &m.alice.access_token)
        .json(&serde_json::json!({ "muted": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);

    app.auth_post(&format!("/api/calls/{sid}/accept"), &m.bob.access_token)
        .send()
        .await
        .unwrap();

    let resp = app
        .auth_post(&format!("/api/calls/{sid}/mute"), &m.alice.access_token)
        .json(&serde_json::json!({ "muted": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let resp = app
        .auth_post(&format!("/api/calls/{sid}/video"), &m.bob.access_token)
        .json(&serde_json::json!({ "videoEnabled": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["video_enabled"], false);

    let resp = app
        .auth_post(&format!("/api/calls/{sid}/camera"), &m.bob.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn invalid_quality_sample_is_rejected() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;
    let sid = session_id(&initiate(&app, &m).await);
    app.auth_post(&format!("/api/calls/{sid}/accept"), &m.bob.access_token)
        .send()
        .await
        .unwrap();

    let resp = app
        .auth_post(&format!("/api/calls/{sid}/quality"), &m.alice.access_token)
        .json(&serde_json::json!({
            "packetLoss": 140.0,
            "latency": 80.0,
            "jitter": 4.0,
            "bitrate": 1200.0,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);
}

#[tokio::test]
async fn receiver_token_gains_publish_once_active() {
    let app = TestApp::spawn_with(|s| {
        s.livekit.api_key = Some("devkey".to_string());
        s.livekit.api_secret = Some("devsecret-devsecret-devsecret".to_string());
    })
    .await;
    let m = app.seed_match().await;
    let call = initiate(&app, &m).await;
    let sid = session_id(&call);
    assert_eq!(call["token_placeholder"], false);

    let resp = app
        .auth_get(&format!("/api/calls/{sid}/token"), &m.bob.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["can_publish"], false);

    let token = json["token"]["token"].as_str().unwrap();
    let decoded = jsonwebtoken::decode::<Value>(
        token,
        &DecodingKey::from_secret(b"devsecret-devsecret-devsecret"),
        &Validation::new(Algorithm::HS256),
    )
    .unwrap();
    assert_eq!(decoded.claims["iss"], "devkey");
    assert_eq!(decoded.claims["sub"], m.bob.id.to_hex());
    assert_eq!(decoded.claims["video"]["room"], call["session"]["room_name"]);
    assert_eq!(decoded.claims["video"]["canPublish"], false);

    app.auth_post(&format!("/api/calls/{sid}/accept"), &m.bob.access_token)
        .send()
        .await
        .unwrap();
    let resp = app
        .auth_get(&format!("/api/calls/{sid}/token"), &m.bob.access_token)
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["can_publish"], true);
}

#[tokio::test]
async fn ring_timeout_marks_call_missed() {
    let app = TestApp::spawn_with(|s| s.call.ring_timeout_secs = 1).await;
    let m = app.seed_match().await;
    let sid = session_id(&initiate(&app, &m).await);

    tokio::time::sleep(Duration::from_millis(1500)).await;

    let resp = app
        .auth_post(&format!("/api/calls/{sid}/accept"), &m.bob.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);

    let resp = app
        .auth_get(
            &format!("/api/calls/active/{}", m.match_id),
            &m.alice.access_token,
        )
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["active"], false);
}
