use std::time::Duration;

use crate::fixtures::test_app::TestApp;
use serde_json::Value;

#[tokio::test]
async fn send_and_list_messages() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;

    let resp = app
        .auth_post(
            &format!("/api/matches/{}/messages", m.match_id),
            &m.alice.access_token,
        )
        .json(&serde_json::json!({ "content": "Does Biscuit like the park?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    let msg: Value = resp.json().await.unwrap();
    assert_eq!(msg["content"], "Does Biscuit like the park?");
    assert_eq!(msg["kind"], "text");
    assert_eq!(msg["sender_id"], m.alice.id.to_hex());
    assert_eq!(msg["moderation_status"], "none");

    app.send_text(&m.match_id, &m.bob.access_token, "He loves it").await;

    let resp = app
        .auth_get(
            &format!("/api/matches/{}/messages", m.match_id),
            &m.alice.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    let items = json["messages"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(json["messages"]["total"], 2);
    assert_eq!(json["unread_count"], 1);
}

#[tokio::test]
async fn listing_is_newest_first_and_paginated() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;

    for i in 0..5 {
        app.send_text(&m.match_id, &m.alice.access_token, &format!("msg {i}"))
            .await;
        app.clock.advance(Duration::from_secs(1));
    }

    let resp = app
        .auth_get(
            &format!("/api/matches/{}/messages?page=1&limit=2", m.match_id),
            &m.bob.access_token,
        )
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    let page = &json["messages"];
    let items = page["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["content"], "msg 4");
    assert_eq!(items[1]["content"], "msg 3");
    assert_eq!(page["total"], 5);
    assert_eq!(page["total_pages"], 3);
    assert_eq!(page["has_more"], true);
}

#[tokio::test]
async fn outsider_sees_not_found() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;
    let outsider = app.user(pawchat_services::auth::Role::User);

    let resp = app
        .auth_get(
            &format!("/api/matches/{}/messages", m.match_id),
            &outsider.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);

    let resp = app
        .auth_post(
            &format!("/api/matches/{}/messages", m.match_id),
            &outsider.access_token,
        )
        .json(&serde_json::json!({ "content": "hi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;

    let resp = app
        .get(&format!("/api/matches/{}/messages", m.match_id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "unauthorized");
}

#[tokio::test]
async fn empty_message_is_rejected() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;

    let resp = app
        .auth_post(
            &format!("/api/matches/{}/messages", m.match_id),
            &m.alice.access_token,
        )
        .json(&serde_json::json!({ "content": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "validation");
}

#[tokio::test]
async fn edit_within_window_then_expired() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;
    let id = app.send_text(&m.match_id, &m.alice.access_token, "helo").await;

    let resp = app
        .auth_put(&format!("/api/messages/{id}"), &m.alice.access_token)
        .json(&serde_json::json!({ "content": "hello" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["content"], "hello");
    assert_eq!(json["is_edited"], true);

    app.clock.advance(Duration::from_secs(301));
    let resp = app
        .auth_put(&format!("/api/messages/{id}"), &m.alice.access_token)
        .json(&serde_json::json!({ "content": "hello again" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "window_expired");
}

#[tokio::test]
async fn only_sender_may_edit() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;
    let id = app.send_text(&m.match_id, &m.alice.access_token, "mine").await;

    let resp = app
        .auth_put(&format!("/api/messages/{id}"), &m.bob.access_token)
        .json(&serde_json::json!({ "content": "yours now" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
}

#[tokio::test]
async fn delete_tombstones_and_keeps_log_length() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;
    let id = app.send_text(&m.match_id, &m.alice.access_token, "oops").await;

    let resp = app
        .auth_delete(&format!("/api/messages/{id}"), &m.alice.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["deleted"], true);
    assert_eq!(json["message"]["is_deleted"], true);
    assert_eq!(json["message"]["content"], "This message was deleted");

    let resp = app
        .auth_delete(&format!("/api/messages/{id}"), &m.alice.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);

    let resp = app
        .auth_get(
            &format!("/api/matches/{}/messages", m.match_id),
            &m.bob.access_token,
        )
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["messages"]["total"], 1);
}

#[tokio::test]
async fn delete_after_window_is_rejected() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;
    let id = app.send_text(&m.match_id, &m.alice.access_token, "old news").await;

    app.clock.advance(Duration::from_secs(3601));
    let resp = app
        .auth_delete(&format!("/api/messages/{id}"), &m.alice.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);
}

#[tokio::test]
async fn search_is_case_insensitive_and_skips_deleted() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;
    app.send_text(&m.match_id, &m.alice.access_token, "Walk at the BEACH?")
        .await;
    let gone = app
        .send_text(&m.match_id, &m.alice.access_token, "beach is closed")
        .await;
    app.send_text(&m.match_id, &m.bob.access_token, "park then").await;
    app.auth_delete(&format!("/api/messages/{gone}"), &m.alice.access_token)
        .send()
        .await
        .unwrap();

    let resp = app
        .auth_get(
            &format!("/api/matches/{}/search?q=beach", m.match_id),
            &m.bob.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    let items = json["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["content"], "Walk at the BEACH?");

    let resp = app
        .auth_get(
            &format!("/api/matches/{}/search?q=b", m.match_id),
            &m.bob.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);
}

#[tokio::test]
async fn thread_nests_replies() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;
    let root = app.send_text(&m.match_id, &m.alice.access_token, "Saturday?").await;

    let resp = app
        .auth_post(
            &format!("/api/matches/{}/messages", m.match_id),
            &m.bob.access_token,
        )
        .json(&serde_json::json!({ "content": "Works for us", "reply_to": root }))
        .send()
        .await
        .unwrap();
    let reply: Value = resp.json().await.unwrap();
    let reply_id = reply["id"].as_str().unwrap().to_string();

    app.auth_post(
        &format!("/api/matches/{}/messages", m.match_id),
        &m.alice.access_token,
    )
    .json(&serde_json::json!({ "content": "10am then", "replyTo": reply_id }))
    .send()
    .await
    .unwrap();

    let resp = app
        .auth_get(
            &format!("/api/matches/{}/thread/{}", m.match_id, root),
            &m.alice.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["content"], "Saturday?");
    let replies = json["replies"].as_array().unwrap();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0]["content"], "Works for us");
    assert_eq!(replies[0]["replies"][0]["content"], "10am then");
}

#[tokio::test]
async fn reply_to_unknown_message_fails() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;

    let resp = app
        .auth_post(
            &format!("/api/matches/{}/messages", m.match_id),
            &m.alice.access_token,
        )
        .json(&serde_json::json!({
            "content": "re: nothing",
            "reply_to": bson::oid::ObjectId::new().to_hex(),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);
}

#[tokio::test]
async fn playdate_proposal_carries_payload_and_enters_review() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;

    let resp = app
        .auth_post(
            &format!("/api/matches/{}/messages", m.match_id),
            &m.alice.access_token,
        )
        .json(&serde_json::json!({
            "kind": "playdate_proposal",
            "payload": {
                "proposed_time": "2030-05-01T15:00:00Z",
                "duration_minutes": 60,
                "location": { "name": "Riverside Dog Park" },
            },
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["kind"], "playdate_proposal");
    assert_eq!(json["moderation_status"], "pending");
    assert_eq!(json["payload"]["status"], "proposed");
    assert_eq!(json["payload"]["location"]["name"], "Riverside Dog Park");
    assert!(json["content"].as_str().unwrap().starts_with("Playdate proposed"));
}

#[tokio::test]
async fn payload_kind_without_payload_fails() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;

    let resp = app
        .auth_post(
            &format!("/api/matches/{}/messages", m.match_id),
            &m.alice.access_token,
        )
        .json(&serde_json::json!({ "kind": "health_alert", "content": "vet time" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);
}
