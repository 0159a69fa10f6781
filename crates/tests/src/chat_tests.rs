use crate::fixtures::test_app::TestApp;
use serde_json::Value;

#[tokio::test]
async fn mark_read_clears_unread_count() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;
    app.send_text(&m.match_id, &m.alice.access_token, "one").await;
    app.send_text(&m.match_id, &m.alice.access_token, "two").await;

    let resp = app
        .auth_post(
            &format!("/api/matches/{}/read", m.match_id),
            &m.bob.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["marked_read"], 2);

    let resp = app
        .auth_post(
            &format!("/api/matches/{}/read", m.match_id),
            &m.bob.access_token,
        )
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["marked_read"], 0);

    let resp = app
        .auth_get(
            &format!("/api/matches/{}/messages", m.match_id),
            &m.bob.access_token,
        )
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["unread_count"], 0);
}

#[tokio::test]
async fn blocked_counterpart_cannot_send() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;

    let resp = app
        .auth_put(
            &format!("/api/matches/{}/block", m.match_id),
            &m.bob.access_token,
        )
        .json(&serde_json::json!({ "blocked": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["blocked"], true);

    let resp = app
        .auth_post(
            &format!("/api/matches/{}/messages", m.match_id),
            &m.alice.access_token,
        )
        .json(&serde_json::json!({ "content": "hello?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    app.auth_put(
        &format!("/api/matches/{}/block", m.match_id),
        &m.bob.access_token,
    )
    .json(&serde_json::json!({ "blocked": false }))
    .send()
    .await
    .unwrap();

    app.send_text(&m.match_id, &m.alice.access_token, "hello again").await;
}

#[tokio::test]
async fn clear_history_tombstones_everything() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;
    app.send_text(&m.match_id, &m.alice.access_token, "a").await;
    app.send_text(&m.match_id, &m.bob.access_token, "b").await;

    let resp = app
        .auth_delete(
            &format!("/api/matches/{}/messages", m.match_id),
            &m.alice.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["cleared"], 2);

    let resp = app
        .auth_get(
            &format!("/api/matches/{}/messages", m.match_id),
            &m.bob.access_token,
        )
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    let items = json["messages"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i["is_deleted"] == true));
    assert!(
        items
            .iter()
            .all(|i| i["content"] == "This message was deleted")
    );
}

#[tokio::test]
async fn stats_cover_active_matches() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;
    app.send_text(&m.match_id, &m.bob.access_token, "one").await;
    app.send_text(&m.match_id, &m.bob.access_token, "two").await;
    app.send_text(&m.match_id, &m.alice.access_token, "three").await;

    let resp = app
        .auth_get("/api/chat/stats", &m.alice.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["total_conversations"], 1);
    assert_eq!(json["total_messages"], 3);
    assert_eq!(json["unread_messages"], 2);
    assert_eq!(json["recent_activity"], 1);
    assert_eq!(json["average_messages_per_conversation"], 3);
}

#[tokio::test]
async fn export_returns_log_in_send_order() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;
    let first = app.send_text(&m.match_id, &m.alice.access_token, "morning").await;
    app.send_text(&m.match_id, &m.bob.access_token, "woof").await;
    app.auth_post(&format!("/api/messages/{first}/reactions"), &m.bob.access_token)
        .json(&serde_json::json!({ "emoji": "fire" }))
        .send()
        .await
        .unwrap();

    let resp = app
        .auth_post(
            &format!("/api/matches/{}/export", m.match_id),
            &m.bob.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["match_id"], m.match_id);
    assert!(json["exported_at"].is_string());
    let messages = json["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["content"], "morning");
    assert_eq!(messages[0]["sender_id"], m.alice.id.to_hex());
    assert_eq!(messages[0]["kind"], "text");
    assert_eq!(messages[0]["reactions"][0]["emoji"], "fire");
    assert_eq!(messages[1]["content"], "woof");
}

#[tokio::test]
async fn outsider_cannot_export() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;
    let outsider = app.user(pawchat_services::auth::Role::User);

    let resp = app
        .auth_post(
            &format!("/api/matches/{}/export", m.match_id),
            &outsider.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn listing_reports_block_state() {
    let app = TestApp::spawn().await;
    let m = app.seed_match().await;
    app.auth_put(
        &format!("/api/matches/{}/block", m.match_id),
        &m.bob.access_token,
    )
    .json(&serde_json::json!({ "blocked": true }))
    .send()
    .await
    .unwrap();

    let resp = app
        .auth_get(
            &format!("/api/matches/{}/messages", m.match_id),
            &m.alice.access_token,
        )
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["match_status"], "active");
    assert_eq!(json["blocked"], false);
    assert_eq!(json["blocked_by_counterpart"], true);
}

#[tokio::test]
async fn health_reports_version() {
    let app = TestApp::spawn().await;
    let resp = app.get("/health").send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}
