use std::net::SocketAddr;
use std::sync::Arc;

use bson::{DateTime, oid::ObjectId};
use pawchat_api::{
    build_router,
    state::{AppState, Stores},
};
use pawchat_config::{Settings, StorageBackend};
use pawchat_db::models::Match;
use pawchat_services::auth::Role;
use pawchat_services::clock::ManualClock;
use tokio::net::TcpListener;

pub struct TestUser {
    pub id: ObjectId,
    pub access_token: String,
}

pub struct SeededMatch {
    pub match_id: String,
    pub alice: TestUser,
    pub bob: TestUser,
}

/// The real router on an ephemeral port, backed by in-memory stores and a manual clock.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    pub state: AppState,
    pub clock: Arc<ManualClock>,
    stores: Stores,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    pub async fn spawn_with(configure: impl FnOnce(&mut Settings)) -> Self {
        let mut settings = Settings::default();
        settings.database.backend = StorageBackend::Memory;
        settings.jwt.secret = "pawchat-test-secret".to_string();
        settings.call.ring_timeout_secs = 0;
        configure(&mut settings);

        let stores = Stores::in_memory();
        let clock = Arc::new(ManualClock::new(DateTime::now()));
        let state = AppState::new(settings, stores.clone(), clock.clone());
        let app = build_router(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("No local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Test server failed");
        });

        Self {
            addr,
            client: reqwest::Client::new(),
            state,
            clock,
            stores,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, token: &str) -> String {
        format!("ws://{}/ws?token={}", self.addr, token)
    }

    pub fn user(&self, role: Role) -> TestUser {
        let id = ObjectId::new();
        let access_token = self
            .state
            .auth
            .issue_access_token(id, role)
            .expect("Failed to issue token");
        TestUser { id, access_token }
    }

    /// Inserts an active match between two fresh users.
    pub async fn seed_match(&self) -> SeededMatch {
        let alice = self.user(Role::User);
        let bob = self.user(Role::User);
        let m = Match::new(alice.id, bob.id, ObjectId::new(), ObjectId::new());
        self.stores
            .matches
            .insert(&m)
            .await
            .expect("Failed to seed match");

        SeededMatch {
            match_id: m.id.to_hex(),
            alice,
            bob,
        }
    }

    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path))
    }

    pub fn auth_get(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(token)
    }

    pub fn auth_post(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path)).bearer_auth(token)
    }

    pub fn auth_put(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client.put(self.url(path)).bearer_auth(token)
    }

    pub fn auth_delete(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client.delete(self.url(path)).bearer_auth(token)
    }

    /// Sends a text message and returns its id.
    pub async fn send_text(&self, match_id: &str, token: &str, content: &str) -> String {
        let resp = self
            .auth_post(&format!("/api/matches/{match_id}/messages"), token)
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await
            .expect("send failed");
        assert_eq!(resp.status().as_u16(), 201, "send_text failed");
        let json: serde_json::Value = resp.json().await.expect("invalid json");
        json["id"].as_str().expect("missing id").to_string()
    }
}
