use std::sync::Arc;

use mongodb::Database;
use pawchat_config::Settings;
use pawchat_services::auth::AuthService;
use pawchat_services::call::registry::InMemorySessionRegistry;
use pawchat_services::call::token::issuer_from_settings;
use pawchat_services::call::CallService;
use pawchat_services::chat::ChatService;
use pawchat_services::clock::Clock;
use pawchat_services::dao::call_history::{
    CallHistoryStore, InMemoryCallHistoryStore, MongoCallHistoryStore,
};
use pawchat_services::dao::match_store::{InMemoryMatchStore, MatchStore, MongoMatchStore};

use crate::ws::dispatcher::WsNotifier;
use crate::ws::presence::Presence;

/// Persistence backends behind the services.
#[derive(Clone)]
pub struct Stores {
    pub matches: Arc<dyn MatchStore>,
    pub call_history: Arc<dyn CallHistoryStore>,
}

impl Stores {
    pub fn mongo(db: &Database) -> Self {
        Self {
            matches: Arc::new(MongoMatchStore::new(db)),
            call_history: Arc::new(MongoCallHistoryStore::new(db)),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            matches: Arc::new(InMemoryMatchStore::new()),
            call_history: Arc::new(InMemoryCallHistoryStore::new()),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub auth: Arc<AuthService>,
    pub chat: Arc<ChatService>,
    pub calls: Arc<CallService>,
    pub matches: Arc<dyn MatchStore>,
    pub presence: Arc<Presence>,
}

impl AppState {
    pub fn new(settings: Settings, stores: Stores, clock: Arc<dyn Clock>) -> Self {
        let presence: Arc<Presence> = Arc::new(Presence::new());
        let notifier = Arc::new(WsNotifier::new(presence.clone()));

        let chat = ChatService::new(
            stores.matches.clone(),
            notifier.clone(),
            clock.clone(),
            settings.chat.clone(),
        );
        let calls = CallService::new(
            stores.matches.clone(),
            stores.call_history,
            Arc::new(InMemorySessionRegistry::new()),
            issuer_from_settings(&settings.livekit),
            notifier,
            clock,
            settings.call.clone(),
            settings.livekit.url.clone(),
        );

        Self {
            auth: Arc::new(AuthService::new(&settings.jwt)),
            chat: Arc::new(chat),
            calls: Arc::new(calls),
            matches: stores.matches,
            presence,
            settings: Arc::new(settings),
        }
    }
}
