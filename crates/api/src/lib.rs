pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;
pub mod ws;

use axum::{
    Router,
    extract::State,
    routing::{get, post, put},
};
use state::AppState;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Match-scoped conversation
    let match_routes = Router::new()
        .route(
            "/{match_id}/messages",
            get(routes::message::list)
                .post(routes::message::create)
                .delete(routes::chat::clear_history),
        )
        .route("/{match_id}/search", get(routes::message::search))
        .route("/{match_id}/thread/{root_id}", get(routes::message::thread))
        .route("/{match_id}/read", post(routes::chat::mark_read))
        .route("/{match_id}/export", post(routes::chat::export))
        .route("/{match_id}/block", put(routes::chat::set_blocked));

    // Message-by-id routes (the owning match is resolved from the id)
    let message_routes = Router::new()
        .route(
            "/{message_id}",
            put(routes::message::update).delete(routes::message::delete),
        )
        .route("/{message_id}/reactions", post(routes::reaction::add))
        .route(
            "/{message_id}/reactions/{emoji}",
            axum::routing::delete(routes::reaction::remove),
        );

    let chat_routes = Router::new().route("/stats", get(routes::chat::stats));

    let call_routes = Router::new()
        .route("/initiate", post(routes::call::initiate))
        .route("/active/{match_id}", get(routes::call::active))
        .route("/history/{match_id}", get(routes::call::history))
        .route("/{session_id}/token", get(routes::call::token))
        .route("/{session_id}/accept", post(routes::call::accept))
        .route("/{session_id}/reject", post(routes::call::reject))
        .route("/{session_id}/end", post(routes::call::end))
        .route("/{session_id}/mute", post(routes::call::mute))
        .route("/{session_id}/video", post(routes::call::video))
        .route("/{session_id}/camera", post(routes::call::camera))
        .route("/{session_id}/quality", post(routes::call::quality));

    let moderation_routes = Router::new()
        .route("/queue", get(routes::moderation::queue))
        .route(
            "/{match_id}/{message_id}",
            post(routes::moderation::moderate),
        );

    let api = Router::new()
        .nest("/matches", match_routes)
        .nest("/messages", message_routes)
        .nest("/chat", chat_routes)
        .nest("/calls", call_routes)
        .nest("/admin/moderation", moderation_routes);

    Router::new()
        .nest("/api", api)
        .route("/health", get(health_check))
        .route("/ws", get(ws::handler::ws_upgrade))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "connections": state.presence.connection_count(),
        "online_users": state.presence.online_users(),
        "live_calls": state.calls.registry().len(),
    }))
}
