use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::gateway::fanout::BridgeState;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let fanout = state
        .bridge
        .as_ref()
        .map(|bridge| bridge.state())
        .unwrap_or(BridgeState::Disabled);

    Json(serde_json::json!({
        "status": "ok",
        "instanceId": state.instance_id,
        "connections": state.connections.connection_count(),
        "rooms": state.connections.rooms().room_count(),
        "fanout": fanout.as_str(),
    }))
}
