use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use relay::providers::credentials;
use serde_json::{json, Value};

/// Health check: which providers are usable right now, given the credentials
/// present in the environment.
async fn handler(State(state): State<AppState>) -> Json<Value> {
    let providers: Value = state
        .catalog
        .profiles()
        .iter()
        .map(|profile| {
            (
                profile.name.clone(),
                Value::Bool(credentials::has_credential(&profile.name)),
            )
        })
        .collect::<serde_json::Map<String, Value>>()
        .into();

    Json(json!({
        "status": "ok",
        "service": "relay",
        "version": env!("CARGO_PKG_VERSION"),
        "providers": providers,
        "backupCredential": credentials::backup_api_key("openai").is_some(),
    }))
}

pub fn routes(state: AppState) -> Router {
    Router::new().route("/status", get(handler)).with_state(state)
}
