use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::error::ApiError;
use crate::models::KeySetEntry;
use crate::state::AppState;

pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, ApiError> {
    let active = state.keys.active_key_id().map(str::to_string);
    let entries: Vec<KeySetEntry> = state
        .keys
        .key_ids()
        .into_iter()
        .map(|key_id| {
            let active = active.as_deref() == Some(key_id.as_str());
            KeySetEntry { key_id, active }
        })
        .collect();
    Ok(Json(serde_json::json!({ "keys": entries })))
}
