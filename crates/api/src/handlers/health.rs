use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::error::ApiError;
use crate::models::{HealthResponse, HealthState};
use crate::state::AppState;

pub async fn get(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, ApiError> {
    let version = state.store.version().await;
    let (state_sha256, counts) = state.store.state_digest().await;
    Ok(Json(HealthResponse {
        ok: true,
        store_backend: state.config.store_backend.0.as_str(),
        persistence_mode: state.config.store_backend.0.persistence_mode(),
        state: HealthState {
            version,
            state_sha256,
            counts,
        },
    }))
}
