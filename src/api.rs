// src/api.rs
use std::sync::{Arc, RwLock};

use axum::{extract::State, routing::get, Json, Router};
use tower_http::cors::CorsLayer;

use crate::scheduler::RelayStatus;

#[derive(Clone)]
pub struct AppState {
    pub status: Arc<RwLock<RelayStatus>>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(status))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn status(State(state): State<AppState>) -> Json<RelayStatus> {
    let snapshot = state.status.read().expect("status lock poisoned").clone();
    Json(snapshot)
}
