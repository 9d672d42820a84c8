use axum::{extract::State, response::IntoResponse, Json};

use crate::AppState;

pub async fn get_metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.counters.snapshot())
}
