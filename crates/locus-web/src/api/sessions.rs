use axum::extract::State;
use axum::response::IntoResponse;

use crate::app::AppState;
use crate::util::http::json_ok;

pub async fn api_sessions(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.inner.lock().await.sessions.snapshot();
    json_ok(&snapshot)
}
