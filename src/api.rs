use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use tower_http::trace::TraceLayer;

use crate::metrics::Metrics;
use crate::review::{ReviewService, StatusSnapshot};

#[derive(Clone)]
pub struct AppState {
    pub review: Arc<ReviewService>,
}

/// `/health`, `/status`, and `/metrics` when a recorder is installed.
pub fn router(state: AppState, metrics: Option<&Metrics>) -> Router {
    let mut app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/status", get(status))
        .with_state(state);
    if let Some(m) = metrics {
        app = app.merge(m.router());
    }
    app.layer(TraceLayer::new_for_http())
}

async fn status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.review.status().await)
}
