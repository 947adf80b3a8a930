use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers::{health_handler, new_code_handler, new_id_handler};
use crate::state::AppState;

pub struct App {}

impl App {
    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/new-id", get(new_id_handler))
            .route("/new-code", get(new_code_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}
