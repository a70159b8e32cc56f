use crate::webserver::state::AppState;
use axum::{routing::get, Router};
use std::sync::Arc;

pub mod health;
pub mod ws;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/api", api_routes())
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new().merge(health::routes())
}
