//! HTTP routes and router assembly

pub mod account;
pub mod contact;
pub mod posts;

use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::auth::{require_login, session_layer};
use crate::state::AppState;

/// Liveness probe.
async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Build the application router.
///
/// The session layer wraps everything, so it runs before the per-route
/// login gate and before any handler inspects authentication state.
pub fn create_router(state: AppState) -> Router {
    let gated = Router::new()
        .route("/posts", post(posts::create_post))
        .route("/posts/{id}/like", post(posts::toggle_like))
        .route("/dashboard", get(posts::dashboard))
        .route_layer(middleware::from_fn(require_login));

    Router::new()
        .route("/", get(posts::list_posts))
        .route("/posts/{slug}", get(posts::post_detail))
        .route("/contact", post(contact::submit_contact))
        .route("/login", get(account::login_page).post(account::login))
        .route("/register", post(account::register))
        .route("/logout", post(account::logout))
        .route("/healthz", get(healthz))
        .merge(gated)
        .layer(middleware::from_fn_with_state(state.clone(), session_layer))
        .with_state(state)
}
