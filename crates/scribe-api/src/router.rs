use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use serde_json::{Value, json};

use crate::auth::{self, AppState};
use crate::middleware::require_session;
use crate::posts;

/// All API routes. Static upload serving, CORS and tracing are layered on by
/// the server binary.
pub fn build(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/profile", get(auth::profile))
        .route("/logout", post(auth::logout))
        .route("/postList", get(posts::list_posts))
        .route("/postDetail/{post_id}", get(posts::post_detail))
        .route("/health", get(health));

    let protected_routes = Router::new()
        .route("/postWrite", post(posts::write_post))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
