use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};

use crate::{
    infrastructure::http::{health_check, readiness_check},
    presentation::{
        handlers::{self, AppState},
        middleware::auth::{require_api_key, require_session_and_api_key},
    },
};

/// Create all application routes with application state
pub fn create_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .merge(account_routes())
        .nest("/api/v1/posts", post_routes(&app_state))
        .with_state(app_state)
}

/// Registration and login carry no credentials yet.
fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/users/create", post(handlers::accounts::create_user))
        .route("/api/v1/auth/login", post(handlers::accounts::login))
}

/// Writes need a session token and an API key; reads only an API key.
fn post_routes(state: &AppState) -> Router<AppState> {
    let writes = Router::new()
        .route("/create", post(handlers::posts::create_post))
        .route_layer(from_fn_with_state(state.clone(), require_session_and_api_key));

    let reads = Router::new()
        .route("/list", get(handlers::posts::list_posts))
        .route("/{id}/media", get(handlers::posts::get_post_media))
        .route_layer(from_fn_with_state(state.clone(), require_api_key));

    writes.merge(reads)
}
