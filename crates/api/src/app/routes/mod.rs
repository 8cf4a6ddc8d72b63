use axum::Router;
use axum::routing::{get, post};

use super::AppState;

pub mod auth;
pub mod policy;
pub mod system;
pub mod users;

/// Routes reachable without a token.
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(system::health))
        .route("/api/login", post(auth::login))
}

/// Routes that run behind authentication and authorization.
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/api/me", get(auth::me))
        .route("/api/users", get(users::list).post(users::create))
        .route(
            "/api/users/:id",
            get(users::get).put(users::update).delete(users::delete),
        )
        .route("/api/policy/reload", post(policy::reload))
}
