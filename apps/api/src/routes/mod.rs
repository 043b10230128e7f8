pub mod health;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::schedule::handlers as schedule;
use crate::state::AppState;
use crate::users::handlers as users;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Users API
        .route("/api/v1/users/signup", post(users::handle_signup))
        .route("/api/v1/users/login", post(users::handle_login))
        .route("/api/v1/users/health", get(users::handle_users_health))
        .route(
            "/api/v1/users/:uid",
            get(users::handle_get_user)
                .put(users::handle_update_user)
                .delete(users::handle_delete_user),
        )
        // Schedule API
        .route("/api/v1/schedule", post(schedule::handle_interpret))
        .route("/api/v1/schedule/preview", post(schedule::handle_preview))
        .route("/api/v1/schedule/entries", get(schedule::handle_list_entries))
        .route("/api/v1/schedule/static", post(schedule::handle_create_static))
        .route("/api/v1/schedule/dynamic", post(schedule::handle_create_dynamic))
        .route(
            "/api/v1/schedule/static/:id",
            delete(schedule::handle_delete_static),
        )
        .route(
            "/api/v1/schedule/dynamic/:id",
            delete(schedule::handle_delete_dynamic),
        )
        .with_state(state)
}
