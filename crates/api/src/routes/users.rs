use axum::routing::{delete, get};
use axum::Router;

use crate::handlers::users;
use crate::state::AppState;

/// Mount the user CRUD routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/user",
            get(users::list_users)
                .post(users::create_user)
                .put(users::update_user),
        )
        .route("/user/{id}", delete(users::remove_user))
}
