pub mod health;
pub mod users;

use axum::Router;

use crate::state::AppState;

/// Build the public route tree.
///
/// ```text
/// /user            create (POST), update (PUT), list (GET)
/// /user/{id}       remove (DELETE)
/// ```
///
/// The health check is served separately on the management listener; see
/// [`health::router`].
pub fn api_routes() -> Router<AppState> {
    Router::new().merge(users::router())
}
