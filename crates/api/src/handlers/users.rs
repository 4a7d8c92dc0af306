//! Handlers for the `/user` resource.
//!
//! Handlers are thin: they extract the request, call the
//! [`UserDirectory`](roster_directory::UserDirectory) and shape the response.
//! Password hashes never leave the service; every user body is a
//! [`UserResponse`].

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use roster_core::paging::PageRequest;
use roster_db::models::user::{UserInput, UserResponse};

use crate::error::AppResult;
use crate::response::MessageResponse;
use crate::state::AppState;

/// POST /user
///
/// Create a new user. The body must not carry an `id`. Returns 201 Created.
pub async fn create_user(
    State(state): State<AppState>,
    Json(input): Json<UserInput>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    let user = state.directory.create(input).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// PUT /user
///
/// Replace the fields of the user named by the body's `id`.
pub async fn update_user(
    State(state): State<AppState>,
    Json(input): Json<UserInput>,
) -> AppResult<Json<UserResponse>> {
    let user = state.directory.update(input).await?;
    Ok(Json(user.into()))
}

/// GET /user?page=&size=&country=
///
/// One page of users, newest first.
pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<PageRequest>,
) -> AppResult<Json<Vec<UserResponse>>> {
    let users = state.directory.list(&params).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// DELETE /user/{id}
pub async fn remove_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    state.directory.remove(&id).await?;
    Ok(Json(MessageResponse {
        message: "User removed",
    }))
}
