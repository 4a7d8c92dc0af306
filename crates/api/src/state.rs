use std::sync::Arc;

use roster_directory::UserDirectory;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything lives behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// User CRUD service. Also owns the store and event bus handles.
    pub directory: Arc<UserDirectory>,
}
