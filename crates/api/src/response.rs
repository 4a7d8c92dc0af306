//! Shared response body types for API handlers.

use serde::Serialize;

/// `{ "message": "..." }` acknowledgement body for operations that return
/// no resource.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
