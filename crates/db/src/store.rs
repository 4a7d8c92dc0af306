//! The persistence contract consumed by the directory service.
//!
//! Modelled on a key-filtered document store: insert one, replace one by
//! filter, delete one by filter and a paged, sorted find that yields a lazy
//! sequence of per-record decode results.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use roster_core::types::UserId;

use crate::models::user::User;

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A database driver error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored record could not be decoded into a [`User`].
    #[error("Failed to decode user record: {0}")]
    Decode(String),

    /// A record with the same key already exists.
    #[error("Duplicate key: {0}")]
    Duplicate(UserId),

    /// The operation did not finish within its deadline.
    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),

    /// The store cannot be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Lazy sequence of records returned by [`UserStore::find`].
///
/// Each item is decoded independently, so one corrupt record does not poison
/// the rest of the page.
pub type UserCursor = BoxStream<'static, Result<User, StoreError>>;

/// Equality filter over user records. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub id: Option<UserId>,
    pub country: Option<String>,
}

impl UserFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_id(id: impl Into<UserId>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn by_country(country: impl Into<String>) -> Self {
        Self {
            country: Some(country.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    CreatedAtDesc,
    CreatedAtAsc,
}

/// Window and ordering for [`UserStore::find`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub skip: u64,
    /// `None` returns every record after `skip`.
    pub limit: Option<u64>,
    pub sort: SortOrder,
}

/// A key-filtered user document store.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new record. Fails with [`StoreError::Duplicate`] if the id exists.
    async fn insert_one(&self, user: &User) -> Result<(), StoreError>;

    /// Replace the first record matching `filter` with `replacement`.
    ///
    /// The stored `id` and `created_at` are preserved. Returns the record as
    /// stored after the replacement, or `None` if nothing matched.
    async fn update_one(
        &self,
        filter: &UserFilter,
        replacement: &User,
    ) -> Result<Option<User>, StoreError>;

    /// Delete the first record matching `filter`, returning the number deleted.
    async fn delete_one(&self, filter: &UserFilter) -> Result<u64, StoreError>;

    /// Find records matching `filter` within the `options` window.
    async fn find(
        &self,
        filter: &UserFilter,
        options: &FindOptions,
    ) -> Result<UserCursor, StoreError>;

    /// Check that the store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}
