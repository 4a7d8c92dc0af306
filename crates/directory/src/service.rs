//! CRUD operations on user records with post-commit notifications.
//!
//! Every mutating call persists first and publishes second. A failed store
//! call returns its error and publishes nothing, so the bus never reports a
//! mutation that did not happen. Deletions are not announced.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use roster_core::error::CoreError;
use roster_core::paging::PageRequest;
use roster_core::password::hash_password;
use roster_core::types::new_user_id;
use roster_db::models::user::{User, UserInput};
use roster_db::{FindOptions, SortOrder, StoreError, UserFilter, UserStore};
use roster_events::{EventBus, UserEvent, TOPIC_USER_CREATED, TOPIC_USER_UPDATED};

use crate::error::DirectoryError;

/// Deadline applied to each store call unless configured otherwise.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
pub struct DirectoryConfig {
    /// Upper bound on a single store operation.
    pub store_timeout: Duration,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

pub struct UserDirectory {
    store: Arc<dyn UserStore>,
    bus: Arc<EventBus>,
    config: DirectoryConfig,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn UserStore>, bus: Arc<EventBus>, config: DirectoryConfig) -> Self {
        Self { store, bus, config }
    }

    pub fn store(&self) -> &Arc<dyn UserStore> {
        &self.store
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Create a new user.
    ///
    /// The caller must not choose the id. Assigns a fresh id, stamps both
    /// timestamps with the same instant, hashes the password, inserts, then
    /// publishes on [`TOPIC_USER_CREATED`].
    pub async fn create(&self, input: UserInput) -> Result<User, DirectoryError> {
        if input.supplied_id().is_some() {
            return Err(DirectoryError::validation(
                "User ID should be empty when creating a new user; \
                 use update to modify an existing user",
            ));
        }

        let password_hash = hash_off_thread(input.password.unwrap_or_default()).await?;
        let now = Utc::now();
        let user = User {
            id: new_user_id(),
            first_name: input.first_name,
            last_name: input.last_name,
            nickname: input.nickname,
            password_hash,
            email: input.email,
            country: input.country,
            created_at: now,
            updated_at: now,
        };

        self.bounded(self.store.insert_one(&user)).await?;
        tracing::info!(user_id = %user.id, "User created");

        let delivered = self
            .bus
            .publish(TOPIC_USER_CREATED, UserEvent::from(&user))
            .await;
        tracing::debug!(user_id = %user.id, delivered, "User created event published");

        Ok(user)
    }

    /// Replace the fields of the user with the given id.
    ///
    /// Whatever password is supplied is re-hashed. The store keeps the
    /// existing record's id and `created_at`. Existence is not checked: when
    /// no record has the id the store changes nothing, the call still
    /// succeeds with the replacement and an update event is published.
    pub async fn update(&self, input: UserInput) -> Result<User, DirectoryError> {
        let id = input
            .supplied_id()
            .ok_or_else(|| DirectoryError::validation("User ID is required"))?
            .to_string();

        let password_hash = hash_off_thread(input.password.unwrap_or_default()).await?;
        let now = Utc::now();
        let replacement = User {
            id: id.clone(),
            first_name: input.first_name,
            last_name: input.last_name,
            nickname: input.nickname,
            password_hash,
            email: input.email,
            country: input.country,
            created_at: now,
            updated_at: now,
        };

        let stored = match self
            .bounded(self.store.update_one(&UserFilter::by_id(id), &replacement))
            .await?
        {
            Some(stored) => {
                tracing::info!(user_id = %stored.id, "User updated");
                stored
            }
            None => {
                tracing::warn!(user_id = %replacement.id, "Update matched no user record");
                replacement
            }
        };

        let delivered = self
            .bus
            .publish(TOPIC_USER_UPDATED, UserEvent::from(&stored))
            .await;
        tracing::debug!(user_id = %stored.id, delivered, "User updated event published");

        Ok(stored)
    }

    /// Delete a user by id. Deleting an id that does not exist succeeds.
    pub async fn remove(&self, id: &str) -> Result<(), DirectoryError> {
        if id.is_empty() {
            return Err(DirectoryError::validation("User ID is required"));
        }

        let deleted = self.bounded(self.store.delete_one(&UserFilter::by_id(id))).await?;
        tracing::info!(user_id = %id, deleted, "User removed");
        Ok(())
    }

    /// List one page of users, newest first, optionally filtered by country.
    ///
    /// Page sizes above [`MAX_PAGE_SIZE`](roster_core::paging::MAX_PAGE_SIZE)
    /// are rejected before the store is called.
    ///
    /// Records that cannot be decoded are skipped and logged; the rest of
    /// the page is still returned.
    pub async fn list(&self, request: &PageRequest) -> Result<Vec<User>, DirectoryError> {
        request.validate()?;
        let filter = match request.country_filter() {
            Some(country) => UserFilter::by_country(country),
            None => UserFilter::all(),
        };
        let options = FindOptions {
            skip: request.skip(),
            limit: Some(request.limit()),
            sort: SortOrder::CreatedAtDesc,
        };

        let results = self
            .bounded(async {
                let cursor = self.store.find(&filter, &options).await?;
                Ok::<_, StoreError>(cursor.collect::<Vec<_>>().await)
            })
            .await?;

        let mut users = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(user) => users.push(user),
                Err(StoreError::Decode(reason)) => {
                    tracing::warn!(%reason, "Skipping undecodable user record");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(users)
    }

    /// Run a store operation under the configured deadline.
    async fn bounded<T, F>(&self, operation: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let limit = self.config.store_timeout;
        match tokio::time::timeout(limit, operation).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(timeout = ?limit, "Store operation timed out");
                Err(StoreError::Timeout(limit))
            }
        }
    }
}

/// Hash on the blocking pool; Argon2 takes tens of milliseconds per call.
async fn hash_off_thread(password: String) -> Result<String, DirectoryError> {
    let hashed = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| CoreError::Internal(format!("Password hashing task failed: {e}")))??;
    Ok(hashed)
}
