//! A recording [`UserStore`] double for directory tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use roster_db::models::user::User;
use roster_db::{FindOptions, StoreError, UserCursor, UserFilter, UserStore};
use roster_directory::{DirectoryConfig, UserDirectory};
use roster_events::{BusConfig, EventBus, OverflowPolicy};

/// One recorded store call.
#[derive(Debug, Clone)]
pub enum Call {
    Insert(User),
    Update(UserFilter, User),
    Delete(UserFilter),
    Find(UserFilter, FindOptions),
}

/// How the store responds.
#[derive(Debug, Clone, Default)]
pub enum Behavior {
    /// Succeed. Updates match and echo the replacement.
    #[default]
    Succeed,
    /// Fail every call with `StoreError::Unavailable(msg)`.
    Fail(String),
    /// Never complete.
    Hang,
    /// Updates match nothing.
    NoMatch,
}

#[derive(Default)]
pub struct RecordingStore {
    pub calls: Mutex<Vec<Call>>,
    pub behavior: Mutex<Behavior>,
    /// Results handed back from `find`.
    pub find_results: Mutex<Vec<Result<User, StoreError>>>,
}

impl RecordingStore {
    pub fn with_behavior(behavior: Behavior) -> Arc<Self> {
        let store = Self::default();
        *store.behavior.lock().unwrap() = behavior;
        Arc::new(store)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    async fn respond(&self, call: Call) -> Result<(), StoreError> {
        self.calls.lock().unwrap().push(call);
        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            Behavior::Fail(msg) => Err(StoreError::Unavailable(msg)),
            Behavior::Hang => std::future::pending().await,
            Behavior::Succeed | Behavior::NoMatch => Ok(()),
        }
    }
}

#[async_trait]
impl UserStore for RecordingStore {
    async fn insert_one(&self, user: &User) -> Result<(), StoreError> {
        self.respond(Call::Insert(user.clone())).await
    }

    async fn update_one(
        &self,
        filter: &UserFilter,
        replacement: &User,
    ) -> Result<Option<User>, StoreError> {
        self.respond(Call::Update(filter.clone(), replacement.clone()))
            .await?;
        let no_match = matches!(*self.behavior.lock().unwrap(), Behavior::NoMatch);
        Ok((!no_match).then(|| replacement.clone()))
    }

    async fn delete_one(&self, filter: &UserFilter) -> Result<u64, StoreError> {
        self.respond(Call::Delete(filter.clone())).await?;
        Ok(1)
    }

    async fn find(
        &self,
        filter: &UserFilter,
        options: &FindOptions,
    ) -> Result<UserCursor, StoreError> {
        self.respond(Call::Find(filter.clone(), options.clone()))
            .await?;
        let results = std::mem::take(&mut *self.find_results.lock().unwrap());
        Ok(futures::stream::iter(results).boxed())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// A bus that never waits on a full buffer, so a forgotten receiver cannot
/// stall a test.
pub fn test_bus() -> Arc<EventBus> {
    Arc::new(EventBus::new(BusConfig {
        capacity: 8,
        overflow: OverflowPolicy::DropNewest,
    }))
}

pub fn directory(store: Arc<dyn UserStore>, bus: Arc<EventBus>) -> UserDirectory {
    UserDirectory::new(
        store,
        bus,
        DirectoryConfig {
            store_timeout: Duration::from_millis(200),
        },
    )
}
