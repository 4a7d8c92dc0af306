//! In-process document store.
//!
//! Records are held as `serde_json::Value` documents and decoded on read,
//! mirroring a schemaless document database: a malformed document surfaces
//! as a per-record [`StoreError::Decode`] from [`UserStore::find`] instead of
//! failing the whole query.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::StreamExt;
use roster_core::types::{Timestamp, UserId};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::models::user::User;
use crate::store::{FindOptions, SortOrder, StoreError, UserCursor, UserFilter, UserStore};

#[derive(Debug, Default)]
pub struct MemoryUserStore {
    documents: RwLock<BTreeMap<UserId, Value>>,
    /// When set, every operation fails with [`StoreError::Unavailable`].
    outage: RwLock<Option<String>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an arbitrary document under `key`, bypassing encoding.
    ///
    /// Intended for seeding legacy or corrupt documents.
    pub async fn insert_raw(&self, key: impl Into<UserId>, document: Value) {
        self.documents.write().await.insert(key.into(), document);
    }

    /// Simulate the store going down (`Some(reason)`) or coming back (`None`).
    pub async fn set_outage(&self, reason: Option<String>) {
        *self.outage.write().await = reason;
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    async fn ensure_available(&self) -> Result<(), StoreError> {
        match self.outage.read().await.as_ref() {
            Some(reason) => Err(StoreError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

fn encode(user: &User) -> Result<Value, StoreError> {
    serde_json::to_value(user).map_err(|e| StoreError::Decode(e.to_string()))
}

fn decode(document: &Value) -> Result<User, StoreError> {
    serde_json::from_value(document.clone()).map_err(|e| StoreError::Decode(e.to_string()))
}

fn field_equals(document: &Value, field: &str, expected: &str) -> bool {
    document.get(field).and_then(Value::as_str) == Some(expected)
}

fn matches(key: &str, document: &Value, filter: &UserFilter) -> bool {
    let id_ok = filter.id.as_deref().map_or(true, |id| id == key);
    let country_ok = filter
        .country
        .as_deref()
        .map_or(true, |c| field_equals(document, "country", c));
    id_ok && country_ok
}

fn created_at(document: &Value) -> Option<Timestamp> {
    document
        .get("created_at")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert_one(&self, user: &User) -> Result<(), StoreError> {
        self.ensure_available().await?;
        let document = encode(user)?;
        let mut documents = self.documents.write().await;
        if documents.contains_key(&user.id) {
            return Err(StoreError::Duplicate(user.id.clone()));
        }
        documents.insert(user.id.clone(), document);
        Ok(())
    }

    async fn update_one(
        &self,
        filter: &UserFilter,
        replacement: &User,
    ) -> Result<Option<User>, StoreError> {
        self.ensure_available().await?;
        let mut documents = self.documents.write().await;

        let Some((key, existing)) = documents
            .iter_mut()
            .find(|(key, doc)| matches(key, doc, filter))
        else {
            return Ok(None);
        };

        let stored = User {
            id: key.clone(),
            created_at: created_at(existing).unwrap_or(replacement.created_at),
            ..replacement.clone()
        };
        *existing = encode(&stored)?;
        Ok(Some(stored))
    }

    async fn delete_one(&self, filter: &UserFilter) -> Result<u64, StoreError> {
        self.ensure_available().await?;
        let mut documents = self.documents.write().await;

        let key = documents
            .iter()
            .find(|(key, doc)| matches(key, doc, filter))
            .map(|(key, _)| key.clone());

        Ok(match key {
            Some(key) => {
                documents.remove(&key);
                1
            }
            None => 0,
        })
    }

    async fn find(
        &self,
        filter: &UserFilter,
        options: &FindOptions,
    ) -> Result<UserCursor, StoreError> {
        self.ensure_available().await?;
        let documents = self.documents.read().await;

        let mut selected: Vec<(&UserId, &Value)> = documents
            .iter()
            .filter(|(key, doc)| matches(key, doc, filter))
            .collect();

        // Documents without a readable timestamp sort last in either order.
        selected.sort_by(|(ka, a), (kb, b)| {
            let order = match (created_at(a), created_at(b)) {
                (Some(a), Some(b)) => match options.sort {
                    SortOrder::CreatedAtDesc => b.cmp(&a),
                    SortOrder::CreatedAtAsc => a.cmp(&b),
                },
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            };
            order.then_with(|| ka.cmp(kb))
        });

        let limit = options.limit.map_or(usize::MAX, |l| l as usize);
        let page: Vec<Result<User, StoreError>> = selected
            .into_iter()
            .skip(options.skip as usize)
            .take(limit)
            .map(|(_, doc)| decode(doc))
            .collect();

        Ok(futures::stream::iter(page).boxed())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.ensure_available().await
    }
}
