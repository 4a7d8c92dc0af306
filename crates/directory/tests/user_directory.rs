//! Behavioural tests for `UserDirectory`: validation, hashing, persistence
//! ordering and the events each operation publishes.

mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use common::{directory, test_bus, Behavior, Call, RecordingStore};
use roster_core::error::CoreError;
use roster_core::paging::PageRequest;
use roster_core::password::verify_password;
use roster_db::models::user::{User, UserInput};
use roster_db::{MemoryUserStore, SortOrder, StoreError, UserFilter};
use roster_directory::DirectoryError;
use roster_events::{UserNotifier, TOPIC_USER_CREATED, TOPIC_USER_UPDATED};

fn input(password: &str) -> UserInput {
    UserInput {
        first_name: Some("Ada".into()),
        last_name: Some("Lovelace".into()),
        email: Some("ada@example.com".into()),
        country: Some("UK".into()),
        password: Some(password.into()),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// create
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_assigns_id_timestamps_and_hash() {
    let store = RecordingStore::with_behavior(Behavior::Succeed);
    let dir = directory(store.clone(), test_bus());

    let user = dir.create(input("password")).await.unwrap();

    assert!(!user.id.is_empty());
    assert_eq!(user.created_at, user.updated_at);
    assert_ne!(user.password_hash, "password");
    assert!(verify_password("password", &user.password_hash).unwrap());

    let calls = store.calls();
    assert_eq!(calls.len(), 1);
    assert_matches!(&calls[0], Call::Insert(stored) if stored == &user);
}

#[tokio::test]
async fn create_publishes_exactly_one_create_event() {
    let bus = test_bus();
    let mut create_rx = bus.subscribe(TOPIC_USER_CREATED).await;
    let mut update_rx = bus.subscribe(TOPIC_USER_UPDATED).await;
    let dir = directory(RecordingStore::with_behavior(Behavior::Succeed), bus);

    let user = dir.create(input("password")).await.unwrap();

    let event = create_rx.try_recv().expect("create event delivered");
    assert_eq!(event.id, user.id);
    assert_eq!(event.first_name.as_deref(), Some("Ada"));
    assert_eq!(event.email.as_deref(), Some("ada@example.com"));
    assert!(create_rx.try_recv().is_err(), "exactly one create event");
    assert!(update_rx.try_recv().is_err(), "no update event");
}

#[tokio::test]
async fn create_with_caller_id_is_rejected_before_persistence() {
    let bus = test_bus();
    let mut create_rx = bus.subscribe(TOPIC_USER_CREATED).await;
    let store = RecordingStore::with_behavior(Behavior::Succeed);
    let dir = directory(store.clone(), bus);

    let mut with_id = input("password");
    with_id.id = Some("chosen-by-client".into());

    let err = dir.create(with_id).await.unwrap_err();
    assert_matches!(err, DirectoryError::Core(CoreError::Validation(_)));
    assert!(store.calls().is_empty());
    assert!(create_rx.try_recv().is_err());
}

#[tokio::test]
async fn create_with_whitespace_id_is_rejected() {
    let store = RecordingStore::with_behavior(Behavior::Succeed);
    let dir = directory(store.clone(), test_bus());

    let mut blank = input("password");
    blank.id = Some("   ".into());

    let err = dir.create(blank).await.unwrap_err();
    assert_matches!(err, DirectoryError::Core(CoreError::Validation(_)));
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn create_with_empty_id_is_accepted() {
    let dir = directory(RecordingStore::with_behavior(Behavior::Succeed), test_bus());
    let mut empty = input("password");
    empty.id = Some(String::new());

    let user = dir.create(empty).await.unwrap();
    assert!(!user.id.is_empty());
}

#[tokio::test]
async fn create_without_password_hashes_empty_string() {
    let dir = directory(RecordingStore::with_behavior(Behavior::Succeed), test_bus());
    let mut no_password = input("");
    no_password.password = None;

    let user = dir.create(no_password).await.unwrap();
    assert!(verify_password("", &user.password_hash).unwrap());
}

#[tokio::test]
async fn create_persistence_failure_returns_error_and_publishes_nothing() {
    let bus = test_bus();
    let mut create_rx = bus.subscribe(TOPIC_USER_CREATED).await;
    let dir = directory(
        RecordingStore::with_behavior(Behavior::Fail("cannot insert!".into())),
        bus,
    );

    let err = dir.create(input("password")).await.unwrap_err();
    assert_matches!(
        err,
        DirectoryError::Persistence(StoreError::Unavailable(msg)) if msg == "cannot insert!"
    );
    assert!(create_rx.try_recv().is_err());
}

#[tokio::test]
async fn create_store_timeout_is_a_persistence_error() {
    let bus = test_bus();
    let mut create_rx = bus.subscribe(TOPIC_USER_CREATED).await;
    let dir = directory(RecordingStore::with_behavior(Behavior::Hang), bus);

    let err = dir.create(input("password")).await.unwrap_err();
    assert_matches!(err, DirectoryError::Persistence(StoreError::Timeout(_)));
    assert!(create_rx.try_recv().is_err());
}

// ---------------------------------------------------------------------------
// update
// ---------------------------------------------------------------------------

#[tokio::test]
async fn update_rehashes_and_publishes_one_update_event() {
    let bus = test_bus();
    let mut create_rx = bus.subscribe(TOPIC_USER_CREATED).await;
    let mut update_rx = bus.subscribe(TOPIC_USER_UPDATED).await;
    let store = RecordingStore::with_behavior(Behavior::Succeed);
    let dir = directory(store.clone(), bus);

    let mut change = input("new-password");
    change.id = Some("u-1".into());
    let user = dir.update(change).await.unwrap();

    assert_eq!(user.id, "u-1");
    assert!(verify_password("new-password", &user.password_hash).unwrap());

    assert_matches!(
        &store.calls()[..],
        [Call::Update(filter, replacement)]
            if filter == &UserFilter::by_id("u-1") && replacement.id == "u-1"
    );

    assert!(create_rx.try_recv().is_err(), "no create event");
    let event = update_rx.try_recv().expect("update event delivered");
    assert_eq!(event.id, "u-1");
    assert!(update_rx.try_recv().is_err(), "exactly one update event");
}

#[tokio::test]
async fn update_without_id_is_rejected_before_persistence() {
    let store = RecordingStore::with_behavior(Behavior::Succeed);
    let dir = directory(store.clone(), test_bus());

    let err = dir.update(input("password")).await.unwrap_err();
    assert_matches!(err, DirectoryError::Core(CoreError::Validation(_)));

    let mut empty = input("password");
    empty.id = Some(String::new());
    let err = dir.update(empty).await.unwrap_err();
    assert_matches!(err, DirectoryError::Core(CoreError::Validation(_)));

    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn update_keeps_the_id_exactly_as_supplied() {
    let store = RecordingStore::with_behavior(Behavior::Succeed);
    let dir = directory(store.clone(), test_bus());

    let mut padded = input("password");
    padded.id = Some(" u-1 ".into());
    dir.update(padded).await.unwrap();

    assert_matches!(
        &store.calls()[..],
        [Call::Update(filter, _)] if filter == &UserFilter::by_id(" u-1 ")
    );
}

#[tokio::test]
async fn update_persistence_failure_publishes_nothing() {
    let bus = test_bus();
    let mut update_rx = bus.subscribe(TOPIC_USER_UPDATED).await;
    let dir = directory(
        RecordingStore::with_behavior(Behavior::Fail("cannot update!".into())),
        bus,
    );

    let mut change = input("password");
    change.id = Some("u-1".into());
    let err = dir.update(change).await.unwrap_err();

    assert_eq!(err.to_string(), "Store unavailable: cannot update!");
    assert!(update_rx.try_recv().is_err());
}

#[tokio::test]
async fn update_of_unknown_id_succeeds_and_publishes() {
    let bus = test_bus();
    let mut update_rx = bus.subscribe(TOPIC_USER_UPDATED).await;
    let dir = directory(RecordingStore::with_behavior(Behavior::NoMatch), bus);

    let mut change = input("password");
    change.id = Some("ghost".into());
    let user = dir.update(change).await.unwrap();

    assert_eq!(user.id, "ghost");
    assert_eq!(user.first_name.as_deref(), Some("Ada"));
    let event = update_rx.try_recv().expect("update event delivered");
    assert_eq!(event.id, "ghost");
    assert!(update_rx.try_recv().is_err(), "exactly one update event");
}

#[tokio::test]
async fn update_of_unknown_id_in_memory_store_creates_nothing() {
    let store = Arc::new(MemoryUserStore::new());
    let bus = test_bus();
    let mut update_rx = bus.subscribe(TOPIC_USER_UPDATED).await;
    let dir = directory(store.clone(), bus);

    let mut change = input("password");
    change.id = Some("ghost".into());
    dir.update(change).await.unwrap();

    assert!(store.is_empty().await);
    assert_eq!(update_rx.try_recv().unwrap().id, "ghost");
}

// ---------------------------------------------------------------------------
// remove
// ---------------------------------------------------------------------------

#[tokio::test]
async fn remove_deletes_by_id_without_events() {
    let bus = test_bus();
    let mut create_rx = bus.subscribe(TOPIC_USER_CREATED).await;
    let mut update_rx = bus.subscribe(TOPIC_USER_UPDATED).await;
    let store = RecordingStore::with_behavior(Behavior::Succeed);
    let dir = directory(store.clone(), bus);

    dir.remove("u-1").await.unwrap();

    assert_matches!(&store.calls()[..], [Call::Delete(f)] if f == &UserFilter::by_id("u-1"));
    assert!(create_rx.try_recv().is_err());
    assert!(update_rx.try_recv().is_err());
}

#[tokio::test]
async fn remove_with_empty_id_is_rejected_before_persistence() {
    let store = RecordingStore::with_behavior(Behavior::Succeed);
    let dir = directory(store.clone(), test_bus());

    let err = dir.remove("").await.unwrap_err();
    assert_matches!(err, DirectoryError::Core(CoreError::Validation(_)));
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn remove_does_not_trim_the_id() {
    let store = Arc::new(MemoryUserStore::new());
    let dir = directory(store.clone(), test_bus());
    let user = dir.create(input("password")).await.unwrap();

    dir.remove(&format!(" {} ", user.id)).await.unwrap();
    assert_eq!(store.len().await, 1, "padded id must not match");

    dir.remove(&user.id).await.unwrap();
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn remove_persistence_failure_is_returned() {
    let dir = directory(
        RecordingStore::with_behavior(Behavior::Fail("cannot remove!".into())),
        test_bus(),
    );

    let err = dir.remove("u-1").await.unwrap_err();
    assert_matches!(
        err,
        DirectoryError::Persistence(StoreError::Unavailable(msg)) if msg == "cannot remove!"
    );
}

// ---------------------------------------------------------------------------
// list
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_requests_skip_limit_filter_and_sort() {
    let store = RecordingStore::with_behavior(Behavior::Succeed);
    let dir = directory(store.clone(), test_bus());

    let users = dir.list(&PageRequest::new(2, 10, "US")).await.unwrap();
    assert!(users.is_empty());

    let calls = store.calls();
    let [Call::Find(filter, options)] = &calls[..] else {
        panic!("expected a single find call, got {calls:?}");
    };
    assert_eq!(filter, &UserFilter::by_country("US"));
    assert_eq!(options.skip, 10);
    assert_eq!(options.limit, Some(10));
    assert_eq!(options.sort, SortOrder::CreatedAtDesc);
}

#[tokio::test]
async fn list_without_country_does_not_filter() {
    let store = RecordingStore::with_behavior(Behavior::Succeed);
    let dir = directory(store.clone(), test_bus());

    dir.list(&PageRequest::default()).await.unwrap();

    assert_matches!(&store.calls()[..], [Call::Find(f, _)] if f == &UserFilter::all());
}

#[tokio::test]
async fn list_skips_undecodable_records() {
    let store = RecordingStore::with_behavior(Behavior::Succeed);
    let now = chrono::Utc::now();
    let good = User {
        id: "u-1".into(),
        first_name: None,
        last_name: None,
        nickname: None,
        password_hash: "hash".into(),
        email: None,
        country: None,
        created_at: now,
        updated_at: now,
    };
    *store.find_results.lock().unwrap() = vec![
        Err(StoreError::Decode("bad".into())),
        Ok(good.clone()),
        Err(StoreError::Decode("worse".into())),
    ];
    let dir = directory(store, test_bus());

    let users = dir.list(&PageRequest::default()).await.unwrap();
    assert_eq!(users, vec![good]);
}

#[tokio::test]
async fn list_rejects_oversized_pages_before_the_store() {
    let store = RecordingStore::with_behavior(Behavior::Succeed);
    let dir = directory(store.clone(), test_bus());

    let err = dir.list(&PageRequest::new(1, 101, "")).await.unwrap_err();
    assert_matches!(err, DirectoryError::Core(CoreError::Validation(_)));
    assert!(store.calls().is_empty());

    dir.list(&PageRequest::new(1, 100, "")).await.unwrap();
    assert_matches!(
        &store.calls()[..],
        [Call::Find(_, options)] if options.limit == Some(100)
    );
}

#[tokio::test]
async fn list_persistence_failure_is_returned() {
    let dir = directory(
        RecordingStore::with_behavior(Behavior::Fail("cannot find!".into())),
        test_bus(),
    );
    let err = dir.list(&PageRequest::default()).await.unwrap_err();
    assert_matches!(err, DirectoryError::Persistence(StoreError::Unavailable(_)));
}

// ---------------------------------------------------------------------------
// End to end with the in-memory store and the notifier
// ---------------------------------------------------------------------------

#[tokio::test]
async fn memory_store_round_trip_with_notifier() {
    let store = Arc::new(MemoryUserStore::new());
    let bus = test_bus();
    let notifier = UserNotifier::new(None).spawn(&bus).await;
    let dir = directory(store.clone(), bus.clone());

    let created = dir.create(input("password")).await.unwrap();

    let mut change = input("password");
    change.id = Some(created.id.clone());
    change.first_name = Some("Augusta".into());
    change.country = Some("US".into());
    let updated = dir.update(change).await.unwrap();

    assert_eq!(updated.id, created.id);
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at >= updated.created_at);
    assert_eq!(updated.first_name.as_deref(), Some("Augusta"));

    let page = dir.list(&PageRequest::new(1, 10, "US")).await.unwrap();
    assert_eq!(page, vec![updated.clone()]);
    assert!(dir.list(&PageRequest::new(1, 10, "UK")).await.unwrap().is_empty());

    dir.remove(&created.id).await.unwrap();
    assert!(store.is_empty().await);

    bus.close().await;
    assert_eq!(notifier.join().await, 2, "one create and one update handled");
}
