//! In-process, topic-keyed event bus.
//!
//! [`EventBus`] is the publish/subscribe hub for [`UserEvent`]s. Every call to
//! [`subscribe`](EventBus::subscribe) creates an independent bounded channel
//! registered under a topic; [`publish`](EventBus::publish) hands a copy of the
//! event to every channel registered under that topic at that moment. There is
//! no history and no replay.
//!
//! The bus is designed to be shared via `Arc<EventBus>` and shut down
//! explicitly with [`close`](EventBus::close), which drops every registered
//! sender so receive loops observe end-of-stream.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};
use tokio::sync::{mpsc, RwLock};

use crate::event::UserEvent;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Default per-subscriber buffer: one pending event.
pub const DEFAULT_CAPACITY: usize = 1;

/// Default time a publish waits on a full subscriber buffer before dropping.
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(1);

/// What [`EventBus::publish`] does when a subscriber's buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Wait until the subscriber frees space. A stalled subscriber stalls
    /// the publisher (and therefore the write path) indefinitely.
    ///
    /// The waiting publish holds the registry read lock, so
    /// [`EventBus::close`] and any new `subscribe` also wait until the
    /// consumer catches up. Only use this when every consumer is known to
    /// keep draining its subscription.
    Block,
    /// Wait up to the given duration, then drop the event for that
    /// subscriber and count it in [`EventBus::dropped_events`].
    Timeout(Duration),
    /// Never wait. Drop and count immediately if the buffer is full.
    DropNewest,
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        Self::Timeout(DEFAULT_PUBLISH_TIMEOUT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    /// Buffered events per subscription. Values below 1 are treated as 1.
    pub capacity: usize,
    pub overflow: OverflowPolicy,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            overflow: OverflowPolicy::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Registry {
    topics: HashMap<String, Vec<mpsc::Sender<UserEvent>>>,
    closed: bool,
}

enum DeliveryFailure {
    Full,
    Disconnected,
}

/// In-process fan-out event bus keyed by topic.
///
/// The registration table sits behind a read/write lock: publishes hold the
/// read side and may run concurrently with each other; subscribe and close
/// take the write side, so no publish overlaps a close.
///
/// # Usage
///
/// ```rust
/// use roster_events::{EventBus, UserEvent};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe("create").await;
///
/// bus.publish("create", UserEvent {
///     id: "u-1".into(),
///     first_name: None,
///     last_name: None,
///     email: None,
/// }).await;
/// assert_eq!(rx.recv().await.unwrap().id, "u-1");
/// # }
/// ```
pub struct EventBus {
    config: BusConfig,
    registry: RwLock<Registry>,
    dropped: AtomicU64,
}

impl EventBus {
    pub fn new(config: BusConfig) -> Self {
        Self {
            config,
            registry: RwLock::new(Registry::default()),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> BusConfig {
        self.config
    }

    /// Register a new subscription under `topic` and return its read end.
    ///
    /// Only events published after this call are visible. Subscribing to a
    /// closed bus returns a receiver that is already at end-of-stream.
    pub async fn subscribe(&self, topic: &str) -> mpsc::Receiver<UserEvent> {
        let (sender, receiver) = mpsc::channel(self.config.capacity.max(1));

        let mut registry = self.registry.write().await;
        if registry.closed {
            tracing::debug!(topic, "Subscribe on closed event bus");
            return receiver;
        }

        let subscribers = registry.topics.entry(topic.to_string()).or_default();
        // Prune subscriptions whose consumers have gone away.
        subscribers.retain(|s| !s.is_closed());
        subscribers.push(sender);
        tracing::debug!(topic, subscribers = subscribers.len(), "Subscriber registered");

        receiver
    }

    /// Deliver a copy of `event` to every subscriber of `topic`.
    ///
    /// Returns the number of subscribers that accepted the event. Publishing
    /// to a closed bus, or to a topic nobody listens on, is a silent no-op.
    pub async fn publish(&self, topic: &str, event: UserEvent) -> usize {
        let registry = self.registry.read().await;
        if registry.closed {
            tracing::trace!(topic, "Publish on closed event bus dropped");
            return 0;
        }
        let Some(subscribers) = registry.topics.get(topic) else {
            return 0;
        };

        let mut delivered = 0;
        for sender in subscribers {
            match self.deliver(sender, event.clone()).await {
                Ok(()) => delivered += 1,
                Err(DeliveryFailure::Full) => {
                    let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    tracing::warn!(
                        topic,
                        user_id = %event.id,
                        dropped_total = total,
                        "Subscriber buffer full, event dropped"
                    );
                }
                Err(DeliveryFailure::Disconnected) => {
                    tracing::debug!(topic, "Subscriber gone, skipping");
                }
            }
        }
        delivered
    }

    async fn deliver(
        &self,
        sender: &mpsc::Sender<UserEvent>,
        event: UserEvent,
    ) -> Result<(), DeliveryFailure> {
        match self.config.overflow {
            OverflowPolicy::Block => sender
                .send(event)
                .await
                .map_err(|_| DeliveryFailure::Disconnected),
            OverflowPolicy::Timeout(wait) => {
                sender
                    .send_timeout(event, wait)
                    .await
                    .map_err(|e| match e {
                        SendTimeoutError::Timeout(_) => DeliveryFailure::Full,
                        SendTimeoutError::Closed(_) => DeliveryFailure::Disconnected,
                    })
            }
            OverflowPolicy::DropNewest => sender.try_send(event).map_err(|e| match e {
                TrySendError::Full(_) => DeliveryFailure::Full,
                TrySendError::Closed(_) => DeliveryFailure::Disconnected,
            }),
        }
    }

    /// Close the bus.
    ///
    /// Subsequent publishes become no-ops and every registered sender is
    /// dropped, so consumers blocked in `recv` wake up with `None` once
    /// they drain what is already buffered. Idempotent.
    ///
    /// Waits for in-flight publishes to finish first. Under
    /// [`OverflowPolicy::Block`] that includes publishes stuck on a full
    /// subscriber.
    pub async fn close(&self) {
        let mut registry = self.registry.write().await;
        if registry.closed {
            return;
        }
        registry.closed = true;
        let released: usize = registry.topics.drain().map(|(_, subs)| subs.len()).sum();
        tracing::info!(released, "Event bus closed");
    }

    pub async fn is_closed(&self) -> bool {
        self.registry.read().await.closed
    }

    /// Number of live subscriptions registered under `topic`.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.registry
            .read()
            .await
            .topics
            .get(topic)
            .map_or(0, |subs| subs.iter().filter(|s| !s.is_closed()).count())
    }

    /// Total events dropped because a subscriber's buffer stayed full.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
