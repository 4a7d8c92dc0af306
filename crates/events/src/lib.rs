//! Roster event bus and notification infrastructure.
//!
//! - [`EventBus`] -- in-process, topic-keyed publish/subscribe hub backed by
//!   one bounded `tokio::sync::mpsc` channel per subscriber.
//! - [`UserEvent`] -- the notification payload copied to every subscriber.
//! - [`UserNotifier`] -- long-running consumer that reacts to user events.
//! - [`delivery`] -- external delivery channels (email).

pub mod bus;
pub mod delivery;
pub mod event;
pub mod notifier;

pub use bus::{BusConfig, EventBus, OverflowPolicy};
pub use delivery::email::{EmailConfig, EmailDelivery};
pub use event::{UserEvent, TOPIC_USER_CREATED, TOPIC_USER_UPDATED};
pub use notifier::{NotifierHandles, UserNotifier};
