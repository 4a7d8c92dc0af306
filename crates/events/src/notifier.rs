//! User notification consumer.
//!
//! [`UserNotifier`] subscribes to the create and update topics and runs one
//! receive loop per topic. Each received event is logged as a simulated mail
//! send and, when SMTP is configured, delivered through [`EmailDelivery`].
//! Delivery is fire-and-forget: failures are logged, never retried.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::bus::EventBus;
use crate::delivery::email::EmailDelivery;
use crate::event::{UserEvent, TOPIC_USER_CREATED, TOPIC_USER_UPDATED};

/// Topics the notifier listens on.
const TOPICS: [&str; 2] = [TOPIC_USER_CREATED, TOPIC_USER_UPDATED];

pub struct UserNotifier {
    email: Option<EmailDelivery>,
}

impl UserNotifier {
    /// Create a notifier. With `email = None` notifications are only logged.
    pub fn new(email: Option<EmailDelivery>) -> Self {
        Self { email }
    }

    /// Subscribe to every user topic and spawn one receive loop per topic.
    ///
    /// Loops run until the bus is closed (or the bus is dropped).
    pub async fn spawn(self, bus: &EventBus) -> NotifierHandles {
        let notifier = Arc::new(self);
        let mut handles = Vec::with_capacity(TOPICS.len());

        for topic in TOPICS {
            let receiver = bus.subscribe(topic).await;
            tracing::info!(topic, "Subscribed to user event");
            handles.push(tokio::spawn(Arc::clone(&notifier).run(topic, receiver)));
        }

        NotifierHandles { handles }
    }

    /// Drain `receiver` until it closes. Returns the number of events handled.
    async fn run(
        self: Arc<Self>,
        topic: &'static str,
        mut receiver: mpsc::Receiver<UserEvent>,
    ) -> u64 {
        let mut handled = 0;
        while let Some(event) = receiver.recv().await {
            self.notify(topic, &event).await;
            handled += 1;
        }
        tracing::info!(topic, handled, "Event channel closed, notifier shutting down");
        handled
    }

    async fn notify(&self, topic: &str, event: &UserEvent) {
        let action = if topic == TOPIC_USER_CREATED {
            "User created"
        } else {
            "User updated"
        };
        tracing::info!(
            topic,
            user_id = %event.id,
            name = event.display_name(),
            email = event.email.as_deref().unwrap_or(""),
            "{action}, sending mail notification"
        );

        let Some(mailer) = &self.email else {
            return;
        };
        match event.email.as_deref().filter(|e| !e.is_empty()) {
            Some(to) => {
                if let Err(e) = mailer.deliver(to, topic, event).await {
                    tracing::error!(
                        error = %e,
                        topic,
                        user_id = %event.id,
                        "Failed to send notification email"
                    );
                }
            }
            None => {
                tracing::warn!(
                    topic,
                    user_id = %event.id,
                    "No email address, skipping mail delivery"
                );
            }
        }
    }
}

/// Join handles for the notifier's receive loops.
pub struct NotifierHandles {
    handles: Vec<JoinHandle<u64>>,
}

impl NotifierHandles {
    /// Wait for every loop to finish and return the total events handled.
    ///
    /// Loops only finish once the bus is closed, so call this after
    /// [`EventBus::close`].
    pub async fn join(self) -> u64 {
        let mut total = 0;
        for handle in self.handles {
            match handle.await {
                Ok(handled) => total += handled,
                Err(e) => tracing::error!(error = %e, "Notifier task failed"),
            }
        }
        total
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
