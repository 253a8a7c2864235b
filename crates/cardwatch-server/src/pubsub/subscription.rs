//! Subscription tracking and delivery handles.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use tokio::sync::mpsc::{self, error::TryRecvError};

use cardwatch_proto::{Event, Topic};

use super::filter::SubscriptionFilter;
use super::manager::Registry;

/// Result of offering an event to one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Queued,
    Full,
    Closed,
}

/// A live subscription held by the registry.
pub(crate) struct SubscriptionEntry {
    pub(crate) id: u64,
    pub(crate) client_id: String,
    pub(crate) filter: SubscriptionFilter,
    created_at: Instant,
    events_sent: AtomicU64,
    tx: mpsc::Sender<Arc<Event>>,
}

impl SubscriptionEntry {
    pub(crate) fn new(
        id: u64,
        client_id: impl Into<String>,
        filter: SubscriptionFilter,
        tx: mpsc::Sender<Arc<Event>>,
    ) -> Self {
        Self {
            id,
            client_id: client_id.into(),
            filter,
            created_at: Instant::now(),
            events_sent: AtomicU64::new(0),
            tx,
        }
    }

    pub(crate) fn topic(&self) -> Topic {
        self.filter.topic()
    }

    pub(crate) fn events_sent(&self) -> u64 {
        self.events_sent.load(Ordering::Relaxed)
    }

    /// Queue an event without waiting on the subscriber.
    pub(crate) fn offer(&self, event: &Arc<Event>) -> Delivery {
        match self.tx.try_send(Arc::clone(event)) {
            Ok(()) => {
                self.events_sent.fetch_add(1, Ordering::Relaxed);
                Delivery::Queued
            }
            Err(mpsc::error::TrySendError::Full(_)) => Delivery::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    pub(crate) fn info(&self) -> SubscriptionInfo {
        SubscriptionInfo {
            id: self.id,
            client_id: self.client_id.clone(),
            topic: self.topic(),
            filter: self.filter.clone(),
            created_at: self.created_at,
            events_sent: self.events_sent(),
        }
    }
}

/// Read-only view of a subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionInfo {
    /// Unique subscription ID.
    pub id: u64,
    /// Client identifier.
    pub client_id: String,
    /// Topic being watched.
    pub topic: Topic,
    /// Filter for this subscription.
    pub filter: SubscriptionFilter,
    /// When the subscription was created.
    pub created_at: Instant,
    /// Number of events queued for this subscription.
    pub events_sent: u64,
}

impl SubscriptionInfo {
    /// Get the age of this subscription.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

/// The subscriber's side of a subscription.
///
/// Delivered events are read with [`recv`](Self::recv). Dropping the handle
/// removes the subscription from the bus.
pub struct SubscriptionHandle {
    id: u64,
    topic: Topic,
    rx: mpsc::Receiver<Arc<Event>>,
    registry: Weak<Registry>,
}

impl SubscriptionHandle {
    pub(crate) fn new(
        id: u64,
        topic: Topic,
        rx: mpsc::Receiver<Arc<Event>>,
        registry: Weak<Registry>,
    ) -> Self {
        Self {
            id,
            topic,
            rx,
            registry,
        }
    }

    /// Subscription ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Topic of the subscription.
    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Wait for the next delivered event.
    ///
    /// Returns `None` once the subscription has been removed and every event
    /// queued before the removal has been read.
    pub async fn recv(&mut self) -> Option<Arc<Event>> {
        self.rx.recv().await
    }

    /// Take the next delivered event if one is queued.
    pub fn try_recv(&mut self) -> Option<Arc<Event>> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Drain every queued event.
    pub fn drain(&mut self) -> Vec<Arc<Event>> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Remove the subscription from the bus.
    ///
    /// Returns `false` if it had already been removed.
    pub fn unsubscribe(&self) -> bool {
        self.registry
            .upgrade()
            .map_or(false, |registry| registry.remove(self.id).is_some())
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .finish()
    }
}
