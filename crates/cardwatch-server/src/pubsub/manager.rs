//! Event bus for handling subscriptions and publishing events.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use cardwatch_core::{SharedFeedMetrics, TypeResolver};
use cardwatch_proto::{Event, Topic};

use super::filter::SubscriptionFilter;
use super::subscription::{Delivery, SubscriptionEntry, SubscriptionHandle, SubscriptionInfo};
use crate::config::DEFAULT_STREAM_CAPACITY;
use crate::error::Error;

/// Per-publish delivery counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOutcome {
    /// Subscriptions on the topic that were evaluated.
    pub evaluated: usize,
    /// Subscriptions whose filter accepted the event and got it queued.
    pub delivered: usize,
    /// Accepted deliveries dropped on a full or closed queue.
    pub dropped: usize,
    /// Filters that failed to evaluate.
    pub failed: usize,
}

#[derive(Default)]
struct RegistryState {
    /// Active subscriptions keyed by subscription ID.
    subscriptions: HashMap<u64, SubscriptionEntry>,
    /// Index of subscriptions by topic.
    topic_index: HashMap<Topic, Vec<u64>>,
}

/// Shared subscription registry.
///
/// Publishing holds the read lock while it offers an event to every
/// subscription on the topic; removal takes the write lock. Once a removal
/// returns, no publish can still be offering to the removed subscription.
pub(crate) struct Registry {
    state: RwLock<RegistryState>,
    next_subscription_id: AtomicU64,
    types: Arc<dyn TypeResolver>,
    stream_capacity: usize,
    metrics: SharedFeedMetrics,
}

impl Registry {
    pub(crate) fn remove(&self, subscription_id: u64) -> Option<SubscriptionEntry> {
        let entry = {
            let mut state = self.state.write();
            let entry = state.subscriptions.remove(&subscription_id)?;
            let topic = entry.topic();
            if let Some(ids) = state.topic_index.get_mut(&topic) {
                ids.retain(|&id| id != subscription_id);
                if ids.is_empty() {
                    state.topic_index.remove(&topic);
                }
            }
            entry
        };

        tracing::debug!(
            subscription_id,
            client_id = %entry.client_id,
            topic = %entry.topic(),
            events_sent = entry.events_sent(),
            "subscription removed"
        );

        Some(entry)
    }
}

/// In-process publish/subscribe bus for card notifications.
///
/// Cloning the bus yields another handle to the same registry.
#[derive(Clone)]
pub struct EventBus {
    registry: Arc<Registry>,
}

impl EventBus {
    /// Create a bus with the default per-subscription queue capacity.
    pub fn new(types: Arc<dyn TypeResolver>, metrics: SharedFeedMetrics) -> Self {
        Self::with_capacity(types, metrics, DEFAULT_STREAM_CAPACITY)
    }

    /// Create a bus whose subscriptions queue at most `stream_capacity` events.
    pub fn with_capacity(
        types: Arc<dyn TypeResolver>,
        metrics: SharedFeedMetrics,
        stream_capacity: usize,
    ) -> Self {
        Self {
            registry: Arc::new(Registry {
                state: RwLock::new(RegistryState::default()),
                next_subscription_id: AtomicU64::new(1),
                types,
                stream_capacity: stream_capacity.max(1),
                metrics,
            }),
        }
    }

    /// Subscribe to the topic of `filter`.
    ///
    /// Events accepted by the filter are queued on the returned handle.
    pub fn subscribe(&self, client_id: &str, filter: SubscriptionFilter) -> SubscriptionHandle {
        let subscription_id = self
            .registry
            .next_subscription_id
            .fetch_add(1, Ordering::SeqCst);
        let topic = filter.topic();
        let (tx, rx) = mpsc::channel(self.registry.stream_capacity);

        {
            let mut state = self.registry.state.write();
            state.subscriptions.insert(
                subscription_id,
                SubscriptionEntry::new(subscription_id, client_id, filter, tx),
            );
            state.topic_index.entry(topic).or_default().push(subscription_id);
        }

        tracing::debug!(subscription_id, client_id, topic = %topic, "subscription created");

        SubscriptionHandle::new(subscription_id, topic, rx, Arc::downgrade(&self.registry))
    }

    /// Remove a subscription.
    ///
    /// Idempotent: returns `false` if the subscription was already gone.
    pub fn unsubscribe(&self, subscription_id: u64) -> bool {
        self.registry.remove(subscription_id).is_some()
    }

    /// Publish an event to every subscription on its topic whose filter
    /// accepts it.
    ///
    /// Never waits on subscribers: a full or closed queue loses the event for
    /// that subscriber only. A filter that fails to evaluate counts as a
    /// non-match for its own subscription.
    pub fn publish(&self, event: impl Into<Arc<Event>>) -> PublishOutcome {
        let event: Arc<Event> = event.into();
        let topic = event.topic();
        let registry = &self.registry;
        let mut outcome = PublishOutcome::default();

        registry.metrics.record_publish();

        let state = registry.state.read();
        let Some(ids) = state.topic_index.get(&topic) else {
            tracing::trace!(topic = %topic, "no subscriptions for topic");
            return outcome;
        };

        for entry in ids.iter().filter_map(|id| state.subscriptions.get(id)) {
            outcome.evaluated += 1;

            match entry.filter.evaluate(&event, registry.types.as_ref()) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(Error::Core(cardwatch_core::Error::UnknownTypeRef(type_ref))) => {
                    tracing::trace!(
                        subscription_id = entry.id,
                        type_ref = %type_ref,
                        "filter references unknown card type"
                    );
                    continue;
                }
                // The topic index only pairs a filter with events of its own
                // topic, so this arm is reached only by new filter failures.
                Err(e) => {
                    tracing::warn!(subscription_id = entry.id, error = %e, "subscription filter failed");
                    registry.metrics.record_predicate_failure();
                    outcome.failed += 1;
                    continue;
                }
            }

            match entry.offer(&event) {
                Delivery::Queued => {
                    registry.metrics.record_delivery();
                    outcome.delivered += 1;
                }
                Delivery::Full => {
                    tracing::warn!(
                        subscription_id = entry.id,
                        client_id = %entry.client_id,
                        "subscriber queue full, dropping event"
                    );
                    registry.metrics.record_dropped();
                    outcome.dropped += 1;
                }
                Delivery::Closed => {
                    tracing::debug!(subscription_id = entry.id, "subscriber gone, dropping event");
                    registry.metrics.record_dropped();
                    outcome.dropped += 1;
                }
            }
        }

        tracing::trace!(
            topic = %topic,
            card_id = event.card_id(),
            evaluated = outcome.evaluated,
            delivered = outcome.delivered,
            "published event"
        );

        outcome
    }

    /// Get the number of active subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.registry.state.read().subscriptions.len()
    }

    /// Get subscriptions for a topic.
    pub fn subscriptions_for_topic(&self, topic: Topic) -> Vec<u64> {
        self.registry
            .state
            .read()
            .topic_index
            .get(&topic)
            .cloned()
            .unwrap_or_default()
    }

    /// Get a subscription by ID.
    pub fn get_subscription(&self, subscription_id: u64) -> Option<SubscriptionInfo> {
        self.registry
            .state
            .read()
            .subscriptions
            .get(&subscription_id)
            .map(SubscriptionEntry::info)
    }

    /// Remove all subscriptions for a client, returning how many were removed.
    pub fn remove_client_subscriptions(&self, client_id: &str) -> usize {
        let to_remove: Vec<u64> = {
            let state = self.registry.state.read();
            state
                .subscriptions
                .values()
                .filter(|entry| entry.client_id == client_id)
                .map(|entry| entry.id)
                .collect()
        };

        to_remove
            .into_iter()
            .filter(|&id| self.unsubscribe(id))
            .count()
    }

    /// Metrics shared with the feed.
    pub fn metrics(&self) -> &SharedFeedMetrics {
        &self.registry.metrics
    }

    /// Card type resolver used by filters.
    pub fn types(&self) -> &Arc<dyn TypeResolver> {
        &self.registry.types
    }
}
