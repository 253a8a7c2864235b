//! Notification pipeline metrics.
//!
//! Counters are updated with relaxed atomics from the feed processor and the
//! event bus, and can be exported in Prometheus text format.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Kind of per-commit diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The store rejected a commit.
    Apply,
    /// A committed card was missing afterwards.
    Lookup,
    /// A command action could not be decoded.
    MalformedCommand,
}

/// Central counters for the notification pipeline.
pub struct FeedMetrics {
    started_at: Instant,

    // Ingest
    batches: AtomicU64,
    commits: AtomicU64,
    card_updates: AtomicU64,
    commands: AtomicU64,

    // Diagnostics
    apply_failures: AtomicU64,
    lookup_failures: AtomicU64,
    malformed_commands: AtomicU64,

    // Fan-out
    published: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    predicate_failures: AtomicU64,
}

/// Point-in-time copy of [`FeedMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub batches: u64,
    pub commits: u64,
    pub card_updates: u64,
    pub commands: u64,
    pub apply_failures: u64,
    pub lookup_failures: u64,
    pub malformed_commands: u64,
    pub published: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub predicate_failures: u64,
}

impl FeedMetrics {
    /// Create a zeroed metrics set.
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            batches: AtomicU64::new(0),
            commits: AtomicU64::new(0),
            card_updates: AtomicU64::new(0),
            commands: AtomicU64::new(0),
            apply_failures: AtomicU64::new(0),
            lookup_failures: AtomicU64::new(0),
            malformed_commands: AtomicU64::new(0),
            published: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            predicate_failures: AtomicU64::new(0),
        }
    }

    /// Record a diffed batch.
    pub fn record_batch(&self, commits: u64, card_updates: u64, commands: u64) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.commits.fetch_add(commits, Ordering::Relaxed);
        self.card_updates.fetch_add(card_updates, Ordering::Relaxed);
        self.commands.fetch_add(commands, Ordering::Relaxed);
    }

    /// Record a per-commit diagnostic.
    pub fn record_failure(&self, kind: FailureKind) {
        let counter = match kind {
            FailureKind::Apply => &self.apply_failures,
            FailureKind::Lookup => &self.lookup_failures,
            FailureKind::MalformedCommand => &self.malformed_commands,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a published event.
    pub fn record_publish(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a delivery into a subscriber queue.
    pub fn record_delivery(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a delivery dropped because the subscriber queue was full or closed.
    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a filter that failed to evaluate.
    pub fn record_predicate_failure(&self) {
        self.predicate_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Copy the current counter values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            batches: load(&self.batches),
            commits: load(&self.commits),
            card_updates: load(&self.card_updates),
            commands: load(&self.commands),
            apply_failures: load(&self.apply_failures),
            lookup_failures: load(&self.lookup_failures),
            malformed_commands: load(&self.malformed_commands),
            published: load(&self.published),
            delivered: load(&self.delivered),
            dropped: load(&self.dropped),
            predicate_failures: load(&self.predicate_failures),
        }
    }

    /// Export to Prometheus text format.
    pub fn to_prometheus(&self) -> String {
        let snap = self.snapshot();
        let counters = [
            ("batches_total", "Commit batches processed", snap.batches),
            ("commits_total", "Commits diffed", snap.commits),
            ("card_updates_total", "Card update events derived", snap.card_updates),
            ("commands_total", "Command executed events derived", snap.commands),
            ("apply_failures_total", "Commits rejected by the card store", snap.apply_failures),
            ("lookup_failures_total", "Committed cards missing after apply", snap.lookup_failures),
            ("malformed_commands_total", "Command actions that could not be decoded", snap.malformed_commands),
            ("events_published_total", "Events published to the bus", snap.published),
            ("deliveries_total", "Events queued for subscribers", snap.delivered),
            ("deliveries_dropped_total", "Deliveries dropped on full or closed queues", snap.dropped),
            ("predicate_failures_total", "Subscription filters that failed to evaluate", snap.predicate_failures),
        ];

        let mut out = String::new();
        out.push_str("# HELP cardwatch_uptime_seconds Process uptime in seconds\n");
        out.push_str("# TYPE cardwatch_uptime_seconds gauge\n");
        out.push_str(&format!("cardwatch_uptime_seconds {}\n", self.uptime_secs()));

        for (name, help, value) in counters {
            out.push_str(&format!("\n# HELP cardwatch_{} {}\n", name, help));
            out.push_str(&format!("# TYPE cardwatch_{} counter\n", name));
            out.push_str(&format!("cardwatch_{} {}\n", name, value));
        }

        out
    }
}

impl Default for FeedMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics handle.
pub type SharedFeedMetrics = Arc<FeedMetrics>;

/// Create a new shared metrics set.
pub fn new_shared_metrics() -> SharedFeedMetrics {
    Arc::new(FeedMetrics::new())
}
