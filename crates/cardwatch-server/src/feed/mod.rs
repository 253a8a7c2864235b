//! Commit feed processing.
//!
//! [`ChangeFeed`] diffs one commit batch at a time against the card store and
//! publishes the derived events on the [`EventBus`]. [`FeedProcessor`] runs a
//! change feed as a background task fed through a channel.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info};

use cardwatch_core::{CardStore, CommitDiffer};
use cardwatch_proto::Commit;

use crate::pubsub::EventBus;

/// Counts for one processed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Commits in the batch.
    pub commits: usize,
    /// Card update events published.
    pub card_updates: usize,
    /// Command executed events published.
    pub commands: usize,
    /// Commits or actions skipped with a diagnostic.
    pub diagnostics: usize,
    /// Deliveries queued across all subscribers.
    pub delivered: usize,
}

/// Bridges commit batches to the event bus.
pub struct ChangeFeed {
    store: Arc<dyn CardStore>,
    bus: EventBus,
    /// Held for the whole of a batch so batches never interleave.
    batch_lock: Mutex<()>,
}

impl ChangeFeed {
    /// Create a change feed over a card store.
    pub fn new(store: Arc<dyn CardStore>, bus: EventBus) -> Self {
        Self {
            store,
            bus,
            batch_lock: Mutex::new(()),
        }
    }

    /// Card store the feed applies commits to.
    pub fn store(&self) -> &Arc<dyn CardStore> {
        &self.store
    }

    /// Bus the feed publishes on.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Apply a commit batch and publish its card update and command events.
    ///
    /// Card updates are published before commands, each group in commit
    /// order. Failed commits are logged and skipped.
    pub fn process_commit_batch(&self, commits: &[Commit]) -> BatchReport {
        let _batch = self.batch_lock.lock();
        let metrics = self.bus.metrics();

        let diff = CommitDiffer::new(self.store.as_ref()).diff_batch(commits);

        for kind in diff.diagnostics.iter().filter_map(|e| e.failure_kind()) {
            metrics.record_failure(kind);
        }
        metrics.record_batch(
            commits.len() as u64,
            diff.card_updates.len() as u64,
            diff.commands.len() as u64,
        );

        let mut report = BatchReport {
            commits: commits.len(),
            card_updates: diff.card_updates.len(),
            commands: diff.commands.len(),
            diagnostics: diff.diagnostics.len(),
            delivered: 0,
        };

        for event in diff.into_events() {
            report.delivered += self.bus.publish(event).delivered;
        }

        debug!(
            commits = report.commits,
            card_updates = report.card_updates,
            commands = report.commands,
            diagnostics = report.diagnostics,
            delivered = report.delivered,
            "processed commit batch"
        );

        report
    }
}

/// Feed event processor that drains queued batches into a [`ChangeFeed`].
pub struct FeedProcessor {
    /// Receiver for commit batches.
    rx: mpsc::Receiver<Vec<Commit>>,
    /// Change feed doing the work.
    feed: Arc<ChangeFeed>,
}

impl FeedProcessor {
    /// Create a new feed processor.
    pub fn new(rx: mpsc::Receiver<Vec<Commit>>, feed: Arc<ChangeFeed>) -> Self {
        Self { rx, feed }
    }

    /// Run the processor until the channel is closed.
    ///
    /// Batches are processed strictly one after another.
    pub async fn run(mut self) {
        info!("feed processor started");

        let mut batches = 0u64;
        while let Some(batch) = self.rx.recv().await {
            self.feed.process_commit_batch(&batch);
            batches += 1;
        }

        info!(batches, "feed processor stopped (channel closed)");
    }
}

/// Feed channel sender for submitting commit batches.
pub type FeedSender = mpsc::Sender<Vec<Commit>>;

/// Feed channel receiver for processing commit batches.
pub type FeedReceiver = mpsc::Receiver<Vec<Commit>>;

/// Create a new feed channel with the given buffer size.
pub fn channel(buffer_size: usize) -> (FeedSender, FeedReceiver) {
    mpsc::channel(buffer_size.max(1))
}

/// Handle for submitting batches to a running feed processor.
#[derive(Clone)]
pub struct FeedHandle {
    tx: FeedSender,
}

impl FeedHandle {
    /// Create a new feed handle.
    pub fn new(tx: FeedSender) -> Self {
        Self { tx }
    }

    /// Submit a batch without waiting.
    ///
    /// Fails if the queue is full or the processor has stopped.
    pub fn try_send(&self, batch: Vec<Commit>) -> Result<(), mpsc::error::TrySendError<Vec<Commit>>> {
        self.tx.try_send(batch)
    }

    /// Submit a batch, waiting for queue space.
    pub async fn send(&self, batch: Vec<Commit>) -> Result<(), crate::Error> {
        self.tx.send(batch).await.map_err(|_| crate::Error::FeedClosed)
    }

    /// Get a reference to the sender.
    pub fn sender(&self) -> &FeedSender {
        &self.tx
    }
}

/// Start a feed processor and return a handle for sending batches.
///
/// This spawns a background task that runs until every handle is dropped.
pub fn start_processor(feed: Arc<ChangeFeed>, buffer_size: usize) -> FeedHandle {
    let (tx, rx) = channel(buffer_size);
    let processor = FeedProcessor::new(rx, feed);

    tokio::spawn(async move {
        processor.run().await;
    });

    debug!(buffer_size, "feed processor spawned");
    FeedHandle::new(tx)
}
