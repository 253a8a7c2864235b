//! cardwatch server - replays ledger commit batches and prints notifications.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cardwatch_core::{new_shared_metrics, MemoryCardStore, TypeRegistry};
use cardwatch_server::config::WATCH_CLIENT_ID;
use cardwatch_server::feed::{channel, ChangeFeed, FeedHandle, FeedProcessor};
use cardwatch_server::replay::{format_event, read_input};
use cardwatch_server::{Args, EventBus};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing; stdout carries events
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cardwatch_server=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting cardwatch server");

    // Parse command-line arguments
    let args = Args::parse();
    let config = args.into_config();
    config.validate()?;

    tracing::info!(
        types_path = ?config.types_path,
        input_path = ?config.input_path,
        feed_buffer = config.feed_buffer,
        stream_capacity = config.stream_capacity,
        watches = config.watches.len(),
        "configuration loaded"
    );

    let types = match &config.types_path {
        Some(path) => TypeRegistry::load(path)?,
        None => TypeRegistry::new(),
    };
    tracing::info!(card_types = types.len(), "card types loaded");

    let metrics = new_shared_metrics();
    let bus = EventBus::with_capacity(Arc::new(types), metrics.clone(), config.stream_capacity);

    if !config.has_watches() {
        tracing::warn!("no --watch-* flags given, events will be counted but not printed");
    }

    // One printer task per watch subscription
    let printers: Vec<_> = config
        .watches
        .iter()
        .cloned()
        .map(|filter| {
            let mut subscription = bus.subscribe(WATCH_CLIENT_ID, filter);
            tokio::spawn(async move {
                while let Some(event) = subscription.recv().await {
                    match format_event(&event) {
                        Ok(line) => println!("{line}"),
                        Err(e) => tracing::warn!(error = %e, "failed to render event"),
                    }
                }
            })
        })
        .collect();

    // Start the feed processor
    let store = Arc::new(MemoryCardStore::new());
    let feed = Arc::new(ChangeFeed::new(store, bus.clone()));
    let (tx, rx) = channel(config.feed_buffer);
    let processor = tokio::spawn(FeedProcessor::new(rx, feed).run());
    let handle = FeedHandle::new(tx);

    tokio::select! {
        result = read_input(config.input_path.as_deref(), &handle) => match result {
            Ok(batches) => tracing::info!(batches, "input complete"),
            Err(e) => tracing::error!(error = %e, "input failed"),
        },
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => tracing::info!("received shutdown signal, stopping intake"),
            Err(e) => tracing::error!(error = %e, "failed to listen for ctrl+c"),
        },
    }

    // Let queued batches drain, then close the watch streams
    drop(handle);
    if let Err(e) = processor.await {
        tracing::error!(error = %e, "feed processor task failed");
    }
    bus.remove_client_subscriptions(WATCH_CLIENT_ID);
    for printer in printers {
        if let Err(e) = printer.await {
            tracing::error!(error = %e, "printer task failed");
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        batches = snapshot.batches,
        commits = snapshot.commits,
        card_updates = snapshot.card_updates,
        commands = snapshot.commands,
        delivered = snapshot.delivered,
        dropped = snapshot.dropped,
        uptime_secs = metrics.uptime_secs(),
        "shutdown complete"
    );
    tracing::debug!(metrics = %metrics.to_prometheus(), "final metrics");

    Ok(())
}
