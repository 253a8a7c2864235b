//! Server configuration.

use std::path::PathBuf;

use clap::Parser;

use cardwatch_proto::{CardUpdatedVariables, CommandExecutedVariables};

use crate::error::Error;
use crate::pubsub::SubscriptionFilter;

/// Default number of commit batches queued ahead of the feed processor.
pub const DEFAULT_FEED_BUFFER: usize = 64;

/// Default number of events queued per subscription before events are dropped.
pub const DEFAULT_STREAM_CAPACITY: usize = 1024;

/// Client id used for subscriptions created from the command line.
pub const WATCH_CLIENT_ID: &str = "cli-watch";

/// cardwatch server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// JSON file of card types. None starts with no types configured.
    pub types_path: Option<PathBuf>,

    /// Newline-delimited JSON commit batches. None reads stdin.
    pub input_path: Option<PathBuf>,

    /// Commit batches queued ahead of the feed processor.
    pub feed_buffer: usize,

    /// Events queued per subscription.
    pub stream_capacity: usize,

    /// Subscriptions whose deliveries are written to stdout.
    pub watches: Vec<SubscriptionFilter>,
}

impl ServerConfig {
    /// Create a configuration with defaults and no watches.
    pub fn new() -> Self {
        Self {
            types_path: None,
            input_path: None,
            feed_buffer: DEFAULT_FEED_BUFFER,
            stream_capacity: DEFAULT_STREAM_CAPACITY,
            watches: Vec::new(),
        }
    }

    /// Set the card type file.
    pub fn with_types_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.types_path = Some(path.into());
        self
    }

    /// Set the batch input file.
    pub fn with_input_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_path = Some(path.into());
        self
    }

    /// Set the feed buffer size.
    pub fn with_feed_buffer(mut self, size: usize) -> Self {
        self.feed_buffer = size.max(1);
        self
    }

    /// Set the per-subscription queue capacity.
    pub fn with_stream_capacity(mut self, capacity: usize) -> Self {
        self.stream_capacity = capacity.max(1);
        self
    }

    /// Add a watch subscription.
    pub fn with_watch(mut self, filter: impl Into<SubscriptionFilter>) -> Self {
        self.watches.push(filter.into());
        self
    }

    /// Check if any watch subscription is configured.
    pub fn has_watches(&self) -> bool {
        !self.watches.is_empty()
    }

    /// Reject configurations that could never deliver an event.
    ///
    /// A card type filter needs a type file to resolve against.
    pub fn validate(&self) -> Result<(), Error> {
        if self.types_path.is_some() {
            return Ok(());
        }
        let typed = self.watches.iter().find_map(|filter| match filter {
            SubscriptionFilter::CardUpdated(vars) => vars.type_ref.as_deref().filter(|t| !t.is_empty()),
            SubscriptionFilter::CommandExecuted(_) => None,
        });
        match typed {
            Some(type_ref) => Err(Error::Config(format!(
                "card type filter {type_ref:?} needs --types"
            ))),
            None => Ok(()),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Command-line arguments for the server.
#[derive(Parser, Debug)]
#[command(name = "cardwatch-server")]
#[command(version, about = "Replay ledger commit batches and print card notifications", long_about = None)]
pub struct Args {
    /// JSON file listing card types as {"id", "name"} objects.
    #[arg(long)]
    pub types: Option<PathBuf>,

    /// File of commit batches, one JSON array per line (default: stdin).
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Commit batches queued ahead of the processor.
    #[arg(long, default_value_t = DEFAULT_FEED_BUFFER)]
    pub feed_buffer: usize,

    /// Events queued per subscription before events are dropped.
    #[arg(long, default_value_t = DEFAULT_STREAM_CAPACITY)]
    pub stream_capacity: usize,

    /// Print cardUpdated events.
    #[arg(long)]
    pub watch_cards: bool,

    /// Only cards of this type (id or name). Implies --watch-cards.
    #[arg(long = "card-type")]
    pub card_type: Option<String>,

    /// Only changes of these tags. Repeatable. Implies --watch-cards.
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Only balance changes. Implies --watch-cards.
    #[arg(long)]
    pub check_balance: bool,

    /// Print commandExecuted events whose name matches PATTERN. Repeatable.
    #[arg(long = "watch-command", value_name = "PATTERN")]
    pub watch_commands: Vec<String>,
}

impl Args {
    /// Convert command-line arguments to server configuration.
    pub fn into_config(self) -> ServerConfig {
        let mut config = ServerConfig::new()
            .with_feed_buffer(self.feed_buffer)
            .with_stream_capacity(self.stream_capacity);
        config.types_path = self.types;
        config.input_path = self.input;

        let card_filtered = self.card_type.is_some() || !self.tags.is_empty() || self.check_balance;
        if self.watch_cards || card_filtered {
            config = config.with_watch(CardUpdatedVariables {
                type_ref: self.card_type,
                tags: (!self.tags.is_empty()).then_some(self.tags),
                check_balance: self.check_balance.then_some(true),
            });
        }

        for pattern in self.watch_commands {
            config = config.with_watch(CommandExecutedVariables::new().with_name(pattern));
        }

        config
    }
}
