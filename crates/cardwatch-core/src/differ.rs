//! Commit batch diffing.
//!
//! For each batch the differ snapshots every card the batch touches before
//! anything is applied, lets the store apply the commits, then pairs every
//! post-commit card with its pre-batch snapshot. Snapshots are relative to
//! the start of the batch: when several commits target the same card, all of
//! their update events compare against the state before the first one.

use std::collections::HashMap;

use cardwatch_proto::{Card, CardUpdateEvent, CommandExecutedEvent, Commit, Event};
use tracing::{debug, warn};

use crate::error::Error;
use crate::store::CardStore;

/// Pre-batch card snapshots, keyed by card id.
///
/// Lives for the duration of a single batch.
#[derive(Debug, Default)]
pub struct BatchSnapshots {
    cards: HashMap<String, Card>,
}

impl BatchSnapshots {
    /// Snapshot taken for a card, if it existed before the batch.
    pub fn get(&self, card_id: &str) -> Option<&Card> {
        self.cards.get(card_id)
    }

    /// Number of snapshots taken.
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// Check whether no snapshots were taken.
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// Events and diagnostics derived from one batch.
#[derive(Debug, Default)]
pub struct BatchDiff {
    /// One update per commit whose card could be read back, in commit order.
    pub card_updates: Vec<CardUpdateEvent>,
    /// One event per `EXECUTE_COMMAND` action, in commit then action order.
    pub commands: Vec<CommandExecutedEvent>,
    /// Per-commit failures that were skipped.
    pub diagnostics: Vec<Error>,
}

impl BatchDiff {
    /// Check whether every commit diffed without a diagnostic.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// All events in publish order: card updates first, then commands.
    pub fn into_events(self) -> impl Iterator<Item = Event> {
        self.card_updates
            .into_iter()
            .map(Event::from)
            .chain(self.commands.into_iter().map(Event::from))
    }
}

/// Computes before/after pairs and command events for commit batches.
pub struct CommitDiffer<'a, S: CardStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: CardStore + ?Sized> CommitDiffer<'a, S> {
    /// Create a differ over a card store.
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Snapshot every existing card targeted by the batch.
    ///
    /// Must run before any commit of the batch is applied.
    pub fn capture_snapshots(&self, commits: &[Commit]) -> BatchSnapshots {
        let mut snapshots = BatchSnapshots::default();
        for commit in commits {
            if snapshots.cards.contains_key(&commit.card_id) || !self.store.exists(&commit.card_id) {
                continue;
            }
            if let Some(card) = self.store.get(&commit.card_id) {
                snapshots.cards.insert(commit.card_id.clone(), card);
            }
        }
        snapshots
    }

    /// Apply a batch to the store and derive its events.
    ///
    /// Commits are independent: a commit that fails to apply or whose card
    /// cannot be read back is reported in [`BatchDiff::diagnostics`] and the
    /// rest of the batch proceeds.
    pub fn diff_batch(&self, commits: &[Commit]) -> BatchDiff {
        let snapshots = self.capture_snapshots(commits);
        let mut diff = BatchDiff::default();

        for commit in commits {
            if let Err(e) = self.store.apply_commit(commit) {
                warn!(card_id = %commit.card_id, error = %e, "commit failed to apply");
                diff.diagnostics.push(e);
            }
        }

        for commit in commits {
            match self.store.get(&commit.card_id) {
                Some(card) => {
                    let old_card = snapshots.get(&commit.card_id).cloned();
                    diff.card_updates.push(CardUpdateEvent::new(card, old_card));
                }
                None => {
                    warn!(card_id = %commit.card_id, "card missing after commit, skipping update event");
                    diff.diagnostics.push(Error::LookupFailure {
                        card_id: commit.card_id.clone(),
                    });
                }
            }
        }

        for commit in commits {
            for command in extract_commands(commit) {
                match command {
                    Ok(event) => diff.commands.push(event),
                    Err(e) => {
                        warn!(card_id = %commit.card_id, error = %e, "skipping command action");
                        diff.diagnostics.push(e);
                    }
                }
            }
        }

        debug!(
            commits = commits.len(),
            snapshots = snapshots.len(),
            card_updates = diff.card_updates.len(),
            commands = diff.commands.len(),
            diagnostics = diff.diagnostics.len(),
            "batch diffed"
        );

        diff
    }
}

/// Normalize the `EXECUTE_COMMAND` actions of a commit.
pub fn extract_commands(
    commit: &Commit,
) -> impl Iterator<Item = Result<CommandExecutedEvent, Error>> + '_ {
    commit.command_actions().map(|action| -> Result<CommandExecutedEvent, Error> {
        let invocation = action.command().map_err(|e| Error::MalformedCommand {
            action_id: action.id.clone(),
            reason: e.to_string(),
        })?;
        Ok(CommandExecutedEvent {
            id: action.id.clone(),
            name: invocation.name,
            card_id: action.card_id.clone(),
            parameters: invocation.parameters,
        })
    })
}
