//! Subscription filters.
//!
//! Each topic has one filter shape. Filters are plain data built from the
//! subscriber's variables and evaluated through [`SubscriptionFilter::evaluate`].

use cardwatch_core::{wildcard, TypeResolver};
use cardwatch_proto::{
    CardUpdateEvent, CardUpdatedVariables, CommandExecutedEvent, CommandExecutedVariables, Event,
    Topic,
};

use crate::error::Error;

/// A subscriber's filter, tagged by topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionFilter {
    /// Filter over card update events.
    CardUpdated(CardUpdatedVariables),
    /// Filter over command executed events.
    CommandExecuted(CommandExecutedVariables),
}

impl SubscriptionFilter {
    /// Topic the filter subscribes to.
    pub fn topic(&self) -> Topic {
        match self {
            SubscriptionFilter::CardUpdated(_) => Topic::CardUpdated,
            SubscriptionFilter::CommandExecuted(_) => Topic::CommandExecuted,
        }
    }

    /// Decide whether `event` should be delivered.
    ///
    /// Returns an error when the filter cannot be evaluated: an event from a
    /// different topic, or a type reference that does not resolve. Callers
    /// treat any error as a non-match.
    pub fn evaluate(&self, event: &Event, types: &dyn TypeResolver) -> Result<bool, Error> {
        match (self, event) {
            (SubscriptionFilter::CardUpdated(vars), Event::CardUpdated(update)) => {
                card_updated_matches(vars, update, types)
            }
            (SubscriptionFilter::CommandExecuted(vars), Event::CommandExecuted(command)) => {
                Ok(command_executed_matches(vars, command))
            }
            (filter, event) => Err(Error::PredicateFailure(format!(
                "{} filter evaluated against {} event",
                filter.topic(),
                event.topic()
            ))),
        }
    }
}

impl From<CardUpdatedVariables> for SubscriptionFilter {
    fn from(vars: CardUpdatedVariables) -> Self {
        SubscriptionFilter::CardUpdated(vars)
    }
}

impl From<CommandExecutedVariables> for SubscriptionFilter {
    fn from(vars: CommandExecutedVariables) -> Self {
        SubscriptionFilter::CommandExecuted(vars)
    }
}

/// Evaluate a `cardUpdated` filter.
///
/// The criteria run in sequence and each one that applies replaces the
/// result of the previous one:
///
/// 1. type: the card's type must equal the resolved type reference (an
///    empty reference accepts every card);
/// 2. tags: with a previous snapshot, some listed tag must differ (missing
///    tags read as `""`);
/// 3. balance: with a previous snapshot, the balance must differ.
///
/// Later criteria only run while the result is still `true`, so a passing
/// balance check does not rescue a failing tag check, and a failing balance
/// check overrides a passing tag check.
pub fn card_updated_matches(
    vars: &CardUpdatedVariables,
    update: &CardUpdateEvent,
    types: &dyn TypeResolver,
) -> Result<bool, Error> {
    let card = &update.card;

    let mut result = match vars.type_ref.as_deref() {
        None | Some("") => true,
        Some(type_ref) => {
            let type_id = types
                .resolve_type_id(type_ref)
                .ok_or_else(|| cardwatch_core::Error::UnknownTypeRef(type_ref.to_string()))?;
            card.type_id == type_id
        }
    };

    if let (true, Some(tags), Some(old_card)) = (result, vars.tags.as_ref(), update.old_card.as_ref()) {
        result = tags
            .iter()
            .any(|name| card.tag(name, "") != old_card.tag(name, ""));
    }

    if let (true, Some(true), Some(old_card)) = (result, vars.check_balance, update.old_card.as_ref()) {
        result = card.balance != old_card.balance;
    }

    Ok(result)
}

/// Evaluate a `commandExecuted` filter.
pub fn command_executed_matches(vars: &CommandExecutedVariables, command: &CommandExecutedEvent) -> bool {
    match vars.name.as_deref() {
        None | Some("") => true,
        Some(pattern) => wildcard::matches(&command.name, pattern),
    }
}
