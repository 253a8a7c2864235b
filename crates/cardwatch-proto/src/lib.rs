//! cardwatch protocol types.
//!
//! This crate defines the values exchanged between the ledger feed, the
//! change-detection core and subscribers.
//!
//! # Modules
//!
//! - [`card`] - Card snapshots and card-type configuration
//! - [`commit`] - Commits and actions from the ledger feed
//! - [`event`] - Published notification events and topics
//! - [`subscription`] - Subscriber filter variables
//! - [`error`] - Protocol error types
//!
//! All types serialize with serde using the ledger's camelCase field names.

pub mod card;
pub mod commit;
pub mod error;
pub mod event;
pub mod subscription;

pub use error::Error;

pub use card::{Card, CardType, TypeId};
pub use commit::{action_types, decode_batch, Action, CommandInvocation, Commit};
pub use event::{CardUpdateEvent, CommandExecutedEvent, Event, Parameter, Topic};
pub use subscription::{CardUpdatedVariables, CommandExecutedVariables};
