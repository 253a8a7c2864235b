//! End-to-end notification tests: commit batches in, filtered events out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;

use cardwatch_core::{new_shared_metrics, CardStore, MemoryCardStore, TypeRegistry};
use cardwatch_proto::{
    action_types, Action, Card, CardType, CardUpdatedVariables, Commit, CommandExecutedEvent,
    CommandExecutedVariables, Event,
};
use cardwatch_server::{start_processor, ChangeFeed, EventBus};

fn types() -> Arc<TypeRegistry> {
    Arc::new(TypeRegistry::with_types([
        CardType::new("t-acc", "Account"),
        CardType::new("t-ord", "Order"),
    ]))
}

fn feed_with(cards: impl IntoIterator<Item = Card>) -> Arc<ChangeFeed> {
    let bus = EventBus::new(types(), new_shared_metrics());
    Arc::new(ChangeFeed::new(Arc::new(MemoryCardStore::with_cards(cards)), bus))
}

fn set_tag(card_id: &str, action_id: &str, name: &str, value: &str) -> Action {
    Action::new(
        action_id,
        card_id,
        action_types::SET_CARD_TAG,
        json!({ "name": name, "value": value }),
    )
}

fn deposit(card_id: &str, action_id: &str, amount: f64) -> Action {
    Action::new(
        action_id,
        card_id,
        action_types::SET_CARD_TAG,
        json!({ "name": "deposit", "value": action_id, "amount": amount }),
    )
}

fn command_names(events: &[Arc<Event>]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event.as_ref() {
            Event::CommandExecuted(command) => Some(command.name.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn command_fans_out_to_matching_patterns() {
    let feed = feed_with([Card::new("c1", "t-acc")]);
    let bus = feed.bus();

    let mut exact = bus.subscribe("a", CommandExecutedVariables::new().with_name("VOID").into());
    let mut prefix = bus.subscribe("b", CommandExecutedVariables::new().with_name("VOID*").into());
    let mut other = bus.subscribe("c", CommandExecutedVariables::new().with_name("PRINT").into());

    let batch = vec![Commit::new("c1").with_action(Action::execute_command(
        "a1",
        "c1",
        "VOID",
        json!({ "reason": "duplicate", "count": 2 }),
    ))];
    let report = feed.process_commit_batch(&batch);

    assert_eq!(report.delivered, 2);
    let exact_events = exact.drain();
    assert_eq!(command_names(&exact_events), vec!["VOID"]);
    assert_eq!(command_names(&prefix.drain()), vec!["VOID"]);
    assert!(other.drain().is_empty());

    match exact_events[0].as_ref() {
        Event::CommandExecuted(CommandExecutedEvent {
            id,
            card_id,
            parameters,
            ..
        }) => {
            assert_eq!(id, "a1");
            assert_eq!(card_id, "c1");
            assert_eq!(parameters.len(), 2);
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[test]
fn tag_and_balance_filters_compose_by_overwrite() {
    let feed = feed_with([Card::new("c1", "t-acc")
        .with_balance(10.0)
        .with_tag("status", "open")]);
    let bus = feed.bus();

    let mut tags_only = bus.subscribe("a", CardUpdatedVariables::new().with_tags(["status"]).into());
    let mut both = bus.subscribe(
        "b",
        CardUpdatedVariables::new()
            .with_type("Account")
            .with_tags(["status"])
            .with_check_balance(true)
            .into(),
    );
    let mut wrong_type = bus.subscribe("c", CardUpdatedVariables::new().with_type("Order").into());

    // Tag changes but the balance does not.
    feed.process_commit_batch(&[Commit::new("c1").with_action(set_tag("c1", "a1", "status", "paid"))]);

    assert_eq!(tags_only.drain().len(), 1);
    assert!(both.drain().is_empty());
    assert!(wrong_type.drain().is_empty());

    // Tag and balance both change.
    feed.process_commit_batch(&[Commit::new("c1")
        .with_action(set_tag("c1", "a2", "status", "void"))
        .with_action(deposit("c1", "a3", 5.0))]);

    assert_eq!(tags_only.drain().len(), 1);
    assert_eq!(both.drain().len(), 1);
}

#[test]
fn new_card_passes_tag_and_balance_filters() {
    let feed = feed_with([]);
    let mut handle = feed.bus().subscribe(
        "a",
        CardUpdatedVariables::new()
            .with_tags(["status"])
            .with_check_balance(true)
            .into(),
    );

    feed.process_commit_batch(&[Commit::new("n1").with_action(Action::new(
        "a1",
        "n1",
        action_types::CREATE_CARD,
        json!({ "typeId": "t-ord" }),
    ))]);

    let events = handle.drain();
    assert_eq!(events.len(), 1);
    match events[0].as_ref() {
        Event::CardUpdated(update) => {
            assert!(update.is_new_card());
            assert_eq!(update.card.id, "n1");
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[test]
fn nothing_arrives_after_unsubscribe_returns() {
    let bus = EventBus::new(types(), new_shared_metrics());
    let mut handle = bus.subscribe("a", CommandExecutedVariables::new().into());
    let stop = Arc::new(AtomicBool::new(false));

    let publisher = {
        let bus = bus.clone();
        let stop = Arc::clone(&stop);
        std::thread::spawn(move || {
            let mut n = 0u64;
            while !stop.load(Ordering::Relaxed) {
                bus.publish(Event::from(CommandExecutedEvent {
                    id: format!("a{n}"),
                    name: "TICK".into(),
                    card_id: "c1".into(),
                    parameters: vec![],
                }));
                n += 1;
            }
        })
    };

    // Wait for the publisher to reach the subscription before removing it.
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut first = handle.try_recv();
    while first.is_none() {
        assert!(Instant::now() < deadline, "publisher never delivered");
        std::thread::yield_now();
        first = handle.try_recv();
    }

    assert!(handle.unsubscribe());
    handle.drain();

    std::thread::sleep(Duration::from_millis(10));
    stop.store(true, Ordering::Relaxed);
    publisher.join().unwrap();

    assert!(handle.try_recv().is_none());
    assert_eq!(bus.subscription_count(), 0);
}

#[tokio::test]
async fn background_processor_delivers_batches_in_order() {
    let store = Arc::new(MemoryCardStore::new());
    let bus = EventBus::new(types(), new_shared_metrics());
    let mut cards = bus.subscribe("a", CardUpdatedVariables::new().with_check_balance(true).into());
    let mut commands = bus.subscribe("a", CommandExecutedVariables::new().with_name("*PRINT*").into());

    let feed = Arc::new(ChangeFeed::new(store.clone(), bus.clone()));
    let handle = start_processor(feed, 8);

    handle
        .send(vec![Commit::new("x").with_action(Action::new(
            "a1",
            "x",
            action_types::CREATE_CARD,
            json!({ "typeId": "t-acc" }),
        ))])
        .await
        .unwrap();
    handle
        .send(vec![
            Commit::new("x").with_action(deposit("x", "a2", 10.0)),
            Commit::new("x").with_action(Action::execute_command("a3", "x", "REPRINT", json!({}))),
        ])
        .await
        .unwrap();

    let first = tokio::time::timeout(Duration::from_secs(5), cards.recv())
        .await
        .unwrap()
        .unwrap();
    let second = tokio::time::timeout(Duration::from_secs(5), cards.recv())
        .await
        .unwrap()
        .unwrap();
    let command = tokio::time::timeout(Duration::from_secs(5), commands.recv())
        .await
        .unwrap()
        .unwrap();

    match (first.as_ref(), second.as_ref()) {
        (Event::CardUpdated(created), Event::CardUpdated(funded)) => {
            assert!(created.is_new_card());
            assert_eq!(funded.old_card.as_ref().map(|c| c.balance), Some(0.0));
            assert_eq!(funded.card.balance, 10.0);
        }
        other => panic!("unexpected events: {:?}", other),
    }
    assert_eq!(command_names(&[command]), vec!["REPRINT"]);

    // The command-only commit is still compared against the pre-batch card.
    match cards.try_recv().as_deref() {
        Some(Event::CardUpdated(update)) => {
            assert_eq!(update.old_card.as_ref().map(|c| c.balance), Some(0.0));
            assert_eq!(update.card.balance, 10.0);
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert!(cards.try_recv().is_none());
    assert_eq!(store.get("x").unwrap().balance, 10.0);

    let snapshot = bus.metrics().snapshot();
    assert_eq!(snapshot.batches, 2);
    assert_eq!(snapshot.commits, 3);
}
