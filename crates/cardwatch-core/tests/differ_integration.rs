//! Integration tests for commit batch diffing against the in-memory store.

use cardwatch_core::{find_cards, CardQuery, CardStore, CommitDiffer, Error, MemoryCardStore, TypeRegistry};
use cardwatch_proto::{decode_batch, Card, CardType, Event, Parameter};

fn seeded_store() -> MemoryCardStore {
    MemoryCardStore::with_cards([Card::new("X", "account")
        .with_balance(10.0)
        .with_tag("status", "open")])
}

#[test]
fn second_commit_reports_pre_batch_balance() {
    let store = seeded_store();
    let batch = decode_batch(
        r#"[
            {"cardId":"X","actions":[{"id":"a1","cardId":"X","actionType":"SET_CARD_TAG",
                "data":{"name":"deposit","value":"1","amount":10}}]},
            {"cardId":"X","actions":[{"id":"a2","cardId":"X","actionType":"SET_CARD_TAG",
                "data":{"name":"deposit","value":"2","amount":10}}]}
        ]"#,
    )
    .unwrap();

    let diff = CommitDiffer::new(&store).diff_batch(&batch);

    assert_eq!(diff.card_updates.len(), 2);
    let second = &diff.card_updates[1];
    assert_eq!(second.card.balance, 30.0);
    assert_eq!(second.old_card.as_ref().map(|c| c.balance), Some(10.0));
}

#[test]
fn consecutive_batches_compare_against_previous_batch() {
    let store = seeded_store();
    let deposit = r#"[{"cardId":"X","actions":[{"id":"a","cardId":"X","actionType":"SET_CARD_TAG",
        "data":{"name":"deposit","value":"x","amount":10}}]}]"#;

    let differ = CommitDiffer::new(&store);
    differ.diff_batch(&decode_batch(deposit).unwrap());
    let diff = differ.diff_batch(&decode_batch(deposit).unwrap());

    let update = &diff.card_updates[0];
    assert_eq!(update.old_card.as_ref().map(|c| c.balance), Some(20.0));
    assert_eq!(update.card.balance, 30.0);
}

#[test]
fn mixed_batch_yields_updates_commands_and_diagnostics() {
    let store = seeded_store();
    let batch = decode_batch(
        r#"[
            {"cardId":"N","actions":[
                {"id":"c1","cardId":"N","actionType":"CREATE_CARD","data":{"typeId":"ticket"}},
                {"id":"c2","cardId":"N","actionType":"EXECUTE_COMMAND","data":{"name":"PRINT"}}
            ]},
            {"cardId":"X","actions":[
                {"id":"c3","cardId":"X","actionType":"EXECUTE_COMMAND",
                    "data":{"name":"VOID","params":{"reason":"dup"}}}
            ]},
            {"cardId":"missing","actions":[]}
        ]"#,
    )
    .unwrap();

    let diff = CommitDiffer::new(&store).diff_batch(&batch);

    assert_eq!(diff.card_updates.len(), 2);
    assert!(diff.card_updates[0].old_card.is_none());
    assert!(diff.card_updates[1].old_card.is_some());

    assert_eq!(diff.commands.len(), 2);
    assert_eq!(diff.commands[0].name, "PRINT");
    assert!(diff.commands[0].parameters.is_empty());
    assert_eq!(diff.commands[1].name, "VOID");
    assert_eq!(diff.commands[1].parameters, vec![Parameter::new("reason", "dup")]);

    assert!(diff
        .diagnostics
        .iter()
        .any(|e| matches!(e, Error::LookupFailure { card_id } if card_id == "missing")));

    let topics: Vec<_> = diff.into_events().map(|e| e.topic()).collect();
    assert_eq!(topics.len(), 4);
    assert!(matches!(
        topics.as_slice(),
        [
            cardwatch_proto::Topic::CardUpdated,
            cardwatch_proto::Topic::CardUpdated,
            cardwatch_proto::Topic::CommandExecuted,
            cardwatch_proto::Topic::CommandExecuted
        ]
    ));
}

#[test]
fn query_sees_applied_batch() {
    let store = seeded_store();
    let types = TypeRegistry::with_types([CardType::new("account", "Account")]);
    let batch = decode_batch(
        r#"[{"cardId":"X","actions":[{"id":"a1","cardId":"X","actionType":"CLOSE_CARD"}]}]"#,
    )
    .unwrap();

    let diff = CommitDiffer::new(&store).diff_batch(&batch);
    let event = diff.into_events().next().unwrap();
    assert!(matches!(&event, Event::CardUpdated(u) if u.card.is_closed));

    assert!(find_cards(&store, &types, &CardQuery::new().with_type("Account")).is_empty());
    assert_eq!(
        find_cards(&store, &types, &CardQuery::new().with_type("Account").with_closed()).len(),
        1
    );
    assert!(store.exists("X"));
}
