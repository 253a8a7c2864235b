//! Commit batch replay.
//!
//! Batches arrive as newline-delimited JSON: each line is one array of
//! commits. Blank lines and lines starting with `#` are skipped.

use std::path::Path;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use cardwatch_proto::{decode_batch, Commit, Event};

use crate::error::Error;
use crate::feed::FeedHandle;

/// Parse one input line into a commit batch.
///
/// Returns `Ok(None)` for lines that carry no batch.
pub fn parse_line(line: &str) -> Result<Option<Vec<Commit>>, Error> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    Ok(Some(decode_batch(line)?))
}

/// Read batches from `reader` and submit them to the feed.
///
/// Lines that fail to decode are logged and skipped. Returns the number of
/// batches submitted.
pub async fn read_batches<R>(reader: R, feed: &FeedHandle) -> Result<usize, Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut line_no = 0usize;
    let mut submitted = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        match parse_line(&line) {
            Ok(Some(batch)) => {
                feed.send(batch).await?;
                submitted += 1;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(line = line_no, error = %e, "skipping undecodable batch");
            }
        }
    }

    tracing::debug!(lines = line_no, batches = submitted, "input exhausted");
    Ok(submitted)
}

/// Read batches from a file, or stdin when `path` is `None`.
pub async fn read_input(path: Option<&Path>, feed: &FeedHandle) -> Result<usize, Error> {
    match path {
        Some(path) => {
            let file = tokio::fs::File::open(path).await?;
            read_batches(BufReader::new(file), feed).await
        }
        None => read_batches(BufReader::new(tokio::io::stdin()), feed).await,
    }
}

/// Render a delivered event as one JSON line tagged with its topic.
pub fn format_event(event: &Event) -> Result<String, Error> {
    let payload = match event {
        Event::CardUpdated(update) => serde_json::to_value(update)?,
        Event::CommandExecuted(command) => serde_json::to_value(command)?,
    };
    let line = serde_json::json!({
        "topic": event.topic().as_str(),
        "payload": payload,
    });
    Ok(line.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;

    use cardwatch_core::{new_shared_metrics, CardStore, MemoryCardStore, TypeRegistry};
    use cardwatch_proto::{Card, CardUpdateEvent, CommandExecutedEvent, Parameter};

    use crate::feed::{channel, ChangeFeed, FeedProcessor};
    use crate::pubsub::EventBus;

    const BATCH: &str = r#"[{"cardId":"x","actions":[{"id":"a1","cardId":"x","actionType":"SET_CARD_TAG","data":{"name":"deposit","value":"a1","amount":5}}]}]"#;

    #[test]
    fn test_parse_line_skips_blank_and_comments() {
        assert!(parse_line("").unwrap().is_none());
        assert!(parse_line("   ").unwrap().is_none());
        assert!(parse_line("# opening balances").unwrap().is_none());
    }

    #[test]
    fn test_parse_line_batch() {
        let batch = parse_line(BATCH).unwrap().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].card_id, "x");
        assert_eq!(batch[0].actions.len(), 1);
    }

    #[test]
    fn test_parse_line_rejects_garbage() {
        assert!(matches!(parse_line("{not json"), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_format_event() {
        let event = Event::from(CommandExecutedEvent {
            id: "a1".into(),
            name: "VOID".into(),
            card_id: "c1".into(),
            parameters: vec![Parameter {
                key: "reason".into(),
                value: "typo".into(),
            }],
        });

        let value: serde_json::Value = serde_json::from_str(&format_event(&event).unwrap()).unwrap();
        assert_eq!(value["topic"], "commandExecuted");
        assert_eq!(value["payload"]["name"], "VOID");
        assert_eq!(value["payload"]["cardId"], "c1");
    }

    #[test]
    fn test_format_new_card_event() {
        let event = Event::from(CardUpdateEvent::new(Card::new("c1", "t-acc"), None));
        let value: serde_json::Value = serde_json::from_str(&format_event(&event).unwrap()).unwrap();

        assert_eq!(value["topic"], "cardUpdated");
        assert_eq!(value["payload"]["card"]["id"], "c1");
    }

    #[tokio::test]
    async fn test_read_input_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# replay").unwrap();
        writeln!(file, "{}", BATCH).unwrap();
        writeln!(file, "not a batch").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "{}", BATCH).unwrap();
        file.flush().unwrap();

        let store = Arc::new(MemoryCardStore::with_cards([Card::new("x", "T")]));
        let bus = EventBus::new(Arc::new(TypeRegistry::new()), new_shared_metrics());
        let feed = Arc::new(ChangeFeed::new(store.clone(), bus));

        let (tx, rx) = channel(4);
        let processor = tokio::spawn(FeedProcessor::new(rx, feed).run());
        let handle = FeedHandle::new(tx);

        let submitted = read_input(Some(file.path()), &handle).await.unwrap();
        drop(handle);
        processor.await.unwrap();

        assert_eq!(submitted, 2);
        assert_eq!(store.get("x").unwrap().balance, 10.0);
    }

    #[tokio::test]
    async fn test_read_input_missing_file() {
        let (tx, _rx) = channel(1);
        let handle = FeedHandle::new(tx);

        let result = read_input(Some(Path::new("/nonexistent/batches.ndjson")), &handle).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
