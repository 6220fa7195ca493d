//! Integration tests for the in-memory event log under concurrent use.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use splitmail_eventlog::{EventLog, InMemoryEventLog, SeekPosition};

/// Test event keyed by experiment.
#[derive(Debug, Clone, PartialEq)]
struct TestEvent {
    experiment_id: String,
    seq: u32,
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_appends_get_unique_offsets() {
    let log: Arc<InMemoryEventLog<TestEvent>> = Arc::new(InMemoryEventLog::new());

    let mut handles = Vec::new();
    for writer in 0..8u32 {
        let log = Arc::clone(&log);
        handles.push(tokio::spawn(async move {
            let mut offsets = Vec::new();
            for seq in 0..50u32 {
                let event = TestEvent {
                    experiment_id: format!("exp-{}", writer % 2),
                    seq: writer * 1000 + seq,
                };
                offsets.push(log.append(event).await.unwrap());
            }
            offsets
        }));
    }

    let mut all = HashSet::new();
    for handle in handles {
        for offset in handle.await.unwrap() {
            assert!(all.insert(offset), "offset {offset} handed out twice");
        }
    }

    assert_eq!(all.len(), 400);
    assert_eq!(log.high_water_mark(), 400);
    assert_eq!(all.iter().max(), Some(&399));
}

#[tokio::test]
async fn replay_from_beginning_sees_every_event_in_order() {
    let log: InMemoryEventLog<TestEvent> = InMemoryEventLog::new();
    for seq in 0..25 {
        log.append(TestEvent {
            experiment_id: "exp-1".to_string(),
            seq,
        })
        .await
        .unwrap();
    }

    let mut consumer = log.consumer("replay").await.unwrap();
    consumer.seek(SeekPosition::Beginning).await.unwrap();

    let mut seen = Vec::new();
    loop {
        let batch = consumer.poll(10, Duration::from_millis(10)).await.unwrap();
        if batch.is_empty() {
            break;
        }
        seen.extend(batch.into_iter().map(|(_, e)| e.seq));
    }

    assert_eq!(seen, (0..25).collect::<Vec<_>>());
}
