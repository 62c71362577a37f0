//! Integration tests for the trigger pump.
//!
//! These run entirely over the in-memory capability doubles — no real blob
//! store, queue service, or worker is involved.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use capabilities::memory::{
    InMemoryBlobStore, InMemoryLedger, InMemoryMessageSource, InMemoryRegistry, RecordingSink,
};
use capabilities::FunctionDefinition;
use dispatch::{Dispatcher, InMemoryStatusTracker, InstanceStatus, StatusStore};

use crate::models::{Trigger, TriggerSubscription};
use crate::pump::TriggerPump;

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

struct Harness {
    blob_store: Arc<InMemoryBlobStore>,
    source: Arc<InMemoryMessageSource>,
    tracker: Arc<InMemoryStatusTracker>,
    sink: Arc<RecordingSink>,
    pump: TriggerPump,
}

/// Pump wired to one blob store, one queue ("work-items"), and a registry
/// with a blob-converter function and a queue-consumer function.
fn harness() -> Harness {
    let blob_store = Arc::new(InMemoryBlobStore::new());
    let source = Arc::new(InMemoryMessageSource::new());
    let ledger = Arc::new(InMemoryLedger::new());
    let registry = Arc::new(InMemoryRegistry::new());
    let tracker = Arc::new(InMemoryStatusTracker::new());
    let sink = Arc::new(RecordingSink::new());

    registry.register(FunctionDefinition {
        id: "convert".into(),
        parameters: vec!["name".into()],
        account: "devstore".into(),
    });
    registry.register(FunctionDefinition {
        id: "consume".into(),
        parameters: vec!["payload".into()],
        account: "devstore".into(),
    });

    let mut sources: HashMap<String, Arc<dyn capabilities::MessageSource>> = HashMap::new();
    sources.insert("work-items".into(), source.clone());

    let dispatcher = Arc::new(Dispatcher::new(tracker.clone(), sink.clone()));
    let pump = TriggerPump::new(
        blob_store.clone(),
        sources,
        ledger,
        registry,
        dispatcher,
    );

    Harness {
        blob_store,
        source,
        tracker,
        sink,
        pump,
    }
}

fn blob_subscription() -> TriggerSubscription {
    TriggerSubscription {
        function_id: "convert".into(),
        trigger: Trigger::blob("c/{name}.txt", &["c/out/{name}.txt"]).unwrap(),
    }
}

fn queue_subscription() -> TriggerSubscription {
    TriggerSubscription {
        function_id: "consume".into(),
        trigger: Trigger::queue("work-items").unwrap(),
    }
}

#[tokio::test]
async fn blob_fire_dispatches_once_per_generation() {
    let h = harness();
    h.blob_store.put("c", "a.txt", ts(10));
    h.blob_store.put("c", "out/a.txt", ts(5));
    let subs = vec![blob_subscription()];

    let first = h.pump.run_pass(&subs).await;
    assert_eq!(first.len(), 1);
    let instance = &first[0];
    assert_eq!(instance.function_id, "convert");
    assert_eq!(instance.parameters["name"], "a");
    assert_eq!(instance.status, InstanceStatus::Queued);
    assert!(instance.reason.message.contains("c/a.txt"));

    // The instance is queryable and the payload went out.
    assert!(h.tracker.get(instance.id).await.unwrap().is_some());
    assert_eq!(h.sink.len(), 1);

    // Second pass over the unchanged listing dispatches nothing.
    let second = h.pump.run_pass(&subs).await;
    assert!(second.is_empty());
    assert_eq!(h.sink.len(), 1);
}

#[tokio::test]
async fn fresh_output_keeps_trigger_quiet() {
    let h = harness();
    h.blob_store.put("c", "a.txt", ts(10));
    h.blob_store.put("c", "out/a.txt", ts(20));

    let dispatched = h.pump.run_pass(&[blob_subscription()]).await;
    assert!(dispatched.is_empty());
    assert!(h.sink.is_empty());
}

#[tokio::test]
async fn queue_fire_binds_payload_and_deletes_message() {
    let h = harness();
    h.source.push("job-body");

    let dispatched = h.pump.run_pass(&[queue_subscription()]).await;
    assert_eq!(dispatched.len(), 1);
    assert_eq!(dispatched[0].parameters["payload"], "job-body");
    assert_eq!(dispatched[0].reason.message, "New message on 'work-items'.");

    // Consumed: the message is gone, and the next pass is a no-op.
    assert!(h.source.is_empty());
    assert!(h.pump.run_pass(&[queue_subscription()]).await.is_empty());
}

#[tokio::test]
async fn dispatch_failure_leaves_message_deliverable() {
    let h = harness();
    h.source.push("job-body");
    h.sink.fail(true);

    let dispatched = h.pump.run_pass(&[queue_subscription()]).await;
    assert!(dispatched.is_empty());
    // Message not lost, no orphan record.
    assert_eq!(h.source.len(), 1);
    assert!(h.tracker.is_empty());

    // After the queue recovers the same message goes through.
    h.sink.fail(false);
    let retried = h.pump.run_pass(&[queue_subscription()]).await;
    assert_eq!(retried.len(), 1);
    assert!(h.source.is_empty());
}

#[tokio::test]
async fn delete_failure_after_dispatch_is_at_least_once() {
    let h = harness();
    h.source.push("job-body");
    h.source.fail_deletes(true);

    let dispatched = h.pump.run_pass(&[queue_subscription()]).await;
    // The invocation went out; the message survives and may be redelivered.
    assert_eq!(dispatched.len(), 1);
    assert_eq!(h.source.len(), 1);
}

#[tokio::test]
async fn unregistered_function_does_not_consume_the_event() {
    let h = harness();
    h.source.push("job-body");
    let subs = vec![TriggerSubscription {
        function_id: "ghost".into(),
        trigger: Trigger::queue("work-items").unwrap(),
    }];

    let dispatched = h.pump.run_pass(&subs).await;
    assert!(dispatched.is_empty());
    assert_eq!(h.source.len(), 1);
    assert!(h.sink.is_empty());
}

#[tokio::test]
async fn evaluate_all_reports_decisions_without_dispatching() {
    let h = harness();
    h.blob_store.put("c", "a.txt", ts(10));
    h.source.push("job-body");
    let subs = vec![blob_subscription(), queue_subscription()];

    let fired = h.pump.evaluate_all(&subs).await.unwrap();
    assert_eq!(fired.len(), 2);
    assert!(h.sink.is_empty());
    assert!(h.tracker.is_empty());
    assert_eq!(h.source.len(), 1);
}

#[tokio::test]
async fn one_failing_subscription_does_not_block_others() {
    let h = harness();
    h.blob_store.put("c", "a.txt", ts(10));
    let subs = vec![
        // No source configured for this entity; evaluation fails.
        TriggerSubscription {
            function_id: "consume".into(),
            trigger: Trigger::queue("no-such-queue").unwrap(),
        },
        blob_subscription(),
    ];

    let dispatched = h.pump.run_pass(&subs).await;
    assert_eq!(dispatched.len(), 1);
    assert_eq!(dispatched[0].function_id, "convert");
}
