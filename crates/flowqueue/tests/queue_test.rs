use flowqueue::{
    ExecuteWorkflowPayload, MemoryQueue, QueueBackend, QueueError, TaskEnvelope, TaskQueue,
    TASK_EXECUTE_WORKFLOW,
};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const QUEUE: &str = "workflow_tasks";

fn setup() -> (Arc<MemoryQueue>, TaskQueue) {
    let backend = Arc::new(MemoryQueue::new());
    let queue = TaskQueue::new(backend.clone());
    (backend, queue)
}

#[tokio::test]
async fn test_round_trip_preserves_payload_bytes() {
    let (_, queue) = setup();
    let envelope = TaskEnvelope::new("custom", &json!({"b": [1, 2.5, "x"], "a": null})).unwrap();
    let sent = envelope.payload.get().to_string();

    queue.enqueue_envelope(QUEUE, &envelope).await.unwrap();
    let received = queue
        .dequeue(QUEUE, Duration::from_secs(1))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(received.task_type, "custom");
    assert_eq!(received.payload.get(), sent);
}

#[tokio::test]
async fn test_enqueue_run() {
    let (_, queue) = setup();
    queue.enqueue_run(QUEUE, 42).await.unwrap();

    let envelope = queue
        .dequeue(QUEUE, Duration::from_secs(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(envelope.task_type, TASK_EXECUTE_WORKFLOW);
    let payload: ExecuteWorkflowPayload = envelope.decode_payload().unwrap();
    assert_eq!(payload.execution_id, 42);
}

#[tokio::test]
async fn test_fifo_per_queue_name() {
    let (_, queue) = setup();
    for i in 0..3u64 {
        queue.enqueue_run(QUEUE, i).await.unwrap();
    }
    queue.enqueue_run("other", 99).await.unwrap();

    for expected in 0..3u64 {
        let envelope = queue
            .dequeue(QUEUE, Duration::from_millis(100))
            .await
            .unwrap()
            .unwrap();
        let payload: ExecuteWorkflowPayload = envelope.decode_payload().unwrap();
        assert_eq!(payload.execution_id, expected);
    }
    assert!(queue
        .dequeue(QUEUE, Duration::from_millis(10))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_empty_queue_times_out_without_error() {
    let (_, queue) = setup();
    let started = tokio::time::Instant::now();

    let result = queue.dequeue(QUEUE, Duration::from_millis(50)).await.unwrap();

    assert!(result.is_none());
    assert!(started.elapsed() >= Duration::from_millis(50));
}

#[tokio::test]
async fn test_blocked_consumer_wakes_on_enqueue() {
    let (_, queue) = setup();
    let consumer = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.dequeue(QUEUE, Duration::from_secs(5)).await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    queue.enqueue_run(QUEUE, 7).await.unwrap();

    let envelope = consumer.await.unwrap().unwrap().unwrap();
    let payload: ExecuteWorkflowPayload = envelope.decode_payload().unwrap();
    assert_eq!(payload.execution_id, 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_each_envelope_reaches_one_consumer() {
    let (backend, queue) = setup();
    let total = 50u64;

    let mut consumers = Vec::new();
    for _ in 0..4 {
        let queue = queue.clone();
        consumers.push(tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(envelope) = queue
                .dequeue(QUEUE, Duration::from_millis(200))
                .await
                .unwrap()
            {
                let payload: ExecuteWorkflowPayload = envelope.decode_payload().unwrap();
                seen.push(payload.execution_id);
            }
            seen
        }));
    }

    for i in 0..total {
        queue.enqueue_run(QUEUE, i).await.unwrap();
    }

    let mut all = Vec::new();
    for consumer in consumers {
        all.extend(consumer.await.unwrap());
    }
    let unique: HashSet<u64> = all.iter().copied().collect();
    assert_eq!(all.len() as u64, total);
    assert_eq!(unique.len() as u64, total);
    assert_eq!(backend.len(QUEUE).await, 0);
}

#[tokio::test]
async fn test_garbage_entry_is_deserialization_error() {
    let (backend, queue) = setup();
    backend.push(QUEUE, b"not an envelope".to_vec()).await.unwrap();

    let err = queue
        .dequeue(QUEUE, Duration::from_millis(100))
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::Deserialization(_)));

    // The bad entry was consumed
    assert_eq!(backend.len(QUEUE).await, 0);
}

#[tokio::test]
async fn test_wrong_payload_shape_is_deserialization_error() {
    let (_, queue) = setup();
    queue
        .enqueue(QUEUE, TASK_EXECUTE_WORKFLOW, &json!({"run": "x"}))
        .await
        .unwrap();

    let envelope = queue
        .dequeue(QUEUE, Duration::from_millis(100))
        .await
        .unwrap()
        .unwrap();
    let err = envelope.decode_payload::<ExecuteWorkflowPayload>().unwrap_err();
    assert!(matches!(err, QueueError::Deserialization(_)));
}

#[tokio::test]
async fn test_closed_queue_is_unavailable() {
    let (backend, queue) = setup();
    backend.close().await;

    let err = queue.enqueue_run(QUEUE, 1).await.unwrap_err();
    assert!(matches!(err, QueueError::Unavailable(_)));
    let err = queue
        .dequeue(QUEUE, Duration::from_millis(10))
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::Unavailable(_)));
}

#[tokio::test]
async fn test_close_wakes_blocked_consumers() {
    let (backend, queue) = setup();
    let consumers: Vec<_> = (0..3)
        .map(|i| {
            let queue = queue.clone();
            let name = format!("{}_{}", QUEUE, i);
            tokio::spawn(async move { queue.dequeue(&name, Duration::from_secs(30)).await })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(20)).await;
    backend.close().await;

    for consumer in consumers {
        let result = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .expect("consumer stayed blocked after close")
            .unwrap();
        assert!(matches!(result, Err(QueueError::Unavailable(_))));
    }
}
