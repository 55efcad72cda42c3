use crate::{QueueBackend, QueueError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct Slot {
    entries: VecDeque<Vec<u8>>,
    ready: Arc<Notify>,
}

/// In-process queue backend
#[derive(Default)]
pub struct MemoryQueue {
    slots: Mutex<HashMap<String, Slot>>,
    closed: CancellationToken,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries waiting on `queue`
    pub async fn len(&self, queue: &str) -> usize {
        self.slots
            .lock()
            .await
            .get(queue)
            .map_or(0, |slot| slot.entries.len())
    }

    /// Refuse further pushes and pops.
    ///
    /// Consumers blocked in `pop` wake up with `Unavailable`.
    pub async fn close(&self) {
        self.closed.cancel();
    }

    fn check_open(&self) -> Result<(), QueueError> {
        if self.closed.is_cancelled() {
            return Err(QueueError::Unavailable("queue is closed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl QueueBackend for MemoryQueue {
    async fn push(&self, queue: &str, entry: Vec<u8>) -> Result<(), QueueError> {
        self.check_open()?;
        let mut slots = self.slots.lock().await;
        let slot = slots.entry(queue.to_string()).or_default();
        slot.entries.push_back(entry);
        slot.ready.notify_one();
        Ok(())
    }

    async fn pop(&self, queue: &str, timeout: Duration) -> Result<Option<Vec<u8>>, QueueError> {
        let deadline = Instant::now() + timeout;

        loop {
            self.check_open()?;
            let ready = {
                let mut slots = self.slots.lock().await;
                let slot = slots.entry(queue.to_string()).or_default();
                if let Some(entry) = slot.entries.pop_front() {
                    // Hand any remaining entries to the next waiter
                    if !slot.entries.is_empty() {
                        slot.ready.notify_one();
                    }
                    return Ok(Some(entry));
                }
                slot.ready.clone()
            };

            let woken = tokio::time::timeout_at(deadline, async {
                tokio::select! {
                    _ = self.closed.cancelled() => {}
                    _ = ready.notified() => {}
                }
            })
            .await;
            if woken.is_err() {
                return Ok(None);
            }
        }
    }
}
