//! In-memory implementations of the broker traits, for tests that
//! want to exercise the manager or worker without a running Redis.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use helios_core::{TaskDescriptor, TaskId, TaskStatus, TerminalMarker};
use tokio::sync::{broadcast, Mutex};

use crate::pubsub::{LogPublisher, LogStream, LogSubscriber};
use crate::queue::{JobQueue, Lease};
use crate::status_store::StatusStore;

#[derive(Default)]
struct QueueState {
    queues: HashMap<String, VecDeque<String>>,
    processing: HashMap<String, Vec<(String, Instant)>>,
}

/// In-memory `JobQueue`. FIFO per named queue, with the same
/// processing-list/deadline bookkeeping as the Redis implementation
/// so crash-recovery tests behave the same way against either.
pub struct FakeJobQueue {
    state: Mutex<QueueState>,
    visibility_timeout: Duration,
}

impl FakeJobQueue {
    pub fn new(visibility_timeout: Duration) -> Self {
        FakeJobQueue {
            state: Mutex::new(QueueState::default()),
            visibility_timeout,
        }
    }

    pub fn with_default_timeout() -> Self {
        Self::new(Duration::from_secs(3600))
    }
}

#[async_trait]
impl JobQueue for FakeJobQueue {
    async fn enqueue(&self, queue: &str, descriptor: &TaskDescriptor) -> Result<()> {
        let payload = serde_json::to_string(descriptor)?;
        let mut state = self.state.lock().await;
        state.queues.entry(queue.to_string()).or_default().push_back(payload);
        Ok(())
    }

    async fn lease(&self, queues_in_drain_order: &[&str]) -> Result<Option<Lease>> {
        let mut state = self.state.lock().await;
        for queue in queues_in_drain_order {
            if let Some(payload) = state
                .queues
                .get_mut(*queue)
                .and_then(|q| q.pop_front())
            {
                let descriptor: TaskDescriptor = serde_json::from_str(&payload)?;
                let deadline = Instant::now() + self.visibility_timeout;
                state
                    .processing
                    .entry(queue.to_string())
                    .or_default()
                    .push((payload.clone(), deadline));
                return Ok(Some(Lease {
                    queue: queue.to_string(),
                    descriptor,
                    payload,
                }));
            }
        }
        Ok(None)
    }

    async fn complete(&self, lease: Lease) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(entries) = state.processing.get_mut(&lease.queue) {
            entries.retain(|(payload, _)| payload != &lease.payload);
        }
        Ok(())
    }

    async fn fail(&self, lease: Lease) -> Result<()> {
        self.complete(lease).await
    }

    async fn reap_expired(&self, queues: &[&str]) -> Result<usize> {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        let mut requeued = 0usize;
        for queue in queues {
            let expired: Vec<String> = match state.processing.get_mut(*queue) {
                Some(entries) => {
                    let (expired, remaining): (Vec<_>, Vec<_>) =
                        entries.drain(..).partition(|(_, deadline)| *deadline <= now);
                    *entries = remaining;
                    expired.into_iter().map(|(payload, _)| payload).collect()
                }
                None => Vec::new(),
            };
            if !expired.is_empty() {
                let q = state.queues.entry(queue.to_string()).or_default();
                for payload in expired {
                    q.push_back(payload);
                    requeued += 1;
                }
            }
        }
        Ok(requeued)
    }
}

/// In-memory `StatusStore`.
#[derive(Default)]
pub struct FakeStatusStore {
    records: Mutex<HashMap<TaskId, TaskStatus>>,
}

impl FakeStatusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatusStore for FakeStatusStore {
    async fn set(&self, task_id: TaskId, status: TaskStatus) -> Result<()> {
        self.records.lock().await.insert(task_id, status);
        Ok(())
    }

    async fn get(&self, task_id: TaskId) -> Result<Option<TaskStatus>> {
        Ok(self.records.lock().await.get(&task_id).copied())
    }
}

/// In-memory log channel, backed by one `broadcast` channel per task
/// that has ever been published to. Subscribers that join late simply
/// miss whatever was already sent, same as real pub/sub.
#[derive(Default)]
pub struct FakeLogChannel {
    channels: Mutex<HashMap<TaskId, broadcast::Sender<String>>>,
}

impl FakeLogChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    async fn sender(&self, task_id: TaskId) -> broadcast::Sender<String> {
        let mut channels = self.channels.lock().await;
        channels
            .entry(task_id)
            .or_insert_with(|| broadcast::channel(1024).0)
            .clone()
    }
}

#[async_trait]
impl LogPublisher for FakeLogChannel {
    async fn publish_line(&self, task_id: TaskId, line: &str) -> Result<()> {
        let _ = self.sender(task_id).await.send(line.to_string());
        Ok(())
    }

    async fn publish_terminal(&self, task_id: TaskId, marker: &TerminalMarker) -> Result<()> {
        let _ = self.sender(task_id).await.send(marker.to_string());
        Ok(())
    }
}

#[async_trait]
impl LogSubscriber for FakeLogChannel {
    async fn subscribe(&self, task_id: TaskId) -> Result<LogStream> {
        use futures::stream::StreamExt;
        use tokio_stream::wrappers::BroadcastStream;

        let rx = self.sender(task_id).await.subscribe();
        let stream = BroadcastStream::new(rx).filter_map(|item| async move { item.ok() });
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helios_core::{Priority, Resources};
    use std::path::PathBuf;

    fn descriptor(id: TaskId) -> TaskDescriptor {
        TaskDescriptor {
            id,
            working_dir: PathBuf::from("/tmp/whatever"),
            entrypoint: PathBuf::from("main.py"),
            priority: Priority::Default,
            name: "test".into(),
            resources: Resources::default(),
        }
    }

    #[tokio::test]
    async fn high_drains_before_default() {
        let queue = FakeJobQueue::with_default_timeout();
        let low_id = TaskId::new();
        let high_id = TaskId::new();
        queue.enqueue("default", &descriptor(low_id)).await.unwrap();
        queue.enqueue("high", &descriptor(high_id)).await.unwrap();

        let leased = queue.lease(&["high", "default"]).await.unwrap().unwrap();
        assert_eq!(leased.descriptor.id, high_id);
    }

    #[tokio::test]
    async fn complete_removes_from_processing() {
        let queue = FakeJobQueue::with_default_timeout();
        let id = TaskId::new();
        queue.enqueue("default", &descriptor(id)).await.unwrap();
        let lease = queue.lease(&["high", "default"]).await.unwrap().unwrap();
        queue.complete(lease).await.unwrap();
        assert_eq!(queue.reap_expired(&["high", "default"]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn expired_lease_is_requeued() {
        let queue = FakeJobQueue::new(Duration::from_millis(1));
        let id = TaskId::new();
        queue.enqueue("default", &descriptor(id)).await.unwrap();
        let _lease = queue.lease(&["high", "default"]).await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let requeued = queue.reap_expired(&["high", "default"]).await.unwrap();
        assert_eq!(requeued, 1);
        let leased_again = queue.lease(&["high", "default"]).await.unwrap();
        assert!(leased_again.is_some());
    }

    #[tokio::test]
    async fn late_subscriber_misses_history() {
        let log = FakeLogChannel::new();
        let id = TaskId::new();
        log.publish_line(id, "before").await.unwrap();

        let mut stream = log.subscribe(id).await.unwrap();
        log.publish_line(id, "after").await.unwrap();
        log.publish_terminal(id, &TerminalMarker::Complete).await.unwrap();

        use futures::StreamExt;
        let first = stream.next().await.unwrap();
        let second = stream.next().await.unwrap();
        assert_eq!(first, "after");
        assert_eq!(second, "[HELIOS_TASK_COMPLETE]");
    }
}
