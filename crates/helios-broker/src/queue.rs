use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use async_trait::async_trait;
use helios_core::wire::{processing_deadlines, processing_list};
use helios_core::TaskDescriptor;
use redis::AsyncCommands;

/// Exclusive right to process one job, bounded by a visibility
/// window. Dropping a `Lease` without calling `complete`/`fail` on it
/// leaves the job in its queue's processing list until the window
/// elapses and a reaper requeues it, mirroring how a real broker
/// client behaves on a crashed consumer, so tests that want to
/// exercise crash-recovery can just drop the lease.
#[derive(Debug, Clone)]
pub struct Lease {
    pub queue: String,
    pub descriptor: TaskDescriptor,
    pub(crate) payload: String,
}

/// `Enqueue`/`Lease`/`Complete`/`Fail`. The broker is an external
/// dependency reached only through this trait, so swapping Redis for
/// another queue implementation touches nothing else.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, queue: &str, descriptor: &TaskDescriptor) -> Result<()>;

    /// Lease the next job from the first non-empty queue in
    /// `queues_in_drain_order`, blocking briefly if all are empty.
    /// Returns `None` on a timeout with nothing available; callers
    /// loop.
    async fn lease(&self, queues_in_drain_order: &[&str]) -> Result<Option<Lease>>;

    async fn complete(&self, lease: Lease) -> Result<()>;

    /// No retry of user code: `fail` releases the lease exactly like
    /// `complete`. Kept as a distinct method because a future broker
    /// backend might route failed jobs to a dead-letter queue; today
    /// it's identical to `complete`.
    async fn fail(&self, lease: Lease) -> Result<()>;

    /// Requeue jobs whose visibility timeout has elapsed. Returns how
    /// many were requeued. Not on the hot path: called periodically
    /// by a background reaper task.
    async fn reap_expired(&self, queues: &[&str]) -> Result<usize>;
}

pub struct RedisJobQueue {
    client: redis::Client,
    visibility_timeout: Duration,
    poll_timeout_secs: usize,
}

impl RedisJobQueue {
    pub fn new(client: redis::Client, visibility_timeout: Duration) -> Self {
        RedisJobQueue {
            client,
            visibility_timeout,
            poll_timeout_secs: 1,
        }
    }

    async fn conn(&self) -> Result<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    fn queue_key(queue: &str) -> String {
        format!("queue:{queue}")
    }

    async fn record_deadline(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        queue: &str,
        payload: &str,
    ) -> Result<()> {
        let deadline = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .saturating_add(self.visibility_timeout)
            .as_millis() as u64;
        conn.hset::<_, _, _, ()>(processing_deadlines(queue), payload, deadline)
            .await
            .context("recording lease deadline")?;
        Ok(())
    }

    async fn try_take_nonblocking(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        queue: &str,
    ) -> Result<Option<String>> {
        let payload: Option<String> = conn
            .rpoplpush(Self::queue_key(queue), processing_list(queue))
            .await
            .context("rpoplpush")?;
        Ok(payload)
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, queue: &str, descriptor: &TaskDescriptor) -> Result<()> {
        let payload = serde_json::to_string(descriptor).context("serializing task descriptor")?;
        let mut conn = self.conn().await?;
        conn.lpush::<_, _, ()>(Self::queue_key(queue), payload)
            .await
            .context("enqueuing job")?;
        Ok(())
    }

    async fn lease(&self, queues_in_drain_order: &[&str]) -> Result<Option<Lease>> {
        let mut conn = self.conn().await?;

        // Strict priority: check every higher-priority queue with a
        // non-blocking pop before ever blocking on a lower one.
        for (idx, queue) in queues_in_drain_order.iter().enumerate() {
            if let Some(payload) = self.try_take_nonblocking(&mut conn, queue).await? {
                self.record_deadline(&mut conn, queue, &payload).await?;
                let descriptor: TaskDescriptor =
                    serde_json::from_str(&payload).context("deserializing task descriptor")?;
                return Ok(Some(Lease {
                    queue: queue.to_string(),
                    descriptor,
                    payload,
                }));
            }
            let is_last = idx + 1 == queues_in_drain_order.len();
            if is_last {
                // Nothing ready anywhere; block briefly on the
                // lowest-priority queue so we don't busy-spin, then
                // let the caller loop back around to re-check the
                // higher-priority queues.
                let payload: Option<String> = conn
                    .brpoplpush(
                        Self::queue_key(queue),
                        processing_list(queue),
                        self.poll_timeout_secs as f64,
                    )
                    .await
                    .context("brpoplpush")?;
                if let Some(payload) = payload {
                    self.record_deadline(&mut conn, queue, &payload).await?;
                    let descriptor: TaskDescriptor = serde_json::from_str(&payload)
                        .context("deserializing task descriptor")?;
                    return Ok(Some(Lease {
                        queue: queue.to_string(),
                        descriptor,
                        payload,
                    }));
                }
            }
        }
        Ok(None)
    }

    async fn complete(&self, lease: Lease) -> Result<()> {
        let mut conn = self.conn().await?;
        conn.lrem::<_, _, ()>(processing_list(&lease.queue), 1, &lease.payload)
            .await
            .context("removing completed lease from processing list")?;
        conn.hdel::<_, _, ()>(processing_deadlines(&lease.queue), &lease.payload)
            .await
            .context("clearing lease deadline")?;
        Ok(())
    }

    async fn fail(&self, lease: Lease) -> Result<()> {
        self.complete(lease).await
    }

    async fn reap_expired(&self, queues: &[&str]) -> Result<usize> {
        let mut conn = self.conn().await?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        let mut requeued = 0usize;
        for queue in queues {
            let deadlines: Vec<(String, u64)> =
                conn.hgetall(processing_deadlines(queue)).await.context("reading deadlines")?;
            for (payload, deadline) in deadlines {
                if deadline > now {
                    continue;
                }
                let removed: i64 = conn
                    .lrem(processing_list(queue), 1, &payload)
                    .await
                    .context("removing expired lease")?;
                if removed > 0 {
                    conn.lpush::<_, _, ()>(Self::queue_key(queue), &payload)
                        .await
                        .context("requeuing expired lease")?;
                    requeued += 1;
                }
                conn.hdel::<_, _, ()>(processing_deadlines(queue), &payload)
                    .await
                    .context("clearing expired deadline")?;
            }
        }
        Ok(requeued)
    }
}
