use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use helios_core::wire::log_channel;
use helios_core::{TaskId, TerminalMarker};
use redis::AsyncCommands;

/// A live, subscribed stream of raw wire lines for one task: zero or
/// more log lines in production order, followed by exactly one
/// terminal marker line, then the stream ends.
pub type LogStream = BoxStream<'static, String>;

#[async_trait]
pub trait LogPublisher: Send + Sync {
    async fn publish_line(&self, task_id: TaskId, line: &str) -> Result<()>;
    async fn publish_terminal(&self, task_id: TaskId, marker: &TerminalMarker) -> Result<()>;
}

#[async_trait]
pub trait LogSubscriber: Send + Sync {
    /// Subscribe to a task's log channel. Pub/sub has no retention:
    /// the returned stream only yields messages published after this
    /// call completes.
    async fn subscribe(&self, task_id: TaskId) -> Result<LogStream>;
}

pub struct RedisLogChannel {
    client: redis::Client,
}

impl RedisLogChannel {
    pub fn new(client: redis::Client) -> Self {
        RedisLogChannel { client }
    }

    async fn conn(&self) -> Result<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl LogPublisher for RedisLogChannel {
    async fn publish_line(&self, task_id: TaskId, line: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        conn.publish::<_, _, ()>(log_channel(task_id), line)
            .await
            .context("publishing log line")?;
        Ok(())
    }

    async fn publish_terminal(&self, task_id: TaskId, marker: &TerminalMarker) -> Result<()> {
        let mut conn = self.conn().await?;
        conn.publish::<_, _, ()>(log_channel(task_id), marker.to_string())
            .await
            .context("publishing terminal marker")?;
        Ok(())
    }
}

#[async_trait]
impl LogSubscriber for RedisLogChannel {
    async fn subscribe(&self, task_id: TaskId) -> Result<LogStream> {
        let conn = self.client.get_async_connection().await?;
        let mut pubsub = conn.into_pubsub();
        pubsub
            .subscribe(log_channel(task_id))
            .await
            .context("subscribing to log channel")?;

        let stream = stream::unfold(pubsub, |mut pubsub| async move {
            loop {
                let msg = {
                    let mut on_message = pubsub.on_message();
                    on_message.next().await
                };
                match msg {
                    None => return None,
                    Some(msg) => match msg.get_payload::<String>() {
                        Ok(line) => return Some((line, pubsub)),
                        Err(_) => continue,
                    },
                }
            }
        });
        Ok(stream.boxed())
    }
}
