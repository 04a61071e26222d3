use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use helios_core::wire::status_key;
use helios_core::{TaskId, TaskStatus};
use redis::AsyncCommands;

/// `TaskID -> status string`, last-writer-wins. The monotonic
/// lifecycle and single-lease-per-task invariant mean correct
/// operation never has two writers racing on the same key.
#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn set(&self, task_id: TaskId, status: TaskStatus) -> Result<()>;
    async fn get(&self, task_id: TaskId) -> Result<Option<TaskStatus>>;
}

pub struct RedisStatusStore {
    client: redis::Client,
    terminal_grace: Duration,
}

impl RedisStatusStore {
    pub fn new(client: redis::Client, terminal_grace: Duration) -> Self {
        RedisStatusStore {
            client,
            terminal_grace,
        }
    }

    async fn conn(&self) -> Result<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl StatusStore for RedisStatusStore {
    async fn set(&self, task_id: TaskId, status: TaskStatus) -> Result<()> {
        let mut conn = self.conn().await?;
        let key = status_key(task_id);
        conn.set::<_, _, ()>(&key, status.as_wire_str())
            .await
            .context("writing status record")?;
        if status.is_terminal() && !self.terminal_grace.is_zero() {
            conn.expire::<_, ()>(&key, self.terminal_grace.as_secs() as i64)
                .await
                .context("setting status grace expiry")?;
        }
        Ok(())
    }

    async fn get(&self, task_id: TaskId) -> Result<Option<TaskStatus>> {
        let mut conn = self.conn().await?;
        let raw: Option<String> = conn
            .get(status_key(task_id))
            .await
            .context("reading status record")?;
        Ok(match raw {
            Some(s) => Some(s.parse().context("parsing stored status")?),
            None => None,
        })
    }
}
