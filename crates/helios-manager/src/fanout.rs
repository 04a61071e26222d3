//! Log fan-out: one reader task per `TaskId` with at least one live
//! subscriber, broadcasting each published line to every registered
//! WebSocket session. A session whose channel is full is dropped
//! rather than allowed to stall the others (Design Notes §9).

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::Message;
use futures::StreamExt;
use helios_core::{TaskId, TerminalMarker};
use slog::Logger;
use tokio::sync::{mpsc, Mutex};

use helios_broker::LogSubscriber;

pub struct Fanout {
    subscribers: Mutex<HashMap<TaskId, Vec<mpsc::Sender<Message>>>>,
    log_subscriber: Arc<dyn LogSubscriber>,
    log: Logger,
}

impl Fanout {
    pub fn new(log_subscriber: Arc<dyn LogSubscriber>, log: Logger) -> Arc<Self> {
        Arc::new(Fanout {
            subscribers: Mutex::new(HashMap::new()),
            log_subscriber,
            log,
        })
    }

    /// Register a session's sender for `task_id`. Spawns the forwarder
    /// task the first time any session subscribes to that task.
    pub async fn register(self: &Arc<Self>, task_id: TaskId, sender: mpsc::Sender<Message>) {
        let mut subs = self.subscribers.lock().await;
        let is_first = !subs.contains_key(&task_id);
        subs.entry(task_id).or_default().push(sender);
        drop(subs);

        if is_first {
            let this = Arc::clone(self);
            tokio::spawn(async move { this.forward(task_id).await });
        }
    }

    async fn forward(self: Arc<Self>, task_id: TaskId) {
        let mut stream = match self.log_subscriber.subscribe(task_id).await {
            Ok(stream) => stream,
            Err(err) => {
                slog::error!(self.log, "log subscribe failed"; "task_id" => %task_id, "error" => %err);
                self.subscribers.lock().await.remove(&task_id);
                return;
            }
        };

        while let Some(line) = stream.next().await {
            let terminal =
                line == TerminalMarker::Complete.to_string() || TerminalMarker::is_failed_wire_prefix(&line);
            self.broadcast(task_id, line).await;
            if terminal {
                break;
            }
        }
        self.subscribers.lock().await.remove(&task_id);
    }

    async fn broadcast(&self, task_id: TaskId, line: String) {
        let mut subs = self.subscribers.lock().await;
        if let Some(senders) = subs.get_mut(&task_id) {
            senders.retain(|sender| sender.try_send(Message::Text(line.clone())).is_ok());
        }
    }
}
