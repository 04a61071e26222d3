//! The per-job protocol run by one spawned task per leased job:
//! idempotency check, `Running` write, container execution with
//! line-buffered log capture, terminal marker, terminal status write,
//! working-directory cleanup, lease release.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use helios_broker::queue::Lease;
use helios_broker::{JobQueue, LogPublisher, StatusStore};
use helios_core::{ExecutionError, TaskDescriptor, TaskId, TaskStatus, TerminalMarker};
use slog::Logger;

use crate::executor::{ContainerEvent, ContainerRuntime, ContainerSpec};

pub struct JobRunner {
    runtime: Arc<dyn ContainerRuntime>,
    queue: Arc<dyn JobQueue>,
    status_store: Arc<dyn StatusStore>,
    log_publisher: Arc<dyn LogPublisher>,
    runtime_image: String,
    mount_point: String,
    storage_root: std::path::PathBuf,
    job_timeout: Duration,
    log: Logger,
}

impl JobRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        queue: Arc<dyn JobQueue>,
        status_store: Arc<dyn StatusStore>,
        log_publisher: Arc<dyn LogPublisher>,
        runtime_image: String,
        mount_point: String,
        storage_root: std::path::PathBuf,
        job_timeout: Duration,
        log: Logger,
    ) -> Self {
        JobRunner {
            runtime,
            queue,
            status_store,
            log_publisher,
            runtime_image,
            mount_point,
            storage_root,
            job_timeout,
            log,
        }
    }

    /// Run one leased job to completion. Never panics on a task
    /// failure; `ExecutionError`s become a `Failed` status and a
    /// `[HELIOS_TASK_FAILED:...]` marker instead of propagating.
    pub async fn run(&self, lease: Lease) {
        let task_id = lease.descriptor.id;

        if self.already_terminal(task_id).await {
            slog::warn!(self.log, "skipping redelivered terminal task"; "task_id" => %task_id);
            let _ = self.queue.complete(lease).await;
            return;
        }

        if let Err(err) = self.status_store.set(task_id, TaskStatus::Running).await {
            slog::error!(self.log, "status write failed"; "task_id" => %task_id, "error" => %err);
        }

        let outcome = self.execute(&lease.descriptor).await;
        let failed = outcome.is_err();

        let marker = match &outcome {
            Ok(()) => TerminalMarker::Complete,
            Err(err) => TerminalMarker::failed(err.detail_token()),
        };
        if let Err(err) = self.log_publisher.publish_terminal(task_id, &marker).await {
            slog::error!(self.log, "terminal marker publish failed"; "task_id" => %task_id, "error" => %err);
        }

        let terminal_status = if failed { TaskStatus::Failed } else { TaskStatus::Succeeded };
        if let Err(err) = self.status_store.set(task_id, terminal_status).await {
            slog::error!(self.log, "terminal status write failed"; "task_id" => %task_id, "error" => %err);
        }

        self.remove_working_dir(&lease.descriptor.working_dir).await;

        let release = if failed {
            self.queue.fail(lease).await
        } else {
            self.queue.complete(lease).await
        };
        if let Err(err) = release {
            slog::error!(self.log, "lease release failed"; "task_id" => %task_id, "error" => %err);
        }
    }

    /// Idempotency check for redelivered leases: if this task already
    /// reached a terminal state, a prior attempt already ran it to
    /// completion and this worker must not launch a second container.
    async fn already_terminal(&self, task_id: TaskId) -> bool {
        matches!(
            self.status_store.get(task_id).await,
            Ok(Some(status)) if status.is_terminal()
        )
    }

    async fn execute(&self, descriptor: &TaskDescriptor) -> Result<(), ExecutionError> {
        if !descriptor.working_dir.starts_with(&self.storage_root) {
            return Err(ExecutionError::Runtime(format!(
                "working directory {} outside storage root {}",
                descriptor.working_dir.display(),
                self.storage_root.display()
            )));
        }

        let spec = ContainerSpec {
            image: self.runtime_image.clone(),
            host_working_dir: descriptor.working_dir.clone(),
            mount_point: self.mount_point.clone(),
            entrypoint: descriptor.entrypoint.clone(),
            resources: descriptor.resources,
        };

        let mut container = self.runtime.spawn(spec).await?;
        let mut exit_code = None;
        let drained = tokio::time::timeout(self.job_timeout, async {
            loop {
                match container.next_event().await {
                    Ok(Some(ContainerEvent::Log(line))) => {
                        if let Err(err) = self.log_publisher.publish_line(descriptor.id, &line).await {
                            slog::warn!(self.log, "log publish failed"; "task_id" => %descriptor.id, "error" => %err);
                        }
                    }
                    Ok(Some(ContainerEvent::Exited(code))) => {
                        exit_code = Some(code);
                        return Ok(());
                    }
                    Ok(None) => return Ok(()),
                    Err(err) => return Err(err),
                }
            }
        })
        .await;

        match drained {
            Err(_elapsed) => {
                container.remove().await;
                return Err(ExecutionError::Timeout);
            }
            Ok(Err(err)) => {
                container.remove().await;
                return Err(err);
            }
            Ok(Ok(())) => {}
        }
        container.remove().await;

        match exit_code {
            Some(0) => Ok(()),
            Some(code) => Err(ExecutionError::NonZeroExit(code)),
            None => Err(ExecutionError::Runtime("container exited without a status".into())),
        }
    }

    async fn remove_working_dir(&self, working_dir: &Path) {
        if let Err(err) = tokio::fs::remove_dir_all(working_dir).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                slog::warn!(self.log, "working directory cleanup failed"; "path" => %working_dir.display(), "error" => %err);
            }
        }
    }
}
