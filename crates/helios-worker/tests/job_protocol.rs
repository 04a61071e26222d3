use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use helios_broker::fake::{FakeJobQueue, FakeLogChannel, FakeStatusStore};
use helios_broker::queue::{JobQueue, Lease};
use helios_broker::StatusStore;
use helios_core::{ExecutionError, Priority, Resources, TaskDescriptor, TaskId, TaskStatus};
use helios_worker::executor::{ContainerEvent, ContainerRuntime, ContainerSpec, FakeRuntime, RunningContainer};
use helios_worker::job::JobRunner;

fn test_logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}

async fn setup() -> (
    tempfile::TempDir,
    Arc<FakeJobQueue>,
    Arc<FakeStatusStore>,
    Arc<FakeLogChannel>,
    Arc<FakeRuntime>,
    JobRunner,
) {
    let storage = tempfile::tempdir().unwrap();
    let queue = Arc::new(FakeJobQueue::with_default_timeout());
    let status_store = Arc::new(FakeStatusStore::new());
    let log_channel = FakeLogChannel::new();
    let runtime = Arc::new(FakeRuntime::new());

    let runner = JobRunner::new(
        runtime.clone(),
        queue.clone(),
        status_store.clone(),
        log_channel.clone(),
        "python:3.9-slim".to_string(),
        "/workspace".to_string(),
        storage.path().to_path_buf(),
        Duration::from_secs(3600),
        test_logger(),
    );
    (storage, queue, status_store, log_channel, runtime, runner)
}

/// A container that never produces an event, for exercising the
/// per-job deadline.
struct HangingRuntime;

#[async_trait]
impl ContainerRuntime for HangingRuntime {
    async fn spawn(&self, _spec: ContainerSpec) -> Result<Box<dyn RunningContainer>, ExecutionError> {
        Ok(Box::new(HangingContainer))
    }
}

struct HangingContainer;

#[async_trait]
impl RunningContainer for HangingContainer {
    async fn next_event(&mut self) -> Result<Option<ContainerEvent>, ExecutionError> {
        tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
        Ok(None)
    }

    async fn remove(self: Box<Self>) {}
}

async fn descriptor_under(root: &std::path::Path) -> TaskDescriptor {
    let id = TaskId::new();
    let working_dir = root.join(id.to_string());
    tokio::fs::create_dir_all(&working_dir).await.unwrap();
    TaskDescriptor {
        id,
        working_dir,
        entrypoint: PathBuf::from("main.py"),
        priority: Priority::Default,
        name: "demo".into(),
        resources: Resources::default(),
    }
}

async fn lease_for(queue: &FakeJobQueue, descriptor: TaskDescriptor) -> Lease {
    queue.enqueue("default", &descriptor).await.unwrap();
    queue.lease(&["high", "default"]).await.unwrap().unwrap()
}

#[tokio::test]
async fn successful_run_marks_succeeded_and_cleans_up() {
    let (storage, queue, status_store, _log_channel, runtime, runner) = setup().await;
    let descriptor = descriptor_under(storage.path()).await;
    let working_dir = descriptor.working_dir.clone();
    let task_id = descriptor.id;

    runtime.push_run(vec![
        ContainerEvent::Log("building".into()),
        ContainerEvent::Log("done".into()),
        ContainerEvent::Exited(0),
    ]);

    let lease = lease_for(&queue, descriptor).await;
    runner.run(lease).await;

    assert_eq!(
        status_store.get(task_id).await.unwrap(),
        Some(TaskStatus::Succeeded)
    );
    assert!(!working_dir.exists());
    assert_eq!(queue.reap_expired(&["high", "default"]).await.unwrap(), 0);
}

#[tokio::test]
async fn nonzero_exit_marks_failed() {
    let (storage, queue, status_store, _log_channel, runtime, runner) = setup().await;
    let descriptor = descriptor_under(storage.path()).await;
    let task_id = descriptor.id;

    runtime.push_run(vec![ContainerEvent::Exited(7)]);

    let lease = lease_for(&queue, descriptor).await;
    runner.run(lease).await;

    assert_eq!(
        status_store.get(task_id).await.unwrap(),
        Some(TaskStatus::Failed)
    );
}

#[tokio::test]
async fn redelivered_terminal_task_is_not_rerun() {
    let (storage, queue, status_store, _log_channel, runtime, runner) = setup().await;
    let descriptor = descriptor_under(storage.path()).await;
    let task_id = descriptor.id;
    status_store.set(task_id, TaskStatus::Succeeded).await.unwrap();

    // No scripted run pushed: if the runner tried to launch a
    // container, FakeRuntime::spawn would return an error and the
    // task would be marked Failed instead.
    let lease = lease_for(&queue, descriptor).await;
    runner.run(lease).await;

    assert_eq!(
        status_store.get(task_id).await.unwrap(),
        Some(TaskStatus::Succeeded)
    );
}

#[tokio::test]
async fn working_directory_outside_storage_root_is_rejected() {
    let (storage, queue, status_store, _log_channel, _runtime, runner) = setup().await;
    let mut descriptor = descriptor_under(storage.path()).await;
    let task_id = descriptor.id;
    let outside = tempfile::tempdir().unwrap();
    descriptor.working_dir = outside.path().to_path_buf();

    let lease = lease_for(&queue, descriptor).await;
    runner.run(lease).await;

    assert_eq!(
        status_store.get(task_id).await.unwrap(),
        Some(TaskStatus::Failed)
    );
}

#[tokio::test(start_paused = true)]
async fn container_exceeding_job_timeout_is_marked_failed() {
    let storage = tempfile::tempdir().unwrap();
    let queue = Arc::new(FakeJobQueue::with_default_timeout());
    let status_store = Arc::new(FakeStatusStore::new());
    let log_channel = FakeLogChannel::new();

    let runner = JobRunner::new(
        Arc::new(HangingRuntime),
        queue.clone(),
        status_store.clone(),
        log_channel,
        "python:3.9-slim".to_string(),
        "/workspace".to_string(),
        storage.path().to_path_buf(),
        Duration::from_secs(1),
        test_logger(),
    );

    let descriptor = descriptor_under(storage.path()).await;
    let task_id = descriptor.id;
    let lease = lease_for(&queue, descriptor).await;

    tokio::time::timeout(Duration::from_secs(5), runner.run(lease))
        .await
        .expect("job runner must resolve once its own deadline elapses");

    assert_eq!(
        status_store.get(task_id).await.unwrap(),
        Some(TaskStatus::Failed)
    );
}
