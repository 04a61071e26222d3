//! The container driver, abstracted behind `ContainerRuntime` so the
//! lease loop and per-job protocol never depend on Docker directly.
//! Mirrors the trait-per-collaborator shape used throughout the
//! broker crate, with a `bollard` implementation and an in-memory fake
//! for tests.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Mutex;

use async_trait::async_trait;
use bollard::container::{
    Config as ContainerConfig, LogOutput, LogsOptions, RemoveContainerOptions, WaitContainerOptions,
};
use bollard::models::HostConfig;
use bollard::Docker;
use futures::{Stream, StreamExt};
use helios_core::{ExecutionError, Resources};

/// One event from a running container: a captured log line, or the
/// final exit code. Exactly one `Exited` terminates the sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerEvent {
    Log(String),
    Exited(i64),
}

/// Everything needed to start a task's container. `host_working_dir`
/// is bind-mounted at `mount_point`; `entrypoint` is relative to it.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub image: String,
    pub host_working_dir: PathBuf,
    pub mount_point: String,
    pub entrypoint: PathBuf,
    pub resources: Resources,
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn spawn(&self, spec: ContainerSpec) -> Result<Box<dyn RunningContainer>, ExecutionError>;
}

#[async_trait]
pub trait RunningContainer: Send {
    /// Next log line or, once the container has exited and its output
    /// has been fully drained, the exit code. Returns `Ok(None)` only
    /// if the container produced no exit status at all (treated as a
    /// runtime error by the caller).
    async fn next_event(&mut self) -> Result<Option<ContainerEvent>, ExecutionError>;

    /// Remove the container. Best-effort; errors are swallowed since
    /// by the time this is called the job's outcome is already
    /// decided.
    async fn remove(self: Box<Self>);
}

pub struct BollardRuntime {
    client: Docker,
}

impl BollardRuntime {
    pub fn connect() -> Result<Self, ExecutionError> {
        let client = Docker::connect_with_local_defaults()
            .map_err(|e| ExecutionError::ContainerEngine(e.to_string()))?;
        Ok(BollardRuntime { client })
    }
}

#[async_trait]
impl ContainerRuntime for BollardRuntime {
    async fn spawn(&self, spec: ContainerSpec) -> Result<Box<dyn RunningContainer>, ExecutionError> {
        let bind = format!("{}:{}", spec.host_working_dir.display(), spec.mount_point);
        let mut host_config = HostConfig {
            binds: Some(vec![bind]),
            ..Default::default()
        };
        // Caps applied disjointly: `cpu_cores` only ever touches the
        // CPU quota, `mem_bytes` only ever touches the memory limit.
        if let Some(cpu_cores) = spec.resources.cpu_cores {
            host_config.nano_cpus = Some(i64::from(cpu_cores) * 1_000_000_000);
        }
        if let Some(mem_bytes) = spec.resources.mem_bytes {
            host_config.memory = Some(mem_bytes as i64);
        }

        let entrypoint = format!("{}/{}", spec.mount_point, spec.entrypoint.display());
        let shell_cmd = format!(
            "[ -f requirements.txt ] && pip install -r requirements.txt; python3 -u {entrypoint}"
        );
        let container_config = ContainerConfig {
            image: Some(spec.image),
            cmd: Some(vec!["sh".to_string(), "-c".to_string(), shell_cmd]),
            working_dir: Some(spec.mount_point),
            host_config: Some(host_config),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let container = self
            .client
            .create_container::<String, String>(None, container_config)
            .await
            .map_err(|e| ExecutionError::ContainerEngine(e.to_string()))?;

        self.client
            .start_container::<String>(&container.id, None)
            .await
            .map_err(|e| ExecutionError::ContainerEngine(e.to_string()))?;

        let logs = self.client.logs(
            &container.id,
            Some(LogsOptions::<String> {
                follow: true,
                stdout: true,
                stderr: true,
                ..Default::default()
            }),
        );

        Ok(Box::new(BollardRunningContainer {
            client: self.client.clone(),
            container_id: container.id,
            logs: Box::pin(logs),
            drained: false,
        }))
    }
}

type LogStream = Pin<Box<dyn Stream<Item = Result<LogOutput, bollard::errors::Error>> + Send>>;

struct BollardRunningContainer {
    client: Docker,
    container_id: String,
    logs: LogStream,
    drained: bool,
}

fn log_line(output: LogOutput) -> String {
    let message = match output {
        LogOutput::StdOut { message }
        | LogOutput::StdErr { message }
        | LogOutput::StdIn { message }
        | LogOutput::Console { message } => message,
    };
    String::from_utf8_lossy(&message)
        .trim_end_matches('\n')
        .to_string()
}

#[async_trait]
impl RunningContainer for BollardRunningContainer {
    async fn next_event(&mut self) -> Result<Option<ContainerEvent>, ExecutionError> {
        if !self.drained {
            loop {
                match self.logs.next().await {
                    Some(Ok(output)) => {
                        let line = log_line(output);
                        if line.is_empty() {
                            continue;
                        }
                        return Ok(Some(ContainerEvent::Log(line)));
                    }
                    Some(Err(e)) => return Err(ExecutionError::ContainerEngine(e.to_string())),
                    None => break,
                }
            }
            self.drained = true;
        }

        let status = self
            .client
            .wait_container(&self.container_id, None::<WaitContainerOptions<String>>)
            .next()
            .await
            .transpose()
            .map_err(|e| ExecutionError::ContainerEngine(e.to_string()))?;
        Ok(status.map(|response| ContainerEvent::Exited(response.status_code)))
    }

    async fn remove(self: Box<Self>) {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        let _ = self.client.remove_container(&self.container_id, Some(options)).await;
    }
}

/// In-memory `ContainerRuntime` driven by pre-scripted event
/// sequences, one consumed per `spawn` call, so tests can exercise the
/// worker's per-job protocol and its error paths without a Docker
/// daemon.
#[derive(Default)]
pub struct FakeRuntime {
    scripts: Mutex<VecDeque<Vec<ContainerEvent>>>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_run(&self, events: Vec<ContainerEvent>) {
        self.scripts.lock().unwrap().push_back(events);
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn spawn(&self, _spec: ContainerSpec) -> Result<Box<dyn RunningContainer>, ExecutionError> {
        let events = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ExecutionError::Runtime("no scripted run queued on FakeRuntime".into()))?;
        Ok(Box::new(FakeRunningContainer {
            events: events.into(),
        }))
    }
}

struct FakeRunningContainer {
    events: VecDeque<ContainerEvent>,
}

#[async_trait]
impl RunningContainer for FakeRunningContainer {
    async fn next_event(&mut self) -> Result<Option<ContainerEvent>, ExecutionError> {
        Ok(self.events.pop_front())
    }

    async fn remove(self: Box<Self>) {}
}
