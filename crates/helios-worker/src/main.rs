use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use helios_broker::config::RedisConfig;
use helios_broker::pubsub::RedisLogChannel;
use helios_broker::queue::RedisJobQueue;
use helios_broker::status_store::RedisStatusStore;
use helios_broker::{JobQueue, StatusStore};
use helios_core::wire::QUEUES_IN_DRAIN_ORDER;
use helios_worker::config::Config;
use helios_worker::executor::{BollardRuntime, ContainerRuntime};
use helios_worker::job::JobRunner;
use slog::Drain;
use tokio::sync::Semaphore;

const MOUNT_POINT: &str = "/workspace";

fn build_logger(level: &str) -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let min_level = match level.to_ascii_lowercase().as_str() {
        "trace" => slog::Level::Trace,
        "debug" => slog::Level::Debug,
        "warn" | "warning" => slog::Level::Warning,
        "error" => slog::Level::Error,
        "critical" => slog::Level::Critical,
        _ => slog::Level::Info,
    };
    let drain = slog::LevelFilter::new(drain, min_level).fuse();
    slog::Logger::root(drain, slog::o!("service" => "helios-worker"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    let log = build_logger(&config.log_level);
    let slots = config.resolved_slots();

    let redis_config = RedisConfig {
        url: config.redis_url.clone(),
        status_grace: Duration::from_secs(config.status_grace_secs),
    };
    let client = redis_config.client()?;

    let queue: Arc<dyn JobQueue> = Arc::new(RedisJobQueue::new(
        client.clone(),
        Duration::from_secs(config.job_timeout_secs),
    ));
    let status_store: Arc<dyn StatusStore> =
        Arc::new(RedisStatusStore::new(client.clone(), redis_config.status_grace));
    let log_channel = Arc::new(RedisLogChannel::new(client));
    let runtime: Arc<dyn ContainerRuntime> = Arc::new(BollardRuntime::connect()?);

    let runner = Arc::new(JobRunner::new(
        runtime,
        Arc::clone(&queue),
        status_store,
        log_channel,
        config.runtime_image.clone(),
        MOUNT_POINT.to_string(),
        config.storage_root.clone(),
        Duration::from_secs(config.job_timeout_secs),
        log.clone(),
    ));

    spawn_reaper(
        Arc::clone(&queue),
        Duration::from_secs(config.reap_interval_secs),
        log.clone(),
    );

    slog::info!(log, "worker starting"; "slots" => slots, "image" => &config.runtime_image);

    let semaphore = Arc::new(Semaphore::new(slots));
    loop {
        // A slot is acquired before the next lease, not before the
        // container finishes: leasing never waits on a running job.
        let permit = Arc::clone(&semaphore).acquire_owned().await?;
        match queue.lease(&QUEUES_IN_DRAIN_ORDER).await {
            Ok(Some(lease)) => {
                let runner = Arc::clone(&runner);
                tokio::spawn(async move {
                    runner.run(lease).await;
                    drop(permit);
                });
            }
            Ok(None) => drop(permit),
            Err(err) => {
                slog::error!(log, "lease attempt failed"; "error" => %err);
                drop(permit);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

fn spawn_reaper(queue: Arc<dyn JobQueue>, interval: Duration, log: slog::Logger) {
    if interval.is_zero() {
        slog::info!(log, "orphan-lease reaper disabled");
        return;
    }
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match queue.reap_expired(&QUEUES_IN_DRAIN_ORDER).await {
                Ok(0) => {}
                Ok(count) => slog::info!(log, "reaped expired leases"; "count" => count),
                Err(err) => slog::error!(log, "reap sweep failed"; "error" => %err),
            }
        }
    });
}
