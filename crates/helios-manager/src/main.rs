use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use helios_broker::config::RedisConfig;
use helios_broker::pubsub::RedisLogChannel;
use helios_broker::queue::RedisJobQueue;
use helios_broker::status_store::RedisStatusStore;
use helios_manager::config::Config;
use helios_manager::fanout::Fanout;
use helios_manager::state::AppState;
use helios_manager::http;
use slog::Drain;

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
    slog::Logger::root(drain, slog::o!("service" => "helios-manager"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    let log = build_logger(&config.log_level);

    tokio::fs::create_dir_all(&config.storage_root).await?;

    let redis_config = RedisConfig {
        url: config.redis_url.clone(),
        status_grace: Duration::from_secs(config.status_grace_secs),
    };
    let client = redis_config.client()?;

    let queue = Arc::new(RedisJobQueue::new(client.clone(), Duration::from_secs(3600)));
    let status_store = Arc::new(RedisStatusStore::new(client.clone(), redis_config.status_grace));
    let log_channel = Arc::new(RedisLogChannel::new(client));

    let fanout = Fanout::new(log_channel, log.clone());

    let state = AppState {
        storage_root: config.storage_root.clone(),
        queue,
        status_store,
        fanout,
        log: log.clone(),
    };

    let app = http::router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    slog::info!(log, "listening"; "addr" => config.bind_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
