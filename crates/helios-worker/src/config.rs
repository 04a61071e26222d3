use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "helios-worker", about = "Helios worker: leases and executes queued tasks")]
pub struct Config {
    #[arg(long, env = "HELIOS_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    /// Root under which every task's working directory lives. Worker
    /// refuses to run a descriptor whose `working_dir` falls outside
    /// it, since that would mean a worker and manager disagree about
    /// the shared mount.
    #[arg(long, env = "HELIOS_STORAGE_ROOT", default_value = "/var/helios/tasks")]
    pub storage_root: PathBuf,

    /// Doubles as the lease visibility timeout and the wall-clock cap
    /// on one job's execution: a container wait blocks on this
    /// deadline, and the reaper requeues a lease that outlives it.
    #[arg(long, env = "HELIOS_JOB_TIMEOUT_SECS", default_value_t = 3600)]
    pub job_timeout_secs: u64,

    /// Concurrent job cap. Defaults to the host's available
    /// parallelism when unset.
    #[arg(long, env = "HELIOS_WORKER_SLOTS")]
    pub worker_slots: Option<usize>,

    #[arg(long, env = "HELIOS_RUNTIME_IMAGE", default_value = "python:3.9-slim")]
    pub runtime_image: String,

    #[arg(long, env = "HELIOS_STATUS_GRACE_SECS", default_value_t = 0)]
    pub status_grace_secs: u64,

    /// Orphan-lease sweep interval. Zero disables the reaper entirely:
    /// a lease whose visibility window elapses then stays in its
    /// queue's processing list, unclaimed, until something else sweeps
    /// it (operator intervention, or the reaper being turned on).
    #[arg(long, env = "HELIOS_REAP_INTERVAL_SECS", default_value_t = 0)]
    pub reap_interval_secs: u64,

    #[arg(long, env = "HELIOS_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn resolved_slots(&self) -> usize {
        self.worker_slots.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}
