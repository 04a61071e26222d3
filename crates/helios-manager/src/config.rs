use std::path::PathBuf;

use clap::Parser;

/// Manager configuration, loaded from flags or (preferably, for a
/// service meant to run under an orchestrator) environment variables.
/// Every field has a safe default.
#[derive(Parser, Debug, Clone)]
#[command(name = "helios-manager", about = "Helios task ingress and log fan-out")]
pub struct Config {
    #[arg(long, env = "HELIOS_API_HOST", default_value = "0.0.0.0")]
    pub api_host: String,

    #[arg(long, env = "HELIOS_API_PORT", default_value_t = 8000)]
    pub api_port: u16,

    #[arg(long, env = "HELIOS_STORAGE_ROOT", default_value = "/var/helios/tasks")]
    pub storage_root: PathBuf,

    #[arg(long, env = "HELIOS_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    /// Seconds a terminal status record survives before it may be
    /// expired. Zero disables expiry.
    #[arg(long, env = "HELIOS_STATUS_GRACE_SECS", default_value_t = 0)]
    pub status_grace_secs: u64,

    #[arg(long, env = "HELIOS_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}
