use std::time::Duration;

/// Connection settings for the coordination substrate. Constructed
/// from environment variables by the manager/worker binaries; kept
/// free of `clap` here so this crate doesn't pull in a CLI dependency
/// it has no use for.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    /// Status-store grace period before a terminal record may be
    /// expired. Zero disables expiry.
    pub status_grace: Duration,
}

impl RedisConfig {
    pub fn from_env() -> Self {
        let url = std::env::var("HELIOS_REDIS_URL")
            .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let status_grace = std::env::var("HELIOS_STATUS_GRACE_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::ZERO);
        RedisConfig { url, status_grace }
    }

    pub fn client(&self) -> anyhow::Result<redis::Client> {
        Ok(redis::Client::open(self.url.clone())?)
    }
}
