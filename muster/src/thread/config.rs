use std::time::Duration;

use muster_api::BootstrapError;
use serde::{Deserialize, Deserializer};

pub const DEFAULT_PER_WORKER_TIMEOUT: Duration = Duration::from_millis(3000);
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_millis(1000);
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
pub const DEFAULT_MAX_WORKERS: usize = 256;
pub const DEFAULT_THREAD_NAME_PREFIX: &str = "muster-worker-";

/// Configuration for bootstrapping a thread-backed worker pool.
///
/// Loadable from JSON; durations are given in milliseconds and every field is
/// optional:
///
/// ```json
/// { "worker_count": 4, "per_worker_timeout_ms": 3000 }
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BootstrapConfig {
    /// Number of workers in the pool (K).
    pub worker_count: usize,

    /// How long each worker has to acknowledge its init message.
    #[serde(rename = "per_worker_timeout_ms", deserialize_with = "duration_from_millis")]
    pub per_worker_timeout: Duration,

    /// Upper bound on live worker threads per spawner.
    pub max_workers: usize,

    /// Capacity of each direction of a worker's channel.
    pub channel_capacity: usize,

    /// Worker threads are named `<prefix><worker id>`.
    pub thread_name_prefix: String,

    /// Send an explicit NACK when setup fails instead of staying silent until the
    /// owner times out.
    pub nack_on_setup_failure: bool,

    /// Bound on joining a worker thread during pool shutdown.
    #[serde(rename = "join_timeout_ms", deserialize_with = "duration_from_millis")]
    pub join_timeout: Duration,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get(),
            per_worker_timeout: DEFAULT_PER_WORKER_TIMEOUT,
            max_workers: DEFAULT_MAX_WORKERS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
            nack_on_setup_failure: true,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
        }
    }
}

impl BootstrapConfig {
    /// Parse a JSON document and validate the result.
    pub fn from_json_str(json: &str) -> Result<Self, BootstrapError> {
        let config: BootstrapConfig =
            serde_json::from_str(json).map_err(|e| BootstrapError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_timeout(mut self, per_worker_timeout: Duration) -> Self {
        self.per_worker_timeout = per_worker_timeout;
        self
    }

    pub fn validate(&self) -> Result<(), BootstrapError> {
        if self.per_worker_timeout.is_zero() {
            return Err(BootstrapError::Config("per_worker_timeout must be greater than zero".into()));
        }
        if self.channel_capacity == 0 {
            return Err(BootstrapError::Config("channel_capacity must be greater than zero".into()));
        }
        if self.worker_count > self.max_workers {
            return Err(BootstrapError::Config(format!(
                "worker_count ({}) exceeds max_workers ({})",
                self.worker_count, self.max_workers
            )));
        }
        Ok(())
    }
}

fn duration_from_millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(millis))
}
