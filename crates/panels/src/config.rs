//! Runtime settings read from `WRANGLER_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const CLUSTERS_REFRESH_SECS: u64 = 10;
pub const LAYERS_REFRESH_SECS: u64 = 5;
pub const JOBS_REFRESH_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub clusters_refresh: Duration,
    pub layers_refresh: Duration,
    pub jobs_refresh: Duration,
    /// Reason recorded on the farm for jobs killed from the console.
    pub kill_reason: String,
    /// Farm fixture used by the in-memory client.
    pub fixture: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            clusters_refresh: Duration::from_secs(CLUSTERS_REFRESH_SECS),
            layers_refresh: Duration::from_secs(LAYERS_REFRESH_SECS),
            jobs_refresh: Duration::from_secs(JOBS_REFRESH_SECS),
            kill_reason: "wrangler".to_string(),
            fixture: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults and
    /// unparsable values are logged and ignored.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        let secs = |key: &str, default: Duration| -> Duration {
            match get(key) {
                None => default,
                Some(v) => match v.trim().parse::<u64>() {
                    Ok(n) if n > 0 => Duration::from_secs(n),
                    _ => {
                        warn!(key, value = %v, "ignoring invalid refresh interval");
                        default
                    }
                },
            }
        };
        Self {
            clusters_refresh: secs("WRANGLER_CLUSTERS_REFRESH_SECS", d.clusters_refresh),
            layers_refresh: secs("WRANGLER_LAYERS_REFRESH_SECS", d.layers_refresh),
            jobs_refresh: secs("WRANGLER_JOBS_REFRESH_SECS", d.jobs_refresh),
            kill_reason: get("WRANGLER_KILL_REASON").filter(|s| !s.trim().is_empty()).unwrap_or(d.kill_reason),
            fixture: get("WRANGLER_FIXTURE").filter(|s| !s.is_empty()).map(PathBuf::from),
        }
    }
}
