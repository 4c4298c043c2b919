//! podgang.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Push-back cooldown used when a file does not set one.
pub const DEFAULT_REQUEUE_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PodGangConfig {
    pub scheduler: Option<SchedulerConfig>,
    pub retry: Option<RetryConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Ownership name; groups naming another scheduler are skipped.
    pub name: Option<String>,
    /// Push-back cooldown, e.g. "2s".
    pub requeue_delay: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub initial_backoff: Option<String>,
    pub max_backoff: Option<String>,
    /// Concurrent bind retries.
    pub workers: Option<usize>,
}

/// Fully resolved engine settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub scheduler_name: String,
    pub requeue_delay: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub retry_workers: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            scheduler_name: "podgang".to_string(),
            requeue_delay: DEFAULT_REQUEUE_DELAY,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            retry_workers: 4,
        }
    }
}

impl PodGangConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PodGangConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Resolve against defaults. Unparsable durations keep the default.
    pub fn settings(&self) -> EngineSettings {
        let mut settings = EngineSettings::default();

        if let Some(scheduler) = &self.scheduler {
            if let Some(name) = &scheduler.name {
                settings.scheduler_name = name.clone();
            }
            if let Some(delay) = scheduler.requeue_delay.as_deref().and_then(parse_duration) {
                settings.requeue_delay = delay;
            }
        }

        if let Some(retry) = &self.retry {
            if let Some(d) = retry.initial_backoff.as_deref().and_then(parse_duration) {
                settings.initial_backoff = d;
            }
            if let Some(d) = retry.max_backoff.as_deref().and_then(parse_duration) {
                settings.max_backoff = d;
            }
            if let Some(workers) = retry.workers {
                settings.retry_workers = workers.max(1);
            }
        }

        if settings.max_backoff < settings.initial_backoff {
            settings.max_backoff = settings.initial_backoff;
        }
        settings
    }
}

/// Parse "250ms", "2s", "5m", or bare seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim().parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
