use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration for the Stratus broker.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub flow: FlowConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_broker_name")]
    pub name: String,
    /// Stamp every received message with the broker's wall clock.
    #[serde(default)]
    pub timestamp_messages: bool,
    /// Fraction of a queue's maximum depth at which a management
    /// threshold event is raised.
    #[serde(default = "default_threshold_event_ratio")]
    pub queue_threshold_event_ratio: f64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            name: default_broker_name(),
            timestamp_messages: false,
            queue_threshold_event_ratio: default_threshold_event_ratio(),
        }
    }
}

/// Broker-wide producer flow-control defaults; per-queue declare
/// arguments take precedence.
#[derive(Debug, Clone, Deserialize)]
pub struct FlowConfig {
    #[serde(default = "default_max_queue_size")]
    pub default_max_queue_size: u64,
    /// Percentage of the maximum at which producer flow stops.
    #[serde(default = "default_stop_ratio")]
    pub stop_ratio: u8,
    /// Percentage of the maximum at which producer flow resumes.
    #[serde(default = "default_resume_ratio")]
    pub resume_ratio: u8,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            default_max_queue_size: default_max_queue_size(),
            stop_ratio: default_stop_ratio(),
            resume_ratio: default_resume_ratio(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Upper bound on buffered replay frames per session.
    #[serde(default = "default_replay_limit")]
    pub replay_hard_limit: usize,
    /// Seconds a detached session survives before it is destroyed.
    #[serde(default = "default_detach_timeout")]
    pub detach_timeout_seconds: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            replay_hard_limit: default_replay_limit(),
            detach_timeout_seconds: default_detach_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_broker_name() -> String {
    "stratus".to_string()
}

fn default_threshold_event_ratio() -> f64 {
    0.8
}

fn default_max_queue_size() -> u64 {
    100 * 1024 * 1024
}

fn default_stop_ratio() -> u8 {
    80
}

fn default_resume_ratio() -> u8 {
    70
}

fn default_replay_limit() -> usize {
    4096
}

fn default_detach_timeout() -> u32 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a path resolved via STRATUS_CONFIG or
    /// defaults to `config/stratus.toml`.
    pub fn load_from_env() -> Result<Self> {
        Self::load(env_config_path())
    }

    /// Load configuration from a specific file (TOML or JSON based on extension).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        let data = fs::read_to_string(path_ref)
            .with_context(|| format!("unable to read config {}", path_ref.display()))?;
        let cfg: Self = if is_json(path_ref) {
            serde_json::from_str(&data)
                .with_context(|| format!("invalid JSON config {}", path_ref.display()))?
        } else {
            toml::from_str(&data)
                .with_context(|| format!("invalid TOML config {}", path_ref.display()))?
        };
        Ok(cfg)
    }

    /// Validate schema-level invariants before startup.
    pub fn validate(&self) -> Result<()> {
        if self.flow.stop_ratio > 100 || self.flow.resume_ratio > 100 {
            bail!(
                "flow ratios must be between 0 and 100, inclusive: stop_ratio={} resume_ratio={}",
                self.flow.stop_ratio,
                self.flow.resume_ratio
            );
        }
        if self.flow.resume_ratio > self.flow.stop_ratio {
            bail!(
                "flow stop_ratio must be >= resume_ratio: stop_ratio={} resume_ratio={}",
                self.flow.stop_ratio,
                self.flow.resume_ratio
            );
        }
        if !(0.0..=1.0).contains(&self.broker.queue_threshold_event_ratio) {
            bail!(
                "queue_threshold_event_ratio must be within [0, 1]: {}",
                self.broker.queue_threshold_event_ratio
            );
        }
        if self.session.replay_hard_limit == 0 {
            bail!("session.replay_hard_limit must be > 0");
        }
        Ok(())
    }
}

fn env_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("STRATUS_CONFIG") {
        PathBuf::from(path)
    } else {
        PathBuf::from("config/stratus.toml")
    }
}

fn is_json(path: &Path) -> bool {
    matches!(path.extension().and_then(|s| s.to_str()), Some("json"))
}
