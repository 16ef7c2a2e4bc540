//! Collector and heartbeat configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MetaError, MetaResult};

/// Milliseconds between heartbeat writes.
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 15_000;

/// Granularity of the heartbeat loop.
pub const DEFAULT_HEARTBEAT_TICK_MS: u64 = 1_000;

/// Toolkit version file probed for the `cuda` field.
pub const DEFAULT_CUDA_VERSION_FILE: &str = "/usr/local/cuda/version.txt";

/// Metadata configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaConfig {
    /// Output directory holding the metadata file and captured code.
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    /// Skip code capture and VCS recording.
    #[serde(default)]
    pub disable_code: bool,

    /// Host name override.
    #[serde(default)]
    pub host: Option<String>,

    /// Username override.
    #[serde(default)]
    pub username: Option<String>,

    /// Container identifier; set when running inside a container.
    #[serde(default)]
    pub docker: Option<String>,

    /// Heartbeat interval in milliseconds.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,

    /// Heartbeat loop tick in milliseconds.
    #[serde(default = "default_heartbeat_tick")]
    pub heartbeat_tick_ms: u64,

    /// Accelerator toolkit version file.
    #[serde(default = "default_cuda_version_file")]
    pub cuda_version_file: PathBuf,
}

fn default_out_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_heartbeat_interval() -> u64 {
    DEFAULT_HEARTBEAT_INTERVAL_MS
}

fn default_heartbeat_tick() -> u64 {
    DEFAULT_HEARTBEAT_TICK_MS
}

fn default_cuda_version_file() -> PathBuf {
    PathBuf::from(DEFAULT_CUDA_VERSION_FILE)
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            out_dir: default_out_dir(),
            disable_code: false,
            host: None,
            username: None,
            docker: None,
            heartbeat_interval_ms: default_heartbeat_interval(),
            heartbeat_tick_ms: default_heartbeat_tick(),
            cuda_version_file: default_cuda_version_file(),
        }
    }
}

/// Whole milliseconds, saturating.
fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| {
            let v = v.trim();
            v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes")
        })
        .unwrap_or(false)
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl MetaConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `RUNMETA_DIR` | Output directory (default `.`) |
    /// | `RUNMETA_DISABLE_CODE` | Disable code capture (`1`, `true`, `yes`) |
    /// | `RUNMETA_HOST` | Host name override |
    /// | `RUNMETA_USERNAME` | Username override |
    /// | `RUNMETA_DOCKER` | Container identifier |
    /// | `RUNMETA_HEARTBEAT_SECS` | Heartbeat interval (default 15) |
    pub fn from_env() -> Self {
        Self {
            out_dir: env_nonempty("RUNMETA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_out_dir),
            disable_code: env_flag("RUNMETA_DISABLE_CODE"),
            host: env_nonempty("RUNMETA_HOST"),
            username: env_nonempty("RUNMETA_USERNAME"),
            docker: env_nonempty("RUNMETA_DOCKER"),
            heartbeat_interval_ms: std::env::var("RUNMETA_HEARTBEAT_SECS")
                .ok()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(|secs| secs.saturating_mul(1_000))
                .unwrap_or_else(default_heartbeat_interval),
            ..Self::default()
        }
    }

    /// Set the output directory.
    pub fn with_out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.out_dir = dir.into();
        self
    }

    /// Disable or enable code capture.
    pub fn with_disable_code(mut self, disable: bool) -> Self {
        self.disable_code = disable;
        self
    }

    /// Override the host name.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Override the username.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Record a container identifier.
    pub fn with_docker(mut self, docker: impl Into<String>) -> Self {
        self.docker = Some(docker.into());
        self
    }

    /// Set heartbeat interval and tick.
    pub fn with_heartbeat(mut self, interval: Duration, tick: Duration) -> Self {
        self.heartbeat_interval_ms = duration_ms(interval);
        self.heartbeat_tick_ms = duration_ms(tick);
        self
    }

    /// Point the toolkit probe at a different version file.
    pub fn with_cuda_version_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cuda_version_file = path.into();
        self
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn heartbeat_tick(&self) -> Duration {
        Duration::from_millis(self.heartbeat_tick_ms)
    }

    /// Check the heartbeat timing is usable.
    pub fn validate(&self) -> MetaResult<()> {
        if self.heartbeat_tick_ms == 0 {
            return Err(MetaError::Config {
                message: "heartbeat tick must be greater than zero".into(),
            });
        }
        if self.heartbeat_tick() > self.heartbeat_interval() {
            return Err(MetaError::Config {
                message: format!(
                    "heartbeat tick ({}ms) exceeds interval ({}ms)",
                    self.heartbeat_tick_ms, self.heartbeat_interval_ms
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "RUNMETA_DIR",
        "RUNMETA_DISABLE_CODE",
        "RUNMETA_HOST",
        "RUNMETA_USERNAME",
        "RUNMETA_DOCKER",
        "RUNMETA_HEARTBEAT_SECS",
    ];

    fn clear_env() {
        for v in VARS {
            std::env::remove_var(v);
        }
    }

    #[test]
    #[serial]
    fn test_config_from_env_defaults() {
        clear_env();

        let config = MetaConfig::from_env();
        assert_eq!(config, MetaConfig::default());
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(15));
        assert_eq!(config.heartbeat_tick(), Duration::from_secs(1));
    }

    #[test]
    #[serial]
    fn test_config_from_env_overrides() {
        clear_env();
        std::env::set_var("RUNMETA_DIR", "/tmp/run-1");
        std::env::set_var("RUNMETA_DISABLE_CODE", "True");
        std::env::set_var("RUNMETA_HOST", "worker-7");
        std::env::set_var("RUNMETA_USERNAME", "alice");
        std::env::set_var("RUNMETA_DOCKER", "img:latest");
        std::env::set_var("RUNMETA_HEARTBEAT_SECS", "30");

        let config = MetaConfig::from_env();
        clear_env();

        assert_eq!(config.out_dir, PathBuf::from("/tmp/run-1"));
        assert!(config.disable_code);
        assert_eq!(config.host.as_deref(), Some("worker-7"));
        assert_eq!(config.username.as_deref(), Some("alice"));
        assert_eq!(config.docker.as_deref(), Some("img:latest"));
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(30));
    }

    #[test]
    #[serial]
    fn test_config_from_env_ignores_empty_and_garbage() {
        clear_env();
        std::env::set_var("RUNMETA_HOST", "  ");
        std::env::set_var("RUNMETA_DISABLE_CODE", "0");
        std::env::set_var("RUNMETA_HEARTBEAT_SECS", "soon");

        let config = MetaConfig::from_env();
        clear_env();

        assert!(config.host.is_none());
        assert!(!config.disable_code);
        assert_eq!(config.heartbeat_interval_ms, DEFAULT_HEARTBEAT_INTERVAL_MS);
    }

    #[test]
    fn test_validate_rejects_zero_tick() {
        let config =
            MetaConfig::default().with_heartbeat(Duration::from_secs(15), Duration::ZERO);
        assert!(matches!(config.validate(), Err(MetaError::Config { .. })));
    }

    #[test]
    fn test_validate_rejects_tick_longer_than_interval() {
        let config = MetaConfig::default()
            .with_heartbeat(Duration::from_secs(1), Duration::from_secs(5));
        assert!(config.validate().is_err());
        assert!(MetaConfig::default().validate().is_ok());
    }

    #[test]
    fn test_sub_second_interval_is_kept() {
        let config = MetaConfig::default()
            .with_heartbeat(Duration::from_millis(1_500), Duration::from_millis(250));
        assert_eq!(config.heartbeat_interval(), Duration::from_millis(1_500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_sub_second_interval_below_tick() {
        let config = MetaConfig::default()
            .with_heartbeat(Duration::from_millis(500), Duration::from_secs(1));
        assert_eq!(config.heartbeat_interval(), Duration::from_millis(500));
        assert!(matches!(config.validate(), Err(MetaError::Config { .. })));

        let zero = MetaConfig::default().with_heartbeat(Duration::ZERO, Duration::from_secs(1));
        assert!(zero.validate().is_err());
    }
}
