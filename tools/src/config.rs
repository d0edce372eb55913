//! perfdoc tools configuration loading and parsing

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "/etc/perfdoc/tools.toml";

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub commands: CommandsConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub disk_io: DiskIoConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Binary name or absolute path for each diagnostic command.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandsConfig {
    #[serde(default = "default_ss")]
    pub ss: String,
    #[serde(default = "default_lscpu")]
    pub lscpu: String,
    #[serde(default = "default_hostnamectl")]
    pub hostnamectl: String,
    #[serde(default = "default_mpstat")]
    pub mpstat: String,
    #[serde(default = "default_free")]
    pub free: String,
    #[serde(default = "default_iostat")]
    pub iostat: String,
    #[serde(default = "default_ps")]
    pub ps: String,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            ss: default_ss(),
            lscpu: default_lscpu(),
            hostnamectl: default_hostnamectl(),
            mpstat: default_mpstat(),
            free: default_free(),
            iostat: default_iostat(),
            ps: default_ps(),
        }
    }
}

impl CommandsConfig {
    /// Every configured binary, paired with the package that usually ships it.
    pub fn required(&self) -> Vec<(&str, &'static str)> {
        vec![
            (self.ss.as_str(), "iproute2"),
            (self.lscpu.as_str(), "util-linux"),
            (self.hostnamectl.as_str(), "systemd"),
            (self.mpstat.as_str(), "sysstat"),
            (self.free.as_str(), "procps"),
            (self.iostat.as_str(), "sysstat"),
            (self.ps.as_str(), "procps"),
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_timeout")]
    pub default_secs: u64,
    /// Added on top of the requested sampling duration for mpstat.
    #[serde(default = "default_cpu_slack")]
    pub cpu_slack_secs: u64,
    #[serde(default = "default_disk_io_timeout")]
    pub disk_io_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            default_secs: default_timeout(),
            cpu_slack_secs: default_cpu_slack(),
            disk_io_secs: default_disk_io_timeout(),
        }
    }
}

impl TimeoutsConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_secs)
    }

    pub fn cpu_timeout(&self, duration_secs: u64) -> Duration {
        Duration::from_secs(duration_secs.saturating_add(self.cpu_slack_secs))
    }

    pub fn disk_io_timeout(&self) -> Duration {
        Duration::from_secs(self.disk_io_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiskIoConfig {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_samples")]
    pub samples: u32,
}

impl Default for DiskIoConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            samples: default_samples(),
        }
    }
}

fn default_log_level() -> String { "info".into() }
fn default_ss() -> String { "ss".into() }
fn default_lscpu() -> String { "lscpu".into() }
fn default_hostnamectl() -> String { "hostnamectl".into() }
fn default_mpstat() -> String { "mpstat".into() }
fn default_free() -> String { "free".into() }
fn default_iostat() -> String { "iostat".into() }
fn default_ps() -> String { "ps".into() }
fn default_timeout() -> u64 { 5 }
fn default_cpu_slack() -> u64 { 5 }
fn default_disk_io_timeout() -> u64 { 20 }
fn default_interval() -> u64 { 1 }
fn default_samples() -> u32 { 3 }

/// Resolve the config location: `path`, else `$PERFDOC_CONFIG`, else
/// /etc/perfdoc/tools.toml
pub fn resolve_config_path(path: Option<&Path>) -> PathBuf {
    match path {
        Some(p) => p.to_path_buf(),
        None => std::env::var_os("PERFDOC_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
    }
}

/// Load configuration; a missing file yields defaults
pub fn load_config(path: Option<&Path>) -> Result<ToolsConfig> {
    let config_path = resolve_config_path(path);

    if config_path.exists() {
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
        let config: ToolsConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", config_path.display()))?;
        Ok(config)
    } else {
        tracing::warn!("Config file not found at {}, using defaults", config_path.display());
        Ok(ToolsConfig::default())
    }
}
