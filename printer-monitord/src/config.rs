use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::Deserialize;
use anyhow::{bail, Context, Result};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub snmp: SnmpConfig,
    #[serde(default)]
    pub readings: ReadingsConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnmpConfig {
    #[serde(default = "default_community")]
    pub community: String,
    /// Security name for v3 probes (noAuthNoPriv)
    #[serde(default = "default_community")]
    pub v3_user: String,
    #[serde(default = "default_snmp_port")]
    pub port: u16,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Version discovery tries three versions in a row, so it retries less
    #[serde(default)]
    pub probe_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadingsConfig {
    /// Trailing window: readings newer than this are "current"
    #[serde(default = "default_window")]
    pub window_secs: u64,
    /// Skip a reading when the same level was already stored inside the window
    #[serde(default = "default_true")]
    pub skip_unchanged: bool,
    /// Delete readings older than the window after every refresh batch
    #[serde(default)]
    pub purge_stale: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_mins: u32,
    /// Path of the batch binary written into the generated cron entry
    #[serde(default = "default_binary")]
    pub binary: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("/var/lib/printer-monitor/printers.db")
}

fn default_community() -> String {
    "public".to_string()
}

fn default_snmp_port() -> u16 {
    161
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_retries() -> u32 {
    2
}

fn default_window() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

fn default_poll_interval() -> u32 {
    15
}

fn default_binary() -> PathBuf {
    PathBuf::from("/usr/local/bin/printer-monitor")
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Default for SnmpConfig {
    fn default() -> Self {
        Self {
            community: default_community(),
            v3_user: default_community(),
            port: default_snmp_port(),
            timeout_ms: default_timeout_ms(),
            retries: default_retries(),
            probe_retries: 0,
        }
    }
}

impl Default for ReadingsConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window(),
            skip_unchanged: true,
            purge_stale: false,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            poll_interval_mins: default_poll_interval(),
            binary: default_binary(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl SnmpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl ReadingsConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.readings.window_secs == 0 {
            bail!("readings.window_secs must be greater than zero");
        }
        if self.schedule.poll_interval_mins == 0 {
            bail!("schedule.poll_interval_mins must be greater than zero");
        }
        if self.snmp.timeout_ms == 0 {
            bail!("snmp.timeout_ms must be greater than zero");
        }
        Ok(())
    }
}
