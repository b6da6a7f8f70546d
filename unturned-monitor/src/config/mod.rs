//! Environment-based application configuration.
//!
//! Values come from the process environment, typically filled from a `.env`
//! file by `dotenvy` before [`AppConfig::from_env`] runs. Every variable has
//! a default; a value that is present but malformed is a configuration error
//! naming the variable.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::monitor::{CapacityThresholds, MonitorConfig};
use crate::monitor::detector::{DEFAULT_NORMAL_RATIO, DEFAULT_WARNING_RATIO};
use crate::notification::OneBotConfig;
use crate::probe::ProbeTarget;
use crate::{Error, Result};

pub const DEFAULT_DATABASE_URL: &str = "sqlite:unturned_monitor.db?mode=rwc";

/// The monitored game server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    /// Game port, shown to players.
    pub port: u16,
    /// A2S query port. `None` means `port + 1`.
    pub query_port: Option<u16>,
    /// Label used in messages.
    pub name: String,
    pub timeout: Duration,
}

impl ServerConfig {
    pub fn query_port(&self) -> Result<u16> {
        match self.query_port {
            Some(port) => Ok(port),
            None => self.port.checked_add(1).ok_or_else(|| {
                Error::config("SERVER_QUERY_PORT must be set when SERVER_PORT is 65535")
            }),
        }
    }

    /// `host:port` players connect to.
    pub fn game_address(&self) -> String {
        join_host_port(&self.host, self.port)
    }

    /// `host:query_port` the probe queries.
    pub fn query_address(&self) -> Result<String> {
        Ok(join_host_port(&self.host, self.query_port()?))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSettings {
    pub interval: Duration,
    /// Start the loop at boot. The binary has no other way to start it.
    pub enabled: bool,
    pub warning_ratio: f64,
    pub normal_ratio: f64,
    /// History retention in days, 0 keeps everything.
    pub retention_days: u32,
    pub notify_on_startup: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub monitor: MonitorSettings,
    /// Registered as direct recipients.
    pub superusers: Vec<String>,
    /// Registered as group recipients.
    pub groups: Vec<String>,
    pub onebot: OneBotConfig,
    pub database_url: String,
    pub log_dir: String,
}

impl AppConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, which returns the raw value
    /// of a variable if it is set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };

        let config = Self {
            server: ServerConfig {
                host: env.string("SERVER_IP", "127.0.0.1"),
                port: env.parse("SERVER_PORT", 27015)?,
                query_port: env.parse_opt("SERVER_QUERY_PORT")?,
                name: env.string("SERVER_NAME", "Unturned Server"),
                timeout: Duration::from_secs(env.parse("SERVER_TIMEOUT", 5)?),
            },
            monitor: MonitorSettings {
                interval: Duration::from_secs(env.parse("MONITOR_INTERVAL", 60)?),
                enabled: env.flag("MONITOR_ENABLED", true)?,
                warning_ratio: env.parse("CAPACITY_WARNING_RATIO", DEFAULT_WARNING_RATIO)?,
                normal_ratio: env.parse("CAPACITY_NORMAL_RATIO", DEFAULT_NORMAL_RATIO)?,
                retention_days: env.parse("STATUS_RETENTION_DAYS", 30)?,
                notify_on_startup: env.flag("NOTIFY_ON_STARTUP", true)?,
            },
            superusers: env.list("SUPERUSERS"),
            groups: env.list("MONITOR_GROUPS"),
            onebot: OneBotConfig {
                base_url: env.string("ONE_BOT_URL", "http://127.0.0.1:5700"),
                access_token: env.get("ONE_BOT_ACCESS_TOKEN"),
                timeout_secs: env.parse("ONE_BOT_TIMEOUT", 10)?,
            },
            database_url: env.string("DATABASE_URL", DEFAULT_DATABASE_URL),
            log_dir: env.string("LOG_DIR", "logs"),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        ProbeTarget::parse(&self.server.query_address()?)?;
        if self.server.timeout.is_zero() {
            return Err(Error::config("SERVER_TIMEOUT must be greater than zero"));
        }
        if self.monitor.interval.is_zero() {
            return Err(Error::config("MONITOR_INTERVAL must be greater than zero"));
        }
        if self.onebot.timeout_secs == 0 {
            return Err(Error::config("ONE_BOT_TIMEOUT must be greater than zero"));
        }
        self.thresholds()?;
        Ok(())
    }

    pub fn thresholds(&self) -> Result<CapacityThresholds> {
        CapacityThresholds::new(self.monitor.warning_ratio, self.monitor.normal_ratio)
    }

    pub fn retention(&self) -> Option<Duration> {
        match self.monitor.retention_days {
            0 => None,
            days => Some(Duration::from_secs(u64::from(days) * 24 * 60 * 60)),
        }
    }

    /// Settings for the server monitor.
    pub fn monitor_config(&self) -> Result<MonitorConfig> {
        Ok(
            MonitorConfig::new(self.server.query_address()?, self.monitor.interval)
                .with_probe_timeout(self.server.timeout)
                .with_thresholds(self.thresholds()?)
                .with_retention(self.retention()),
        )
    }
}

fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Trimmed value, `None` when unset or blank.
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parse_opt<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key)
            .map(|raw| {
                raw.parse::<T>()
                    .map_err(|e| Error::config(format!("invalid {key} '{raw}': {e}")))
            })
            .transpose()
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        Ok(self.parse_opt(key)?.unwrap_or(default))
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool> {
        let Some(raw) = self.get(key) else {
            return Ok(default);
        };
        match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(Error::config(format!(
                "invalid {key} '{raw}': expected true or false"
            ))),
        }
    }

    /// Comma separated list, blanks dropped.
    fn list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}
