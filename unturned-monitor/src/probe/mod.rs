//! Server liveness probes.
//!
//! A [`StatusProbe`] turns one query against the game server into a
//! [`Snapshot`]. Network trouble is not an error here: it becomes an offline
//! snapshot whose `failure_reason` says what went wrong. Only an address that
//! cannot be parsed is reported as [`Error::Configuration`].

mod scripted;
mod steam;

pub use steam::A2sProbe;
pub use scripted::{ScriptedOutcome, ScriptedProbe};

use async_trait::async_trait;
use std::io;
use std::time::Duration;

use crate::domain::Snapshot;
use crate::{Error, Result};

/// One liveness and attribute check against a game server endpoint.
#[async_trait]
pub trait StatusProbe: Send + Sync {
    /// Query `address` (`host:port`), giving up after `timeout`.
    async fn probe(&self, address: &str, timeout: Duration) -> Result<Snapshot>;
}

/// A validated `host:port` query endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub host: String,
    pub port: u16,
}

impl ProbeTarget {
    /// Parse `host:port`. IPv6 hosts must be bracketed (`[::1]:27016`).
    pub fn parse(address: &str) -> Result<Self> {
        let address = address.trim();
        let (host, port) = address
            .rsplit_once(':')
            .ok_or_else(|| Error::config(format!("address '{address}' is missing a port")))?;

        if host.is_empty() || host == "[]" {
            return Err(Error::config(format!("address '{address}' is missing a host")));
        }
        if host.contains(':') && !(host.starts_with('[') && host.ends_with(']')) {
            return Err(Error::config(format!(
                "IPv6 address '{address}' must be written as [host]:port"
            )));
        }

        let port: u16 = port
            .parse()
            .map_err(|_| Error::config(format!("address '{address}' has an invalid port")))?;
        if port == 0 {
            return Err(Error::config(format!("address '{address}' has port 0")));
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl std::fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Why a probe produced an offline snapshot. The `Display` form is stored as
/// the snapshot's `failure_reason`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeFailure {
    #[error("timeout")]
    Timeout,
    #[error("connection refused")]
    ConnectionRefused,
    #[error("unreachable: {0}")]
    Unreachable(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("io error: {0}")]
    Io(String),
}

impl From<io::Error> for ProbeFailure {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut => Self::Timeout,
            io::ErrorKind::ConnectionRefused => Self::ConnectionRefused,
            io::ErrorKind::HostUnreachable
            | io::ErrorKind::NetworkUnreachable
            | io::ErrorKind::AddrNotAvailable => Self::Unreachable(err.to_string()),
            _ => Self::Io(err.to_string()),
        }
    }
}

impl From<a2s::A2sError> for ProbeFailure {
    fn from(err: a2s::A2sError) -> Self {
        Self::Protocol(err.to_string())
    }
}
