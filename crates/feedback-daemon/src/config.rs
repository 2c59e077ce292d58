//! Daemon configuration.

use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::time::Duration;

use feedback_core::defaults::{IDLE_EXIT_SECS, SERVER_HOST, SERVER_PORT};

/// Listener and process lifetime settings.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub host: String,
    pub port: u16,
    /// Exit after the working set has stayed empty this long. `None` never exits.
    pub idle_exit: Option<Duration>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            host: SERVER_HOST.to_string(),
            port: SERVER_PORT,
            idle_exit: idle_from_secs(IDLE_EXIT_SECS),
        }
    }
}

impl DaemonConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `FEEDBACK_HOST` | `127.0.0.1` | Listen address |
    /// | `FEEDBACK_PORT` | `7075` | Listen port |
    /// | `FEEDBACK_IDLE_EXIT_SECS` | `0` | Idle exit delay, `0` disables |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = std::env::var("FEEDBACK_HOST")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.host);

        let port = std::env::var("FEEDBACK_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(defaults.port);

        let idle_exit = std::env::var("FEEDBACK_IDLE_EXIT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(idle_from_secs)
            .unwrap_or(defaults.idle_exit);

        Self {
            host,
            port,
            idle_exit,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_idle_exit(mut self, idle: Option<Duration>) -> Self {
        self.idle_exit = idle;
        self
    }

    /// Address to bind the listener to.
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        let ip: IpAddr = self.host.parse()?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

fn idle_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
