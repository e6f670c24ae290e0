// SPDX-License-Identifier: AGPL-3.0-or-later
//! Database readiness polling
//!
//! A TCP connect is the only readiness signal: the port either accepts a
//! connection within the overall timeout or it does not.

use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::compose::{ComposeDocument, MYSQL_HOST, MYSQL_PORT};
use crate::config::{ComposeConfig, ReadinessConfig};
use crate::error::Result;

/// Host and port to probe, plus the overall budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
}

impl ProbeTarget {
    /// Derive the target from the db service's environment
    ///
    /// `MYSQL_HOST`/`MYSQL_PORT` win when present, otherwise the service
    /// alias and the configured default port are used.
    pub fn from_compose(document: &ComposeDocument, compose: &ComposeConfig, timeout: Duration) -> Result<Self> {
        let env = document.service_env(&compose.db_service)?;

        let host = env
            .get(MYSQL_HOST)
            .filter(|h| !h.is_empty())
            .unwrap_or(compose.db_service.as_str())
            .to_string();

        let port = match env.get(MYSQL_PORT) {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!(value = %raw, "Ignoring unparsable MYSQL_PORT");
                compose.db_port
            }),
            None => compose.db_port,
        };

        Ok(Self { host, port, timeout })
    }
}

/// Polls a [`ProbeTarget`] with a fixed interval
#[derive(Debug, Clone)]
pub struct ReadinessGate {
    attempt_timeout: Duration,
    interval: Duration,
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(2),
            interval: Duration::from_secs(2),
        }
    }
}

impl ReadinessGate {
    pub fn new(attempt_timeout: Duration, interval: Duration) -> Self {
        Self {
            attempt_timeout,
            interval,
        }
    }

    pub fn from_config(config: &ReadinessConfig) -> Self {
        Self::new(config.attempt_timeout(), config.interval())
    }

    async fn attempt(&self, target: &ProbeTarget) -> bool {
        let address = (target.host.as_str(), target.port);
        match timeout(self.attempt_timeout, TcpStream::connect(address)).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                debug!(host = %target.host, port = target.port, error = %e, "Connection refused");
                false
            }
            Err(_) => {
                debug!(host = %target.host, port = target.port, "Connection attempt timed out");
                false
            }
        }
    }

    /// Wait until `target` accepts a connection
    ///
    /// Returns `true` on the first successful connect and `false` once the
    /// overall timeout has elapsed. Never gives up before the timeout.
    pub async fn await_ready(&self, target: &ProbeTarget) -> bool {
        let start = Instant::now();
        let mut attempts = 0u32;

        info!(host = %target.host, port = target.port, timeout_secs = target.timeout.as_secs(), "Waiting for database");

        while start.elapsed() < target.timeout {
            attempts += 1;
            if self.attempt(target).await {
                info!(attempts, elapsed_ms = start.elapsed().as_millis() as u64, "Database is ready");
                return true;
            }
            sleep(self.interval).await;
        }

        warn!(attempts, host = %target.host, port = target.port, "Timed out waiting for database");
        false
    }
}
