use std::{fmt, sync::Arc, time::Duration};

use sheets_integration::{SheetConnector, SheetSession};
use shared::error::RemoteFailure;
use thiserror::Error;
use tracing::{info, warn};

use crate::{feedback::Feedback, shutdown::ShutdownSignal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("connection unavailable after {attempts} attempts")]
    Unavailable { attempts: u32 },
    #[error("connection attempt cancelled by shutdown")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
    /// `None` retries until connected or shut down.
    pub max_attempts: Option<u32>,
    /// Ceiling on a single connect call.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
            max_attempts: Some(10),
            attempt_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        if self.initial_backoff.is_zero() {
            return Duration::ZERO;
        }
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let scaled = self.initial_backoff.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_backoff.as_secs_f64() {
            return self.max_backoff.max(self.initial_backoff);
        }
        Duration::from_secs_f64(scaled)
    }

    fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempt >= max)
    }
}

pub struct ConnectionManager {
    connector: Arc<dyn SheetConnector>,
    policy: RetryPolicy,
    shutdown: ShutdownSignal,
    state: ConnectionState,
    session: Option<Arc<dyn SheetSession>>,
    lost_links: u32,
}

impl ConnectionManager {
    pub fn new(
        connector: Arc<dyn SheetConnector>,
        policy: RetryPolicy,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            connector,
            policy,
            shutdown,
            state: ConnectionState::Disconnected,
            session: None,
            lost_links: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected && self.session.is_some()
    }

    pub fn lost_links(&self) -> u32 {
        self.lost_links
    }

    /// Declares the current link dead. Returns whether a live link was dropped.
    pub fn mark_disconnected(&mut self) -> bool {
        let was_connected = self.state == ConnectionState::Connected;
        self.session = None;
        self.state = ConnectionState::Disconnected;
        if was_connected {
            self.lost_links += 1;
            warn!("connection: link marked lost");
        }
        was_connected
    }

    /// Returns the live session, connecting first if needed. Every failed
    /// attempt shows the fail sequence and backs off; success shows ack.
    pub async fn ensure_connected(
        &mut self,
        feedback: &mut Feedback,
    ) -> Result<Arc<dyn SheetSession>, ConnectError> {
        if let (ConnectionState::Connected, Some(session)) = (self.state, &self.session) {
            return Ok(Arc::clone(session));
        }

        let mut shutdown = self.shutdown.clone();
        let mut attempt = 0;
        loop {
            if shutdown.is_triggered() {
                self.state = ConnectionState::Disconnected;
                return Err(ConnectError::Cancelled);
            }

            attempt += 1;
            self.state = ConnectionState::Connecting;
            info!(
                attempt,
                max_attempts = ?self.policy.max_attempts,
                "connection: attempt"
            );

            let result = tokio::select! {
                result = self.attempt() => Some(result),
                _ = shutdown.triggered() => None,
            };
            let Some(result) = result else {
                self.state = ConnectionState::Disconnected;
                return Err(ConnectError::Cancelled);
            };

            match result {
                Ok(session) => {
                    self.state = ConnectionState::Connected;
                    self.session = Some(Arc::clone(&session));
                    info!(attempt, "connection: connected");
                    feedback.ack().await;
                    return Ok(session);
                }
                Err(failure) => {
                    self.state = ConnectionState::Disconnected;
                    warn!(attempt, kind = ?failure.kind, %failure, "connection: attempt failed");
                    feedback.fail().await;

                    if self.policy.exhausted(attempt) {
                        warn!(attempts = attempt, "connection: giving up for this cycle");
                        return Err(ConnectError::Unavailable { attempts: attempt });
                    }

                    let delay = self.policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = shutdown.triggered() => return Err(ConnectError::Cancelled),
                        }
                    }
                }
            }
        }
    }

    /// Sleeps the policy backoff for `failures` consecutive failed cycles.
    pub async fn back_off(&self, failures: u32) -> Result<(), ConnectError> {
        let delay = self.policy.backoff(failures);
        if delay.is_zero() {
            return Ok(());
        }
        info!(failures, ?delay, "connection: backing off before the next cycle");
        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = shutdown.triggered() => Err(ConnectError::Cancelled),
        }
    }

    async fn attempt(&self) -> Result<Arc<dyn SheetSession>, RemoteFailure> {
        tokio::time::timeout(self.policy.attempt_timeout, self.connector.connect())
            .await
            .map_err(|_| {
                RemoteFailure::timeout(format!(
                    "connect abandoned after {:?}",
                    self.policy.attempt_timeout
                ))
            })?
    }
}

#[cfg(test)]
#[path = "tests/connection_tests.rs"]
mod tests;
