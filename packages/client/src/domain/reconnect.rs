//! Reconnection logic for the client.
//!
//! The controller is an explicit state machine driven by the session runner:
//!
//! ```text
//! Idle -> Connecting -> Open -> BackoffWait -> Connecting -> ... -> Failed
//!                                   \-> Closed (caller-initiated teardown)
//! ```
//!
//! It never touches the network or timers itself; it only decides whether the
//! next step is another attempt (and after which delay) or a permanent failure.

use std::time::Duration;

use crate::error::ClientError;

pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Check if the client should exit immediately based on the error type.
///
/// # Arguments
///
/// * `error` - The client error to check
///
/// # Returns
///
/// `true` if retrying cannot help (rejected token, unknown room, bad config,
/// or a newer connection took over), `false` otherwise
pub fn should_exit_immediately(error: &ClientError) -> bool {
    matches!(
        error,
        ClientError::Unauthorized
            | ClientError::RoomNotFound(_)
            | ClientError::InvalidConfig(_)
            | ClientError::Replaced
            | ClientError::ReconnectExhausted { .. }
    )
}

/// Check if the client should attempt to reconnect.
///
/// # Arguments
///
/// * `error` - The client error that occurred
/// * `current_attempt` - The number of reconnection attempts already made
/// * `max_attempts` - The maximum number of reconnection attempts allowed
///
/// # Returns
///
/// `true` if reconnection should be attempted, `false` otherwise
pub fn should_attempt_reconnect(
    error: &ClientError,
    current_attempt: u32,
    max_attempts: u32,
) -> bool {
    if should_exit_immediately(error) {
        return false;
    }

    current_attempt < max_attempts
}

/// Backoff settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the given attempt (1-based): `base * 2^(attempt - 1)`, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting { attempt: u32 },
    Open,
    BackoffWait { attempt: u32, delay: Duration },
    Failed,
    Closed,
}

/// What the runner should do after a connection failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStep {
    Retry(Duration),
    GiveUp(ClientError),
    /// The controller was shut down; do nothing
    Stop,
}

#[derive(Debug)]
pub struct ReconnectController {
    policy: ReconnectPolicy,
    state: ConnectionState,
    /// Consecutive failed attempts since the last successful open
    failures: u32,
}

impl ReconnectController {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ConnectionState::Idle,
            failures: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Begin a connection attempt.
    ///
    /// Returns `false` once the controller is closed or failed, so a torn-down
    /// client is never resurrected by a late timer.
    pub fn begin_attempt(&mut self) -> bool {
        match self.state {
            ConnectionState::Idle | ConnectionState::BackoffWait { .. } => {
                self.state = ConnectionState::Connecting {
                    attempt: self.failures,
                };
                true
            }
            ConnectionState::Connecting { .. } | ConnectionState::Open => true,
            ConnectionState::Failed | ConnectionState::Closed => false,
        }
    }

    pub fn on_open(&mut self) {
        if matches!(self.state, ConnectionState::Connecting { .. }) {
            self.state = ConnectionState::Open;
            self.failures = 0;
        }
    }

    /// A connection attempt failed, or an open socket closed unexpectedly.
    pub fn on_failure(&mut self, error: ClientError) -> NextStep {
        if matches!(self.state, ConnectionState::Closed) {
            return NextStep::Stop;
        }
        if should_exit_immediately(&error) {
            self.state = ConnectionState::Failed;
            return NextStep::GiveUp(error);
        }
        if !should_attempt_reconnect(&error, self.failures, self.policy.max_attempts) {
            self.state = ConnectionState::Failed;
            return NextStep::GiveUp(ClientError::ReconnectExhausted {
                attempts: self.failures,
            });
        }

        self.failures += 1;
        let delay = self.policy.delay_for(self.failures);
        self.state = ConnectionState::BackoffWait {
            attempt: self.failures,
            delay,
        };
        NextStep::Retry(delay)
    }

    /// Caller-initiated teardown; cancels any pending retry.
    pub fn shutdown(&mut self) {
        self.state = ConnectionState::Closed;
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, ConnectionState::Closed)
    }
}
