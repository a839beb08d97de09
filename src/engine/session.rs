use crate::api::events::DisconnectReason;
use crate::app::AppConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    AwaitingPairing,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::AwaitingPairing => "awaiting-pairing",
            ConnectionState::Connected => "connected",
        })
    }
}

/// Linear backoff: `step × attempt`, capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub step: Duration,
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            step: cfg.retry_step(),
            cap: cfg.retry_cap(),
        }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt).min(self.cap)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseAction {
    Reconnect { attempt: u32, delay: Duration },
    Stop,
}

/// Lifecycle state plus the consecutive-retry counter.
#[derive(Debug, Clone)]
pub struct ConnectionSession {
    state: ConnectionState,
    retries: u32,
    policy: RetryPolicy,
    me: Option<String>,
}

impl ConnectionSession {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            retries: 0,
            policy,
            me: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// The owner's own identifier, once the transport has announced it.
    pub fn me(&self) -> Option<&str> {
        self.me.as_deref()
    }

    pub fn start(&mut self) -> ConnectionState {
        self.retries = 0;
        self.state = ConnectionState::Connecting;
        self.state
    }

    /// Returns the new state when the challenge moved the session.
    pub fn on_pairing(&mut self) -> Option<ConnectionState> {
        match self.state {
            ConnectionState::Connecting => {
                self.state = ConnectionState::AwaitingPairing;
                Some(self.state)
            }
            _ => None,
        }
    }

    pub fn on_open(&mut self, me: Option<String>) -> Option<ConnectionState> {
        if me.is_some() {
            self.me = me;
        }
        match self.state {
            ConnectionState::Connecting | ConnectionState::AwaitingPairing => {
                self.retries = 0;
                self.state = ConnectionState::Connected;
                Some(self.state)
            }
            _ => None,
        }
    }

    pub fn on_close(&mut self, reason: DisconnectReason) -> CloseAction {
        if self.state == ConnectionState::Disconnected {
            return CloseAction::Stop;
        }
        if reason.is_logged_out() {
            self.state = ConnectionState::Disconnected;
            return CloseAction::Stop;
        }
        if self.retries < self.policy.max_retries {
            self.retries += 1;
            self.state = ConnectionState::Connecting;
            CloseAction::Reconnect {
                attempt: self.retries,
                delay: self.policy.delay(self.retries),
            }
        } else {
            self.state = ConnectionState::Disconnected;
            CloseAction::Stop
        }
    }

    pub fn shutdown(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.retries = 0;
    }
}
