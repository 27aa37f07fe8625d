//! Channel configuration parameters
//!
//! Tunables for a single [`RpcChannel`](crate::rpc::channel::RpcChannel).
//! The struct is serde-enabled so it can be loaded from JSON or carried in
//! postcard alongside other settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::rpc::access::AccessPolicy;

/// Per-channel configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    // --- Liveness ---
    /// Inactivity timeout in milliseconds. `0` disables the watchdog.
    pub timeout_ms: u64,
    /// Heartbeat interval in milliseconds. `None` means half the timeout;
    /// `Some(0)` disables heartbeats.
    pub keepalive_ms: Option<u64>,

    // --- Startup ---
    /// Stay inactive until the first inbound message arrives.
    pub await_first_message: bool,

    // --- Access ---
    /// Decision applied when no controller has an opinion.
    pub default_policy: AccessPolicy,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 0,
            keepalive_ms: None,
            await_first_message: false,
            default_policy: AccessPolicy::Allow,
        }
    }
}

impl ChannelConfig {
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_keepalive_ms(mut self, keepalive_ms: u64) -> Self {
        self.keepalive_ms = Some(keepalive_ms);
        self
    }

    pub fn with_await_first_message(mut self, wait: bool) -> Self {
        self.await_first_message = wait;
        self
    }

    pub fn with_default_policy(mut self, policy: AccessPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    /// Watchdog timeout, if enabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    /// Heartbeat interval, if enabled.
    pub fn keepalive_interval(&self) -> Option<Duration> {
        match self.keepalive_ms {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None if self.timeout_ms > 1 => Some(Duration::from_millis(self.timeout_ms / 2)),
            None => None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match (self.keepalive_ms, self.timeout_ms) {
            (Some(k), t) if k > 0 && t > 0 && k >= t => {
                Err(ConfigError::KeepaliveNotShorterThanTimeout {
                    keepalive_ms: k,
                    timeout_ms: t,
                })
            }
            _ => Ok(()),
        }
    }
}
