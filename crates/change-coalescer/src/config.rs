use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CoalescerConfig {
    pub quiet_window_ms: u64,
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self {
            quiet_window_ms: 500,
        }
    }
}

impl CoalescerConfig {
    pub fn quiet_window(&self) -> Duration {
        Duration::from_millis(self.quiet_window_ms)
    }
}

/// Upper bounds for waiting on asynchronously rendered regions.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub content_timeout_ms: u64,
    pub navigation_timeout_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            content_timeout_ms: 10_000,
            navigation_timeout_ms: 5_000,
        }
    }
}

impl DiscoveryConfig {
    pub fn content_timeout(&self) -> Duration {
        Duration::from_millis(self.content_timeout_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }
}
