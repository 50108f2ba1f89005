//! `[bridge]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [bridge]
//! poll_interval_ms = 16     # How often the async loop drains the channel
//! gated = true              # Host queues commands until the scene is ready
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ConfigDiagnostics;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Pump interval of the async run loop, in milliseconds.
    pub poll_interval_ms: u64,

    /// Whether the host endpoint waits for `ready` before transmitting.
    pub gated: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 16,
            gated: true,
        }
    }
}

impl BridgeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.poll_interval_ms == 0 {
            diag.error("bridge.poll_interval_ms", "must be greater than 0");
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_bridge_config() {
        let config = test_parse_config("[bridge]\npoll_interval_ms = 50\ngated = false");
        assert_eq!(config.bridge.poll_interval().as_millis(), 50);
        assert!(!config.bridge.gated);
    }

    #[test]
    fn test_bridge_config_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.bridge.poll_interval_ms, 16);
        assert!(config.bridge.gated);
    }
}
