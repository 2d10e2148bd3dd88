//! Watch session settings
//!
//! ```toml
//! [watch]
//! gate_key = "config-version"   # "" applies every change immediately
//! event_buffer_size = 1024
//!
//! [watch.reconnect]
//! enabled = true
//! backoff = { max_retries = 0, base_delay_ms = 200, max_delay_ms = 10000 }
//! ```

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use super::BackoffPolicy;
use crate::constants::DEFAULT_GATE_KEY;
use crate::Error;
use crate::GatePolicy;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WatchConfig {
    /// Name of the scalar whose change commits the staged batch.
    ///
    /// An empty name disables gating: every change is committed as it arrives.
    ///
    /// Default: `config-version`
    #[serde(default = "default_gate_key")]
    pub gate_key: String,

    /// Capacity of the change event channel between the watch task and its consumer
    ///
    /// Default: 1024
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,

    /// Re-watch policy after a terminal watch error
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            gate_key: default_gate_key(),
            event_buffer_size: default_event_buffer_size(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl WatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(Error::Config(ConfigError::Message(
                "event_buffer_size must be greater than 0".into(),
            )));
        }
        if self.gate_key.trim() != self.gate_key {
            return Err(Error::Config(ConfigError::Message(format!(
                "gate_key '{}' must not contain surrounding whitespace",
                self.gate_key
            ))));
        }
        self.reconnect.validate()
    }

    pub fn gate_policy(&self) -> GatePolicy {
        if self.gate_key.is_empty() {
            GatePolicy::Immediate
        } else {
            GatePolicy::OnKey(self.gate_key.clone())
        }
    }
}

/// Reconnect-on-disconnect behaviour
///
/// When `enabled = false` (default) a terminal watch error ends the session and the
/// live configuration stays at its last committed state.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ReconnectPolicy {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub backoff: BackoffPolicy,
}

impl ReconnectPolicy {
    pub fn validate(&self) -> Result<()> {
        // Skip validation if disabled
        if !self.enabled {
            return Ok(());
        }
        self.backoff.validate()
    }
}

fn default_gate_key() -> String {
    DEFAULT_GATE_KEY.to_string()
}
fn default_event_buffer_size() -> usize {
    1024
}
