use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_ROOT;
use crate::constants::DEFAULT_SEPARATOR;
use crate::Error;
use crate::Result;

/// Key-value store connection and key layout
///
/// # Defaults
/// Field-level defaults use helper functions prefixed with `default_`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoreConfig {
    /// Store endpoints, e.g. `http://127.0.0.1:2379`
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,

    /// Namespace all configuration keys live under
    ///
    /// Default: `/confsync`
    #[serde(default = "default_root")]
    pub root: String,

    /// Single-character path delimiter
    ///
    /// Default: `/`
    #[serde(default = "default_separator")]
    pub separator: String,

    /// Client connect timeout
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_in_ms: u64,

    /// Deadline for a single `get`/`list`/`set`
    #[serde(default = "default_request_timeout")]
    pub request_timeout_in_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            root: default_root(),
            separator: default_separator(),
            connect_timeout_in_ms: default_connect_timeout(),
            request_timeout_in_ms: default_request_timeout(),
        }
    }
}

impl StoreConfig {
    /// Validates layout and timeouts
    ///
    /// Returns error if:
    /// - `separator` is not exactly one non-alphanumeric character
    /// - `root` does not start with the separator, or ends with it
    /// - `endpoints` is empty
    /// - either timeout is zero
    pub fn validate(&self) -> Result<()> {
        let mut chars = self.separator.chars();
        let separator = match (chars.next(), chars.next()) {
            (Some(c), None) if !c.is_alphanumeric() => c,
            _ => {
                return Err(Error::Config(ConfigError::Message(format!(
                    "separator must be a single non-alphanumeric character, got '{}'",
                    self.separator
                ))));
            }
        };

        if !self.root.starts_with(separator) {
            return Err(Error::Config(ConfigError::Message(format!(
                "root '{}' must start with separator '{}'",
                self.root, separator
            ))));
        }
        if self.root.len() > 1 && self.root.ends_with(separator) {
            return Err(Error::Config(ConfigError::Message(format!(
                "root '{}' must not end with separator '{}'",
                self.root, separator
            ))));
        }

        if self.endpoints.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "endpoints must contain at least one store address".into(),
            )));
        }

        if self.connect_timeout_in_ms == 0 || self.request_timeout_in_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "store timeouts must be greater than 0".into(),
            )));
        }

        Ok(())
    }

    /// The configured delimiter, `/` if the setting is unusable
    pub fn separator_char(&self) -> char {
        self.separator.chars().next().unwrap_or(DEFAULT_SEPARATOR)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_in_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_in_ms)
    }
}

fn default_endpoints() -> Vec<String> {
    vec!["http://127.0.0.1:2379".to_string()]
}
fn default_root() -> String {
    DEFAULT_ROOT.to_string()
}
fn default_separator() -> String {
    DEFAULT_SEPARATOR.to_string()
}
fn default_connect_timeout() -> u64 {
    5000
}
fn default_request_timeout() -> u64 {
    2000
}
